//! Error report entity - nonconformance records and their workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::job::WorkflowStage;

/// Attribution of a nonconformance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ErrorType {
    /// Internal process issue
    #[default]
    Internal,
    /// Raw-material supplier issue, found at incoming inspection
    MaterialSupplier,
    /// External-process supplier issue, found on returned parts
    ExternalSupplier,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorType::Internal => write!(f, "internal"),
            ErrorType::MaterialSupplier => write!(f, "material_supplier"),
            ErrorType::ExternalSupplier => write!(f, "external_supplier"),
        }
    }
}

impl std::str::FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "internal" => Ok(ErrorType::Internal),
            "material_supplier" => Ok(ErrorType::MaterialSupplier),
            "external_supplier" => Ok(ErrorType::ExternalSupplier),
            _ => Err(format!(
                "Invalid error type: {}. Use internal, material_supplier, or external_supplier",
                s
            )),
        }
    }
}

/// Severity of a nonconformance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum Severity {
    #[default]
    Minor,
    Major,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Minor => write!(f, "minor"),
            Severity::Major => write!(f, "major"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minor" => Ok(Severity::Minor),
            "major" => Ok(Severity::Major),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!(
                "Invalid severity: {}. Use minor, major, or critical",
                s
            )),
        }
    }
}

/// Error report workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ErrorStatus {
    #[default]
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl ErrorStatus {
    /// Check whether a status transition is legal
    ///
    /// open -> investigating | resolved, investigating -> resolved,
    /// resolved -> closed, and any state -> open (reopen).
    pub fn can_transition(self, to: ErrorStatus) -> bool {
        matches!(
            (self, to),
            (ErrorStatus::Open, ErrorStatus::Investigating)
                | (ErrorStatus::Open, ErrorStatus::Resolved)
                | (ErrorStatus::Investigating, ErrorStatus::Resolved)
                | (ErrorStatus::Resolved, ErrorStatus::Closed)
                | (_, ErrorStatus::Open)
        )
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorStatus::Open => write!(f, "open"),
            ErrorStatus::Investigating => write!(f, "investigating"),
            ErrorStatus::Resolved => write!(f, "resolved"),
            ErrorStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for ErrorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(ErrorStatus::Open),
            "investigating" => Ok(ErrorStatus::Investigating),
            "resolved" => Ok(ErrorStatus::Resolved),
            "closed" => Ok(ErrorStatus::Closed),
            _ => Err(format!(
                "Invalid error report status: {}. Use open, investigating, resolved, or closed",
                s
            )),
        }
    }
}

/// A nonconformance record raised against a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Unique identifier (ERR-...)
    pub id: EntityId,

    /// Owning job (JOB-...)
    pub job_id: EntityId,

    /// Who reported the issue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_by: Option<String>,

    /// Workflow stage the job was in when the issue was found
    pub workflow_stage: WorkflowStage,

    /// When the issue was found
    pub found_date: DateTime<Utc>,

    /// Severity
    pub severity: Severity,

    /// Description of the nonconformance
    pub description: String,

    /// Number of units affected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_quantity: Option<u32>,

    /// Disposition decision (use-as-is, rework, scrap, return)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,

    /// Root cause analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,

    /// Corrective action taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrective_action: Option<String>,

    /// Workflow status
    #[serde(default)]
    pub status: ErrorStatus,

    /// Assigned owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,

    /// When the report was resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_date: Option<DateTime<Utc>>,

    /// When the report was closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_date: Option<DateTime<Utc>>,

    /// Attribution
    #[serde(default)]
    pub error_type: ErrorType,

    /// Supplier reference, copied from the origin record for supplier errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,

    /// Originating material control, for material-supplier errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_control_id: Option<EntityId>,

    /// Originating external process, for external-supplier errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_process_id: Option<EntityId>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last update timestamp
    pub updated: DateTime<Utc>,
}

impl ErrorReport {
    /// Create a new open error report
    pub fn new(
        job_id: EntityId,
        error_type: ErrorType,
        severity: Severity,
        workflow_stage: WorkflowStage,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Err),
            job_id,
            reported_by: None,
            workflow_stage,
            found_date: now,
            severity,
            description: description.into(),
            affected_quantity: None,
            disposition: None,
            root_cause: None,
            corrective_action: None,
            status: ErrorStatus::Open,
            assigned_to: None,
            resolved_date: None,
            closed_date: None,
            error_type,
            supplier: None,
            material_control_id: None,
            external_process_id: None,
            created: now,
            updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_report_creation() {
        let er = ErrorReport::new(
            EntityId::new(EntityPrefix::Job),
            ErrorType::Internal,
            Severity::Major,
            WorkflowStage::InProcess,
            "Bore diameter out of tolerance",
        );
        assert!(er.id.to_string().starts_with("ERR-"));
        assert_eq!(er.status, ErrorStatus::Open);
        assert_eq!(er.error_type, ErrorType::Internal);
        assert!(er.resolved_date.is_none());
    }

    #[test]
    fn test_status_transitions() {
        assert!(ErrorStatus::Open.can_transition(ErrorStatus::Investigating));
        assert!(ErrorStatus::Open.can_transition(ErrorStatus::Resolved));
        assert!(ErrorStatus::Investigating.can_transition(ErrorStatus::Resolved));
        assert!(ErrorStatus::Resolved.can_transition(ErrorStatus::Closed));

        // Reopen from any state
        assert!(ErrorStatus::Closed.can_transition(ErrorStatus::Open));
        assert!(ErrorStatus::Resolved.can_transition(ErrorStatus::Open));
        assert!(ErrorStatus::Investigating.can_transition(ErrorStatus::Open));

        // No skipping or regressing otherwise
        assert!(!ErrorStatus::Open.can_transition(ErrorStatus::Closed));
        assert!(!ErrorStatus::Investigating.can_transition(ErrorStatus::Closed));
        assert!(!ErrorStatus::Closed.can_transition(ErrorStatus::Resolved));
        assert!(!ErrorStatus::Closed.can_transition(ErrorStatus::Investigating));
    }

    #[test]
    fn test_type_and_severity_parsing() {
        assert_eq!(
            "material_supplier".parse::<ErrorType>().unwrap(),
            ErrorType::MaterialSupplier
        );
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("cosmetic".parse::<Severity>().is_err());
    }
}
