//! Material control entity - incoming inspection of raw material

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Material control status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum MaterialStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for MaterialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterialStatus::Pending => write!(f, "pending"),
            MaterialStatus::Approved => write!(f, "approved"),
            MaterialStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for MaterialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MaterialStatus::Pending),
            "approved" => Ok(MaterialStatus::Approved),
            "rejected" => Ok(MaterialStatus::Rejected),
            _ => Err(format!(
                "Invalid material status: {}. Use pending, approved, or rejected",
                s
            )),
        }
    }
}

/// An incoming-inspection record for raw material or purchased components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialControl {
    /// Unique identifier (MATC-...)
    pub id: EntityId,

    /// Owning job (JOB-...)
    pub job_id: EntityId,

    /// Inspector username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspector: Option<String>,

    /// Material type (e.g. "6082-T6 bar stock")
    pub material_type: String,

    /// Supplier reference (collaborator-owned, referenced by name only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,

    /// Supplier batch / heat number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,

    /// Quantity received (free text: "12 bars", "4.2 kg")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_received: Option<String>,

    /// Certificate matches the PO requirements
    #[serde(default)]
    pub certificate_matches: bool,

    /// Visual check passed
    #[serde(default)]
    pub visual_ok: bool,

    /// Dimensional check result; None when not checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions_ok: Option<bool>,

    /// Inspection verdict
    #[serde(default)]
    pub status: MaterialStatus,

    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Creation timestamp
    pub created: DateTime<Utc>,
}

impl MaterialControl {
    /// Create a new pending material control for a job
    pub fn new(job_id: EntityId, material_type: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Matc),
            job_id,
            inspector: None,
            material_type: material_type.into(),
            supplier: None,
            batch_number: None,
            quantity_received: None,
            certificate_matches: false,
            visual_ok: false,
            dimensions_ok: None,
            status: MaterialStatus::Pending,
            notes: None,
            created: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_control_creation() {
        let mc = MaterialControl::new(EntityId::new(EntityPrefix::Job), "6082-T6 bar stock");
        assert!(mc.id.to_string().starts_with("MATC-"));
        assert_eq!(mc.status, MaterialStatus::Pending);
        assert!(mc.dimensions_ok.is_none());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "approved".parse::<MaterialStatus>().unwrap(),
            MaterialStatus::Approved
        );
        assert_eq!(
            "REJECTED".parse::<MaterialStatus>().unwrap(),
            MaterialStatus::Rejected
        );
        assert!("scrapped".parse::<MaterialStatus>().is_err());
    }
}
