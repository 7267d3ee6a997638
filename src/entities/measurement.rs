//! Measurement report entities - dimensional inspection records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Kind of measurement report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ReportKind {
    Incoming,
    #[default]
    InProcess,
    Final,
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportKind::Incoming => write!(f, "incoming"),
            ReportKind::InProcess => write!(f, "in_process"),
            ReportKind::Final => write!(f, "final"),
        }
    }
}

impl std::str::FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incoming" => Ok(ReportKind::Incoming),
            "in_process" | "inprocess" => Ok(ReportKind::InProcess),
            "final" => Ok(ReportKind::Final),
            _ => Err(format!(
                "Invalid report kind: {}. Use incoming, in_process, or final",
                s
            )),
        }
    }
}

/// Overall status of a measurement report; computed, never user-set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ReportStatus {
    #[default]
    Pending,
    Pass,
    Fail,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Pending => write!(f, "pending"),
            ReportStatus::Pass => write!(f, "pass"),
            ReportStatus::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ReportStatus::Pending),
            "pass" => Ok(ReportStatus::Pass),
            "fail" => Ok(ReportStatus::Fail),
            _ => Err(format!(
                "Invalid report status: {}. Use pending, pass, or fail",
                s
            )),
        }
    }
}

/// Verdict of a single measurement against its dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassFail {
    Pass,
    Fail,
}

impl PassFail {
    pub fn is_pass(&self) -> bool {
        matches!(self, PassFail::Pass)
    }
}

impl std::fmt::Display for PassFail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassFail::Pass => write!(f, "pass"),
            PassFail::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for PassFail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pass" => Ok(PassFail::Pass),
            "fail" => Ok(PassFail::Fail),
            _ => Err(format!("Invalid verdict: {}. Use pass or fail", s)),
        }
    }
}

/// A measurement report grouping measurements taken in one sitting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementReport {
    /// Unique identifier (RPT-...)
    pub id: EntityId,

    /// Owning job (JOB-...)
    pub job_id: EntityId,

    /// Report kind
    #[serde(default)]
    pub kind: ReportKind,

    /// Inspector username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspector: Option<String>,

    /// Overall verdict, derived from the measurements
    #[serde(default)]
    pub overall_status: ReportStatus,

    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Creation timestamp
    pub created: DateTime<Utc>,
}

impl MeasurementReport {
    /// Create a new pending report
    pub fn new(job_id: EntityId, kind: ReportKind) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Rpt),
            job_id,
            kind,
            inspector: None,
            overall_status: ReportStatus::Pending,
            notes: None,
            created: Utc::now(),
        }
    }
}

/// A single measured value for one dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    /// Unique identifier (MEAS-...)
    pub id: EntityId,

    /// Owning report (RPT-...)
    pub report_id: EntityId,

    /// Measured dimension (DIM-...)
    pub dimension_id: EntityId,

    /// Actual measured value (1/0 for go/nogo gauges)
    pub actual_value: f64,

    /// Computed verdict
    pub pass_fail: PassFail,

    /// Measuring equipment reference (collaborator-owned)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,

    /// Sample number; several samples per dimension are allowed
    #[serde(default = "default_sample")]
    pub sample_number: u32,

    /// Who measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured_by: Option<String>,

    /// When measured
    pub measured_at: DateTime<Utc>,

    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_sample() -> u32 {
    1
}

impl Measurement {
    pub fn new(
        report_id: EntityId,
        dimension_id: EntityId,
        actual_value: f64,
        pass_fail: PassFail,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Meas),
            report_id,
            dimension_id,
            actual_value,
            pass_fail,
            equipment: None,
            sample_number: 1,
            measured_by: None,
            measured_at: Utc::now(),
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_creation() {
        let report = MeasurementReport::new(EntityId::new(EntityPrefix::Job), ReportKind::Final);
        assert!(report.id.to_string().starts_with("RPT-"));
        assert_eq!(report.overall_status, ReportStatus::Pending);
    }

    #[test]
    fn test_report_kind_parsing() {
        assert_eq!(
            "in_process".parse::<ReportKind>().unwrap(),
            ReportKind::InProcess
        );
        assert_eq!("final".parse::<ReportKind>().unwrap(), ReportKind::Final);
        assert!("outgoing".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_measurement_defaults() {
        let m = Measurement::new(
            EntityId::new(EntityPrefix::Rpt),
            EntityId::new(EntityPrefix::Dim),
            10.02,
            PassFail::Pass,
        );
        assert_eq!(m.sample_number, 1);
        assert!(m.pass_fail.is_pass());
    }
}
