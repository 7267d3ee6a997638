//! Exit control entities - final pre-shipment inspection of a sampled lot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Lot-level verdict of an exit control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum LotStatus {
    #[default]
    InProgress,
    Passed,
    Failed,
}

impl std::fmt::Display for LotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LotStatus::InProgress => write!(f, "in_progress"),
            LotStatus::Passed => write!(f, "passed"),
            LotStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for LotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" | "inprogress" => Ok(LotStatus::InProgress),
            "passed" => Ok(LotStatus::Passed),
            "failed" => Ok(LotStatus::Failed),
            _ => Err(format!(
                "Invalid lot status: {}. Use in_progress, passed, or failed",
                s
            )),
        }
    }
}

/// A final inspection of a completed lot before shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitControl {
    /// Unique identifier (EXIT-...)
    pub id: EntityId,

    /// Owning job (JOB-...)
    pub job_id: EntityId,

    /// Inspector username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspector: Option<String>,

    /// Number of physical units in the lot
    pub lot_quantity: u32,

    /// Lot verdict, derived from the samples
    #[serde(default)]
    pub overall_status: LotStatus,

    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Creation timestamp
    pub created: DateTime<Utc>,
}

impl ExitControl {
    /// Create a new in-progress exit control
    pub fn new(job_id: EntityId, lot_quantity: u32) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Exit),
            job_id,
            inspector: None,
            lot_quantity,
            overall_status: LotStatus::InProgress,
            notes: None,
            created: Utc::now(),
        }
    }
}

/// One sampled physical unit within an exit-control lot
///
/// `overall_pass` is derived: the strict AND of the three sub-checks,
/// None until the sample has been inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitControlSample {
    /// Unique identifier (SMP-...)
    pub id: EntityId,

    /// Owning exit control (EXIT-...)
    pub exit_control_id: EntityId,

    /// 1-based position of the unit within the lot
    pub position: u32,

    /// Dimensional check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions_ok: Option<bool>,

    /// Visual check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_ok: Option<bool>,

    /// Surface finish check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_ok: Option<bool>,

    /// Derived verdict; None until recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_pass: Option<bool>,

    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// When the sample was inspected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspected_at: Option<DateTime<Utc>>,
}

impl ExitControlSample {
    /// Create an uninspected sample at the given lot position
    pub fn new(exit_control_id: EntityId, position: u32) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Smp),
            exit_control_id,
            position,
            dimensions_ok: None,
            visual_ok: None,
            surface_ok: None,
            overall_pass: None,
            notes: None,
            inspected_at: None,
        }
    }

    /// Whether this sample has been inspected
    pub fn is_recorded(&self) -> bool {
        self.overall_pass.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_control_creation() {
        let ec = ExitControl::new(EntityId::new(EntityPrefix::Job), 25);
        assert!(ec.id.to_string().starts_with("EXIT-"));
        assert_eq!(ec.overall_status, LotStatus::InProgress);
        assert_eq!(ec.lot_quantity, 25);
    }

    #[test]
    fn test_sample_starts_unrecorded() {
        let smp = ExitControlSample::new(EntityId::new(EntityPrefix::Exit), 15);
        assert!(smp.id.to_string().starts_with("SMP-"));
        assert!(!smp.is_recorded());
        assert_eq!(smp.position, 15);
    }

    #[test]
    fn test_lot_status_parsing() {
        assert_eq!("passed".parse::<LotStatus>().unwrap(), LotStatus::Passed);
        assert_eq!(
            "in_progress".parse::<LotStatus>().unwrap(),
            LotStatus::InProgress
        );
        assert!("done".parse::<LotStatus>().is_err());
    }
}
