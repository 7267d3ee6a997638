//! Job dimension entity - a measurable characteristic with tolerances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Unit string for binary go/no-go gauge checks
pub const GO_NOGO_UNIT: &str = "go/nogo";

/// A dimension to be measured on a job
///
/// Tolerances are stored signed: `tolerance_minus` is conventionally zero
/// or negative (a lower bound of nominal + tolerance_minus). Dimensions
/// are ordered by `dimension_number`, unique per job but not required to
/// stay contiguous after deletions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDimension {
    /// Unique identifier (DIM-...)
    pub id: EntityId,

    /// Owning job (JOB-...)
    pub job_id: EntityId,

    /// Sequence number within the job
    pub dimension_number: u32,

    /// Dimension name (e.g. "bore diameter")
    pub name: String,

    /// Nominal value
    pub nominal: f64,

    /// Plus tolerance (signed, conventionally >= 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_plus: Option<f64>,

    /// Minus tolerance (signed, conventionally <= 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_minus: Option<f64>,

    /// Unit of measure; `go/nogo` marks a binary gauge check
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Drawing zone reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_reference: Option<String>,

    /// Critical characteristic flag
    #[serde(default)]
    pub critical: bool,

    /// Creation timestamp
    pub created: DateTime<Utc>,
}

fn default_unit() -> String {
    "mm".to_string()
}

impl JobDimension {
    /// Create a new dimension for a job
    pub fn new(job_id: EntityId, dimension_number: u32, name: impl Into<String>, nominal: f64) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Dim),
            job_id,
            dimension_number,
            name: name.into(),
            nominal,
            tolerance_plus: None,
            tolerance_minus: None,
            unit: default_unit(),
            drawing_reference: None,
            critical: false,
            created: Utc::now(),
        }
    }

    /// Whether this dimension is a binary go/no-go gauge check
    pub fn is_go_nogo(&self) -> bool {
        self.unit == GO_NOGO_UNIT
    }

    /// Inclusive acceptance bounds, if both tolerances are defined
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match (self.tolerance_plus, self.tolerance_minus) {
            (Some(plus), Some(minus)) => Some((self.nominal + minus, self.nominal + plus)),
            _ => None,
        }
    }
}
