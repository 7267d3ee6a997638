//! External process entity - outsourced manufacturing steps

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// External process status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ExternalStatus {
    /// Parts shipped to the supplier
    #[default]
    Sent,
    /// Parts returned, awaiting inspection
    Received,
    /// Inspection passed
    Approved,
    /// Inspection failed
    Rejected,
}

impl std::fmt::Display for ExternalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalStatus::Sent => write!(f, "sent"),
            ExternalStatus::Received => write!(f, "received"),
            ExternalStatus::Approved => write!(f, "approved"),
            ExternalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ExternalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sent" => Ok(ExternalStatus::Sent),
            "received" => Ok(ExternalStatus::Received),
            "approved" => Ok(ExternalStatus::Approved),
            "rejected" => Ok(ExternalStatus::Rejected),
            _ => Err(format!(
                "Invalid external process status: {}. Use sent, received, approved, or rejected",
                s
            )),
        }
    }
}

/// An outsourced process record (plating, coating, heat treatment, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalProcess {
    /// Unique identifier (EXTP-...)
    pub id: EntityId,

    /// Owning job (JOB-...)
    pub job_id: EntityId,

    /// Process type (e.g. "anodizing")
    pub process_type: String,

    /// Process description / specification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Supplier reference (collaborator-owned, referenced by name only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,

    /// Quantity sent out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_sent: Option<u32>,

    /// Date sent to the supplier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_date: Option<NaiveDate>,

    /// Date parts came back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_date: Option<NaiveDate>,

    /// Quantity received back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_received: Option<u32>,

    /// Who inspected the returned parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspected_by: Option<String>,

    /// When the returned parts were inspected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspection_date: Option<DateTime<Utc>>,

    /// Inspection notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspection_notes: Option<String>,

    /// Current status
    #[serde(default)]
    pub status: ExternalStatus,

    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last update timestamp
    pub updated: DateTime<Utc>,
}

impl ExternalProcess {
    /// Create a new external process record in the `sent` state
    pub fn new(job_id: EntityId, process_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Extp),
            job_id,
            process_type: process_type.into(),
            description: None,
            supplier: None,
            quantity_sent: None,
            sent_date: None,
            received_date: None,
            quantity_received: None,
            inspected_by: None,
            inspection_date: None,
            inspection_notes: None,
            status: ExternalStatus::Sent,
            notes: None,
            created: now,
            updated: now,
        }
    }
}
