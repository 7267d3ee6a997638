//! Part entity - canonical identity of a design at a specific revision

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// A canonical part identity
///
/// Identified by `(part_number, revision)`; the pair is unique in the
/// store. An absent revision and an empty-string revision are the same
/// identity. Identity fields are immutable once created; only the
/// description may change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    /// Unique identifier (PART-...)
    pub id: EntityId,

    /// Part number (e.g. "X-100")
    pub part_number: String,

    /// Revision; empty string for unrevisioned parts
    #[serde(default)]
    pub revision: String,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last update timestamp
    pub updated: DateTime<Utc>,
}

impl Part {
    /// Create a new part; the revision is normalized with [`normalize_revision`]
    pub fn new(part_number: impl Into<String>, revision: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Part),
            part_number: part_number.into(),
            revision: normalize_revision(revision),
            description: None,
            created: now,
            updated: now,
        }
    }
}

/// Normalize a revision: `None` and `""` are the same identity
pub fn normalize_revision(revision: Option<&str>) -> String {
    revision.map(|r| r.trim().to_string()).unwrap_or_default()
}
