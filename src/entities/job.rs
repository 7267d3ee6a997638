//! Job entity - one manufacturing order tracked through the QC pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Workflow stage of a job
///
/// The stages form a logically ordered pipeline, but transitions are not
/// restricted to forward-only: rework loops (e.g. back to material control
/// after a supplier issue) are legal. `OnHold` is reachable from any stage;
/// resuming is an explicit user-chosen transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum WorkflowStage {
    #[default]
    PoReceipt,
    RevisionCheck,
    MaterialControl,
    InProcess,
    ExternalProcess,
    ExitControl,
    Complete,
    OnHold,
}

impl WorkflowStage {
    /// All recognized stages, in pipeline order (OnHold last)
    pub fn all() -> &'static [WorkflowStage] {
        &[
            WorkflowStage::PoReceipt,
            WorkflowStage::RevisionCheck,
            WorkflowStage::MaterialControl,
            WorkflowStage::InProcess,
            WorkflowStage::ExternalProcess,
            WorkflowStage::ExitControl,
            WorkflowStage::Complete,
            WorkflowStage::OnHold,
        ]
    }
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStage::PoReceipt => write!(f, "po_receipt"),
            WorkflowStage::RevisionCheck => write!(f, "revision_check"),
            WorkflowStage::MaterialControl => write!(f, "material_control"),
            WorkflowStage::InProcess => write!(f, "in_process"),
            WorkflowStage::ExternalProcess => write!(f, "external_process"),
            WorkflowStage::ExitControl => write!(f, "exit_control"),
            WorkflowStage::Complete => write!(f, "complete"),
            WorkflowStage::OnHold => write!(f, "on_hold"),
        }
    }
}

impl std::str::FromStr for WorkflowStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "po_receipt" => Ok(WorkflowStage::PoReceipt),
            "revision_check" => Ok(WorkflowStage::RevisionCheck),
            "material_control" => Ok(WorkflowStage::MaterialControl),
            "in_process" => Ok(WorkflowStage::InProcess),
            "external_process" => Ok(WorkflowStage::ExternalProcess),
            "exit_control" => Ok(WorkflowStage::ExitControl),
            "complete" => Ok(WorkflowStage::Complete),
            "on_hold" => Ok(WorkflowStage::OnHold),
            _ => Err(format!(
                "Invalid workflow stage: {}. Use po_receipt, revision_check, material_control, \
                 in_process, external_process, exit_control, complete, or on_hold",
                s
            )),
        }
    }
}

/// A manufacturing job - the central aggregate of the QC pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier (JOB-...)
    pub id: EntityId,

    /// Customer purchase order number
    pub po_number: String,

    /// System-generated internal job number (e.g. "JOB00042"), unique
    pub job_number: String,

    /// Customer reference (collaborator-owned, referenced by name only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,

    /// Canonical part identity (PART-...), resolved via the part registry
    pub part_id: EntityId,

    /// Part number as shown on the job; kept consistent with the part record
    pub part_number: String,

    /// Part revision (empty string means unrevisioned)
    #[serde(default)]
    pub part_revision: String,

    /// Part description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_description: Option<String>,

    /// Order quantity (positive)
    pub quantity: u32,

    /// Due date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// Current workflow stage
    #[serde(default)]
    pub workflow_stage: WorkflowStage,

    /// Drawing number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_number: Option<String>,

    /// Special requirements noted at PO receipt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requirements: Option<String>,

    /// Whether the drawing revision has been verified against the PO
    #[serde(default)]
    pub revision_verified: bool,

    /// Who verified the revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_verified_by: Option<String>,

    /// When the revision was verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_verified_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last update timestamp
    pub updated: DateTime<Utc>,

    /// Completion timestamp; set if and only if the stage is `complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new job at PO receipt
    pub fn new(
        po_number: impl Into<String>,
        job_number: impl Into<String>,
        part_id: EntityId,
        part_number: impl Into<String>,
        part_revision: impl Into<String>,
        quantity: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Job),
            po_number: po_number.into(),
            job_number: job_number.into(),
            customer: None,
            part_id,
            part_number: part_number.into(),
            part_revision: part_revision.into(),
            part_description: None,
            quantity,
            due_date: None,
            workflow_stage: WorkflowStage::PoReceipt,
            drawing_number: None,
            special_requirements: None,
            revision_verified: false,
            revision_verified_by: None,
            revision_verified_at: None,
            created: now,
            updated: now,
            completed_at: None,
        }
    }

    /// Whether the job has reached the terminal stage
    pub fn is_complete(&self) -> bool {
        self.workflow_stage == WorkflowStage::Complete
    }

    /// Check the completed_at <-> stage invariant
    pub fn completion_consistent(&self) -> bool {
        self.is_complete() == self.completed_at.is_some()
    }
}
