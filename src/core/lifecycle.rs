//! Job lifecycle state machine
//!
//! Owns the workflow stage of a job and its side effects. The pipeline is
//! bookkeeping, not order enforcement: any recognized stage is a legal
//! explicit transition target, which is what makes rework loops possible.
//! The one derived invariant is completion stamping: `completed_at` is set
//! if and only if the stage is `complete`.

use chrono::Utc;

use crate::core::audit;
use crate::core::error::EngineError;
use crate::core::identity::EntityId;
use crate::core::registry;
use crate::core::store::{self, QualityStore};
use crate::entities::dimension::JobDimension;
use crate::entities::job::{Job, WorkflowStage};

/// Input for creating a job at PO receipt
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub po_number: String,
    pub customer: Option<String>,
    pub part_number: String,
    pub part_revision: Option<String>,
    pub part_description: Option<String>,
    pub quantity: u32,
    pub due_date: Option<chrono::NaiveDate>,
    pub drawing_number: Option<String>,
    pub special_requirements: Option<String>,
    pub dimensions: Vec<NewDimension>,
}

/// Input for one dimension
#[derive(Debug, Clone)]
pub struct NewDimension {
    pub name: String,
    pub nominal: f64,
    pub tolerance_plus: Option<f64>,
    pub tolerance_minus: Option<f64>,
    pub unit: String,
    pub drawing_reference: Option<String>,
    pub critical: bool,
}

impl Default for NewDimension {
    fn default() -> Self {
        Self {
            name: String::new(),
            nominal: 0.0,
            tolerance_plus: None,
            tolerance_minus: None,
            unit: "mm".to_string(),
            drawing_reference: None,
            critical: false,
        }
    }
}

/// Create a job, resolving its part identity through the registry and
/// materializing any initial dimensions. Returns the stored job.
pub fn create_job(
    store: &mut QualityStore,
    input: NewJob,
    actor: &str,
) -> Result<Job, EngineError> {
    if input.po_number.trim().is_empty() {
        return Err(EngineError::validation("PO number must not be empty"));
    }
    if input.quantity == 0 {
        return Err(EngineError::validation("quantity must be positive"));
    }

    let tx = store.transaction()?;

    let (part_id, _was_created) = registry::resolve_or_create(
        &tx,
        &input.part_number,
        input.part_revision.as_deref(),
        input.part_description.as_deref(),
    )?;

    let job_number = next_job_number(&tx)?;
    let mut job = Job::new(
        input.po_number.trim(),
        job_number,
        part_id,
        input.part_number.trim(),
        input.part_revision.as_deref().unwrap_or("").trim(),
        input.quantity,
    );
    job.customer = input.customer;
    job.part_description = input.part_description;
    job.due_date = input.due_date;
    job.drawing_number = input.drawing_number;
    job.special_requirements = input.special_requirements;
    store::insert_job(&tx, &job)?;

    for (i, spec) in input.dimensions.iter().enumerate() {
        if spec.name.trim().is_empty() {
            return Err(EngineError::validation("dimension name must not be empty"));
        }
        let mut dim = JobDimension::new(job.id.clone(), i as u32 + 1, spec.name.trim(), spec.nominal);
        dim.tolerance_plus = spec.tolerance_plus;
        dim.tolerance_minus = spec.tolerance_minus;
        dim.unit = spec.unit.clone();
        dim.drawing_reference = spec.drawing_reference.clone();
        dim.critical = spec.critical;
        store::insert_dimension(&tx, &dim)?;
    }

    audit::record(
        &tx,
        Some(actor),
        "create",
        "job",
        &job.id.to_string(),
        &format!("Created job {}", job.job_number),
    )?;

    tx.commit().map_err(store::StoreError::from)?;
    Ok(job)
}

/// Generate the next internal job number ("JOB00001", "JOB00002", ...)
pub fn next_job_number(conn: &rusqlite::Connection) -> Result<String, EngineError> {
    let max = store::max_job_number(conn)?;
    Ok(format!("JOB{:05}", max + 1))
}

/// Transition a job to a new workflow stage.
///
/// Entering `complete` stamps `completed_at`; any transition away from
/// `complete` clears it. The transition is recorded in the audit trail.
pub fn set_stage(
    store: &mut QualityStore,
    job_id: &EntityId,
    new_stage: WorkflowStage,
    actor: &str,
) -> Result<Job, EngineError> {
    let tx = store.transaction()?;
    let job = store::find_job(&tx, job_id)?
        .ok_or_else(|| EngineError::not_found("job", job_id))?;
    let old_stage = job.workflow_stage;

    let completed_at = if new_stage == WorkflowStage::Complete {
        Some(Utc::now())
    } else {
        None
    };
    store::update_job_stage(&tx, job_id, new_stage, completed_at)?;

    audit::record(
        &tx,
        Some(actor),
        "status_change",
        "job",
        &job_id.to_string(),
        &format!("Changed stage from {} to {}", old_stage, new_stage),
    )?;

    let updated = store::find_job(&tx, job_id)?
        .ok_or_else(|| EngineError::not_found("job", job_id))?;
    tx.commit().map_err(store::StoreError::from)?;
    Ok(updated)
}

/// Mark the drawing revision as verified against the PO.
///
/// Conceptually one-way; re-running refreshes the actor and timestamp.
/// Never changes the workflow stage.
pub fn verify_revision(
    store: &mut QualityStore,
    job_id: &EntityId,
    actor: &str,
) -> Result<Job, EngineError> {
    let tx = store.transaction()?;
    if store::find_job(&tx, job_id)?.is_none() {
        return Err(EngineError::not_found("job", job_id));
    }

    store::update_job_revision_verified(&tx, job_id, actor, Utc::now())?;
    audit::record(
        &tx,
        Some(actor),
        "update",
        "job",
        &job_id.to_string(),
        "Verified drawing revision",
    )?;

    let updated = store::find_job(&tx, job_id)?
        .ok_or_else(|| EngineError::not_found("job", job_id))?;
    tx.commit().map_err(store::StoreError::from)?;
    Ok(updated)
}

/// Add a dimension to a job at the next free sequence number
pub fn add_dimension(
    store: &mut QualityStore,
    job_id: &EntityId,
    spec: NewDimension,
) -> Result<JobDimension, EngineError> {
    if spec.name.trim().is_empty() {
        return Err(EngineError::validation("dimension name must not be empty"));
    }

    let tx = store.transaction()?;
    if store::find_job(&tx, job_id)?.is_none() {
        return Err(EngineError::not_found("job", job_id));
    }

    let number = store::next_dimension_number(&tx, job_id)?;
    let mut dim = JobDimension::new(job_id.clone(), number, spec.name.trim(), spec.nominal);
    dim.tolerance_plus = spec.tolerance_plus;
    dim.tolerance_minus = spec.tolerance_minus;
    dim.unit = spec.unit;
    dim.drawing_reference = spec.drawing_reference;
    dim.critical = spec.critical;
    store::insert_dimension(&tx, &dim)?;

    tx.commit().map_err(store::StoreError::from)?;
    Ok(dim)
}

/// Replace a job's dimensions with copies from another job, preserving the
/// source's sequence numbers. Returns how many were copied.
pub fn copy_dimensions(
    store: &mut QualityStore,
    target_job_id: &EntityId,
    source_job_id: &EntityId,
) -> Result<usize, EngineError> {
    let tx = store.transaction()?;
    if store::find_job(&tx, target_job_id)?.is_none() {
        return Err(EngineError::not_found("job", target_job_id));
    }
    let source_dims = store::list_dimensions(&tx, source_job_id)?;
    if source_dims.is_empty() {
        return Err(EngineError::validation("source job has no dimensions"));
    }

    store::delete_dimensions(&tx, target_job_id)?;
    for src in &source_dims {
        let mut dim = JobDimension::new(
            target_job_id.clone(),
            src.dimension_number,
            src.name.clone(),
            src.nominal,
        );
        dim.tolerance_plus = src.tolerance_plus;
        dim.tolerance_minus = src.tolerance_minus;
        dim.unit = src.unit.clone();
        dim.drawing_reference = src.drawing_reference.clone();
        dim.critical = src.critical;
        store::insert_dimension(&tx, &dim)?;
    }

    tx.commit().map_err(store::StoreError::from)?;
    Ok(source_dims.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job(part: &str) -> NewJob {
        NewJob {
            po_number: "PO-1".to_string(),
            part_number: part.to_string(),
            part_revision: Some("A".to_string()),
            quantity: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_job_generates_sequential_numbers() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let a = create_job(&mut store, new_job("X-1"), "tester").unwrap();
        let b = create_job(&mut store, new_job("X-2"), "tester").unwrap();
        assert_eq!(a.job_number, "JOB00001");
        assert_eq!(b.job_number, "JOB00002");
        assert_eq!(a.workflow_stage, WorkflowStage::PoReceipt);
    }

    #[test]
    fn test_create_job_reuses_part_identity() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let a = create_job(&mut store, new_job("X-1"), "tester").unwrap();
        let b = create_job(&mut store, new_job("X-1"), "tester").unwrap();
        assert_eq!(a.part_id, b.part_id);
    }

    #[test]
    fn test_create_job_validates_input() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let mut no_qty = new_job("X-1");
        no_qty.quantity = 0;
        assert!(matches!(
            create_job(&mut store, no_qty, "t").unwrap_err(),
            EngineError::Validation(_)
        ));

        let mut no_po = new_job("X-1");
        no_po.po_number = " ".to_string();
        assert!(matches!(
            create_job(&mut store, no_po, "t").unwrap_err(),
            EngineError::Validation(_)
        ));
    }

    #[test]
    fn test_set_stage_complete_stamps_and_clears() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let job = create_job(&mut store, new_job("X-1"), "tester").unwrap();

        let done = set_stage(&mut store, &job.id, WorkflowStage::Complete, "tester").unwrap();
        assert_eq!(done.workflow_stage, WorkflowStage::Complete);
        assert!(done.completed_at.is_some());
        assert!(done.completion_consistent());

        // Rework: moving away from complete clears the stamp
        let back = set_stage(&mut store, &job.id, WorkflowStage::ExitControl, "tester").unwrap();
        assert_eq!(back.workflow_stage, WorkflowStage::ExitControl);
        assert!(back.completed_at.is_none());
        assert!(back.completion_consistent());
    }

    #[test]
    fn test_set_stage_allows_backward_moves() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let job = create_job(&mut store, new_job("X-1"), "tester").unwrap();

        set_stage(&mut store, &job.id, WorkflowStage::InProcess, "t").unwrap();
        let back = set_stage(&mut store, &job.id, WorkflowStage::MaterialControl, "t").unwrap();
        assert_eq!(back.workflow_stage, WorkflowStage::MaterialControl);
    }

    #[test]
    fn test_set_stage_records_audit() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let job = create_job(&mut store, new_job("X-1"), "tester").unwrap();
        set_stage(&mut store, &job.id, WorkflowStage::OnHold, "inspector1").unwrap();

        let entries = audit::history(store.conn(), "job", &job.id.to_string()).unwrap();
        let status_changes: Vec<_> = entries
            .iter()
            .filter(|e| e.action == "status_change")
            .collect();
        assert_eq!(status_changes.len(), 1);
        assert_eq!(status_changes[0].actor.as_deref(), Some("inspector1"));
        assert!(status_changes[0]
            .description
            .as_deref()
            .unwrap()
            .contains("po_receipt to on_hold"));
    }

    #[test]
    fn test_set_stage_missing_job() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let id = EntityId::new(crate::core::identity::EntityPrefix::Job);
        assert!(matches!(
            set_stage(&mut store, &id, WorkflowStage::Complete, "t").unwrap_err(),
            EngineError::NotFound { .. }
        ));
    }

    #[test]
    fn test_verify_revision_sets_flag_without_stage_change() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let job = create_job(&mut store, new_job("X-1"), "tester").unwrap();
        set_stage(&mut store, &job.id, WorkflowStage::RevisionCheck, "t").unwrap();

        let verified = verify_revision(&mut store, &job.id, "inspector1").unwrap();
        assert!(verified.revision_verified);
        assert_eq!(verified.revision_verified_by.as_deref(), Some("inspector1"));
        assert!(verified.revision_verified_at.is_some());
        assert_eq!(verified.workflow_stage, WorkflowStage::RevisionCheck);

        // Re-running refreshes the record rather than failing
        let again = verify_revision(&mut store, &job.id, "inspector2").unwrap();
        assert_eq!(again.revision_verified_by.as_deref(), Some("inspector2"));
    }

    #[test]
    fn test_add_dimension_numbering_skips_gaps() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let mut input = new_job("X-1");
        input.dimensions = vec![
            NewDimension {
                name: "bore".to_string(),
                nominal: 10.0,
                ..Default::default()
            },
            NewDimension {
                name: "length".to_string(),
                nominal: 50.0,
                ..Default::default()
            },
        ];
        let job = create_job(&mut store, input, "t").unwrap();

        let added = add_dimension(
            &mut store,
            &job.id,
            NewDimension {
                name: "depth".to_string(),
                nominal: 5.0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(added.dimension_number, 3);
    }

    #[test]
    fn test_copy_dimensions_replaces_target_set() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let mut source_input = new_job("X-1");
        source_input.dimensions = vec![NewDimension {
            name: "bore".to_string(),
            nominal: 10.0,
            ..Default::default()
        }];
        let source = create_job(&mut store, source_input, "t").unwrap();
        let target = create_job(&mut store, new_job("X-2"), "t").unwrap();
        add_dimension(
            &mut store,
            &target.id,
            NewDimension {
                name: "old".to_string(),
                nominal: 1.0,
                ..Default::default()
            },
        )
        .unwrap();

        let copied = copy_dimensions(&mut store, &target.id, &source.id).unwrap();
        assert_eq!(copied, 1);

        let dims = store::list_dimensions(store.conn(), &target.id).unwrap();
        assert_eq!(dims.len(), 1);
        assert_eq!(dims[0].name, "bore");
    }

    #[test]
    fn test_copy_dimensions_requires_source_dims() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let source = create_job(&mut store, new_job("X-1"), "t").unwrap();
        let target = create_job(&mut store, new_job("X-2"), "t").unwrap();
        assert!(matches!(
            copy_dimensions(&mut store, &target.id, &source.id).unwrap_err(),
            EngineError::Validation(_)
        ));
    }
}
