//! Exit-control sampler
//!
//! Computes which serialized units of a lot get inspected at shipment and
//! aggregates per-unit verdicts into the lot verdict. The sampling plan is
//! a fixed deterministic scheme, not an AQL table: the first five units,
//! then every 10th unit starting at 15. Units 6-14 are never part of the
//! base plan.

use chrono::Utc;
use rusqlite::Connection;

use crate::core::audit;
use crate::core::error::EngineError;
use crate::core::identity::EntityId;
use crate::core::store::{self, QualityStore};
use crate::entities::exit_control::{ExitControl, ExitControlSample, LotStatus};
use crate::entities::job::WorkflowStage;

/// The base sampling plan for a lot: `1..=min(5, n)`, then `15, 25, 35, ...`
/// up to and including `n` when `n > 5`.
pub fn sample_positions(lot_quantity: u32) -> Vec<u32> {
    let mut positions: Vec<u32> = (1..=lot_quantity.min(5)).collect();
    if lot_quantity > 5 {
        let mut position = 15;
        while position <= lot_quantity {
            positions.push(position);
            position += 10;
        }
    }
    positions
}

/// Outcome of recording one sample
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub sample: ExitControlSample,
    pub lot_status: LotStatus,
    /// True when this recording pushed the parent job to `complete`
    pub job_completed: bool,
}

/// Create an exit control for a job, materializing the base sampling plan
pub fn create(
    store: &mut QualityStore,
    job_id: &EntityId,
    lot_quantity: u32,
    inspector: &str,
    notes: Option<String>,
) -> Result<(ExitControl, usize), EngineError> {
    if lot_quantity == 0 {
        return Err(EngineError::validation("lot quantity must be positive"));
    }

    let tx = store.transaction()?;
    if store::find_job(&tx, job_id)?.is_none() {
        return Err(EngineError::not_found("job", job_id));
    }

    let mut ec = ExitControl::new(job_id.clone(), lot_quantity);
    ec.inspector = Some(inspector.to_string());
    ec.notes = notes;
    store::insert_exit_control(&tx, &ec)?;

    let positions = sample_positions(lot_quantity);
    for position in &positions {
        store::insert_sample(&tx, &ExitControlSample::new(ec.id.clone(), *position))?;
    }

    audit::record(
        &tx,
        Some(inspector),
        "create",
        "exit_control",
        &ec.id.to_string(),
        &format!("Exit control with {} samples to inspect", positions.len()),
    )?;

    tx.commit().map_err(store::StoreError::from)?;
    Ok((ec, positions.len()))
}

/// Manually add extra sample positions to an existing lot.
///
/// Every position must lie within `1..=lot_quantity`; a position already
/// in the plan is rejected.
pub fn add_samples(
    store: &mut QualityStore,
    exit_control_id: &EntityId,
    positions: &[u32],
) -> Result<usize, EngineError> {
    let tx = store.transaction()?;
    let ec = store::find_exit_control(&tx, exit_control_id)?
        .ok_or_else(|| EngineError::not_found("exit control", exit_control_id))?;

    for &position in positions {
        if position < 1 || position > ec.lot_quantity {
            return Err(EngineError::validation(format!(
                "position {} is outside the lot (1..={})",
                position, ec.lot_quantity
            )));
        }
        if store::find_sample_by_position(&tx, exit_control_id, position)?.is_some() {
            return Err(EngineError::validation(format!(
                "position {} is already sampled",
                position
            )));
        }
        store::insert_sample(&tx, &ExitControlSample::new(ec.id.clone(), position))?;
    }

    tx.commit().map_err(store::StoreError::from)?;
    Ok(positions.len())
}

/// Record the inspection result for one sample: the overall verdict is the
/// strict AND of the three sub-checks. The lot verdict is recomputed in
/// the same transaction.
pub fn record_sample(
    store: &mut QualityStore,
    sample_id: &EntityId,
    dimensions_ok: bool,
    visual_ok: bool,
    surface_ok: bool,
    notes: Option<String>,
    actor: &str,
) -> Result<RecordOutcome, EngineError> {
    let tx = store.transaction()?;
    let mut sample = store::find_sample(&tx, sample_id)?
        .ok_or_else(|| EngineError::not_found("sample", sample_id))?;

    sample.dimensions_ok = Some(dimensions_ok);
    sample.visual_ok = Some(visual_ok);
    sample.surface_ok = Some(surface_ok);
    sample.overall_pass = Some(dimensions_ok && visual_ok && surface_ok);
    sample.notes = notes;
    sample.inspected_at = Some(Utc::now());
    store::update_sample(&tx, &sample)?;

    let ec = store::find_exit_control(&tx, &sample.exit_control_id)?
        .ok_or_else(|| EngineError::not_found("exit control", &sample.exit_control_id))?;
    let (lot_status, job_completed) = recompute_lot_verdict(&tx, &ec, actor)?;

    tx.commit().map_err(store::StoreError::from)?;
    Ok(RecordOutcome {
        sample,
        lot_status,
        job_completed,
    })
}

/// Recompute the lot verdict from its samples.
///
/// With any sample unrecorded the lot stays in progress. Once every sample
/// has a verdict the lot becomes passed (all passed) or failed. A passing
/// lot completes the parent job, but only if the job is still in
/// `exit_control`; a job already moved elsewhere is left alone.
pub fn recompute_lot_verdict(
    conn: &Connection,
    ec: &ExitControl,
    actor: &str,
) -> Result<(LotStatus, bool), EngineError> {
    let samples = store::list_samples(conn, &ec.id)?;
    if samples.iter().any(|s| !s.is_recorded()) {
        return Ok((LotStatus::InProgress, false));
    }

    let all_passed = samples.iter().all(|s| s.overall_pass == Some(true));
    let status = if all_passed {
        LotStatus::Passed
    } else {
        LotStatus::Failed
    };
    store::update_lot_status(conn, &ec.id, status)?;

    let mut job_completed = false;
    if all_passed {
        job_completed = complete_job_if_in_exit_control(conn, &ec.job_id, actor)?;
    }
    Ok((status, job_completed))
}

/// Explicitly finalize an exit control.
///
/// Fails with [`EngineError::IncompleteSampling`] while any sample lacks a
/// verdict; otherwise applies the same verdict logic as automatic
/// recomputation.
pub fn complete(
    store: &mut QualityStore,
    exit_control_id: &EntityId,
    actor: &str,
) -> Result<(LotStatus, bool), EngineError> {
    let tx = store.transaction()?;
    let ec = store::find_exit_control(&tx, exit_control_id)?
        .ok_or_else(|| EngineError::not_found("exit control", exit_control_id))?;

    let samples = store::list_samples(&tx, &ec.id)?;
    let missing = samples.iter().filter(|s| !s.is_recorded()).count();
    if missing > 0 {
        return Err(EngineError::IncompleteSampling {
            id: ec.id.to_string(),
            missing,
        });
    }

    let (status, job_completed) = recompute_lot_verdict(&tx, &ec, actor)?;
    audit::record(
        &tx,
        Some(actor),
        "completed",
        "exit_control",
        &ec.id.to_string(),
        &format!("Status: {}", status),
    )?;

    tx.commit().map_err(store::StoreError::from)?;
    Ok((status, job_completed))
}

/// Complete the job's lifecycle iff it is still at exit control; returns
/// whether a transition happened.
fn complete_job_if_in_exit_control(
    conn: &Connection,
    job_id: &EntityId,
    actor: &str,
) -> Result<bool, EngineError> {
    let job = store::find_job(conn, job_id)?
        .ok_or_else(|| EngineError::not_found("job", job_id))?;
    if job.workflow_stage != WorkflowStage::ExitControl {
        return Ok(false);
    }

    store::update_job_stage(conn, job_id, WorkflowStage::Complete, Some(Utc::now()))?;
    audit::record(
        conn,
        Some(actor),
        "status_change",
        "job",
        &job_id.to_string(),
        &format!(
            "Changed stage from {} to {} (exit control passed)",
            WorkflowStage::ExitControl,
            WorkflowStage::Complete
        ),
    )?;
    Ok(true)
}
