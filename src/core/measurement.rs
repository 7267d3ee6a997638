//! Measurement report intake
//!
//! Takes a batch of measured values for a job's dimensions, scores each
//! one through the tolerance evaluator, and derives the report verdict.
//! The report status is never set directly by a user.

use crate::core::audit;
use crate::core::error::EngineError;
use crate::core::identity::EntityId;
use crate::core::store::{self, QualityStore};
use crate::core::tolerance;
use crate::entities::measurement::{Measurement, MeasurementReport, ReportKind, ReportStatus};

/// One measured value to record
#[derive(Debug, Clone)]
pub struct MeasurementEntry {
    pub dimension_id: EntityId,
    pub actual_value: f64,
    pub sample_number: u32,
    pub equipment: Option<String>,
    pub notes: Option<String>,
}

impl MeasurementEntry {
    pub fn new(dimension_id: EntityId, actual_value: f64) -> Self {
        Self {
            dimension_id,
            actual_value,
            sample_number: 1,
            equipment: None,
            notes: None,
        }
    }
}

/// Create a measurement report for a job from a batch of entries.
///
/// Every entry's dimension must belong to the job. The report verdict is
/// `fail` if any measurement fails, `pass` if all pass, and `pending`
/// when no measurements were recorded at all.
pub fn create_report(
    store: &mut QualityStore,
    job_id: &EntityId,
    kind: ReportKind,
    entries: &[MeasurementEntry],
    inspector: &str,
    notes: Option<String>,
) -> Result<MeasurementReport, EngineError> {
    let tx = store.transaction()?;
    let job = store::find_job(&tx, job_id)?
        .ok_or_else(|| EngineError::not_found("job", job_id))?;

    let dimensions = store::list_dimensions(&tx, job_id)?;
    if dimensions.is_empty() {
        return Err(EngineError::validation(
            "job has no dimensions; add dimensions before recording measurements",
        ));
    }

    let mut report = MeasurementReport::new(job_id.clone(), kind);
    report.inspector = Some(inspector.to_string());
    report.notes = notes;
    store::insert_measurement_report(&tx, &report)?;

    let mut any_fail = false;
    for entry in entries {
        let dimension = dimensions
            .iter()
            .find(|d| d.id == entry.dimension_id)
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "dimension {} does not belong to job {}",
                    entry.dimension_id, job.job_number
                ))
            })?;

        let verdict = tolerance::evaluate(dimension, entry.actual_value);
        if !verdict.is_pass() {
            any_fail = true;
        }

        let mut measurement =
            Measurement::new(report.id.clone(), dimension.id.clone(), entry.actual_value, verdict);
        measurement.sample_number = entry.sample_number;
        measurement.equipment = entry.equipment.clone();
        measurement.measured_by = Some(inspector.to_string());
        measurement.notes = entry.notes.clone();
        store::insert_measurement(&tx, &measurement)?;
    }

    report.overall_status = if entries.is_empty() {
        ReportStatus::Pending
    } else if any_fail {
        ReportStatus::Fail
    } else {
        ReportStatus::Pass
    };
    store::update_report_status(&tx, &report.id, report.overall_status)?;

    audit::record(
        &tx,
        Some(inspector),
        "create",
        "measurement_report",
        &report.id.to_string(),
        &format!("Created {} measurement report for job {}", report.kind, job.job_number),
    )?;

    tx.commit().map_err(store::StoreError::from)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lifecycle::{self, NewDimension, NewJob};
    use crate::entities::dimension::GO_NOGO_UNIT;
    use crate::entities::measurement::PassFail;

    fn setup() -> (QualityStore, EntityId, Vec<crate::entities::dimension::JobDimension>) {
        let mut store = QualityStore::open_in_memory().unwrap();
        let job = lifecycle::create_job(
            &mut store,
            NewJob {
                po_number: "PO-1".to_string(),
                part_number: "X-1".to_string(),
                quantity: 10,
                dimensions: vec![
                    NewDimension {
                        name: "bore".to_string(),
                        nominal: 10.0,
                        tolerance_plus: Some(0.1),
                        tolerance_minus: Some(-0.1),
                        ..Default::default()
                    },
                    NewDimension {
                        name: "thread gauge".to_string(),
                        nominal: 0.0,
                        unit: GO_NOGO_UNIT.to_string(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
            "tester",
        )
        .unwrap();
        let dims = store::list_dimensions(store.conn(), &job.id).unwrap();
        (store, job.id, dims)
    }

    #[test]
    fn test_all_pass_report() {
        let (mut store, job_id, dims) = setup();
        let entries = vec![
            MeasurementEntry::new(dims[0].id.clone(), 10.05),
            MeasurementEntry::new(dims[1].id.clone(), 1.0),
        ];
        let report = create_report(
            &mut store,
            &job_id,
            ReportKind::InProcess,
            &entries,
            "inspector1",
            None,
        )
        .unwrap();
        assert_eq!(report.overall_status, ReportStatus::Pass);

        let measurements = store::list_measurements(store.conn(), &report.id).unwrap();
        assert_eq!(measurements.len(), 2);
        assert!(measurements.iter().all(|m| m.pass_fail == PassFail::Pass));
    }

    #[test]
    fn test_one_fail_fails_report() {
        let (mut store, job_id, dims) = setup();
        let entries = vec![
            MeasurementEntry::new(dims[0].id.clone(), 10.05),
            MeasurementEntry::new(dims[1].id.clone(), 0.0), // gauge no-go
        ];
        let report = create_report(
            &mut store,
            &job_id,
            ReportKind::Final,
            &entries,
            "inspector1",
            None,
        )
        .unwrap();
        assert_eq!(report.overall_status, ReportStatus::Fail);
    }

    #[test]
    fn test_empty_report_stays_pending() {
        let (mut store, job_id, _) = setup();
        let report = create_report(
            &mut store,
            &job_id,
            ReportKind::Incoming,
            &[],
            "inspector1",
            None,
        )
        .unwrap();
        assert_eq!(report.overall_status, ReportStatus::Pending);
    }

    #[test]
    fn test_multiple_samples_per_dimension() {
        let (mut store, job_id, dims) = setup();
        let mut first = MeasurementEntry::new(dims[0].id.clone(), 10.0);
        first.sample_number = 1;
        let mut second = MeasurementEntry::new(dims[0].id.clone(), 10.08);
        second.sample_number = 2;

        let report = create_report(
            &mut store,
            &job_id,
            ReportKind::InProcess,
            &[first, second],
            "inspector1",
            None,
        )
        .unwrap();
        let measurements = store::list_measurements(store.conn(), &report.id).unwrap();
        assert_eq!(measurements.len(), 2);
        assert_eq!(measurements[0].sample_number, 1);
        assert_eq!(measurements[1].sample_number, 2);
    }

    #[test]
    fn test_foreign_dimension_rejected() {
        let (mut store, job_id, _) = setup();
        let foreign = EntityId::new(crate::core::identity::EntityPrefix::Dim);
        let err = create_report(
            &mut store,
            &job_id,
            ReportKind::InProcess,
            &[MeasurementEntry::new(foreign, 1.0)],
            "inspector1",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_job_without_dimensions_rejected() {
        let mut store = QualityStore::open_in_memory().unwrap();
        let job = lifecycle::create_job(
            &mut store,
            NewJob {
                po_number: "PO-9".to_string(),
                part_number: "X-9".to_string(),
                quantity: 1,
                ..Default::default()
            },
            "t",
        )
        .unwrap();
        let err = create_report(&mut store, &job.id, ReportKind::Final, &[], "i", None).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
