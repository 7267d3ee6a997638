//! Nonconformance and escalation engine
//!
//! Creates error reports (internal, material-supplier, external-supplier),
//! flips the originating inspection record to rejected, and fans
//! notifications out to quality-oversight users. The triggering write is
//! committed before any fan-out begins; per-recipient delivery failures
//! are tallied and swallowed, never propagated.

use chrono::{NaiveDate, Utc};

use crate::core::audit;
use crate::core::error::EngineError;
use crate::core::identity::EntityId;
use crate::core::notify::{self, Notification, NotificationSink, NotifyKind, NotifyOutcome};
use crate::core::roster::{quality_notification_users, RoleDirectory};
use crate::core::store::{self, QualityStore};
use crate::entities::error_report::{ErrorReport, ErrorStatus, ErrorType, Severity};
use crate::entities::external::{ExternalProcess, ExternalStatus};
use crate::entities::job::WorkflowStage;
use crate::entities::material::{MaterialControl, MaterialStatus};

/// Input for a new material control at incoming inspection
#[derive(Debug, Clone, Default)]
pub struct NewMaterialControl {
    pub material_type: String,
    pub supplier: Option<String>,
    pub batch_number: Option<String>,
    pub quantity_received: Option<String>,
    pub certificate_matches: bool,
    pub visual_ok: bool,
    pub dimensions_ok: Option<bool>,
    pub inspector: Option<String>,
    pub notes: Option<String>,
}

/// Input for a new external process record
#[derive(Debug, Clone, Default)]
pub struct NewExternalProcess {
    pub process_type: String,
    pub description: Option<String>,
    pub supplier: Option<String>,
    pub quantity_sent: Option<u32>,
    pub sent_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Origin of a supplier nonconformance: the inspection record that caught it
#[derive(Debug, Clone)]
pub enum SupplierOrigin {
    Material(EntityId),
    External(EntityId),
}

/// Record an incoming material inspection for a job
pub fn create_material_control(
    store: &mut QualityStore,
    job_id: &EntityId,
    input: NewMaterialControl,
    actor: &str,
) -> Result<MaterialControl, EngineError> {
    if input.material_type.trim().is_empty() {
        return Err(EngineError::validation("material type must not be empty"));
    }

    let tx = store.transaction()?;
    let job = store::find_job(&tx, job_id)?
        .ok_or_else(|| EngineError::not_found("job", job_id))?;

    let mut mc = MaterialControl::new(job_id.clone(), input.material_type.trim());
    mc.supplier = input.supplier;
    mc.batch_number = input.batch_number;
    mc.quantity_received = input.quantity_received;
    mc.certificate_matches = input.certificate_matches;
    mc.visual_ok = input.visual_ok;
    mc.dimensions_ok = input.dimensions_ok;
    mc.inspector = input.inspector;
    mc.notes = input.notes;
    store::insert_material_control(&tx, &mc)?;

    audit::record(
        &tx,
        Some(actor),
        "create",
        "material_control",
        &mc.id.to_string(),
        &format!("Material control for job {}", job.job_number),
    )?;

    tx.commit().map_err(store::StoreError::from)?;
    Ok(mc)
}

/// Set the inspection verdict of a material control.
///
/// Rejection fans a notification out to quality-oversight users after the
/// status write has committed.
pub fn set_material_status(
    store: &mut QualityStore,
    sink: &mut dyn NotificationSink,
    directory: &dyn RoleDirectory,
    mc_id: &EntityId,
    status: MaterialStatus,
    inspector: &str,
) -> Result<(MaterialControl, Option<NotifyOutcome>), EngineError> {
    let tx = store.transaction()?;
    let mc = store::find_material_control(&tx, mc_id)?
        .ok_or_else(|| EngineError::not_found("material control", mc_id))?;
    let job = store::find_job(&tx, &mc.job_id)?
        .ok_or_else(|| EngineError::not_found("job", &mc.job_id))?;

    store::update_material_status(&tx, mc_id, status, Some(inspector))?;
    audit::record(
        &tx,
        Some(inspector),
        "status_change",
        "material_control",
        &mc_id.to_string(),
        &format!("Changed status from {} to {}", mc.status, status),
    )?;
    tx.commit().map_err(store::StoreError::from)?;

    let outcome = if status == MaterialStatus::Rejected {
        let template = Notification::new(
            "",
            NotifyKind::MaterialRejected,
            format!("Material Rejected: {}", job.part_number),
            format!(
                "Material control for Job {} (PO {}) was rejected.",
                job.job_number, job.po_number
            ),
        )
        .linked_to("material_control", mc_id.to_string());
        Some(notify::fan_out(
            sink,
            &quality_notification_users(directory),
            &template,
        ))
    } else {
        None
    };

    let updated = store::find_material_control(store.conn(), mc_id)?
        .ok_or_else(|| EngineError::not_found("material control", mc_id))?;
    Ok((updated, outcome))
}

/// Record that parts have been sent to an external supplier
pub fn create_external_process(
    store: &mut QualityStore,
    job_id: &EntityId,
    input: NewExternalProcess,
    actor: &str,
) -> Result<ExternalProcess, EngineError> {
    if input.process_type.trim().is_empty() {
        return Err(EngineError::validation("process type must not be empty"));
    }

    let tx = store.transaction()?;
    let job = store::find_job(&tx, job_id)?
        .ok_or_else(|| EngineError::not_found("job", job_id))?;

    let mut ep = ExternalProcess::new(job_id.clone(), input.process_type.trim());
    ep.description = input.description;
    ep.supplier = input.supplier;
    ep.quantity_sent = input.quantity_sent;
    ep.sent_date = input.sent_date;
    ep.notes = input.notes;
    store::insert_external_process(&tx, &ep)?;

    audit::record(
        &tx,
        Some(actor),
        "create",
        "external_process",
        &ep.id.to_string(),
        &format!("External {} for job {}", ep.process_type, job.job_number),
    )?;

    tx.commit().map_err(store::StoreError::from)?;
    Ok(ep)
}

/// Record receipt of parts back from the external supplier
pub fn receive_external(
    store: &mut QualityStore,
    ep_id: &EntityId,
    received_date: NaiveDate,
    quantity_received: Option<u32>,
    actor: &str,
) -> Result<ExternalProcess, EngineError> {
    let tx = store.transaction()?;
    if store::find_external_process(&tx, ep_id)?.is_none() {
        return Err(EngineError::not_found("external process", ep_id));
    }

    store::update_external_received(&tx, ep_id, received_date, quantity_received)?;
    audit::record(
        &tx,
        Some(actor),
        "status_change",
        "external_process",
        &ep_id.to_string(),
        "Parts received back from supplier",
    )?;

    let updated = store::find_external_process(&tx, ep_id)?
        .ok_or_else(|| EngineError::not_found("external process", ep_id))?;
    tx.commit().map_err(store::StoreError::from)?;
    Ok(updated)
}

/// Record the inspection verdict on parts returned from an external
/// supplier. Only `approved` and `rejected` are inspection verdicts;
/// rejection fans a notification out after the write commits.
pub fn inspect_external(
    store: &mut QualityStore,
    sink: &mut dyn NotificationSink,
    directory: &dyn RoleDirectory,
    ep_id: &EntityId,
    status: ExternalStatus,
    inspector: &str,
    inspection_notes: Option<&str>,
) -> Result<(ExternalProcess, Option<NotifyOutcome>), EngineError> {
    if !matches!(status, ExternalStatus::Approved | ExternalStatus::Rejected) {
        return Err(EngineError::validation(
            "inspection verdict must be approved or rejected",
        ));
    }

    let tx = store.transaction()?;
    let ep = store::find_external_process(&tx, ep_id)?
        .ok_or_else(|| EngineError::not_found("external process", ep_id))?;
    let job = store::find_job(&tx, &ep.job_id)?
        .ok_or_else(|| EngineError::not_found("job", &ep.job_id))?;

    store::update_external_inspection(&tx, ep_id, status, inspector, inspection_notes)?;
    audit::record(
        &tx,
        Some(inspector),
        "status_change",
        "external_process",
        &ep_id.to_string(),
        &format!("Inspection verdict: {}", status),
    )?;
    tx.commit().map_err(store::StoreError::from)?;

    let outcome = if status == ExternalStatus::Rejected {
        let template = Notification::new(
            "",
            NotifyKind::ExternalRejected,
            format!("External Process Rejected: {}", job.part_number),
            format!(
                "External process for Job {} (PO {}) was rejected after inspection.",
                job.job_number, job.po_number
            ),
        )
        .linked_to("external_process", ep_id.to_string());
        Some(notify::fan_out(
            sink,
            &quality_notification_users(directory),
            &template,
        ))
    } else {
        None
    };

    let updated = store::find_external_process(store.conn(), ep_id)?
        .ok_or_else(|| EngineError::not_found("external process", ep_id))?;
    Ok((updated, outcome))
}

/// Raise an internal nonconformance against a job.
///
/// The report captures the job's current workflow stage; quality-oversight
/// users are notified after the report has committed.
pub fn report_internal(
    store: &mut QualityStore,
    sink: &mut dyn NotificationSink,
    directory: &dyn RoleDirectory,
    job_id: &EntityId,
    severity: Severity,
    description: &str,
    affected_quantity: Option<u32>,
    actor: &str,
) -> Result<(ErrorReport, NotifyOutcome), EngineError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(EngineError::validation("description must not be empty"));
    }

    let tx = store.transaction()?;
    let job = store::find_job(&tx, job_id)?
        .ok_or_else(|| EngineError::not_found("job", job_id))?;

    let mut er = ErrorReport::new(
        job_id.clone(),
        ErrorType::Internal,
        severity,
        job.workflow_stage,
        description,
    );
    er.reported_by = Some(actor.to_string());
    er.affected_quantity = affected_quantity;
    store::insert_error_report(&tx, &er)?;

    audit::record(
        &tx,
        Some(actor),
        "create",
        "error_report",
        &er.id.to_string(),
        &format!("Internal error for job {}", job.job_number),
    )?;
    tx.commit().map_err(store::StoreError::from)?;

    let outcome = notify_error_report(
        sink,
        directory,
        &er,
        format!("Internal Quality Issue: {}", job.part_number),
        format!(
            "Internal issue reported for Job {} (PO {}). Severity: {}",
            job.job_number, job.po_number, severity
        ),
    );
    Ok((er, outcome))
}

/// Raise a supplier nonconformance from the inspection record that caught
/// it. The supplier reference is copied from the origin; an origin not
/// already rejected is flipped to rejected (idempotent otherwise).
pub fn report_supplier(
    store: &mut QualityStore,
    sink: &mut dyn NotificationSink,
    directory: &dyn RoleDirectory,
    origin: &SupplierOrigin,
    severity: Severity,
    description: &str,
    affected_quantity: Option<u32>,
    actor: &str,
) -> Result<(ErrorReport, NotifyOutcome), EngineError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(EngineError::validation("description must not be empty"));
    }

    let tx = store.transaction()?;

    let (job, mut er) = match origin {
        SupplierOrigin::Material(mc_id) => {
            let mc = store::find_material_control(&tx, mc_id)?
                .ok_or_else(|| EngineError::not_found("material control", mc_id))?;
            let job = store::find_job(&tx, &mc.job_id)?
                .ok_or_else(|| EngineError::not_found("job", &mc.job_id))?;

            let mut er = ErrorReport::new(
                mc.job_id.clone(),
                ErrorType::MaterialSupplier,
                severity,
                WorkflowStage::MaterialControl,
                description,
            );
            er.supplier = mc.supplier.clone();
            er.material_control_id = Some(mc.id.clone());

            if mc.status != MaterialStatus::Rejected {
                store::update_material_status(&tx, mc_id, MaterialStatus::Rejected, None)?;
            }
            (job, er)
        }
        SupplierOrigin::External(ep_id) => {
            let ep = store::find_external_process(&tx, ep_id)?
                .ok_or_else(|| EngineError::not_found("external process", ep_id))?;
            let job = store::find_job(&tx, &ep.job_id)?
                .ok_or_else(|| EngineError::not_found("job", &ep.job_id))?;

            let mut er = ErrorReport::new(
                ep.job_id.clone(),
                ErrorType::ExternalSupplier,
                severity,
                WorkflowStage::ExternalProcess,
                description,
            );
            er.supplier = ep.supplier.clone();
            er.external_process_id = Some(ep.id.clone());

            if ep.status != ExternalStatus::Rejected {
                store::update_external_inspection(
                    &tx,
                    ep_id,
                    ExternalStatus::Rejected,
                    actor,
                    None,
                )?;
            }
            (job, er)
        }
    };

    er.reported_by = Some(actor.to_string());
    er.affected_quantity = affected_quantity;
    store::insert_error_report(&tx, &er)?;

    audit::record(
        &tx,
        Some(actor),
        "create",
        "error_report",
        &er.id.to_string(),
        &format!("{} error for job {}", er.error_type, job.job_number),
    )?;
    tx.commit().map_err(store::StoreError::from)?;

    let kind_word = match er.error_type {
        ErrorType::MaterialSupplier => "Material supplier",
        _ => "External process supplier",
    };
    let outcome = notify_error_report(
        sink,
        directory,
        &er,
        format!("New Quality Issue: {}", job.part_number),
        format!(
            "{} issue reported for PO {}. Severity: {}",
            kind_word, job.po_number, severity
        ),
    );
    Ok((er, outcome))
}

fn notify_error_report(
    sink: &mut dyn NotificationSink,
    directory: &dyn RoleDirectory,
    er: &ErrorReport,
    title: String,
    message: String,
) -> NotifyOutcome {
    let template = Notification::new("", NotifyKind::ErrorReport, title, message)
        .linked_to("error_report", er.id.to_string());
    notify::fan_out(sink, &quality_notification_users(directory), &template)
}

/// Transition an error report's workflow status.
///
/// Legal moves: open -> investigating | resolved, investigating ->
/// resolved, resolved -> closed, and any state -> open (reopen).
/// Resolving and closing stamp their date fields; reopening clears both.
/// Closing does not require disposition or root cause to be filled in.
pub fn set_error_status(
    store: &mut QualityStore,
    err_id: &EntityId,
    new_status: ErrorStatus,
    actor: &str,
) -> Result<ErrorReport, EngineError> {
    let tx = store.transaction()?;
    let er = store::find_error_report(&tx, err_id)?
        .ok_or_else(|| EngineError::not_found("error report", err_id))?;

    if !er.status.can_transition(new_status) {
        return Err(EngineError::InvalidErrorTransition {
            from: er.status,
            to: new_status,
        });
    }

    let now = Utc::now();
    let (resolved_date, closed_date) = match new_status {
        ErrorStatus::Open => (None, None),
        ErrorStatus::Investigating => (er.resolved_date, er.closed_date),
        ErrorStatus::Resolved => (Some(now), er.closed_date),
        ErrorStatus::Closed => (er.resolved_date, Some(now)),
    };
    store::update_error_status(&tx, err_id, new_status, resolved_date, closed_date)?;

    audit::record(
        &tx,
        Some(actor),
        "status_change",
        "error_report",
        &err_id.to_string(),
        &format!("Changed status from {} to {}", er.status, new_status),
    )?;

    let updated = store::find_error_report(&tx, err_id)?
        .ok_or_else(|| EngineError::not_found("error report", err_id))?;
    tx.commit().map_err(store::StoreError::from)?;
    Ok(updated)
}

/// Update the investigation fields of an error report
pub fn update_error_fields(
    store: &mut QualityStore,
    err_id: &EntityId,
    disposition: Option<&str>,
    root_cause: Option<&str>,
    corrective_action: Option<&str>,
    assigned_to: Option<&str>,
    actor: &str,
) -> Result<ErrorReport, EngineError> {
    let tx = store.transaction()?;
    if store::find_error_report(&tx, err_id)?.is_none() {
        return Err(EngineError::not_found("error report", err_id));
    }

    store::update_error_fields(&tx, err_id, disposition, root_cause, corrective_action, assigned_to)?;
    audit::record(
        &tx,
        Some(actor),
        "update",
        "error_report",
        &err_id.to_string(),
        "Updated investigation fields",
    )?;

    let updated = store::find_error_report(&tx, err_id)?
        .ok_or_else(|| EngineError::not_found("error report", err_id))?;
    tx.commit().map_err(store::StoreError::from)?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lifecycle::{self, NewJob};
    use crate::core::notify::MemorySink;
    use crate::core::roster::{QualityRoster, Role, RosterMember};
    use crate::entities::job::Job;

    fn roster() -> QualityRoster {
        let mut roster = QualityRoster::default();
        roster.add_member(RosterMember {
            name: "Jane Smith".to_string(),
            username: "jsmith".to_string(),
            email: None,
            roles: vec![Role::QualityManager],
            active: true,
        });
        roster.add_member(RosterMember {
            name: "Admin".to_string(),
            username: "admin".to_string(),
            email: None,
            roles: vec![Role::Admin],
            active: true,
        });
        roster
    }

    fn setup() -> (QualityStore, Job) {
        let mut store = QualityStore::open_in_memory().unwrap();
        let job = lifecycle::create_job(
            &mut store,
            NewJob {
                po_number: "PO-2025-117".to_string(),
                part_number: "X-100".to_string(),
                part_revision: Some("B".to_string()),
                quantity: 25,
                ..Default::default()
            },
            "tester",
        )
        .unwrap();
        (store, job)
    }

    fn pending_material(store: &mut QualityStore, job: &Job) -> MaterialControl {
        create_material_control(
            store,
            &job.id,
            NewMaterialControl {
                material_type: "6082-T6 bar stock".to_string(),
                supplier: Some("Acme Metals".to_string()),
                ..Default::default()
            },
            "tester",
        )
        .unwrap()
    }

    #[test]
    fn test_internal_report_notifies_quality_users() {
        let (mut store, job) = setup();
        let mut sink = MemorySink::default();

        let (er, outcome) = report_internal(
            &mut store,
            &mut sink,
            &roster(),
            &job.id,
            Severity::Major,
            "bore out of tolerance",
            Some(3),
            "inspector1",
        )
        .unwrap();

        assert_eq!(er.error_type, ErrorType::Internal);
        assert_eq!(er.status, ErrorStatus::Open);
        assert_eq!(er.workflow_stage, WorkflowStage::PoReceipt);
        assert_eq!(er.affected_quantity, Some(3));

        assert_eq!(outcome.delivered, 2);
        assert_eq!(sink.sent.len(), 2);
        assert!(sink.sent[0].title.contains("X-100"));
        assert_eq!(sink.sent[0].entity_id.as_deref(), Some(&*er.id.to_string()));
    }

    #[test]
    fn test_internal_report_requires_description() {
        let (mut store, job) = setup();
        let mut sink = MemorySink::default();
        let err = report_internal(
            &mut store,
            &mut sink,
            &roster(),
            &job.id,
            Severity::Minor,
            "  ",
            None,
            "i",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn test_supplier_report_flips_pending_material_to_rejected() {
        let (mut store, job) = setup();
        let mc = pending_material(&mut store, &job);
        let mut sink = MemorySink::default();

        let (er, _) = report_supplier(
            &mut store,
            &mut sink,
            &roster(),
            &SupplierOrigin::Material(mc.id.clone()),
            Severity::Critical,
            "wrong alloy delivered",
            None,
            "inspector1",
        )
        .unwrap();

        assert_eq!(er.error_type, ErrorType::MaterialSupplier);
        assert_eq!(er.supplier.as_deref(), Some("Acme Metals"));
        assert_eq!(er.material_control_id, Some(mc.id.clone()));
        assert_eq!(er.workflow_stage, WorkflowStage::MaterialControl);

        let mc = store::find_material_control(store.conn(), &mc.id)
            .unwrap()
            .unwrap();
        assert_eq!(mc.status, MaterialStatus::Rejected);
    }

    #[test]
    fn test_supplier_report_idempotent_on_rejected_origin() {
        let (mut store, job) = setup();
        let mc = pending_material(&mut store, &job);
        let mut sink = MemorySink::default();

        set_material_status(
            &mut store,
            &mut sink,
            &roster(),
            &mc.id,
            MaterialStatus::Rejected,
            "inspector1",
        )
        .unwrap();

        report_supplier(
            &mut store,
            &mut sink,
            &roster(),
            &SupplierOrigin::Material(mc.id.clone()),
            Severity::Major,
            "still the wrong alloy",
            None,
            "inspector1",
        )
        .unwrap();

        let mc = store::find_material_control(store.conn(), &mc.id)
            .unwrap()
            .unwrap();
        assert_eq!(mc.status, MaterialStatus::Rejected);
    }

    #[test]
    fn test_supplier_report_against_external_process() {
        let (mut store, job) = setup();
        let ep = create_external_process(
            &mut store,
            &job.id,
            NewExternalProcess {
                process_type: "anodizing".to_string(),
                supplier: Some("SurfaceCo".to_string()),
                ..Default::default()
            },
            "tester",
        )
        .unwrap();
        let mut sink = MemorySink::default();

        let (er, outcome) = report_supplier(
            &mut store,
            &mut sink,
            &roster(),
            &SupplierOrigin::External(ep.id.clone()),
            Severity::Major,
            "coating thickness out of spec",
            Some(10),
            "inspector1",
        )
        .unwrap();

        assert_eq!(er.error_type, ErrorType::ExternalSupplier);
        assert_eq!(er.supplier.as_deref(), Some("SurfaceCo"));
        assert_eq!(er.external_process_id, Some(ep.id.clone()));
        assert_eq!(outcome.delivered, 2);

        let ep = store::find_external_process(store.conn(), &ep.id)
            .unwrap()
            .unwrap();
        assert_eq!(ep.status, ExternalStatus::Rejected);
    }

    #[test]
    fn test_notification_failure_does_not_fail_report() {
        let (mut store, job) = setup();
        let mut sink = MemorySink {
            fail_all: true,
            ..Default::default()
        };

        let (er, outcome) = report_internal(
            &mut store,
            &mut sink,
            &roster(),
            &job.id,
            Severity::Minor,
            "scratch on face",
            None,
            "i",
        )
        .unwrap();

        // Report committed even though every delivery failed
        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.failed, 2);
        assert!(store::find_error_report(store.conn(), &er.id)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_material_rejection_notifies() {
        let (mut store, job) = setup();
        let mc = pending_material(&mut store, &job);
        let mut sink = MemorySink::default();

        let (mc, outcome) = set_material_status(
            &mut store,
            &mut sink,
            &roster(),
            &mc.id,
            MaterialStatus::Rejected,
            "inspector1",
        )
        .unwrap();
        assert_eq!(mc.status, MaterialStatus::Rejected);
        assert_eq!(outcome.unwrap().delivered, 2);
        assert!(sink.sent[0].title.starts_with("Material Rejected"));
    }

    #[test]
    fn test_material_approval_is_silent() {
        let (mut store, job) = setup();
        let mc = pending_material(&mut store, &job);
        let mut sink = MemorySink::default();

        let (mc, outcome) = set_material_status(
            &mut store,
            &mut sink,
            &roster(),
            &mc.id,
            MaterialStatus::Approved,
            "inspector1",
        )
        .unwrap();
        assert_eq!(mc.status, MaterialStatus::Approved);
        assert!(outcome.is_none());
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn test_external_inspect_rejected_notifies() {
        let (mut store, job) = setup();
        let ep = create_external_process(
            &mut store,
            &job.id,
            NewExternalProcess {
                process_type: "heat treatment".to_string(),
                ..Default::default()
            },
            "t",
        )
        .unwrap();
        receive_external(
            &mut store,
            &ep.id,
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            Some(25),
            "t",
        )
        .unwrap();
        let mut sink = MemorySink::default();

        let (ep, outcome) = inspect_external(
            &mut store,
            &mut sink,
            &roster(),
            &ep.id,
            ExternalStatus::Rejected,
            "inspector1",
            Some("hardness below spec"),
        )
        .unwrap();
        assert_eq!(ep.status, ExternalStatus::Rejected);
        assert_eq!(ep.inspected_by.as_deref(), Some("inspector1"));
        assert_eq!(outcome.unwrap().delivered, 2);
        assert!(sink.sent[0].title.starts_with("External Process Rejected"));
    }

    #[test]
    fn test_external_inspect_rejects_non_verdict_status() {
        let (mut store, job) = setup();
        let ep = create_external_process(
            &mut store,
            &job.id,
            NewExternalProcess {
                process_type: "plating".to_string(),
                ..Default::default()
            },
            "t",
        )
        .unwrap();
        let mut sink = MemorySink::default();

        let err = inspect_external(
            &mut store,
            &mut sink,
            &roster(),
            &ep.id,
            ExternalStatus::Sent,
            "i",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_resolve_and_close_stamp_dates() {
        let (mut store, job) = setup();
        let mut sink = MemorySink::default();
        let (er, _) = report_internal(
            &mut store,
            &mut sink,
            &roster(),
            &job.id,
            Severity::Minor,
            "burr on edge",
            None,
            "i",
        )
        .unwrap();

        let er = set_error_status(&mut store, &er.id, ErrorStatus::Resolved, "qm").unwrap();
        assert!(er.resolved_date.is_some());
        assert!(er.closed_date.is_none());

        // Closing without disposition/root cause is permitted
        let er = set_error_status(&mut store, &er.id, ErrorStatus::Closed, "qm").unwrap();
        assert!(er.disposition.is_none());
        assert!(er.root_cause.is_none());
        assert_eq!(er.status, ErrorStatus::Closed);
        assert!(er.closed_date.is_some());
    }

    #[test]
    fn test_reopen_clears_both_dates() {
        let (mut store, job) = setup();
        let mut sink = MemorySink::default();
        let (er, _) = report_internal(
            &mut store,
            &mut sink,
            &roster(),
            &job.id,
            Severity::Minor,
            "burr on edge",
            None,
            "i",
        )
        .unwrap();

        set_error_status(&mut store, &er.id, ErrorStatus::Resolved, "qm").unwrap();
        set_error_status(&mut store, &er.id, ErrorStatus::Closed, "qm").unwrap();
        let er = set_error_status(&mut store, &er.id, ErrorStatus::Open, "qm").unwrap();

        assert_eq!(er.status, ErrorStatus::Open);
        assert!(er.resolved_date.is_none());
        assert!(er.closed_date.is_none());
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let (mut store, job) = setup();
        let mut sink = MemorySink::default();
        let (er, _) = report_internal(
            &mut store,
            &mut sink,
            &roster(),
            &job.id,
            Severity::Minor,
            "burr on edge",
            None,
            "i",
        )
        .unwrap();

        let err = set_error_status(&mut store, &er.id, ErrorStatus::Closed, "qm").unwrap_err();
        assert!(matches!(err, EngineError::InvalidErrorTransition { .. }));
    }

    #[test]
    fn test_update_fields_merges() {
        let (mut store, job) = setup();
        let mut sink = MemorySink::default();
        let (er, _) = report_internal(
            &mut store,
            &mut sink,
            &roster(),
            &job.id,
            Severity::Major,
            "bore oversize",
            None,
            "i",
        )
        .unwrap();

        let er = update_error_fields(
            &mut store,
            &er.id,
            Some("rework"),
            None,
            None,
            Some("jsmith"),
            "qm",
        )
        .unwrap();
        assert_eq!(er.disposition.as_deref(), Some("rework"));
        assert_eq!(er.assigned_to.as_deref(), Some("jsmith"));

        // A later partial update leaves earlier fields alone
        let er = update_error_fields(
            &mut store,
            &er.id,
            None,
            Some("tool wear"),
            None,
            None,
            "qm",
        )
        .unwrap();
        assert_eq!(er.disposition.as_deref(), Some("rework"));
        assert_eq!(er.root_cause.as_deref(), Some("tool wear"));
    }
}
