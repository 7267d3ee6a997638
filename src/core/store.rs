//! SQLite-backed persistent store
//!
//! One database per project at `.shopqc/quality.db`. Engine operations run
//! inside IMMEDIATE transactions so concurrent writers against the same
//! aggregate are serialized by the store while WAL readers proceed. The
//! repo functions below take `&Connection` so they work both on the bare
//! connection and inside a [`rusqlite::Transaction`] (which derefs to one).

use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use thiserror::Error;

use crate::core::identity::EntityId;
use crate::entities::dimension::JobDimension;
use crate::entities::error_report::{ErrorReport, ErrorStatus, ErrorType};
use crate::entities::exit_control::{ExitControl, ExitControlSample, LotStatus};
use crate::entities::external::{ExternalProcess, ExternalStatus};
use crate::entities::job::{Job, WorkflowStage};
use crate::entities::material::{MaterialControl, MaterialStatus};
use crate::entities::measurement::{Measurement, MeasurementReport, ReportStatus};
use crate::entities::part::Part;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("uniqueness violation: {0}")]
    Conflict(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Check whether a rusqlite error is a uniqueness/constraint violation
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn map_constraint(err: rusqlite::Error, what: &str) -> StoreError {
    if is_constraint_violation(&err) {
        StoreError::Conflict(what.to_string())
    } else {
        StoreError::Sqlite(err)
    }
}

/// The quality database
pub struct QualityStore {
    conn: Connection,
}

impl QualityStore {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Borrow the underlying connection for read-only queries
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin an IMMEDIATE transaction; the write lock is taken up front so
    /// two operations on the same aggregate cannot interleave.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS parts (
                id TEXT PRIMARY KEY,
                part_number TEXT NOT NULL,
                part_revision TEXT NOT NULL DEFAULT '',
                description TEXT,
                created TEXT NOT NULL,
                updated TEXT NOT NULL,
                UNIQUE (part_number, part_revision)
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                po_number TEXT NOT NULL,
                job_number TEXT NOT NULL UNIQUE,
                customer TEXT,
                part_id TEXT NOT NULL REFERENCES parts(id),
                part_number TEXT NOT NULL,
                part_revision TEXT NOT NULL DEFAULT '',
                part_description TEXT,
                quantity INTEGER NOT NULL,
                due_date TEXT,
                workflow_stage TEXT NOT NULL DEFAULT 'po_receipt',
                drawing_number TEXT,
                special_requirements TEXT,
                revision_verified INTEGER NOT NULL DEFAULT 0,
                revision_verified_by TEXT,
                revision_verified_at TEXT,
                created TEXT NOT NULL,
                updated TEXT NOT NULL,
                completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_stage ON jobs(workflow_stage);
            CREATE INDEX IF NOT EXISTS idx_jobs_part ON jobs(part_id);

            CREATE TABLE IF NOT EXISTS job_dimensions (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id),
                dimension_number INTEGER NOT NULL,
                name TEXT NOT NULL,
                nominal REAL NOT NULL,
                tolerance_plus REAL,
                tolerance_minus REAL,
                unit TEXT NOT NULL DEFAULT 'mm',
                drawing_reference TEXT,
                critical INTEGER NOT NULL DEFAULT 0,
                created TEXT NOT NULL,
                UNIQUE (job_id, dimension_number)
            );
            CREATE INDEX IF NOT EXISTS idx_dimensions_job ON job_dimensions(job_id);

            CREATE TABLE IF NOT EXISTS material_controls (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id),
                inspector TEXT,
                material_type TEXT NOT NULL,
                supplier TEXT,
                batch_number TEXT,
                quantity_received TEXT,
                certificate_matches INTEGER NOT NULL DEFAULT 0,
                visual_ok INTEGER NOT NULL DEFAULT 0,
                dimensions_ok INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                notes TEXT,
                created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_material_job ON material_controls(job_id);

            CREATE TABLE IF NOT EXISTS external_processes (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id),
                process_type TEXT NOT NULL,
                description TEXT,
                supplier TEXT,
                quantity_sent INTEGER,
                sent_date TEXT,
                received_date TEXT,
                quantity_received INTEGER,
                inspected_by TEXT,
                inspection_date TEXT,
                inspection_notes TEXT,
                status TEXT NOT NULL DEFAULT 'sent',
                notes TEXT,
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_external_job ON external_processes(job_id);

            CREATE TABLE IF NOT EXISTS measurement_reports (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id),
                kind TEXT NOT NULL DEFAULT 'in_process',
                inspector TEXT,
                overall_status TEXT NOT NULL DEFAULT 'pending',
                notes TEXT,
                created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reports_job ON measurement_reports(job_id);

            CREATE TABLE IF NOT EXISTS measurements (
                id TEXT PRIMARY KEY,
                report_id TEXT NOT NULL REFERENCES measurement_reports(id),
                dimension_id TEXT NOT NULL REFERENCES job_dimensions(id),
                actual_value REAL NOT NULL,
                pass_fail TEXT NOT NULL,
                equipment TEXT,
                sample_number INTEGER NOT NULL DEFAULT 1,
                measured_by TEXT,
                measured_at TEXT NOT NULL,
                notes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_measurements_report ON measurements(report_id);
            CREATE INDEX IF NOT EXISTS idx_measurements_dimension ON measurements(dimension_id);

            CREATE TABLE IF NOT EXISTS exit_controls (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id),
                inspector TEXT,
                lot_quantity INTEGER NOT NULL,
                overall_status TEXT NOT NULL DEFAULT 'in_progress',
                notes TEXT,
                created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_exit_job ON exit_controls(job_id);

            CREATE TABLE IF NOT EXISTS exit_control_samples (
                id TEXT PRIMARY KEY,
                exit_control_id TEXT NOT NULL REFERENCES exit_controls(id),
                position INTEGER NOT NULL,
                dimensions_ok INTEGER,
                visual_ok INTEGER,
                surface_ok INTEGER,
                overall_pass INTEGER,
                notes TEXT,
                inspected_at TEXT,
                UNIQUE (exit_control_id, position)
            );
            CREATE INDEX IF NOT EXISTS idx_samples_exit ON exit_control_samples(exit_control_id);

            CREATE TABLE IF NOT EXISTS error_reports (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id),
                reported_by TEXT,
                workflow_stage TEXT NOT NULL,
                found_date TEXT NOT NULL,
                severity TEXT NOT NULL,
                description TEXT NOT NULL,
                affected_quantity INTEGER,
                disposition TEXT,
                root_cause TEXT,
                corrective_action TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                assigned_to TEXT,
                resolved_date TEXT,
                closed_date TEXT,
                error_type TEXT NOT NULL DEFAULT 'internal',
                supplier TEXT,
                material_control_id TEXT REFERENCES material_controls(id),
                external_process_id TEXT REFERENCES external_processes(id),
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_errors_job ON error_reports(job_id);
            CREATE INDEX IF NOT EXISTS idx_errors_status ON error_reports(status);

            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipient TEXT NOT NULL,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                entity_type TEXT,
                entity_id TEXT,
                read INTEGER NOT NULL DEFAULT 0,
                created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications(recipient);

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                actor TEXT,
                action TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                description TEXT,
                created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_type, entity_id);

            CREATE TABLE IF NOT EXISTS attachments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                stored_path TEXT NOT NULL,
                file_name TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                uploaded_by TEXT,
                created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_attachments_entity ON attachments(entity_type, entity_id);
            "#,
        )?;
        Ok(())
    }
}

// Row-mapping helpers. Timestamps are stored as RFC 3339 text; a value
// that fails to parse maps to the epoch-ish sentinel rather than aborting
// the whole query.

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap())
}

fn get_datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(parse_datetime(row.get::<_, String>(idx)?))
}

fn get_datetime_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row.get::<_, Option<String>>(idx)?.map(parse_datetime))
}

fn get_date_opt(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
}

fn get_parsed<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    let s: String = row.get(idx)?;
    s.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn get_parsed_opt<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            }),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Parts

/// Insert a new part; a `(part_number, part_revision)` collision maps to
/// [`StoreError::Conflict`] so the registry can treat it as a lost race.
pub fn insert_part(conn: &Connection, part: &Part) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO parts (id, part_number, part_revision, description, created, updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            part.id.to_string(),
            part.part_number,
            part.revision,
            part.description,
            part.created.to_rfc3339(),
            part.updated.to_rfc3339(),
        ],
    )
    .map_err(|e| map_constraint(e, "parts(part_number, part_revision)"))?;
    Ok(())
}

fn part_from_row(row: &Row) -> rusqlite::Result<Part> {
    Ok(Part {
        id: get_parsed(row, 0)?,
        part_number: row.get(1)?,
        revision: row.get(2)?,
        description: row.get(3)?,
        created: get_datetime(row, 4)?,
        updated: get_datetime(row, 5)?,
    })
}

const PART_COLS: &str = "id, part_number, part_revision, description, created, updated";

/// Look up a part by its canonical identity
pub fn find_part_by_identity(
    conn: &Connection,
    part_number: &str,
    revision: &str,
) -> Result<Option<Part>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {PART_COLS} FROM parts WHERE part_number = ?1 AND part_revision = ?2"
            ),
            params![part_number, revision],
            part_from_row,
        )
        .optional()?)
}

/// Look up a part by id
pub fn find_part(conn: &Connection, id: &EntityId) -> Result<Option<Part>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {PART_COLS} FROM parts WHERE id = ?1"),
            params![id.to_string()],
            part_from_row,
        )
        .optional()?)
}

/// Update a part's description (identity fields are immutable)
pub fn update_part_description(
    conn: &Connection,
    id: &EntityId,
    description: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE parts SET description = ?1, updated = ?2 WHERE id = ?3",
        params![description, Utc::now().to_rfc3339(), id.to_string()],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Jobs

const JOB_COLS: &str = "id, po_number, job_number, customer, part_id, part_number, part_revision, \
     part_description, quantity, due_date, workflow_stage, drawing_number, special_requirements, \
     revision_verified, revision_verified_by, revision_verified_at, created, updated, completed_at";

fn job_from_row(row: &Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: get_parsed(row, 0)?,
        po_number: row.get(1)?,
        job_number: row.get(2)?,
        customer: row.get(3)?,
        part_id: get_parsed(row, 4)?,
        part_number: row.get(5)?,
        part_revision: row.get(6)?,
        part_description: row.get(7)?,
        quantity: row.get(8)?,
        due_date: get_date_opt(row, 9)?,
        workflow_stage: get_parsed(row, 10)?,
        drawing_number: row.get(11)?,
        special_requirements: row.get(12)?,
        revision_verified: row.get(13)?,
        revision_verified_by: row.get(14)?,
        revision_verified_at: get_datetime_opt(row, 15)?,
        created: get_datetime(row, 16)?,
        updated: get_datetime(row, 17)?,
        completed_at: get_datetime_opt(row, 18)?,
    })
}

/// Insert a new job; duplicate job numbers map to [`StoreError::Conflict`]
pub fn insert_job(conn: &Connection, job: &Job) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO jobs (id, po_number, job_number, customer, part_id, part_number, \
         part_revision, part_description, quantity, due_date, workflow_stage, drawing_number, \
         special_requirements, revision_verified, revision_verified_by, revision_verified_at, \
         created, updated, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            job.id.to_string(),
            job.po_number,
            job.job_number,
            job.customer,
            job.part_id.to_string(),
            job.part_number,
            job.part_revision,
            job.part_description,
            job.quantity,
            job.due_date.map(|d| d.to_string()),
            job.workflow_stage.to_string(),
            job.drawing_number,
            job.special_requirements,
            job.revision_verified,
            job.revision_verified_by,
            job.revision_verified_at.map(|t| t.to_rfc3339()),
            job.created.to_rfc3339(),
            job.updated.to_rfc3339(),
            job.completed_at.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(|e| map_constraint(e, "jobs(job_number)"))?;
    Ok(())
}

/// Look up a job by id
pub fn find_job(conn: &Connection, id: &EntityId) -> Result<Option<Job>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {JOB_COLS} FROM jobs WHERE id = ?1"),
            params![id.to_string()],
            job_from_row,
        )
        .optional()?)
}

/// Look up a job by its internal job number (e.g. "JOB00042")
pub fn find_job_by_number(conn: &Connection, number: &str) -> Result<Option<Job>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {JOB_COLS} FROM jobs WHERE job_number = ?1"),
            params![number],
            job_from_row,
        )
        .optional()?)
}

/// List jobs, optionally filtered by stage, newest first
pub fn list_jobs(
    conn: &Connection,
    stage: Option<WorkflowStage>,
) -> Result<Vec<Job>, StoreError> {
    let mut out = Vec::new();
    match stage {
        Some(stage) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLS} FROM jobs WHERE workflow_stage = ?1 ORDER BY created DESC"
            ))?;
            let rows = stmt.query_map(params![stage.to_string()], job_from_row)?;
            for row in rows {
                out.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLS} FROM jobs ORDER BY created DESC"
            ))?;
            let rows = stmt.query_map([], job_from_row)?;
            for row in rows {
                out.push(row?);
            }
        }
    }
    Ok(out)
}

/// Persist a stage transition together with its derived completion stamp
pub fn update_job_stage(
    conn: &Connection,
    id: &EntityId,
    stage: WorkflowStage,
    completed_at: Option<DateTime<Utc>>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET workflow_stage = ?1, completed_at = ?2, updated = ?3 WHERE id = ?4",
        params![
            stage.to_string(),
            completed_at.map(|t| t.to_rfc3339()),
            Utc::now().to_rfc3339(),
            id.to_string()
        ],
    )?;
    Ok(())
}

/// Record drawing-revision verification
pub fn update_job_revision_verified(
    conn: &Connection,
    id: &EntityId,
    verified_by: &str,
    verified_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET revision_verified = 1, revision_verified_by = ?1, \
         revision_verified_at = ?2, updated = ?3 WHERE id = ?4",
        params![
            verified_by,
            verified_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            id.to_string()
        ],
    )?;
    Ok(())
}

/// Highest numeric suffix among generated job numbers ("JOB%05d")
pub fn max_job_number(conn: &Connection) -> Result<u32, StoreError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(CAST(SUBSTR(job_number, 4) AS INTEGER)) FROM jobs WHERE job_number LIKE 'JOB%'",
        [],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) as u32)
}

// ---------------------------------------------------------------------------
// Job dimensions

const DIM_COLS: &str = "id, job_id, dimension_number, name, nominal, tolerance_plus, \
     tolerance_minus, unit, drawing_reference, critical, created";

fn dimension_from_row(row: &Row) -> rusqlite::Result<JobDimension> {
    Ok(JobDimension {
        id: get_parsed(row, 0)?,
        job_id: get_parsed(row, 1)?,
        dimension_number: row.get(2)?,
        name: row.get(3)?,
        nominal: row.get(4)?,
        tolerance_plus: row.get(5)?,
        tolerance_minus: row.get(6)?,
        unit: row.get(7)?,
        drawing_reference: row.get(8)?,
        critical: row.get(9)?,
        created: get_datetime(row, 10)?,
    })
}

pub fn insert_dimension(conn: &Connection, dim: &JobDimension) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO job_dimensions (id, job_id, dimension_number, name, nominal, \
         tolerance_plus, tolerance_minus, unit, drawing_reference, critical, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            dim.id.to_string(),
            dim.job_id.to_string(),
            dim.dimension_number,
            dim.name,
            dim.nominal,
            dim.tolerance_plus,
            dim.tolerance_minus,
            dim.unit,
            dim.drawing_reference,
            dim.critical,
            dim.created.to_rfc3339(),
        ],
    )
    .map_err(|e| map_constraint(e, "job_dimensions(job_id, dimension_number)"))?;
    Ok(())
}

/// Dimensions of a job in sequence order
pub fn list_dimensions(conn: &Connection, job_id: &EntityId) -> Result<Vec<JobDimension>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DIM_COLS} FROM job_dimensions WHERE job_id = ?1 ORDER BY dimension_number"
    ))?;
    let rows = stmt.query_map(params![job_id.to_string()], dimension_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Next free dimension number for a job (max + 1; gaps are not reused)
pub fn next_dimension_number(conn: &Connection, job_id: &EntityId) -> Result<u32, StoreError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(dimension_number) FROM job_dimensions WHERE job_id = ?1",
        params![job_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) as u32 + 1)
}

/// Remove all dimensions of a job (used by copy-from-job)
pub fn delete_dimensions(conn: &Connection, job_id: &EntityId) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM job_dimensions WHERE job_id = ?1",
        params![job_id.to_string()],
    )?)
}

// ---------------------------------------------------------------------------
// Material controls

const MATC_COLS: &str = "id, job_id, inspector, material_type, supplier, batch_number, \
     quantity_received, certificate_matches, visual_ok, dimensions_ok, status, notes, created";

fn material_from_row(row: &Row) -> rusqlite::Result<MaterialControl> {
    Ok(MaterialControl {
        id: get_parsed(row, 0)?,
        job_id: get_parsed(row, 1)?,
        inspector: row.get(2)?,
        material_type: row.get(3)?,
        supplier: row.get(4)?,
        batch_number: row.get(5)?,
        quantity_received: row.get(6)?,
        certificate_matches: row.get(7)?,
        visual_ok: row.get(8)?,
        dimensions_ok: row.get(9)?,
        status: get_parsed(row, 10)?,
        notes: row.get(11)?,
        created: get_datetime(row, 12)?,
    })
}

pub fn insert_material_control(conn: &Connection, mc: &MaterialControl) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO material_controls (id, job_id, inspector, material_type, supplier, \
         batch_number, quantity_received, certificate_matches, visual_ok, dimensions_ok, \
         status, notes, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            mc.id.to_string(),
            mc.job_id.to_string(),
            mc.inspector,
            mc.material_type,
            mc.supplier,
            mc.batch_number,
            mc.quantity_received,
            mc.certificate_matches,
            mc.visual_ok,
            mc.dimensions_ok,
            mc.status.to_string(),
            mc.notes,
            mc.created.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_material_control(
    conn: &Connection,
    id: &EntityId,
) -> Result<Option<MaterialControl>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {MATC_COLS} FROM material_controls WHERE id = ?1"),
            params![id.to_string()],
            material_from_row,
        )
        .optional()?)
}

pub fn list_material_controls(
    conn: &Connection,
    job_id: &EntityId,
) -> Result<Vec<MaterialControl>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MATC_COLS} FROM material_controls WHERE job_id = ?1 ORDER BY created"
    ))?;
    let rows = stmt.query_map(params![job_id.to_string()], material_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn update_material_status(
    conn: &Connection,
    id: &EntityId,
    status: MaterialStatus,
    inspector: Option<&str>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE material_controls SET status = ?1, inspector = COALESCE(?2, inspector) WHERE id = ?3",
        params![status.to_string(), inspector, id.to_string()],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// External processes

const EXTP_COLS: &str = "id, job_id, process_type, description, supplier, quantity_sent, \
     sent_date, received_date, quantity_received, inspected_by, inspection_date, \
     inspection_notes, status, notes, created, updated";

fn external_from_row(row: &Row) -> rusqlite::Result<ExternalProcess> {
    Ok(ExternalProcess {
        id: get_parsed(row, 0)?,
        job_id: get_parsed(row, 1)?,
        process_type: row.get(2)?,
        description: row.get(3)?,
        supplier: row.get(4)?,
        quantity_sent: row.get(5)?,
        sent_date: get_date_opt(row, 6)?,
        received_date: get_date_opt(row, 7)?,
        quantity_received: row.get(8)?,
        inspected_by: row.get(9)?,
        inspection_date: get_datetime_opt(row, 10)?,
        inspection_notes: row.get(11)?,
        status: get_parsed(row, 12)?,
        notes: row.get(13)?,
        created: get_datetime(row, 14)?,
        updated: get_datetime(row, 15)?,
    })
}

pub fn insert_external_process(conn: &Connection, ep: &ExternalProcess) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO external_processes (id, job_id, process_type, description, supplier, \
         quantity_sent, sent_date, received_date, quantity_received, inspected_by, \
         inspection_date, inspection_notes, status, notes, created, updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            ep.id.to_string(),
            ep.job_id.to_string(),
            ep.process_type,
            ep.description,
            ep.supplier,
            ep.quantity_sent,
            ep.sent_date.map(|d| d.to_string()),
            ep.received_date.map(|d| d.to_string()),
            ep.quantity_received,
            ep.inspected_by,
            ep.inspection_date.map(|t| t.to_rfc3339()),
            ep.inspection_notes,
            ep.status.to_string(),
            ep.notes,
            ep.created.to_rfc3339(),
            ep.updated.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_external_process(
    conn: &Connection,
    id: &EntityId,
) -> Result<Option<ExternalProcess>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {EXTP_COLS} FROM external_processes WHERE id = ?1"),
            params![id.to_string()],
            external_from_row,
        )
        .optional()?)
}

pub fn list_external_processes(
    conn: &Connection,
    job_id: &EntityId,
) -> Result<Vec<ExternalProcess>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXTP_COLS} FROM external_processes WHERE job_id = ?1 ORDER BY created"
    ))?;
    let rows = stmt.query_map(params![job_id.to_string()], external_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Record receipt of parts back from the supplier
pub fn update_external_received(
    conn: &Connection,
    id: &EntityId,
    received_date: NaiveDate,
    quantity_received: Option<u32>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE external_processes SET status = ?1, received_date = ?2, \
         quantity_received = COALESCE(?3, quantity_sent), updated = ?4 WHERE id = ?5",
        params![
            ExternalStatus::Received.to_string(),
            received_date.to_string(),
            quantity_received,
            Utc::now().to_rfc3339(),
            id.to_string()
        ],
    )?;
    Ok(())
}

/// Record the inspection verdict on returned parts
pub fn update_external_inspection(
    conn: &Connection,
    id: &EntityId,
    status: ExternalStatus,
    inspected_by: &str,
    inspection_notes: Option<&str>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE external_processes SET status = ?1, inspected_by = ?2, inspection_date = ?3, \
         inspection_notes = ?4, updated = ?5 WHERE id = ?6",
        params![
            status.to_string(),
            inspected_by,
            Utc::now().to_rfc3339(),
            inspection_notes,
            Utc::now().to_rfc3339(),
            id.to_string()
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Measurement reports

const RPT_COLS: &str = "id, job_id, kind, inspector, overall_status, notes, created";

fn report_from_row(row: &Row) -> rusqlite::Result<MeasurementReport> {
    Ok(MeasurementReport {
        id: get_parsed(row, 0)?,
        job_id: get_parsed(row, 1)?,
        kind: get_parsed(row, 2)?,
        inspector: row.get(3)?,
        overall_status: get_parsed(row, 4)?,
        notes: row.get(5)?,
        created: get_datetime(row, 6)?,
    })
}

pub fn insert_measurement_report(
    conn: &Connection,
    report: &MeasurementReport,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO measurement_reports (id, job_id, kind, inspector, overall_status, notes, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            report.id.to_string(),
            report.job_id.to_string(),
            report.kind.to_string(),
            report.inspector,
            report.overall_status.to_string(),
            report.notes,
            report.created.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_measurement_report(
    conn: &Connection,
    id: &EntityId,
) -> Result<Option<MeasurementReport>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {RPT_COLS} FROM measurement_reports WHERE id = ?1"),
            params![id.to_string()],
            report_from_row,
        )
        .optional()?)
}

pub fn list_measurement_reports(
    conn: &Connection,
    job_id: &EntityId,
) -> Result<Vec<MeasurementReport>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RPT_COLS} FROM measurement_reports WHERE job_id = ?1 ORDER BY created"
    ))?;
    let rows = stmt.query_map(params![job_id.to_string()], report_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn update_report_status(
    conn: &Connection,
    id: &EntityId,
    status: ReportStatus,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE measurement_reports SET overall_status = ?1 WHERE id = ?2",
        params![status.to_string(), id.to_string()],
    )?;
    Ok(())
}

const MEAS_COLS: &str = "id, report_id, dimension_id, actual_value, pass_fail, equipment, \
     sample_number, measured_by, measured_at, notes";

fn measurement_from_row(row: &Row) -> rusqlite::Result<Measurement> {
    Ok(Measurement {
        id: get_parsed(row, 0)?,
        report_id: get_parsed(row, 1)?,
        dimension_id: get_parsed(row, 2)?,
        actual_value: row.get(3)?,
        pass_fail: get_parsed(row, 4)?,
        equipment: row.get(5)?,
        sample_number: row.get(6)?,
        measured_by: row.get(7)?,
        measured_at: get_datetime(row, 8)?,
        notes: row.get(9)?,
    })
}

pub fn insert_measurement(conn: &Connection, m: &Measurement) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO measurements (id, report_id, dimension_id, actual_value, pass_fail, \
         equipment, sample_number, measured_by, measured_at, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            m.id.to_string(),
            m.report_id.to_string(),
            m.dimension_id.to_string(),
            m.actual_value,
            m.pass_fail.to_string(),
            m.equipment,
            m.sample_number,
            m.measured_by,
            m.measured_at.to_rfc3339(),
            m.notes,
        ],
    )?;
    Ok(())
}

pub fn list_measurements(
    conn: &Connection,
    report_id: &EntityId,
) -> Result<Vec<Measurement>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEAS_COLS} FROM measurements WHERE report_id = ?1 ORDER BY sample_number"
    ))?;
    let rows = stmt.query_map(params![report_id.to_string()], measurement_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Exit controls

const EXIT_COLS: &str = "id, job_id, inspector, lot_quantity, overall_status, notes, created";

fn exit_control_from_row(row: &Row) -> rusqlite::Result<ExitControl> {
    Ok(ExitControl {
        id: get_parsed(row, 0)?,
        job_id: get_parsed(row, 1)?,
        inspector: row.get(2)?,
        lot_quantity: row.get(3)?,
        overall_status: get_parsed(row, 4)?,
        notes: row.get(5)?,
        created: get_datetime(row, 6)?,
    })
}

pub fn insert_exit_control(conn: &Connection, ec: &ExitControl) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO exit_controls (id, job_id, inspector, lot_quantity, overall_status, notes, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            ec.id.to_string(),
            ec.job_id.to_string(),
            ec.inspector,
            ec.lot_quantity,
            ec.overall_status.to_string(),
            ec.notes,
            ec.created.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_exit_control(
    conn: &Connection,
    id: &EntityId,
) -> Result<Option<ExitControl>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {EXIT_COLS} FROM exit_controls WHERE id = ?1"),
            params![id.to_string()],
            exit_control_from_row,
        )
        .optional()?)
}

pub fn list_exit_controls(
    conn: &Connection,
    job_id: &EntityId,
) -> Result<Vec<ExitControl>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXIT_COLS} FROM exit_controls WHERE job_id = ?1 ORDER BY created"
    ))?;
    let rows = stmt.query_map(params![job_id.to_string()], exit_control_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn update_lot_status(
    conn: &Connection,
    id: &EntityId,
    status: LotStatus,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE exit_controls SET overall_status = ?1 WHERE id = ?2",
        params![status.to_string(), id.to_string()],
    )?;
    Ok(())
}

const SMP_COLS: &str = "id, exit_control_id, position, dimensions_ok, visual_ok, surface_ok, \
     overall_pass, notes, inspected_at";

fn sample_from_row(row: &Row) -> rusqlite::Result<ExitControlSample> {
    Ok(ExitControlSample {
        id: get_parsed(row, 0)?,
        exit_control_id: get_parsed(row, 1)?,
        position: row.get(2)?,
        dimensions_ok: row.get(3)?,
        visual_ok: row.get(4)?,
        surface_ok: row.get(5)?,
        overall_pass: row.get(6)?,
        notes: row.get(7)?,
        inspected_at: get_datetime_opt(row, 8)?,
    })
}

/// Insert a sample; a duplicate position maps to [`StoreError::Conflict`]
pub fn insert_sample(conn: &Connection, sample: &ExitControlSample) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO exit_control_samples (id, exit_control_id, position, dimensions_ok, \
         visual_ok, surface_ok, overall_pass, notes, inspected_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            sample.id.to_string(),
            sample.exit_control_id.to_string(),
            sample.position,
            sample.dimensions_ok,
            sample.visual_ok,
            sample.surface_ok,
            sample.overall_pass,
            sample.notes,
            sample.inspected_at.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(|e| map_constraint(e, "exit_control_samples(exit_control_id, position)"))?;
    Ok(())
}

pub fn find_sample(
    conn: &Connection,
    id: &EntityId,
) -> Result<Option<ExitControlSample>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {SMP_COLS} FROM exit_control_samples WHERE id = ?1"),
            params![id.to_string()],
            sample_from_row,
        )
        .optional()?)
}

pub fn find_sample_by_position(
    conn: &Connection,
    exit_control_id: &EntityId,
    position: u32,
) -> Result<Option<ExitControlSample>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {SMP_COLS} FROM exit_control_samples \
                 WHERE exit_control_id = ?1 AND position = ?2"
            ),
            params![exit_control_id.to_string(), position],
            sample_from_row,
        )
        .optional()?)
}

/// Samples of a lot in position order
pub fn list_samples(
    conn: &Connection,
    exit_control_id: &EntityId,
) -> Result<Vec<ExitControlSample>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SMP_COLS} FROM exit_control_samples WHERE exit_control_id = ?1 ORDER BY position"
    ))?;
    let rows = stmt.query_map(params![exit_control_id.to_string()], sample_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn update_sample(conn: &Connection, sample: &ExitControlSample) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE exit_control_samples SET dimensions_ok = ?1, visual_ok = ?2, surface_ok = ?3, \
         overall_pass = ?4, notes = ?5, inspected_at = ?6 WHERE id = ?7",
        params![
            sample.dimensions_ok,
            sample.visual_ok,
            sample.surface_ok,
            sample.overall_pass,
            sample.notes,
            sample.inspected_at.map(|t| t.to_rfc3339()),
            sample.id.to_string(),
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Error reports

const ERR_COLS: &str = "id, job_id, reported_by, workflow_stage, found_date, severity, \
     description, affected_quantity, disposition, root_cause, corrective_action, status, \
     assigned_to, resolved_date, closed_date, error_type, supplier, material_control_id, \
     external_process_id, created, updated";

fn error_from_row(row: &Row) -> rusqlite::Result<ErrorReport> {
    Ok(ErrorReport {
        id: get_parsed(row, 0)?,
        job_id: get_parsed(row, 1)?,
        reported_by: row.get(2)?,
        workflow_stage: get_parsed(row, 3)?,
        found_date: get_datetime(row, 4)?,
        severity: get_parsed(row, 5)?,
        description: row.get(6)?,
        affected_quantity: row.get(7)?,
        disposition: row.get(8)?,
        root_cause: row.get(9)?,
        corrective_action: row.get(10)?,
        status: get_parsed(row, 11)?,
        assigned_to: row.get(12)?,
        resolved_date: get_datetime_opt(row, 13)?,
        closed_date: get_datetime_opt(row, 14)?,
        error_type: get_parsed(row, 15)?,
        supplier: row.get(16)?,
        material_control_id: get_parsed_opt(row, 17)?,
        external_process_id: get_parsed_opt(row, 18)?,
        created: get_datetime(row, 19)?,
        updated: get_datetime(row, 20)?,
    })
}

pub fn insert_error_report(conn: &Connection, er: &ErrorReport) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO error_reports (id, job_id, reported_by, workflow_stage, found_date, \
         severity, description, affected_quantity, disposition, root_cause, corrective_action, \
         status, assigned_to, resolved_date, closed_date, error_type, supplier, \
         material_control_id, external_process_id, created, updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
         ?18, ?19, ?20, ?21)",
        params![
            er.id.to_string(),
            er.job_id.to_string(),
            er.reported_by,
            er.workflow_stage.to_string(),
            er.found_date.to_rfc3339(),
            er.severity.to_string(),
            er.description,
            er.affected_quantity,
            er.disposition,
            er.root_cause,
            er.corrective_action,
            er.status.to_string(),
            er.assigned_to,
            er.resolved_date.map(|t| t.to_rfc3339()),
            er.closed_date.map(|t| t.to_rfc3339()),
            er.error_type.to_string(),
            er.supplier,
            er.material_control_id.as_ref().map(|i| i.to_string()),
            er.external_process_id.as_ref().map(|i| i.to_string()),
            er.created.to_rfc3339(),
            er.updated.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_error_report(
    conn: &Connection,
    id: &EntityId,
) -> Result<Option<ErrorReport>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {ERR_COLS} FROM error_reports WHERE id = ?1"),
            params![id.to_string()],
            error_from_row,
        )
        .optional()?)
}

/// List error reports, optionally filtered by status and/or type, newest first
pub fn list_error_reports(
    conn: &Connection,
    status: Option<ErrorStatus>,
    error_type: Option<ErrorType>,
) -> Result<Vec<ErrorReport>, StoreError> {
    let mut sql = format!("SELECT {ERR_COLS} FROM error_reports WHERE 1=1");
    let mut args: Vec<String> = Vec::new();
    if let Some(status) = status {
        sql.push_str(&format!(" AND status = ?{}", args.len() + 1));
        args.push(status.to_string());
    }
    if let Some(error_type) = error_type {
        sql.push_str(&format!(" AND error_type = ?{}", args.len() + 1));
        args.push(error_type.to_string());
    }
    sql.push_str(" ORDER BY created DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), error_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Persist a status transition with its stamped/cleared dates
pub fn update_error_status(
    conn: &Connection,
    id: &EntityId,
    status: ErrorStatus,
    resolved_date: Option<DateTime<Utc>>,
    closed_date: Option<DateTime<Utc>>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE error_reports SET status = ?1, resolved_date = ?2, closed_date = ?3, \
         updated = ?4 WHERE id = ?5",
        params![
            status.to_string(),
            resolved_date.map(|t| t.to_rfc3339()),
            closed_date.map(|t| t.to_rfc3339()),
            Utc::now().to_rfc3339(),
            id.to_string()
        ],
    )?;
    Ok(())
}

/// Update the investigation fields of an error report
pub fn update_error_fields(
    conn: &Connection,
    id: &EntityId,
    disposition: Option<&str>,
    root_cause: Option<&str>,
    corrective_action: Option<&str>,
    assigned_to: Option<&str>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE error_reports SET \
         disposition = COALESCE(?1, disposition), \
         root_cause = COALESCE(?2, root_cause), \
         corrective_action = COALESCE(?3, corrective_action), \
         assigned_to = COALESCE(?4, assigned_to), \
         updated = ?5 WHERE id = ?6",
        params![
            disposition,
            root_cause,
            corrective_action,
            assigned_to,
            Utc::now().to_rfc3339(),
            id.to_string()
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> QualityStore {
        QualityStore::open_in_memory().unwrap()
    }

    fn seeded_job(store: &QualityStore) -> Job {
        let part = Part::new("X-100", Some("B"));
        insert_part(store.conn(), &part).unwrap();
        let job = Job::new("PO-1", "JOB00001", part.id.clone(), "X-100", "B", 10);
        insert_job(store.conn(), &job).unwrap();
        job
    }

    #[test]
    fn test_part_identity_unique() {
        let store = store();
        let part = Part::new("X-100", Some("B"));
        insert_part(store.conn(), &part).unwrap();

        let dup = Part::new("X-100", Some("B"));
        let err = insert_part(store.conn(), &dup).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Different revision is a different identity
        let other = Part::new("X-100", Some("C"));
        insert_part(store.conn(), &other).unwrap();
    }

    #[test]
    fn test_job_roundtrip() {
        let store = store();
        let job = seeded_job(&store);

        let loaded = find_job(store.conn(), &job.id).unwrap().unwrap();
        assert_eq!(loaded.job_number, "JOB00001");
        assert_eq!(loaded.workflow_stage, WorkflowStage::PoReceipt);
        assert_eq!(loaded.quantity, 10);
        assert!(loaded.completed_at.is_none());

        let by_number = find_job_by_number(store.conn(), "JOB00001").unwrap();
        assert!(by_number.is_some());
    }

    #[test]
    fn test_job_number_unique() {
        let store = store();
        let job = seeded_job(&store);

        let part = find_part(store.conn(), &job.part_id).unwrap().unwrap();
        let dup = Job::new("PO-2", "JOB00001", part.id, "X-100", "B", 5);
        let err = insert_job(store.conn(), &dup).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_max_job_number() {
        let store = store();
        assert_eq!(max_job_number(store.conn()).unwrap(), 0);
        seeded_job(&store);
        assert_eq!(max_job_number(store.conn()).unwrap(), 1);
    }

    #[test]
    fn test_dimension_number_unique_per_job() {
        let store = store();
        let job = seeded_job(&store);

        let dim = JobDimension::new(job.id.clone(), 1, "bore", 10.0);
        insert_dimension(store.conn(), &dim).unwrap();
        assert_eq!(next_dimension_number(store.conn(), &job.id).unwrap(), 2);

        let dup = JobDimension::new(job.id.clone(), 1, "bore again", 10.0);
        let err = insert_dimension(store.conn(), &dup).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_sample_position_unique_per_lot() {
        let store = store();
        let job = seeded_job(&store);
        let ec = ExitControl::new(job.id.clone(), 10);
        insert_exit_control(store.conn(), &ec).unwrap();

        insert_sample(store.conn(), &ExitControlSample::new(ec.id.clone(), 3)).unwrap();
        let err =
            insert_sample(store.conn(), &ExitControlSample::new(ec.id.clone(), 3)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_error_report_roundtrip_with_links() {
        let store = store();
        let job = seeded_job(&store);
        let mc = MaterialControl::new(job.id.clone(), "bar stock");
        insert_material_control(store.conn(), &mc).unwrap();

        let mut er = ErrorReport::new(
            job.id.clone(),
            crate::entities::error_report::ErrorType::MaterialSupplier,
            crate::entities::error_report::Severity::Major,
            WorkflowStage::MaterialControl,
            "wrong alloy",
        );
        er.material_control_id = Some(mc.id.clone());
        er.supplier = Some("Acme Metals".to_string());
        insert_error_report(store.conn(), &er).unwrap();

        let loaded = find_error_report(store.conn(), &er.id).unwrap().unwrap();
        assert_eq!(loaded.material_control_id, Some(mc.id));
        assert_eq!(loaded.supplier.as_deref(), Some("Acme Metals"));
        assert_eq!(loaded.status, ErrorStatus::Open);
    }

    #[test]
    fn test_list_error_reports_filters() {
        let store = store();
        let job = seeded_job(&store);
        for severity in ["minor", "major"] {
            let er = ErrorReport::new(
                job.id.clone(),
                crate::entities::error_report::ErrorType::Internal,
                severity.parse().unwrap(),
                WorkflowStage::InProcess,
                format!("issue {severity}"),
            );
            insert_error_report(store.conn(), &er).unwrap();
        }

        let all = list_error_reports(store.conn(), None, None).unwrap();
        assert_eq!(all.len(), 2);
        let open = list_error_reports(store.conn(), Some(ErrorStatus::Open), None).unwrap();
        assert_eq!(open.len(), 2);
        let closed = list_error_reports(store.conn(), Some(ErrorStatus::Closed), None).unwrap();
        assert!(closed.is_empty());
    }
}
