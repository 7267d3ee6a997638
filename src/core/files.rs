//! Attachment store
//!
//! Certificates, photos, and measurement sheets live as plain files under
//! the project's attachments directory; the database only holds the
//! reference (stored path + content hash). The engine never interprets
//! file contents.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A stored attachment reference
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Entity the file belongs to (e.g. "error_report")
    pub entity_type: String,
    pub entity_id: String,
    /// Path relative to the attachments directory
    pub stored_path: String,
    /// Original file name as supplied by the uploader
    pub file_name: String,
    /// SHA-256 of the file contents, hex encoded
    pub sha256: String,
    pub uploaded_by: Option<String>,
    pub created: DateTime<Utc>,
}

/// Errors from the attachment store
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("source file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("io error storing attachment: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

/// Copy a file into the attachments directory and record the reference.
///
/// The stored name is timestamp-prefixed to keep repeated uploads of the
/// same file apart. Returns the recorded attachment.
pub fn store_attachment(
    conn: &Connection,
    attachments_dir: &Path,
    entity_type: &str,
    entity_id: &str,
    source: &Path,
    uploaded_by: Option<&str>,
) -> Result<Attachment, AttachmentError> {
    if !source.is_file() {
        return Err(AttachmentError::SourceMissing(source.to_path_buf()));
    }
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());

    let contents = fs::read(source)?;
    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let sha256 = format!("{:x}", hasher.finalize());

    let now = Utc::now();
    let stored_name = format!("{}_{}", now.format("%Y%m%d_%H%M%S"), file_name);
    let subdir = attachments_dir.join(entity_type);
    fs::create_dir_all(&subdir)?;
    fs::write(subdir.join(&stored_name), &contents)?;

    let attachment = Attachment {
        entity_type: entity_type.to_string(),
        entity_id: entity_id.to_string(),
        stored_path: format!("{}/{}", entity_type, stored_name),
        file_name,
        sha256,
        uploaded_by: uploaded_by.map(String::from),
        created: now,
    };

    conn.execute(
        "INSERT INTO attachments (entity_type, entity_id, stored_path, file_name, sha256, uploaded_by, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            attachment.entity_type,
            attachment.entity_id,
            attachment.stored_path,
            attachment.file_name,
            attachment.sha256,
            attachment.uploaded_by,
            attachment.created.to_rfc3339(),
        ],
    )?;
    Ok(attachment)
}

fn attachment_from_row(row: &Row) -> rusqlite::Result<Attachment> {
    let created: String = row.get(6)?;
    Ok(Attachment {
        entity_type: row.get(0)?,
        entity_id: row.get(1)?,
        stored_path: row.get(2)?,
        file_name: row.get(3)?,
        sha256: row.get(4)?,
        uploaded_by: row.get(5)?,
        created: DateTime::parse_from_rfc3339(&created)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Attachments recorded against one entity, oldest first
pub fn list_attachments(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Attachment>, AttachmentError> {
    let mut stmt = conn.prepare(
        "SELECT entity_type, entity_id, stored_path, file_name, sha256, uploaded_by, created
         FROM attachments WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![entity_type, entity_id], attachment_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::QualityStore;
    use tempfile::tempdir;

    #[test]
    fn test_store_and_list_attachment() {
        let store = QualityStore::open_in_memory().unwrap();
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("cert.pdf");
        fs::write(&source, b"material certificate contents").unwrap();
        let attachments_dir = tmp.path().join("attachments");

        let stored = store_attachment(
            store.conn(),
            &attachments_dir,
            "material_control",
            "MATC-X",
            &source,
            Some("inspector1"),
        )
        .unwrap();

        assert_eq!(stored.file_name, "cert.pdf");
        assert!(stored.stored_path.starts_with("material_control/"));
        assert!(stored.stored_path.ends_with("_cert.pdf"));
        assert_eq!(stored.sha256.len(), 64);
        assert!(attachments_dir.join(&stored.stored_path).is_file());

        let listed = list_attachments(store.conn(), "material_control", "MATC-X").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].sha256, stored.sha256);
        assert_eq!(listed[0].uploaded_by.as_deref(), Some("inspector1"));
    }

    #[test]
    fn test_missing_source_rejected() {
        let store = QualityStore::open_in_memory().unwrap();
        let tmp = tempdir().unwrap();
        let err = store_attachment(
            store.conn(),
            &tmp.path().join("attachments"),
            "job",
            "JOB-X",
            &tmp.path().join("nope.pdf"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AttachmentError::SourceMissing(_)));
    }

    #[test]
    fn test_same_file_twice_records_both() {
        let store = QualityStore::open_in_memory().unwrap();
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("photo.jpg");
        fs::write(&source, b"jpeg bytes").unwrap();
        let dir = tmp.path().join("attachments");

        let a = store_attachment(store.conn(), &dir, "error_report", "ERR-X", &source, None).unwrap();
        // Same second is possible; the content hash still matches
        let b = store_attachment(store.conn(), &dir, "error_report", "ERR-X", &source, None).unwrap();
        assert_eq!(a.sha256, b.sha256);

        let listed = list_attachments(store.conn(), "error_report", "ERR-X").unwrap();
        assert_eq!(listed.len(), 2);
    }
}
