//! Append-only audit trail

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::core::store::StoreError;

/// A recorded audit entry
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
}

/// Append an audit entry
pub fn record(
    conn: &Connection,
    actor: Option<&str>,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    description: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO audit_log (actor, action, entity_type, entity_id, description, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            actor,
            action,
            entity_type,
            entity_id,
            description,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

fn entry_from_row(row: &Row) -> rusqlite::Result<AuditEntry> {
    let created: String = row.get(5)?;
    Ok(AuditEntry {
        actor: row.get(0)?,
        action: row.get(1)?,
        entity_type: row.get(2)?,
        entity_id: row.get(3)?,
        description: row.get(4)?,
        created: DateTime::parse_from_rfc3339(&created)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Audit entries for one entity, oldest first
pub fn history(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<AuditEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT actor, action, entity_type, entity_id, description, created
         FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![entity_type, entity_id], entry_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::QualityStore;

    #[test]
    fn test_record_and_history() {
        let store = QualityStore::open_in_memory().unwrap();
        record(
            store.conn(),
            Some("inspector1"),
            "status_change",
            "job",
            "JOB-X",
            "Changed stage from po_receipt to revision_check",
        )
        .unwrap();
        record(
            store.conn(),
            None,
            "update",
            "job",
            "JOB-X",
            "Verified drawing revision",
        )
        .unwrap();

        let entries = history(store.conn(), "job", "JOB-X").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "status_change");
        assert_eq!(entries[0].actor.as_deref(), Some("inspector1"));
        assert!(entries[1].actor.is_none());
    }

    #[test]
    fn test_history_scoped_to_entity() {
        let store = QualityStore::open_in_memory().unwrap();
        record(store.conn(), None, "create", "job", "JOB-A", "a").unwrap();
        record(store.conn(), None, "create", "job", "JOB-B", "b").unwrap();

        assert_eq!(history(store.conn(), "job", "JOB-A").unwrap().len(), 1);
    }
}
