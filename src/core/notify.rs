//! Notification sink - fire-and-forget quality escalation messages
//!
//! The engine fans notifications out only after the triggering write has
//! committed; a failed delivery must never fail or roll back that write,
//! so outcomes are counted and surfaced, not propagated.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;

/// Kind of quality notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    ErrorReport,
    MaterialRejected,
    ExternalRejected,
}

impl NotifyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyKind::ErrorReport => "error_report",
            NotifyKind::MaterialRejected => "material_rejected",
            NotifyKind::ExternalRejected => "external_rejected",
        }
    }
}

/// A notification to one recipient
#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: String,
    pub kind: NotifyKind,
    pub title: String,
    pub message: String,
    /// Entity the notification links to (e.g. "error_report")
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub created: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        kind: NotifyKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            kind,
            title: title.into(),
            message: message.into(),
            entity_type: None,
            entity_id: None,
            created: Utc::now(),
        }
    }

    pub fn linked_to(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Notification delivery failure
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Where notifications are delivered
pub trait NotificationSink {
    fn notify(&mut self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Tally of one fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotifyOutcome {
    pub delivered: usize,
    pub failed: usize,
}

/// Deliver one notification per recipient, swallowing per-recipient
/// failures. Returns the delivery tally.
pub fn fan_out(
    sink: &mut dyn NotificationSink,
    recipients: &[String],
    template: &Notification,
) -> NotifyOutcome {
    let mut outcome = NotifyOutcome::default();
    for recipient in recipients {
        let mut notification = template.clone();
        notification.recipient = recipient.clone();
        match sink.notify(&notification) {
            Ok(()) => outcome.delivered += 1,
            Err(_) => outcome.failed += 1,
        }
    }
    outcome
}

/// Store-backed sink writing to the notifications table
///
/// Holds its own connection to the quality database so delivery is
/// independent of any transaction in flight on the engine's connection.
pub struct StoreSink {
    conn: Connection,
}

impl StoreSink {
    pub fn open(db_path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }
}

impl NotificationSink for StoreSink {
    fn notify(&mut self, n: &Notification) -> Result<(), NotifyError> {
        self.conn
            .execute(
                "INSERT INTO notifications (recipient, kind, title, message, entity_type, entity_id, created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    n.recipient,
                    n.kind.as_str(),
                    n.title,
                    n.message,
                    n.entity_type,
                    n.entity_id,
                    n.created.to_rfc3339(),
                ],
            )
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// In-memory sink for tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    pub sent: Vec<Notification>,
    /// When set, every delivery fails (for testing swallow semantics)
    pub fail_all: bool,
}

impl NotificationSink for MemorySink {
    fn notify(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail_all {
            return Err(NotifyError::Delivery("sink unavailable".to_string()));
        }
        self.sent.push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_delivers_per_recipient() {
        let mut sink = MemorySink::default();
        let template = Notification::new("", NotifyKind::ErrorReport, "t", "m")
            .linked_to("error_report", "ERR-X");
        let recipients = vec!["jsmith".to_string(), "admin".to_string()];

        let outcome = fan_out(&mut sink, &recipients, &template);
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(sink.sent.len(), 2);
        assert_eq!(sink.sent[0].recipient, "jsmith");
        assert_eq!(sink.sent[1].recipient, "admin");
        assert_eq!(sink.sent[0].entity_id.as_deref(), Some("ERR-X"));
    }

    #[test]
    fn test_fan_out_swallows_failures() {
        let mut sink = MemorySink {
            fail_all: true,
            ..Default::default()
        };
        let template = Notification::new("", NotifyKind::MaterialRejected, "t", "m");
        let outcome = fan_out(&mut sink, &["a".to_string(), "b".to_string()], &template);
        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.failed, 2);
    }
}
