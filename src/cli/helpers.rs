//! Shared helper functions for CLI commands

use miette::{IntoDiagnostic, Result};
use rusqlite::Connection;
use serde::Serialize;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::notify::NotifyOutcome;
use crate::core::project::Project;
use crate::core::store;
use crate::entities::job::Job;

/// Locate the project, honoring an explicit --project path
pub fn open_project(global: &GlobalOpts) -> Result<Project> {
    let project = match &global.project {
        Some(path) => Project::discover_from(path),
        None => Project::discover(),
    };
    project.map_err(|e| miette::miette!("{}", e))
}

/// Parse an entity id, checking it carries the expected prefix
pub fn parse_id(s: &str, expected: EntityPrefix) -> Result<EntityId> {
    EntityId::parse_expecting(s, expected).map_err(|e| miette::miette!("{}", e))
}

/// Resolve a job from either its internal job number ("JOB00042") or its
/// full entity id ("JOB-01H...")
pub fn resolve_job(conn: &Connection, reference: &str) -> Result<Job> {
    let job = if reference.contains('-') {
        let id = parse_id(reference, EntityPrefix::Job)?;
        store::find_job(conn, &id).map_err(|e| miette::miette!("{}", e))?
    } else {
        store::find_job_by_number(conn, &reference.to_uppercase())
            .map_err(|e| miette::miette!("{}", e))?
    };
    job.ok_or_else(|| miette::miette!("No job found matching '{}'", reference))
}

/// Format an EntityId for display, truncating if too long
pub fn format_short_id(id: &EntityId) -> String {
    let s = id.to_string();
    if s.len() > 16 {
        format!("{}...", &s[..13])
    } else {
        s
    }
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.saturating_sub(3)])
    }
}

/// Print a serializable value in the requested show format (yaml unless
/// json was asked for)
pub fn print_show<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
        }
        _ => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
        }
    }
    Ok(())
}

/// Surface failed notification deliveries without failing the command
pub fn warn_undelivered(outcome: &NotifyOutcome, quiet: bool) {
    if outcome.failed > 0 && !quiet {
        eprintln!(
            "{} {} notification(s) could not be delivered",
            console::style("!").yellow(),
            outcome.failed
        );
    }
}

/// Report how many quality users were notified
pub fn report_notified(outcome: &NotifyOutcome, quiet: bool) {
    if quiet {
        return;
    }
    if outcome.delivered > 0 {
        println!(
            "   {}",
            console::style(format!("Notified {} quality user(s)", outcome.delivered)).dim()
        );
    } else if outcome.failed == 0 {
        println!(
            "   {}",
            console::style("No quality users in the roster to notify").dim()
        );
    }
    warn_undelivered(outcome, quiet);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_short_id() {
        let id = EntityId::new(EntityPrefix::Job);
        let formatted = format_short_id(&id);
        // Prefixed ULIDs are 30 chars, so always truncated
        assert!(formatted.len() <= 16);
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
    }
}
