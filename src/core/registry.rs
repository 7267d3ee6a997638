//! Part registry - single source of truth for part identity
//!
//! Every code path that creates or edits a job resolves its part here, so
//! the same physical design revision can never end up as two part records.

use rusqlite::Connection;

use crate::core::error::EngineError;
use crate::core::identity::EntityId;
use crate::core::store::{self, StoreError};
use crate::entities::part::{normalize_revision, Part};

/// Resolve a `(part_number, revision)` pair to its canonical part id,
/// creating the part on first sight. Returns `(part_id, was_created)`.
///
/// A `None` revision and an empty-string revision are the same identity.
/// If the part exists and a non-empty, differing description is supplied,
/// the stored description is updated (identity fields never change).
///
/// Under concurrent first-time submissions of the same identity the insert
/// can lose the race to the store's uniqueness constraint; that is treated
/// as "someone else just created it" and answered by retrying the lookup.
pub fn resolve_or_create(
    conn: &Connection,
    part_number: &str,
    revision: Option<&str>,
    description: Option<&str>,
) -> Result<(EntityId, bool), EngineError> {
    let part_number = part_number.trim();
    if part_number.is_empty() {
        return Err(EngineError::validation("part number must not be empty"));
    }
    let revision = normalize_revision(revision);

    if let Some(existing) = store::find_part_by_identity(conn, part_number, &revision)? {
        maybe_update_description(conn, &existing, description)?;
        return Ok((existing.id, false));
    }

    let mut part = Part::new(part_number, Some(&revision));
    part.description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from);

    match store::insert_part(conn, &part) {
        Ok(()) => Ok((part.id, true)),
        Err(StoreError::Conflict(_)) => {
            // Lost the create race; the row must be there now
            match store::find_part_by_identity(conn, part_number, &revision)? {
                Some(existing) => {
                    maybe_update_description(conn, &existing, description)?;
                    Ok((existing.id, false))
                }
                None => Err(EngineError::Conflict {
                    part_number: part_number.to_string(),
                    revision,
                }),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn maybe_update_description(
    conn: &Connection,
    existing: &Part,
    description: Option<&str>,
) -> Result<(), EngineError> {
    if let Some(desc) = description.map(str::trim).filter(|d| !d.is_empty()) {
        if existing.description.as_deref() != Some(desc) {
            store::update_part_description(conn, &existing.id, desc)?;
        }
    }
    Ok(())
}
