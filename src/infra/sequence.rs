//! Human-readable ID assignment backed by the `id_sequences` table.

use crate::domain::{format_id, parse_id, IdKind};
use crate::error::AppError;
use crate::infra::{get_connection, DbPool};
use rusqlite::{params, Connection, OptionalExtension};

/// Advance the entity's counter and format the new ID.
///
/// Must run inside the same write transaction as the insert that uses the
/// ID: the increment is one statement, and the transaction holds the write
/// lock, so no two connections can observe the same value. Keys already
/// taken (inserted by hand or under an explicit ID) are skipped.
pub(crate) fn next_id(conn: &Connection, kind: IdKind) -> Result<String, AppError> {
    loop {
        let id = advance(conn, kind)?;
        if !key_taken(conn, kind, &id)? {
            return Ok(id);
        }
        log::debug!("id {} already taken, skipping", id);
    }
}

fn advance(conn: &Connection, kind: IdKind) -> Result<String, AppError> {
    conn.query_row(
        "UPDATE id_sequences SET last_value = last_value + 1 WHERE entity = ?1 RETURNING prefix, suffix, last_value",
        [kind.entity()],
        |r| {
            let prefix: String = r.get(0)?;
            let suffix: String = r.get(1)?;
            Ok(format_id(&prefix, &suffix, r.get(2)?))
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::MissingRelation(format!(
            "no id sequence registered for {}",
            kind.entity()
        )),
        other => other.into(),
    })
}

fn key_taken(conn: &Connection, kind: IdKind, id: &str) -> Result<bool, AppError> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", kind.entity()),
            [id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Use the caller's key if given, otherwise generate one.
///
/// A supplied key in this entity's own `PREFIX-SUFFIX-NNNN` form pulls the
/// counter up to at least its number, so later generated keys don't
/// collide with it. Free-form keys leave the counter alone.
pub(crate) fn assign_id(
    conn: &Connection,
    kind: IdKind,
    supplied: Option<String>,
) -> Result<String, AppError> {
    let id = match supplied.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        Some(id) => id,
        None => return next_id(conn, kind),
    };
    if let Some(parsed) = parse_id(&id).filter(|p| p.prefix == kind.prefix()) {
        conn.execute(
            "UPDATE id_sequences SET last_value = MAX(last_value, ?1) WHERE entity = ?2 AND prefix = ?3 AND suffix = ?4",
            params![parsed.counter, kind.entity(), parsed.prefix, parsed.suffix],
        )?;
    }
    Ok(id)
}

/// Last counter value handed out for `kind` (0 before the first insert).
pub fn sequence_peek(pool: &DbPool, kind: IdKind) -> Result<i64, AppError> {
    let conn = get_connection(pool)?;
    conn.query_row(
        "SELECT last_value FROM id_sequences WHERE entity = ?1",
        [kind.entity()],
        |r| r.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("id sequence {}", kind.entity()))
        }
        other => other.into(),
    })
}
