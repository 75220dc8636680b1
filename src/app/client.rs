//! Client use cases.

use crate::domain::timestamps::{next_updated_at, now_ts};
use crate::domain::validation::{opt_text, RequiredFields};
use crate::error::AppError;
use crate::infra::{get_connection, write_tx, DbPool};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const CLIENT_COLUMNS: &str =
    "id, name, company, email, phone, address, notes, created_at, updated_at";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDto {
    pub id: i64,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCreateReq {
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdateReq {
    pub id: i64,
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

fn client_from_row(r: &Row<'_>) -> rusqlite::Result<ClientDto> {
    Ok(ClientDto {
        id: r.get(0)?,
        name: r.get(1)?,
        company: r.get(2)?,
        email: r.get(3)?,
        phone: r.get(4)?,
        address: r.get(5)?,
        notes: r.get(6)?,
        created_at: r.get(7)?,
        updated_at: r.get(8)?,
    })
}

fn client_get_conn(conn: &Connection, id: i64) -> Result<ClientDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM clients WHERE id = ?1", CLIENT_COLUMNS),
        [id],
        client_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("client {}", id)))
}

pub fn client_create(pool: &DbPool, req: ClientCreateReq) -> Result<ClientDto, AppError> {
    let mut required = RequiredFields::new();
    let name = required.text("name", req.name.as_deref());
    required.check()?;

    let now = now_ts();
    let conn = get_connection(pool)?;
    conn.execute(
        "INSERT INTO clients (name, company, email, phone, address, notes, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            name,
            opt_text(req.company),
            opt_text(req.email),
            opt_text(req.phone),
            opt_text(req.address),
            req.notes.unwrap_or_default(),
            now
        ],
    )?;
    client_get_conn(&conn, conn.last_insert_rowid())
}

pub fn client_get(pool: &DbPool, id: i64) -> Result<ClientDto, AppError> {
    let conn = get_connection(pool)?;
    client_get_conn(&conn, id)
}

/// Case-insensitive substring search over name and company.
pub fn client_list(pool: &DbPool, search: Option<&str>) -> Result<Vec<ClientDto>, AppError> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM clients WHERE (?1 IS NULL OR name LIKE ?1 OR company LIKE ?1) ORDER BY name COLLATE NOCASE",
        CLIENT_COLUMNS
    ))?;
    let rows = stmt.query_map([pattern], client_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn client_update(pool: &DbPool, req: ClientUpdateReq) -> Result<ClientDto, AppError> {
    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;

    let current = client_get_conn(&tx, req.id)?;
    let name = opt_text(req.name).unwrap_or(current.name);
    let company = opt_text(req.company).or(current.company);
    let email = opt_text(req.email).or(current.email);
    let phone = opt_text(req.phone).or(current.phone);
    let address = opt_text(req.address).or(current.address);
    let notes = req.notes.unwrap_or(current.notes);
    let updated_at = next_updated_at(&current.updated_at);

    tx.execute(
        "UPDATE clients SET name = ?1, company = ?2, email = ?3, phone = ?4, address = ?5, notes = ?6, updated_at = ?7 WHERE id = ?8",
        params![name, company, email, phone, address, notes, updated_at, req.id],
    )?;
    tx.commit()?;

    client_get_conn(&conn, req.id)
}

/// Deletes the client and, by cascade, its deals and everything under them.
pub fn client_delete(pool: &DbPool, id: i64) -> Result<(), AppError> {
    let conn = get_connection(pool)?;
    let rows = conn.execute("DELETE FROM clients WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("client {}", id)));
    }
    log::info!("client {} deleted", id);
    Ok(())
}
