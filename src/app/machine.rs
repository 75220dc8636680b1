//! Machinery register: dyeing machines, dryers, stenters.

use crate::domain::timestamps::{next_updated_at, now_ts};
use crate::domain::validation::{date, non_negative_f64, opt_text, RequiredFields};
use crate::error::AppError;
use crate::infra::{get_connection, write_tx, DbPool};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const MACHINE_COLUMNS: &str =
    "id, name, machine_type, capacity_kg, status, last_maintenance, notes, created_at, updated_at";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDto {
    pub id: i64,
    pub name: String,
    pub machine_type: String,
    pub capacity_kg: Option<f64>,
    pub status: String,
    pub last_maintenance: Option<String>,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineCreateReq {
    pub name: Option<String>,
    pub machine_type: Option<String>,
    pub capacity_kg: Option<f64>,
    pub status: Option<String>,
    pub last_maintenance: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineUpdateReq {
    pub id: i64,
    pub name: Option<String>,
    pub machine_type: Option<String>,
    pub capacity_kg: Option<f64>,
    pub status: Option<String>,
    pub last_maintenance: Option<String>,
    pub notes: Option<String>,
}

fn machine_from_row(r: &Row<'_>) -> rusqlite::Result<MachineDto> {
    Ok(MachineDto {
        id: r.get(0)?,
        name: r.get(1)?,
        machine_type: r.get(2)?,
        capacity_kg: r.get(3)?,
        status: r.get(4)?,
        last_maintenance: r.get(5)?,
        notes: r.get(6)?,
        created_at: r.get(7)?,
        updated_at: r.get(8)?,
    })
}

fn machine_get_conn(conn: &Connection, id: i64) -> Result<MachineDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM machines WHERE id = ?1", MACHINE_COLUMNS),
        [id],
        machine_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("machine {}", id)))
}

pub fn machine_create(pool: &DbPool, req: MachineCreateReq) -> Result<MachineDto, AppError> {
    let mut required = RequiredFields::new();
    let name = required.text("name", req.name.as_deref());
    let machine_type = required.text("machine_type", req.machine_type.as_deref());
    required.check()?;
    let capacity_kg = req
        .capacity_kg
        .map(|c| non_negative_f64("capacity_kg", c))
        .transpose()?;
    let status = opt_text(req.status).unwrap_or_else(|| "operational".to_string());
    let last_maintenance = date("last_maintenance", req.last_maintenance)?;
    let now = now_ts();

    let conn = get_connection(pool)?;
    conn.execute(
        "INSERT INTO machines (name, machine_type, capacity_kg, status, last_maintenance, notes, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            name,
            machine_type,
            capacity_kg,
            status,
            last_maintenance,
            req.notes.unwrap_or_default(),
            now
        ],
    )?;
    machine_get_conn(&conn, conn.last_insert_rowid())
}

pub fn machine_get(pool: &DbPool, id: i64) -> Result<MachineDto, AppError> {
    let conn = get_connection(pool)?;
    machine_get_conn(&conn, id)
}

pub fn machine_list(pool: &DbPool, status: Option<&str>) -> Result<Vec<MachineDto>, AppError> {
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM machines WHERE (?1 IS NULL OR status = ?1) ORDER BY name COLLATE NOCASE",
        MACHINE_COLUMNS
    ))?;
    let rows = stmt.query_map([status], machine_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn machine_update(pool: &DbPool, req: MachineUpdateReq) -> Result<MachineDto, AppError> {
    let capacity_kg = req
        .capacity_kg
        .map(|c| non_negative_f64("capacity_kg", c))
        .transpose()?;
    let last_maintenance = date("last_maintenance", req.last_maintenance)?;

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let current = machine_get_conn(&tx, req.id)?;
    let name = opt_text(req.name).unwrap_or(current.name);
    let machine_type = opt_text(req.machine_type).unwrap_or(current.machine_type);
    let capacity_kg = capacity_kg.or(current.capacity_kg);
    let status = opt_text(req.status).unwrap_or(current.status);
    let last_maintenance = last_maintenance.or(current.last_maintenance);
    let notes = req.notes.unwrap_or(current.notes);
    let updated_at = next_updated_at(&current.updated_at);

    tx.execute(
        "UPDATE machines SET name = ?1, machine_type = ?2, capacity_kg = ?3, status = ?4, last_maintenance = ?5, notes = ?6, updated_at = ?7 WHERE id = ?8",
        params![name, machine_type, capacity_kg, status, last_maintenance, notes, updated_at, req.id],
    )?;
    tx.commit()?;

    machine_get_conn(&conn, req.id)
}

pub fn machine_delete(pool: &DbPool, id: i64) -> Result<(), AppError> {
    let conn = get_connection(pool)?;
    let rows = conn.execute("DELETE FROM machines WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("machine {}", id)));
    }
    Ok(())
}
