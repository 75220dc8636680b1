//! Return use cases. Creating a return adds `qty_returned` to the order's
//! `total_returned_qty` in the same transaction.

use crate::app::order::{increment_counter, OrderCounter};
use crate::domain::timestamps::{next_updated_at, now_ts};
use crate::domain::validation::{date, non_negative_i64, RequiredFields};
use crate::error::AppError;
use crate::infra::{get_connection, write_tx, DbPool};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const RETURN_COLUMNS: &str =
    "id, order_id, qty_returned, reason, return_date, created_at, updated_at";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDto {
    pub id: i64,
    pub order_id: String,
    pub qty_returned: i64,
    pub reason: String,
    pub return_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnCreateReq {
    pub order_id: Option<String>,
    pub qty_returned: Option<i64>,
    pub reason: Option<String>,
    pub return_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnUpdateReq {
    pub id: i64,
    pub reason: Option<String>,
    pub return_date: Option<String>,
}

fn return_from_row(r: &Row<'_>) -> rusqlite::Result<ReturnDto> {
    Ok(ReturnDto {
        id: r.get(0)?,
        order_id: r.get(1)?,
        qty_returned: r.get(2)?,
        reason: r.get(3)?,
        return_date: r.get(4)?,
        created_at: r.get(5)?,
        updated_at: r.get(6)?,
    })
}

fn return_get_conn(conn: &Connection, id: i64) -> Result<ReturnDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM returns WHERE id = ?1", RETURN_COLUMNS),
        [id],
        return_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("return {}", id)))
}

pub fn return_create(pool: &DbPool, req: ReturnCreateReq) -> Result<ReturnDto, AppError> {
    let mut required = RequiredFields::new();
    let order_id = required.text("order_id", req.order_id.as_deref());
    let qty = required.value("qty_returned", req.qty_returned).unwrap_or_default();
    required.check()?;
    let qty = non_negative_i64("qty_returned", qty)?;
    let return_date = date("return_date", req.return_date)?;
    let now = now_ts();

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    tx.execute(
        "INSERT INTO returns (order_id, qty_returned, reason, return_date, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![order_id, qty, req.reason.unwrap_or_default(), return_date, now],
    )?;
    let id = tx.last_insert_rowid();
    increment_counter(&tx, &order_id, OrderCounter::Returned, qty)?;
    tx.commit()?;
    log::info!("return {} for order {}: +{} returned", id, order_id, qty);

    return_get_conn(&conn, id)
}

pub fn return_get(pool: &DbPool, id: i64) -> Result<ReturnDto, AppError> {
    let conn = get_connection(pool)?;
    return_get_conn(&conn, id)
}

pub fn return_list(pool: &DbPool, order_id: Option<&str>) -> Result<Vec<ReturnDto>, AppError> {
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM returns WHERE (?1 IS NULL OR order_id = ?1) ORDER BY id",
        RETURN_COLUMNS
    ))?;
    let rows = stmt.query_map([order_id], return_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn return_update(pool: &DbPool, req: ReturnUpdateReq) -> Result<ReturnDto, AppError> {
    let return_date = date("return_date", req.return_date)?;

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let current = return_get_conn(&tx, req.id)?;
    let reason = req.reason.unwrap_or(current.reason);
    let return_date = return_date.or(current.return_date);
    let updated_at = next_updated_at(&current.updated_at);

    tx.execute(
        "UPDATE returns SET reason = ?1, return_date = ?2, updated_at = ?3 WHERE id = ?4",
        params![reason, return_date, updated_at, req.id],
    )?;
    tx.commit()?;

    return_get_conn(&conn, req.id)
}

/// Removes the row only; `total_returned_qty` is not reduced.
pub fn return_delete(pool: &DbPool, id: i64) -> Result<(), AppError> {
    let conn = get_connection(pool)?;
    let rows = conn.execute("DELETE FROM returns WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("return {}", id)));
    }
    Ok(())
}
