//! Invoice use cases.

use crate::domain::timestamps::{next_updated_at, now_ts};
use crate::domain::validation::{date, non_negative_f64, opt_text, RequiredFields};
use crate::domain::IdKind;
use crate::error::AppError;
use crate::infra::sequence::assign_id;
use crate::infra::{get_connection, write_tx, DbPool};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const INVOICE_COLUMNS: &str = "id, order_id, amount, status, due_date, notes, created_at, updated_at";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDto {
    pub id: String,
    pub order_id: String,
    pub amount: f64,
    pub status: String,
    pub due_date: Option<String>,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceCreateReq {
    /// Generated as `INV-25-NNNN` when absent.
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceUpdateReq {
    pub id: String,
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    pub if_match_updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListReq {
    pub order_id: Option<String>,
    pub status: Option<String>,
}

fn invoice_from_row(r: &Row<'_>) -> rusqlite::Result<InvoiceDto> {
    Ok(InvoiceDto {
        id: r.get(0)?,
        order_id: r.get(1)?,
        amount: r.get(2)?,
        status: r.get(3)?,
        due_date: r.get(4)?,
        notes: r.get(5)?,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

fn invoice_get_conn(conn: &Connection, id: &str) -> Result<InvoiceDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS),
        [id],
        invoice_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("invoice {}", id)))
}

pub fn invoice_create(pool: &DbPool, req: InvoiceCreateReq) -> Result<InvoiceDto, AppError> {
    let mut required = RequiredFields::new();
    let order_id = required.text("order_id", req.order_id.as_deref());
    let amount = required.value("amount", req.amount).unwrap_or_default();
    required.check()?;
    let amount = non_negative_f64("amount", amount)?;
    let status = opt_text(req.status).unwrap_or_else(|| "unpaid".to_string());
    let due_date = date("due_date", req.due_date)?;
    let now = now_ts();

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let id = assign_id(&tx, IdKind::Invoice, req.id)?;
    tx.execute(
        "INSERT INTO invoices (id, order_id, amount, status, due_date, notes, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![id, order_id, amount, status, due_date, req.notes.unwrap_or_default(), now],
    )?;
    tx.commit()?;
    log::info!("invoice {} issued for order {}", id, order_id);

    invoice_get_conn(&conn, &id)
}

pub fn invoice_get(pool: &DbPool, id: &str) -> Result<InvoiceDto, AppError> {
    let conn = get_connection(pool)?;
    invoice_get_conn(&conn, id)
}

pub fn invoice_list(pool: &DbPool, req: InvoiceListReq) -> Result<Vec<InvoiceDto>, AppError> {
    let order_id = opt_text(req.order_id);
    let status = opt_text(req.status);
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM invoices WHERE (?1 IS NULL OR order_id = ?1) AND (?2 IS NULL OR status = ?2) ORDER BY id",
        INVOICE_COLUMNS
    ))?;
    let rows = stmt.query_map(params![order_id, status], invoice_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn invoice_update(pool: &DbPool, req: InvoiceUpdateReq) -> Result<InvoiceDto, AppError> {
    let amount = req
        .amount
        .map(|a| non_negative_f64("amount", a))
        .transpose()?;
    let due_date = date("due_date", req.due_date)?;

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let current = invoice_get_conn(&tx, &req.id)?;
    if let Some(ref if_match) = req.if_match_updated_at {
        if if_match != &current.updated_at {
            return Err(AppError::Conflict(format!("invoice {} was modified", req.id)));
        }
    }

    let amount = amount.unwrap_or(current.amount);
    let status = opt_text(req.status).unwrap_or(current.status);
    let due_date = due_date.or(current.due_date);
    let notes = req.notes.unwrap_or(current.notes);
    let updated_at = next_updated_at(&current.updated_at);

    tx.execute(
        "UPDATE invoices SET amount = ?1, status = ?2, due_date = ?3, notes = ?4, updated_at = ?5 WHERE id = ?6",
        params![amount, status, due_date, notes, updated_at, req.id],
    )?;
    tx.commit()?;

    invoice_get_conn(&conn, &req.id)
}

/// Deletes the invoice and, by cascade, its payments.
pub fn invoice_delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let conn = get_connection(pool)?;
    let rows = conn.execute("DELETE FROM invoices WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("invoice {}", id)));
    }
    log::info!("invoice {} deleted", id);
    Ok(())
}

/// Sum of active payments recorded against the invoice.
pub fn invoice_paid_total(pool: &DbPool, id: &str) -> Result<f64, AppError> {
    let conn = get_connection(pool)?;
    invoice_get_conn(&conn, id)?;
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM payments WHERE invoice_id = ?1 AND is_active = 1",
        [id],
        |r| r.get(0),
    )?;
    Ok(total)
}
