//! Payment use cases.

use crate::domain::timestamps::{next_updated_at, now_ts};
use crate::domain::validation::{date, positive_f64, RequiredFields};
use crate::domain::{IdKind, PaymentMethod};
use crate::error::AppError;
use crate::infra::sequence::assign_id;
use crate::infra::{get_connection, write_tx, DbPool};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const PAYMENT_COLUMNS: &str =
    "id, invoice_id, amount, method, payment_date, is_active, notes, created_at, updated_at";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub id: String,
    pub invoice_id: String,
    pub amount: f64,
    pub method: PaymentMethod,
    pub payment_date: Option<String>,
    pub is_active: bool,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreateReq {
    /// Generated as `PAY-25-NNNN` when absent.
    pub id: Option<String>,
    pub invoice_id: Option<String>,
    pub amount: Option<f64>,
    pub method: Option<String>,
    pub payment_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdateReq {
    pub id: String,
    pub amount: Option<f64>,
    pub method: Option<String>,
    pub payment_date: Option<String>,
    pub notes: Option<String>,
}

fn payment_from_row(r: &Row<'_>) -> rusqlite::Result<PaymentDto> {
    let method: String = r.get(3)?;
    Ok(PaymentDto {
        id: r.get(0)?,
        invoice_id: r.get(1)?,
        amount: r.get(2)?,
        method: method
            .parse::<PaymentMethod>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?,
        payment_date: r.get(4)?,
        is_active: r.get::<_, i32>(5)? != 0,
        notes: r.get(6)?,
        created_at: r.get(7)?,
        updated_at: r.get(8)?,
    })
}

fn payment_get_conn(conn: &Connection, id: &str) -> Result<PaymentDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS),
        [id],
        payment_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("payment {}", id)))
}

pub fn payment_create(pool: &DbPool, req: PaymentCreateReq) -> Result<PaymentDto, AppError> {
    let mut required = RequiredFields::new();
    let invoice_id = required.text("invoice_id", req.invoice_id.as_deref());
    let amount = required.value("amount", req.amount).unwrap_or_default();
    let method = required.text("method", req.method.as_deref());
    required.check()?;
    let amount = positive_f64("amount", amount)?;
    let method = method.parse::<PaymentMethod>()?;
    let payment_date = date("payment_date", req.payment_date)?;
    let now = now_ts();

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let id = assign_id(&tx, IdKind::Payment, req.id)?;
    tx.execute(
        "INSERT INTO payments (id, invoice_id, amount, method, payment_date, is_active, notes, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?7)",
        params![
            id,
            invoice_id,
            amount,
            method.as_str(),
            payment_date,
            req.notes.unwrap_or_default(),
            now
        ],
    )?;
    tx.commit()?;
    log::info!("payment {} of {} recorded on invoice {}", id, amount, invoice_id);

    payment_get_conn(&conn, &id)
}

pub fn payment_get(pool: &DbPool, id: &str) -> Result<PaymentDto, AppError> {
    let conn = get_connection(pool)?;
    payment_get_conn(&conn, id)
}

pub fn payment_list(
    pool: &DbPool,
    invoice_id: Option<&str>,
    only_active: bool,
) -> Result<Vec<PaymentDto>, AppError> {
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payments WHERE (?1 IS NULL OR invoice_id = ?1) AND (?2 = 0 OR is_active = 1) ORDER BY id",
        PAYMENT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![invoice_id, only_active as i32], payment_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn payment_update(pool: &DbPool, req: PaymentUpdateReq) -> Result<PaymentDto, AppError> {
    let amount = req.amount.map(|a| positive_f64("amount", a)).transpose()?;
    let method = req
        .method
        .as_deref()
        .map(str::parse::<PaymentMethod>)
        .transpose()?;
    let payment_date = date("payment_date", req.payment_date)?;

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let current = payment_get_conn(&tx, &req.id)?;
    let amount = amount.unwrap_or(current.amount);
    let method = method.unwrap_or(current.method);
    let payment_date = payment_date.or(current.payment_date);
    let notes = req.notes.unwrap_or(current.notes);
    let updated_at = next_updated_at(&current.updated_at);

    tx.execute(
        "UPDATE payments SET amount = ?1, method = ?2, payment_date = ?3, notes = ?4, updated_at = ?5 WHERE id = ?6",
        params![amount, method.as_str(), payment_date, notes, updated_at, req.id],
    )?;
    tx.commit()?;

    payment_get_conn(&conn, &req.id)
}

/// Soft-void: the row stays but no longer counts toward the invoice total.
pub fn payment_deactivate(pool: &DbPool, id: &str) -> Result<PaymentDto, AppError> {
    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let current = payment_get_conn(&tx, id)?;
    tx.execute(
        "UPDATE payments SET is_active = 0, updated_at = ?1 WHERE id = ?2",
        params![next_updated_at(&current.updated_at), id],
    )?;
    tx.commit()?;

    payment_get_conn(&conn, id)
}

pub fn payment_delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let conn = get_connection(pool)?;
    let rows = conn.execute("DELETE FROM payments WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("payment {}", id)));
    }
    Ok(())
}
