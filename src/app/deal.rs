//! Client deal use cases.

use crate::domain::timestamps::{next_updated_at, now_ts};
use crate::domain::validation::{date, date_range, opt_text, RequiredFields};
use crate::domain::{IdKind, PaymentMethod};
use crate::error::AppError;
use crate::infra::sequence::assign_id;
use crate::infra::{get_connection, write_tx, DbPool};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const DEAL_COLUMNS: &str = "id, client_id, payment_method, start_date, end_date, contact_person, contact_phone, bank_info, notes, created_at, updated_at";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDto {
    pub id: String,
    pub client_id: i64,
    pub payment_method: PaymentMethod,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub bank_info: Option<serde_json::Value>,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealCreateReq {
    /// Generated as `DEAL-25-NNNN` when absent.
    pub id: Option<String>,
    pub client_id: Option<i64>,
    pub payment_method: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub bank_info: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealUpdateReq {
    pub id: String,
    pub payment_method: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub bank_info: Option<serde_json::Value>,
    pub notes: Option<String>,
}

/// Bank info is stored as serialized JSON and must be an object.
fn encode_bank_info(value: Option<serde_json::Value>) -> Result<Option<String>, AppError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v @ serde_json::Value::Object(_)) => Ok(Some(v.to_string())),
        Some(other) => Err(AppError::Validation(format!(
            "bank_info must be an object, got {}",
            other
        ))),
    }
}

fn deal_from_row(r: &Row<'_>) -> rusqlite::Result<DealDto> {
    let method: String = r.get(2)?;
    let payment_method = method.parse::<PaymentMethod>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into())
    })?;
    let bank_info = match r.get::<_, Option<String>>(7)? {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?,
        ),
        None => None,
    };
    Ok(DealDto {
        id: r.get(0)?,
        client_id: r.get(1)?,
        payment_method,
        start_date: r.get(3)?,
        end_date: r.get(4)?,
        contact_person: r.get(5)?,
        contact_phone: r.get(6)?,
        bank_info,
        notes: r.get(8)?,
        created_at: r.get(9)?,
        updated_at: r.get(10)?,
    })
}

fn deal_get_conn(conn: &Connection, id: &str) -> Result<DealDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM client_deals WHERE id = ?1", DEAL_COLUMNS),
        [id],
        deal_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("deal {}", id)))
}

pub fn deal_create(pool: &DbPool, req: DealCreateReq) -> Result<DealDto, AppError> {
    let mut required = RequiredFields::new();
    let client_id = required.value("client_id", req.client_id).unwrap_or_default();
    let method = required.text("payment_method", req.payment_method.as_deref());
    required.check()?;

    let payment_method = method.parse::<PaymentMethod>()?;
    let start_date = date("start_date", req.start_date)?;
    let end_date = date("end_date", req.end_date)?;
    date_range(start_date.as_deref(), end_date.as_deref())?;
    let bank_info = encode_bank_info(req.bank_info)?;
    let now = now_ts();

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let id = assign_id(&tx, IdKind::Deal, req.id)?;
    tx.execute(
        "INSERT INTO client_deals (id, client_id, payment_method, start_date, end_date, contact_person, contact_phone, bank_info, notes, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            id,
            client_id,
            payment_method.as_str(),
            start_date,
            end_date,
            opt_text(req.contact_person),
            opt_text(req.contact_phone),
            bank_info,
            req.notes.unwrap_or_default(),
            now
        ],
    )?;
    tx.commit()?;
    log::info!("deal {} created for client {}", id, client_id);

    deal_get_conn(&conn, &id)
}

pub fn deal_get(pool: &DbPool, id: &str) -> Result<DealDto, AppError> {
    let conn = get_connection(pool)?;
    deal_get_conn(&conn, id)
}

pub fn deal_list(pool: &DbPool, client_id: Option<i64>) -> Result<Vec<DealDto>, AppError> {
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM client_deals WHERE (?1 IS NULL OR client_id = ?1) ORDER BY created_at DESC, id DESC",
        DEAL_COLUMNS
    ))?;
    let rows = stmt.query_map([client_id], deal_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn deal_update(pool: &DbPool, req: DealUpdateReq) -> Result<DealDto, AppError> {
    let payment_method = req
        .payment_method
        .as_deref()
        .map(str::parse::<PaymentMethod>)
        .transpose()?;
    let start_date = date("start_date", req.start_date)?;
    let end_date = date("end_date", req.end_date)?;

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;

    let current = deal_get_conn(&tx, &req.id)?;
    let payment_method = payment_method.unwrap_or(current.payment_method);
    let start_date = start_date.or(current.start_date);
    let end_date = end_date.or(current.end_date);
    date_range(start_date.as_deref(), end_date.as_deref())?;
    let contact_person = opt_text(req.contact_person).or(current.contact_person);
    let contact_phone = opt_text(req.contact_phone).or(current.contact_phone);
    let bank_info = match req.bank_info {
        Some(v) => encode_bank_info(Some(v))?,
        None => encode_bank_info(current.bank_info)?,
    };
    let notes = req.notes.unwrap_or(current.notes);
    let updated_at = next_updated_at(&current.updated_at);

    tx.execute(
        "UPDATE client_deals SET payment_method = ?1, start_date = ?2, end_date = ?3, contact_person = ?4, contact_phone = ?5, bank_info = ?6, notes = ?7, updated_at = ?8 WHERE id = ?9",
        params![
            payment_method.as_str(),
            start_date,
            end_date,
            contact_person,
            contact_phone,
            bank_info,
            notes,
            updated_at,
            req.id
        ],
    )?;
    tx.commit()?;

    deal_get_conn(&conn, &req.id)
}

pub fn deal_delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let conn = get_connection(pool)?;
    let rows = conn.execute("DELETE FROM client_deals WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("deal {}", id)));
    }
    Ok(())
}
