//! Deal order use cases.
//!
//! `total_received_qty` and `total_returned_qty` are derived counters: no
//! request type here carries them. They move only through
//! [`crate::app::shipment_create`] and [`crate::app::return_create`].

use crate::domain::timestamps::{next_updated_at, now_ts};
use crate::domain::validation::{date, non_negative_f64, non_negative_i64, opt_text, RequiredFields};
use crate::domain::IdKind;
use crate::error::AppError;
use crate::infra::sequence::assign_id;
use crate::infra::{get_connection, write_tx, DbPool};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const ORDER_COLUMNS: &str = "id, deal_id, fabric_type, color, quantity_ordered, unit_price, status, order_date, notes, total_received_qty, total_returned_qty, created_at, updated_at";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealOrderDto {
    pub id: String,
    pub deal_id: String,
    pub fabric_type: String,
    pub color: Option<String>,
    pub quantity_ordered: i64,
    pub unit_price: f64,
    pub status: String,
    pub order_date: Option<String>,
    pub notes: String,
    pub total_received_qty: i64,
    pub total_returned_qty: i64,
    /// Ordered quantity not yet received net of returns, floored at 0.
    pub outstanding_qty: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealOrderCreateReq {
    pub id: Option<String>,
    pub deal_id: Option<String>,
    pub fabric_type: Option<String>,
    pub color: Option<String>,
    pub quantity_ordered: Option<i64>,
    pub unit_price: Option<f64>,
    pub status: Option<String>,
    pub order_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealOrderUpdateReq {
    pub id: String,
    pub fabric_type: Option<String>,
    pub color: Option<String>,
    pub quantity_ordered: Option<i64>,
    pub unit_price: Option<f64>,
    pub status: Option<String>,
    pub order_date: Option<String>,
    pub notes: Option<String>,
    pub if_match_updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealOrderListReq {
    pub deal_id: Option<String>,
    pub status: Option<String>,
}

/// Widened so extreme totals can't overflow; clamped into `0..=i64::MAX`.
fn outstanding(ordered: i64, received: i64, returned: i64) -> i64 {
    let net = ordered as i128 - received as i128 + returned as i128;
    net.clamp(0, i64::MAX as i128) as i64
}

fn order_from_row(r: &Row<'_>) -> rusqlite::Result<DealOrderDto> {
    let quantity_ordered: i64 = r.get(4)?;
    let total_received_qty: i64 = r.get(9)?;
    let total_returned_qty: i64 = r.get(10)?;
    Ok(DealOrderDto {
        id: r.get(0)?,
        deal_id: r.get(1)?,
        fabric_type: r.get(2)?,
        color: r.get(3)?,
        quantity_ordered,
        unit_price: r.get(5)?,
        status: r.get(6)?,
        order_date: r.get(7)?,
        notes: r.get(8)?,
        total_received_qty,
        total_returned_qty,
        outstanding_qty: outstanding(quantity_ordered, total_received_qty, total_returned_qty),
        created_at: r.get(11)?,
        updated_at: r.get(12)?,
    })
}

pub(crate) fn order_get_conn(conn: &Connection, id: &str) -> Result<DealOrderDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM deal_orders WHERE id = ?1", ORDER_COLUMNS),
        [id],
        order_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("order {}", id)))
}

pub fn deal_order_create(pool: &DbPool, req: DealOrderCreateReq) -> Result<DealOrderDto, AppError> {
    let mut required = RequiredFields::new();
    let deal_id = required.text("deal_id", req.deal_id.as_deref());
    let fabric_type = required.text("fabric_type", req.fabric_type.as_deref());
    required.check()?;

    let quantity_ordered = non_negative_i64("quantity_ordered", req.quantity_ordered.unwrap_or(0))?;
    let unit_price = non_negative_f64("unit_price", req.unit_price.unwrap_or(0.0))?;
    let status = opt_text(req.status).unwrap_or_else(|| "pending".to_string());
    let order_date = date("order_date", req.order_date)?;
    let now = now_ts();

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let id = assign_id(&tx, IdKind::Order, req.id)?;
    tx.execute(
        "INSERT INTO deal_orders (id, deal_id, fabric_type, color, quantity_ordered, unit_price, status, order_date, notes, total_received_qty, total_returned_qty, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, ?10, ?10)",
        params![
            id,
            deal_id,
            fabric_type,
            opt_text(req.color),
            quantity_ordered,
            unit_price,
            status,
            order_date,
            req.notes.unwrap_or_default(),
            now
        ],
    )?;
    tx.commit()?;
    log::info!("order {} created under deal {}", id, deal_id);

    order_get_conn(&conn, &id)
}

pub fn deal_order_get(pool: &DbPool, id: &str) -> Result<DealOrderDto, AppError> {
    let conn = get_connection(pool)?;
    order_get_conn(&conn, id)
}

pub fn deal_order_list(pool: &DbPool, req: DealOrderListReq) -> Result<Vec<DealOrderDto>, AppError> {
    let deal_id = opt_text(req.deal_id);
    let status = opt_text(req.status);
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM deal_orders WHERE (?1 IS NULL OR deal_id = ?1) AND (?2 IS NULL OR status = ?2) ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    ))?;
    let rows = stmt.query_map(params![deal_id, status], order_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn deal_order_update(pool: &DbPool, req: DealOrderUpdateReq) -> Result<DealOrderDto, AppError> {
    let quantity_ordered = req
        .quantity_ordered
        .map(|q| non_negative_i64("quantity_ordered", q))
        .transpose()?;
    let unit_price = req
        .unit_price
        .map(|p| non_negative_f64("unit_price", p))
        .transpose()?;
    let order_date = date("order_date", req.order_date)?;

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;

    let current = order_get_conn(&tx, &req.id)?;
    if let Some(ref if_match) = req.if_match_updated_at {
        if if_match != &current.updated_at {
            return Err(AppError::Conflict(format!("order {} was modified", req.id)));
        }
    }

    let fabric_type = opt_text(req.fabric_type).unwrap_or(current.fabric_type);
    let color = opt_text(req.color).or(current.color);
    let quantity_ordered = quantity_ordered.unwrap_or(current.quantity_ordered);
    let unit_price = unit_price.unwrap_or(current.unit_price);
    let status = opt_text(req.status).unwrap_or(current.status);
    let order_date = order_date.or(current.order_date);
    let notes = req.notes.unwrap_or(current.notes);
    let updated_at = next_updated_at(&current.updated_at);

    tx.execute(
        "UPDATE deal_orders SET fabric_type = ?1, color = ?2, quantity_ordered = ?3, unit_price = ?4, status = ?5, order_date = ?6, notes = ?7, updated_at = ?8 WHERE id = ?9",
        params![
            fabric_type,
            color,
            quantity_ordered,
            unit_price,
            status,
            order_date,
            notes,
            updated_at,
            req.id
        ],
    )?;
    tx.commit()?;

    order_get_conn(&conn, &req.id)
}

/// Deletes the order with its shipments, returns, invoices and payments.
pub fn deal_order_delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let conn = get_connection(pool)?;
    let rows = conn.execute("DELETE FROM deal_orders WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("order {}", id)));
    }
    Ok(())
}

/// Add to one of the order's derived counters inside the caller's
/// transaction. The increment is a single UPDATE so concurrent writers
/// can't lose each other's updates.
pub(crate) fn increment_counter(
    conn: &Connection,
    order_id: &str,
    counter: OrderCounter,
    delta: i64,
) -> Result<(), AppError> {
    let (received, returned, current_updated_at): (i64, i64, String) = conn
        .query_row(
            "SELECT total_received_qty, total_returned_qty, updated_at FROM deal_orders WHERE id = ?1",
            [order_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?;
    // SQLite would silently turn an overflowing sum into a REAL.
    let total = match counter {
        OrderCounter::Received => received,
        OrderCounter::Returned => returned,
    };
    if total.checked_add(delta).is_none() {
        return Err(AppError::Validation(format!(
            "order {} {} would overflow",
            order_id,
            counter.column()
        )));
    }
    let sql = match counter {
        OrderCounter::Received => {
            "UPDATE deal_orders SET total_received_qty = total_received_qty + ?1, updated_at = ?2 WHERE id = ?3"
        }
        OrderCounter::Returned => {
            "UPDATE deal_orders SET total_returned_qty = total_returned_qty + ?1, updated_at = ?2 WHERE id = ?3"
        }
    };
    let rows = conn.execute(
        sql,
        params![delta, next_updated_at(&current_updated_at), order_id],
    )?;
    if rows != 1 {
        return Err(AppError::Db(format!(
            "order {} counter update touched {} rows",
            order_id, rows
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OrderCounter {
    Received,
    Returned,
}

impl OrderCounter {
    fn column(&self) -> &'static str {
        match self {
            Self::Received => "total_received_qty",
            Self::Returned => "total_returned_qty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outstanding_is_floored() {
        assert_eq!(outstanding(100, 30, 0), 70);
        assert_eq!(outstanding(100, 30, 10), 80);
        assert_eq!(outstanding(10, 30, 0), 0);
    }

    #[test]
    fn outstanding_survives_extreme_totals() {
        assert_eq!(outstanding(i64::MAX, 0, 1), i64::MAX);
        assert_eq!(outstanding(i64::MAX, 1, 1), i64::MAX);
        assert_eq!(outstanding(0, i64::MAX, 0), 0);
        assert_eq!(outstanding(i64::MAX, i64::MAX, i64::MAX), i64::MAX);
    }
}
