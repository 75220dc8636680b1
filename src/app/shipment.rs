//! Shipment use cases. Creating a shipment adds its quantity to the order's
//! `total_received_qty` in the same transaction.

use crate::app::order::{increment_counter, OrderCounter};
use crate::domain::timestamps::{next_updated_at, now_ts};
use crate::domain::validation::{date, non_negative_i64, opt_text, RequiredFields};
use crate::domain::IdKind;
use crate::error::AppError;
use crate::infra::sequence::assign_id;
use crate::infra::{get_connection, write_tx, DbPool};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const SHIPMENT_COLUMNS: &str =
    "id, order_id, quantity_shipped, shipment_date, vehicle_no, notes, created_at, updated_at";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDto {
    pub id: String,
    pub order_id: String,
    pub quantity_shipped: i64,
    pub shipment_date: Option<String>,
    pub vehicle_no: Option<String>,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentCreateReq {
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub quantity_shipped: Option<i64>,
    pub shipment_date: Option<String>,
    pub vehicle_no: Option<String>,
    pub notes: Option<String>,
}

/// Quantity and order are fixed once the shipment exists.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentUpdateReq {
    pub id: String,
    pub shipment_date: Option<String>,
    pub vehicle_no: Option<String>,
    pub notes: Option<String>,
}

fn shipment_from_row(r: &Row<'_>) -> rusqlite::Result<ShipmentDto> {
    Ok(ShipmentDto {
        id: r.get(0)?,
        order_id: r.get(1)?,
        quantity_shipped: r.get(2)?,
        shipment_date: r.get(3)?,
        vehicle_no: r.get(4)?,
        notes: r.get(5)?,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

fn shipment_get_conn(conn: &Connection, id: &str) -> Result<ShipmentDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM shipments WHERE id = ?1", SHIPMENT_COLUMNS),
        [id],
        shipment_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("shipment {}", id)))
}

pub fn shipment_create(pool: &DbPool, req: ShipmentCreateReq) -> Result<ShipmentDto, AppError> {
    let mut required = RequiredFields::new();
    let order_id = required.text("order_id", req.order_id.as_deref());
    let quantity = required.value("quantity_shipped", req.quantity_shipped).unwrap_or_default();
    required.check()?;
    let quantity = non_negative_i64("quantity_shipped", quantity)?;
    let shipment_date = date("shipment_date", req.shipment_date)?;
    let now = now_ts();

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let id = assign_id(&tx, IdKind::Shipment, req.id)?;
    tx.execute(
        "INSERT INTO shipments (id, order_id, quantity_shipped, shipment_date, vehicle_no, notes, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            id,
            order_id,
            quantity,
            shipment_date,
            opt_text(req.vehicle_no),
            req.notes.unwrap_or_default(),
            now
        ],
    )?;
    increment_counter(&tx, &order_id, OrderCounter::Received, quantity)?;
    tx.commit()?;
    log::info!("shipment {} for order {}: +{} received", id, order_id, quantity);

    shipment_get_conn(&conn, &id)
}

pub fn shipment_get(pool: &DbPool, id: &str) -> Result<ShipmentDto, AppError> {
    let conn = get_connection(pool)?;
    shipment_get_conn(&conn, id)
}

pub fn shipment_list(pool: &DbPool, order_id: Option<&str>) -> Result<Vec<ShipmentDto>, AppError> {
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM shipments WHERE (?1 IS NULL OR order_id = ?1) ORDER BY created_at, id",
        SHIPMENT_COLUMNS
    ))?;
    let rows = stmt.query_map([order_id], shipment_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn shipment_update(pool: &DbPool, req: ShipmentUpdateReq) -> Result<ShipmentDto, AppError> {
    let shipment_date = date("shipment_date", req.shipment_date)?;

    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;
    let current = shipment_get_conn(&tx, &req.id)?;
    let shipment_date = shipment_date.or(current.shipment_date);
    let vehicle_no = opt_text(req.vehicle_no).or(current.vehicle_no);
    let notes = req.notes.unwrap_or(current.notes);
    let updated_at = next_updated_at(&current.updated_at);

    tx.execute(
        "UPDATE shipments SET shipment_date = ?1, vehicle_no = ?2, notes = ?3, updated_at = ?4 WHERE id = ?5",
        params![shipment_date, vehicle_no, notes, updated_at, req.id],
    )?;
    tx.commit()?;

    shipment_get_conn(&conn, &req.id)
}

/// Removes the row only; the order's `total_received_qty` keeps the
/// quantity that was added when the shipment was created.
pub fn shipment_delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let conn = get_connection(pool)?;
    let rows = conn.execute("DELETE FROM shipments WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("shipment {}", id)));
    }
    Ok(())
}
