//! Derived order counters: shipments and returns feed
//! total_received_qty / total_returned_qty.

use dyehouse::app::{
    client_create, deal_create, deal_order_create, deal_order_get, return_create, return_delete,
    return_list, return_update, shipment_create, shipment_delete, shipment_list, shipment_update,
    ClientCreateReq, DealCreateReq, DealOrderCreateReq, ReturnCreateReq, ReturnUpdateReq,
    ShipmentCreateReq, ShipmentUpdateReq,
};
use dyehouse::config::AppConfig;
use dyehouse::infra::db::{init_db, init_test_db, open_db};
use dyehouse::infra::DbPool;
use std::sync::Arc;
use std::thread;

// ──────────────────────── Helper ────────────────────────

fn seed_order(pool: &DbPool) -> String {
    let client = client_create(
        pool,
        ClientCreateReq {
            name: Some("Lotus Fabrics".into()),
            ..Default::default()
        },
    )
    .unwrap();
    let deal = deal_create(
        pool,
        DealCreateReq {
            client_id: Some(client.id),
            payment_method: Some("Bank".into()),
            ..Default::default()
        },
    )
    .unwrap();
    deal_order_create(
        pool,
        DealOrderCreateReq {
            deal_id: Some(deal.id),
            fabric_type: Some("Cotton jersey".into()),
            quantity_ordered: Some(100),
            ..Default::default()
        },
    )
    .unwrap()
    .id
}

fn ship(pool: &DbPool, order_id: &str, qty: i64) {
    shipment_create(
        pool,
        ShipmentCreateReq {
            order_id: Some(order_id.to_string()),
            quantity_shipped: Some(qty),
            ..Default::default()
        },
    )
    .unwrap();
}

fn give_back(pool: &DbPool, order_id: &str, qty: i64) {
    return_create(
        pool,
        ReturnCreateReq {
            order_id: Some(order_id.to_string()),
            qty_returned: Some(qty),
            reason: Some("shade mismatch".into()),
            ..Default::default()
        },
    )
    .unwrap();
}

fn file_config(dir: &tempfile::TempDir) -> AppConfig {
    AppConfig {
        db_path: dir.path().join("dyehouse.db"),
        busy_timeout_ms: 30_000,
        ..AppConfig::default()
    }
}

// ══════════════════════════════════════════════════════════
//  shipments
// ══════════════════════════════════════════════════════════

#[test]
fn new_order_starts_at_zero() {
    let pool = init_test_db();
    let order = deal_order_get(&pool, &seed_order(&pool)).unwrap();
    assert_eq!(order.total_received_qty, 0);
    assert_eq!(order.total_returned_qty, 0);
    assert_eq!(order.outstanding_qty, 100);
}

#[test]
fn two_shipments_sum_onto_order() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    ship(&pool, &order_id, 5);
    ship(&pool, &order_id, 3);
    let order = deal_order_get(&pool, &order_id).unwrap();
    assert_eq!(order.total_received_qty, 8);
    assert_eq!(order.outstanding_qty, 92);
}

#[test]
fn shipment_touches_order_updated_at() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    let before = deal_order_get(&pool, &order_id).unwrap();
    ship(&pool, &order_id, 1);
    let after = deal_order_get(&pool, &order_id).unwrap();
    assert!(after.updated_at > before.updated_at);
    assert_eq!(after.created_at, before.created_at);
}

#[test]
fn shipment_ids_are_generated() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    ship(&pool, &order_id, 2);
    let list = shipment_list(&pool, Some(&order_id)).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, "SHP-25-0001");
}

#[test]
fn shipment_for_missing_order_leaves_nothing_behind() {
    let pool = init_test_db();
    let err = shipment_create(
        &pool,
        ShipmentCreateReq {
            order_id: Some("ORD-25-9999".into()),
            quantity_shipped: Some(4),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
    assert!(shipment_list(&pool, None).unwrap().is_empty());
    // the ID counter rolled back with the insert
    assert_eq!(
        dyehouse::infra::sequence_peek(&pool, dyehouse::domain::IdKind::Shipment).unwrap(),
        0
    );
}

#[test]
fn failed_increment_rolls_back_the_shipment() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    {
        let conn = pool.0.lock().unwrap();
        // Counter update is forced to fail; the shipment insert must not survive it.
        conn.execute_batch(
            "CREATE TRIGGER block_counter BEFORE UPDATE OF total_received_qty ON deal_orders
             BEGIN SELECT RAISE(ABORT, 'counter locked'); END;",
        )
        .unwrap();
    }
    let err = shipment_create(
        &pool,
        ShipmentCreateReq {
            order_id: Some(order_id.clone()),
            quantity_shipped: Some(7),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("counter locked"), "{}", err);
    assert!(shipment_list(&pool, Some(&order_id)).unwrap().is_empty());
    assert_eq!(deal_order_get(&pool, &order_id).unwrap().total_received_qty, 0);
}

#[test]
fn overflowing_shipment_is_rejected_and_rolled_back() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    ship(&pool, &order_id, i64::MAX);
    let err = shipment_create(
        &pool,
        ShipmentCreateReq {
            order_id: Some(order_id.clone()),
            quantity_shipped: Some(1),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(shipment_list(&pool, Some(&order_id)).unwrap().len(), 1);
    let order = deal_order_get(&pool, &order_id).unwrap();
    assert_eq!(order.total_received_qty, i64::MAX);
    assert_eq!(order.outstanding_qty, 0);
    assert_eq!(
        dyehouse::infra::sequence_peek(&pool, dyehouse::domain::IdKind::Shipment).unwrap(),
        1
    );
}

#[test]
fn huge_order_with_return_stays_readable() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    dyehouse::app::deal_order_update(
        &pool,
        dyehouse::app::DealOrderUpdateReq {
            id: order_id.clone(),
            quantity_ordered: Some(i64::MAX),
            ..Default::default()
        },
    )
    .unwrap();
    give_back(&pool, &order_id, 1);
    let order = deal_order_get(&pool, &order_id).unwrap();
    assert_eq!(order.total_returned_qty, 1);
    assert_eq!(order.outstanding_qty, i64::MAX);
}

#[test]
fn missing_fields_rejected_before_write() {
    let pool = init_test_db();
    let err = shipment_create(&pool, ShipmentCreateReq::default()).unwrap_err();
    assert_eq!(err.code(), "MISSING_FIELDS");
    assert!(err.to_string().contains("order_id"));
    assert!(err.to_string().contains("quantity_shipped"));
}

#[test]
fn negative_shipment_rejected() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    let err = shipment_create(
        &pool,
        ShipmentCreateReq {
            order_id: Some(order_id.clone()),
            quantity_shipped: Some(-2),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(deal_order_get(&pool, &order_id).unwrap().total_received_qty, 0);
}

#[test]
fn deleting_shipment_keeps_counter() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    ship(&pool, &order_id, 6);
    let id = shipment_list(&pool, Some(&order_id)).unwrap()[0].id.clone();
    shipment_delete(&pool, &id).unwrap();
    assert!(shipment_list(&pool, Some(&order_id)).unwrap().is_empty());
    assert_eq!(deal_order_get(&pool, &order_id).unwrap().total_received_qty, 6);
}

#[test]
fn shipment_update_cannot_move_counter() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    ship(&pool, &order_id, 6);
    let id = shipment_list(&pool, Some(&order_id)).unwrap()[0].id.clone();
    let updated = shipment_update(
        &pool,
        ShipmentUpdateReq {
            id,
            vehicle_no: Some("KA-01-2345".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.vehicle_no.as_deref(), Some("KA-01-2345"));
    assert_eq!(updated.quantity_shipped, 6);
    assert_eq!(deal_order_get(&pool, &order_id).unwrap().total_received_qty, 6);
}

// ══════════════════════════════════════════════════════════
//  returns
// ══════════════════════════════════════════════════════════

#[test]
fn returns_sum_onto_order() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    ship(&pool, &order_id, 50);
    give_back(&pool, &order_id, 4);
    give_back(&pool, &order_id, 0);
    give_back(&pool, &order_id, 2);
    let order = deal_order_get(&pool, &order_id).unwrap();
    assert_eq!(order.total_returned_qty, 6);
    assert_eq!(order.total_received_qty, 50);
    assert_eq!(order.outstanding_qty, 56);
    assert_eq!(return_list(&pool, Some(&order_id)).unwrap().len(), 3);
}

#[test]
fn negative_return_rejected() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    let err = return_create(
        &pool,
        ReturnCreateReq {
            order_id: Some(order_id.clone()),
            qty_returned: Some(-1),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(return_list(&pool, None).unwrap().is_empty());
}

#[test]
fn negative_return_blocked_by_check_constraint() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    let conn = pool.0.lock().unwrap();
    let err = conn
        .execute(
            "INSERT INTO returns (order_id, qty_returned, reason, created_at, updated_at) VALUES (?1, -3, '', 'x', 'x')",
            [&order_id],
        )
        .unwrap_err();
    let err: dyehouse::error::AppError = err.into();
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
}

#[test]
fn return_update_and_delete_leave_counter() {
    let pool = init_test_db();
    let order_id = seed_order(&pool);
    give_back(&pool, &order_id, 3);
    let ret = &return_list(&pool, Some(&order_id)).unwrap()[0];
    let updated = return_update(
        &pool,
        ReturnUpdateReq {
            id: ret.id,
            reason: Some("stain".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.reason, "stain");
    assert_eq!(updated.qty_returned, 3);
    return_delete(&pool, ret.id).unwrap();
    assert_eq!(deal_order_get(&pool, &order_id).unwrap().total_returned_qty, 3);
}

// ══════════════════════════════════════════════════════════
//  concurrency
// ══════════════════════════════════════════════════════════

#[test]
fn concurrent_shipments_on_shared_pool() {
    let pool = Arc::new(init_test_db());
    let order_id = seed_order(&pool);
    let handles: Vec<_> = (1..=8i64)
        .map(|t| {
            let pool = Arc::clone(&pool);
            let order_id = order_id.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    ship(&pool, &order_id, t);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    // 10 * (1 + 2 + ... + 8)
    assert_eq!(deal_order_get(&pool, &order_id).unwrap().total_received_qty, 360);
}

#[test]
fn concurrent_writers_on_separate_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);
    let (pool, report) = init_db(&config).unwrap();
    assert!(report.is_complete());
    let order_id = seed_order(&pool);
    drop(pool);

    let handles: Vec<_> = (1..=6i64)
        .map(|t| {
            let config = config.clone();
            let order_id = order_id.clone();
            thread::spawn(move || {
                let pool = open_db(&config.db_path, &config).unwrap();
                for i in 0..8 {
                    if i % 2 == 0 {
                        ship(&pool, &order_id, t);
                    } else {
                        give_back(&pool, &order_id, 1);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let pool = open_db(&config.db_path, &config).unwrap();
    let order = deal_order_get(&pool, &order_id).unwrap();
    let shipped: i64 = shipment_list(&pool, Some(&order_id))
        .unwrap()
        .iter()
        .map(|s| s.quantity_shipped)
        .sum();
    let returned: i64 = return_list(&pool, Some(&order_id))
        .unwrap()
        .iter()
        .map(|r| r.qty_returned)
        .sum();
    assert_eq!(shipped, 4 * (1 + 2 + 3 + 4 + 5 + 6));
    assert_eq!(order.total_received_qty, shipped);
    assert_eq!(returned, 24);
    assert_eq!(order.total_returned_qty, returned);
}
