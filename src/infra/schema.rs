//! Per-entity schema initialization.
//!
//! Each entity is set up in its own IMMEDIATE transaction: check whether the
//! table exists, create table + indexes if not, and make sure its ID sequence
//! is registered. A failing entity is logged and skipped; the others still run.

use crate::domain::IdKind;
use crate::error::AppError;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

pub(crate) struct EntitySchema {
    pub table: &'static str,
    pub ddl: &'static str,
    pub id_kind: Option<IdKind>,
}

/// Dependency order: parents before children, sequences first.
pub(crate) const ENTITIES: &[EntitySchema] = &[
    EntitySchema {
        table: "id_sequences",
        ddl: include_str!("../../schema/id_sequences.sql"),
        id_kind: None,
    },
    EntitySchema {
        table: "users",
        ddl: include_str!("../../schema/users.sql"),
        id_kind: None,
    },
    EntitySchema {
        table: "clients",
        ddl: include_str!("../../schema/clients.sql"),
        id_kind: None,
    },
    EntitySchema {
        table: "client_deals",
        ddl: include_str!("../../schema/client_deals.sql"),
        id_kind: Some(IdKind::Deal),
    },
    EntitySchema {
        table: "deal_orders",
        ddl: include_str!("../../schema/deal_orders.sql"),
        id_kind: Some(IdKind::Order),
    },
    EntitySchema {
        table: "shipments",
        ddl: include_str!("../../schema/shipments.sql"),
        id_kind: Some(IdKind::Shipment),
    },
    EntitySchema {
        table: "returns",
        ddl: include_str!("../../schema/returns.sql"),
        id_kind: None,
    },
    EntitySchema {
        table: "invoices",
        ddl: include_str!("../../schema/invoices.sql"),
        id_kind: Some(IdKind::Invoice),
    },
    EntitySchema {
        table: "payments",
        ddl: include_str!("../../schema/payments.sql"),
        id_kind: Some(IdKind::Payment),
    },
    EntitySchema {
        table: "machines",
        ddl: include_str!("../../schema/machines.sql"),
        id_kind: None,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityInit {
    Created,
    Existing,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct InitReport {
    pub entries: Vec<(&'static str, EntityInit)>,
}

impl InitReport {
    pub fn created(&self) -> Vec<&'static str> {
        self.filter(|s| matches!(s, EntityInit::Created))
    }

    pub fn existing(&self) -> Vec<&'static str> {
        self.filter(|s| matches!(s, EntityInit::Existing))
    }

    pub fn failed(&self) -> Vec<(&'static str, &str)> {
        self.entries
            .iter()
            .filter_map(|(t, s)| match s {
                EntityInit::Failed(msg) => Some((*t, msg.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed().is_empty()
    }

    fn filter(&self, pred: impl Fn(&EntityInit) -> bool) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(_, s)| pred(s))
            .map(|(t, _)| *t)
            .collect()
    }
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, AppError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Ensure every entity's table exists. Never fails as a whole: per-entity
/// errors are logged and reported.
pub fn init_schema(conn: &mut Connection, id_suffix: &str) -> InitReport {
    init_entities(conn, ENTITIES, id_suffix)
}

pub(crate) fn init_entities(
    conn: &mut Connection,
    entities: &[EntitySchema],
    id_suffix: &str,
) -> InitReport {
    let mut report = InitReport::default();
    for entity in entities {
        let outcome = match ensure_entity(conn, entity, id_suffix) {
            Ok(true) => {
                log::info!("schema: created {}", entity.table);
                EntityInit::Created
            }
            Ok(false) => EntityInit::Existing,
            Err(e) => {
                log::error!("schema: init of {} failed: {}", entity.table, e);
                EntityInit::Failed(e.to_string())
            }
        };
        report.entries.push((entity.table, outcome));
    }
    report
}

/// Returns `Ok(true)` when the table was created by this call.
fn ensure_entity(
    conn: &mut Connection,
    entity: &EntitySchema,
    id_suffix: &str,
) -> Result<bool, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Checked inside the write lock so concurrent initializers see each other.
    let created = if table_exists(&tx, entity.table)? {
        false
    } else {
        tx.execute_batch(entity.ddl)?;
        true
    };
    if let Some(kind) = entity.id_kind {
        // Existing counters are left as they are.
        tx.execute(
            "INSERT OR IGNORE INTO id_sequences (entity, prefix, suffix, last_value) VALUES (?1, ?2, ?3, 0)",
            params![kind.entity(), kind.prefix(), id_suffix],
        )?;
    }
    tx.commit()?;
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn
    }

    #[test]
    fn first_run_creates_everything() {
        let mut conn = mem();
        let report = init_schema(&mut conn, "25");
        assert!(report.is_complete());
        assert_eq!(report.created().len(), ENTITIES.len());
        for e in ENTITIES {
            assert!(table_exists(&conn, e.table).unwrap(), "{}", e.table);
        }
    }

    #[test]
    fn second_run_is_noop() {
        let mut conn = mem();
        init_schema(&mut conn, "25");
        let report = init_schema(&mut conn, "25");
        assert!(report.created().is_empty());
        assert_eq!(report.existing().len(), ENTITIES.len());
    }

    #[test]
    fn rerun_keeps_counters_and_rows() {
        let mut conn = mem();
        init_schema(&mut conn, "25");
        conn.execute(
            "UPDATE id_sequences SET last_value = 9 WHERE entity = 'invoices'",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO clients (name, created_at, updated_at) VALUES ('Keep', 'x', 'x')",
            [],
        )
        .unwrap();
        init_schema(&mut conn, "26");
        let (v, suffix): (i64, String) = conn
            .query_row(
                "SELECT last_value, suffix FROM id_sequences WHERE entity = 'invoices'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(v, 9);
        assert_eq!(suffix, "25");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM clients", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn failing_entity_does_not_stop_others() {
        let mut conn = mem();
        let entities = [
            EntitySchema {
                table: "id_sequences",
                ddl: include_str!("../../schema/id_sequences.sql"),
                id_kind: None,
            },
            EntitySchema {
                table: "broken",
                ddl: "CREATE TABLE broken (id INTEGER PRIMARY KEY,,)",
                id_kind: None,
            },
            EntitySchema {
                table: "clients",
                ddl: include_str!("../../schema/clients.sql"),
                id_kind: None,
            },
        ];
        let report = init_entities(&mut conn, &entities, "25");
        assert!(!report.is_complete());
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].0, "broken");
        assert_eq!(report.created(), vec!["id_sequences", "clients"]);
        assert!(!table_exists(&conn, "broken").unwrap());
    }

    #[test]
    fn partial_ddl_is_rolled_back() {
        let mut conn = mem();
        let entities = [EntitySchema {
            table: "half",
            ddl: "CREATE TABLE half (id INTEGER PRIMARY KEY); CREATE INDEX idx_half ON missing(id);",
            id_kind: None,
        }];
        let report = init_entities(&mut conn, &entities, "25");
        assert_eq!(report.failed().len(), 1);
        assert!(!table_exists(&conn, "half").unwrap());
    }

    #[test]
    fn sequence_rows_registered_for_id_entities() {
        let mut conn = mem();
        init_schema(&mut conn, "25");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM id_sequences", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n as usize, IdKind::all().len());
    }
}
