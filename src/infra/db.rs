//! SQLite connection handling.

use crate::config::AppConfig;
use crate::error::AppError;
use crate::infra::schema::{init_schema, InitReport};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Storage handle passed explicitly to every use case.
#[derive(Debug)]
pub struct DbPool(pub Mutex<Connection>);

/// Open (creating parent dirs) and configure a database file.
pub fn open_db(db_path: &Path, config: &AppConfig) -> Result<DbPool, AppError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AppError::Db(e.to_string()))?;
    }
    let conn = Connection::open(db_path)?;
    configure(&conn, config, true)?;
    Ok(DbPool(Mutex::new(conn)))
}

/// Open the configured database and ensure every entity's schema exists.
pub fn init_db(config: &AppConfig) -> Result<(DbPool, InitReport), AppError> {
    let pool = open_db(&config.db_path, config)?;
    let report = {
        let mut conn = get_connection(&pool)?;
        init_schema(&mut conn, &config.id_year_suffix)
    };
    Ok((pool, report))
}

/// In-memory database with the full schema, for tests.
pub fn init_test_db() -> DbPool {
    let config = AppConfig::default();
    let mut conn = Connection::open_in_memory().expect("open in-memory db");
    configure(&conn, &config, false).expect("configure in-memory db");
    let report = init_schema(&mut conn, &config.id_year_suffix);
    assert!(report.is_complete(), "schema init failed: {:?}", report.failed());
    DbPool(Mutex::new(conn))
}

fn configure(conn: &Connection, config: &AppConfig, file_backed: bool) -> Result<(), AppError> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    if file_backed && config.journal_wal {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
        log::debug!("journal_mode={}", mode);
    }
    Ok(())
}

/// Scoped acquisition; the connection is released when the guard drops.
pub fn get_connection(pool: &DbPool) -> Result<MutexGuard<'_, Connection>, AppError> {
    pool.0
        .lock()
        .map_err(|_| AppError::Db("database connection lock poisoned".into()))
}

/// Write transaction that takes the database write lock up front, so
/// concurrent writers from other connections serialize instead of failing
/// on lock upgrade.
pub(crate) fn write_tx(conn: &mut Connection) -> Result<Transaction<'_>, AppError> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}
