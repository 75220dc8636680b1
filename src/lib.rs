pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;

use config::AppConfig;
use error::AppError;
use infra::{init_db, DbPool, InitReport};

/// Open the configured store and ensure the schema. Entities whose setup
/// failed are logged and listed in the report; the store is still returned.
pub fn bootstrap(config: &AppConfig) -> Result<(DbPool, InitReport), AppError> {
    config.validate()?;
    log::info!("DB path: {:?}", config.db_path);

    let (pool, report) = init_db(config).map_err(|e| {
        log::error!("DB open failed: {}", e);
        e
    })?;
    if report.is_complete() {
        log::info!(
            "schema ready: {} created, {} existing",
            report.created().len(),
            report.existing().len()
        );
    } else {
        log::warn!("schema incomplete, failed entities: {:?}", report.failed());
    }
    Ok((pool, report))
}
