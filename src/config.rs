//! Store configuration: JSON file with env overrides.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "DYEHOUSE_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "DYEHOUSE_BUSY_TIMEOUT_MS";
pub const ENV_ID_YEAR_SUFFIX: &str = "DYEHOUSE_ID_YEAR_SUFFIX";

fn app_data_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("com.dyehouse.admin")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub busy_timeout_ms: u64,
    /// Fixed middle segment of generated IDs (`INV-25-0001`).
    /// Only read when a sequence is first registered.
    pub id_year_suffix: String,
    pub journal_wal: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: app_data_dir().join("dyehouse.db"),
            busy_timeout_ms: 5_000,
            id_year_suffix: "25".to_string(),
            journal_wal: true,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file if it exists, then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut cfg = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| AppError::Config(format!("{}: {}", p.display(), e)))?;
                serde_json::from_str(&raw)
                    .map_err(|e| AppError::Config(format!("{}: {}", p.display(), e)))?
            }
            _ => AppConfig::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(p) = lookup(ENV_DB_PATH).filter(|s| !s.trim().is_empty()) {
            self.db_path = PathBuf::from(p);
        }
        if let Some(t) = lookup(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = t
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("{} must be an integer, got {:?}", ENV_BUSY_TIMEOUT_MS, t)))?;
        }
        if let Some(s) = lookup(ENV_ID_YEAR_SUFFIX) {
            self.id_year_suffix = s.trim().to_string();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.id_year_suffix.is_empty() || !self.id_year_suffix.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::Config(format!(
                "idYearSuffix must be digits, got {:?}",
                self.id_year_suffix
            )));
        }
        Ok(())
    }
}
