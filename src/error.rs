//! Stable error codes for API callers.

use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Db(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Missing relation: {0}")]
    MissingRelation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) => "DB_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::MissingFields(_) => "MISSING_FIELDS",
            Self::Constraint(_) => "CONSTRAINT_VIOLATION",
            Self::MissingRelation(_) => "MISSING_RELATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn to_serde(&self) -> AppErrorDto {
        let details = match self {
            Self::MissingFields(fields) => Some(serde_json::json!({ "missingFields": fields })),
            _ => None,
        };
        AppErrorDto {
            code: self.code().to_string(),
            message: self.to_string(),
            details,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound("record not found".into()),
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::Constraint(e.to_string())
            }
            _ => {
                let msg = e.to_string();
                if msg.contains("no such table") {
                    AppError::MissingRelation(msg)
                } else {
                    AppError::Db(msg)
                }
            }
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_serde().serialize(serializer)
    }
}

#[derive(Debug, Serialize)]
pub struct AppErrorDto {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_message_lists_every_field() {
        let err = AppError::MissingFields(vec!["password".into(), "email".into()]);
        assert_eq!(err.to_string(), "Missing required fields: password, email");
        assert_eq!(err.code(), "MISSING_FIELDS");
        let dto = err.to_serde();
        assert_eq!(dto.details.unwrap()["missingFields"][0], "password");
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let err: AppError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn constraint_failure_is_classified() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL CHECK (v >= 0))")
            .unwrap();
        let err: AppError = conn
            .execute("INSERT INTO t (v) VALUES (-1)", [])
            .unwrap_err()
            .into();
        assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
    }

    #[test]
    fn missing_table_is_classified() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: AppError = conn
            .execute("INSERT INTO nowhere (v) VALUES (1)", [])
            .unwrap_err()
            .into();
        assert_eq!(err.code(), "MISSING_RELATION");
    }
}
