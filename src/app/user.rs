//! User use cases: create, get, list, update, delete, verify password.

use crate::domain::timestamps::{next_updated_at, now_ts};
use crate::domain::validation::{opt_text, RequiredFields};
use crate::error::AppError;
use crate::infra::{get_connection, write_tx, DbPool};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, email, role, status, remarks, created_at, updated_at";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub remarks: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Form payload. Every field is optional at the type level so that a
/// request missing several fields reports all of them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreateReq {
    #[serde(default)]
    pub user_data: UserData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateReq {
    pub id: i64,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("sha256${}${}", salt, digest(&salt, password))
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn password_matches(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("sha256"), Some(salt), Some(hash)) => digest(salt, password) == hash,
        _ => false,
    }
}

fn validate_email(email: &str) -> Result<(), AppError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::Validation(format!("email {:?} is malformed", email))),
    }
}

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<UserDto> {
    Ok(UserDto {
        id: r.get(0)?,
        username: r.get(1)?,
        email: r.get(2)?,
        role: r.get(3)?,
        status: r.get(4)?,
        remarks: r.get(5)?,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

fn user_get_conn(conn: &Connection, id: i64) -> Result<UserDto, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
}

pub fn user_create(pool: &DbPool, req: UserCreateReq) -> Result<UserDto, AppError> {
    let data = req.user_data;
    let mut required = RequiredFields::new();
    let username = required.text("username", data.username.as_deref());
    let email = required.text("email", data.email.as_deref());
    // Not trimmed: whitespace is part of the password.
    let password = required
        .value("password", data.password.filter(|p| !p.is_empty()))
        .unwrap_or_default();
    required.check()?;
    validate_email(&email)?;

    let role = opt_text(data.role).unwrap_or_else(|| "staff".to_string());
    let status = opt_text(data.status).unwrap_or_else(|| "active".to_string());
    let remarks = data.remarks.unwrap_or_default();
    let now = now_ts();

    let conn = get_connection(pool)?;
    conn.execute(
        "INSERT INTO users (username, email, password_hash, role, status, remarks, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![username, email, hash_password(&password), role, status, remarks, now],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("user created: id={} username={}", id, username);
    user_get_conn(&conn, id)
}

pub fn user_get(pool: &DbPool, id: i64) -> Result<UserDto, AppError> {
    let conn = get_connection(pool)?;
    user_get_conn(&conn, id)
}

pub fn user_list(pool: &DbPool, status: Option<&str>) -> Result<Vec<UserDto>, AppError> {
    let conn = get_connection(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE (?1 IS NULL OR status = ?1) ORDER BY username COLLATE NOCASE",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map([status], user_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn user_update(pool: &DbPool, req: UserUpdateReq) -> Result<UserDto, AppError> {
    let mut conn = get_connection(pool)?;
    let tx = write_tx(&mut conn)?;

    let current = user_get_conn(&tx, req.id)?;
    let username = opt_text(req.username).unwrap_or(current.username);
    let email = opt_text(req.email).unwrap_or(current.email);
    validate_email(&email)?;
    let role = opt_text(req.role).unwrap_or(current.role);
    let status = opt_text(req.status).unwrap_or(current.status);
    let remarks = req.remarks.unwrap_or(current.remarks);
    let updated_at = next_updated_at(&current.updated_at);

    tx.execute(
        "UPDATE users SET username = ?1, email = ?2, role = ?3, status = ?4, remarks = ?5, updated_at = ?6 WHERE id = ?7",
        params![username, email, role, status, remarks, updated_at, req.id],
    )?;
    if let Some(password) = req.password.filter(|p| !p.is_empty()) {
        tx.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![hash_password(&password), req.id],
        )?;
    }
    tx.commit()?;

    user_get_conn(&conn, req.id)
}

pub fn user_delete(pool: &DbPool, id: i64) -> Result<(), AppError> {
    let conn = get_connection(pool)?;
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("user {}", id)));
    }
    Ok(())
}

/// Look up by username and check the password. Inactive users never verify.
pub fn user_verify_password(
    pool: &DbPool,
    username: &str,
    password: &str,
) -> Result<Option<UserDto>, AppError> {
    let conn = get_connection(pool)?;
    let found: Option<(i64, String, String)> = conn
        .query_row(
            "SELECT id, password_hash, status FROM users WHERE username = ?1",
            [username.trim()],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    match found {
        Some((id, hash, status)) if status == "active" && password_matches(&hash, password) => {
            Ok(Some(user_get_conn(&conn, id)?))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted() {
        let a = hash_password("secret");
        let b = hash_password("secret");
        assert_ne!(a, b);
        assert!(password_matches(&a, "secret"));
        assert!(!password_matches(&a, "Secret"));
    }

    #[test]
    fn unknown_hash_format_never_matches() {
        assert!(!password_matches("plain", "plain"));
        assert!(!password_matches("md5$x$y", "y"));
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("a@b.io").is_ok());
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("@b.io").is_err());
    }
}
