//! User credential rows

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::{is_unique_violation, now_rfc3339};
use crate::types::LearnSpaceError;

/// User row from database
#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

impl UserRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Insert a user. A taken email is a conflict.
pub fn insert_user(
    conn: &Connection,
    email: &str,
    password_hash: &str,
) -> Result<UserRow, LearnSpaceError> {
    let user = UserRow {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        created_at: now_rfc3339(),
    };

    conn.execute(
        "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        params![user.id, user.email, user.password_hash, user.created_at],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            LearnSpaceError::Conflict("User already exists".into())
        } else {
            LearnSpaceError::from(e)
        }
    })?;

    Ok(user)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>, LearnSpaceError> {
    Ok(conn
        .query_row(
            "SELECT * FROM users WHERE email = ?",
            params![email],
            UserRow::from_row,
        )
        .optional()?)
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>, LearnSpaceError> {
    Ok(conn
        .query_row("SELECT * FROM users WHERE id = ?", params![id], UserRow::from_row)
        .optional()?)
}
