//! SQLite store for users, courses, blocks and presentations
//!
//! The [`Store`] handle is opened once at process start, shared through the
//! application state, and closed explicitly at shutdown. All access goes
//! through [`Store::with_conn`] / [`Store::with_conn_mut`], which serialize
//! callers on a single connection.
//!
//! ## Tables
//!
//! - `users` - credentials (email, argon2 hash)
//! - `courses` - course metadata plus the serialized default selection
//! - `blocks` - one row per document block, ordered by `position`
//! - `presentations` - named block-id subsets of a course

pub mod blocks;
pub mod courses;
pub mod presentations;
pub mod schema;
pub mod users;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, ErrorCode};
use tracing::{debug, info};

use crate::types::LearnSpaceError;

/// Handle to the relational store
pub struct Store {
    conn: Mutex<Option<Connection>>,
}

impl Store {
    /// Open or create the database file
    pub fn open(path: &Path) -> Result<Self, LearnSpaceError> {
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)
            .map_err(|e| LearnSpaceError::Database(format!("Failed to open SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| LearnSpaceError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self, LearnSpaceError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|e| {
            LearnSpaceError::Database(format!("Failed to open in-memory SQLite: {}", e))
        })?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, LearnSpaceError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| LearnSpaceError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Run a read with shared access to the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LearnSpaceError>
    where
        F: FnOnce(&Connection) -> Result<T, LearnSpaceError>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|e| LearnSpaceError::Internal(format!("Lock poisoned: {}", e)))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| LearnSpaceError::Internal("store is closed".into()))?;
        f(conn)
    }

    /// Run a write (usually a transaction) with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, LearnSpaceError>
    where
        F: FnOnce(&mut Connection) -> Result<T, LearnSpaceError>,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| LearnSpaceError::Internal(format!("Lock poisoned: {}", e)))?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| LearnSpaceError::Internal("store is closed".into()))?;
        f(conn)
    }

    /// Close the connection. Later calls fail with an internal error.
    pub fn close(&self) -> Result<(), LearnSpaceError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| LearnSpaceError::Internal(format!("Lock poisoned: {}", e)))?;

        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| {
                LearnSpaceError::Database(format!("Failed to close SQLite: {}", e))
            })?;
            info!("SQLite database closed");
        }

        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.conn.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }

    /// Get row counts for the health endpoint
    pub fn stats(&self) -> Result<DbStats, LearnSpaceError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, LearnSpaceError> {
                let n: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                users: count("users")?,
                courses: count("courses")?,
                blocks: count("blocks")?,
                presentations: count("presentations")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub users: u64,
    pub courses: u64,
    pub blocks: u64,
    pub presentations: u64,
}

/// Whether a rusqlite error is a UNIQUE / PRIMARY KEY violation
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
            && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Current time as an RFC 3339 UTC string
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a serialized block-id list read back from a TEXT column
pub(crate) fn parse_id_list(raw: &str, column: &str) -> Result<Vec<String>, LearnSpaceError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| LearnSpaceError::Internal(format!("Corrupt {} value: {}", column, e)))
}

/// Serialize a block-id list for a TEXT column
pub(crate) fn encode_id_list<'a, I>(ids: I) -> Result<String, LearnSpaceError>
where
    I: IntoIterator<Item = &'a String>,
{
    let ids: Vec<&String> = ids.into_iter().collect();
    serde_json::to_string(&ids)
        .map_err(|e| LearnSpaceError::Internal(format!("Failed to encode id list: {}", e)))
}

pub use blocks::{BlockInput, BlockRow};
pub use courses::{CourseRow, NewCourse};
pub use presentations::{PresentationChanges, PresentationRow};
pub use users::UserRow;
