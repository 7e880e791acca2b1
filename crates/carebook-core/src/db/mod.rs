//! Database layer for the CareBook core.

mod bookings;
mod escrow;
mod links;
mod parties;
mod schema;
mod settings;

pub use schema::*;
#[allow(unused_imports)]
pub use bookings::*;
#[allow(unused_imports)]
pub use escrow::*;
#[allow(unused_imports)]
pub use links::*;
#[allow(unused_imports)]
pub use parties::*;
#[allow(unused_imports)]
pub use settings::*;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Serialize a timestamp for storage (RFC 3339, sorts lexicographically).
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

/// Parse a stored timestamp.
pub(crate) fn parse_ts(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Constraint(format!("Bad timestamp '{}': {}", s, e)))
}

/// Parse an optional stored timestamp.
pub(crate) fn parse_ts_opt(s: Option<String>) -> DbResult<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(&s)).transpose()
}

/// Parse a stored UUID.
pub(crate) fn parse_id(s: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::Constraint(format!("Bad id '{}': {}", s, e)))
}

/// Parse an optional stored UUID.
pub(crate) fn parse_id_opt(s: Option<String>) -> DbResult<Option<Uuid>> {
    s.map(|s| parse_id(&s)).transpose()
}
