mod schema;
pub mod photos;
pub mod query;
pub mod records;
pub mod tags;

use rusqlite::Connection;
use std::path::Path;

use crate::error::{LibraryError, Result};

pub use query::{DateGroup, DateOrder, GeoBounds, MonthCount, PhotoSetQuery};
pub use records::{Photo, PhotoSet, Status, Tag, TagItem};
pub use schema::SCHEMA;

/// The relational catalog.
///
/// Every unit of work opens its own short-lived transaction on this
/// connection; no transaction outlives a single call.
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::configure(conn)
    }

    /// Catalog that lives only as long as this value. Used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Map a failed write to `Duplicate` when a uniqueness constraint fired.
pub(crate) fn map_write_error(err: rusqlite::Error, key: &str) -> LibraryError {
    if LibraryError::is_unique_violation(&err) {
        LibraryError::Duplicate {
            key: key.to_string(),
        }
    } else {
        LibraryError::Database(err)
    }
}

/// Read a TEXT timestamp column.
pub(crate) fn get_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<chrono::NaiveDateTime> {
    let raw: String = row.get(idx)?;
    records::parse_date(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {}", raw).into(),
        )
    })
}
