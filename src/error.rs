use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A catalog uniqueness constraint rejected the insert. `key` names the
    /// offending value, usually a content hash already in the library.
    #[error("Duplicate entry rejected by catalog: {key}")]
    Duplicate { key: String },

    #[error("Failed to extract metadata from {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LibraryError {
    /// True when a UNIQUE or PRIMARY KEY constraint rejected the write.
    /// Foreign key, NOT NULL and CHECK failures are not uniqueness errors.
    pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
