//! Photo library ingestion, storage and thumbnail engine.
//!
//! Files go in through [`scanner::Scanner::ingest`], land in a date tree
//! managed by [`library::Library`], are described in the SQLite catalog in
//! [`db`], and are served back as originals or as thumbnails from
//! [`thumbnails::ThumbnailCache`].

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod library;
pub mod logging;
pub mod scanner;
pub mod thumbnails;

pub use config::Config;
pub use db::Database;
pub use error::{LibraryError, Result};
pub use library::Library;
pub use scanner::{IngestReport, Scanner};
pub use thumbnails::{Style, ThumbnailCache};
