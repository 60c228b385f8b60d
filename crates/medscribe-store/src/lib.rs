//! Medscribe Store: SQLite persistence for edited reports.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::{content_hash, SqliteStore};
pub use types::*;
