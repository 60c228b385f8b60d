//! Error types for Medscribe.
//!
//! Malformed field ordinals and empty source text are deliberately absent:
//! both are no-ops that yield unchanged text or empty projections.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Regeneration error: {0}")]
    Regeneration(String),

    #[error("A regeneration is already in flight")]
    RegenerationInFlight,

    #[error("Session has been closed")]
    Unmounted,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
