//! Medscribe Core: error type, configuration, collaborator contracts.

pub mod collab;
pub mod config;
pub mod error;

pub use collab::{ReportGenerator, ReportStore};
pub use config::{DataPaths, MedscribeConfig, DEFAULT_DEBOUNCE_MS, DEFAULT_SENTINEL};
pub use error::{Error, Result};
