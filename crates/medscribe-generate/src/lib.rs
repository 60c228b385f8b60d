//! Report regeneration through external LLM APIs.
//!
//! A regeneration sends the current report plus a clinician's
//! instruction and collects the streamed reply into the new full text.
//! No local model is involved.

pub mod config;
pub mod generator;
pub mod providers;
pub mod types;

pub use config::LLMConfig;
pub use generator::LlmGenerator;
pub use types::*;
