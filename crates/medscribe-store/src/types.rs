//! Row types for persisted reports.

use serde::{Deserialize, Serialize};

/// Latest persisted state of a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub session_id: String,
    pub text: String,
    pub content_hash: String,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One entry of the revision log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub id: i64,
    pub session_id: String,
    pub version: i64,
    pub text: String,
    pub content_hash: String,
    pub saved_at: i64,
}

/// Outcome of a save call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub version: i64,
    /// False when the text matched the latest revision and nothing was written.
    pub changed: bool,
}
