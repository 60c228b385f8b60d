//! Database schema SQL.

/// One row per editing session plus an append-only revision log.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
    session_id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    version INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS report_revisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES reports(session_id) ON DELETE CASCADE,
    version INTEGER NOT NULL,
    text TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    saved_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_revisions_session ON report_revisions(session_id, version);
"#;
