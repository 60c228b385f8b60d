//! SQLite-backed report store.
//!
//! Saves are idempotent: writing text whose SHA-256 matches the latest
//! revision leaves both tables untouched, so a caller-level retry after an
//! ambiguous failure never produces a duplicate revision.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::schema::SCHEMA_SQL;
use crate::types::*;
use medscribe_core::{Error, ReportStore, Result};

/// SQLite store holding the latest text and revision log per session.
///
/// The connection is shared with blocking tasks that run async saves.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

/// Hex SHA-256 of report text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

impl SqliteStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be `db_dir/medscribe.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir)?;
        let db_path = db_dir.join("medscribe.db");

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        };

        info!(
            "SqliteStore initialized: {} reports, path={}",
            store.count_reports()?,
            store.db_path.display()
        );
        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    /// Persist `text` as the newest version of `session_id`.
    pub fn save_report(&self, session_id: &str, text: &str) -> Result<SaveReceipt> {
        write_report(&self.conn, session_id, text)
    }

    /// Latest persisted report for a session.
    pub fn get_report(&self, session_id: &str) -> Result<Option<StoredReport>> {
        read_report(&self.conn, session_id)
    }

    /// Revisions of a session, newest first.
    pub fn list_revisions(&self, session_id: &str, limit: usize) -> Result<Vec<Revision>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM report_revisions WHERE session_id = ?1
                 ORDER BY version DESC LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![session_id, limit as i64], |row| {
                Ok(Revision {
                    id: row.get("id")?,
                    session_id: row.get("session_id")?,
                    version: row.get("version")?,
                    text: row.get("text")?,
                    content_hash: row.get("content_hash")?,
                    saved_at: row.get("saved_at")?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        let revisions = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(revisions)
    }

    /// Delete a report and its revisions.
    pub fn delete_report(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM reports WHERE session_id = ?1", params![session_id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Count persisted reports.
    pub fn count_reports(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl ReportStore for SqliteStore {
    fn save<'a>(&'a self, session_id: &'a str, text: &'a str) -> BoxFuture<'a, Result<()>> {
        let conn = self.conn.clone();
        let session_id = session_id.to_string();
        let text = text.to_string();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || write_report(&conn, &session_id, &text))
                .await
                .map_err(|e| Error::Persistence(format!("Save task failed: {}", e)))?
                .map(|_| ())
                .map_err(|e| Error::Persistence(e.to_string()))
        })
    }

    fn load<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        let conn = self.conn.clone();
        let session_id = session_id.to_string();
        Box::pin(async move {
            let report = tokio::task::spawn_blocking(move || read_report(&conn, &session_id))
                .await
                .map_err(|e| Error::Internal(format!("Load task failed: {}", e)))??;
            Ok(report.map(|r| r.text))
        })
    }
}

fn write_report(conn: &Mutex<Connection>, session_id: &str, text: &str) -> Result<SaveReceipt> {
    let hash = content_hash(text);
    let now = chrono::Utc::now().timestamp_millis();

    let mut conn = conn.lock();
    let tx = conn
        .transaction()
        .map_err(|e| Error::Database(e.to_string()))?;

    let latest: Option<(String, i64)> = tx
        .query_row(
            "SELECT content_hash, version FROM reports WHERE session_id = ?1",
            params![session_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))?;

    if let Some((latest_hash, version)) = &latest {
        if *latest_hash == hash {
            debug!("Save of {} skipped: unchanged at v{}", session_id, version);
            return Ok(SaveReceipt {
                version: *version,
                changed: false,
            });
        }
    }

    let version = latest.map(|(_, v)| v + 1).unwrap_or(1);
    tx.execute(
        "INSERT INTO reports (session_id, text, content_hash, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(session_id) DO UPDATE SET
            text = excluded.text,
            content_hash = excluded.content_hash,
            version = excluded.version,
            updated_at = excluded.updated_at",
        params![session_id, text, hash, version, now],
    )
    .map_err(|e| Error::Database(e.to_string()))?;
    tx.execute(
        "INSERT INTO report_revisions (session_id, version, text, content_hash, saved_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![session_id, version, text, hash, now],
    )
    .map_err(|e| Error::Database(e.to_string()))?;
    tx.commit().map_err(|e| Error::Database(e.to_string()))?;

    debug!("Saved {} v{} ({} bytes)", session_id, version, text.len());
    Ok(SaveReceipt {
        version,
        changed: true,
    })
}

fn read_report(conn: &Mutex<Connection>, session_id: &str) -> Result<Option<StoredReport>> {
    let conn = conn.lock();
    let row = conn
        .prepare_cached("SELECT * FROM reports WHERE session_id = ?1")
        .map_err(|e| Error::Database(e.to_string()))?
        .query_row(params![session_id], |row| {
            Ok(StoredReport {
                session_id: row.get("session_id")?,
                text: row.get("text")?,
                content_hash: row.get("content_hash")?,
                version: row.get("version")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            })
        })
        .optional()
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(row)
}
