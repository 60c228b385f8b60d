//! Shared application state.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use medscribe_core::{Error, MedscribeConfig, Result};
use medscribe_generate::LlmGenerator;
use medscribe_session::{spawn_autosave, Clock, Collaborators, EditSession, SessionConfig, SystemClock};
use medscribe_store::SqliteStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: MedscribeConfig,
    pub store: Arc<SqliteStore>,
    pub generator: Arc<LlmGenerator>,
    clock: Arc<dyn Clock>,
    sessions: RwLock<HashMap<String, Arc<EditSession>>>,
}

impl AppState {
    pub fn new(config: MedscribeConfig, store: SqliteStore, generator: LlmGenerator) -> Self {
        Self {
            config,
            store: Arc::new(store),
            generator: Arc::new(generator),
            clock: Arc::new(SystemClock),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a session, or hand new source text to an open one.
    ///
    /// With `text`, a new session starts unsaved and an open one receives
    /// it as new source text. Without it, an open session is returned
    /// as is and a closed one is reopened from its persisted text.
    ///
    /// Lookup and insert happen under one write lock, so concurrent opens
    /// of an id share a session. New sessions get an autosave task, so
    /// this must run inside the runtime.
    pub fn open_session(&self, id: Option<String>, text: Option<String>) -> Result<Arc<EditSession>> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let (session, pending) = {
            let mut sessions = self.sessions.write();
            match sessions.entry(id) {
                Entry::Occupied(entry) => (entry.get().clone(), text),
                Entry::Vacant(entry) => {
                    let session = match text {
                        Some(text) => EditSession::open_unsaved(
                            entry.key().clone(),
                            text,
                            SessionConfig::from(&self.config),
                            self.collaborators(),
                        ),
                        None => {
                            let report = self
                                .store
                                .get_report(entry.key())?
                                .ok_or_else(|| Error::NotFound(format!("report {}", entry.key())))?;
                            EditSession::open(
                                entry.key().clone(),
                                report.text,
                                SessionConfig::from(&self.config),
                                self.collaborators(),
                            )
                        }
                    };
                    spawn_autosave(session.clone());
                    entry.insert(session.clone());
                    return Ok(session);
                }
            }
        };

        if let Some(text) = pending {
            session.new_source_text(text)?;
        }
        Ok(session)
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: self.store.clone(),
            generator: self.generator.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn session(&self, id: &str) -> Result<Arc<EditSession>> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))
    }

    /// Unmount and forget a session. Unsaved edits are dropped.
    pub fn close_session(&self, id: &str) -> Result<()> {
        let session = self
            .sessions
            .write()
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;
        let dirty = session.save_state().dirty;
        session.unmount();
        info!("Session {} closed (unsaved edits: {})", id, dirty);
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}
