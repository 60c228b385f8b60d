//! `EditSession`: one document open for editing.
//!
//! A session owns the source text, the accumulated field edits and the
//! save coordinator. Field edits are always applied to the source text,
//! never to a previously edited output, so ordinals cannot drift.
//!
//! All state sits behind one mutex that is never held across an await.
//! The suspension points are the persistence call and the regeneration
//! call; both re-check the session after resuming.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use medscribe_core::{Error, ReportGenerator, ReportStore, Result};
use medscribe_extract::{
    count_placeholders, estimate, extract_with_report, locate, parse, replace_all, ActionItem,
    CascadeTier, DocumentBlock, FieldEditSet,
};

use crate::clock::Clock;
use crate::coordinator::{Completion, SaveCoordinator, SaveTicket};
use crate::types::*;

const EVENT_CAPACITY: usize = 64;

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ReportStore>,
    pub generator: Arc<dyn ReportGenerator>,
    pub clock: Arc<dyn Clock>,
}

struct Inner {
    source: String,
    source_version: u64,
    edits: FieldEditSet,
    coordinator: SaveCoordinator,
    blocks: Vec<DocumentBlock>,
    action_items: Vec<ActionItem>,
    cascade_tier: Option<CascadeTier>,
    truncated: bool,
    confidence: f64,
}

impl Inner {
    /// Recompute the display projections from the current text.
    fn reproject(&mut self) {
        let text = self.coordinator.current();
        let extraction = extract_with_report(text);
        self.blocks = parse(text);
        self.action_items = extraction.items;
        self.cascade_tier = extraction.tier;
        self.truncated = extraction.truncated;
    }

    /// Replace the source text, dropping field edits made against the old one.
    fn rebase(&mut self, text: &str) {
        self.source = text.to_string();
        self.source_version += 1;
        self.edits.clear();
    }
}

pub struct EditSession {
    id: String,
    config: SessionConfig,
    collab: Collaborators,
    inner: Mutex<Inner>,
    regenerating: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
    wake: Notify,
}

/// Clears the regeneration gate when dropped.
struct RegenerationGate<'a>(&'a AtomicBool);

impl Drop for RegenerationGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl EditSession {
    /// Open a session on `text` that the store already holds.
    pub fn open(
        id: impl Into<String>,
        text: impl Into<String>,
        config: SessionConfig,
        collab: Collaborators,
    ) -> Arc<Self> {
        let text = text.into();
        Self::start(id.into(), text.clone(), text, config, collab)
    }

    /// Open a session on text the store has never seen.
    ///
    /// The session starts dirty with its first save due at once.
    pub fn open_unsaved(
        id: impl Into<String>,
        text: impl Into<String>,
        config: SessionConfig,
        collab: Collaborators,
    ) -> Arc<Self> {
        Self::start(id.into(), String::new(), text.into(), config, collab)
    }

    fn start(
        id: String,
        baseline: String,
        text: String,
        config: SessionConfig,
        collab: Collaborators,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut coordinator = SaveCoordinator::new(baseline, config.debounce);
        coordinator.replace(text.clone(), collab.clock.now());
        let mut inner = Inner {
            source: text.clone(),
            source_version: 1,
            edits: FieldEditSet::new(),
            coordinator,
            blocks: Vec::new(),
            action_items: Vec::new(),
            cascade_tier: None,
            truncated: false,
            confidence: estimate(&text),
        };
        inner.reproject();

        info!(
            "Opened session {} ({} chars, {} placeholders, {:?})",
            id,
            text.len(),
            count_placeholders(&text, &config.sentinel),
            inner.coordinator.phase()
        );
        Arc::new(Self {
            id,
            config,
            collab,
            inner: Mutex::new(inner),
            regenerating: AtomicBool::new(false),
            events,
            wake: Notify::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Adopt newly received source text.
    ///
    /// The text replaces the current one, field edits included, and is
    /// saved at once; the baseline moves only when that save succeeds.
    /// Computes the new text's confidence.
    pub fn new_source_text(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let now = self.collab.clock.now();
        let (blocks, items, truncated, confidence, phase, state) = {
            let mut inner = self.inner.lock();
            if inner.coordinator.is_unmounted() {
                return Err(Error::Unmounted);
            }
            if !inner.edits.is_empty() {
                debug!(
                    "Session {}: new source text supersedes {} field edits",
                    self.id,
                    inner.edits.len()
                );
            }
            inner.rebase(&text);
            inner.coordinator.replace(text.clone(), now);
            inner.confidence = estimate(&text);
            inner.reproject();
            (
                inner.blocks.clone(),
                inner.action_items.clone(),
                inner.truncated,
                inner.confidence,
                inner.coordinator.phase(),
                inner.coordinator.state(),
            )
        };

        debug!("Session {} received new source text", self.id);
        self.emit(SessionEvent::BlocksChanged { blocks });
        self.emit(SessionEvent::ActionItemsChanged { items, truncated });
        self.emit(SessionEvent::ConfidenceComputed { score: confidence });
        self.emit(SessionEvent::SaveStateChanged { phase, state });
        self.wake.notify_one();
        Ok(())
    }

    /// Fill placeholder `ordinal` of the source text with `value`.
    ///
    /// Returns the resulting text. An ordinal outside the source text's
    /// placeholders leaves everything unchanged.
    pub fn edit_field(&self, ordinal: usize, value: impl Into<String>) -> Result<String> {
        let now = self.collab.clock.now();
        let mut inner = self.inner.lock();
        if inner.coordinator.is_unmounted() {
            return Err(Error::Unmounted);
        }
        let available = count_placeholders(&inner.source, &self.config.sentinel);
        if ordinal >= available {
            debug!(
                "Session {}: ignoring field ordinal {} ({} placeholders)",
                self.id, ordinal, available
            );
            return Ok(inner.coordinator.current().to_string());
        }

        inner.edits.insert(ordinal, value.into());
        let text = replace_all(&inner.source, &self.config.sentinel, &inner.edits);
        self.apply_edit(inner, text.clone(), now);
        Ok(text)
    }

    /// Replace the whole text with a manual edit.
    ///
    /// The edited text becomes the new source, so later field ordinals
    /// address the placeholders that remain in it.
    pub fn edit_full_text(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let now = self.collab.clock.now();
        let mut inner = self.inner.lock();
        if inner.coordinator.is_unmounted() {
            return Err(Error::Unmounted);
        }
        inner.rebase(&text);
        self.apply_edit(inner, text, now);
        Ok(())
    }

    fn apply_edit(&self, mut inner: parking_lot::MutexGuard<'_, Inner>, text: String, now: Instant) {
        inner.coordinator.record_edit(text, now);
        inner.reproject();
        let blocks = inner.blocks.clone();
        let items = inner.action_items.clone();
        let truncated = inner.truncated;
        let phase = inner.coordinator.phase();
        let state = inner.coordinator.state();
        drop(inner);

        self.emit(SessionEvent::BlocksChanged { blocks });
        self.emit(SessionEvent::ActionItemsChanged { items, truncated });
        self.emit(SessionEvent::SaveStateChanged { phase, state });
        self.wake.notify_one();
    }

    /// Rewrite the report through the generator and save the result.
    ///
    /// Only one regeneration runs at a time; a concurrent request fails
    /// with `RegenerationInFlight`. A failed regeneration leaves the text
    /// untouched. A failed save of the regenerated text is reported as a
    /// `SaveFailed` event and leaves the session dirty; the regenerated
    /// text is still returned.
    pub async fn request_regeneration(&self, instruction: &str) -> Result<String> {
        if self
            .regenerating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::RegenerationInFlight);
        }
        let _gate = RegenerationGate(&self.regenerating);

        let current = {
            let inner = self.inner.lock();
            if inner.coordinator.is_unmounted() {
                return Err(Error::Unmounted);
            }
            inner.coordinator.current().to_string()
        };

        info!("Session {}: regeneration started", self.id);
        let text = match self.collab.generator.regenerate(&current, instruction).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Session {}: regeneration failed: {}", self.id, e);
                return Err(e);
            }
        };

        let now = self.collab.clock.now();
        let (blocks, items, truncated, confidence) = {
            let mut inner = self.inner.lock();
            if inner.coordinator.is_unmounted() {
                debug!("Session {}: regeneration finished after close", self.id);
                return Err(Error::Unmounted);
            }
            inner.rebase(&text);
            inner.coordinator.record_edit(text.clone(), now);
            inner.coordinator.expedite(now);
            inner.confidence = estimate(&text);
            inner.reproject();
            (
                inner.blocks.clone(),
                inner.action_items.clone(),
                inner.truncated,
                inner.confidence,
            )
        };
        info!("Session {}: regeneration applied ({} chars)", self.id, text.len());
        self.emit(SessionEvent::BlocksChanged { blocks });
        self.emit(SessionEvent::ActionItemsChanged { items, truncated });
        self.emit(SessionEvent::ConfidenceComputed { score: confidence });

        // A save already in flight picks the new text up when it finishes.
        match self.save_now().await {
            Ok(outcome) => debug!("Session {}: post-regeneration save {:?}", self.id, outcome),
            Err(e) => debug!("Session {}: post-regeneration save failed: {}", self.id, e),
        }
        Ok(text)
    }

    /// Save immediately if dirty.
    pub async fn save_now(&self) -> Result<SaveOutcome> {
        let ticket = {
            let mut inner = self.inner.lock();
            let c = &mut inner.coordinator;
            if c.is_unmounted() {
                return Err(Error::Unmounted);
            }
            if c.is_saving() {
                return Ok(SaveOutcome::Deferred);
            }
            match c.begin_save() {
                Some(ticket) => ticket,
                None => return Ok(SaveOutcome::Clean),
            }
        };
        self.perform_save(ticket).await?;
        Ok(SaveOutcome::Saved)
    }

    /// Run the debounced save if its deadline has passed.
    ///
    /// Returns None when nothing was due.
    pub async fn run_due_save(&self) -> Option<Result<()>> {
        let now = self.collab.clock.now();
        let ticket = self.inner.lock().coordinator.poll_due(now)?;
        Some(self.perform_save(ticket).await)
    }

    async fn perform_save(&self, ticket: SaveTicket) -> Result<()> {
        self.emit_save_state();
        info!("Session {}: saving {} chars", self.id, ticket.text.len());

        let result = self.collab.store.save(&self.id, &ticket.text).await;

        let now = self.collab.clock.now();
        let completion = self.inner.lock().coordinator.complete_save(
            &ticket,
            result.is_ok(),
            now,
            chrono::Utc::now(),
        );
        match completion {
            Completion::Applied => {
                match &result {
                    Ok(()) => info!("Session {}: saved", self.id),
                    Err(e) => {
                        warn!("Session {}: save failed: {}", self.id, e);
                        self.emit(SessionEvent::SaveFailed {
                            error: e.to_string(),
                        });
                    }
                }
                self.emit_save_state();
                self.wake.notify_one();
            }
            Completion::Unmounted => debug!("Session {}: save finished after close", self.id),
        }
        result
    }

    /// Tear down: cancel the pending deadline and make late completions no-ops.
    pub fn unmount(&self) {
        let (phase, state) = {
            let mut inner = self.inner.lock();
            if inner.coordinator.is_unmounted() {
                return;
            }
            inner.coordinator.unmount();
            (inner.coordinator.phase(), inner.coordinator.state())
        };
        info!("Closed session {}", self.id);
        self.emit(SessionEvent::SaveStateChanged { phase, state });
        self.wake.notify_one();
    }

    pub fn is_unmounted(&self) -> bool {
        self.inner.lock().coordinator.is_unmounted()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.lock().coordinator.deadline()
    }

    pub fn current_text(&self) -> String {
        self.inner.lock().coordinator.current().to_string()
    }

    pub fn save_state(&self) -> SaveState {
        self.inner.lock().coordinator.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            session_id: self.id.clone(),
            source_version: inner.source_version,
            source_text: inner.source.clone(),
            field_edits: inner.edits.clone(),
            placeholders: locate(&inner.source, &self.config.sentinel),
            blocks: inner.blocks.clone(),
            action_items: inner.action_items.clone(),
            cascade_tier: inner.cascade_tier,
            truncated: inner.truncated,
            confidence: inner.confidence,
            phase: inner.coordinator.phase(),
            save_state: inner.coordinator.state(),
            regenerating: self.regenerating.load(Ordering::Acquire),
        }
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.collab.clock.as_ref()
    }

    pub(crate) async fn woken(&self) {
        self.wake.notified().await
    }

    fn emit_save_state(&self) {
        let (phase, state) = {
            let inner = self.inner.lock();
            (inner.coordinator.phase(), inner.coordinator.state())
        };
        self.emit(SessionEvent::SaveStateChanged { phase, state });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
