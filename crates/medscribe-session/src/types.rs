//! Session types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use medscribe_extract::{ActionItem, CascadeTier, DocumentBlock, FieldEditSet, PlaceholderField};

/// Where the save state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Clean,
    Dirty,
    Saving,
    Unmounted,
}

/// Persistence view of one editing session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    /// Last successfully persisted text.
    pub baseline_text: String,
    pub current_text: String,
    pub dirty: bool,
    pub saving: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
}

/// Result of an explicit save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    /// The store accepted the text.
    Saved,
    /// Nothing to save.
    Clean,
    /// A save is in flight; the newer text follows when it finishes.
    Deferred,
}

/// Outbound notifications, one per changed projection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    BlocksChanged {
        blocks: Vec<DocumentBlock>,
    },
    ActionItemsChanged {
        items: Vec<ActionItem>,
        truncated: bool,
    },
    SaveStateChanged {
        phase: Phase,
        state: SaveState,
    },
    ConfidenceComputed {
        score: f64,
    },
    SaveFailed {
        error: String,
    },
}

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub debounce: std::time::Duration,
    pub sentinel: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: std::time::Duration::from_millis(medscribe_core::DEFAULT_DEBOUNCE_MS),
            sentinel: medscribe_core::DEFAULT_SENTINEL.to_string(),
        }
    }
}

impl From<&medscribe_core::MedscribeConfig> for SessionConfig {
    fn from(config: &medscribe_core::MedscribeConfig) -> Self {
        Self {
            debounce: config.debounce(),
            sentinel: config.sentinel.clone(),
        }
    }
}

/// Everything a client needs to render a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    /// Bumped whenever the source text is replaced.
    pub source_version: u64,
    pub source_text: String,
    pub field_edits: FieldEditSet,
    /// Placeholders of the source text; ordinals address these.
    pub placeholders: Vec<PlaceholderField>,
    pub blocks: Vec<DocumentBlock>,
    pub action_items: Vec<ActionItem>,
    pub cascade_tier: Option<CascadeTier>,
    pub truncated: bool,
    pub confidence: f64,
    pub phase: Phase,
    pub save_state: SaveState,
    pub regenerating: bool,
}
