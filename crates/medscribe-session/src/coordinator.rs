//! Debounced, single-flight save state machine.
//!
//! The coordinator performs no I/O. Callers feed it edits and the
//! current time, take a `SaveTicket` when a save is due, run the save
//! themselves, and report the result back with `complete_save`.
//!
//! A ticket carries the text as it was when the save started. Completing
//! a save only ever advances the baseline to the ticket's text; `current`
//! is never touched, so edits made while the save was in flight survive it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::types::{Phase, SaveState};

/// Snapshot handed to the persistence call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    pub text: String,
}

/// How a finished save was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The state machine advanced.
    Applied,
    /// The session was torn down; nothing changed.
    Unmounted,
}

#[derive(Debug)]
pub struct SaveCoordinator {
    baseline: String,
    current: String,
    dirty: bool,
    saving: bool,
    unmounted: bool,
    deadline: Option<Instant>,
    last_saved_at: Option<DateTime<Utc>>,
    debounce: Duration,
}

impl SaveCoordinator {
    /// Start clean on `text`.
    pub fn new(text: impl Into<String>, debounce: Duration) -> Self {
        let text = text.into();
        Self {
            baseline: text.clone(),
            current: text,
            dirty: false,
            saving: false,
            unmounted: false,
            deadline: None,
            last_saved_at: None,
            debounce,
        }
    }

    /// Adopt freshly received text as a replacement to persist at once.
    ///
    /// The baseline stays at the last persisted text. A save in flight
    /// finishes normally and the replacement follows it. Text equal to
    /// the baseline with nothing pending leaves the coordinator clean.
    pub fn replace(&mut self, text: impl Into<String>, now: Instant) -> bool {
        if self.unmounted {
            return false;
        }
        let text = text.into();
        if !self.saving && text == self.baseline {
            self.current = text;
            self.dirty = false;
            self.deadline = None;
            return true;
        }
        self.record_edit(text, now);
        self.expedite(now);
        true
    }

    /// Record an edit and (re)arm the debounce deadline.
    ///
    /// Returns false once unmounted.
    pub fn record_edit(&mut self, text: impl Into<String>, now: Instant) -> bool {
        if self.unmounted {
            return false;
        }
        self.current = text.into();
        self.dirty = true;
        self.deadline = Some(now + self.debounce);
        true
    }

    /// Make any pending save due immediately.
    pub fn expedite(&mut self, now: Instant) {
        if self.dirty && !self.unmounted {
            self.deadline = Some(now);
        }
    }

    /// Take a ticket if the debounce deadline has passed.
    pub fn poll_due(&mut self, now: Instant) -> Option<SaveTicket> {
        match self.deadline {
            Some(deadline) if deadline <= now => self.begin_save(),
            _ => None,
        }
    }

    /// Take a ticket regardless of the deadline.
    ///
    /// None when unmounted, clean, or already saving.
    pub fn begin_save(&mut self) -> Option<SaveTicket> {
        if self.unmounted || !self.dirty || self.saving {
            return None;
        }
        self.saving = true;
        self.deadline = None;
        Some(SaveTicket {
            text: self.current.clone(),
        })
    }

    /// Apply the outcome of the save started with `ticket`.
    ///
    /// On success the baseline becomes the ticket text. If edits arrived
    /// meanwhile the session stays dirty and the next save is due at
    /// once. On failure the session stays dirty; a deadline is only
    /// armed if an edit arrived during the save.
    pub fn complete_save(
        &mut self,
        ticket: &SaveTicket,
        succeeded: bool,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Completion {
        if self.unmounted {
            return Completion::Unmounted;
        }
        self.saving = false;
        if succeeded {
            self.baseline = ticket.text.clone();
            self.last_saved_at = Some(wall);
            if self.current == self.baseline {
                self.dirty = false;
                self.deadline = None;
            } else {
                self.dirty = true;
                self.deadline = Some(now);
            }
        }
        Completion::Applied
    }

    /// Terminal: cancel the deadline and refuse further transitions.
    pub fn unmount(&mut self) {
        self.unmounted = true;
        self.deadline = None;
    }

    pub fn phase(&self) -> Phase {
        if self.unmounted {
            Phase::Unmounted
        } else if self.saving {
            Phase::Saving
        } else if self.dirty {
            Phase::Dirty
        } else {
            Phase::Clean
        }
    }

    pub fn state(&self) -> SaveState {
        SaveState {
            baseline_text: self.baseline.clone(),
            current_text: self.current.clone(),
            dirty: self.dirty,
            saving: self.saving,
            last_saved_at: self.last_saved_at,
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_secs(2);

    fn setup() -> (SaveCoordinator, Instant) {
        (SaveCoordinator::new("v0", DEBOUNCE), Instant::now())
    }

    #[test]
    fn test_edit_marks_dirty_and_arms_deadline() {
        let (mut c, t0) = setup();
        assert_eq!(c.phase(), Phase::Clean);
        assert!(c.record_edit("v1", t0));
        assert_eq!(c.phase(), Phase::Dirty);
        assert!(c.state().dirty);
        assert_eq!(c.deadline(), Some(t0 + DEBOUNCE));
    }

    #[test]
    fn test_new_edit_supersedes_deadline() {
        let (mut c, t0) = setup();
        c.record_edit("v1", t0);
        c.record_edit("v2", t0 + Duration::from_millis(1500));
        assert!(c.poll_due(t0 + DEBOUNCE).is_none());
        let ticket = c.poll_due(t0 + Duration::from_millis(3500)).unwrap();
        assert_eq!(ticket.text, "v2");
        assert_eq!(c.phase(), Phase::Saving);
    }

    #[test]
    fn test_success_advances_baseline_only() {
        let (mut c, t0) = setup();
        c.record_edit("v1", t0);
        let ticket = c.poll_due(t0 + DEBOUNCE).unwrap();
        c.record_edit("v2", t0 + DEBOUNCE);

        let done = t0 + Duration::from_secs(3);
        assert_eq!(c.complete_save(&ticket, true, done, Utc::now()), Completion::Applied);
        let state = c.state();
        assert_eq!(state.baseline_text, "v1");
        assert_eq!(state.current_text, "v2");
        assert!(state.dirty);
        assert!(state.last_saved_at.is_some());
        // Re-armed immediately, not after another debounce window.
        assert_eq!(c.deadline(), Some(done));
        assert_eq!(c.poll_due(done).unwrap().text, "v2");
    }

    #[test]
    fn test_success_without_new_edits_is_clean() {
        let (mut c, t0) = setup();
        c.record_edit("v1", t0);
        let ticket = c.begin_save().unwrap();
        c.complete_save(&ticket, true, t0, Utc::now());
        assert_eq!(c.phase(), Phase::Clean);
        assert_eq!(c.state().baseline_text, c.state().current_text);
        assert!(c.deadline().is_none());
    }

    #[test]
    fn test_failure_stays_dirty_without_retry() {
        let (mut c, t0) = setup();
        c.record_edit("v1", t0);
        let ticket = c.poll_due(t0 + DEBOUNCE).unwrap();
        c.complete_save(&ticket, false, t0 + DEBOUNCE, Utc::now());
        assert_eq!(c.phase(), Phase::Dirty);
        assert_eq!(c.state().baseline_text, "v0");
        assert!(c.deadline().is_none());
        assert!(c.poll_due(t0 + Duration::from_secs(60)).is_none());

        // The next edit is what retries.
        c.record_edit("v1!", t0 + Duration::from_secs(61));
        assert!(c.deadline().is_some());
    }

    #[test]
    fn test_single_flight() {
        let (mut c, t0) = setup();
        c.record_edit("v1", t0);
        let _ticket = c.begin_save().unwrap();
        c.record_edit("v2", t0);
        assert!(c.begin_save().is_none());
        assert!(c.poll_due(t0 + DEBOUNCE).is_none());
        assert_eq!(c.phase(), Phase::Saving);
    }

    #[test]
    fn test_replace_keeps_baseline_until_saved() {
        let (mut c, t0) = setup();
        c.record_edit("v1", t0);
        assert!(c.replace("fresh", t0));

        let state = c.state();
        assert_eq!(state.baseline_text, "v0");
        assert_eq!(state.current_text, "fresh");
        assert!(state.dirty);
        // Due now, not after the debounce window.
        let ticket = c.poll_due(t0).unwrap();
        assert_eq!(ticket.text, "fresh");

        c.complete_save(&ticket, true, t0, Utc::now());
        assert_eq!(c.phase(), Phase::Clean);
        assert_eq!(c.state().baseline_text, "fresh");
    }

    #[test]
    fn test_replace_during_save_follows_it() {
        let (mut c, t0) = setup();
        c.record_edit("v1", t0);
        let ticket = c.begin_save().unwrap();
        c.replace("fresh", t0);
        assert!(c.poll_due(t0).is_none());

        let done = t0 + Duration::from_secs(1);
        assert_eq!(c.complete_save(&ticket, true, done, Utc::now()), Completion::Applied);
        assert_eq!(c.state().baseline_text, "v1");
        assert_eq!(c.poll_due(done).unwrap().text, "fresh");
    }

    #[test]
    fn test_replace_with_baseline_is_clean() {
        let (mut c, t0) = setup();
        c.record_edit("v1", t0);
        c.replace("v0", t0);
        assert_eq!(c.phase(), Phase::Clean);
        assert!(c.deadline().is_none());
    }

    #[test]
    fn test_unmount_is_terminal() {
        let (mut c, t0) = setup();
        c.record_edit("v1", t0);
        let ticket = c.begin_save().unwrap();
        c.unmount();
        assert_eq!(c.phase(), Phase::Unmounted);
        assert_eq!(c.complete_save(&ticket, true, t0, Utc::now()), Completion::Unmounted);
        assert_eq!(c.state().baseline_text, "v0");
        assert!(!c.record_edit("v2", t0));
        assert!(c.deadline().is_none());
        assert!(c.begin_save().is_none());
    }

    #[test]
    fn test_expedite() {
        let (mut c, t0) = setup();
        c.expedite(t0);
        assert!(c.deadline().is_none());
        c.record_edit("v1", t0);
        c.expedite(t0);
        assert_eq!(c.poll_due(t0).unwrap().text, "v1");
    }
}
