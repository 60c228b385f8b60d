//! Contracts for the external collaborators an editing session talks to.
//!
//! Both traits return boxed futures so sessions can hold them as
//! `Arc<dyn ...>` and swap in test doubles.

use futures::future::BoxFuture;

use crate::Result;

/// Durable storage for edited reports.
pub trait ReportStore: Send + Sync {
    /// Persist `text` as the latest version of `session_id`.
    ///
    /// Must be idempotent: saving the same text twice is a no-op the
    /// second time.
    fn save<'a>(&'a self, session_id: &'a str, text: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Fetch the latest persisted text, if any.
    fn load<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<Option<String>>>;
}

/// Rewrites a whole report according to a free-text instruction.
pub trait ReportGenerator: Send + Sync {
    fn regenerate<'a>(
        &'a self,
        current_text: &'a str,
        instruction: &'a str,
    ) -> BoxFuture<'a, Result<String>>;

    /// Whether a backend is configured at all.
    fn is_available(&self) -> bool {
        true
    }
}
