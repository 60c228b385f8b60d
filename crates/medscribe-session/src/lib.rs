//! Medscribe Session: editing sessions over generated reports.
//!
//! An `EditSession` accumulates field edits against an immutable source
//! text, debounces saves through a single-flight `SaveCoordinator`, gates
//! regeneration to one request at a time, and broadcasts `SessionEvent`s
//! whenever a projection changes.

pub mod clock;
pub mod coordinator;
pub mod driver;
pub mod session;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{Completion, SaveCoordinator, SaveTicket};
pub use driver::spawn_autosave;
pub use session::{Collaborators, EditSession};
pub use types::*;
