//! Autosave task: sleeps until the debounce deadline, then saves.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::session::EditSession;

/// Drive `session`'s debounced saves until it is unmounted.
///
/// Every edit wakes the task so a moved deadline is picked up. Save
/// failures are left to the session's events; the task keeps running.
pub fn spawn_autosave(session: Arc<EditSession>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if session.is_unmounted() {
                break;
            }
            match session.next_deadline() {
                None => session.woken().await,
                Some(deadline) => {
                    let now = session.clock().now();
                    if deadline <= now {
                        // Due but blocked by a save in flight: wait for it to finish.
                        if session.run_due_save().await.is_none() {
                            session.woken().await;
                        }
                        continue;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(deadline - now) => {}
                        _ = session.woken() => {}
                    }
                }
            }
        }
        debug!("Autosave for session {} stopped", session.id());
    })
}
