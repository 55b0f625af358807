//! Live-session accounting.
//!
//! Every running session holds exactly one [`SessionLease`], created together
//! with its interval timer and dropped together with it. The
//! [`SessionTracker`] therefore reports how many session timers are alive,
//! which the service uses to drain in-flight streams during shutdown.

use core::time::Duration;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout};

/// Poll period used while waiting for sessions to drain.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cloneable handle counting live sessions.
#[derive(Clone, Debug, Default)]
pub struct SessionTracker {
    live: Arc<AtomicUsize>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live session. The count drops when the lease is dropped.
    pub fn lease(&self) -> SessionLease {
        self.live.fetch_add(1, Ordering::AcqRel);
        SessionLease {
            live: Arc::clone(&self.live),
        }
    }

    /// Number of sessions currently holding a lease.
    pub fn active(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Waits until no session is live, or `limit` elapses.
    ///
    /// Returns `true` if every session finished in time.
    pub async fn drain(&self, limit: Duration) -> bool {
        timeout(limit, async {
            while self.active() > 0 {
                sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await
        .is_ok()
    }
}

/// Proof that a session is live. Decrements its tracker on drop.
#[derive(Debug)]
pub struct SessionLease {
    live: Arc<AtomicUsize>,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}
