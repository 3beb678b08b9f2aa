//! Cooperative cancellation for crawl operations
//!
//! Every public crawl operation accepts a [`CancelToken`]. The token is
//! polled before network calls, before retry sleeps, and before each
//! scheduler iteration, so cancellation is observed within bounded time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token for coordinating cancellation across a crawl
///
/// Cloning is cheap; all clones observe the same flag. Cancellation is
/// one-way and idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a new, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Requests cancellation
    ///
    /// Idempotent; later calls have no additional effect.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
