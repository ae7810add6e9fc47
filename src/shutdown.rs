//! Cooperative cancellation shared by the two worker loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation token handed explicitly to each loop.
///
/// Starts in the running state and flips to cancelled at most once; it is
/// never reset. Every pipeline owns its own token, so independent pipelines
/// can share a process.
#[derive(Clone, Debug, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_running() {
        let token = ShutdownToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_visible_to_clones() {
        let token = ShutdownToken::new();
        let worker = token.clone();

        token.cancel();
        token.cancel();
        assert!(worker.is_cancelled());
    }

    #[test]
    fn test_tokens_are_independent() {
        let a = ShutdownToken::new();
        let b = ShutdownToken::new();

        a.cancel();
        assert!(!b.is_cancelled());
    }
}
