//! Shutdown coordination between the signal handler, the relay and its
//! background tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared shutdown flags.
///
/// Cloning yields another handle onto the same flags.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    /// Set once a stop was requested; no new work should start
    shutdown_initiated: Arc<AtomicBool>,
    /// Set once every connection has been closed
    shutdown_complete: Arc<AtomicBool>,
}

impl ShutdownState {
    /// Creates a new shutdown state with both flags cleared.
    pub fn new() -> Self {
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// Returns true if shutdown has finished.
    pub fn is_shutdown_complete(&self) -> bool {
        self.shutdown_complete.load(Ordering::Acquire)
    }

    /// Marks shutdown as requested.
    pub fn initiate_shutdown(&self) {
        self.shutdown_initiated.store(true, Ordering::Release);
        info!("🛑 Shutdown initiated - no new connections will be accepted");
    }

    /// Marks shutdown as finished.
    pub fn complete_shutdown(&self) {
        self.shutdown_complete.store(true, Ordering::Release);
        info!("✅ All connections closed - ready for final cleanup");
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flags() {
        let state = ShutdownState::new();
        let other = state.clone();
        assert!(!other.is_shutdown_initiated());

        state.initiate_shutdown();
        assert!(other.is_shutdown_initiated());
        assert!(!other.is_shutdown_complete());

        other.complete_shutdown();
        assert!(state.is_shutdown_complete());
    }
}
