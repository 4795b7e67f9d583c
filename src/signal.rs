//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag. Clones observe the same flag.
///
/// Long-running algorithms poll [`Cancellation::is_running`] at fixed checkpoints and stop
/// taking new work once it returns `false`.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    stopped: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Relaxed)
    }

    /// Clear the flag so the same handle can drive a retry.
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::Relaxed);
    }
}
