//! Process-wide one-shot stop signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Broadcast cancellation shared by every loop.
///
/// Once fired, current and future observers see it immediately and it never
/// resets. Firing never blocks.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create an unfired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns true only for the call that fired it first.
    pub fn fire(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::SeqCst);
        self.token.cancel();
        first
    }

    /// True once the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the signal fires (immediately if it already has).
    pub fn fired(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
