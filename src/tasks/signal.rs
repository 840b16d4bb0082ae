//! Cancellation Signal
//!
//! One-way latch used to ask a periodic task to stop at its next check point.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Monotonic boolean latch shared between the supervisor and one task.
///
/// Clones observe the same latch. Once set it stays set; setting it again,
/// from any number of threads, has no further effect.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches the signal.
    pub fn set(&self) {
        self.token.cancel();
    }

    /// Non-blocking read of the latch.
    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleeps for up to `timeout`, waking early if the signal is set.
    ///
    /// Returns whether the signal is set when the wait ends.
    pub async fn wait(&self, timeout: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => true,
            _ = tokio::time::sleep(timeout) => self.is_set(),
        }
    }
}
