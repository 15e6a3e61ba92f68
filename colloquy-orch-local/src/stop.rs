//! External stop requests.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Asks a running session to stop.
///
/// Cloneable and usable from any thread or task. A stop request is
/// observed before the next turn starts; an in-flight turn always
/// finishes. A session blocked waiting for input wakes up immediately.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<String>>>,
}

impl StopHandle {
    /// Create a handle that has not been triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Only the first reason is kept.
    pub fn stop(&self, reason: impl Into<String>) {
        {
            let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(reason.into());
            }
        }
        self.token.cancel();
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason given with the first stop request.
    pub fn reason(&self) -> Option<String> {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolves once a stop is requested.
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
