//! Releasing every service exactly once.

use std::panic::AssertUnwindSafe;

use colloquy_core::{ServiceId, ShutdownError};
use futures_util::FutureExt;

use crate::registry::ServiceRegistry;

/// One service whose shutdown hook failed.
#[derive(Debug)]
pub struct ShutdownFailure {
    /// The failing service.
    pub service: ServiceId,
    /// What went wrong.
    pub error: ShutdownError,
}

/// Aggregate result of a shutdown. Failures are recorded, never raised.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Services whose shutdown hook was invoked, in invocation order.
    pub invoked: Vec<ServiceId>,
    /// Services whose shutdown hook returned an error or panicked.
    pub failures: Vec<ShutdownFailure>,
}

impl ShutdownReport {
    /// Whether every shutdown hook succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ids of the failing services.
    pub fn failed_services(&self) -> Vec<&ServiceId> {
        self.failures.iter().map(|f| &f.service).collect()
    }
}

/// Call `on_shutdown` on the services at `indices`, in reverse order.
pub(crate) async fn shutdown_services(
    registry: &mut ServiceRegistry,
    indices: std::ops::Range<usize>,
) -> ShutdownReport {
    let mut report = ShutdownReport::default();
    for idx in indices.rev() {
        let Some(id) = registry.descriptor(idx).map(|d| d.id.clone()) else {
            continue;
        };
        let Some(service) = registry.service_mut(idx) else {
            continue;
        };

        let outcome = AssertUnwindSafe(service.on_shutdown()).catch_unwind().await;
        report.invoked.push(id.clone());
        let error = match outcome {
            Ok(Ok(())) => {
                tracing::debug!(service = %id, "colloquy.shutdown.service");
                continue;
            }
            Ok(Err(e)) => e,
            Err(payload) => ShutdownError::Panicked(panic_message(payload.as_ref())),
        };
        tracing::warn!(service = %id, error = %error, "colloquy.shutdown.failed");
        report.failures.push(ShutdownFailure { service: id, error });
    }
    report
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
