//! Concrete [`Hook`] using the [`tracing`] crate.
//!
//! Emits one structured `tracing` event per session hook point. Wire to any
//! `tracing`-compatible subscriber.

use async_trait::async_trait;
use colloquy_core::hook::{Hook, HookAction, HookContext, HookPoint};
use colloquy_core::HookError;

/// The debug logger: a [`Hook`] that emits structured [`tracing`] events.
///
/// Always returns [`HookAction::Continue`]; it observes but never controls.
///
/// # Levels
///
/// | Point | Level |
/// |-------|-------|
/// | TurnStart, ServiceFired, TurnEnd | `DEBUG` |
/// | SessionStart, DomainSwitched, SessionEnd | `INFO` |
///
/// Envelope values are only logged when enabled with
/// [`TracingHook::with_values`]; they may contain what the user said.
pub struct TracingHook {
    capture_values: bool,
}

impl TracingHook {
    /// Create a new `TracingHook` that logs structure only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capture_values: false,
        }
    }

    /// Also log seed values and publications.
    #[must_use]
    pub fn with_values(mut self, capture: bool) -> Self {
        self.capture_values = capture;
        self
    }
}

impl Default for TracingHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Hook for TracingHook {
    fn points(&self) -> &[HookPoint] {
        &HookPoint::ALL
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, HookError> {
        let session = ctx.session.as_str();
        let domain = ctx.domain.as_ref().map(|d| d.as_str()).unwrap_or("-");
        match ctx.point {
            HookPoint::SessionStart => {
                tracing::info!(session, "colloquy.session.start");
            }
            HookPoint::TurnStart => {
                if self.capture_values {
                    tracing::debug!(session, turn = ctx.turn, domain, seed = ?ctx.values, "colloquy.turn.start");
                } else {
                    tracing::debug!(session, turn = ctx.turn, domain, "colloquy.turn.start");
                }
            }
            HookPoint::ServiceFired => {
                let service = ctx.service.as_ref().map(|s| s.as_str()).unwrap_or("-");
                let topics: Vec<&str> = ctx
                    .values
                    .as_ref()
                    .and_then(|v| v.as_object())
                    .map(|m| m.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                if self.capture_values {
                    tracing::debug!(
                        session,
                        turn = ctx.turn,
                        service,
                        published = ?ctx.values,
                        "colloquy.service.fired"
                    );
                } else {
                    tracing::debug!(
                        session,
                        turn = ctx.turn,
                        service,
                        topics = ?topics,
                        "colloquy.service.fired"
                    );
                }
            }
            HookPoint::DomainSwitched => {
                let from = ctx
                    .previous_domain
                    .as_ref()
                    .map(|d| d.as_str())
                    .unwrap_or("-");
                tracing::info!(session, turn = ctx.turn, from, to = domain, "colloquy.domain.switch");
            }
            HookPoint::TurnEnd => {
                if let Some(report) = &ctx.report {
                    tracing::debug!(
                        session,
                        turn = ctx.turn,
                        domain,
                        fired = report.fired.len(),
                        diagnostics = report.diagnostics.len(),
                        "colloquy.turn.end"
                    );
                    for diagnostic in &report.diagnostics {
                        tracing::debug!(session, turn = ctx.turn, %diagnostic, "colloquy.turn.diagnostic");
                    }
                } else {
                    tracing::debug!(session, turn = ctx.turn, domain, "colloquy.turn.end");
                }
            }
            HookPoint::SessionEnd => {
                tracing::info!(session, turns = ctx.turn, "colloquy.session.end");
            }
            _ => {}
        }
        Ok(HookAction::Continue)
    }
}
