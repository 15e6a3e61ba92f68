//! The Hook interface: observation of the session loop.

use crate::error::HookError;
use crate::id::{DomainId, ServiceId, SessionId};
use crate::turn::TurnReport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where in the session loop a hook fires.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Once, before the first turn.
    SessionStart,
    /// Before each turn's propagation pass, with the seed.
    TurnStart,
    /// After each service invocation.
    ServiceFired,
    /// When the router swaps the active domain graph.
    DomainSwitched,
    /// After each turn, with its report.
    TurnEnd,
    /// Once, after shutdown.
    SessionEnd,
}

impl HookPoint {
    /// Every hook point, in loop order.
    pub const ALL: [HookPoint; 6] = [
        HookPoint::SessionStart,
        HookPoint::TurnStart,
        HookPoint::ServiceFired,
        HookPoint::DomainSwitched,
        HookPoint::TurnEnd,
        HookPoint::SessionEnd,
    ];
}

/// What context is available to a hook at its firing point.
/// Read-only: hooks observe, they don't touch the envelope.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// Current hook point.
    pub point: HookPoint,
    /// The session being driven.
    pub session: SessionId,
    /// Current turn number (0 before the first turn).
    pub turn: u64,
    /// Active domain, if resolved.
    pub domain: Option<DomainId>,
    /// Previous domain (only at DomainSwitched).
    pub previous_domain: Option<DomainId>,
    /// The service that just fired (only at ServiceFired).
    pub service: Option<ServiceId>,
    /// Seed values (only at TurnStart) or the service's publications
    /// (only at ServiceFired), as a JSON object.
    pub values: Option<serde_json::Value>,
    /// The completed turn (only at TurnEnd).
    pub report: Option<TurnReport>,
}

impl HookContext {
    /// Create a new HookContext with only the point, session and turn set.
    pub fn new(point: HookPoint, session: SessionId, turn: u64) -> Self {
        Self {
            point,
            session,
            turn,
            domain: None,
            previous_domain: None,
            service: None,
            values: None,
            report: None,
        }
    }
}

/// What a hook decides to do.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HookAction {
    /// Continue normally.
    Continue,
    /// Stop the session before the next turn starts. An in-flight turn
    /// always finishes.
    Stop {
        /// Reason for stopping.
        reason: String,
    },
}

/// A hook that observes the session loop.
///
/// Hooks are registered on the session and called at the defined points.
/// Services don't know who's watching.
///
/// Implementations:
/// - TracingHook: the debug logger
/// - ConversationLog: one log file per session
#[async_trait]
pub trait Hook: Send + Sync {
    /// Which points this hook fires at.
    fn points(&self) -> &[HookPoint];

    /// Called at each registered hook point.
    /// Returning an error does NOT stop the session; it is logged.
    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, HookError>;
}
