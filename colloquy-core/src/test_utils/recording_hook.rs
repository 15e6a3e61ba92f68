//! RecordingHook: records every event and optionally stops the session.

use crate::error::HookError;
use crate::hook::{Hook, HookAction, HookContext, HookPoint};
use async_trait::async_trait;
use std::sync::Mutex;

/// A hook that records every event it sees.
/// Use `.events()` to inspect what was recorded.
pub struct RecordingHook {
    points: Vec<HookPoint>,
    events: Mutex<Vec<HookContext>>,
    stop_after: Option<u64>,
}

impl RecordingHook {
    /// Create a RecordingHook that fires at all hook points.
    pub fn new() -> Self {
        Self {
            points: HookPoint::ALL.to_vec(),
            events: Mutex::new(Vec::new()),
            stop_after: None,
        }
    }

    /// Return `HookAction::Stop` at the end of turn `turn` and later.
    pub fn stop_after(mut self, turn: u64) -> Self {
        self.stop_after = Some(turn);
        self
    }

    /// Return a snapshot of all recorded events.
    pub fn events(&self) -> Vec<HookContext> {
        self.events.lock().unwrap().clone()
    }

    /// Return the recorded hook points only.
    pub fn points_seen(&self) -> Vec<HookPoint> {
        self.events.lock().unwrap().iter().map(|e| e.point).collect()
    }
}

impl Default for RecordingHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Hook for RecordingHook {
    fn points(&self) -> &[HookPoint] {
        &self.points
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, HookError> {
        self.events.lock().unwrap().push(ctx.clone());
        match self.stop_after {
            Some(limit) if ctx.point == HookPoint::TurnEnd && ctx.turn >= limit => {
                Ok(HookAction::Stop {
                    reason: format!("stop after turn {limit}"),
                })
            }
            _ => Ok(HookAction::Continue),
        }
    }
}
