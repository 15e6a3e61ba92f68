#![deny(missing_docs)]
//! Hook registry and the debug logger for colloquy.
//!
//! The [`HookRegistry`] collects multiple [`Hook`] implementations into
//! an ordered list. At each hook point every hook registered for that
//! point is called, in registration order. Hooks observe; none of them can
//! hide an event from the hooks after it, so a conversation log still
//! sees the turn that some other hook asked to stop after. The first
//! `Stop` returned wins. Hook errors are logged and otherwise ignored.

mod tracing_hook;

pub use tracing_hook::TracingHook;

use colloquy_core::hook::{Hook, HookAction, HookContext};
use std::sync::Arc;

/// A registry that dispatches session events to an ordered list of hooks.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookRegistry {
    /// Create a new empty hook registry.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook to the end of the list.
    pub fn add(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Dispatch an event to every hook registered for its point.
    ///
    /// Returns `Continue` unless some hook asked to stop, in which case the
    /// first `Stop` is returned.
    pub async fn dispatch(&self, ctx: &HookContext) -> HookAction {
        let mut outcome = HookAction::Continue;
        for (index, hook) in self.hooks.iter().enumerate() {
            if !hook.points().contains(&ctx.point) {
                continue;
            }

            match hook.on_event(ctx).await {
                Ok(HookAction::Continue) => {}
                Ok(action) => {
                    if matches!(outcome, HookAction::Continue) {
                        outcome = action;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        hook = index,
                        point = ?ctx.point,
                        error = %e,
                        "colloquy.hook.failed"
                    );
                }
            }
        }
        outcome
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
