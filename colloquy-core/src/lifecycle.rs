//! Session lifecycle phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the session driver is in its lifecycle.
///
/// Transitions only move forward:
/// `Initializing -> Running -> ShuttingDown -> Terminated`.
/// A session may skip `Running` entirely when start-up fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Registry populated, graphs built, consistency checked.
    Initializing,
    /// Turns are being executed.
    Running,
    /// Shutdown hooks are being invoked.
    ShuttingDown,
    /// No further turns may run.
    Terminated,
}

impl SessionPhase {
    /// Whether the driver may still execute a turn in this phase.
    pub fn accepts_turns(self) -> bool {
        matches!(self, Self::Initializing | Self::Running)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}
