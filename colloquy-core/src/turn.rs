//! What one turn produced and what went wrong along the way.

use crate::envelope::Envelope;
use crate::id::{DomainId, ServiceId, Topic};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-fatal problem observed during one turn. The turn still completes.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDiagnostic {
    /// No domain could be resolved; only the domain-agnostic fallback
    /// path ran.
    UnresolvedDomain {
        /// The unrecognised domain value, if the classifier emitted one.
        observed: Option<serde_json::Value>,
    },
    /// A consumer never received a required topic within the pass.
    PartialPipeline {
        /// The service that never fired.
        service: ServiceId,
        /// Subscribed topics absent from the envelope.
        missing: Vec<Topic>,
    },
    /// A service published a topic outside its declared publish set.
    /// The value was dropped.
    UndeclaredTopic {
        /// The publishing service.
        service: ServiceId,
        /// The undeclared topic.
        topic: Topic,
    },
}

impl fmt::Display for TurnDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedDomain { observed: Some(v) } => {
                write!(f, "unresolved domain: unknown domain {v}")
            }
            Self::UnresolvedDomain { observed: None } => {
                write!(f, "unresolved domain: no domain selected")
            }
            Self::PartialPipeline { service, missing } => {
                let missing: Vec<&str> = missing.iter().map(Topic::as_str).collect();
                write!(
                    f,
                    "partial pipeline: {service} never received {}",
                    missing.join(", ")
                )
            }
            Self::UndeclaredTopic { service, topic } => {
                write!(f, "undeclared topic: {service} published {topic}")
            }
        }
    }
}

/// The outcome of one completed turn.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    /// 1-based turn number within the session.
    pub turn: u64,
    /// Domain active when the turn completed.
    pub domain: Option<DomainId>,
    /// Services in the order they fired.
    pub fired: Vec<ServiceId>,
    /// The final envelope.
    pub envelope: Envelope,
    /// Non-fatal problems observed during the turn.
    pub diagnostics: Vec<TurnDiagnostic>,
}

impl TurnReport {
    /// Create a report for a turn.
    pub fn new(turn: u64, envelope: Envelope) -> Self {
        Self {
            turn,
            domain: None,
            fired: Vec::new(),
            envelope,
            diagnostics: Vec::new(),
        }
    }

    /// Whether the turn completed without diagnostics.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether a service fired during the turn.
    pub fn fired(&self, service: &str) -> bool {
        self.fired.iter().any(|s| s.as_str() == service)
    }
}
