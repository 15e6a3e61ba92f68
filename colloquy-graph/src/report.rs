//! Start-up consistency report.

use std::collections::BTreeSet;
use std::fmt;

use colloquy_core::{DomainId, ServiceId, Topic};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::GraphScope;

/// A structural defect found while building the pipeline graphs.
///
/// Defects never stop a session from running (degraded mode is allowed),
/// but every one of them has to be reported before the first turn.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Defect {
    /// A topic is consumed in a graph but nothing in that graph produces it.
    #[error("[{scope}] unreachable dependency: {topic} (needed by {})", ids(.consumers))]
    UnreachableDependency {
        /// The graph the defect was found in.
        scope: GraphScope,
        /// The topic nobody produces.
        topic: Topic,
        /// Services waiting for it.
        consumers: Vec<ServiceId>,
    },

    /// More than one service in the same graph produces a topic.
    #[error("[{scope}] ambiguous producer: {topic} (published by {})", ids(.producers))]
    AmbiguousProducer {
        /// The graph the defect was found in.
        scope: GraphScope,
        /// The contested topic.
        topic: Topic,
        /// Every producer, in registration order.
        producers: Vec<ServiceId>,
    },

    /// A service neither feeds anything nor sits downstream of the seed.
    #[error("[{scope}] dangling service: {service}")]
    DanglingService {
        /// The graph the defect was found in.
        scope: GraphScope,
        /// The disconnected service.
        service: ServiceId,
    },

    /// Services that wait on each other within one pass.
    #[error("[{scope}] cycle between {}", ids(.services))]
    Cycle {
        /// The graph the defect was found in.
        scope: GraphScope,
        /// Services on the cycle, in registration order.
        services: Vec<ServiceId>,
    },

    /// A service is bound to a domain that was never registered.
    #[error("service {service} is bound to unknown domain {domain}")]
    UnknownDomain {
        /// The bound service.
        service: ServiceId,
        /// The missing domain.
        domain: DomainId,
    },
}

/// Informational finding. Notes do not affect [`ConsistencyReport::is_consistent`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Note {
    /// A topic is published but nobody reads it.
    UnconsumedTopic {
        /// The graph the note applies to.
        scope: GraphScope,
        /// The unread topic.
        topic: Topic,
        /// Who publishes it.
        producers: Vec<ServiceId>,
    },
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnconsumedTopic {
                scope,
                topic,
                producers,
            } => write!(
                f,
                "[{scope}] {topic} is published by {} but never consumed",
                ids(producers)
            ),
        }
    }
}

/// Everything the graph builder found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    defects: Vec<Defect>,
    notes: Vec<Note>,
}

impl ConsistencyReport {
    /// An empty (consistent) report.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_defect(&mut self, defect: Defect) {
        self.defects.push(defect);
    }

    pub(crate) fn push_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// True iff no defect was raised.
    pub fn is_consistent(&self) -> bool {
        self.defects.is_empty()
    }

    /// Every defect, in discovery order.
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    /// Every note, in discovery order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Topics flagged as unreachable in any graph.
    pub fn unreachable_topics(&self) -> BTreeSet<Topic> {
        self.defects
            .iter()
            .filter_map(|d| match d {
                Defect::UnreachableDependency { topic, .. } => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }

    /// Topics flagged as having several producers in one graph.
    pub fn ambiguous_topics(&self) -> BTreeSet<Topic> {
        self.defects
            .iter()
            .filter_map(|d| match d {
                Defect::AmbiguousProducer { topic, .. } => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }

    /// Services flagged as dangling in any graph.
    pub fn dangling_services(&self) -> BTreeSet<ServiceId> {
        self.defects
            .iter()
            .filter_map(|d| match d {
                Defect::DanglingService { service, .. } => Some(service.clone()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ConsistencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.defects.is_empty() {
            writeln!(f, "messaging pipeline is consistent")?;
        } else {
            writeln!(f, "messaging pipeline has {} defect(s):", self.defects.len())?;
            for defect in &self.defects {
                writeln!(f, "  - {defect}")?;
            }
        }
        for note in &self.notes {
            writeln!(f, "  note: {note}")?;
        }
        Ok(())
    }
}

fn ids(ids: &[ServiceId]) -> String {
    ids.iter()
        .map(ServiceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
