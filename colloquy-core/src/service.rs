//! The Service protocol: one pluggable processing stage.

use crate::envelope::{Envelope, Publications};
use crate::error::{RegistryError, ServiceError, ShutdownError};
use crate::id::{DomainId, ServiceId, Topic};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A service's declared contract: what it publishes, what it needs, and
/// which domain (if any) it belongs to.
///
/// `subscribes` topics gate readiness within a pass: the service fires
/// once all of them are in the envelope. `feedback` topics are read from
/// the previous turn's output; they never gate readiness and never create
/// an edge inside one pass, which is how cross-turn loops stay acyclic.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Stable service name.
    pub id: ServiceId,
    /// Topics this service writes.
    pub publishes: BTreeSet<Topic>,
    /// Topics this service needs before it can fire.
    pub subscribes: BTreeSet<Topic>,
    /// Topics carried over from the previous turn.
    pub feedback: BTreeSet<Topic>,
    /// Domain affinity. `None` means domain-agnostic (shared by every domain).
    pub domain: Option<DomainId>,
}

impl ServiceDescriptor {
    /// Create a descriptor with empty topic sets and no domain affinity.
    pub fn new(id: impl Into<ServiceId>) -> Self {
        Self {
            id: id.into(),
            publishes: BTreeSet::new(),
            subscribes: BTreeSet::new(),
            feedback: BTreeSet::new(),
            domain: None,
        }
    }

    /// Add published topics.
    pub fn publishes<I, T>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        self.publishes.extend(topics.into_iter().map(Into::into));
        self
    }

    /// Add subscribed topics.
    pub fn subscribes<I, T>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        self.subscribes.extend(topics.into_iter().map(Into::into));
        self
    }

    /// Add topics read from the previous turn.
    pub fn feedback<I, T>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Topic>,
    {
        self.feedback.extend(topics.into_iter().map(Into::into));
        self
    }

    /// Bind the service to a domain.
    pub fn domain(mut self, domain: impl Into<DomainId>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Whether the service belongs to every domain's graph.
    pub fn is_shared(&self) -> bool {
        self.domain.is_none()
    }

    /// Check the descriptor's own invariant: a service cannot depend on
    /// its own output within one pass.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let overlap: Vec<Topic> = self
            .publishes
            .intersection(&self.subscribes)
            .cloned()
            .collect();
        if overlap.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::OverlappingTopics {
                service: self.id.clone(),
                topics: overlap,
            })
        }
    }
}

/// Protocol: Service
///
/// A processing stage: NLU, belief tracking, policy, generation, output,
/// domain classification. The orchestrator only ever sees this trait.
///
/// Lifecycle, in order: `on_init` once at start-up, `on_dialog_start`
/// before the first turn, `on_turn` whenever the service's subscriptions
/// are satisfied (at most once per turn), `on_dialog_end` after the last
/// turn, `on_shutdown` exactly once at the end.
///
/// Services run one at a time; `&mut self` is never shared across turns.
#[async_trait]
pub trait Service: Send + Sync {
    /// The service's contract. Called once at registration; the returned
    /// descriptor is fixed for the lifetime of the session.
    fn describe(&self) -> ServiceDescriptor;

    /// Acquire resources. A failure here aborts start-up.
    async fn on_init(&mut self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Reset per-dialog state.
    async fn on_dialog_start(&mut self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Read subscribed topics, compute, and return published topics.
    /// The envelope must not be retained past this call.
    async fn on_turn(&mut self, envelope: &Envelope) -> Result<Publications, ServiceError>;

    /// Called once after the final turn.
    async fn on_dialog_end(&mut self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Release resources. Called exactly once.
    async fn on_shutdown(&mut self) -> Result<(), ShutdownError> {
        Ok(())
    }
}
