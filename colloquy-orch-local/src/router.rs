//! Domain routing: which domain graph governs the conversation.

use colloquy_core::{Domain, DomainId, RegistryError, Topic};
use colloquy_graph::GraphScope;
use serde_json::Value;

/// What the router decided after seeing a value on the domain topic.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Same domain as before, or nothing to act on.
    Stay,
    /// Swap the active graph.
    Switch {
        /// Domain active before the switch, `None` on first resolution.
        from: Option<DomainId>,
        /// Domain active after the switch.
        to: DomainId,
    },
    /// The classifier named a domain that is not registered.
    Unknown(Value),
}

/// Maps the classifier's output to a registered domain.
///
/// The router holds no mutable state: the active domain lives in the
/// session state, and the router is consulted with it every time the
/// domain topic is written.
#[derive(Debug, Clone)]
pub struct DomainRouter {
    domains: Vec<Domain>,
    topic: Topic,
}

impl DomainRouter {
    /// Create a router that watches `topic`.
    pub fn new(topic: impl Into<Topic>) -> Self {
        Self {
            domains: Vec::new(),
            topic: topic.into(),
        }
    }

    /// Register a domain. Fails if the id is taken.
    pub fn add_domain(&mut self, domain: Domain) -> Result<(), RegistryError> {
        if self.get(domain.id()).is_some() {
            return Err(RegistryError::DuplicateDomain(domain.id().clone()));
        }
        self.domains.push(domain);
        Ok(())
    }

    /// The topic the classifier publishes the domain identity on.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Registered domains, in registration order.
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// Registered domain ids, in registration order.
    pub fn domain_ids(&self) -> Vec<DomainId> {
        self.domains.iter().map(|d| d.id().clone()).collect()
    }

    /// A registered domain.
    pub fn get(&self, id: &DomainId) -> Option<&Domain> {
        self.domains.iter().find(|d| d.id() == id)
    }

    /// Whether routing applies at all. Without domains the shared graph
    /// is used for the whole session.
    pub fn has_domains(&self) -> bool {
        !self.domains.is_empty()
    }

    /// The graph to schedule with, given the active domain. Unresolved
    /// means the domain-agnostic fallback path.
    pub fn scope(&self, active: Option<&DomainId>) -> GraphScope {
        match active {
            Some(domain) if self.has_domains() => GraphScope::Domain(domain.clone()),
            _ => GraphScope::Shared,
        }
    }

    /// Decide what a value on the domain topic means.
    ///
    /// Accepts either a bare domain id string or an object with an `id`
    /// field. `null` means the classifier did not decide.
    pub fn route(&self, active: Option<&DomainId>, value: &Value) -> Route {
        let name = match value {
            Value::Null => return Route::Stay,
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("id").and_then(Value::as_str),
            _ => None,
        };
        let Some(domain) = name.and_then(|n| self.domains.iter().find(|d| d.id().as_str() == n))
        else {
            return Route::Unknown(value.clone());
        };
        if active == Some(domain.id()) {
            Route::Stay
        } else {
            Route::Switch {
                from: active.cloned(),
                to: domain.id().clone(),
            }
        }
    }
}
