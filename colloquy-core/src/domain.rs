//! Domains and the Lookup protocol: read-only domain knowledge.

use crate::error::LookupError;
use crate::id::DomainId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One entity in a domain's knowledge base.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Constraints for a structured lookup.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupQuery {
    /// Slot -> required value. Matching is case-insensitive on strings.
    pub constraints: BTreeMap<String, String>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl LookupQuery {
    /// A query with no constraints (matches every record).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint.
    pub fn with(mut self, slot: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(slot.into(), value.into());
        self
    }

    /// Cap the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Protocol: Lookup
///
/// Key/value and structured-record access to a domain's knowledge.
/// Read-only from the orchestrator's perspective; queried by
/// domain-affine services.
///
/// Implementations:
/// - JsonLookup: records loaded from a JSON file (colloquy-lookup-json)
/// - anything else that can answer "which records match these slots"
#[async_trait]
pub trait LookupBackend: Send + Sync {
    /// The slot that names a record (e.g. `name`).
    fn primary_key(&self) -> &str;

    /// Slots a user can constrain a search by.
    fn informable_slots(&self) -> Vec<String>;

    /// Slots a user can ask about.
    fn requestable_slots(&self) -> Vec<String>;

    /// Records matching every constraint of the query.
    async fn find(&self, query: &LookupQuery) -> Result<Vec<Record>, LookupError>;

    /// The record whose primary key equals `key`.
    async fn get(&self, key: &str) -> Result<Option<Record>, LookupError>;

    /// Every distinct value of a slot across records.
    async fn distinct_values(&self, slot: &str) -> Result<Vec<String>, LookupError>;
}

/// A conversational subject area.
///
/// The ordered subset of services belonging to a domain is not stored
/// here; it is derived from service descriptors when the pipeline graphs
/// are built.
#[derive(Clone)]
pub struct Domain {
    id: DomainId,
    display_name: String,
    lookup: Option<Arc<dyn LookupBackend>>,
}

impl Domain {
    /// Create a domain without a lookup backend.
    pub fn new(id: impl Into<DomainId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            lookup: None,
        }
    }

    /// Attach the domain's lookup backend.
    pub fn with_lookup(mut self, lookup: Arc<dyn LookupBackend>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Domain identity.
    pub fn id(&self) -> &DomainId {
        &self.id
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The domain's lookup backend, if any.
    pub fn lookup(&self) -> Option<&Arc<dyn LookupBackend>> {
        self.lookup.as_ref()
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}
