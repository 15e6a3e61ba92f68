#![deny(missing_docs)]
//! JSON-backed implementation of colloquy's LookupBackend trait.
//!
//! A domain file bundles a domain's identity, the keywords a domain
//! tracker can recognise it by, its slot ontology, and its records:
//!
//! ```json
//! {
//!   "id": "ImsLecturers",
//!   "display_name": "Lecturers",
//!   "primary_key": "name",
//!   "keywords": ["lecturer", "professor"],
//!   "informable": ["department", "position"],
//!   "requestable": ["email", "phone", "room"],
//!   "records": [{ "name": "...", "department": "...", "email": "..." }]
//! }
//! ```
//!
//! Records are loaded once and never written. Matching is
//! case-insensitive; the constraint value `dontcare` matches anything.

use async_trait::async_trait;
use colloquy_core::domain::{Domain, LookupBackend, LookupQuery, Record};
use colloquy_core::error::LookupError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Constraint value that matches every record.
pub const DONTCARE: &str = "dontcare";

/// On-disk description of one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainFile {
    /// Domain identity.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Slot naming a record.
    pub primary_key: String,
    /// Words that mark an utterance as belonging to this domain.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Slots a user can constrain a search by.
    #[serde(default)]
    pub informable: Vec<String>,
    /// Slots a user can ask about.
    #[serde(default)]
    pub requestable: Vec<String>,
    /// The knowledge base.
    #[serde(default)]
    pub records: Vec<Record>,
}

impl DomainFile {
    /// Parse a domain file from JSON text.
    pub fn from_json(text: &str) -> Result<Self, LookupError> {
        serde_json::from_str(text).map_err(|e| LookupError::LoadFailed(e.to_string()))
    }

    /// Read and parse a domain file.
    pub async fn load(path: &Path) -> Result<Self, LookupError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LookupError::LoadFailed(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// The lookup backend over this file's records.
    pub fn lookup(&self) -> JsonLookup {
        JsonLookup::new(
            self.primary_key.clone(),
            self.informable.clone(),
            self.requestable.clone(),
            self.records.clone(),
        )
    }

    /// The domain, with its lookup backend attached.
    pub fn domain(&self) -> Domain {
        Domain::new(self.id.as_str(), self.display_name.as_str()).with_lookup(Arc::new(self.lookup()))
    }
}

/// Read-only lookup over an in-memory list of records.
#[derive(Debug, Clone)]
pub struct JsonLookup {
    primary_key: String,
    informable: Vec<String>,
    requestable: Vec<String>,
    records: Vec<Record>,
}

impl JsonLookup {
    /// Create a lookup over `records`.
    pub fn new(
        primary_key: impl Into<String>,
        informable: Vec<String>,
        requestable: Vec<String>,
        records: Vec<Record>,
    ) -> Self {
        Self {
            primary_key: primary_key.into(),
            informable,
            requestable,
            records,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_slot(&self, slot: &str) -> Result<(), LookupError> {
        let known = slot == self.primary_key
            || self.informable.iter().any(|s| s == slot)
            || self.requestable.iter().any(|s| s == slot);
        if known {
            Ok(())
        } else {
            Err(LookupError::UnknownSlot(slot.to_string()))
        }
    }
}

/// Whether a record field satisfies a constraint value.
fn field_matches(field: Option<&serde_json::Value>, wanted: &str) -> bool {
    if wanted.eq_ignore_ascii_case(DONTCARE) {
        return true;
    }
    match field {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case(wanted),
        Some(serde_json::Value::Array(items)) => items.iter().any(|v| field_matches(Some(v), wanted)),
        Some(other) => other.to_string().eq_ignore_ascii_case(wanted),
    }
}

/// Render a field as plain text.
fn field_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl LookupBackend for JsonLookup {
    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    fn informable_slots(&self) -> Vec<String> {
        self.informable.clone()
    }

    fn requestable_slots(&self) -> Vec<String> {
        self.requestable.clone()
    }

    async fn find(&self, query: &LookupQuery) -> Result<Vec<Record>, LookupError> {
        for slot in query.constraints.keys() {
            self.check_slot(slot)?;
        }
        let matches = self.records.iter().filter(|record| {
            query
                .constraints
                .iter()
                .all(|(slot, wanted)| field_matches(record.get(slot), wanted))
        });
        Ok(match query.limit {
            Some(limit) => matches.take(limit).cloned().collect(),
            None => matches.cloned().collect(),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Record>, LookupError> {
        Ok(self
            .records
            .iter()
            .find(|r| field_matches(r.get(&self.primary_key), key))
            .cloned())
    }

    async fn distinct_values(&self, slot: &str) -> Result<Vec<String>, LookupError> {
        self.check_slot(slot)?;
        let mut values = BTreeSet::new();
        for record in &self.records {
            match record.get(slot) {
                Some(serde_json::Value::Array(items)) => {
                    values.extend(items.iter().filter_map(field_text));
                }
                Some(value) => values.extend(field_text(value)),
                None => {}
            }
        }
        Ok(values.into_iter().collect())
    }
}
