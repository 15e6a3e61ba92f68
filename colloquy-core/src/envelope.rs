//! The message envelope: what services exchange within one turn.

use crate::id::{ServiceId, Topic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a value in the envelope came from.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "service", rename_all = "snake_case")]
pub enum Origin {
    /// The external input the turn was seeded with.
    Seed,
    /// State carried over from the previous turn (feedback topics).
    Carried,
    /// Published by a service during this turn.
    Service(ServiceId),
}

/// Mutable mapping topic -> value, created fresh for every turn.
///
/// The turn scheduler owns the envelope for the duration of one pass.
/// Services only ever see `&Envelope` for the length of their own
/// invocation and hand their output back as [`Publications`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    values: BTreeMap<Topic, serde_json::Value>,
    origins: BTreeMap<Topic, Origin>,
    /// Topics in the order they were written. A topic written twice
    /// appears twice.
    writes: Vec<Topic>,
}

impl Envelope {
    /// Create an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an envelope seeded with one external input field.
    pub fn seeded(topic: impl Into<Topic>, value: impl Into<serde_json::Value>) -> Self {
        let mut envelope = Self::new();
        envelope.insert(topic.into(), value.into(), Origin::Seed);
        envelope
    }

    /// Write a value, replacing any previous value for the topic.
    pub fn insert(&mut self, topic: Topic, value: serde_json::Value, origin: Origin) {
        self.writes.push(topic.clone());
        self.origins.insert(topic.clone(), origin);
        self.values.insert(topic, value);
    }

    /// Read a topic's value.
    pub fn get(&self, topic: &str) -> Option<&serde_json::Value> {
        self.values.get(topic)
    }

    /// Read a topic's value as a string slice, if it is a JSON string.
    pub fn get_str(&self, topic: &str) -> Option<&str> {
        self.get(topic).and_then(|v| v.as_str())
    }

    /// Whether the topic is present.
    pub fn contains(&self, topic: &str) -> bool {
        self.values.contains_key(topic)
    }

    /// Who wrote the current value of a topic.
    pub fn origin(&self, topic: &str) -> Option<&Origin> {
        self.origins.get(topic)
    }

    /// Topics present, in name order.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.values.keys()
    }

    /// Topics in the order they were written during the turn.
    pub fn write_order(&self) -> &[Topic] {
        &self.writes
    }

    /// Iterate `(topic, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Topic, &serde_json::Value)> {
        self.values.iter()
    }

    /// Number of topics present.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no topic is present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keep only topics whose origin satisfies the predicate.
    pub fn retain_origins(&mut self, mut keep: impl FnMut(&Topic, &Origin) -> bool) {
        let dropped: Vec<Topic> = self
            .origins
            .iter()
            .filter(|(topic, origin)| !keep(topic, origin))
            .map(|(topic, _)| topic.clone())
            .collect();
        for topic in &dropped {
            self.values.remove(topic);
            self.origins.remove(topic);
        }
        self.writes.retain(|t| !dropped.contains(t));
    }

    /// Render the values as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Values a service hands back from one invocation.
///
/// Only topics in the service's declared publish set are accepted into the
/// envelope; anything else is dropped and reported by the scheduler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Publications {
    entries: Vec<(Topic, serde_json::Value)>,
}

impl Publications {
    /// Publish nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builder-style publish.
    pub fn with(mut self, topic: impl Into<Topic>, value: impl Into<serde_json::Value>) -> Self {
        self.push(topic, value);
        self
    }

    /// Publish a value.
    pub fn push(&mut self, topic: impl Into<Topic>, value: impl Into<serde_json::Value>) {
        self.entries.push((topic.into(), value.into()));
    }

    /// Whether nothing was published.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the published pairs.
    pub fn iter(&self) -> impl Iterator<Item = &(Topic, serde_json::Value)> {
        self.entries.iter()
    }
}

impl IntoIterator for Publications {
    type Item = (Topic, serde_json::Value);
    type IntoIter = std::vec::IntoIter<(Topic, serde_json::Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seeded_envelope_has_one_field() {
        let env = Envelope::seeded("gen_user_utterance", "");
        assert_eq!(env.len(), 1);
        assert_eq!(env.get_str("gen_user_utterance"), Some(""));
        assert_eq!(env.origin("gen_user_utterance"), Some(&Origin::Seed));
    }

    #[test]
    fn retain_origins_drops_service_values() {
        let mut env = Envelope::seeded("raw", "hi");
        env.insert(
            Topic::new("intent"),
            json!("greet"),
            Origin::Service(ServiceId::new("nlu")),
        );
        env.insert(Topic::new("bc"), json!("okay"), Origin::Carried);

        env.retain_origins(|_, origin| !matches!(origin, Origin::Service(_)));

        assert!(env.contains("raw"));
        assert!(env.contains("bc"));
        assert!(!env.contains("intent"));
        assert_eq!(env.write_order(), &[Topic::new("raw"), Topic::new("bc")]);
    }

    #[test]
    fn to_json_renders_object() {
        let mut env = Envelope::seeded("raw", "hi");
        env.insert(Topic::new("n"), json!(3), Origin::Carried);
        assert_eq!(env.to_json(), json!({"raw": "hi", "n": 3}));
    }
}
