#![deny(missing_docs)]
//! Handcrafted dialog stages for colloquy.
//!
//! A complete task-oriented pipeline for one lookup domain:
//!
//! ```text
//! gen_user_utterance -> DomainTracker -> user_utterance, domain
//! user_utterance     -> KeywordNlu    -> user_acts
//! user_acts          -> BeliefTracker -> beliefstate
//! beliefstate        -> LookupPolicy  -> sys_act
//! sys_act            -> TemplateNlg   -> sys_utterance
//! ```
//!
//! `DomainTracker` and `BackchannelPredictor` are domain-agnostic; the
//! other four are bound to one domain and are built per domain by
//! [`domain_pipeline`].

pub mod acts;
mod backchannel;
mod belief;
mod matching;
mod nlg;
mod nlu;
mod policy;
pub mod topics;
mod tracker;

pub use backchannel::BackchannelPredictor;
pub use belief::BeliefTracker;
pub use nlg::TemplateNlg;
pub use nlu::KeywordNlu;
pub use policy::LookupPolicy;
pub use tracker::DomainTracker;

use colloquy_core::{Domain, Envelope, Service, ServiceError, Topic};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// NLU, belief tracker, policy and NLG for `domain`, in pipeline order.
///
/// Service ids are prefixed with the domain id so several domains can be
/// registered side by side. With `backchannel`, the NLG reads the
/// `predicted_bc` topic carried over from the previous turn.
pub fn domain_pipeline(domain: &Domain, backchannel: bool) -> Vec<Box<dyn Service>> {
    let nlg = TemplateNlg::new(domain);
    let nlg = if backchannel { nlg.with_backchannel() } else { nlg };
    vec![
        Box::new(KeywordNlu::new(domain)),
        Box::new(BeliefTracker::new(domain)),
        Box::new(LookupPolicy::new(domain)),
        Box::new(nlg),
    ]
}

/// Deserialize a subscribed topic.
pub(crate) fn read_topic<T: DeserializeOwned>(
    envelope: &Envelope,
    topic: &str,
) -> Result<T, ServiceError> {
    let value = envelope.get(topic).ok_or_else(|| ServiceError::InvalidInput {
        topic: Topic::new(topic),
        message: "missing".into(),
    })?;
    serde_json::from_value(value.clone()).map_err(|e| ServiceError::InvalidInput {
        topic: Topic::new(topic),
        message: e.to_string(),
    })
}

/// A subscribed topic that must hold text.
pub(crate) fn read_text<'a>(envelope: &'a Envelope, topic: &str) -> Result<&'a str, ServiceError> {
    envelope
        .get_str(topic)
        .ok_or_else(|| ServiceError::InvalidInput {
            topic: Topic::new(topic),
            message: "expected a string".into(),
        })
}

pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::Other(Box::new(e)))
}

pub(crate) fn scoped_id(domain: &Domain, stage: &str) -> String {
    format!("{}.{stage}", domain.id())
}
