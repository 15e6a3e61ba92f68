use async_trait::async_trait;
use colloquy_core::{Domain, Envelope, Publications, Service, ServiceDescriptor, ServiceError, ServiceId};
use regex::Regex;

use crate::acts::{UserAct, UserIntent};
use crate::matching::{humanize, matches, phrase_matcher};
use crate::topics::{USER_ACTS, USER_UTTERANCE};
use crate::{read_text, scoped_id, to_value};

struct SlotValue {
    slot: String,
    value: String,
    matcher: Option<Regex>,
}

struct Vocabulary {
    hello: Option<Regex>,
    bye: Option<Regex>,
    thanks: Option<Regex>,
    /// Longest values first, so "Thang Vu" wins over "Vu".
    values: Vec<SlotValue>,
    requests: Vec<(String, Option<Regex>)>,
}

/// Keyword-spotting NLU bound to one lookup domain.
///
/// The vocabulary is the domain's own data: every distinct value of the
/// primary key and the informable slots becomes an `inform`, every
/// requestable slot name becomes a `request`.
pub struct KeywordNlu {
    id: ServiceId,
    domain: Domain,
    vocabulary: Option<Vocabulary>,
}

impl KeywordNlu {
    /// NLU for `domain`, named `<domain>.nlu`.
    pub fn new(domain: &Domain) -> Self {
        Self {
            id: ServiceId::new(scoped_id(domain, "nlu")),
            domain: domain.clone(),
            vocabulary: None,
        }
    }

    fn parse(vocab: &Vocabulary, text: &str) -> Vec<UserAct> {
        if text.is_empty() {
            return vec![UserAct::new(UserIntent::Hello)];
        }
        let mut acts = Vec::new();
        for (matcher, intent) in [
            (&vocab.hello, UserIntent::Hello),
            (&vocab.bye, UserIntent::Bye),
            (&vocab.thanks, UserIntent::Thanks),
        ] {
            if matches(matcher, text) {
                acts.push(UserAct::new(intent));
            }
        }
        let mut informed: Vec<&str> = Vec::new();
        for entry in &vocab.values {
            if !informed.contains(&entry.slot.as_str()) && matches(&entry.matcher, text) {
                informed.push(&entry.slot);
                acts.push(UserAct::inform(&entry.slot, &entry.value));
            }
        }
        for (slot, matcher) in &vocab.requests {
            if matches(matcher, text) {
                acts.push(UserAct::request(slot));
            }
        }
        if acts.is_empty() {
            acts.push(UserAct::new(UserIntent::Bad));
        }
        acts
    }
}

#[async_trait]
impl Service for KeywordNlu {
    fn describe(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(self.id.clone())
            .subscribes([USER_UTTERANCE])
            .publishes([USER_ACTS])
            .domain(self.domain.id().clone())
    }

    async fn on_init(&mut self) -> Result<(), ServiceError> {
        let lookup = self.domain.lookup().ok_or_else(|| {
            ServiceError::Failed(format!("domain {} has no lookup backend", self.domain.id()))
        })?;
        let compile = |e: regex::Error| ServiceError::Other(Box::new(e));

        let mut slots = vec![lookup.primary_key().to_string()];
        slots.extend(lookup.informable_slots());
        let mut values = Vec::new();
        for slot in slots {
            for value in lookup.distinct_values(&slot).await? {
                values.push(SlotValue {
                    matcher: phrase_matcher([&value]).map_err(compile)?,
                    slot: slot.clone(),
                    value,
                });
            }
        }
        values.sort_by(|a, b| b.value.len().cmp(&a.value.len()));

        let mut requests = Vec::new();
        for slot in lookup.requestable_slots() {
            requests.push((slot.clone(), phrase_matcher([humanize(&slot)]).map_err(compile)?));
        }

        tracing::debug!(
            service = %self.id,
            values = values.len(),
            requests = requests.len(),
            "colloquy.nlu.vocabulary"
        );
        self.vocabulary = Some(Vocabulary {
            hello: phrase_matcher(["hi", "hello", "hey", "good morning"]).map_err(compile)?,
            bye: phrase_matcher(["bye", "goodbye", "good bye", "exit", "quit"]).map_err(compile)?,
            thanks: phrase_matcher(["thanks", "thank you", "cheers"]).map_err(compile)?,
            values,
            requests,
        });
        Ok(())
    }

    async fn on_turn(&mut self, envelope: &Envelope) -> Result<Publications, ServiceError> {
        let vocab = self
            .vocabulary
            .as_ref()
            .ok_or_else(|| ServiceError::Failed(format!("{} used before on_init", self.id)))?;
        let text = read_text(envelope, USER_UTTERANCE)?.trim();
        let acts = Self::parse(vocab, text);
        Ok(Publications::none().with(USER_ACTS, to_value(&acts)?))
    }
}
