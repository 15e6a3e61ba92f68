use async_trait::async_trait;
use colloquy_core::{
    Domain, DomainId, Envelope, Publications, Service, ServiceDescriptor, ServiceError, ServiceId,
};
use regex::Regex;
use serde_json::Value;

use crate::matching::{matches, phrase_matcher};
use crate::read_text;
use crate::topics::{DIALOG_END, DOMAIN, GEN_USER_UTTERANCE, SYS_NOTICE, USER_UTTERANCE};

const BYE_WORDS: [&str; 5] = ["bye", "goodbye", "good bye", "exit", "quit"];

struct TrackedDomain {
    id: DomainId,
    display_name: String,
    keywords: Vec<String>,
    matcher: Option<Regex>,
}

/// Domain-agnostic stage that picks the domain an utterance belongs to.
///
/// Selection, first match wins: a domain whose keywords occur in the
/// utterance, the only registered domain, the domain of the previous
/// turn. When none applies it greets (empty utterance) or asks the user
/// to rephrase on `sys_notice` and forwards nothing, leaving the turn on
/// the shared fallback path. Otherwise `sys_notice` is `null`, which the
/// console sink skips. A closing utterance sets `dialog_end`.
pub struct DomainTracker {
    id: ServiceId,
    domains: Vec<TrackedDomain>,
    bye: Option<Regex>,
    current: Option<DomainId>,
}

impl DomainTracker {
    /// A tracker that knows no domains yet.
    pub fn new(id: impl Into<ServiceId>) -> Self {
        Self {
            id: id.into(),
            domains: Vec::new(),
            bye: None,
            current: None,
        }
    }

    /// Recognise `domain` by any of `keywords`.
    pub fn with_domain<I, S>(mut self, domain: &Domain, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains.push(TrackedDomain {
            id: domain.id().clone(),
            display_name: domain.display_name().to_string(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            matcher: None,
        });
        self
    }

    fn select(&self, text: &str) -> Option<DomainId> {
        if let Some(found) = self.domains.iter().find(|d| matches(&d.matcher, text)) {
            return Some(found.id.clone());
        }
        if let [only] = self.domains.as_slice() {
            return Some(only.id.clone());
        }
        self.current.clone()
    }

    fn offer(&self) -> String {
        self.domains
            .iter()
            .map(|d| d.display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait]
impl Service for DomainTracker {
    fn describe(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(self.id.clone())
            .subscribes([GEN_USER_UTTERANCE])
            .publishes([USER_UTTERANCE, DOMAIN, SYS_NOTICE, DIALOG_END])
    }

    async fn on_init(&mut self) -> Result<(), ServiceError> {
        let compile = |e: regex::Error| ServiceError::Other(Box::new(e));
        self.bye = phrase_matcher(BYE_WORDS).map_err(compile)?;
        for domain in &mut self.domains {
            domain.matcher = phrase_matcher(&domain.keywords).map_err(compile)?;
        }
        Ok(())
    }

    async fn on_dialog_start(&mut self) -> Result<(), ServiceError> {
        self.current = None;
        Ok(())
    }

    async fn on_turn(&mut self, envelope: &Envelope) -> Result<Publications, ServiceError> {
        let text = read_text(envelope, GEN_USER_UTTERANCE)?.trim();
        let closing = matches(&self.bye, text);
        let mut out = Publications::none();
        if closing {
            out.push(DIALOG_END, true);
        }

        if self.domains.is_empty() {
            out.push(USER_UTTERANCE, text);
            out.push(SYS_NOTICE, Value::Null);
            return Ok(out);
        }

        match self.select(text) {
            Some(domain) => {
                tracing::debug!(service = %self.id, domain = %domain, "colloquy.tracker.selected");
                out.push(USER_UTTERANCE, text);
                out.push(DOMAIN, domain.as_str());
                // Silent notice keeps the notice sink's input satisfied.
                out.push(SYS_NOTICE, Value::Null);
                self.current = Some(domain);
            }
            None if closing => out.push(SYS_NOTICE, "Thank you, goodbye."),
            None if text.is_empty() => out.push(
                SYS_NOTICE,
                format!(
                    "Hello, please let me know how I can help you. I can discuss the following domains: {}.",
                    self.offer()
                ),
            ),
            None => out.push(
                SYS_NOTICE,
                format!(
                    "Sorry, I am not sure which topic you mean. I can discuss the following domains: {}.",
                    self.offer()
                ),
            ),
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value<'a>(out: &'a Publications, topic: &str) -> Option<&'a serde_json::Value> {
        out.iter().find(|(t, _)| t.as_str() == topic).map(|(_, v)| v)
    }

    /// `(id, display name, space-separated keywords)`
    async fn tracker(domains: &[(&str, &str, &str)]) -> DomainTracker {
        let mut t = DomainTracker::new("tracker");
        for (id, name, keywords) in domains {
            t = t.with_domain(&Domain::new(*id, *name), keywords.split_whitespace());
        }
        t.on_init().await.unwrap();
        t
    }

    #[tokio::test]
    async fn single_domain_is_always_selected() {
        let mut t = tracker(&[("lecturers", "Lecturers", "lecturer")]).await;
        let out = t.on_turn(&Envelope::seeded(GEN_USER_UTTERANCE, "")).await.unwrap();
        assert_eq!(value(&out, DOMAIN), Some(&json!("lecturers")));
        assert_eq!(value(&out, USER_UTTERANCE), Some(&json!("")));
        assert_eq!(value(&out, SYS_NOTICE), Some(&Value::Null));
    }

    #[tokio::test]
    async fn keywords_pick_among_several_domains_and_stick() {
        let mut t = tracker(&[
            ("lecturers", "Lecturers", "lecturer professor"),
            ("weather", "Weather", "weather rain"),
        ])
        .await;

        let out = t.on_turn(&Envelope::seeded(GEN_USER_UTTERANCE, "")).await.unwrap();
        assert!(value(&out, DOMAIN).is_none());
        let greeting = value(&out, SYS_NOTICE).unwrap().as_str().unwrap();
        assert!(greeting.contains("Lecturers, Weather"));

        let out = t
            .on_turn(&Envelope::seeded(GEN_USER_UTTERANCE, "will it rain tomorrow?"))
            .await
            .unwrap();
        assert_eq!(value(&out, DOMAIN), Some(&json!("weather")));

        let out = t
            .on_turn(&Envelope::seeded(GEN_USER_UTTERANCE, "and in Berlin?"))
            .await
            .unwrap();
        assert_eq!(value(&out, DOMAIN), Some(&json!("weather")));

        t.on_dialog_start().await.unwrap();
        let out = t
            .on_turn(&Envelope::seeded(GEN_USER_UTTERANCE, "and in Berlin?"))
            .await
            .unwrap();
        assert!(value(&out, DOMAIN).is_none());
        assert!(value(&out, SYS_NOTICE).is_some_and(Value::is_string));
    }

    #[tokio::test]
    async fn closing_utterance_ends_the_dialog() {
        let mut t = tracker(&[("lecturers", "Lecturers", "lecturer")]).await;
        let out = t.on_turn(&Envelope::seeded(GEN_USER_UTTERANCE, "ok bye")).await.unwrap();
        assert_eq!(value(&out, DIALOG_END), Some(&json!(true)));
        assert_eq!(value(&out, DOMAIN), Some(&json!("lecturers")));
    }

    #[tokio::test]
    async fn non_text_input_is_rejected() {
        let mut t = tracker(&[]).await;
        let err = t
            .on_turn(&Envelope::seeded(GEN_USER_UTTERANCE, 42))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput { .. }));
    }
}
