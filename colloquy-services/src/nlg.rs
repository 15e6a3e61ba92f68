use async_trait::async_trait;
use colloquy_core::{Domain, Envelope, Publications, Service, ServiceDescriptor, ServiceError, ServiceId};

use crate::acts::{SysAct, SysIntent};
use crate::backchannel::NO_BACKCHANNEL;
use crate::matching::humanize;
use crate::topics::{PREDICTED_BC, SYS_ACT, SYS_UTTERANCE};
use crate::{read_topic, scoped_id};

/// Template-based generation.
///
/// With [`with_backchannel`](Self::with_backchannel) the service also
/// reads `predicted_bc` as feedback and opens its reply with the
/// predicted backchannel ("Okay. ..."). Feedback never gates the NLG: it
/// sees this turn's prediction if the predictor already fired, otherwise
/// the value carried over from the previous turn, otherwise nothing.
pub struct TemplateNlg {
    id: ServiceId,
    domain: Domain,
    backchannel: bool,
}

impl TemplateNlg {
    /// NLG for `domain`, named `<domain>.nlg`.
    pub fn new(domain: &Domain) -> Self {
        Self {
            id: ServiceId::new(scoped_id(domain, "nlg")),
            domain: domain.clone(),
            backchannel: false,
        }
    }

    /// Prefix replies with the latest predicted backchannel.
    pub fn with_backchannel(mut self) -> Self {
        self.backchannel = true;
        self
    }

    /// Verbalise one system act.
    pub fn render(&self, act: &SysAct) -> String {
        let name = self.domain.display_name();
        match act.intent {
            SysIntent::Welcome => {
                format!("Welcome to the {name} chat bot. How may I help you?")
            }
            SysIntent::Bye => "Thank you, goodbye.".to_string(),
            SysIntent::ReqMore => "Is there anything else I can do for you?".to_string(),
            SysIntent::Bad => "Sorry, I am afraid I did not understand you.".to_string(),
            SysIntent::NoMatch => {
                let constraints = act
                    .values
                    .iter()
                    .map(|(slot, value)| format!("{} {value}", humanize(slot)))
                    .collect::<Vec<_>>()
                    .join(" and ");
                format!("I'm sorry, I could not find any entry in {name} with {constraints}.")
            }
            SysIntent::Request => match &act.slot {
                Some(slot) => format!("Which {} are you looking for?", humanize(slot)),
                None => "Could you tell me more about what you are looking for?".to_string(),
            },
            SysIntent::InformByName => {
                let key = act.slot.as_deref().unwrap_or("name");
                let Some(entity) = act.values.get(key) else {
                    return "I found something, but it has no name.".to_string();
                };
                let details: Vec<String> = act
                    .values
                    .iter()
                    .filter(|(slot, _)| slot.as_str() != key)
                    .map(|(slot, value)| format!("The {} of {entity} is {value}.", humanize(slot)))
                    .collect();
                if details.is_empty() {
                    format!("I found {entity}.")
                } else {
                    details.join(" ")
                }
            }
        }
    }
}

#[async_trait]
impl Service for TemplateNlg {
    fn describe(&self) -> ServiceDescriptor {
        let desc = ServiceDescriptor::new(self.id.clone())
            .subscribes([SYS_ACT])
            .publishes([SYS_UTTERANCE])
            .domain(self.domain.id().clone());
        if self.backchannel {
            desc.feedback([PREDICTED_BC])
        } else {
            desc
        }
    }

    async fn on_turn(&mut self, envelope: &Envelope) -> Result<Publications, ServiceError> {
        let act: SysAct = read_topic(envelope, SYS_ACT)?;
        let mut text = self.render(&act);
        if self.backchannel {
            if let Some(bc) = envelope.get_str(PREDICTED_BC) {
                if !bc.is_empty() && bc != NO_BACKCHANNEL {
                    text = format!("{}. {text}", capitalize(bc));
                }
            }
        }
        Ok(Publications::none().with(SYS_UTTERANCE, text))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::Origin;
    use serde_json::json;

    fn nlg() -> TemplateNlg {
        TemplateNlg::new(&Domain::new("lecturers", "Lecturers"))
    }

    #[test]
    fn inform_by_name_lists_every_other_slot() {
        let act = SysAct::new(SysIntent::InformByName)
            .with_slot("name")
            .with_value("name", "Ada Lovelace")
            .with_value("office_hours", "Mon 10-12")
            .with_value("email", "ada@example.org");
        assert_eq!(
            nlg().render(&act),
            "The email of Ada Lovelace is ada@example.org. The office hours of Ada Lovelace is Mon 10-12."
        );
    }

    #[test]
    fn request_names_the_slot() {
        let act = SysAct::new(SysIntent::Request).with_slot("department");
        assert_eq!(nlg().render(&act), "Which department are you looking for?");
    }

    #[tokio::test]
    async fn carried_backchannel_prefixes_the_reply() {
        let mut nlg = nlg().with_backchannel();
        assert!(nlg.describe().feedback.contains(PREDICTED_BC));

        let mut envelope = Envelope::seeded(SYS_ACT, json!({"intent": "req_more"}));
        envelope.insert(PREDICTED_BC.into(), json!("okay"), Origin::Carried);
        let out = nlg.on_turn(&envelope).await.unwrap();
        let (_, text) = out.iter().next().unwrap();
        assert_eq!(text, &json!("Okay. Is there anything else I can do for you?"));

        envelope.insert(PREDICTED_BC.into(), json!(NO_BACKCHANNEL), Origin::Carried);
        let out = nlg.on_turn(&envelope).await.unwrap();
        let (_, text) = out.iter().next().unwrap();
        assert_eq!(text, &json!("Is there anything else I can do for you?"));
    }
}
