use async_trait::async_trait;
use colloquy_core::{
    Domain, Envelope, LookupBackend, LookupQuery, Publications, Record, Service, ServiceDescriptor,
    ServiceError, ServiceId,
};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::acts::{BeliefState, SysAct, SysIntent, UserIntent};
use crate::topics::{BELIEFSTATE, SYS_ACT};
use crate::{read_topic, scoped_id, to_value};

/// Handcrafted policy answering from the domain's lookup backend.
///
/// - closing, not-understood and thank-you turns get their fixed act;
/// - with no constraints yet, the user is greeted or asked for the first
///   informable slot;
/// - otherwise the constraints are looked up. No result is a `NoMatch`;
///   several results without a request are narrowed down by asking for
///   an informable slot that still tells them apart; anything else
///   presents the first matching record.
pub struct LookupPolicy {
    id: ServiceId,
    domain: Domain,
    lookup: Option<Arc<dyn LookupBackend>>,
}

impl LookupPolicy {
    /// Policy for `domain`, named `<domain>.policy`.
    pub fn new(domain: &Domain) -> Self {
        Self {
            id: ServiceId::new(scoped_id(domain, "policy")),
            domain: domain.clone(),
            lookup: None,
        }
    }

    async fn decide(
        lookup: &dyn LookupBackend,
        belief: &BeliefState,
    ) -> Result<SysAct, ServiceError> {
        let intents = &belief.intents;
        if intents.contains(&UserIntent::Bye) {
            return Ok(SysAct::new(SysIntent::Bye));
        }
        if belief.informs.is_empty() && belief.requests.is_empty() {
            return Ok(if intents.contains(&UserIntent::Bad) {
                SysAct::new(SysIntent::Bad)
            } else if intents.contains(&UserIntent::Thanks) {
                SysAct::new(SysIntent::ReqMore)
            } else if intents.contains(&UserIntent::Hello) {
                SysAct::new(SysIntent::Welcome)
            } else {
                match lookup.informable_slots().into_iter().next() {
                    Some(slot) => SysAct::new(SysIntent::Request).with_slot(slot),
                    None => SysAct::new(SysIntent::ReqMore),
                }
            });
        }

        let query = belief
            .informs
            .iter()
            .fold(LookupQuery::new(), |q, (slot, value)| q.with(slot, value));
        let records = lookup.find(&query).await?;
        let Some(first) = records.first() else {
            let mut act = SysAct::new(SysIntent::NoMatch);
            act.values = belief.informs.clone();
            return Ok(act);
        };

        if belief.requests.is_empty() && records.len() > 1 {
            if let Some(slot) = distinguishing_slot(lookup, belief, &records) {
                return Ok(SysAct::new(SysIntent::Request).with_slot(slot));
            }
        }
        Ok(inform_by_name(lookup.primary_key(), first, belief))
    }
}

/// An informable slot the user has not constrained whose values differ
/// among `records`.
fn distinguishing_slot(
    lookup: &dyn LookupBackend,
    belief: &BeliefState,
    records: &[Record],
) -> Option<String> {
    lookup.informable_slots().into_iter().find(|slot| {
        if belief.informs.contains_key(slot) {
            return false;
        }
        let distinct: BTreeSet<String> = records
            .iter()
            .filter_map(|r| r.get(slot))
            .map(|v| v.to_string())
            .collect();
        distinct.len() > 1
    })
}

fn inform_by_name(primary_key: &str, record: &Record, belief: &BeliefState) -> SysAct {
    let mut act = SysAct::new(SysIntent::InformByName).with_slot(primary_key);
    let shown = std::iter::once(primary_key.to_string())
        .chain(belief.requests.iter().cloned())
        .chain(belief.informs.keys().cloned());
    for slot in shown {
        let text = match record.get(&slot) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            Some(serde_json::Value::Null) | None => "not available".to_string(),
            Some(other) => other.to_string(),
        };
        act.values.entry(slot).or_insert(text);
    }
    act
}

#[async_trait]
impl Service for LookupPolicy {
    fn describe(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(self.id.clone())
            .subscribes([BELIEFSTATE])
            .publishes([SYS_ACT])
            .domain(self.domain.id().clone())
    }

    async fn on_init(&mut self) -> Result<(), ServiceError> {
        let lookup = self.domain.lookup().cloned().ok_or_else(|| {
            ServiceError::Failed(format!("domain {} has no lookup backend", self.domain.id()))
        })?;
        self.lookup = Some(lookup);
        Ok(())
    }

    async fn on_turn(&mut self, envelope: &Envelope) -> Result<Publications, ServiceError> {
        let lookup = self
            .lookup
            .as_deref()
            .ok_or_else(|| ServiceError::Failed(format!("{} used before on_init", self.id)))?;
        let belief: BeliefState = read_topic(envelope, BELIEFSTATE)?;
        let act = Self::decide(lookup, &belief).await?;
        tracing::debug!(service = %self.id, intent = ?act.intent, "colloquy.policy.act");
        Ok(Publications::none().with(SYS_ACT, to_value(&act)?))
    }
}
