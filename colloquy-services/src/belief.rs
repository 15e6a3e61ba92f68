use async_trait::async_trait;
use colloquy_core::{Domain, Envelope, Publications, Service, ServiceDescriptor, ServiceError, ServiceId};

use crate::acts::{BeliefState, UserAct, UserIntent};
use crate::topics::{BELIEFSTATE, USER_ACTS};
use crate::{read_topic, scoped_id, to_value};

/// Rule-based belief tracker.
///
/// Informs accumulate over the dialog (a later value for the same slot
/// replaces the earlier one); requests and intents describe the current
/// turn only.
pub struct BeliefTracker {
    id: ServiceId,
    domain: Domain,
    state: BeliefState,
}

impl BeliefTracker {
    /// Tracker for `domain`, named `<domain>.bst`.
    pub fn new(domain: &Domain) -> Self {
        Self {
            id: ServiceId::new(scoped_id(domain, "bst")),
            domain: domain.clone(),
            state: BeliefState::default(),
        }
    }

    fn update(&mut self, acts: Vec<UserAct>) {
        self.state.requests.clear();
        self.state.intents.clear();
        for act in acts {
            self.state.intents.insert(act.intent);
            match (act.intent, act.slot, act.value) {
                (UserIntent::Inform, Some(slot), Some(value)) => {
                    self.state.informs.insert(slot, value);
                }
                (UserIntent::Request, Some(slot), _) => {
                    self.state.requests.insert(slot);
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl Service for BeliefTracker {
    fn describe(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(self.id.clone())
            .subscribes([USER_ACTS])
            .publishes([BELIEFSTATE])
            .domain(self.domain.id().clone())
    }

    async fn on_dialog_start(&mut self) -> Result<(), ServiceError> {
        self.state = BeliefState::default();
        Ok(())
    }

    async fn on_turn(&mut self, envelope: &Envelope) -> Result<Publications, ServiceError> {
        let acts: Vec<UserAct> = read_topic(envelope, USER_ACTS)?;
        self.update(acts);
        Ok(Publications::none().with(BELIEFSTATE, to_value(&self.state)?))
    }
}
