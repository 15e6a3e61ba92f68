//! Dialog acts exchanged between the handcrafted stages.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What the user did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIntent {
    /// Greeting, or the empty opening turn.
    Hello,
    /// Closing.
    Bye,
    /// Thanks.
    Thanks,
    /// Gave a slot value.
    Inform,
    /// Asked for a slot.
    Request,
    /// Nothing understood.
    Bad,
}

/// One user act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAct {
    /// Intent.
    pub intent: UserIntent,
    /// Slot for inform/request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    /// Value for inform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl UserAct {
    /// An act without a slot.
    pub fn new(intent: UserIntent) -> Self {
        Self {
            intent,
            slot: None,
            value: None,
        }
    }

    /// `inform(slot=value)`
    pub fn inform(slot: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            intent: UserIntent::Inform,
            slot: Some(slot.into()),
            value: Some(value.into()),
        }
    }

    /// `request(slot)`
    pub fn request(slot: impl Into<String>) -> Self {
        Self {
            intent: UserIntent::Request,
            slot: Some(slot.into()),
            value: None,
        }
    }
}

/// The user's goal so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeliefState {
    /// Constraints, accumulated over the dialog.
    #[serde(default)]
    pub informs: BTreeMap<String, String>,
    /// Slots asked for this turn.
    #[serde(default)]
    pub requests: BTreeSet<String>,
    /// Intents seen this turn.
    #[serde(default)]
    pub intents: BTreeSet<UserIntent>,
}

/// What the system does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SysIntent {
    /// Opening greeting.
    Welcome,
    /// Closing.
    Bye,
    /// Offer further help.
    ReqMore,
    /// Did not understand.
    Bad,
    /// No record matches the constraints.
    NoMatch,
    /// Ask for a slot.
    Request,
    /// Present one record.
    InformByName,
}

/// The system act handed to generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysAct {
    /// Intent.
    pub intent: SysIntent,
    /// The requested slot (`Request`) or the naming slot (`InformByName`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    /// Slot values to verbalise.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
}

impl SysAct {
    /// An act with no slots.
    pub fn new(intent: SysIntent) -> Self {
        Self {
            intent,
            slot: None,
            values: BTreeMap::new(),
        }
    }

    /// Set the act's slot.
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    /// Add a slot value.
    pub fn with_value(mut self, slot: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(slot.into(), value.into());
        self
    }
}
