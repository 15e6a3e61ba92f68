//! ScriptedInput: replays a fixed list of inputs.

use crate::envelope::Envelope;
use crate::error::InputError;
use crate::input::InputSource;
use async_trait::async_trait;
use std::collections::VecDeque;

/// An input source that yields the given values in order, then ends the
/// session by returning `None`.
pub struct ScriptedInput {
    remaining: VecDeque<serde_json::Value>,
    outputs_seen: usize,
}

impl ScriptedInput {
    /// Create a scripted input from anything convertible to JSON.
    pub fn new<I, V>(inputs: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        Self {
            remaining: inputs.into_iter().map(Into::into).collect(),
            outputs_seen: 0,
        }
    }

    /// How many times a previous turn's output was handed in.
    pub fn outputs_seen(&self) -> usize {
        self.outputs_seen
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn next_input(
        &mut self,
        last_output: Option<&Envelope>,
    ) -> Result<Option<serde_json::Value>, InputError> {
        if last_output.is_some() {
            self.outputs_seen += 1;
        }
        Ok(self.remaining.pop_front())
    }
}
