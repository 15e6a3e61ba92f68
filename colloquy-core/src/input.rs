//! The Input protocol: where the next turn's seed value comes from.

use crate::envelope::Envelope;
use crate::error::InputError;
use async_trait::async_trait;

/// Protocol: Input
///
/// Collects the external input for the next turn. This is the only place
/// the session blocks on the outside world, and it happens before the seed
/// envelope is built, never inside a propagation pass.
///
/// Implementations:
/// - ConsoleInput: one line from stdin
/// - ChannelInput: most recent value handed over from an I/O thread
/// - ScriptedInput: a fixed list (tests)
#[async_trait]
pub trait InputSource: Send {
    /// Wait for the next input. `last_output` is the previous turn's final
    /// envelope. Returning `Ok(None)` ends the session.
    async fn next_input(
        &mut self,
        last_output: Option<&Envelope>,
    ) -> Result<Option<serde_json::Value>, InputError>;
}
