//! In-memory implementations for testing.
//!
//! Available behind the `test-utils` feature flag. These are minimal
//! implementations that prove the trait APIs are usable.

mod fn_service;
mod recording_hook;
mod scripted_input;

pub use fn_service::{CallLog, FnService};
pub use recording_hook::RecordingHook;
pub use scripted_input::ScriptedInput;
