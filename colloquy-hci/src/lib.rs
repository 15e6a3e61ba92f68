#![deny(missing_docs)]
//! Human-computer interaction for colloquy.
//!
//! - [`ConsoleInput`] reads one line per turn from stdin (or any buffered
//!   reader). EOF ends the session.
//! - [`ConsoleOutput`] is a sink service printing the system's utterance.
//! - [`input_channel`] connects an I/O task running on its own (for
//!   instance a capture loop kept alive between turns) to the session:
//!   a single slot where the most recent value wins.

mod channel;
mod console;

pub use channel::{input_channel, spawn_line_reader, ChannelInput, InputHandle};
pub use console::{ConsoleInput, ConsoleOutput};
