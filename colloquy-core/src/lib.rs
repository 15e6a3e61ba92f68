//! # colloquy-core: protocol types for composable dialog pipelines
//!
//! This crate defines the vocabulary every other colloquy crate speaks:
//! what a service is, what it exchanges, and what can go wrong.
//!
//! ## The Protocols
//!
//! | Protocol | Trait | What it does |
//! |----------|-------|-------------|
//! | Service | [`Service`] | One pluggable processing stage per turn |
//! | Lookup | [`LookupBackend`] | Read-only domain knowledge |
//! | Input | [`InputSource`] | Blocking external input, collected between turns |
//!
//! ## The Interfaces
//!
//! | Interface | Types | What it does |
//! |-----------|-------|-------------|
//! | Hooks | [`Hook`], [`HookPoint`], [`HookAction`] | Observation of the session loop |
//! | Lifecycle | [`SessionPhase`] | Where the session driver currently is |
//!
//! ## Design Principle
//!
//! Services never reference each other. A service declares the topics it
//! publishes and subscribes to in its [`ServiceDescriptor`]; the
//! orchestrator derives the data flow from those declarations and validates
//! it once, before the first turn. Values travel inside an [`Envelope`]
//! that lives for exactly one turn.
//!
//! ## Dependency Notes
//!
//! Topic values are `serde_json::Value`. Services written by different
//! people need a common currency for their outputs, and JSON is the one
//! every stage (and every conversation log) already understands.

#![deny(missing_docs)]

pub mod domain;
pub mod envelope;
pub mod error;
pub mod hook;
pub mod id;
pub mod input;
pub mod lifecycle;
pub mod service;
pub mod turn;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience
pub use domain::{Domain, LookupBackend, LookupQuery, Record};
pub use envelope::{Envelope, Origin, Publications};
pub use error::{HookError, InputError, LookupError, RegistryError, ServiceError, ShutdownError};
pub use hook::{Hook, HookAction, HookContext, HookPoint};
pub use id::{DomainId, ServiceId, SessionId, Topic};
pub use input::InputSource;
pub use lifecycle::SessionPhase;
pub use service::{Service, ServiceDescriptor};
pub use turn::{TurnDiagnostic, TurnReport};
