#![deny(missing_docs)]
//! # colloquy: umbrella crate
//!
//! A single import surface for composing dialog systems out of
//! independently written services. Re-exports the protocol and the
//! implementation crates behind feature flags, plus a `prelude` for the
//! happy path.

#[cfg(feature = "convlog")]
pub use colloquy_convlog;
#[cfg(feature = "core")]
pub use colloquy_core;
#[cfg(feature = "core")]
pub use colloquy_graph;
#[cfg(feature = "hci")]
pub use colloquy_hci;
#[cfg(feature = "hooks")]
pub use colloquy_hooks;
#[cfg(feature = "lookup-json")]
pub use colloquy_lookup_json;
#[cfg(feature = "orch-local")]
pub use colloquy_orch_local;
#[cfg(feature = "services")]
pub use colloquy_services;

/// Happy-path imports for composing colloquy systems.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use colloquy_core::{
        Domain, DomainId, Envelope, Hook, HookAction, HookContext, HookPoint, InputSource,
        LookupBackend, LookupQuery, Publications, Service, ServiceDescriptor, ServiceError,
        ServiceId, SessionId, SessionPhase, Topic, TurnDiagnostic, TurnReport,
    };

    #[cfg(feature = "core")]
    pub use colloquy_graph::{ConsistencyReport, Defect, GraphDescription, GraphScope};

    #[cfg(feature = "hooks")]
    pub use colloquy_hooks::{HookRegistry, TracingHook};

    #[cfg(feature = "orch-local")]
    pub use colloquy_orch_local::{
        Session, SessionBuilder, SessionConfig, SessionError, SessionOutcome, StopHandle,
        Termination,
    };

    #[cfg(feature = "lookup-json")]
    pub use colloquy_lookup_json::{DomainFile, JsonLookup};

    #[cfg(feature = "convlog")]
    pub use colloquy_convlog::ConversationLog;

    #[cfg(feature = "hci")]
    pub use colloquy_hci::{input_channel, ChannelInput, ConsoleInput, ConsoleOutput, InputHandle};

    #[cfg(feature = "services")]
    pub use colloquy_services::{domain_pipeline, BackchannelPredictor, DomainTracker};
}
