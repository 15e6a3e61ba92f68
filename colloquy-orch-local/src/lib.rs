#![deny(missing_docs)]
//! In-process orchestration for colloquy.
//!
//! A [`SessionBuilder`] collects domains and services, builds the pipeline
//! graphs and checks them once, then initializes every service. The
//! resulting [`Session`] drives turns one at a time: each turn is a single
//! propagation pass of the [`TurnScheduler`] over the graph the
//! [`DomainRouter`] selects, in dependency order. Shutdown releases every
//! service exactly once, in reverse registration order, and is always
//! attempted after [`Session::run`].
//!
//! Everything runs on the calling task. The only suspension point outside
//! a service's own handler is waiting for input between turns.

mod registry;
mod router;
mod scheduler;
mod session;
mod shutdown;
mod stop;

pub use registry::ServiceRegistry;
pub use router::{DomainRouter, Route};
pub use scheduler::{SchedulerConfig, TurnError, TurnScheduler};
pub use session::{
    Session, SessionBuilder, SessionConfig, SessionError, SessionOutcome, SessionState,
    Termination,
};
pub use shutdown::{ShutdownFailure, ShutdownReport};
pub use stop::StopHandle;
