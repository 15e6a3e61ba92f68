//! Error types for each protocol.

use crate::id::{DomainId, ServiceId, Topic};
use thiserror::Error;

/// Registration errors. Fatal to start-up.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A service with the same identity is already registered.
    #[error("duplicate service: {0}")]
    DuplicateService(ServiceId),

    /// A domain with the same identity is already registered.
    #[error("duplicate domain: {0}")]
    DuplicateDomain(DomainId),

    /// The descriptor publishes and subscribes to the same topic.
    #[error("service {service} both publishes and subscribes to {}", join(.topics))]
    OverlappingTopics {
        /// The offending service.
        service: ServiceId,
        /// Topics present in both sets.
        topics: Vec<Topic>,
    },
}

/// Errors a service returns from a lifecycle or turn hook.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service failed to compute its output.
    #[error("service failed: {0}")]
    Failed(String),

    /// A subscribed topic held a value the service cannot interpret.
    #[error("invalid value on topic {topic}: {message}")]
    InvalidInput {
        /// The topic that held the bad value.
        topic: Topic,
        /// What was wrong with it.
        message: String,
    },

    /// The service panicked. The panic payload is captured as text.
    #[error("service panicked: {0}")]
    Panicked(String),

    /// A lookup backend error propagated through the service.
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Shutdown errors. Isolated per service and aggregated by the driver;
/// one failing service never blocks release of the others.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Releasing a resource failed.
    #[error("shutdown failed: {0}")]
    Failed(String),

    /// The shutdown hook panicked.
    #[error("shutdown panicked: {0}")]
    Panicked(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain lookup errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LookupError {
    /// The queried slot is not part of the domain.
    #[error("unknown slot: {0}")]
    UnknownSlot(String),

    /// The backing data could not be loaded.
    #[error("load failed: {0}")]
    LoadFailed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Input source errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InputError {
    /// Reading from the device failed.
    #[error("input read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The input channel was closed by the producer.
    #[error("input closed")]
    Closed,
}

/// Hook errors. These are logged but do NOT halt the session
/// (use `HookAction::Stop` to end it).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook execution failed.
    #[error("hook failed: {0}")]
    Failed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

fn join(topics: &[Topic]) -> String {
    topics
        .iter()
        .map(Topic::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
