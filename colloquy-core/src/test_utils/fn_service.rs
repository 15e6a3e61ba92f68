//! FnService: a service whose turn handler is a closure.

use crate::envelope::{Envelope, Publications};
use crate::error::{ServiceError, ShutdownError};
use crate::service::{Service, ServiceDescriptor};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Shared call log. Entries look like `"nlu:turn"` or `"nlu:shutdown"`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

type Handler = Box<dyn FnMut(&Envelope) -> Result<Publications, ServiceError> + Send + Sync>;

/// A service built from a descriptor and a closure.
/// Records every lifecycle call into an optional shared [`CallLog`].
pub struct FnService {
    descriptor: ServiceDescriptor,
    handler: Handler,
    log: Option<CallLog>,
    fail_init: bool,
    fail_shutdown: bool,
}

impl FnService {
    /// Create a service that runs `handler` on every turn.
    pub fn new(
        descriptor: ServiceDescriptor,
        handler: impl FnMut(&Envelope) -> Result<Publications, ServiceError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            descriptor,
            handler: Box::new(handler),
            log: None,
            fail_init: false,
            fail_shutdown: false,
        }
    }

    /// A service that publishes its own name on every declared topic.
    pub fn echo(descriptor: ServiceDescriptor) -> Self {
        let name = descriptor.id.to_string();
        let topics: Vec<_> = descriptor.publishes.iter().cloned().collect();
        Self::new(descriptor, move |_| {
            let mut out = Publications::none();
            for topic in &topics {
                out.push(topic.clone(), name.clone());
            }
            Ok(out)
        })
    }

    /// Record lifecycle calls into `log`.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Make `on_init` fail.
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Make `on_shutdown` fail.
    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    fn record(&self, call: &str) {
        if let Some(log) = &self.log {
            log.lock()
                .unwrap()
                .push(format!("{}:{call}", self.descriptor.id));
        }
    }
}

#[async_trait]
impl Service for FnService {
    fn describe(&self) -> ServiceDescriptor {
        self.descriptor.clone()
    }

    async fn on_init(&mut self) -> Result<(), ServiceError> {
        self.record("init");
        if self.fail_init {
            return Err(ServiceError::Failed("init always fails".into()));
        }
        Ok(())
    }

    async fn on_dialog_start(&mut self) -> Result<(), ServiceError> {
        self.record("dialog_start");
        Ok(())
    }

    async fn on_turn(&mut self, envelope: &Envelope) -> Result<Publications, ServiceError> {
        self.record("turn");
        (self.handler)(envelope)
    }

    async fn on_dialog_end(&mut self) -> Result<(), ServiceError> {
        self.record("dialog_end");
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<(), ShutdownError> {
        self.record("shutdown");
        if self.fail_shutdown {
            return Err(ShutdownError::Failed("shutdown always fails".into()));
        }
        Ok(())
    }
}
