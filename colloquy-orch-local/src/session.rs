//! The session driver: start-up, the turn loop, shutdown.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use colloquy_core::{
    Domain, DomainId, Envelope, Hook, HookContext, HookPoint, InputError, InputSource, Origin,
    RegistryError, Service, ServiceDescriptor, ServiceError, ServiceId, SessionId, SessionPhase,
    Topic, TurnReport,
};
use colloquy_graph::{ConsistencyReport, GraphBuilder, GraphDescription, PipelineGraphs};
use colloquy_hooks::HookRegistry;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::registry::ServiceRegistry;
use crate::router::DomainRouter;
use crate::scheduler::{observe, SchedulerConfig, TurnError, TurnScheduler};
use crate::shutdown::{panic_message, shutdown_services, ShutdownReport};
use crate::stop::StopHandle;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session identity. Generated when `None`.
    pub session_id: Option<SessionId>,
    /// Topic the external input is written to at the start of each turn.
    pub seed_topic: Topic,
    /// Value of the seed topic on the first turn.
    pub start_seed: Value,
    /// Topic signalling the end of the conversation.
    pub end_topic: Topic,
    /// Safety bound on the number of turns.
    pub max_turns: u64,
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: None,
            seed_topic: Topic::new("gen_user_utterance"),
            start_seed: Value::String(String::new()),
            end_topic: Topic::new("dialog_end"),
            max_turns: 1024,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Set the seed topic.
    pub fn with_seed_topic(mut self, topic: impl Into<Topic>) -> Self {
        self.seed_topic = topic.into();
        self
    }

    /// Set the first turn's seed value.
    pub fn with_start_seed(mut self, seed: impl Into<Value>) -> Self {
        self.start_seed = seed.into();
        self
    }

    /// Set the end-of-conversation topic.
    pub fn with_end_topic(mut self, topic: impl Into<Topic>) -> Self {
        self.end_topic = topic.into();
        self
    }

    /// Set the domain classification topic.
    pub fn with_domain_topic(mut self, topic: impl Into<Topic>) -> Self {
        self.scheduler.domain_topic = topic.into();
        self
    }

    /// Set the safety bound on the number of turns.
    pub fn with_max_turns(mut self, max_turns: u64) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Use a fixed session id.
    pub fn with_session_id(mut self, id: impl Into<SessionId>) -> Self {
        self.session_id = Some(id.into());
        self
    }
}

/// Why a session stopped running turns.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// A service published the end-of-conversation topic.
    EndOfDialog,
    /// A stop was requested through the stop handle or by a hook.
    Stopped {
        /// Reason given with the request.
        reason: String,
    },
    /// The input source has nothing more to give.
    InputExhausted,
    /// `max_turns` was reached.
    MaxTurns,
}

/// Cross-turn state, owned by the session driver.
///
/// The domain router and the session driver write it; the scheduler reads
/// it. It is discarded at shutdown.
#[derive(Debug, Clone)]
pub struct SessionState {
    id: SessionId,
    phase: SessionPhase,
    domain: Option<DomainId>,
    turn: u64,
    carried: BTreeMap<Topic, Value>,
    last_output: Option<Envelope>,
    termination: Option<Termination>,
}

impl SessionState {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            phase: SessionPhase::Initializing,
            domain: None,
            turn: 0,
            carried: BTreeMap::new(),
            last_output: None,
            termination: None,
        }
    }

    /// Session identity.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Active domain, `None` until resolved.
    pub fn domain(&self) -> Option<&DomainId> {
        self.domain.as_ref()
    }

    /// Number of the current (or last completed) turn. 0 before the first.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Feedback values carried into the next turn's seed.
    pub fn carried(&self) -> &BTreeMap<Topic, Value> {
        &self.carried
    }

    /// Final envelope of the previous turn.
    pub fn last_output(&self) -> Option<&Envelope> {
        self.last_output.as_ref()
    }

    /// Why the session will not run another turn, if decided.
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub(crate) fn set_domain(&mut self, domain: Option<DomainId>) {
        self.domain = domain;
    }

    /// Record a termination reason. The first one wins.
    pub(crate) fn terminate(&mut self, reason: Termination) {
        if self.termination.is_none() {
            self.termination = Some(reason);
        }
    }
}

/// Session-level failures.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// Registration was rejected.
    #[error("registration failed: {0}")]
    Registry(#[from] RegistryError),

    /// A service failed to initialize. Services initialized before it were
    /// shut down again.
    #[error("service {service} failed to initialize: {source}")]
    Startup {
        /// The failing service.
        service: ServiceId,
        /// Its error.
        source: ServiceError,
        /// Result of releasing the services already initialized.
        shutdown: ShutdownReport,
    },

    /// A turn was aborted by a failing service.
    #[error("turn {turn} failed: {source}")]
    Turn {
        /// The aborted turn.
        turn: u64,
        /// What failed.
        source: TurnError,
    },

    /// The input source failed.
    #[error("input failed: {0}")]
    Input(#[from] InputError),

    /// The session has been shut down.
    #[error("session terminated")]
    Terminated,
}

/// Result of [`Session::run`]: how the loop ended, and how shutdown went.
/// Shutdown is attempted whatever the loop result.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Completed turns.
    pub turns: u64,
    /// Why the loop ended, or what aborted it.
    pub result: Result<Termination, SessionError>,
    /// Aggregate shutdown result.
    pub shutdown: ShutdownReport,
}

impl SessionOutcome {
    /// Whether the loop ended normally and every service shut down cleanly.
    pub fn is_clean(&self) -> bool {
        self.result.is_ok() && self.shutdown.is_clean()
    }
}

/// Collects domains, services and hooks, then starts a [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
    registry: ServiceRegistry,
    router: DomainRouter,
    hooks: HookRegistry,
}

impl SessionBuilder {
    /// Create a builder.
    pub fn new(config: SessionConfig) -> Self {
        let router = DomainRouter::new(config.scheduler.domain_topic.clone());
        Self {
            config,
            registry: ServiceRegistry::new(),
            router,
            hooks: HookRegistry::new(),
        }
    }

    /// Register a domain.
    pub fn add_domain(&mut self, domain: Domain) -> Result<&mut Self, RegistryError> {
        self.router.add_domain(domain)?;
        Ok(self)
    }

    /// Register a service. Fails on a duplicate id or a descriptor that
    /// publishes and subscribes to the same topic; the registry is
    /// unchanged on failure.
    pub fn register(&mut self, service: impl Service + 'static) -> Result<ServiceId, RegistryError> {
        self.registry.register(Box::new(service))
    }

    /// Register an already boxed service.
    pub fn register_boxed(&mut self, service: Box<dyn Service>) -> Result<ServiceId, RegistryError> {
        self.registry.register(service)
    }

    /// Attach a hook.
    pub fn add_hook(&mut self, hook: Arc<dyn Hook>) -> &mut Self {
        self.hooks.add(hook);
        self
    }

    /// Registered descriptors, in registration order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.registry.all_services()
    }

    /// Build and check the pipeline graphs, then initialize every service
    /// in registration order.
    ///
    /// An inconsistent graph is reported but does not prevent the session
    /// from starting. A failing `on_init` does: services initialized before
    /// it are shut down again and [`SessionError::Startup`] is returned.
    pub async fn start(self) -> Result<Session, SessionError> {
        let Self {
            config,
            mut registry,
            router,
            hooks,
        } = self;

        let (graphs, report) = GraphBuilder::new(config.seed_topic.clone())
            .with_session_topic(config.end_topic.clone())
            .with_session_topic(config.scheduler.domain_topic.clone())
            .build(&router.domain_ids(), &registry.descriptors());
        if report.is_consistent() {
            tracing::info!(
                services = registry.len(),
                domains = router.domains().len(),
                "colloquy.session.consistent"
            );
        } else {
            tracing::warn!(defects = report.defects().len(), "colloquy.session.inconsistent");
            for defect in report.defects() {
                tracing::warn!(%defect, "colloquy.graph.defect");
            }
        }

        for idx in 0..registry.len() {
            let Some(id) = registry.descriptor(idx).map(|d| d.id.clone()) else {
                continue;
            };
            let Some(service) = registry.service_mut(idx) else {
                continue;
            };
            let outcome = AssertUnwindSafe(service.on_init()).catch_unwind().await;
            let source = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(payload) => ServiceError::Panicked(panic_message(payload.as_ref())),
            };
            tracing::error!(service = %id, error = %source, "colloquy.session.init_failed");
            let shutdown = shutdown_services(&mut registry, 0..idx).await;
            return Err(SessionError::Startup {
                service: id,
                source,
                shutdown,
            });
        }

        let id = config
            .session_id
            .clone()
            .unwrap_or_else(|| SessionId::new(uuid::Uuid::new_v4().to_string()));
        let mut state = SessionState::new(id);
        // A single domain needs no classification.
        if let [only] = router.domains() {
            tracing::debug!(domain = %only.id(), "colloquy.session.single_domain");
            state.domain = Some(only.id().clone());
        }
        let scheduler = TurnScheduler::new(graphs, config.scheduler.clone());
        Ok(Session {
            config,
            registry,
            router,
            scheduler,
            hooks,
            report,
            state,
            stop: StopHandle::new(),
            dialog_started: false,
        })
    }
}

/// A running dialog session.
///
/// Phases: `Initializing` after [`SessionBuilder::start`], `Running` from
/// the first turn, `ShuttingDown` and `Terminated` once
/// [`Session::shutdown`] is called. Turns are strictly sequential.
pub struct Session {
    config: SessionConfig,
    registry: ServiceRegistry,
    router: DomainRouter,
    scheduler: TurnScheduler,
    hooks: HookRegistry,
    report: ConsistencyReport,
    state: SessionState,
    stop: StopHandle,
    dialog_started: bool,
}

impl Session {
    /// Start assembling a session.
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Session identity.
    pub fn id(&self) -> &SessionId {
        self.state.id()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Cross-turn state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The configuration the session was started with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registered services, in registration order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.registry.all_services()
    }

    /// Registered domains, in registration order.
    pub fn domains(&self) -> &[Domain] {
        self.router.domains()
    }

    /// The start-up consistency report.
    pub fn report(&self) -> &ConsistencyReport {
        &self.report
    }

    /// Whether the start-up check raised no defect.
    pub fn is_consistent(&self) -> bool {
        self.report.is_consistent()
    }

    /// The pipeline graphs built at start-up.
    pub fn graphs(&self) -> &PipelineGraphs {
        self.scheduler.graphs()
    }

    /// Structural description of the system graph.
    pub fn render_graph(&self) -> GraphDescription {
        self.scheduler.graphs().describe()
    }

    /// A handle to request a stop from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn context(&self, point: HookPoint) -> HookContext {
        let mut ctx = HookContext::new(point, self.state.id.clone(), self.state.turn);
        ctx.domain = self.state.domain.clone();
        ctx
    }

    async fn begin(&mut self) {
        if self.dialog_started {
            return;
        }
        self.dialog_started = true;
        self.state.phase = SessionPhase::Running;
        for idx in 0..self.registry.len() {
            let Some(id) = self.registry.descriptor(idx).map(|d| d.id.clone()) else {
                continue;
            };
            let Some(service) = self.registry.service_mut(idx) else {
                continue;
            };
            let outcome = AssertUnwindSafe(service.on_dialog_start()).catch_unwind().await;
            if let Some(error) = hook_failure(outcome) {
                tracing::warn!(service = %id, %error, "colloquy.session.dialog_start_failed");
            }
        }
        let ctx = self.context(HookPoint::SessionStart);
        observe(&self.hooks, &ctx, &mut self.state).await;
    }

    fn seed(&self, input: Value) -> Envelope {
        let mut envelope = Envelope::seeded(self.config.seed_topic.clone(), input);
        for (topic, value) in &self.state.carried {
            if topic != &self.config.seed_topic {
                envelope.insert(topic.clone(), value.clone(), Origin::Carried);
            }
        }
        envelope
    }

    /// Run one turn seeded with `input` on the seed topic.
    ///
    /// Service failures abort the turn and are returned; per-turn
    /// diagnostics are in the report. Returns
    /// [`SessionError::Terminated`] once the session has been shut down.
    pub async fn run_turn(&mut self, input: impl Into<Value>) -> Result<TurnReport, SessionError> {
        if !self.state.phase.accepts_turns() {
            return Err(SessionError::Terminated);
        }
        self.begin().await;

        self.state.turn += 1;
        let turn = self.state.turn;
        let seed = self.seed(input.into());

        let mut ctx = self.context(HookPoint::TurnStart);
        ctx.values = Some(seed.to_json());
        observe(&self.hooks, &ctx, &mut self.state).await;

        let report = self
            .scheduler
            .run_turn(&mut self.registry, &self.router, &self.hooks, &mut self.state, seed)
            .await
            .map_err(|source| SessionError::Turn { turn, source })?;

        let feedback: Vec<Topic> = self
            .registry
            .all_services()
            .flat_map(|d| d.feedback.iter().cloned())
            .collect();
        self.state.carried.clear();
        for topic in feedback {
            if let Some(value) = report.envelope.get(topic.as_str()) {
                self.state.carried.insert(topic, value.clone());
            }
        }
        self.state.last_output = Some(report.envelope.clone());

        if report
            .envelope
            .get(self.config.end_topic.as_str())
            .is_some_and(|v| !matches!(v, Value::Null | Value::Bool(false)))
        {
            self.state.terminate(Termination::EndOfDialog);
        }

        let mut ctx = self.context(HookPoint::TurnEnd);
        ctx.report = Some(report.clone());
        observe(&self.hooks, &ctx, &mut self.state).await;

        tracing::debug!(
            turn,
            domain = ?self.state.domain,
            fired = report.fired.len(),
            diagnostics = report.diagnostics.len(),
            "colloquy.session.turn_complete"
        );
        Ok(report)
    }

    fn pending_termination(&self) -> Option<Termination> {
        if let Some(t) = &self.state.termination {
            return Some(t.clone());
        }
        if self.stop.is_stopped() {
            return Some(Termination::Stopped {
                reason: self.stop.reason().unwrap_or_default(),
            });
        }
        if self.state.turn >= self.config.max_turns {
            return Some(Termination::MaxTurns);
        }
        None
    }

    async fn drive(&mut self, input: &mut dyn InputSource) -> Result<Termination, SessionError> {
        if !self.state.phase.accepts_turns() {
            return Err(SessionError::Terminated);
        }
        self.begin().await;

        let mut next = if self.state.turn == 0 {
            Some(self.config.start_seed.clone())
        } else {
            None
        };
        loop {
            if let Some(reason) = self.pending_termination() {
                return Ok(reason);
            }
            let value = match next.take() {
                Some(value) => value,
                None => {
                    let received = tokio::select! {
                        biased;
                        _ = self.stop.stopped() => continue,
                        received = input.next_input(self.state.last_output.as_ref()) => received?,
                    };
                    match received {
                        Some(value) => value,
                        None => return Ok(Termination::InputExhausted),
                    }
                }
            };
            self.run_turn(value).await?;
        }
    }

    /// Drive turns until the conversation ends, then shut down.
    ///
    /// The first turn is seeded with the configured start seed; each
    /// following one with whatever `input` returns after seeing the
    /// previous turn's output. The loop ends when the end topic is
    /// published, a stop is requested, the input is exhausted, a service
    /// fails, or `max_turns` is reached. Shutdown always runs.
    pub async fn run(&mut self, input: &mut dyn InputSource) -> SessionOutcome {
        let result = self.drive(input).await;
        match &result {
            Ok(reason) => tracing::info!(reason = ?reason, turns = self.state.turn, "colloquy.session.finished"),
            Err(e) => tracing::error!(error = %e, turns = self.state.turn, "colloquy.session.failed"),
        }
        let turns = self.state.turn;
        let shutdown = self.shutdown().await;
        SessionOutcome {
            turns,
            result,
            shutdown,
        }
    }

    /// End the dialog and release every service, in reverse registration
    /// order, exactly once. Failures are collected in the report.
    ///
    /// A second call does nothing and returns an empty report.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        if !self.state.phase.accepts_turns() {
            return ShutdownReport::default();
        }
        self.state.phase = SessionPhase::ShuttingDown;

        if self.dialog_started {
            for idx in 0..self.registry.len() {
                let Some(id) = self.registry.descriptor(idx).map(|d| d.id.clone()) else {
                    continue;
                };
                let Some(service) = self.registry.service_mut(idx) else {
                    continue;
                };
                let outcome = AssertUnwindSafe(service.on_dialog_end()).catch_unwind().await;
                if let Some(error) = hook_failure(outcome) {
                    tracing::warn!(service = %id, %error, "colloquy.session.dialog_end_failed");
                }
            }
        }

        let registered = self.registry.len();
        let report = shutdown_services(&mut self.registry, 0..registered).await;

        let ctx = self.context(HookPoint::SessionEnd);
        observe(&self.hooks, &ctx, &mut self.state).await;

        self.state.phase = SessionPhase::Terminated;
        self.state.carried.clear();
        self.state.last_output = None;
        tracing::info!(
            invoked = report.invoked.len(),
            failures = report.failures.len(),
            "colloquy.session.shutdown"
        );
        report
    }
}

/// The error of a dialog start/end hook, a panic counted as one.
fn hook_failure(
    outcome: Result<Result<(), ServiceError>, Box<dyn std::any::Any + Send>>,
) -> Option<ServiceError> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(payload) => Some(ServiceError::Panicked(panic_message(payload.as_ref()))),
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("services", &self.registry)
            .field("domains", &self.router.domains())
            .finish()
    }
}
