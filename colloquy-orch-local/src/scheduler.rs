//! Turn scheduling: one propagation pass over the active graph.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;

use colloquy_core::{
    Envelope, HookAction, HookContext, HookPoint, Origin, ServiceError, ServiceId, Topic,
    TurnDiagnostic, TurnReport,
};
use colloquy_graph::{GraphScope, PipelineGraph, PipelineGraphs};
use colloquy_hooks::HookRegistry;
use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;

use crate::registry::ServiceRegistry;
use crate::router::{DomainRouter, Route};
use crate::session::{SessionState, Termination};
use crate::shutdown::panic_message;

/// A failure that aborts the current turn.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TurnError {
    /// A service's turn handler returned an error or panicked.
    #[error("service {service} failed: {source}")]
    Service {
        /// The failing service.
        service: ServiceId,
        /// What it reported.
        source: ServiceError,
    },
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Topic the domain classifier publishes the domain identity on.
    pub domain_topic: Topic,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            domain_topic: Topic::new("domain"),
        }
    }
}

/// Runs single turns over pre-built pipeline graphs.
///
/// Within a pass the scheduler repeatedly takes the first service, in the
/// active graph's dependency order, that has not fired yet and whose
/// subscriptions are all present in the envelope. Every service fires at
/// most once per pass, so a pass always terminates.
#[derive(Debug, Clone)]
pub struct TurnScheduler {
    graphs: PipelineGraphs,
    config: SchedulerConfig,
}

impl TurnScheduler {
    /// Create a scheduler over `graphs`.
    pub fn new(graphs: PipelineGraphs, config: SchedulerConfig) -> Self {
        Self { graphs, config }
    }

    /// The graphs this scheduler runs on.
    pub fn graphs(&self) -> &PipelineGraphs {
        &self.graphs
    }

    /// The scheduler's configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn graph(&self, scope: &GraphScope) -> &PipelineGraph {
        self.graphs
            .scoped(scope)
            .unwrap_or_else(|| self.graphs.shared())
    }

    /// Execute one turn, starting from `seed`.
    ///
    /// The active domain in `state` is updated when the classifier switches
    /// domains. Hook stop requests are recorded in `state` and take effect
    /// before the next turn.
    pub(crate) async fn run_turn(
        &self,
        registry: &mut ServiceRegistry,
        router: &DomainRouter,
        hooks: &HookRegistry,
        state: &mut SessionState,
        seed: Envelope,
    ) -> Result<TurnReport, TurnError> {
        let turn = state.turn();
        let mut envelope = seed;
        let mut scope = router.scope(state.domain());
        let mut fired: BTreeSet<usize> = BTreeSet::new();
        let mut fired_ids: Vec<ServiceId> = Vec::new();
        let mut diagnostics: Vec<TurnDiagnostic> = Vec::new();
        let mut unresolved: Option<Option<Value>> = None;

        loop {
            let graph = self.graph(&scope);
            let next = graph.order().iter().copied().find(|idx| {
                !fired.contains(idx)
                    && graph
                        .descriptor(*idx)
                        .is_some_and(|d| d.subscribes.iter().all(|t| envelope.contains(t.as_str())))
            });
            let Some(idx) = next else {
                break;
            };
            let Some(descriptor) = graph.descriptor(idx).cloned() else {
                break;
            };
            fired.insert(idx);
            let Some(service) = registry.service_mut(idx) else {
                break;
            };

            let outcome = AssertUnwindSafe(service.on_turn(&envelope))
                .catch_unwind()
                .await;
            let publications = match outcome {
                Ok(Ok(publications)) => publications,
                Ok(Err(source)) => {
                    return Err(TurnError::Service {
                        service: descriptor.id,
                        source,
                    });
                }
                Err(payload) => {
                    return Err(TurnError::Service {
                        service: descriptor.id,
                        source: ServiceError::Panicked(panic_message(payload.as_ref())),
                    });
                }
            };
            fired_ids.push(descriptor.id.clone());

            let mut published = serde_json::Map::new();
            for (topic, value) in publications {
                if !descriptor.publishes.contains(&topic) {
                    tracing::warn!(service = %descriptor.id, %topic, turn, "colloquy.turn.undeclared_topic");
                    diagnostics.push(TurnDiagnostic::UndeclaredTopic {
                        service: descriptor.id.clone(),
                        topic,
                    });
                    continue;
                }
                if let Some(Origin::Service(previous)) = envelope.origin(topic.as_str()) {
                    if previous != &descriptor.id {
                        tracing::debug!(
                            %topic,
                            previous = %previous,
                            service = %descriptor.id,
                            "colloquy.turn.overwrite"
                        );
                    }
                }
                published.insert(topic.to_string(), value.clone());
                envelope.insert(topic, value, Origin::Service(descriptor.id.clone()));
            }
            tracing::debug!(service = %descriptor.id, turn, topics = published.len(), "colloquy.turn.fired");

            let mut ctx = HookContext::new(HookPoint::ServiceFired, state.id().clone(), turn);
            ctx.domain = state.domain().cloned();
            ctx.service = Some(descriptor.id.clone());
            ctx.values = Some(Value::Object(published));
            observe(hooks, &ctx, state).await;

            if !router.has_domains() || !descriptor.publishes.contains(router.topic()) {
                continue;
            }
            let Some(value) = envelope.get(router.topic().as_str()).cloned() else {
                continue;
            };
            match router.route(state.domain(), &value) {
                Route::Stay => {}
                Route::Unknown(observed) => {
                    tracing::warn!(turn, observed = %observed, "colloquy.router.unknown_domain");
                    unresolved = Some(Some(observed));
                }
                Route::Switch { from, to } => {
                    tracing::info!(
                        turn,
                        from = from.as_ref().map(|d| d.as_str()).unwrap_or("-"),
                        to = %to,
                        "colloquy.router.switch"
                    );
                    // Only the domain-agnostic part of the turn survives.
                    envelope.retain_origins(|_, origin| match origin {
                        Origin::Service(id) => registry.is_shared(id.as_str()),
                        _ => true,
                    });
                    state.set_domain(Some(to.clone()));
                    scope = GraphScope::Domain(to);
                    unresolved = None;

                    let mut ctx = HookContext::new(HookPoint::DomainSwitched, state.id().clone(), turn);
                    ctx.domain = state.domain().cloned();
                    ctx.previous_domain = from;
                    observe(hooks, &ctx, state).await;
                }
            }
        }

        let fallback = router.has_domains() && state.domain().is_none();
        if fallback && unresolved.is_none() {
            unresolved = Some(None);
        }
        if let Some(observed) = unresolved {
            diagnostics.push(TurnDiagnostic::UnresolvedDomain { observed });
        }

        if !fallback {
            let graph = self.graph(&scope);
            for idx in graph.order() {
                if fired.contains(idx) {
                    continue;
                }
                let Some(descriptor) = graph.descriptor(*idx) else {
                    continue;
                };
                let missing: Vec<Topic> = descriptor
                    .subscribes
                    .iter()
                    .filter(|t| !envelope.contains(t.as_str()))
                    .cloned()
                    .collect();
                diagnostics.push(TurnDiagnostic::PartialPipeline {
                    service: descriptor.id.clone(),
                    missing,
                });
            }
        }

        for diagnostic in &diagnostics {
            tracing::warn!(turn, %diagnostic, "colloquy.turn.diagnostic");
        }

        let mut report = TurnReport::new(turn, envelope);
        report.domain = state.domain().cloned();
        report.fired = fired_ids;
        report.diagnostics = diagnostics;
        Ok(report)
    }
}

/// Dispatch to hooks and record a stop request.
pub(crate) async fn observe(hooks: &HookRegistry, ctx: &HookContext, state: &mut SessionState) {
    if let HookAction::Stop { reason } = hooks.dispatch(ctx).await {
        tracing::info!(point = ?ctx.point, %reason, "colloquy.hook.stop");
        state.terminate(Termination::Stopped { reason });
    }
}
