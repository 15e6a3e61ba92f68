//! Turn scheduling and domain routing through a live session.

use colloquy_core::test_utils::{CallLog, FnService, RecordingHook};
use colloquy_core::{
    Domain, DomainId, HookPoint, Origin, Publications, ServiceDescriptor, ServiceError, ServiceId,
    Topic, TurnDiagnostic,
};
use colloquy_orch_local::{Session, SessionBuilder, SessionConfig, SessionError, TurnError};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn builder(seed: &str) -> SessionBuilder {
    Session::builder(SessionConfig::default().with_seed_topic(seed))
}

fn log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn turns(log: &CallLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| e.ends_with(":turn"))
        .cloned()
        .collect()
}

// --- Dependency order ---

#[tokio::test]
async fn producer_chain_runs_in_dependency_order() {
    let calls = log();
    let mut b = builder("input");
    // Registered consumer-first on purpose.
    b.register(
        FnService::echo(ServiceDescriptor::new("B").subscribes(["topic1"]).publishes(["topic2"]))
            .with_log(calls.clone()),
    )
    .unwrap();
    b.register(
        FnService::echo(ServiceDescriptor::new("A").subscribes(["input"]).publishes(["topic1"]))
            .with_log(calls.clone()),
    )
    .unwrap();
    let mut session = b.start().await.unwrap();
    assert!(session.is_consistent(), "{}", session.report());

    let report = session.run_turn("").await.unwrap();

    assert_eq!(turns(&calls), vec!["A:turn", "B:turn"]);
    assert_eq!(report.fired, vec![ServiceId::new("A"), ServiceId::new("B")]);
    assert_eq!(report.envelope.get("topic1"), Some(&json!("A")));
    assert_eq!(report.envelope.get("topic2"), Some(&json!("B")));
    assert_eq!(report.envelope.get("input"), Some(&json!("")));
    assert!(report.is_clean(), "{:?}", report.diagnostics);
}

#[tokio::test]
async fn three_stage_scenario_is_consistent_and_causal() {
    let mut b = builder("rawInput");
    b.add_domain(Domain::new("main", "Main")).unwrap();
    b.register(FnService::new(
        ServiceDescriptor::new("understanding")
            .subscribes(["rawInput"])
            .publishes(["intent"]),
        |env| {
            let raw = env.get_str("rawInput").unwrap_or_default();
            Ok(Publications::none().with("intent", format!("greet({raw})")))
        },
    ))
    .unwrap();
    b.register(FnService::new(
        ServiceDescriptor::new("tracker")
            .subscribes(["intent"])
            .publishes(["belief"]),
        |env| {
            let intent = env.get_str("intent").unwrap_or_default();
            Ok(Publications::none().with("belief", json!({ "last": intent })))
        },
    ))
    .unwrap();
    b.register(FnService::new(
        ServiceDescriptor::new("generation")
            .subscribes(["belief"])
            .publishes(["rawOutput"]),
        |env| {
            let last = env.get("belief").and_then(|b| b["last"].as_str()).unwrap_or_default();
            Ok(Publications::none().with("rawOutput", format!("you said {last}")))
        },
    ))
    .unwrap();

    let mut session = b.start().await.unwrap();
    assert!(session.is_consistent(), "{}", session.report());

    let report = session.run_turn("hello").await.unwrap();
    assert!(report.is_clean(), "{:?}", report.diagnostics);
    assert_eq!(report.domain, Some(DomainId::new("main")));
    assert_eq!(
        report.envelope.write_order(),
        &[
            Topic::new("rawInput"),
            Topic::new("intent"),
            Topic::new("belief"),
            Topic::new("rawOutput"),
        ]
    );
    assert_eq!(
        report.envelope.get_str("rawOutput"),
        Some("you said greet(hello)")
    );
}

// --- Per-turn diagnostics ---

#[tokio::test]
async fn missing_topic_yields_partial_pipeline_and_turn_completes() {
    let mut b = builder("input");
    b.register(FnService::new(
        ServiceDescriptor::new("nlu").subscribes(["input"]).publishes(["acts"]),
        |env| {
            if env.get_str("input") == Some("") {
                Ok(Publications::none())
            } else {
                Ok(Publications::none().with("acts", "inform"))
            }
        },
    ))
    .unwrap();
    b.register(FnService::echo(
        ServiceDescriptor::new("policy").subscribes(["acts"]).publishes(["sys_act"]),
    ))
    .unwrap();
    let mut session = b.start().await.unwrap();

    let report = session.run_turn("").await.unwrap();
    assert_eq!(report.fired, vec![ServiceId::new("nlu")]);
    assert_eq!(
        report.diagnostics,
        vec![TurnDiagnostic::PartialPipeline {
            service: ServiceId::new("policy"),
            missing: vec![Topic::new("acts")],
        }]
    );

    let report = session.run_turn("hi").await.unwrap();
    assert!(report.is_clean());
    assert!(report.fired("policy"));
}

#[tokio::test]
async fn undeclared_publication_is_dropped() {
    let mut b = builder("input");
    b.register(FnService::new(
        ServiceDescriptor::new("chatty").subscribes(["input"]).publishes(["out"]),
        |_| Ok(Publications::none().with("out", 1).with("secret", 2)),
    ))
    .unwrap();
    let mut session = b.start().await.unwrap();

    let report = session.run_turn("x").await.unwrap();
    assert!(report.envelope.contains("out"));
    assert!(!report.envelope.contains("secret"));
    assert_eq!(
        report.diagnostics,
        vec![TurnDiagnostic::UndeclaredTopic {
            service: ServiceId::new("chatty"),
            topic: Topic::new("secret"),
        }]
    );
}

#[tokio::test]
async fn failing_service_aborts_the_turn() {
    let mut b = builder("input");
    b.register(FnService::new(
        ServiceDescriptor::new("broken").subscribes(["input"]).publishes(["out"]),
        |_| Err(ServiceError::Failed("model not loaded".into())),
    ))
    .unwrap();
    let mut session = b.start().await.unwrap();

    let err = session.run_turn("x").await.unwrap_err();
    match err {
        SessionError::Turn {
            turn,
            source: TurnError::Service { service, .. },
        } => {
            assert_eq!(turn, 1);
            assert_eq!(service.as_str(), "broken");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn panicking_service_is_contained() {
    let mut b = builder("input");
    b.register(FnService::new(
        ServiceDescriptor::new("wild").subscribes(["input"]).publishes(["out"]),
        |_| panic!("index out of bounds"),
    ))
    .unwrap();
    let mut session = b.start().await.unwrap();

    let err = session.run_turn("x").await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Turn {
            source: TurnError::Service {
                source: ServiceError::Panicked(ref msg),
                ..
            },
            ..
        } if msg.contains("index out of bounds")
    ));
}

// --- Domain routing ---

/// A classifier that names a different domain per turn.
fn classifier(script: Vec<Option<&'static str>>) -> FnService {
    let mut turn = 0;
    FnService::new(
        ServiceDescriptor::new("domain_tracker")
            .subscribes(["input"])
            .publishes(["domain", "user_utterance"]),
        move |env| {
            let pick = script.get(turn).copied().flatten();
            turn += 1;
            let mut out = Publications::none().with(
                "user_utterance",
                env.get("input").cloned().unwrap_or_default(),
            );
            if let Some(domain) = pick {
                out.push("domain", domain);
            }
            Ok(out)
        },
    )
}

fn two_domain_builder(script: Vec<Option<&'static str>>, calls: &CallLog) -> SessionBuilder {
    let mut b = builder("input");
    b.add_domain(Domain::new("x", "X")).unwrap();
    b.add_domain(Domain::new("y", "Y")).unwrap();
    b.register(classifier(script).with_log(calls.clone())).unwrap();
    for domain in ["x", "y"] {
        b.register(
            FnService::echo(
                ServiceDescriptor::new(format!("nlu_{domain}"))
                    .subscribes(["user_utterance"])
                    .publishes(["acts"])
                    .domain(domain),
            )
            .with_log(calls.clone()),
        )
        .unwrap();
    }
    b
}

#[tokio::test]
async fn domain_switch_happens_exactly_when_classifier_changes() {
    let calls = log();
    let hook = Arc::new(RecordingHook::new());
    let mut b = two_domain_builder(vec![Some("x"), Some("x"), Some("y")], &calls);
    b.add_hook(hook.clone());
    let mut session = b.start().await.unwrap();
    assert!(session.is_consistent(), "{}", session.report());

    let first = session.run_turn("lecturer please").await.unwrap();
    let second = session.run_turn("and the office?").await.unwrap();
    let third = session.run_turn("what about rain").await.unwrap();

    assert_eq!(first.domain, Some(DomainId::new("x")));
    assert_eq!(second.domain, Some(DomainId::new("x")));
    assert_eq!(third.domain, Some(DomainId::new("y")));
    assert!(first.fired("nlu_x") && second.fired("nlu_x"));
    assert!(third.fired("nlu_y") && !third.fired("nlu_x"));

    // The external input survives the switch.
    assert_eq!(third.envelope.get_str("input"), Some("what about rain"));
    assert_eq!(third.envelope.origin("input"), Some(&Origin::Seed));
    assert_eq!(third.envelope.get_str("acts"), Some("nlu_y"));
    assert!(third.is_clean(), "{:?}", third.diagnostics);

    let switches: Vec<(u64, Option<DomainId>, Option<DomainId>)> = hook
        .events()
        .into_iter()
        .filter(|e| e.point == HookPoint::DomainSwitched)
        .map(|e| (e.turn, e.previous_domain, e.domain))
        .collect();
    assert_eq!(
        switches,
        vec![
            (1, None, Some(DomainId::new("x"))),
            (3, Some(DomainId::new("x")), Some(DomainId::new("y"))),
        ]
    );
}

#[tokio::test]
async fn unresolved_domain_runs_the_shared_fallback_only() {
    let calls = log();
    let mut session = two_domain_builder(vec![None], &calls)
        .start()
        .await
        .unwrap();

    let report = session.run_turn("hmm").await.unwrap();

    assert_eq!(report.domain, None);
    assert_eq!(report.fired, vec![ServiceId::new("domain_tracker")]);
    assert_eq!(
        report.diagnostics,
        vec![TurnDiagnostic::UnresolvedDomain { observed: None }]
    );
    assert_eq!(turns(&calls), vec!["domain_tracker:turn"]);
}

#[tokio::test]
async fn unknown_domain_is_reported_with_the_observed_value() {
    let calls = log();
    let mut session = two_domain_builder(vec![Some("cooking")], &calls)
        .start()
        .await
        .unwrap();

    let report = session.run_turn("recipe").await.unwrap();
    assert_eq!(
        report.diagnostics,
        vec![TurnDiagnostic::UnresolvedDomain {
            observed: Some(json!("cooking"))
        }]
    );
    assert_eq!(session.state().domain(), None);
}

#[tokio::test]
async fn switch_drops_values_from_the_previous_domain() {
    let mut b = builder("input");
    b.add_domain(Domain::new("x", "X")).unwrap();
    b.add_domain(Domain::new("y", "Y")).unwrap();
    // A domain-x service that runs before the classifier on turn 2.
    b.register(FnService::echo(
        ServiceDescriptor::new("x_early")
            .subscribes(["input"])
            .publishes(["x_note"])
            .domain("x"),
    ))
    .unwrap();
    b.register(classifier(vec![Some("x"), Some("y")])).unwrap();
    let mut session = b.start().await.unwrap();

    let first = session.run_turn("one").await.unwrap();
    assert!(first.envelope.contains("x_note"));

    let second = session.run_turn("two").await.unwrap();
    assert!(second.fired("x_early"));
    assert_eq!(second.domain, Some(DomainId::new("y")));
    assert!(!second.envelope.contains("x_note"));
    assert!(second.envelope.contains("user_utterance"));
    assert!(second.envelope.contains("domain"));
}

#[tokio::test]
async fn no_domains_means_shared_graph_without_unresolved_errors() {
    let mut b = builder("input");
    b.register(FnService::echo(
        ServiceDescriptor::new("echo").subscribes(["input"]).publishes(["out"]),
    ))
    .unwrap();
    let mut session = b.start().await.unwrap();

    let report = session.run_turn("hi").await.unwrap();
    assert!(report.is_clean(), "{:?}", report.diagnostics);
    assert_eq!(report.domain, None);
}

// --- Feedback across turns ---

#[tokio::test]
async fn feedback_reaches_the_next_turn_only() {
    let mut b = builder("input");
    b.register(FnService::new(
        ServiceDescriptor::new("nlg")
            .subscribes(["input"])
            .feedback(["predicted_bc"])
            .publishes(["sys_utterance"]),
        |env| {
            let bc = env.get_str("predicted_bc").unwrap_or("none");
            Ok(Publications::none().with("sys_utterance", format!("bc={bc}")))
        },
    ))
    .unwrap();
    b.register(FnService::new(
        ServiceDescriptor::new("bc")
            .subscribes(["input"])
            .publishes(["predicted_bc"]),
        |env| {
            let input = env.get_str("input").unwrap_or_default();
            Ok(Publications::none().with("predicted_bc", format!("ok:{input}")))
        },
    ))
    .unwrap();
    let mut session = b.start().await.unwrap();
    assert!(session.is_consistent(), "{}", session.report());

    let first = session.run_turn("a").await.unwrap();
    assert_eq!(first.envelope.get_str("sys_utterance"), Some("bc=none"));

    let second = session.run_turn("b").await.unwrap();
    assert_eq!(second.envelope.get_str("sys_utterance"), Some("bc=ok:a"));
    assert_eq!(
        session.state().carried().get("predicted_bc"),
        Some(&json!("ok:b"))
    );
}
