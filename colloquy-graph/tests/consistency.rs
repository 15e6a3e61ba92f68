//! Start-up consistency checks over whole descriptor sets.

use colloquy_core::{DomainId, ServiceDescriptor, ServiceId, Topic};
use colloquy_graph::{Defect, GraphBuilder, GraphScope, Note};

fn builder() -> GraphBuilder {
    GraphBuilder::new("raw_input").with_session_topic("dialog_end")
}

fn three_stage() -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor::new("understanding")
            .subscribes(["raw_input"])
            .publishes(["intent"]),
        ServiceDescriptor::new("tracker")
            .subscribes(["intent"])
            .publishes(["belief"]),
        ServiceDescriptor::new("generation")
            .subscribes(["belief"])
            .publishes(["raw_output"]),
    ]
}

#[test]
fn full_coverage_is_consistent() {
    let domains = [DomainId::new("lecturers")];
    let (graphs, report) = builder().build(&domains, &three_stage());

    assert!(report.is_consistent(), "{report}");
    let graph = graphs.get(&DomainId::new("lecturers")).unwrap();
    assert_eq!(
        graph.ordered_ids(),
        vec![
            ServiceId::new("understanding"),
            ServiceId::new("tracker"),
            ServiceId::new("generation"),
        ]
    );
}

#[test]
fn final_output_is_only_a_note() {
    let (_, report) = builder().build(&[], &three_stage());
    assert!(report.is_consistent());
    assert!(matches!(
        report.notes(),
        [Note::UnconsumedTopic { topic, .. }] if topic.as_str() == "raw_output"
    ));
}

#[test]
fn missing_producer_flags_exactly_that_topic() {
    let mut services = three_stage();
    services.push(
        ServiceDescriptor::new("policy")
            .subscribes(["belief", "database_rows"])
            .publishes(["sys_act"]),
    );
    let (_, report) = builder().build(&[], &services);

    assert!(!report.is_consistent());
    assert_eq!(
        report.unreachable_topics().into_iter().collect::<Vec<_>>(),
        vec![Topic::new("database_rows")]
    );
    assert!(report.defects().iter().any(|d| matches!(
        d,
        Defect::UnreachableDependency { consumers, .. } if consumers == &[ServiceId::new("policy")]
    )));
}

#[test]
fn producer_in_other_domain_does_not_count() {
    let services = vec![
        ServiceDescriptor::new("nlu")
            .subscribes(["raw_input"])
            .publishes(["acts"]),
        ServiceDescriptor::new("bst_a")
            .subscribes(["acts"])
            .publishes(["belief"])
            .domain("a"),
        ServiceDescriptor::new("policy_b")
            .subscribes(["belief"])
            .publishes(["sys_act"])
            .domain("b"),
    ];
    let domains = [DomainId::new("a"), DomainId::new("b")];
    let (_, report) = builder().build(&domains, &services);

    let unreachable: Vec<_> = report
        .defects()
        .iter()
        .filter_map(|d| match d {
            Defect::UnreachableDependency { scope, topic, .. } => Some((scope.clone(), topic.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        unreachable,
        vec![(GraphScope::Domain(DomainId::new("b")), Topic::new("belief"))]
    );
}

#[test]
fn two_producers_in_one_domain_are_ambiguous() {
    let services = vec![
        ServiceDescriptor::new("nlu_rules")
            .subscribes(["raw_input"])
            .publishes(["acts"]),
        ServiceDescriptor::new("nlu_model")
            .subscribes(["raw_input"])
            .publishes(["acts"])
            .domain("a"),
        ServiceDescriptor::new("bst").subscribes(["acts"]).publishes(["dialog_end"]),
    ];
    let (_, report) = builder().build(&[DomainId::new("a")], &services);

    assert_eq!(
        report.ambiguous_topics().into_iter().collect::<Vec<_>>(),
        vec![Topic::new("acts")]
    );
    assert!(report.defects().iter().any(|d| matches!(
        d,
        Defect::AmbiguousProducer { producers, .. }
            if producers == &[ServiceId::new("nlu_rules"), ServiceId::new("nlu_model")]
    )));
}

#[test]
fn disconnected_service_is_dangling() {
    let mut services = three_stage();
    services.push(
        ServiceDescriptor::new("orphan")
            .subscribes(["never_there_but_produced"])
            .publishes(["orphan_out"]),
    );
    services.push(
        ServiceDescriptor::new("feeder")
            .subscribes(["orphan_out"])
            .publishes(["never_there_but_produced"]),
    );
    let (_, report) = builder().build(&[], &services);

    // orphan and feeder only feed each other: both form a cycle, but each
    // still feeds another service, so neither is dangling.
    assert!(report.dangling_services().is_empty());

    let mut services = three_stage();
    services.push(
        ServiceDescriptor::new("island")
            .subscribes(["island_in"])
            .publishes(["island_out"]),
    );
    let (_, report) = builder().build(&[], &services);
    assert_eq!(
        report.dangling_services().into_iter().collect::<Vec<_>>(),
        vec![ServiceId::new("island")]
    );
}

#[test]
fn session_topic_counts_as_consumed() {
    let services = vec![
        ServiceDescriptor::new("tracker")
            .subscribes(["raw_input"])
            .publishes(["dialog_end"]),
    ];
    let (_, report) = builder().build(&[], &services);
    assert!(report.is_consistent(), "{report}");
    assert!(report.notes().is_empty());
}

#[test]
fn feedback_needs_a_producer_but_makes_no_cycle() {
    let services = vec![
        ServiceDescriptor::new("nlg")
            .subscribes(["raw_input"])
            .feedback(["predicted_bc"])
            .publishes(["sys_utterance"]),
        ServiceDescriptor::new("bc")
            .subscribes(["sys_utterance"])
            .publishes(["predicted_bc"]),
    ];
    let (graphs, report) = builder().build(&[], &services);
    assert!(report.is_consistent(), "{report}");
    assert_eq!(graphs.shared().order(), &[0, 1]);

    let (_, report) = builder().build(&[], &services[..1]);
    assert_eq!(
        report.unreachable_topics().into_iter().collect::<Vec<_>>(),
        vec![Topic::new("predicted_bc")]
    );
}

#[test]
fn unknown_domain_binding_is_reported() {
    let services = vec![
        ServiceDescriptor::new("nlu")
            .subscribes(["raw_input"])
            .publishes(["dialog_end"])
            .domain("missing"),
    ];
    let (_, report) = builder().build(&[DomainId::new("present")], &services);
    assert!(report.defects().iter().any(|d| matches!(
        d,
        Defect::UnknownDomain { domain, .. } if domain.as_str() == "missing"
    )));
}

#[test]
fn report_display_lists_every_defect() {
    let services = vec![
        ServiceDescriptor::new("a").subscribes(["x"]).publishes(["dialog_end"]),
    ];
    let (_, report) = builder().build(&[], &services);
    let text = report.to_string();
    assert!(text.starts_with("messaging pipeline has 1 defect(s):"), "{text}");
    assert!(text.contains("[shared] unreachable dependency: x (needed by a)"));
}
