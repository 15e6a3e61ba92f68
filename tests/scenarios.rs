//! End-to-end scenarios across the colloquy crates.
//!
//! 1. **Input swap**: the same pipeline driven by a script and by a
//!    threaded input handle
//! 2. **Degraded pipeline**: a missing stage is reported at start-up and
//!    the session still runs
//! 3. **Conversation log**: one file per session, utterances masked
//! 4. **External stop**: a stop request ends a session blocked on input
//! 5. **Multi-domain routing**: the tracker moves the dialog between
//!    domain graphs

use colloquy::prelude::*;
use colloquy_convlog::{LogEvent, LogRecord, MASK};
use colloquy_core::test_utils::{RecordingHook, ScriptedInput};
use colloquy_graph::Defect;
use colloquy_services::topics::{GEN_USER_UTTERANCE, SYS_UTTERANCE, USER_UTTERANCE};
use colloquy_services::{BeliefTracker, KeywordNlu, TemplateNlg};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixtures
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const LECTURERS: &str = r#"{
    "id": "ImsLecturers",
    "display_name": "Lecturers",
    "primary_key": "name",
    "keywords": ["lecturer", "professor"],
    "informable": ["department", "position"],
    "requestable": ["email", "room"],
    "records": [
        {"name": "Anna Keller", "department": "phonetics", "position": "professor",
         "email": "anna.keller@example.org", "room": "01.004"},
        {"name": "Jonas Brandt", "department": "syntax", "position": "lecturer",
         "email": "jonas.brandt@example.org", "room": "02.011"}
    ]
}"#;

const MENSA: &str = r#"{
    "id": "Mensa",
    "display_name": "Mensa",
    "primary_key": "dish",
    "keywords": ["mensa", "lunch", "eat"],
    "informable": ["day"],
    "requestable": ["price"],
    "records": [
        {"dish": "lentil soup", "day": "monday", "price": "2.90"},
        {"dish": "risotto", "day": "tuesday", "price": "3.50"}
    ]
}"#;

fn load(json: &str) -> DomainFile {
    DomainFile::from_json(json).unwrap()
}

/// A full single-domain system, optionally without its policy.
fn lecturer_system(with_policy: bool) -> SessionBuilder {
    let file = load(LECTURERS);
    let domain = file.domain();
    let mut b = Session::builder(SessionConfig::default());
    b.add_domain(domain.clone()).unwrap();
    b.register(DomainTracker::new("domain_tracker").with_domain(&domain, file.keywords.clone()))
        .unwrap();
    if with_policy {
        for stage in domain_pipeline(&domain, false) {
            b.register_boxed(stage).unwrap();
        }
    } else {
        b.register(KeywordNlu::new(&domain)).unwrap();
        b.register(BeliefTracker::new(&domain)).unwrap();
        b.register(TemplateNlg::new(&domain)).unwrap();
    }
    b
}

fn utterances(log: &[TurnReport]) -> Vec<String> {
    log.iter()
        .filter_map(|r| r.envelope.get_str(SYS_UTTERANCE).map(str::to_string))
        .collect()
}

/// Collects every turn report.
#[derive(Default)]
struct TurnCollector(std::sync::Mutex<Vec<TurnReport>>);

#[async_trait::async_trait]
impl Hook for TurnCollector {
    fn points(&self) -> &[HookPoint] {
        &[HookPoint::TurnEnd]
    }

    async fn on_event(&self, ctx: &HookContext) -> Result<HookAction, colloquy_core::HookError> {
        if let Some(report) = &ctx.report {
            self.0.lock().unwrap().push(report.clone());
        }
        Ok(HookAction::Continue)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 1. Input swap
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn scripted_and_threaded_input_produce_the_same_dialog() {
    let script = ["a professor please", "what is the email?", "bye"];

    let scripted = Arc::new(TurnCollector::default());
    let mut b = lecturer_system(true);
    b.add_hook(scripted.clone());
    let mut s = b.start().await.unwrap();
    let outcome = s.run(&mut ScriptedInput::new(script)).await;
    assert!(outcome.is_clean());

    let threaded = Arc::new(TurnCollector::default());
    let mut b = lecturer_system(true);
    b.add_hook(threaded.clone());
    let mut s = b.start().await.unwrap();
    let (handle, mut input) = colloquy_hci::input_channel();
    let producer = tokio::spawn(async move {
        for line in script {
            // One value at a time: wait until the session took the last one.
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.send(line);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    });
    let outcome = s.run(&mut input).await;
    producer.await.unwrap();
    assert!(outcome.is_clean());

    let scripted = utterances(&scripted.0.lock().unwrap());
    let threaded = utterances(&threaded.0.lock().unwrap());
    assert_eq!(scripted, threaded);
    assert_eq!(
        scripted,
        vec![
            "Welcome to the Lecturers chat bot. How may I help you?".to_string(),
            "The position of Anna Keller is professor.".to_string(),
            "The email of Anna Keller is anna.keller@example.org. The position of Anna Keller is professor.".to_string(),
            "Thank you, goodbye.".to_string(),
        ]
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 2. Degraded pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn missing_policy_is_reported_but_the_session_runs() {
    let mut s = lecturer_system(false).start().await.unwrap();

    assert!(!s.is_consistent());
    assert!(s.report().defects().iter().any(|d| matches!(
        d,
        Defect::UnreachableDependency { topic, .. } if topic.as_str() == "sys_act"
    )));
    assert!(s.report().to_string().contains("unreachable dependency: sys_act"));

    let r = s.run_turn("").await.unwrap();
    assert!(r.envelope.contains("beliefstate"));
    assert!(!r.envelope.contains(SYS_UTTERANCE));
    assert!(r.diagnostics.iter().any(|d| matches!(
        d,
        TurnDiagnostic::PartialPipeline { service, .. } if service.as_str() == "ImsLecturers.nlg"
    )));

    let report = s.shutdown().await;
    assert!(report.is_clean());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 3. Conversation log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn conversation_log_masks_user_utterances() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = lecturer_system(true);
    b.add_hook(Arc::new(
        ConversationLog::new(dir.path()).with_masked_topics([GEN_USER_UTTERANCE, USER_UTTERANCE]),
    ));
    let mut s = b.start().await.unwrap();
    let outcome = s
        .run(&mut ScriptedInput::new(["my secret professor question", "bye"]))
        .await;
    assert!(outcome.is_clean());

    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let text = std::fs::read_to_string(&files[0]).unwrap();
    assert!(!text.contains("secret"));

    let records: Vec<LogRecord> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(matches!(records.first().unwrap().event, LogEvent::SessionStart));
    assert!(matches!(records.last().unwrap().event, LogEvent::SessionEnd));
    let turns: Vec<_> = records
        .iter()
        .filter_map(|r| match &r.event {
            LogEvent::Turn { seed, envelope, .. } => Some((seed, envelope)),
            _ => None,
        })
        .collect();
    assert_eq!(turns.len(), 3);
    let (seed, envelope) = turns[1];
    assert_eq!(seed[GEN_USER_UTTERANCE], json!(MASK));
    assert_eq!(envelope[USER_UTTERANCE], json!(MASK));
    assert_eq!(
        envelope[SYS_UTTERANCE],
        json!("The position of Anna Keller is professor.")
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 4. External stop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn stop_request_ends_a_session_waiting_for_input() {
    let hook = Arc::new(RecordingHook::new());
    let mut b = lecturer_system(true);
    b.add_hook(hook.clone());
    let mut s = b.start().await.unwrap();
    let stop = s.stop_handle();
    let (_handle, mut input) = colloquy_hci::input_channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop("operator interrupt");
    });
    let outcome = tokio::time::timeout(Duration::from_secs(5), s.run(&mut input))
        .await
        .expect("stop did not interrupt the input wait");

    assert_eq!(outcome.turns, 1);
    assert!(matches!(
        outcome.result,
        Ok(Termination::Stopped { ref reason }) if reason == "operator interrupt"
    ));
    assert_eq!(s.phase(), SessionPhase::Terminated);
    assert_eq!(hook.points_seen().last(), Some(&HookPoint::SessionEnd));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 5. Multi-domain routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn tracker_moves_the_dialog_between_domains() {
    let files = [load(LECTURERS), load(MENSA)];
    let mut b = Session::builder(SessionConfig::default());
    let mut tracker = DomainTracker::new("domain_tracker");
    let mut stages = Vec::new();
    for file in &files {
        let domain = file.domain();
        b.add_domain(domain.clone()).unwrap();
        tracker = tracker.with_domain(&domain, file.keywords.clone());
        stages.extend(domain_pipeline(&domain, false));
    }
    b.register(tracker).unwrap();
    for stage in stages {
        b.register_boxed(stage).unwrap();
    }
    let collector = Arc::new(TurnCollector::default());
    b.add_hook(collector.clone());
    let mut s = b.start().await.unwrap();
    assert!(s.is_consistent(), "{}", s.report());

    let outcome = s
        .run(&mut ScriptedInput::new([
            "what can I eat on tuesday",
            "which professor is in phonetics",
            "and the room?",
            "bye",
        ]))
        .await;
    assert!(outcome.is_clean());

    let reports = collector.0.lock().unwrap();
    let domains: Vec<Option<&str>> = reports
        .iter()
        .map(|r| r.domain.as_ref().map(|d| d.as_str()))
        .collect();
    assert_eq!(
        domains,
        vec![None, Some("Mensa"), Some("ImsLecturers"), Some("ImsLecturers"), Some("ImsLecturers")]
    );
    assert_eq!(
        reports[1].envelope.get_str(SYS_UTTERANCE),
        Some("The day of risotto is tuesday.")
    );
    assert!(reports[3]
        .envelope
        .get_str(SYS_UTTERANCE)
        .unwrap()
        .contains("The room of Anna Keller is 01.004."));
}
