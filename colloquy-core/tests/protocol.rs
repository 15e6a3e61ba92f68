//! Acceptance tests for the protocol crate.
//!
//! Tests cover:
//! - Trait object safety (Box<dyn Trait> is Send + Sync)
//! - Typed ID conversions
//! - Diagnostic and hook serialization shape

use colloquy_core::*;
use serde_json::json;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Object Safety: Box<dyn Trait> compiles and is Send + Sync
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn _assert_send_sync<T: Send + Sync>() {}
fn _assert_send<T: Send>() {}

#[test]
fn service_is_object_safe_send_sync() {
    _assert_send_sync::<Box<dyn Service>>();
}

#[test]
fn arc_lookup_backend_is_send_sync() {
    _assert_send_sync::<Arc<dyn LookupBackend>>();
}

#[test]
fn arc_hook_is_send_sync() {
    _assert_send_sync::<Arc<dyn Hook>>();
}

#[test]
fn input_source_is_object_safe_send() {
    _assert_send::<Box<dyn InputSource>>();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed IDs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn typed_ids_convert_and_display() {
    let s = ServiceId::from("nlu");
    let d = DomainId::from(String::from("ImsLecturers"));
    let t = Topic::new("user_acts");
    assert_eq!(s.as_str(), "nlu");
    assert_eq!(d.to_string(), "ImsLecturers");
    assert_eq!(t, Topic::from("user_acts"));
}

#[test]
fn typed_ids_serialize_transparently() {
    let t = Topic::new("sys_utterance");
    assert_eq!(serde_json::to_value(&t).unwrap(), json!("sys_utterance"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Serialization shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn partial_pipeline_diagnostic_shape() {
    let diag = TurnDiagnostic::PartialPipeline {
        service: ServiceId::new("nlg"),
        missing: vec![Topic::new("sys_act")],
    };
    let value = serde_json::to_value(&diag).unwrap();
    assert_eq!(value["type"], "partial_pipeline");
    assert_eq!(value["service"], "nlg");
    assert_eq!(value["missing"], json!(["sys_act"]));
    assert_eq!(
        diag.to_string(),
        "partial pipeline: nlg never received sys_act"
    );
}

#[test]
fn hook_action_stop_shape() {
    let action = HookAction::Stop {
        reason: "done".into(),
    };
    let value = serde_json::to_value(&action).unwrap();
    assert_eq!(value, json!({"action": "stop", "reason": "done"}));
}

#[test]
fn session_phase_accepts_turns_only_before_shutdown() {
    assert!(SessionPhase::Initializing.accepts_turns());
    assert!(SessionPhase::Running.accepts_turns());
    assert!(!SessionPhase::ShuttingDown.accepts_turns());
    assert!(!SessionPhase::Terminated.accepts_turns());
}
