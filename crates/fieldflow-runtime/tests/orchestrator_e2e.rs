#![forbid(unsafe_code)]

//! End-to-end orchestrator scenarios against a small sign-up form.
//!
//! The evaluator here requires non-empty strings for required fields and
//! treats the username "taken" as already registered.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use fieldflow_core::{
    EventKind, FieldDescriptor, FieldValue, FnEvaluator, RuleEvaluator, RuleMeta, StaticSchema,
    ValidationConfig, ValidationEvent, ValidationStatus, ValueSnapshot,
};
use fieldflow_runtime::{ClientValidationResult, Orchestrator, TriggerOutcome};

// ============================================================================
// Fixtures
// ============================================================================

fn signup_schema() -> StaticSchema {
    StaticSchema::new()
        .with_field(FieldDescriptor::new("email").required())
        .with_field(FieldDescriptor::new("username").with_rules(RuleMeta::unique()))
        .with_field(FieldDescriptor::new("password").required())
        .with_field(FieldDescriptor::new("confirm"))
}

/// Evaluator that records every (field, value) it is asked about.
fn recording_evaluator(calls: Arc<Mutex<Vec<(String, FieldValue)>>>) -> impl RuleEvaluator {
    FnEvaluator::new(
        move |field: &FieldDescriptor, value: &FieldValue, values: &ValueSnapshot| {
            calls
                .lock()
                .unwrap()
                .push((field.name.clone(), value.clone()));
            let mut errors = Vec::new();
            if field.required && value.as_str().is_none_or(str::is_empty) {
                errors.push("required".to_string());
            }
            if field.name == "username" && value == "taken" {
                errors.push("username already registered".to_string());
            }
            if field.name == "confirm" && values.get("password") != Some(value) {
                errors.push("passwords do not match".to_string());
            }
            errors
        },
    )
}

struct Harness {
    orchestrator: Orchestrator,
    calls: Arc<Mutex<Vec<(String, FieldValue)>>>,
}

impl Harness {
    fn new(config: ValidationConfig) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(signup_schema())
            .with_evaluator(recording_evaluator(Arc::clone(&calls)))
            .with_config(config);
        Self {
            orchestrator,
            calls,
        }
    }

    fn calls_for(&self, field: &str) -> Vec<FieldValue> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(f, _)| f == field)
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn kinds(&self, field: &str) -> Vec<EventKind> {
        self.orchestrator
            .events()
            .history_for(field)
            .iter()
            .map(ValidationEvent::kind)
            .collect()
    }

    fn count(&self, field: &str, kind: EventKind) -> usize {
        self.orchestrator.event_count(field, kind)
    }
}

fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

const SETTLE: Duration = Duration::from_secs(3);

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn required_email_fails_immediately() {
    let h = Harness::new(ValidationConfig::default());

    let outcome = h.orchestrator.on_field_change("email", "".into()).unwrap();
    assert!(matches!(outcome, TriggerOutcome::Completed(_)));

    assert_eq!(h.orchestrator.status("email"), ValidationStatus::Invalid);
    assert_eq!(h.orchestrator.field_errors("email"), ["required"]);
    assert!(h.orchestrator.state().is_touched("email"));
    assert_eq!(h.count("email", EventKind::Error), 1);
    assert_eq!(h.kinds("email"), [EventKind::Start, EventKind::Error]);
}

#[test]
fn username_debounces_then_succeeds() {
    let h = Harness::new(ValidationConfig::default().with_debounce_delay(Duration::from_millis(60)));

    let outcome = h.orchestrator.on_field_change("username", "bob".into()).unwrap();
    assert_eq!(outcome, TriggerOutcome::Scheduled);
    assert_eq!(h.orchestrator.status("username"), ValidationStatus::Idle);
    assert!(h.calls_for("username").is_empty(), "evaluated before the delay");

    assert!(wait_until(SETTLE, || {
        h.orchestrator.status("username") == ValidationStatus::Valid
    }));
    assert!(h.orchestrator.state().is_touched("username"));
    assert_eq!(h.count("username", EventKind::Success), 1);
    assert_eq!(h.count("username", EventKind::Start), 1);
}

#[test]
fn rapid_edits_evaluate_only_the_last_value() {
    let h = Harness::new(ValidationConfig::default().with_debounce_delay(Duration::from_millis(300)));

    h.orchestrator.on_field_change("username", "bo".into()).unwrap();
    thread::sleep(Duration::from_millis(50));
    h.orchestrator.on_field_change("username", "bob".into()).unwrap();

    assert!(wait_until(SETTLE, || {
        h.orchestrator.status("username") == ValidationStatus::Valid
    }));
    // Give a superseded timer time to misfire if it were going to.
    thread::sleep(Duration::from_millis(400));

    assert_eq!(h.calls_for("username"), [FieldValue::from("bob")]);
    assert_eq!(h.count("username", EventKind::Start), 1);
    assert_eq!(
        h.count("username", EventKind::Success) + h.count("username", EventKind::Error),
        1
    );
    assert_eq!(h.count("username", EventKind::Cancel), 1);
}

#[test]
fn typing_clears_stale_errors_before_revalidation() {
    let h = Harness::new(ValidationConfig::default().with_debounce_delay(Duration::from_millis(80)));

    h.orchestrator.on_field_change("username", "taken".into()).unwrap();
    assert!(wait_until(SETTLE, || {
        h.orchestrator.status("username") == ValidationStatus::Invalid
    }));
    assert_eq!(
        h.orchestrator.field_errors("username"),
        ["username already registered"]
    );

    h.orchestrator.on_field_change("username", "free".into()).unwrap();
    assert_eq!(h.orchestrator.status("username"), ValidationStatus::Idle);
    assert!(h.orchestrator.field_errors("username").is_empty());

    assert!(wait_until(SETTLE, || {
        h.orchestrator.status("username") == ValidationStatus::Valid
    }));
}

#[test]
fn immediate_field_list_overrides_policy() {
    let h = Harness::new(ValidationConfig::default().with_immediate_field("username"));
    let outcome = h
        .orchestrator
        .on_field_change("username", "taken".into())
        .unwrap();
    assert!(matches!(outcome, TriggerOutcome::Completed(_)));
    assert_eq!(h.orchestrator.status("username"), ValidationStatus::Invalid);
    assert!(h.orchestrator.pending_validations().is_empty());
}

#[test]
fn validate_all_batches_every_field() {
    let h = Harness::new(ValidationConfig::default());
    h.orchestrator.state().set_values([
        ("email".to_string(), FieldValue::from("")),
        ("username".to_string(), FieldValue::from("bob")),
        ("password".to_string(), FieldValue::from("hunter2")),
        ("confirm".to_string(), FieldValue::from("hunter2")),
    ]);

    let errors = h.orchestrator.validate_all().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors["email"], ["required"]);

    assert_eq!(h.orchestrator.status("email"), ValidationStatus::Invalid);
    for field in ["username", "password", "confirm"] {
        assert_eq!(h.orchestrator.status(field), ValidationStatus::Valid, "{field}");
        assert!(h.orchestrator.field_errors(field).is_empty());
    }
    for field in ["email", "username", "password", "confirm"] {
        let terminal = h.count(field, EventKind::Success) + h.count(field, EventKind::Error);
        assert_eq!(terminal, 1, "{field} should get exactly one event");
        assert_eq!(h.count(field, EventKind::Start), 0);
    }
    assert!(!h.orchestrator.is_validation_in_progress());
}

#[test]
fn cross_field_rule_sees_latest_snapshot() {
    let h = Harness::new(ValidationConfig::default());
    h.orchestrator
        .on_field_change("password", "hunter2".into())
        .unwrap();
    let outcome = h
        .orchestrator
        .validate_field(
            "confirm",
            "hunter3".into(),
            fieldflow_runtime::Trigger::Immediate,
        )
        .unwrap();
    assert_eq!(
        outcome.outcome().map(|o| o.errors().to_vec()),
        Some(vec!["passwords do not match".to_string()])
    );
}

#[test]
fn form_submission_summarizes() {
    let h = Harness::new(ValidationConfig::default());
    let response = h
        .orchestrator
        .handle_form_submission([
            ("email".to_string(), FieldValue::from("a@b.c")),
            ("username".to_string(), FieldValue::from("taken")),
            ("password".to_string(), FieldValue::from("")),
            ("confirm".to_string(), FieldValue::from("")),
        ])
        .unwrap();

    assert!(!response.is_valid);
    assert_eq!(response.error_count, 2);
    assert!(response.field_errors.contains_key("username"));
    assert!(response.field_errors.contains_key("password"));
    assert!(!response.is_validating);
    assert_eq!(response.touched_fields.len(), 4);
    assert_eq!(
        response.dirty_fields,
        ["confirm", "email", "password", "username"]
    );
}

#[test]
fn client_results_merge_into_state() {
    let h = Harness::new(ValidationConfig::default().with_debounce_delay(Duration::from_millis(40)));

    h.orchestrator
        .handle_client_result(
            "email",
            ClientValidationResult::failed("x", vec!["invalid email".into()]),
        )
        .unwrap();
    assert_eq!(h.orchestrator.field_errors("email"), ["invalid email"]);
    assert!(h.calls_for("email").is_empty());

    let outcome = h
        .orchestrator
        .handle_client_result("username", ClientValidationResult::passed("taken"))
        .unwrap();
    assert_eq!(outcome, TriggerOutcome::Scheduled);
    assert!(wait_until(SETTLE, || {
        h.orchestrator.status("username") == ValidationStatus::Invalid
    }));
}

#[test]
fn listeners_see_every_transition_in_order() {
    let h = Harness::new(ValidationConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.orchestrator
        .events()
        .add_listener("email", move |e: &ValidationEvent| {
            sink.lock().unwrap().push((e.kind(), e.errors().to_vec()));
        });

    h.orchestrator.on_field_change("email", "".into()).unwrap();
    h.orchestrator.on_field_change("email", "a@b.c".into()).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        [
            (EventKind::Start, Vec::<String>::new()),
            (EventKind::Error, vec!["required".to_string()]),
            (EventKind::Start, Vec::new()),
            (EventKind::Success, Vec::new()),
        ]
    );
}

#[test]
fn drop_cancels_pending_work() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    {
        let orchestrator = Orchestrator::new(signup_schema())
            .with_evaluator(recording_evaluator(Arc::clone(&calls)))
            .with_config(ValidationConfig::default().with_debounce_delay(Duration::from_millis(50)));
        orchestrator.on_field_change("username", "bob".into()).unwrap();
    }
    thread::sleep(Duration::from_millis(200));
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn validation_context_for_renderers() {
    let h = Harness::new(ValidationConfig::default().with_flag(
        fieldflow_core::BehaviorFlags::SHOW_ERRORS_ONLY_ON_BLUR,
        true,
    ));
    h.orchestrator.on_field_change("email", "".into()).unwrap();

    let ctx = h.orchestrator.validation_context("email").unwrap();
    assert_eq!(ctx.status, ValidationStatus::Invalid);
    assert!(ctx.errors_deferred);
    assert!(!ctx.should_show_errors());
    assert!(ctx.last_validated_at.is_some());

    let ctx = h.orchestrator.validation_context("username").unwrap();
    assert!(ctx.has_async_validation);
    assert_eq!(ctx.debounce, Duration::from_millis(300));

    assert!(h.orchestrator.validation_context("ghost").is_err());
}
