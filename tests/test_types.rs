//! Tests for the scenario data model and its JSON shape.

use callscript::engine::types::*;

#[test]
fn scenario_serializes_camel_case() {
    let mut scenario = Scenario::new(
        "s1",
        "Sales",
        vec![Step::new("a", "Greeting", "Hi").with_option("Next", END_STEP)],
    );
    scenario.webhook_url = Some("http://localhost/hook".to_string());

    let json = serde_json::to_value(&scenario).unwrap();
    assert_eq!(json["webhookUrl"], "http://localhost/hook");
    assert!(json.get("createdAt").is_some());
    assert!(json.get("lastUsed").is_none());
    assert!(json.get("webhookData").is_none());
    assert_eq!(json["steps"][0]["options"][0]["nextStep"], "end");
}

#[test]
fn scenario_deserializes_with_defaults() {
    let json = r#"{
        "id": "s1",
        "name": "Minimal",
        "steps": [{ "id": "a", "title": "Only", "options": [{ "text": "Bye" }] }]
    }"#;

    let scenario: Scenario = serde_json::from_str(json).unwrap();
    assert_eq!(scenario.description, "");
    assert!(scenario.webhook_url.is_none());
    assert!(scenario.last_used.is_none());
    assert_eq!(scenario.steps[0].content, "");
    assert!(scenario.steps[0].options[0].is_unset());
}

#[test]
fn entry_step_is_first_in_order() {
    let scenario = Scenario::new(
        "s1",
        "Order",
        vec![
            Step::new("z", "Last letter", ""),
            Step::new("a", "First letter", ""),
        ],
    );
    assert_eq!(scenario.entry_step().unwrap().id, "z");
    assert_eq!(scenario.step_index("a"), Some(1));
    assert!(!scenario.has_step("end"));
}

#[test]
fn step_option_end_and_unset() {
    assert!(StepOption::new("Bye", END_STEP).is_end());
    assert!(StepOption::new("Later", "").is_unset());
    let wired = StepOption::new("Go", "b");
    assert!(!wired.is_end());
    assert!(!wired.is_unset());
}

#[test]
fn call_outcome_display_and_parse() {
    for outcome in CallOutcome::ALL {
        let parsed: CallOutcome = outcome.to_string().parse().unwrap();
        assert_eq!(parsed, outcome);
    }
    assert_eq!(" Success ".parse::<CallOutcome>(), Ok(CallOutcome::Success));

    let err = "maybe".parse::<CallOutcome>().unwrap_err();
    assert!(err.contains("success, rejection, postponed, other"));
}

#[test]
fn call_outcome_serde_lowercase() {
    assert_eq!(
        serde_json::to_string(&CallOutcome::Postponed).unwrap(),
        "\"postponed\""
    );
    let outcome: CallOutcome = serde_json::from_str("\"rejection\"").unwrap();
    assert_eq!(outcome, CallOutcome::Rejection);
    assert_eq!(CallOutcome::Success.label(), "Agreed");
}

#[test]
fn stats_record_keeps_total_in_sync() {
    let mut stats = ScenarioStats::default();
    stats.record(CallOutcome::Success);
    stats.record(CallOutcome::Other);
    stats.record(CallOutcome::Success);

    assert_eq!(stats.total, 3);
    assert_eq!(stats.count(CallOutcome::Success), 2);
    assert_eq!(stats.count(CallOutcome::Other), 1);
    assert_eq!(
        stats.total,
        CallOutcome::ALL.iter().map(|&o| stats.count(o)).sum::<u64>()
    );
}

#[test]
fn run_state_add_note_joins_lines() {
    let mut state = RunState {
        scenario_id: "s1".to_string(),
        current_step_id: "a".to_string(),
        step_history: vec!["a".to_string()],
        notes: String::new(),
        started_at: chrono::Utc::now(),
    };
    state.add_note("asked for a discount");
    state.add_note("call back Friday");
    assert_eq!(state.notes, "asked for a discount\ncall back Friday");
    assert!(!state.is_terminated());
}
