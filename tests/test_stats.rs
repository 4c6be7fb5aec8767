//! Tests for derived statistics and the stats export.

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use callscript::engine::stats::*;
use callscript::engine::types::*;

fn stats(success: u64, rejection: u64, postponed: u64, other: u64) -> ScenarioStats {
    ScenarioStats {
        total: success + rejection + postponed + other,
        success,
        rejection,
        postponed,
        other,
    }
}

fn result(id: &str, outcome: CallOutcome, duration_ms: i64, offset_s: i64) -> CallResult {
    CallResult {
        id: id.to_string(),
        scenario_id: "s1".to_string(),
        result: outcome,
        notes: format!("notes {}", id),
        step_history: vec!["a".to_string()],
        duration: duration_ms,
        timestamp: Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap() + Duration::seconds(offset_s),
    }
}

#[test]
fn conversion_rate_cases() {
    assert_eq!(conversion_rate(&ScenarioStats::default()), 0);
    assert_eq!(conversion_rate(&stats(1, 3, 0, 0)), 25);
    assert_eq!(conversion_rate(&stats(2, 1, 0, 0)), 67);
}

#[test]
fn average_duration_rounds_minutes() {
    assert_eq!(average_duration_minutes(&[]), 0);

    let results = vec![
        result("c1", CallOutcome::Success, 60_000, 0),
        result("c2", CallOutcome::Success, 120_000, 1),
    ];
    // 1.5 minutes rounds up.
    assert_eq!(average_duration_minutes(&results), 2);

    let short = vec![result("c3", CallOutcome::Other, 20_000, 0)];
    assert_eq!(average_duration_minutes(&short), 0);
}

#[test]
fn distribution_without_calls() {
    assert_eq!(distribution(&ScenarioStats::default()), Distribution::NoData);
}

#[test]
fn distribution_rows_in_outcome_order() {
    let Distribution::Rows { rows } = distribution(&stats(1, 1, 1, 0)) else {
        panic!("expected rows");
    };

    let outcomes: Vec<CallOutcome> = rows.iter().map(|r| r.outcome).collect();
    assert_eq!(outcomes, CallOutcome::ALL.to_vec());

    let percentages: Vec<u32> = rows.iter().map(|r| r.percentage).collect();
    assert_eq!(percentages, vec![33, 33, 33, 0]);
    assert_eq!(rows[0].label, "Agreed");
    assert_eq!(rows[3].count, 0);
}

#[test]
fn recent_results_newest_first() {
    let results = vec![
        result("old", CallOutcome::Success, 0, 0),
        result("new", CallOutcome::Success, 0, 60),
        result("mid", CallOutcome::Success, 0, 30),
    ];

    let ids: Vec<String> = recent_results(&results, 2)
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["new", "mid"]);
}

#[test]
fn recent_results_tie_keeps_log_order() {
    let results = vec![
        result("first", CallOutcome::Success, 0, 10),
        result("second", CallOutcome::Rejection, 0, 10),
    ];

    let ids: Vec<String> = recent_results(&results, 10)
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["first", "second"]);
}

#[test]
fn report_for_unused_scenario() {
    let scenario = Scenario::new("s1", "Sales", vec![Step::new("a", "A", "")]);
    let report = build_report(&scenario, None, &[], DEFAULT_RECENT_LIMIT);

    assert_eq!(report.scenario_name, "Sales");
    assert_eq!(report.stats, ScenarioStats::default());
    assert_eq!(report.conversion_rate, 0);
    assert_eq!(report.average_duration_minutes, 0);
    assert_eq!(report.distribution, Distribution::NoData);
    assert!(report.recent.is_empty());
}

#[test]
fn report_limits_recent_list() {
    let scenario = Scenario::new("s1", "Sales", vec![Step::new("a", "A", "")]);
    let results: Vec<CallResult> = (0..15)
        .map(|i| result(&format!("c{}", i), CallOutcome::Success, 60_000, i))
        .collect();

    let report = build_report(&scenario, Some(stats(15, 0, 0, 0)), &results, 10);
    assert_eq!(report.recent.len(), 10);
    assert_eq!(report.recent[0].id, "c14");
    assert_eq!(report.conversion_rate, 100);
    assert_eq!(report.average_duration_minutes, 1);
}

#[test]
fn export_formats_rows() {
    let scenario = Scenario::new("s1", "Sales", vec![Step::new("a", "A", "")]);
    let results = vec![result("c1", CallOutcome::Postponed, 150_000, 5)];

    let export = export_stats(&scenario, Some(stats(0, 0, 1, 0)), &results);
    assert_eq!(export.scenario, "Sales");
    assert_eq!(export.stats.postponed, 1);
    assert_eq!(
        export.results,
        vec![ExportedResult {
            date: "04.05.2026".to_string(),
            time: "09:30:05".to_string(),
            result: "Postponed".to_string(),
            duration: 3,
            notes: "notes c1".to_string(),
        }]
    );

    let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
    assert_eq!(
        export_file_name(&scenario, date),
        "stats-Sales-2026-10-15.json"
    );
}
