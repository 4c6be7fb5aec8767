//! Derived metrics over counters and the results log. Nothing here mutates
//! stored data. All rounding is to the nearest integer.

use serde::{Deserialize, Serialize};

use crate::engine::types::*;

/// Default number of entries in the recent-calls list.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

const MS_PER_MINUTE: f64 = 60_000.0;

/// `round(part / total * 100)`, or 0 when `total` is 0.
pub fn percentage(part: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

/// Share of successful calls, in percent.
pub fn conversion_rate(stats: &ScenarioStats) -> u32 {
    percentage(stats.success, stats.total)
}

/// Mean call duration in whole minutes; 0 with no results.
pub fn average_duration_minutes(results: &[CallResult]) -> i64 {
    if results.is_empty() {
        return 0;
    }
    let total_ms: i64 = results.iter().map(|r| r.duration).sum();
    (total_ms as f64 / results.len() as f64 / MS_PER_MINUTE).round() as i64
}

fn duration_minutes(duration_ms: i64) -> i64 {
    (duration_ms as f64 / MS_PER_MINUTE).round() as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRow {
    pub outcome: CallOutcome,
    pub label: String,
    pub count: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Distribution {
    /// No calls recorded yet.
    NoData,
    Rows { rows: Vec<DistributionRow> },
}

pub fn distribution(stats: &ScenarioStats) -> Distribution {
    if stats.total == 0 {
        return Distribution::NoData;
    }

    let rows = CallOutcome::ALL
        .iter()
        .map(|&outcome| {
            let count = stats.count(outcome);
            DistributionRow {
                outcome,
                label: outcome.label().to_string(),
                count,
                percentage: percentage(count, stats.total),
            }
        })
        .collect();

    Distribution::Rows { rows }
}

/// The `n` newest results. Equal timestamps keep their log order.
pub fn recent_results(results: &[CallResult], n: usize) -> Vec<CallResult> {
    let mut sorted = results.to_vec();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted.truncate(n);
    sorted
}

/// Everything the statistics view shows for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub scenario_id: String,
    pub scenario_name: String,
    pub stats: ScenarioStats,
    pub conversion_rate: u32,
    pub average_duration_minutes: i64,
    pub distribution: Distribution,
    pub recent: Vec<CallResult>,
}

pub fn build_report(
    scenario: &Scenario,
    stats: Option<ScenarioStats>,
    results: &[CallResult],
    recent_limit: usize,
) -> StatsReport {
    let stats = stats.unwrap_or_default();
    StatsReport {
        scenario_id: scenario.id.clone(),
        scenario_name: scenario.name.clone(),
        stats,
        conversion_rate: conversion_rate(&stats),
        average_duration_minutes: average_duration_minutes(results),
        distribution: distribution(&stats),
        recent: recent_results(results, recent_limit),
    }
}

/// One row of the stats export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedResult {
    pub date: String,
    pub time: String,
    pub result: String,
    /// Whole minutes.
    pub duration: i64,
    pub notes: String,
}

/// The downloadable stats document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsExport {
    pub scenario: String,
    pub stats: ScenarioStats,
    pub results: Vec<ExportedResult>,
}

pub fn export_stats(
    scenario: &Scenario,
    stats: Option<ScenarioStats>,
    results: &[CallResult],
) -> StatsExport {
    StatsExport {
        scenario: scenario.name.clone(),
        stats: stats.unwrap_or_default(),
        results: results
            .iter()
            .map(|r| ExportedResult {
                date: r.timestamp.format("%d.%m.%Y").to_string(),
                time: r.timestamp.format("%H:%M:%S").to_string(),
                result: r.result.label().to_string(),
                duration: duration_minutes(r.duration),
                notes: r.notes.clone(),
            })
            .collect(),
    }
}

/// Suggested file name for a stats export, e.g. `stats-Sales-2026-10-15.json`.
pub fn export_file_name(scenario: &Scenario, date: chrono::NaiveDate) -> String {
    format!("stats-{}-{}.json", scenario.name, date.format("%Y-%m-%d"))
}
