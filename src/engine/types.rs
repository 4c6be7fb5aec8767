use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel `nextStep` value that terminates a call.
pub const END_STEP: &str = "end";

/// Flat key-value payload fetched from a scenario's webhook.
pub type WebhookData = BTreeMap<String, String>;

/// A labeled edge from a step to another step or to termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOption {
    pub text: String,
    /// Target step id, [`END_STEP`], or empty when not wired yet.
    #[serde(default)]
    pub next_step: String,
}

impl StepOption {
    pub fn new(text: impl Into<String>, next_step: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            next_step: next_step.into(),
        }
    }

    pub fn is_end(&self) -> bool {
        self.next_step == END_STEP
    }

    pub fn is_unset(&self) -> bool {
        self.next_step.is_empty()
    }
}

/// One prompt node in the scenario graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub options: Vec<StepOption>,
}

impl Step {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, text: impl Into<String>, next_step: impl Into<String>) -> Self {
        self.options.push(StepOption::new(text, next_step));
        self
    }
}

/// A named call script: an ordered arena of steps linked by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_data: Option<WebhookData>,
}

impl Scenario {
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            webhook_url: None,
            steps,
            created_at: Utc::now(),
            last_used: None,
            webhook_data: None,
        }
    }

    /// The implicit entry point.
    pub fn entry_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn has_step(&self, id: &str) -> bool {
        self.step(id).is_some()
    }
}

/// Terminal classification of a finished call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOutcome {
    Success,
    Rejection,
    Postponed,
    Other,
}

impl CallOutcome {
    pub const ALL: [CallOutcome; 4] = [
        CallOutcome::Success,
        CallOutcome::Rejection,
        CallOutcome::Postponed,
        CallOutcome::Other,
    ];

    /// Human-facing label used in reports and exports.
    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::Success => "Agreed",
            CallOutcome::Rejection => "Rejected",
            CallOutcome::Postponed => "Postponed",
            CallOutcome::Other => "Other",
        }
    }
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallOutcome::Success => write!(f, "success"),
            CallOutcome::Rejection => write!(f, "rejection"),
            CallOutcome::Postponed => write!(f, "postponed"),
            CallOutcome::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for CallOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(CallOutcome::Success),
            "rejection" => Ok(CallOutcome::Rejection),
            "postponed" => Ok(CallOutcome::Postponed),
            "other" => Ok(CallOutcome::Other),
            _ => Err(format!(
                "Invalid outcome '{}'. Use: success, rejection, postponed, other",
                s
            )),
        }
    }
}

/// Ephemeral state of one in-progress call.
///
/// `current_step_id` is empty once the call has been ended. While a run is
/// active `step_history` is never empty and starts with the entry step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub scenario_id: String,
    pub current_step_id: String,
    pub step_history: Vec<String>,
    #[serde(default)]
    pub notes: String,
    pub started_at: DateTime<Utc>,
}

impl RunState {
    pub fn is_terminated(&self) -> bool {
        self.current_step_id.is_empty()
    }

    /// Append free-form call notes on a new line.
    pub fn add_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }
}

/// Persisted, immutable record of a finished call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    pub id: String,
    pub scenario_id: String,
    pub result: CallOutcome,
    pub notes: String,
    pub step_history: Vec<String>,
    /// Milliseconds.
    pub duration: i64,
    pub timestamp: DateTime<Utc>,
}

/// Running per-scenario counters. `total` is always the sum of the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStats {
    pub total: u64,
    pub success: u64,
    pub rejection: u64,
    pub postponed: u64,
    pub other: u64,
}

impl ScenarioStats {
    pub fn record(&mut self, outcome: CallOutcome) {
        self.total += 1;
        match outcome {
            CallOutcome::Success => self.success += 1,
            CallOutcome::Rejection => self.rejection += 1,
            CallOutcome::Postponed => self.postponed += 1,
            CallOutcome::Other => self.other += 1,
        }
    }

    pub fn count(&self, outcome: CallOutcome) -> u64 {
        match outcome {
            CallOutcome::Success => self.success,
            CallOutcome::Rejection => self.rejection,
            CallOutcome::Postponed => self.postponed,
            CallOutcome::Other => self.other,
        }
    }
}
