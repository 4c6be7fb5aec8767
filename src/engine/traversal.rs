//! Walks a scenario's step graph.
//!
//! Run state is an explicit [`RunState`] value: every operation takes the
//! current state and hands back the next one, so independent runs never
//! share anything. Edges are symbolic `nextStep` ids resolved on each
//! lookup; cycles and dangling targets are both legal.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::engine::error::EngineError;
use crate::engine::interpolate::resolve_placeholders;
use crate::engine::types::*;

/// Where a run currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stepId", rename_all = "camelCase")]
pub enum RunStatus {
    Active(String),
    Terminated,
    /// The current id names no step in the scenario.
    NotFound(String),
}

/// Result of moving along an edge or jumping to a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The run continues; render the next prompt.
    Moved(RunState),
    /// The call was ended; outcome recording must begin.
    Ended(RunState),
}

impl Transition {
    pub fn state(&self) -> &RunState {
        match self {
            Transition::Moved(s) | Transition::Ended(s) => s,
        }
    }

    pub fn into_state(self) -> RunState {
        match self {
            Transition::Moved(s) | Transition::Ended(s) => s,
        }
    }

    pub fn needs_outcome(&self) -> bool {
        matches!(self, Transition::Ended(_))
    }
}

/// What the operator should see for the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Prompt {
    #[serde(rename_all = "camelCase")]
    Step {
        step_id: String,
        title: String,
        /// Content with placeholders substituted.
        content: String,
        options: Vec<StepOption>,
        can_go_back: bool,
    },
    Terminated,
    #[serde(rename_all = "camelCase")]
    NotFound { step_id: String },
}

/// Sidebar marker for one step of the scenario map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMark {
    Current,
    Visited,
    Pending,
}

/// Traversal over one scenario. Borrowing the scenario keeps the engine
/// itself stateless.
pub struct TraversalEngine<'a> {
    scenario: &'a Scenario,
}

impl<'a> TraversalEngine<'a> {
    pub fn new(scenario: &'a Scenario) -> Self {
        Self { scenario }
    }

    pub fn scenario(&self) -> &Scenario {
        self.scenario
    }

    /// Start a run at the entry step.
    pub fn start(&self) -> Result<RunState, EngineError> {
        self.start_at(Utc::now())
    }

    pub fn start_at(&self, started_at: DateTime<Utc>) -> Result<RunState, EngineError> {
        let entry = self
            .scenario
            .entry_step()
            .ok_or_else(|| EngineError::InvalidScenario(self.scenario.id.clone()))?;

        debug!(scenario = %self.scenario.id, step = %entry.id, "Run started");

        Ok(RunState {
            scenario_id: self.scenario.id.clone(),
            current_step_id: entry.id.clone(),
            step_history: vec![entry.id.clone()],
            notes: String::new(),
            started_at,
        })
    }

    /// Follow an option edge. Revisits are appended to history; the target
    /// is not validated. An unset target leaves the state unchanged.
    pub fn select_option(&self, mut state: RunState, next_step: &str) -> Transition {
        if next_step.is_empty() {
            return Transition::Moved(state);
        }
        if next_step == END_STEP {
            state.current_step_id.clear();
            return Transition::Ended(state);
        }

        state.step_history.push(next_step.to_string());
        state.current_step_id = next_step.to_string();
        Transition::Moved(state)
    }

    /// Direct navigation from the map, ignoring graph edges. History only
    /// grows when the step has not been visited yet.
    pub fn jump_to_step(&self, mut state: RunState, step_id: &str) -> Transition {
        if step_id.is_empty() {
            return Transition::Moved(state);
        }
        if step_id == END_STEP {
            state.current_step_id.clear();
            return Transition::Ended(state);
        }

        if !state.step_history.iter().any(|s| s == step_id) {
            state.step_history.push(step_id.to_string());
        }
        state.current_step_id = step_id.to_string();
        Transition::Moved(state)
    }

    /// LIFO undo. A no-op while only the entry step is in history.
    pub fn go_back(&self, mut state: RunState) -> RunState {
        if state.step_history.len() <= 1 {
            return state;
        }

        state.step_history.pop();
        if let Some(prev) = state.step_history.last() {
            state.current_step_id = prev.clone();
        }
        state
    }

    /// Restart from the entry step, clearing notes and history.
    pub fn reset(&self, _state: RunState) -> Result<RunState, EngineError> {
        self.start()
    }

    pub fn status(&self, state: &RunState) -> RunStatus {
        if state.is_terminated() {
            return RunStatus::Terminated;
        }

        if self.scenario.has_step(&state.current_step_id) {
            RunStatus::Active(state.current_step_id.clone())
        } else {
            RunStatus::NotFound(state.current_step_id.clone())
        }
    }

    /// Percentage of distinct visited ids over the number of steps, rounded
    /// to the nearest integer. Ids that are not steps still count, so this
    /// can exceed 100.
    pub fn progress(&self, state: &RunState) -> u32 {
        let total = self.scenario.steps.len();
        if total == 0 {
            return 0;
        }

        let visited: HashSet<&str> = state.step_history.iter().map(String::as_str).collect();
        (visited.len() as f64 / total as f64 * 100.0).round() as u32
    }

    /// The prompt for the current state, with content passed through the
    /// placeholder resolver.
    pub fn current_prompt(&self, state: &RunState, data: Option<&WebhookData>) -> Prompt {
        match self.status(state) {
            RunStatus::Terminated => Prompt::Terminated,
            RunStatus::NotFound(step_id) => Prompt::NotFound { step_id },
            RunStatus::Active(step_id) => match self.scenario.step(&step_id) {
                Some(step) => Prompt::Step {
                    step_id,
                    title: step.title.clone(),
                    content: resolve_placeholders(&step.content, data),
                    options: step.options.clone(),
                    can_go_back: state.step_history.len() > 1,
                },
                None => Prompt::NotFound { step_id },
            },
        }
    }

    /// Map markers in scenario order.
    pub fn step_marks(&self, state: &RunState) -> Vec<(&'a str, StepMark)> {
        self.scenario
            .steps
            .iter()
            .map(|step| {
                let mark = if step.id == state.current_step_id {
                    StepMark::Current
                } else if state.step_history.contains(&step.id) {
                    StepMark::Visited
                } else {
                    StepMark::Pending
                };
                (step.id.as_str(), mark)
            })
            .collect()
    }
}
