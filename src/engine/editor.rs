//! Step-level editing of a scenario held in memory. Callers persist the
//! result with [`crate::engine::catalog::ScenarioCatalog::save`].

use serde::Serialize;
use uuid::Uuid;

use crate::engine::error::EngineError;
use crate::engine::types::*;

pub fn new_step_id() -> String {
    format!("step-{}", Uuid::new_v4().simple())
}

/// An option whose target is neither unset, `end`, nor a step id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingReference {
    pub step_id: String,
    pub option_index: usize,
    pub target: String,
}

/// Steps linked to one step, in scenario order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connections {
    pub incoming: Vec<String>,
    pub outgoing: Vec<String>,
}

fn step_mut<'a>(scenario: &'a mut Scenario, step_id: &str) -> Result<&'a mut Step, EngineError> {
    scenario
        .steps
        .iter_mut()
        .find(|s| s.id == step_id)
        .ok_or_else(|| EngineError::Validation(format!("unknown step '{}'", step_id)))
}

/// Append a blank step with a single unwired `Continue` option.
pub fn add_step(scenario: &mut Scenario) -> &Step {
    let step = Step::new(
        new_step_id(),
        format!("New step {}", scenario.steps.len() + 1),
        "",
    )
    .with_option("Continue", "");
    scenario.steps.push(step);
    &scenario.steps[scenario.steps.len() - 1]
}

/// Append a copy of a step under a fresh id.
pub fn duplicate_step(scenario: &mut Scenario, step_id: &str) -> Result<String, EngineError> {
    let source = scenario
        .step(step_id)
        .ok_or_else(|| EngineError::Validation(format!("unknown step '{}'", step_id)))?;

    let copy = Step {
        id: new_step_id(),
        title: format!("{} (copy)", source.title),
        content: source.content.clone(),
        options: source.options.clone(),
    };
    let id = copy.id.clone();
    scenario.steps.push(copy);
    Ok(id)
}

/// Move the step at `from` so that it ends up at index `to`. Moving a step to
/// position 0 makes it the entry step.
pub fn move_step(scenario: &mut Scenario, from: usize, to: usize) -> Result<(), EngineError> {
    let len = scenario.steps.len();
    if from >= len || to >= len {
        return Err(EngineError::Validation(format!(
            "step index out of range: {} -> {} (have {})",
            from, to, len
        )));
    }
    let step = scenario.steps.remove(from);
    scenario.steps.insert(to, step);
    Ok(())
}

/// Remove a step. Options elsewhere that pointed at it are left dangling.
pub fn remove_step(scenario: &mut Scenario, step_id: &str) -> Result<Step, EngineError> {
    let index = scenario
        .step_index(step_id)
        .ok_or_else(|| EngineError::Validation(format!("unknown step '{}'", step_id)))?;
    Ok(scenario.steps.remove(index))
}

pub fn add_option(scenario: &mut Scenario, step_id: &str) -> Result<usize, EngineError> {
    let step = step_mut(scenario, step_id)?;
    step.options.push(StepOption::new("", ""));
    Ok(step.options.len() - 1)
}

/// Remove an option; the last remaining option of a step cannot be removed.
pub fn remove_option(
    scenario: &mut Scenario,
    step_id: &str,
    index: usize,
) -> Result<StepOption, EngineError> {
    let step = step_mut(scenario, step_id)?;
    if step.options.len() <= 1 {
        return Err(EngineError::Validation(
            "a step needs at least one option".to_string(),
        ));
    }
    if index >= step.options.len() {
        return Err(EngineError::Validation(format!(
            "option index out of range: {}",
            index
        )));
    }
    Ok(step.options.remove(index))
}

pub fn connections(scenario: &Scenario, step_id: &str) -> Connections {
    let incoming = scenario
        .steps
        .iter()
        .filter(|s| s.options.iter().any(|o| o.next_step == step_id))
        .map(|s| s.id.clone())
        .collect();

    let outgoing = scenario
        .step(step_id)
        .map(|step| {
            step.options
                .iter()
                .filter(|o| scenario.has_step(&o.next_step))
                .map(|o| o.next_step.clone())
                .collect()
        })
        .unwrap_or_default();

    Connections { incoming, outgoing }
}

/// Every option target that does not resolve. Unset and `end` targets are
/// not reported.
pub fn dangling_references(scenario: &Scenario) -> Vec<DanglingReference> {
    scenario
        .steps
        .iter()
        .flat_map(|step| {
            step.options
                .iter()
                .enumerate()
                .filter(move |(_, o)| {
                    !o.is_unset() && !o.is_end() && !scenario.has_step(&o.next_step)
                })
                .map(move |(i, o)| DanglingReference {
                    step_id: step.id.clone(),
                    option_index: i,
                    target: o.next_step.clone(),
                })
        })
        .collect()
}
