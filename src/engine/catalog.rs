use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::editor::new_step_id;
use crate::engine::error::EngineError;
use crate::engine::types::*;
use crate::storage::repository::ScenarioRepository;

/// Turn a scenario name into an id: lower-case, whitespace runs become `-`,
/// anything outside `[a-z0-9-]` is dropped. Falls back to `scenario` when
/// nothing is left.
pub fn slugify(name: &str) -> String {
    let dashed = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");

    let slug: String = dashed
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();

    if slug.is_empty() {
        "scenario".to_string()
    } else {
        slug
    }
}

/// `base`, or `base-2`, `base-3`, … whichever is not taken yet.
pub fn unique_id(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Case-insensitive match on name or description. An empty term matches all.
pub fn matches_search(scenario: &Scenario, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    term.is_empty()
        || scenario.name.to_lowercase().contains(&term)
        || scenario.description.to_lowercase().contains(&term)
}

/// Operator-entered scenario fields, before normalisation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl ScenarioDraft {
    /// Trim fields, drop blank options and steps that end up with no title or
    /// no options. Fails without side effects when the name is blank or no
    /// step survives.
    pub fn normalize(self) -> Result<ScenarioDraft, EngineError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::Validation("scenario name is required".to_string()));
        }

        let webhook_url = self
            .webhook_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let steps: Vec<Step> = self
            .steps
            .into_iter()
            .filter_map(|step| {
                let title = step.title.trim().to_string();
                let options: Vec<StepOption> = step
                    .options
                    .into_iter()
                    .filter_map(|o| {
                        let text = o.text.trim().to_string();
                        (!text.is_empty()).then(|| StepOption::new(text, o.next_step))
                    })
                    .collect();

                if title.is_empty() || options.is_empty() {
                    return None;
                }

                let id = if step.id.trim().is_empty() {
                    new_step_id()
                } else {
                    step.id
                };

                Some(Step {
                    id,
                    title,
                    content: step.content.trim().to_string(),
                    options,
                })
            })
            .collect();

        if steps.is_empty() {
            return Err(EngineError::Validation("add at least one step".to_string()));
        }
        if let Some(id) = duplicate_step_id(&steps) {
            return Err(EngineError::Validation(format!(
                "step id '{}' is used more than once",
                id
            )));
        }

        Ok(ScenarioDraft {
            name,
            description: self.description.trim().to_string(),
            webhook_url,
            steps,
        })
    }
}

/// First step id that appears twice, if any.
pub fn duplicate_step_id(steps: &[Step]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(steps.len());
    steps
        .iter()
        .map(|s| s.id.as_str())
        .find(|id| !seen.insert(*id))
}

/// Parse an import payload: a JSON array of scenario documents, each with
/// at least one step and distinct step ids. Any problem rejects the whole
/// payload.
pub fn parse_import(json: &str) -> Result<Vec<Scenario>, EngineError> {
    let scenarios: Vec<Scenario> =
        serde_json::from_str(json).map_err(|e| EngineError::Import(e.to_string()))?;

    for scenario in &scenarios {
        if scenario.steps.is_empty() {
            return Err(EngineError::Import(format!(
                "scenario '{}' has no steps",
                scenario.name
            )));
        }
        if let Some(id) = duplicate_step_id(&scenario.steps) {
            return Err(EngineError::Import(format!(
                "scenario '{}' uses step id '{}' more than once",
                scenario.name, id
            )));
        }
    }

    Ok(scenarios)
}

/// Scenario CRUD over the repository.
#[derive(Clone)]
pub struct ScenarioCatalog {
    repo: ScenarioRepository,
}

impl ScenarioCatalog {
    pub fn new(repo: ScenarioRepository) -> Self {
        Self { repo }
    }

    /// Write the demo scenarios when nothing was ever stored. Returns whether
    /// seeding happened.
    pub async fn ensure_seeded(&self) -> Result<bool, EngineError> {
        if self.repo.has_scenarios().await? {
            return Ok(false);
        }
        self.repo.save_scenarios(&demo_scenarios()).await?;
        info!("Seeded demo scenarios");
        Ok(true)
    }

    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Scenario>, EngineError> {
        let scenarios = self.repo.scenarios().await?;
        Ok(match search {
            Some(term) => scenarios
                .into_iter()
                .filter(|s| matches_search(s, term))
                .collect(),
            None => scenarios,
        })
    }

    pub async fn get(&self, id: &str) -> Result<Scenario, EngineError> {
        self.repo
            .find_scenario(id)
            .await?
            .ok_or_else(|| EngineError::ScenarioNotFound(id.to_string()))
    }

    pub async fn create(&self, draft: ScenarioDraft) -> Result<Scenario, EngineError> {
        let draft = draft.normalize()?;
        let mut scenarios = self.repo.scenarios().await?;
        let taken: HashSet<String> = scenarios.iter().map(|s| s.id.clone()).collect();

        let scenario = Scenario {
            id: unique_id(&slugify(&draft.name), &taken),
            name: draft.name,
            description: draft.description,
            webhook_url: draft.webhook_url,
            steps: draft.steps,
            created_at: Utc::now(),
            last_used: None,
            webhook_data: None,
        };

        scenarios.push(scenario.clone());
        self.repo.save_scenarios(&scenarios).await?;
        info!(scenario = %scenario.id, steps = scenario.steps.len(), "Scenario created");
        Ok(scenario)
    }

    /// Replace a scenario's editable fields. The id, creation time and last
    /// use are kept; cached webhook data survives only if the URL is unchanged.
    pub async fn update(&self, id: &str, draft: ScenarioDraft) -> Result<Scenario, EngineError> {
        let draft = draft.normalize()?;
        let mut scenarios = self.repo.scenarios().await?;
        let stored = scenarios
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| EngineError::ScenarioNotFound(id.to_string()))?;

        if stored.webhook_url != draft.webhook_url {
            stored.webhook_data = None;
        }
        stored.name = draft.name;
        stored.description = draft.description;
        stored.webhook_url = draft.webhook_url;
        stored.steps = draft.steps;

        let updated = stored.clone();
        self.repo.save_scenarios(&scenarios).await?;
        info!(scenario = %id, "Scenario updated");
        Ok(updated)
    }

    /// Store a scenario edited step by step. Unlike [`update`](Self::update)
    /// this writes the document as given.
    pub async fn save(&self, scenario: &Scenario) -> Result<(), EngineError> {
        if !self.repo.replace_scenario(scenario).await? {
            return Err(EngineError::ScenarioNotFound(scenario.id.clone()));
        }
        Ok(())
    }

    /// Load a scenario, apply one editor operation and store the result.
    /// Nothing is written when the operation fails.
    pub async fn edit<T, F>(&self, id: &str, op: F) -> Result<(Scenario, T), EngineError>
    where
        F: FnOnce(&mut Scenario) -> Result<T, EngineError>,
    {
        let mut scenario = self.get(id).await?;
        let out = op(&mut scenario)?;
        self.save(&scenario).await?;
        info!(scenario = %id, steps = scenario.steps.len(), "Scenario edited");
        Ok((scenario, out))
    }

    /// Returns `false` when there was nothing to delete.
    pub async fn delete(&self, id: &str) -> Result<bool, EngineError> {
        let mut scenarios = self.repo.scenarios().await?;
        let before = scenarios.len();
        scenarios.retain(|s| s.id != id);
        if scenarios.len() == before {
            return Ok(false);
        }
        self.repo.save_scenarios(&scenarios).await?;
        info!(scenario = %id, "Scenario deleted");
        Ok(true)
    }

    pub async fn export(&self) -> Result<String, EngineError> {
        let scenarios = self.repo.scenarios().await?;
        serde_json::to_string_pretty(&scenarios).map_err(|e| EngineError::Storage(e.into()))
    }

    /// Append imported scenarios. Blank ids are derived from the name; ids
    /// that collide with stored (or earlier imported) ones get a numeric
    /// suffix.
    pub async fn import(&self, json: &str) -> Result<Vec<Scenario>, EngineError> {
        let incoming = parse_import(json)?;
        let mut scenarios = self.repo.scenarios().await?;
        let mut taken: HashSet<String> = scenarios.iter().map(|s| s.id.clone()).collect();

        let mut imported = Vec::with_capacity(incoming.len());
        for mut scenario in incoming {
            let base = match scenario.id.trim() {
                "" => slugify(&scenario.name),
                id => id.to_string(),
            };
            scenario.id = unique_id(&base, &taken);
            taken.insert(scenario.id.clone());
            imported.push(scenario);
        }

        scenarios.extend(imported.iter().cloned());
        self.repo.save_scenarios(&scenarios).await?;
        info!(count = imported.len(), "Scenarios imported");
        Ok(imported)
    }
}

/// The sales script seeded on first use.
pub fn demo_scenarios() -> Vec<Scenario> {
    let steps = vec![
        Step::new(
            "step-1",
            "Greeting",
            "Hello! My name is [NAME], calling from [COMPANY]. Do you have a minute?",
        )
        .with_option("Yes, go ahead", "step-2")
        .with_option("No time", "step-busy")
        .with_option("Not interested", "step-objection"),
        Step::new(
            "step-2",
            "Service pitch",
            "We offer [SERVICE], which will help you [BENEFIT]. It only takes a few minutes.",
        )
        .with_option("Tell me more", "step-details")
        .with_option("How much is it?", "step-price")
        .with_option("Not a fit", "step-objection")
        .with_option("We already have a supplier", "step-competitor"),
        Step::new(
            "step-busy",
            "Client is busy",
            "I understand you are busy. When would be a good time to call back?",
        )
        .with_option("Time agreed", "step-callback")
        .with_option("Declined", END_STEP),
        Step::new(
            "step-objection",
            "Handling objections",
            "I understand your doubts. Let me explain why this could be useful for you.",
        )
        .with_option("Willing to listen", "step-2")
        .with_option("Still not interested", END_STEP),
        Step::new(
            "step-competitor",
            "Competitor supplier",
            "I understand you have a supplier. What if we offered better terms?",
        )
        .with_option("What terms?", "step-benefits")
        .with_option("We are happy with our supplier", "step-objection"),
        Step::new(
            "step-benefits",
            "Service benefits",
            "Our main advantages: quality, speed, reliability.",
        )
        .with_option("Sounds interesting", "step-price")
        .with_option("Need to think", "step-callback"),
        Step::new(
            "step-details",
            "Service details",
            "The service covers the full scope of work. We have worked with companies like yours for 5 years.",
        )
        .with_option("Sounds interesting", "step-price")
        .with_option("Need to think", "step-callback"),
        Step::new(
            "step-price",
            "Pricing",
            "The service costs 50,000. For companies of your size we offer special terms.",
        )
        .with_option("Acceptable", "step-close")
        .with_option("Too expensive", "step-discount")
        .with_option("Need to discuss with management", "step-callback"),
        Step::new(
            "step-discount",
            "Discount offer",
            "I understand your concerns about the price. We can offer 15% off if you sign today.",
        )
        .with_option("Agreed", "step-close")
        .with_option("Still too expensive", "step-callback"),
        Step::new(
            "step-close",
            "Closing",
            "Great! Let's prepare the contract. When would suit you to meet and sign?",
        )
        .with_option("Meeting arranged", END_STEP)
        .with_option("Changed their mind", "step-objection"),
        Step::new(
            "step-callback",
            "Scheduling a callback",
            "Fine, I understand you need time. When should I call you back?",
        )
        .with_option("Time agreed", END_STEP)
        .with_option("Do not call again", END_STEP),
    ];

    let mut scenario = Scenario::new("demo-sales", "Service sales", steps);
    scenario.description =
        "Extended script for selling the company's services, with objection handling".to_string();
    vec![scenario]
}
