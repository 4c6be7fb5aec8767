use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing::{info, warn};

use crate::engine::types::{Scenario, WebhookData};

/// Default request timeout for webhook lookups, in seconds.
pub const DEFAULT_WEBHOOK_TIMEOUT_S: f64 = 10.0;

/// Where a run's placeholder data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSource {
    /// Previously fetched data cached on the scenario.
    Cached(WebhookData),
    /// Freshly fetched; the caller should cache it on the scenario.
    Fetched(WebhookData),
    /// No webhook configured, or the fetch failed.
    Unavailable,
}

impl VariableSource {
    pub fn data(&self) -> Option<&WebhookData> {
        match self {
            VariableSource::Cached(d) | VariableSource::Fetched(d) => Some(d),
            VariableSource::Unavailable => None,
        }
    }

    pub fn into_data(self) -> Option<WebhookData> {
        match self {
            VariableSource::Cached(d) | VariableSource::Fetched(d) => Some(d),
            VariableSource::Unavailable => None,
        }
    }
}

/// Flatten a webhook response into display strings.
///
/// Object members (or array elements, keyed by index) become entries;
/// strings are taken verbatim, nulls are skipped, everything else is
/// rendered as JSON text. Scalars at the top level yield no data.
pub fn coerce_payload(payload: &serde_json::Value) -> WebhookData {
    let entries: Vec<(String, &serde_json::Value)> = match payload {
        serde_json::Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s.clone())),
            other => Some((key, other.to_string())),
        })
        .collect()
}

/// Fetches placeholder data from a scenario's webhook.
#[derive(Clone)]
pub struct WebhookFetcher {
    client: reqwest::Client,
}

impl WebhookFetcher {
    pub fn new(timeout_s: f64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(timeout_s))
            .build()?;
        Ok(Self { client })
    }

    /// One GET to `url`, expecting a JSON object.
    pub async fn fetch(&self, url: &str) -> Result<WebhookData> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Webhook request failed: {}", url))?
            .error_for_status()?;

        let payload: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("Webhook returned invalid JSON: {}", url))?;

        Ok(coerce_payload(&payload))
    }

    /// Resolve the data for a new run. Cached data wins; otherwise the
    /// webhook is called once. Failures are logged and degrade to no data.
    pub async fn load_variables(&self, scenario: &Scenario) -> VariableSource {
        if let Some(ref cached) = scenario.webhook_data {
            return VariableSource::Cached(cached.clone());
        }

        let Some(url) = scenario.webhook_url.as_deref().filter(|u| !u.is_empty()) else {
            return VariableSource::Unavailable;
        };

        match self.fetch(url).await {
            Ok(data) => {
                info!(scenario = %scenario.id, keys = data.len(), "Loaded webhook data");
                VariableSource::Fetched(data)
            }
            Err(e) => {
                warn!(
                    scenario = %scenario.id,
                    url = %url,
                    error = %format!("{:#}", e),
                    "Webhook fetch failed; placeholders stay unresolved"
                );
                VariableSource::Unavailable
            }
        }
    }
}
