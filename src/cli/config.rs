use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Deserialize;

/// Picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "callscript.yaml";

/// Settings read from `callscript.yaml`. Any key may be left out; flags and
/// env vars override whatever is set here.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CallScriptConfig {
    /// Directory holding the scenario, result and stats documents.
    pub store_dir: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Request body cap for the REST server, in bytes.
    pub max_body: Option<usize>,
    /// Webhook request timeout in seconds.
    pub webhook_timeout_s: Option<f64>,
    /// Number of calls shown in the recent list of a stats report.
    pub recent_limit: Option<usize>,
}

impl CallScriptConfig {
    /// An explicit `path` has to exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// is read when present and every setting is left unset otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_path = match path {
            Some(p) if !p.exists() => anyhow::bail!("Config file not found: {}", p.display()),
            Some(p) => p.to_path_buf(),
            None => {
                let auto = Path::new(DEFAULT_CONFIG_FILE);
                if !auto.exists() {
                    return Ok(Self::default());
                }
                auto.to_path_buf()
            }
        };

        let contents = std::fs::read_to_string(&file_path)
            .with_context(|| format!("Failed to read config file: {}", file_path.display()))?;

        serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", file_path.display()))
    }
}
