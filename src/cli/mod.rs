pub mod config;

pub use config::CallScriptConfig;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::info;

use crate::engine::catalog::ScenarioCatalog;
use crate::engine::editor::dangling_references;
use crate::engine::stats::{
    DEFAULT_RECENT_LIMIT, Distribution, StatsReport, export_file_name,
};
use crate::engine::traversal::{Prompt, StepMark, Transition, TraversalEngine};
use crate::engine::types::*;
use crate::engine::webhook::{DEFAULT_WEBHOOK_TIMEOUT_S, WebhookFetcher};
use crate::engine::{CallRunner, EngineError};
use crate::storage::json_store::JsonBlobStore;
use crate::storage::repository::ScenarioRepository;

const DEFAULT_STORE_DIR: &str = "data/store";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_BODY: usize = 1_048_576;

#[derive(Parser)]
#[command(name = "callscript", version, about = "Scripted call runner")]
pub struct Cli {
    /// Path to a .env file to load (default: auto-detect .env in cwd)
    #[arg(long, global = true)]
    dotenv: Option<PathBuf>,

    /// Path to a YAML config file (default: auto-detect callscript.yaml in cwd)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the scenario, result and stats documents
    #[arg(long, global = true, env = "CALLSCRIPT_STORE_DIR")]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List stored scenarios
    List {
        /// Only show scenarios whose name or description contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Print a scenario's steps and options
    Show {
        /// Scenario ID
        scenario_id: String,
    },

    /// Run a call interactively
    Run {
        /// Scenario ID
        scenario_id: String,
    },

    /// Show call statistics for a scenario
    Stats {
        /// Scenario ID
        scenario_id: String,

        /// Output format (table, json). JSON prints the stats export document.
        #[arg(long, default_value = "table")]
        format: String,

        /// Number of recent calls to list
        #[arg(long)]
        recent: Option<usize>,

        /// Write the stats export into this directory as stats-<name>-<date>.json
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Export all scenarios as a JSON array
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import scenarios from a JSON array file
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Delete a scenario
    Delete {
        /// Scenario ID
        scenario_id: String,
    },

    /// Report options pointing at steps that do not exist
    Check {
        /// Scenario ID
        scenario_id: String,
    },

    /// Write the demo scenarios if the store is empty
    Seed,

    /// Start the REST API server
    Serve {
        /// Host to bind to
        #[arg(long, env = "HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Maximum request body size in bytes (default: 1048576 = 1 MB)
        #[arg(long, env = "MAX_BODY")]
        max_body: Option<usize>,
    },
}

/// Values resolved from flags, env, config file and defaults, in that order.
struct Settings {
    store_dir: PathBuf,
    webhook_timeout_s: f64,
    recent_limit: usize,
    config: CallScriptConfig,
}

impl Settings {
    fn resolve(store_dir: Option<PathBuf>, config: CallScriptConfig) -> Self {
        let store_dir = store_dir
            .or_else(|| config.store_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));

        Self {
            store_dir,
            webhook_timeout_s: config
                .webhook_timeout_s
                .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_S),
            recent_limit: config.recent_limit.unwrap_or(DEFAULT_RECENT_LIMIT),
            config,
        }
    }

    fn repository(&self) -> ScenarioRepository {
        ScenarioRepository::new(Arc::new(JsonBlobStore::new(&self.store_dir)))
    }

    fn runner(&self) -> Result<CallRunner> {
        Ok(CallRunner::new(
            self.repository(),
            WebhookFetcher::new(self.webhook_timeout_s)?,
        ))
    }
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file
    load_dotenv(cli.dotenv.as_deref());

    let config = CallScriptConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(cli.store_dir, config);

    match cli.command {
        Commands::List { search, format } => cmd_list(&settings, search, format).await,
        Commands::Show { scenario_id } => cmd_show(&settings, &scenario_id).await,
        Commands::Run { scenario_id } => cmd_run(&settings, &scenario_id).await,
        Commands::Stats {
            scenario_id,
            format,
            recent,
            out,
        } => match out {
            Some(dir) => cmd_stats_export(&settings, &scenario_id, &dir).await,
            None => cmd_stats(&settings, &scenario_id, format, recent).await,
        },
        Commands::Export { out } => cmd_export(&settings, out).await,
        Commands::Import { file } => cmd_import(&settings, &file).await,
        Commands::Delete { scenario_id } => cmd_delete(&settings, &scenario_id).await,
        Commands::Check { scenario_id } => cmd_check(&settings, &scenario_id).await,
        Commands::Seed => cmd_seed(&settings).await,
        Commands::Serve {
            host,
            port,
            max_body,
        } => {
            let host = host
                .or_else(|| settings.config.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string());
            let port = port.or(settings.config.port).unwrap_or(DEFAULT_PORT);
            let max_body = max_body
                .or(settings.config.max_body)
                .unwrap_or(DEFAULT_MAX_BODY);

            crate::api::serve(
                &host,
                port,
                settings.runner()?,
                settings.recent_limit,
                max_body,
            )
            .await
        }
    }
}

/// Load environment variables from a .env file.
/// If an explicit path is given, load from that path (error if missing).
/// Otherwise, auto-detect .env in the current working directory (silently skip if absent).
fn load_dotenv(explicit_path: Option<&Path>) {
    match explicit_path {
        Some(path) => match dotenvy::from_path(path) {
            Ok(()) => info!("Loaded env from {}", path.display()),
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load dotenv file '{}': {}",
                    path.display(),
                    e
                );
            }
        },
        None => match dotenvy::dotenv() {
            Ok(path) => info!("Loaded env from {}", path.display()),
            Err(dotenvy::Error::Io(_)) => {}
            Err(e) => {
                eprintln!("Warning: Failed to parse .env file: {}", e);
            }
        },
    }
}

async fn cmd_list(settings: &Settings, search: Option<String>, format: String) -> Result<()> {
    let catalog = ScenarioCatalog::new(settings.repository());
    catalog.ensure_seeded().await?;
    let scenarios = catalog.list(search.as_deref()).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&scenarios)?);
        return Ok(());
    }

    if scenarios.is_empty() {
        println!("No scenarios found.");
        return Ok(());
    }

    println!(
        "{:<24} {:<30} {:<6} {:<8} {:<12}",
        "ID", "NAME", "STEPS", "WEBHOOK", "LAST USED"
    );
    println!("{}", "-".repeat(84));

    for s in &scenarios {
        let last_used = s
            .last_used
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let webhook = if s.webhook_url.is_some() { "yes" } else { "-" };

        println!(
            "{:<24} {:<30} {:<6} {:<8} {:<12}",
            s.id,
            s.name,
            s.steps.len(),
            webhook,
            last_used
        );
    }

    println!("\nTotal: {} scenario(s)", scenarios.len());
    Ok(())
}

async fn cmd_show(settings: &Settings, scenario_id: &str) -> Result<()> {
    let scenario = ScenarioCatalog::new(settings.repository())
        .get(scenario_id)
        .await?;

    println!("Scenario: {} ({})", scenario.name, scenario.id);
    if !scenario.description.is_empty() {
        println!("{}", scenario.description);
    }
    if let Some(ref url) = scenario.webhook_url {
        println!("Webhook: {}", url);
    }

    println!("\nSteps:");
    for (i, step) in scenario.steps.iter().enumerate() {
        println!("  {}. {} [{}]", i + 1, step.title, step.id);
        for option in &step.options {
            let target = if option.is_unset() {
                "(unset)"
            } else {
                option.next_step.as_str()
            };
            println!("       - {} -> {}", option.text, target);
        }
    }

    Ok(())
}

/// One line of operator input during a call.
#[derive(Debug, PartialEq, Eq)]
enum RunCommand {
    Choose(usize),
    Back,
    Reset,
    Jump(String),
    Note(String),
    End,
    Quit,
    Unknown,
}

fn parse_run_command(input: &str) -> RunCommand {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        return RunCommand::Choose(n);
    }

    let (head, rest) = match input.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (input, ""),
    };

    match head {
        "b" | "back" => RunCommand::Back,
        "r" | "reset" => RunCommand::Reset,
        "e" | "end" => RunCommand::End,
        "q" | "quit" => RunCommand::Quit,
        "g" | "go" if !rest.is_empty() => RunCommand::Jump(rest.to_string()),
        "n" | "note" if !rest.is_empty() => RunCommand::Note(rest.to_string()),
        _ => RunCommand::Unknown,
    }
}

async fn prompt_line(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    Ok(lines.next_line().await?)
}

fn print_prompt(engine: &TraversalEngine<'_>, state: &RunState, variables: Option<&WebhookData>) {
    let marks = engine.step_marks(state);
    let visited = marks
        .iter()
        .filter(|(_, m)| *m != StepMark::Pending)
        .count();

    println!();
    match engine.current_prompt(state, variables) {
        Prompt::Step {
            title,
            content,
            options,
            can_go_back,
            ..
        } => {
            println!(
                "== {} ({}/{} steps, {}%)",
                title,
                visited,
                marks.len(),
                engine.progress(state)
            );
            println!("{}", content);
            println!();
            for (i, option) in options.iter().enumerate() {
                println!("  {}. {}", i + 1, option.text);
            }
            let back = if can_go_back { "b back, " } else { "" };
            println!("  [{}r reset, g <step> jump, n <text> note, e end, q quit]", back);
        }
        Prompt::NotFound { step_id } => {
            println!("Step '{}' not found.", step_id);
            println!("  [b back, r reset, g <step> jump, e end, q quit]");
        }
        Prompt::Terminated => println!("Call ended."),
    }
}

async fn cmd_run(settings: &Settings, scenario_id: &str) -> Result<()> {
    let runner = settings.runner()?;
    let start = runner.begin(scenario_id).await?;
    let scenario = start.scenario;
    let variables = start.variables;
    let engine = TraversalEngine::new(&scenario);
    let mut state = start.state;

    println!("Scenario: {} ({} steps)", scenario.name, scenario.steps.len());
    if scenario.webhook_url.is_some() && variables.is_none() {
        println!("Webhook data unavailable; placeholders are shown as written.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while !state.is_terminated() {
        print_prompt(&engine, &state, variables.as_ref());

        let Some(line) = prompt_line(&mut lines, "> ").await? else {
            println!("\nInput closed; call not saved.");
            return Ok(());
        };

        let transition = match parse_run_command(&line) {
            RunCommand::Choose(n) => {
                let target = scenario
                    .step(&state.current_step_id)
                    .and_then(|s| s.options.get(n.wrapping_sub(1)))
                    .map(|o| o.next_step.clone());
                match target {
                    Some(next) if next.is_empty() => {
                        println!("That option is not linked to a step yet.");
                        continue;
                    }
                    Some(next) => engine.select_option(state, &next),
                    None => {
                        println!("No option {}.", n);
                        continue;
                    }
                }
            }
            RunCommand::Back => Transition::Moved(engine.go_back(state)),
            RunCommand::Reset => Transition::Moved(engine.reset(state)?),
            RunCommand::Jump(step_id) => engine.jump_to_step(state, &step_id),
            RunCommand::Note(text) => {
                state.add_note(&text);
                continue;
            }
            RunCommand::End => engine.select_option(state, END_STEP),
            RunCommand::Quit => {
                println!("Call abandoned; nothing saved.");
                return Ok(());
            }
            RunCommand::Unknown => {
                println!("Unrecognised input.");
                continue;
            }
        };

        state = transition.into_state();
    }

    println!("\nCall ended. Outcome: 1 success, 2 rejection, 3 postponed, 4 other");
    let outcome = loop {
        let Some(line) = prompt_line(&mut lines, "outcome> ").await? else {
            println!("\nInput closed; call not saved.");
            return Ok(());
        };
        let choice = match line.trim() {
            "1" => Some(CallOutcome::Success),
            "2" => Some(CallOutcome::Rejection),
            "3" => Some(CallOutcome::Postponed),
            "4" => Some(CallOutcome::Other),
            other => other.parse().ok(),
        };
        match choice {
            Some(outcome) => break outcome,
            None => println!("{}", EngineError::MissingClassification),
        }
    };

    let notes = prompt_line(&mut lines, "outcome notes> ")
        .await?
        .unwrap_or_default();

    let result = runner
        .finish(&scenario.id, &state, Some(outcome), notes.trim())
        .await?;

    println!("\nSaved call {}", result.id);
    println!("Outcome: {}", result.result.label());
    println!("Duration: {}s", result.duration / 1000);
    println!("Path: {}", result.step_history.join(" -> "));
    Ok(())
}

fn print_report(report: &StatsReport) {
    println!("Scenario: {} ({})", report.scenario_name, report.scenario_id);
    println!("Total calls:      {}", report.stats.total);
    println!("Conversion rate:  {}%", report.conversion_rate);
    println!("Average duration: {} min", report.average_duration_minutes);

    println!("\nDistribution:");
    match &report.distribution {
        Distribution::NoData => println!("  no data"),
        Distribution::Rows { rows } => {
            for row in rows {
                println!("  {:<10} {:>5} ({}%)", row.label, row.count, row.percentage);
            }
        }
    }

    println!("\nRecent calls:");
    if report.recent.is_empty() {
        println!("  none");
    }
    for r in &report.recent {
        println!(
            "  {}  {:<10} {:>4} min  {}",
            r.timestamp.format("%Y-%m-%d %H:%M"),
            r.result.label(),
            (r.duration as f64 / 60_000.0).round() as i64,
            r.notes.lines().next().unwrap_or("")
        );
    }
}

async fn cmd_stats(
    settings: &Settings,
    scenario_id: &str,
    format: String,
    recent: Option<usize>,
) -> Result<()> {
    let runner = settings.runner()?;

    if format == "json" {
        let export = runner.export_stats(scenario_id).await?;
        println!("{}", serde_json::to_string_pretty(&export)?);
        return Ok(());
    }

    let report = runner
        .report(scenario_id, recent.unwrap_or(settings.recent_limit))
        .await?;
    print_report(&report);
    Ok(())
}

async fn cmd_stats_export(settings: &Settings, scenario_id: &str, dir: &Path) -> Result<()> {
    let scenario = ScenarioCatalog::new(settings.repository())
        .get(scenario_id)
        .await?;
    let export = settings.runner()?.export_stats(scenario_id).await?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(export_file_name(&scenario, Utc::now().date_naive()));
    tokio::fs::write(&path, serde_json::to_string_pretty(&export)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "Exported {} call(s) to {}",
        export.results.len(),
        path.display()
    );
    Ok(())
}

async fn cmd_export(settings: &Settings, out: Option<PathBuf>) -> Result<()> {
    let json = ScenarioCatalog::new(settings.repository()).export().await?;
    match out {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported scenarios to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn cmd_import(settings: &Settings, file: &Path) -> Result<()> {
    let json = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let imported = ScenarioCatalog::new(settings.repository())
        .import(&json)
        .await?;

    for s in &imported {
        println!("  + {} ({})", s.name, s.id);
    }
    println!("Imported {} scenario(s)", imported.len());
    Ok(())
}

async fn cmd_delete(settings: &Settings, scenario_id: &str) -> Result<()> {
    if ScenarioCatalog::new(settings.repository())
        .delete(scenario_id)
        .await?
    {
        println!("Deleted {}", scenario_id);
        Ok(())
    } else {
        Err(EngineError::ScenarioNotFound(scenario_id.to_string()).into())
    }
}

async fn cmd_check(settings: &Settings, scenario_id: &str) -> Result<()> {
    let scenario = ScenarioCatalog::new(settings.repository())
        .get(scenario_id)
        .await?;

    let dangling = dangling_references(&scenario);
    if dangling.is_empty() {
        println!("Check: OK ({} steps)", scenario.steps.len());
        return Ok(());
    }

    println!("Check: FAILED");
    for d in &dangling {
        println!(
            "  - step '{}' option {} points at missing step '{}'",
            d.step_id,
            d.option_index + 1,
            d.target
        );
    }
    anyhow::bail!("{} dangling reference(s) found", dangling.len());
}

async fn cmd_seed(settings: &Settings) -> Result<()> {
    if ScenarioCatalog::new(settings.repository())
        .ensure_seeded()
        .await?
    {
        println!("Demo scenarios written to {}", settings.store_dir.display());
    } else {
        println!("Store already has scenarios; nothing to do.");
    }
    Ok(())
}
