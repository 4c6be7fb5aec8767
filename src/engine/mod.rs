pub mod catalog;
pub mod editor;
pub mod error;
pub mod interpolate;
pub mod outcome;
pub mod runner;
pub mod stats;
pub mod traversal;
pub mod types;
pub mod webhook;

pub use catalog::{ScenarioCatalog, ScenarioDraft};
pub use error::EngineError;
pub use outcome::OutcomeRecorder;
pub use runner::{CallRunner, CallStart};
pub use traversal::{Prompt, RunStatus, StepMark, Transition, TraversalEngine};
pub use webhook::WebhookFetcher;
