/// Errors surfaced by engine operations.
///
/// Traversal itself never fails once a run has started; unresolvable steps
/// are reported through [`crate::engine::traversal::RunStatus::NotFound`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The scenario cannot be run (e.g. it has no steps).
    #[error("invalid scenario '{0}': it has no steps")]
    InvalidScenario(String),

    /// An outcome was recorded before a classification was chosen.
    #[error("select a call outcome before saving")]
    MissingClassification,

    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),

    /// Operator input was rejected; nothing was written.
    #[error("{0}")]
    Validation(String),

    /// An import payload was malformed and rejected as a whole.
    #[error("import rejected: {0}")]
    Import(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
