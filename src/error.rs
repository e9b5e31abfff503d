use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned by every stage of the cleaning pipeline.
///
/// This is a single error enum shared across ingestion, detection, processing, the quality gate
/// and the record sinks. None of these are retryable inside a run: the whole pass fails and the
/// caller decides whether to start again from the record source.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON read/write error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The rayon worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The input does not conform to the provided or inferred schema.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// The schema tree is malformed and cannot be walked (ambiguous paths, runaway depth).
    #[error("schema traversal failed at '{path}': {message}")]
    SchemaTraversal { path: String, message: String },

    /// Invalid configuration: unknown aggregate function, unknown column, bad option values.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Fewer top-level columns survived pruning than the configured minimum.
    #[error("only {surviving} column(s) survived null-like pruning, {required} required")]
    InsufficientColumns { required: usize, surviving: usize },

    /// The quality gate reported failing rules and the strategy is fail-on-error.
    #[error("quality gate '{context}' failed: {}", failed.join("; "))]
    QualityGate { context: String, failed: Vec<String> },
}

impl PipelineError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }
}
