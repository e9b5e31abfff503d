//! Unified ingestion entrypoint.
//!
//! Most callers should use [`read_from_path`], which ingests a file into an in-memory
//! [`crate::types::DataSet`], with an explicit [`crate::types::Schema`] or an inferred one.
//!
//! - If [`IngestionOptions::format`] is `None`, the ingestion format is inferred from the file
//!   extension.
//! - If a [`PipelineObserver`] is provided, rows read or the failure (with its severity) are
//!   reported to it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::observability::{report_failure, PipelineEvent, PipelineObserver, Severity, Stage};
use crate::types::{DataSet, Schema};

use super::csv::CsvOptions;
use super::{csv, json};

/// Supported ingestion formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// JSON array-of-objects, single object, or NDJSON.
    Json,
}

impl IngestionFormat {
    /// Parse an ingestion format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" | "ndjson" | "jsonl" => Some(Self::Json),
            _ => None,
        }
    }

    /// Infer the format from `path`'s extension.
    pub fn from_path(path: &Path) -> PipelineResult<Self> {
        let ext = path.extension().and_then(|s| s.to_str()).ok_or_else(|| {
            PipelineError::config(format!(
                "cannot infer format: path has no extension ({})",
                path.display()
            ))
        })?;

        Self::from_extension(ext).ok_or_else(|| {
            PipelineError::config(format!(
                "cannot infer format from extension '{ext}' for path ({})",
                path.display()
            ))
        })
    }
}

/// Options controlling unified ingestion behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// If `None`, auto-detect format from file extension.
    pub format: Option<IngestionFormat>,
    /// If `None`, the schema is inferred from the data.
    pub schema: Option<Schema>,
    /// CSV-specific options.
    pub csv: CsvOptions,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn PipelineObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: Severity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("format", &self.format)
            .field("schema_fields", &self.schema.as_ref().map(|s| s.fields.len()))
            .field("csv", &self.csv)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            format: None,
            schema: None,
            csv: CsvOptions::default(),
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }
}

/// Unified ingestion entry point for path-based sources.
///
/// When an observer is configured, this function reports:
///
/// - a [`PipelineEvent::RecordsRead`] event on success
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
///
/// # Examples
///
/// ## CSV (auto-detect by extension, inferred schema)
///
/// ```no_run
/// use ohlcv_clean::ingestion::{read_from_path, IngestionOptions};
///
/// # fn main() -> Result<(), ohlcv_clean::PipelineError> {
/// let ds = read_from_path("bars.csv", &IngestionOptions::default())?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
///
/// ## Force a format and pass a schema
///
/// ```no_run
/// use ohlcv_clean::ingestion::{read_from_path, IngestionFormat, IngestionOptions};
/// use ohlcv_clean::types::{DataType, Field, Schema};
///
/// # fn main() -> Result<(), ohlcv_clean::PipelineError> {
/// let opts = IngestionOptions {
///     format: Some(IngestionFormat::Json),
///     schema: Some(Schema::new(vec![
///         Field::new("open", DataType::Float64),
///         Field::record("meta", vec![Field::new("venue", DataType::Utf8)]),
///     ])),
///     ..Default::default()
/// };
///
/// // Useful when a file has no extension or you want to override inference.
/// let ds = read_from_path("bars_without_extension", &opts)?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
pub fn read_from_path(path: impl AsRef<Path>, options: &IngestionOptions) -> PipelineResult<DataSet> {
    let path = path.as_ref();
    let result = read_inner(path, options);

    match &result {
        Ok(ds) => {
            if let Some(obs) = options.observer.as_ref() {
                obs.on_event(&PipelineEvent::RecordsRead {
                    source: path.display().to_string(),
                    rows: ds.row_count(),
                    columns: ds.column_count(),
                });
            }
        }
        Err(e) => report_failure(options.observer.as_ref(), Stage::Read, e, options.alert_at_or_above),
    }

    result
}

fn read_inner(path: &Path, options: &IngestionOptions) -> PipelineResult<DataSet> {
    let fmt = match options.format {
        Some(f) => f,
        None => IngestionFormat::from_path(path)?,
    };
    let schema = options.schema.as_ref();
    match fmt {
        IngestionFormat::Csv => csv::ingest_csv_from_path(path, schema, &options.csv),
        IngestionFormat::Json => json::ingest_json_from_path(path, schema),
    }
}

/// Anything that can produce the batch a pipeline run works on.
pub trait RecordSource {
    /// Short human-readable name used in events and error context.
    fn describe(&self) -> String;

    /// Read the whole batch.
    fn read(&self) -> PipelineResult<DataSet>;

    /// Whether `read` already reports its own `RecordsRead` event and failures to an observer.
    ///
    /// A pipeline skips its own read reporting for such sources so nothing is reported twice.
    fn reports_reads(&self) -> bool {
        false
    }
}

/// A file-backed [`RecordSource`] read through [`read_from_path`].
#[derive(Clone)]
pub struct PathSource {
    /// Path to the input file.
    pub path: PathBuf,
    /// Options controlling ingestion.
    pub options: IngestionOptions,
}

impl PathSource {
    pub fn new(path: impl Into<PathBuf>, options: IngestionOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

impl fmt::Debug for PathSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSource")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish()
    }
}

impl RecordSource for PathSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> PipelineResult<DataSet> {
        read_from_path(&self.path, &self.options)
    }

    fn reports_reads(&self) -> bool {
        self.options.observer.is_some()
    }
}

/// An already-loaded batch.
impl RecordSource for DataSet {
    fn describe(&self) -> String {
        format!("in-memory ({} rows)", self.row_count())
    }

    fn read(&self) -> PipelineResult<DataSet> {
        Ok(self.clone())
    }
}
