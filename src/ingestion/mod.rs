//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`read_from_path`] (from [`unified`]) which:
//!
//! - auto-detects format by file extension (or you can override via [`IngestionOptions`])
//! - reads into an in-memory [`crate::types::DataSet`], inferring the schema unless one is given
//! - optionally reports rows read or the failure to a [`crate::observability::PipelineObserver`]
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - [`json`]

pub mod csv;
pub mod json;
pub mod unified;

pub use self::csv::CsvOptions;
pub use unified::{read_from_path, IngestionFormat, IngestionOptions, PathSource, RecordSource};
