//! `ohlcv-clean` is a batch cleaning pipeline for OHLCV bar data held in an in-memory
//! [`types::DataSet`].
//!
//! One run:
//!
//! 1. reads a CSV or JSON/NDJSON batch ([`ingestion`]), with an explicit or inferred
//!    [`types::Schema`] that may nest records and arrays of records,
//! 2. drops exact-duplicate rows ([`processing::dedup()`]),
//! 3. finds every null-like leaf field, top-level or nested, whose values all belong to a
//!    configured null set ([`detect`], run in parallel by [`execution::ExecutionEngine`]),
//! 4. prunes those fields ([`processing::prune_columns()`]),
//! 5. groups and aggregates ([`processing::aggregate()`]),
//! 6. checks the result against a rule set ([`quality`]),
//! 7. writes the table as CSV or NDJSON ([`sink`]).
//!
//! [`pipeline::Pipeline`] strings the stages together from a [`config::PipelineConfig`] and
//! reports progress to an optional [`observability::PipelineObserver`].
//!
//! ## Null-like values
//!
//! A string-like leaf is null-like when every trimmed value is in the string null set (default
//! `""`, `"NULL"`, `"null"` and absent); a numeric leaf when every value is in the numeric null set
//! (default: absent only). Leaves with no declared type are always null-like; booleans never are.
//! An empty table makes every string-like and numeric leaf null-like.
//!
//! ## Example
//!
//! ```rust
//! use ohlcv_clean::config::PipelineConfig;
//! use ohlcv_clean::pipeline::Pipeline;
//! use ohlcv_clean::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("open", DataType::Int64),
//!     Field::new("low", DataType::Int64),
//!     Field::new("high", DataType::Int64),
//!     Field::new("note", DataType::Utf8),
//! ]);
//! let bar = |open, low, high, note: &str| {
//!     vec![Value::Int64(open), Value::Int64(low), Value::Int64(high), Value::from(note)]
//! };
//! let ds = DataSet::new(
//!     schema,
//!     vec![bar(1, 1, 10, ""), bar(1, 1, 10, ""), bar(1, 1, 20, "NULL"), bar(2, 2, 5, "null")],
//! );
//!
//! let out = Pipeline::new(PipelineConfig::default())?.run_dataset(ds)?;
//! assert_eq!(out.removed_paths.len(), 1);
//! assert_eq!(
//!     out.aggregated.rows,
//!     vec![
//!         vec![Value::Int64(1), Value::Int64(1), Value::float(15.0)],
//!         vec![Value::Int64(2), Value::Int64(2), Value::float(5.0)],
//!     ]
//! );
//! # Ok::<(), ohlcv_clean::PipelineError>(())
//! ```
//!
//! ## Modules
//!
//! - [`types`]: schema tree + in-memory dataset types
//! - [`detect`]: schema walker, leaf value-set collector, null-likeness classifier
//! - [`processing`]: dedup, prune, aggregate
//! - [`execution`]: parallel detection engine with throttling and metrics
//! - [`ingestion`] / [`sink`]: record source and sink
//! - [`quality`]: quality gate and rule-set evaluator
//! - [`observability`]: structured events and observers
//! - [`config`] / [`pipeline`]: run configuration and orchestration
//! - [`error`]: the error type shared by every stage

pub mod config;
pub mod detect;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod observability;
pub mod pipeline;
pub mod processing;
pub mod quality;
pub mod sink;
pub mod types;

pub use error::{PipelineError, PipelineResult};
