//! In-memory dataset transformations.
//!
//! Every function takes a `&DataSet` and returns a new one; inputs are never modified.
//!
//! - [`dedup()`]: drop exact-duplicate rows
//! - [`prune_columns()`]: remove fields (top-level or nested) by dotted path
//! - [`aggregate()`]: group-by with `(column, function)` projections
//!
//! ## Example: dedup → prune → aggregate
//!
//! ```rust
//! use ohlcv_clean::detect::FieldPath;
//! use ohlcv_clean::processing::{aggregate, dedup, prune_columns, AggregateSpec};
//! use ohlcv_clean::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("open", DataType::Int64),
//!     Field::new("high", DataType::Int64),
//!     Field::new("flag", DataType::Utf8),
//! ]);
//! let ds = DataSet::new(
//!     schema,
//!     vec![
//!         vec![Value::Int64(1), Value::Int64(10), Value::Null],
//!         vec![Value::Int64(1), Value::Int64(10), Value::Null],
//!         vec![Value::Int64(1), Value::Int64(20), Value::Null],
//!     ],
//! );
//!
//! let unique = dedup(&ds);
//! assert_eq!(unique.row_count(), 2);
//!
//! let pruned = prune_columns(&unique, &[FieldPath::parse("flag")])?;
//! let out = aggregate(&pruned, &["open"], &[AggregateSpec::new("high", "avg")])?;
//! assert_eq!(out.rows, vec![vec![Value::Int64(1), Value::float(15.0)]]);
//! # Ok::<(), ohlcv_clean::PipelineError>(())
//! ```

pub mod aggregate;
pub mod dedup;
pub mod prune;

pub use aggregate::{aggregate, AggregateFunction, AggregateSpec};
pub use dedup::{dedup, dedup_on};
pub use prune::prune_columns;
