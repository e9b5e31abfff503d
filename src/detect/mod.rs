//! Schema-aware null-like column detection.
//!
//! The detector walks the schema tree ([`walker`]), scans every string-like and numeric-like leaf
//! ([`collector`]) and classifies it against a [`NullDefinition`] ([`classifier`]). Leaves with no
//! declared type are null-like without a scan; unsupported leaf types are never null-like.
//!
//! ```rust
//! use ohlcv_clean::detect::{find_null_like_columns, DetectorOptions, NullDefinition};
//! use ohlcv_clean::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("close", DataType::Float64),
//!     Field::new("flag", DataType::Utf8),
//! ]);
//! let ds = DataSet::new(
//!     schema,
//!     vec![
//!         vec![Value::float(10.5), Value::from("")],
//!         vec![Value::float(11.0), Value::from("NULL")],
//!     ],
//! );
//!
//! let report = find_null_like_columns(&ds, &NullDefinition::default(), &DetectorOptions::default())?;
//! let paths: Vec<String> = report.null_like_paths().iter().map(|p| p.to_string()).collect();
//! assert_eq!(paths, vec!["flag"]);
//! # Ok::<(), ohlcv_clean::PipelineError>(())
//! ```

pub mod classifier;
pub mod collector;
pub mod walker;

use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::types::{DataSet, LeafClass};

pub use classifier::{is_null_like, NullDefinition};
pub use collector::{collect_value_set, find_rejected, ValueSet};
pub use walker::{leaves, walk, FieldPath, LeafField, LeafIter, DEFAULT_MAX_DEPTH};

/// How a leaf is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Materialize the full distinct value set, then classify.
    Materialize,
    /// Stop at the first value outside the leaf's null set.
    #[default]
    EarlyExit,
}

/// Options for a detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    pub strategy: ScanStrategy,
    /// Maximum schema nesting depth before the walk fails.
    pub max_depth: usize,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            strategy: ScanStrategy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Classification of a single leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafVerdict {
    pub path: FieldPath,
    pub class: LeafClass,
    pub null_like: bool,
    /// Size of the distinct value set; only known with [`ScanStrategy::Materialize`].
    pub distinct_values: Option<usize>,
    /// Rows visited before the verdict was reached.
    pub rows_scanned: usize,
}

/// Result of a detection pass: one verdict per leaf, in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullLikeReport {
    pub verdicts: Vec<LeafVerdict>,
}

impl NullLikeReport {
    /// Paths classified null-like, in walk order.
    pub fn null_like_paths(&self) -> Vec<FieldPath> {
        self.verdicts
            .iter()
            .filter(|v| v.null_like)
            .map(|v| v.path.clone())
            .collect()
    }

    /// Number of leaves classified.
    pub fn leaf_count(&self) -> usize {
        self.verdicts.len()
    }
}

/// Scan and classify one leaf.
pub fn scan_leaf(
    dataset: &DataSet,
    leaf: &LeafField,
    nulls: &NullDefinition,
    strategy: ScanStrategy,
) -> LeafVerdict {
    let verdict = |null_like: bool, distinct_values: Option<usize>, rows_scanned: usize| LeafVerdict {
        path: leaf.path.clone(),
        class: leaf.class,
        null_like,
        distinct_values,
        rows_scanned,
    };

    match leaf.class {
        LeafClass::Absent => verdict(true, None, 0),
        LeafClass::OtherUnsupported => verdict(false, None, 0),
        LeafClass::StringLike | LeafClass::NumericLike => match strategy {
            ScanStrategy::Materialize => {
                let values = collect_value_set(dataset, leaf);
                verdict(
                    is_null_like(leaf.class, &values, nulls),
                    Some(values.len()),
                    dataset.row_count(),
                )
            }
            ScanStrategy::EarlyExit => {
                let (rejected, rows) = find_rejected(dataset, leaf, |v| nulls.matches(leaf.class, v));
                verdict(rejected.is_none(), None, rows)
            }
        },
    }
}

/// Find every null-like leaf of `dataset`, scanning leaves one after another.
///
/// See [`crate::execution::ExecutionEngine::detect_null_like`] for the parallel version.
pub fn find_null_like_columns(
    dataset: &DataSet,
    nulls: &NullDefinition,
    options: &DetectorOptions,
) -> PipelineResult<NullLikeReport> {
    let leaves = leaves(&dataset.schema, options.max_depth)?;
    let verdicts = leaves
        .iter()
        .map(|leaf| scan_leaf(dataset, leaf, nulls, options.strategy))
        .collect();
    Ok(NullLikeReport { verdicts })
}
