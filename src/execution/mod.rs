//! Execution engine for running null-like detection with configurable parallelism.
//!
//! This module sits "above" [`crate::detect`] and provides:
//!
//! - Parallel per-leaf scans on a dedicated rayon pool
//! - Throttling of concurrently running scans
//! - Real-time metrics + observer hooks for monitoring

mod metrics;
mod semaphore;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::detect::{leaves, scan_leaf, DetectorOptions, LeafVerdict, NullDefinition, NullLikeReport};
use crate::error::{PipelineError, PipelineResult};
use crate::observability::{PipelineEvent, PipelineObserver};
use crate::types::DataSet;

pub use metrics::{ExecutionMetrics, ExecutionMetricsSnapshot};

use semaphore::Semaphore;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on concurrently running leaf scans.
    ///
    /// This is an additional throttle on top of `num_threads`.
    pub max_in_flight_scans: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            num_threads: None,
            max_in_flight_scans: available_parallelism(),
        }
    }
}

impl ExecutionOptions {
    /// Reject option values the engine cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_in_flight_scans == 0 {
            return Err(PipelineError::config("max_in_flight_scans must be > 0"));
        }
        if self.num_threads == Some(0) {
            return Err(PipelineError::config("num_threads must be > 0 when set"));
        }
        Ok(())
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A configurable execution engine for null-like detection over an in-memory [`DataSet`].
///
/// Leaves are scanned independently; the report keeps walker order regardless of which scan
/// finishes first.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn PipelineObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Returns a [`PipelineError::Configuration`] error for zero `max_in_flight_scans` or
    /// `num_threads == Some(0)`.
    pub fn new(opts: ExecutionOptions) -> PipelineResult<Self> {
        opts.validate()?;

        let n_threads = opts.num_threads.unwrap_or_else(available_parallelism).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("ohlcv-scan-{i}"))
            .build()?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.opts
    }

    /// Parallel counterpart of [`crate::detect::find_null_like_columns`].
    ///
    /// The schema is walked up front, so a malformed schema fails before any scan starts.
    pub fn detect_null_like(
        &self,
        dataset: &DataSet,
        nulls: &NullDefinition,
        options: &DetectorOptions,
    ) -> PipelineResult<NullLikeReport> {
        let leaves = leaves(&dataset.schema, options.max_depth)?;

        let start = Instant::now();
        self.metrics.begin_run();

        let sem = Semaphore::new(self.opts.max_in_flight_scans);
        let verdicts: Vec<LeafVerdict> = self.pool.install(|| {
            leaves
                .par_iter()
                .map(|leaf| {
                    let (_permit, waited) = sem.acquire();
                    if waited > Duration::ZERO {
                        self.metrics.on_throttle_wait(waited);
                        self.emit(PipelineEvent::ThrottleWaited { duration: waited });
                    }

                    self.metrics.on_leaf_start();
                    self.emit(PipelineEvent::LeafScanStarted {
                        path: leaf.path.clone(),
                    });

                    let verdict = scan_leaf(dataset, leaf, nulls, options.strategy);

                    self.emit(PipelineEvent::LeafScanFinished {
                        path: verdict.path.clone(),
                        class: verdict.class,
                        null_like: verdict.null_like,
                        rows_scanned: verdict.rows_scanned,
                    });
                    self.metrics.on_leaf_end(verdict.rows_scanned);
                    verdict
                })
                .collect()
        });

        let report = NullLikeReport { verdicts };
        self.metrics.end_run(start.elapsed());
        self.emit(PipelineEvent::NullLikeDetected {
            leaves: report.leaf_count(),
            paths: report.null_like_paths(),
            metrics: self.metrics.snapshot(),
        });
        Ok(report)
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionEngine, ExecutionOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::detect::{find_null_like_columns, DetectorOptions, NullDefinition, ScanStrategy};
    use crate::error::PipelineError;
    use crate::observability::{PipelineEvent, PipelineObserver};
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    /// `n` string columns; every third one holds only null-like values.
    fn wide_dataset(n: usize, rows: usize) -> DataSet {
        let fields = (0..n)
            .map(|i| Field::new(format!("c{i}"), DataType::Utf8))
            .collect();
        let rows = (0..rows)
            .map(|r| {
                (0..n)
                    .map(|c| {
                        if c % 3 == 0 {
                            Value::from("NULL")
                        } else {
                            Value::from(format!("v{r}"))
                        }
                    })
                    .collect()
            })
            .collect();
        DataSet::new(Schema::new(fields), rows)
    }

    #[test]
    fn parallel_report_matches_sequential_detector() {
        let ds = wide_dataset(30, 50);
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight_scans: 4,
        })
        .unwrap();

        for strategy in [ScanStrategy::Materialize, ScanStrategy::EarlyExit] {
            let opts = DetectorOptions {
                strategy,
                ..Default::default()
            };
            let nulls = NullDefinition::default();
            let parallel = engine.detect_null_like(&ds, &nulls, &opts).unwrap();
            let sequential = find_null_like_columns(&ds, &nulls, &opts).unwrap();
            assert_eq!(parallel, sequential);
            assert_eq!(parallel.null_like_paths().len(), 10);
        }
    }

    struct ConcurrencyObserver {
        active_scans: AtomicUsize,
        max_active_scans: AtomicUsize,
        detected: AtomicUsize,
    }

    impl ConcurrencyObserver {
        fn new() -> Self {
            Self {
                active_scans: AtomicUsize::new(0),
                max_active_scans: AtomicUsize::new(0),
                detected: AtomicUsize::new(0),
            }
        }
    }

    impl PipelineObserver for ConcurrencyObserver {
        fn on_event(&self, event: &PipelineEvent) {
            match event {
                PipelineEvent::LeafScanStarted { .. } => {
                    let now = self.active_scans.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_active_scans.fetch_max(now, Ordering::SeqCst);
                }
                PipelineEvent::LeafScanFinished { .. } => {
                    let _ = self.active_scans.fetch_sub(1, Ordering::SeqCst);
                }
                PipelineEvent::NullLikeDetected { .. } => {
                    self.detected.fetch_add(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn max_in_flight_scans_throttles_leaf_concurrency() {
        let ds = wide_dataset(40, 200);
        let observer = Arc::new(ConcurrencyObserver::new());
        let obs_trait: Arc<dyn PipelineObserver> = observer.clone();
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight_scans: 1,
        })
        .unwrap()
        .with_observer(obs_trait);

        let report = engine
            .detect_null_like(&ds, &NullDefinition::default(), &DetectorOptions::default())
            .unwrap();

        assert_eq!(report.leaf_count(), 40);
        assert_eq!(observer.max_active_scans.load(Ordering::SeqCst), 1);
        assert_eq!(observer.detected.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn metrics_are_available_after_run() {
        let ds = wide_dataset(12, 25);
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(2),
            max_in_flight_scans: 1,
        })
        .unwrap();
        let metrics = engine.metrics();

        let opts = DetectorOptions {
            strategy: ScanStrategy::Materialize,
            ..Default::default()
        };
        engine
            .detect_null_like(&ds, &NullDefinition::default(), &opts)
            .unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.run_id, 1);
        assert_eq!(snap.leaves_started, 12);
        assert_eq!(snap.leaves_finished, 12);
        assert_eq!(snap.rows_scanned, 12 * 25);
        assert_eq!(snap.max_active_scans, 1);
        assert!(snap.elapsed.is_some());
    }

    #[test]
    fn invalid_options_are_configuration_errors() {
        let err = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(0),
            max_in_flight_scans: 1,
        })
        .err()
        .unwrap();
        assert!(matches!(err, PipelineError::Configuration { .. }));

        let err = ExecutionEngine::new(ExecutionOptions {
            num_threads: None,
            max_in_flight_scans: 0,
        })
        .err()
        .unwrap();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn malformed_schema_fails_before_scanning() {
        let schema = Schema::new(vec![
            Field::new("dup", DataType::Utf8),
            Field::new("dup", DataType::Int64),
        ]);
        let ds = DataSet::new(schema, vec![]);
        let engine = ExecutionEngine::new(ExecutionOptions::default()).unwrap();
        let metrics = engine.metrics();
        let err = engine
            .detect_null_like(&ds, &NullDefinition::default(), &DetectorOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaTraversal { .. }));
        assert_eq!(metrics.snapshot().leaves_started, 0);
    }
}
