//! Structured pipeline events and observers.
//!
//! Components never log through global state. The execution engine, ingestion and the pipeline
//! take an optional `Arc<dyn PipelineObserver>` and report [`PipelineEvent`]s and failures to it.
//! Tests can plug in a recording observer and assert on what was emitted.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::detect::FieldPath;
use crate::error::PipelineError;
use crate::execution::ExecutionMetricsSnapshot;
use crate::types::LeafClass;

/// Pipeline stage an event or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Read,
    Dedup,
    Detect,
    Prune,
    Aggregate,
    QualityGate,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Dedup => "dedup",
            Self::Detect => "detect",
            Self::Prune => "prune",
            Self::Aggregate => "aggregate",
            Self::QualityGate => "quality_gate",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

impl Severity {
    /// Severity of a failed stage, by error kind.
    pub fn of(error: &PipelineError) -> Self {
        match error {
            PipelineError::Io(_) | PipelineError::ThreadPool(_) => Self::Critical,
            PipelineError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            PipelineError::Json(err) if err.is_io() => Self::Critical,
            _ => Self::Error,
        }
    }
}

/// Events emitted while a pipeline runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StageStarted {
        stage: Stage,
    },
    StageFinished {
        stage: Stage,
        elapsed: Duration,
    },
    RecordsRead {
        source: String,
        rows: usize,
        columns: usize,
    },
    Deduplicated {
        input_rows: usize,
        output_rows: usize,
    },
    ThrottleWaited {
        duration: Duration,
    },
    LeafScanStarted {
        path: FieldPath,
    },
    LeafScanFinished {
        path: FieldPath,
        class: LeafClass,
        null_like: bool,
        rows_scanned: usize,
    },
    NullLikeDetected {
        leaves: usize,
        paths: Vec<FieldPath>,
        metrics: ExecutionMetricsSnapshot,
    },
    ColumnsPruned {
        paths: Vec<FieldPath>,
        remaining_columns: usize,
    },
    Aggregated {
        groups: usize,
        columns: Vec<String>,
    },
    QualityRuleFailed {
        context: String,
        rule: String,
        message: String,
    },
    QualityEvaluated {
        context: String,
        passed: usize,
        failed: usize,
        observations: Vec<(String, f64)>,
    },
    RecordsWritten {
        sink: String,
        rows: usize,
    },
}

impl PipelineEvent {
    /// Default severity of the event.
    pub fn severity(&self) -> Severity {
        match self {
            Self::QualityRuleFailed { .. } => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

/// Observer interface for pipeline events and failures.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, _event: &PipelineEvent) {}

    /// Called when a stage fails.
    fn on_failure(&self, _stage: Stage, _severity: Severity, _error: &PipelineError) {}

    /// Called when a failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, stage: Stage, severity: Severity, error: &PipelineError) {
        self.on_failure(stage, severity, error)
    }
}

/// Report `error` to `observer`, alerting when its severity reaches `alert_at_or_above`.
pub fn report_failure(
    observer: Option<&Arc<dyn PipelineObserver>>,
    stage: Stage,
    error: &PipelineError,
    alert_at_or_above: Severity,
) {
    if let Some(obs) = observer {
        let severity = Severity::of(error);
        obs.on_failure(stage, severity, error);
        if severity >= alert_at_or_above {
            obs.on_alert(stage, severity, error);
        }
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_event(&self, event: &PipelineEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }

    fn on_failure(&self, stage: Stage, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(stage, severity, error);
        }
    }

    fn on_alert(&self, stage: Stage, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(stage, severity, error);
        }
    }
}

/// Logs events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl PipelineObserver for StdErrObserver {
    fn on_event(&self, event: &PipelineEvent) {
        eprintln!("[pipeline][{:?}] {event:?}", event.severity());
    }

    fn on_failure(&self, stage: Stage, severity: Severity, error: &PipelineError) {
        eprintln!("[pipeline][{severity:?}] stage={stage} err={error}");
    }

    fn on_alert(&self, stage: Stage, severity: Severity, error: &PipelineError) {
        eprintln!("[ALERT][pipeline][{severity:?}] stage={stage} err={error}");
    }
}

/// Forwards events to `tracing`, with the interesting fields as structured fields.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StageStarted { stage } => {
                tracing::debug!(stage = %stage, "stage started");
            }
            PipelineEvent::StageFinished { stage, elapsed } => {
                tracing::debug!(stage = %stage, elapsed_ms = elapsed.as_millis() as u64, "stage finished");
            }
            PipelineEvent::RecordsRead {
                source,
                rows,
                columns,
            } => {
                tracing::info!(source = %source, rows, columns, "records read");
            }
            PipelineEvent::Deduplicated {
                input_rows,
                output_rows,
            } => {
                tracing::info!(input_rows, output_rows, "deduplicated");
            }
            PipelineEvent::ThrottleWaited { duration } => {
                tracing::trace!(wait_us = duration.as_micros() as u64, "scan throttled");
            }
            PipelineEvent::LeafScanStarted { path } => {
                tracing::trace!(path = %path, "leaf scan started");
            }
            PipelineEvent::LeafScanFinished {
                path,
                class,
                null_like,
                rows_scanned,
            } => {
                tracing::debug!(path = %path, class = ?class, null_like, rows_scanned, "leaf scanned");
            }
            PipelineEvent::NullLikeDetected {
                leaves,
                paths,
                metrics,
            } => {
                tracing::info!(leaves, null_like = paths.len(), paths = ?paths_display(paths), metrics = %metrics, "null-like detection finished");
            }
            PipelineEvent::ColumnsPruned {
                paths,
                remaining_columns,
            } => {
                tracing::info!(paths = ?paths_display(paths), remaining_columns, "dropping null-like fields");
            }
            PipelineEvent::Aggregated { groups, columns } => {
                tracing::info!(groups, columns = ?columns, "aggregated");
            }
            PipelineEvent::QualityRuleFailed {
                context,
                rule,
                message,
            } => {
                tracing::warn!(context = %context, rule = %rule, "quality rule failed: {message}");
            }
            PipelineEvent::QualityEvaluated {
                context,
                passed,
                failed,
                observations,
            } => {
                tracing::info!(context = %context, passed, failed, observations = ?observations, "quality gate evaluated");
            }
            PipelineEvent::RecordsWritten { sink, rows } => {
                tracing::info!(sink = %sink, rows, "records written");
            }
        }
    }

    fn on_failure(&self, stage: Stage, severity: Severity, error: &PipelineError) {
        tracing::error!(stage = %stage, severity = ?severity, "stage failed: {error}");
    }
}

fn paths_display(paths: &[FieldPath]) -> Vec<String> {
    paths.iter().map(ToString::to_string).collect()
}

/// Appends events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.append_line(&format!(
            "{} {:?} {event:?}",
            unix_ts(),
            event.severity()
        ));
    }

    fn on_failure(&self, stage: Stage, severity: Severity, error: &PipelineError) {
        self.append_line(&format!(
            "{} fail severity={severity:?} stage={stage} err={error}",
            unix_ts()
        ));
    }

    fn on_alert(&self, stage: Stage, severity: Severity, error: &PipelineError) {
        self.append_line(&format!(
            "{} ALERT severity={severity:?} stage={stage} err={error}",
            unix_ts()
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
        failures: Mutex<Vec<(Stage, Severity)>>,
        alerts: Mutex<Vec<(Stage, Severity)>>,
    }

    impl PipelineObserver for Recording {
        fn on_event(&self, event: &PipelineEvent) {
            self.events.lock().unwrap().push(format!("{event:?}"));
        }
        fn on_failure(&self, stage: Stage, severity: Severity, _error: &PipelineError) {
            self.failures.lock().unwrap().push((stage, severity));
        }
        fn on_alert(&self, stage: Stage, severity: Severity, _error: &PipelineError) {
            self.alerts.lock().unwrap().push((stage, severity));
        }
    }

    #[test]
    fn io_errors_are_critical_and_alert() {
        let rec = Arc::new(Recording::default());
        let obs: Arc<dyn PipelineObserver> = rec.clone();
        let err = PipelineError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        report_failure(Some(&obs), Stage::Read, &err, Severity::Critical);
        assert_eq!(*rec.failures.lock().unwrap(), vec![(Stage::Read, Severity::Critical)]);
        assert_eq!(*rec.alerts.lock().unwrap(), vec![(Stage::Read, Severity::Critical)]);
    }

    #[test]
    fn configuration_errors_do_not_alert_at_critical_threshold() {
        let rec = Arc::new(Recording::default());
        let obs: Arc<dyn PipelineObserver> = rec.clone();
        let err = PipelineError::config("bad");
        report_failure(Some(&obs), Stage::Aggregate, &err, Severity::Critical);
        assert_eq!(*rec.failures.lock().unwrap(), vec![(Stage::Aggregate, Severity::Error)]);
        assert!(rec.alerts.lock().unwrap().is_empty());
    }

    #[test]
    fn composite_fans_out() {
        let a = Arc::new(Recording::default());
        let b = Arc::new(Recording::default());
        let a_dyn: Arc<dyn PipelineObserver> = a.clone();
        let b_dyn: Arc<dyn PipelineObserver> = b.clone();
        let composite = CompositeObserver::new(vec![a_dyn, b_dyn, Arc::new(StdErrObserver)]);
        composite.on_event(&PipelineEvent::StageStarted { stage: Stage::Dedup });
        report_failure(
            Some(&(Arc::new(composite) as Arc<dyn PipelineObserver>)),
            Stage::Write,
            &PipelineError::Io(std::io::Error::other("disk full")),
            Severity::Error,
        );
        assert_eq!(a.events.lock().unwrap().len(), 1);
        assert_eq!(b.events.lock().unwrap().len(), 1);
        assert_eq!(*b.alerts.lock().unwrap(), vec![(Stage::Write, Severity::Critical)]);
    }

    #[test]
    fn file_observer_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let obs = FileObserver::new(&path);
        obs.on_event(&PipelineEvent::Deduplicated {
            input_rows: 3,
            output_rows: 2,
        });
        obs.on_failure(Stage::Write, Severity::Critical, &PipelineError::config("x"));
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Deduplicated"));
        assert!(lines[1].contains("stage=write"));
    }
}
