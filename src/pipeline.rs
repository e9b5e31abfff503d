//! End-to-end cleaning run.
//!
//! Stage order: dedup → null-like detection → prune → surviving-column check → aggregate →
//! conformance check → quality gate → write. Every stage works on an in-memory batch and nothing
//! is written unless all earlier stages succeed.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::detect::{FieldPath, NullLikeReport};
use crate::error::{PipelineError, PipelineResult};
use crate::execution::{ExecutionEngine, ExecutionMetrics};
use crate::ingestion::RecordSource;
use crate::observability::{report_failure, PipelineEvent, PipelineObserver, Severity, Stage};
use crate::processing::{aggregate, dedup, prune_columns};
use crate::quality::{QualityGate, QualityReport, RuleSetGate};
use crate::sink::RecordSink;
use crate::types::DataSet;

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Rows left after deduplication.
    pub deduplicated_rows: usize,
    /// Null-like paths removed by the pruner, in walker order.
    pub removed_paths: Vec<FieldPath>,
    pub detection: NullLikeReport,
    pub aggregated: DataSet,
    /// `None` when the configured rule set is blank.
    pub quality: Option<QualityReport>,
}

pub struct Pipeline {
    config: PipelineConfig,
    engine: ExecutionEngine,
    gate: Arc<dyn QualityGate>,
    observer: Option<Arc<dyn PipelineObserver>>,
    alert_at_or_above: Severity,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Pipeline {
    /// Validate `config` and build the execution engine.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let engine = ExecutionEngine::new(config.execution.clone())?;
        Ok(Self {
            config,
            engine,
            gate: Arc::new(RuleSetGate),
            observer: None,
            alert_at_or_above: Severity::Critical,
        })
    }

    /// Attach an observer for stage events, failures and alerts.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.engine = self.engine.with_observer(Arc::clone(&observer));
        self.observer = Some(observer);
        self
    }

    /// Replace the built-in [`RuleSetGate`].
    pub fn with_quality_gate(mut self, gate: Arc<dyn QualityGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Severity at which failures are also reported through `on_alert`.
    pub fn with_alert_threshold(mut self, severity: Severity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Metrics of the most recent detection pass.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        self.engine.metrics()
    }

    /// Read from `source`, run every stage, and write the aggregated table to `sink`.
    ///
    /// When [`RecordSource::reports_reads`] is set, the source's observer gets the `RecordsRead`
    /// event and any read failure; this pipeline's observer still sees the stage start and finish.
    pub fn run(&self, source: &dyn RecordSource, sink: &dyn RecordSink) -> PipelineResult<PipelineOutput> {
        // Sources with their own observer report the read themselves.
        let report_read = !source.reports_reads();
        let dataset = self.stage_reporting(Stage::Read, report_read, || {
            let ds = source.read()?;
            if report_read {
                self.emit(PipelineEvent::RecordsRead {
                    source: source.describe(),
                    rows: ds.row_count(),
                    columns: ds.column_count(),
                });
            }
            Ok(ds)
        })?;

        let output = self.run_dataset(dataset)?;

        self.stage(Stage::Write, || {
            sink.write(&output.aggregated)?;
            self.emit(PipelineEvent::RecordsWritten {
                sink: sink.describe(),
                rows: output.aggregated.row_count(),
            });
            Ok(())
        })?;
        Ok(output)
    }

    /// Run the in-memory stages on an already loaded batch.
    pub fn run_dataset(&self, dataset: DataSet) -> PipelineResult<PipelineOutput> {
        let deduped = self.stage(Stage::Dedup, || {
            let out = dedup(&dataset);
            self.emit(PipelineEvent::Deduplicated {
                input_rows: dataset.row_count(),
                output_rows: out.row_count(),
            });
            Ok(out)
        })?;
        drop(dataset);

        let detection = self.stage(Stage::Detect, || {
            self.engine
                .detect_null_like(&deduped, &self.config.nulls, &self.config.detector)
        })?;
        let removed_paths = detection.null_like_paths();

        let pruned = self.stage(Stage::Prune, || {
            let pruned = prune_columns(&deduped, &removed_paths)?;
            if !removed_paths.is_empty() {
                self.emit(PipelineEvent::ColumnsPruned {
                    paths: removed_paths.clone(),
                    remaining_columns: pruned.column_count(),
                });
            }
            match self.config.min_surviving_columns {
                Some(required) if pruned.column_count() < required => {
                    Err(PipelineError::InsufficientColumns {
                        required,
                        surviving: pruned.column_count(),
                    })
                }
                _ => Ok(pruned),
            }
        })?;

        let aggregated = self.stage(Stage::Aggregate, || {
            let out = aggregate(&pruned, &self.config.group_by, &self.config.aggregates)?;
            out.validate()?;
            self.emit(PipelineEvent::Aggregated {
                groups: out.row_count(),
                columns: out.schema.field_names().map(str::to_string).collect(),
            });
            Ok(out)
        })?;

        let quality = if self.config.quality.ruleset.trim().is_empty() {
            None
        } else {
            Some(self.stage(Stage::QualityGate, || self.check_quality(&aggregated))?)
        };

        Ok(PipelineOutput {
            deduplicated_rows: deduped.row_count(),
            removed_paths,
            detection,
            aggregated,
            quality,
        })
    }

    fn check_quality(&self, dataset: &DataSet) -> PipelineResult<QualityReport> {
        let options = &self.config.quality.options;
        let report = self
            .gate
            .evaluate(dataset, &self.config.quality.ruleset, options)?;

        if options.publish_results {
            for outcome in report.failed() {
                self.emit(PipelineEvent::QualityRuleFailed {
                    context: report.context.clone(),
                    rule: outcome.rule.clone(),
                    message: outcome.message.clone().unwrap_or_default(),
                });
            }
            self.emit(PipelineEvent::QualityEvaluated {
                context: report.context.clone(),
                passed: report.outcomes.iter().filter(|o| o.passed).count(),
                failed: report.failed().count(),
                observations: report.observations.clone(),
            });
        }

        report.enforce(options.strategy)?;
        Ok(report)
    }

    fn stage<T>(&self, stage: Stage, f: impl FnOnce() -> PipelineResult<T>) -> PipelineResult<T> {
        self.stage_reporting(stage, true, f)
    }

    fn stage_reporting<T>(
        &self,
        stage: Stage,
        report_failures: bool,
        f: impl FnOnce() -> PipelineResult<T>,
    ) -> PipelineResult<T> {
        let start = Instant::now();
        self.emit(PipelineEvent::StageStarted { stage });
        match f() {
            Ok(out) => {
                self.emit(PipelineEvent::StageFinished {
                    stage,
                    elapsed: start.elapsed(),
                });
                Ok(out)
            }
            Err(e) => {
                if report_failures {
                    report_failure(self.observer.as_ref(), stage, &e, self.alert_at_or_above);
                }
                Err(e)
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}
