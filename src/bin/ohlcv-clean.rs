use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ohlcv_clean::config::PipelineConfig;
use ohlcv_clean::ingestion::{IngestionFormat, IngestionOptions, PathSource};
use ohlcv_clean::observability::{CompositeObserver, FileObserver, PipelineObserver, TracingObserver};
use ohlcv_clean::pipeline::Pipeline;
use ohlcv_clean::processing::AggregateSpec;
use ohlcv_clean::quality::QualityStrategy;
use ohlcv_clean::sink::PathSink;

#[derive(Parser)]
#[command(name = "ohlcv-clean")]
#[command(version, about = "Dedupe, prune null-like fields and aggregate a batch of OHLCV bars", long_about = None)]
struct Cli {
    /// Input file (.csv, .json, .ndjson or .jsonl)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file; the format follows the extension (.csv, .json, .ndjson, .jsonl)
    #[arg(short, long)]
    output: PathBuf,

    /// JSON configuration file; missing keys take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Group-by columns, replacing the configured ones (comma separated or repeated)
    #[arg(long = "group-by", value_delimiter = ',')]
    group_by: Vec<String>,

    /// Aggregate the whole batch into a single row, ignoring configured group-by columns
    #[arg(long, conflicts_with = "group_by")]
    no_group_by: bool,

    /// Aggregate as column:function, replacing the configured ones (repeatable)
    #[arg(long = "agg", value_parser = parse_agg)]
    aggs: Vec<AggregateSpec>,

    /// Force the input format instead of using the extension
    #[arg(long, value_enum)]
    input_format: Option<FormatArg>,

    /// Fail when fewer top-level columns survive pruning
    #[arg(long)]
    min_surviving_columns: Option<usize>,

    /// Fail the run when a quality rule fails
    #[arg(long)]
    fail_on_quality: bool,

    /// Also append pipeline events to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for IngestionFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => Self::Csv,
            FormatArg::Json => Self::Json,
        }
    }
}

impl Cli {
    /// Flags that were given replace the matching config values.
    fn apply_overrides(&self, config: &mut PipelineConfig) {
        if self.no_group_by {
            config.group_by.clear();
        } else if !self.group_by.is_empty() {
            config.group_by = self.group_by.clone();
        }
        if !self.aggs.is_empty() {
            config.aggregates = self.aggs.clone();
        }
        if self.min_surviving_columns.is_some() {
            config.min_surviving_columns = self.min_surviving_columns;
        }
        if self.fail_on_quality {
            config.quality.options.strategy = QualityStrategy::FailOnError;
        }
    }
}

fn parse_agg(s: &str) -> Result<AggregateSpec, String> {
    let (column, function) = s
        .split_once(':')
        .ok_or_else(|| format!("expected column:function, got '{s}'"))?;
    let spec = AggregateSpec::new(column.trim(), function.trim());
    spec.parsed_function().map_err(|e| e.to_string())?;
    Ok(spec)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    cli.apply_overrides(&mut config);

    let mut observers: Vec<Arc<dyn PipelineObserver>> = vec![Arc::new(TracingObserver)];
    if let Some(path) = &cli.log_file {
        observers.push(Arc::new(FileObserver::new(path)));
    }

    let pipeline = Pipeline::new(config)
        .context("invalid configuration")?
        .with_observer(Arc::new(CompositeObserver::new(observers)));

    let source = PathSource::new(
        &cli.input,
        IngestionOptions {
            format: cli.input_format.map(Into::into),
            ..Default::default()
        },
    );
    let sink = PathSink::new(&cli.output, None)
        .with_context(|| format!("choosing a writer for {}", cli.output.display()))?;

    let output = pipeline
        .run(&source, &sink)
        .with_context(|| format!("cleaning {}", cli.input.display()))?;

    let removed: Vec<String> = output.removed_paths.iter().map(ToString::to_string).collect();
    tracing::info!(
        deduplicated_rows = output.deduplicated_rows,
        removed = ?removed,
        groups = output.aggregated.row_count(),
        quality_passed = output.quality.as_ref().map(|q| q.passed()),
        "wrote {}",
        cli.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overridden(args: &[&str]) -> PipelineConfig {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut config = PipelineConfig::default();
        cli.apply_overrides(&mut config);
        config
    }

    #[test]
    fn group_by_flags_replace_or_clear_config() {
        let base = ["ohlcv-clean", "-i", "in.csv", "-o", "out.csv"];
        assert_eq!(overridden(&base).group_by, vec!["open", "low"]);

        let with_group = [&base[..], &["--group-by", "open,close"][..]].concat();
        assert_eq!(overridden(&with_group).group_by, vec!["open", "close"]);

        let whole_table = [&base[..], &["--no-group-by"][..]].concat();
        let config = overridden(&whole_table);
        assert!(config.group_by.is_empty());
        config.validate().unwrap();

        let both = [&base[..], &["--no-group-by", "--group-by", "open"][..]].concat();
        assert!(Cli::try_parse_from(both).is_err());
    }

    #[test]
    fn agg_flag_parses_column_and_function() {
        let config = overridden(&[
            "ohlcv-clean",
            "-i",
            "in.csv",
            "-o",
            "out.csv",
            "--agg",
            "high:max",
            "--agg",
            "close:mean",
        ]);
        assert_eq!(
            config.aggregates,
            vec![AggregateSpec::new("high", "max"), AggregateSpec::new("close", "mean")]
        );
        assert!(parse_agg("high").is_err());
        assert!(parse_agg("high:median").is_err());
    }
}
