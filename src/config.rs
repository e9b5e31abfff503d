//! Run configuration.
//!
//! Every field has a default, so `{}` is a complete configuration equal to
//! [`PipelineConfig::default`]:
//!
//! ```json
//! {
//!   "nulls": { "strings": ["", "NULL", "null", null], "numbers": [null] },
//!   "group_by": ["open", "low"],
//!   "aggregates": [{ "column": "high", "function": "avg" }],
//!   "min_surviving_columns": null,
//!   "detector": { "strategy": "early_exit", "max_depth": 64 },
//!   "quality": {
//!     "ruleset": "Rules = [ ColumnCount > 0 ]",
//!     "context": "DQContext",
//!     "publish_results": true,
//!     "strategy": "best_effort"
//!   },
//!   "execution": { "num_threads": null, "max_in_flight_scans": 8 }
//! }
//! ```
//!
//! `max_in_flight_scans` defaults to the available parallelism; `8` is what an eight-core host gets.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detect::{DetectorOptions, NullDefinition};
use crate::error::{PipelineError, PipelineResult};
use crate::execution::ExecutionOptions;
use crate::processing::AggregateSpec;
use crate::quality::{QualityOptions, RuleSet};

pub const DEFAULT_RULESET: &str = "Rules = [ ColumnCount > 0 ]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Rule set text; blank skips the quality gate.
    pub ruleset: String,
    #[serde(flatten)]
    pub options: QualityOptions,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            ruleset: DEFAULT_RULESET.to_string(),
            options: QualityOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub nulls: NullDefinition,
    pub group_by: Vec<String>,
    pub aggregates: Vec<AggregateSpec>,
    /// Fail when fewer top-level columns survive pruning. `None` disables the check.
    pub min_surviving_columns: Option<usize>,
    pub detector: DetectorOptions,
    pub quality: QualityConfig,
    pub execution: ExecutionOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            nulls: NullDefinition::default(),
            group_by: vec!["open".to_string(), "low".to_string()],
            aggregates: vec![AggregateSpec::new("high", "avg")],
            min_surviving_columns: None,
            detector: DetectorOptions::default(),
            quality: QualityConfig::default(),
            execution: ExecutionOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(text: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Static checks that need no data: names, functions, option ranges and the rule set.
    pub fn validate(&self) -> PipelineResult<()> {
        let mut seen = HashSet::new();
        for column in &self.group_by {
            if column.trim().is_empty() {
                return Err(PipelineError::config("group_by contains an empty column name"));
            }
            if !seen.insert(column.as_str()) {
                return Err(PipelineError::config(format!(
                    "duplicate group column '{column}'"
                )));
            }
        }

        for spec in &self.aggregates {
            if spec.column.trim().is_empty() {
                return Err(PipelineError::config("aggregate with an empty column name"));
            }
            spec.parsed_function()?;
        }

        if self.detector.max_depth == 0 {
            return Err(PipelineError::config("detector.max_depth must be > 0"));
        }
        self.execution.validate()?;
        if !self.quality.ruleset.trim().is_empty() {
            RuleSet::parse(&self.quality.ruleset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScanStrategy;
    use crate::quality::QualityStrategy;

    #[test]
    fn empty_object_is_the_default_config() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.group_by, vec!["open", "low"]);
        assert_eq!(config.aggregates, vec![AggregateSpec::new("high", "avg")]);
        assert_eq!(config.quality.ruleset, DEFAULT_RULESET);
        assert_eq!(config.quality.options.context, "DQContext");
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let text = r#"{
            "group_by": ["open"],
            "aggregates": [{"column": "volume", "function": "sum"}],
            "min_surviving_columns": 3,
            "detector": {"strategy": "materialize"},
            "quality": {"strategy": "fail_on_error"},
            "execution": {"num_threads": 2}
        }"#;
        let config = PipelineConfig::from_json_str(text).unwrap();
        assert_eq!(config.min_surviving_columns, Some(3));
        assert_eq!(config.detector.strategy, ScanStrategy::Materialize);
        assert_eq!(config.detector.max_depth, 64);
        assert_eq!(config.quality.options.strategy, QualityStrategy::FailOnError);
        assert_eq!(config.quality.ruleset, DEFAULT_RULESET);
        assert_eq!(config.execution.num_threads, Some(2));
    }

    #[test]
    fn validation_rejects_bad_values() {
        for text in [
            r#"{"aggregates": [{"column": "high", "function": "median"}]}"#,
            r#"{"group_by": ["open", "open"]}"#,
            r#"{"group_by": [" "]}"#,
            r#"{"execution": {"max_in_flight_scans": 0}}"#,
            r#"{"detector": {"max_depth": 0}}"#,
            r#"{"quality": {"ruleset": "Rules = [ Nonsense ]"}}"#,
        ] {
            let err = PipelineConfig::from_json_str(text).unwrap_err();
            assert!(
                matches!(err, PipelineError::Configuration { .. }),
                "{text}: {err}"
            );
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"groupby": ["open"]}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Json(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"group_by": []}"#).unwrap();
        let config = PipelineConfig::from_path(&path).unwrap();
        assert!(config.group_by.is_empty());
    }
}
