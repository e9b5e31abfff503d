//! Quality gate: evaluate a rule set against the finished table.
//!
//! [`QualityGate`] is the seam; [`RuleSetGate`] is the built-in evaluator for a small rule language:
//!
//! ```text
//! Rules = [
//!     ColumnCount > 0,
//!     RowCount >= 1,
//!     IsComplete "open",
//!     ColumnExists "avg_high",
//!     Completeness "avg_high" >= 0.95
//! ]
//! ```
//!
//! Operators are `>`, `>=`, `<`, `<=`, `=` and `!=`. Rules that name a missing column fail; text
//! that is not a rule is a [`PipelineError::Configuration`] error.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::types::DataSet;

/// What to do when rules fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStrategy {
    /// Report failed rules as warnings and keep going.
    #[default]
    BestEffort,
    /// Fail the run before anything is written.
    FailOnError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityOptions {
    /// Name the evaluation is reported under.
    pub context: String,
    /// Emit outcomes and observations to the pipeline observer.
    pub publish_results: bool,
    pub strategy: QualityStrategy,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            context: "DQContext".to_string(),
            publish_results: true,
            strategy: QualityStrategy::default(),
        }
    }
}

/// Comparison operator of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "=" => Self::Eq,
            "!=" => Self::Ne,
            _ => return None,
        })
    }

    pub fn holds(&self, observed: f64, expected: f64) -> bool {
        match self {
            Self::Gt => observed > expected,
            Self::Ge => observed >= expected,
            Self::Lt => observed < expected,
            Self::Le => observed <= expected,
            Self::Eq => observed == expected,
            Self::Ne => observed != expected,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ne => "!=",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    ColumnCount { op: Comparison, expected: f64 },
    RowCount { op: Comparison, expected: f64 },
    IsComplete { column: String },
    ColumnExists { column: String },
    Completeness { column: String, op: Comparison, expected: f64 },
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnCount { op, expected } => write!(f, "ColumnCount {op} {expected}"),
            Self::RowCount { op, expected } => write!(f, "RowCount {op} {expected}"),
            Self::IsComplete { column } => write!(f, "IsComplete \"{column}\""),
            Self::ColumnExists { column } => write!(f, "ColumnExists \"{column}\""),
            Self::Completeness {
                column,
                op,
                expected,
            } => write!(f, "Completeness \"{column}\" {op} {expected}"),
        }
    }
}

/// A parsed `Rules = [ ... ]` block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

static RULESET_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static RULE_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Result<Regex, regex::Error>>, pattern: &str) -> PipelineResult<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| PipelineError::config(format!("invalid rule pattern: {e}")))
}

const NUMBER: &str = r"([0-9]+(?:\.[0-9]+)?)";
const OP: &str = r"(>=|<=|!=|>|<|=)";

impl RuleSet {
    pub fn parse(text: &str) -> PipelineResult<Self> {
        let outer = compiled(&RULESET_RE, r"(?s)^\s*Rules\s*=\s*\[(.*)\]\s*$")?;
        let body = outer
            .captures(text)
            .and_then(|c| c.get(1))
            .ok_or_else(|| {
                PipelineError::config(format!("ruleset must look like 'Rules = [ ... ]': '{}'", text.trim()))
            })?
            .as_str();

        let pattern = format!(
            r#"^\s*(?:(ColumnCount|RowCount)\s*{OP}\s*{NUMBER}|(IsComplete|ColumnExists)\s+"([^"]*)"|Completeness\s+"([^"]*)"\s*{OP}\s*{NUMBER})\s*(?:,|$)"#
        );
        let rule_re = compiled(&RULE_RE, &pattern)?;

        let mut rules = Vec::new();
        let mut rest = body;
        while !rest.trim().is_empty() {
            let caps = rule_re.captures(rest).ok_or_else(|| {
                PipelineError::config(format!("unrecognized rule near '{}'", rest.trim()))
            })?;
            rules.push(rule_from_captures(&caps)?);
            let consumed = caps.get(0).map_or(rest.len(), |m| m.end());
            rest = &rest[consumed..];
        }
        Ok(Self { rules })
    }
}

fn rule_from_captures(caps: &regex::Captures<'_>) -> PipelineResult<Rule> {
    let text = |i: usize| caps.get(i).map(|m| m.as_str());
    let number = |i: usize| -> PipelineResult<f64> {
        let raw = text(i).unwrap_or_default();
        raw.parse::<f64>()
            .map_err(|e| PipelineError::config(format!("invalid number '{raw}' in rule: {e}")))
    };
    let comparison = |i: usize| -> PipelineResult<Comparison> {
        let raw = text(i).unwrap_or_default();
        Comparison::parse(raw)
            .ok_or_else(|| PipelineError::config(format!("invalid operator '{raw}' in rule")))
    };

    if let Some(kind) = text(1) {
        let (op, expected) = (comparison(2)?, number(3)?);
        return Ok(if kind == "ColumnCount" {
            Rule::ColumnCount { op, expected }
        } else {
            Rule::RowCount { op, expected }
        });
    }
    if let Some(kind) = text(4) {
        let column = text(5).unwrap_or_default().to_string();
        return Ok(if kind == "IsComplete" {
            Rule::IsComplete { column }
        } else {
            Rule::ColumnExists { column }
        });
    }
    Ok(Rule::Completeness {
        column: text(6).unwrap_or_default().to_string(),
        op: comparison(7)?,
        expected: number(8)?,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub rule: String,
    pub passed: bool,
    /// Why the rule failed.
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub context: String,
    pub outcomes: Vec<RuleOutcome>,
    /// Metrics computed during evaluation, always including `RowCount` and `ColumnCount`.
    pub observations: Vec<(String, f64)>,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    /// Turn failed rules into a [`PipelineError::QualityGate`] under [`QualityStrategy::FailOnError`].
    pub fn enforce(&self, strategy: QualityStrategy) -> PipelineResult<()> {
        if strategy == QualityStrategy::BestEffort || self.passed() {
            return Ok(());
        }
        Err(PipelineError::QualityGate {
            context: self.context.clone(),
            failed: self
                .failed()
                .map(|o| match &o.message {
                    Some(m) => format!("{}: {m}", o.rule),
                    None => o.rule.clone(),
                })
                .collect(),
        })
    }
}

/// Evaluates a rule set against a dataset.
pub trait QualityGate: Send + Sync {
    fn evaluate(
        &self,
        dataset: &DataSet,
        ruleset: &str,
        options: &QualityOptions,
    ) -> PipelineResult<QualityReport>;
}

/// The built-in evaluator for [`RuleSet`] text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleSetGate;

impl QualityGate for RuleSetGate {
    fn evaluate(
        &self,
        dataset: &DataSet,
        ruleset: &str,
        options: &QualityOptions,
    ) -> PipelineResult<QualityReport> {
        let rules = RuleSet::parse(ruleset)?;
        let mut observations = vec![
            ("RowCount".to_string(), dataset.row_count() as f64),
            ("ColumnCount".to_string(), dataset.column_count() as f64),
        ];

        let outcomes = rules
            .rules
            .iter()
            .map(|rule| evaluate_rule(dataset, rule, &mut observations))
            .collect();

        Ok(QualityReport {
            context: options.context.clone(),
            outcomes,
            observations,
        })
    }
}

fn evaluate_rule(dataset: &DataSet, rule: &Rule, observations: &mut Vec<(String, f64)>) -> RuleOutcome {
    let compare = |name: &str, observed: f64, op: Comparison, expected: f64| {
        if op.holds(observed, expected) {
            None
        } else {
            Some(format!("{name} is {observed}, expected {op} {expected}"))
        }
    };

    let failure = match rule {
        Rule::ColumnCount { op, expected } => {
            compare("ColumnCount", dataset.column_count() as f64, *op, *expected)
        }
        Rule::RowCount { op, expected } => {
            compare("RowCount", dataset.row_count() as f64, *op, *expected)
        }
        Rule::ColumnExists { column } => dataset
            .schema
            .index_of(column)
            .is_none()
            .then(|| format!("column '{column}' does not exist")),
        Rule::IsComplete { column } => match completeness(dataset, column) {
            Some(ratio) => {
                observations.push((format!("Completeness.{column}"), ratio));
                (ratio < 1.0).then(|| format!("column '{column}' is {ratio} complete"))
            }
            None => Some(format!("column '{column}' does not exist")),
        },
        Rule::Completeness {
            column,
            op,
            expected,
        } => match completeness(dataset, column) {
            Some(ratio) => {
                observations.push((format!("Completeness.{column}"), ratio));
                compare(&format!("Completeness of '{column}'"), ratio, *op, *expected)
            }
            None => Some(format!("column '{column}' does not exist")),
        },
    };

    RuleOutcome {
        rule: rule.to_string(),
        passed: failure.is_none(),
        message: failure,
    }
}

/// Share of non-null cells in `column`; an empty table is complete.
fn completeness(dataset: &DataSet, column: &str) -> Option<f64> {
    let values = dataset.column_values(column)?;
    let rows = dataset.row_count();
    if rows == 0 {
        return Some(1.0);
    }
    let present = values.filter(|v| !v.is_null()).count();
    Some(present as f64 / rows as f64)
}
