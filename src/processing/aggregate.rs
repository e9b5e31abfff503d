//! Group-by aggregation for [`crate::types::DataSet`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Built-in aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    /// Sum numeric values, ignoring nulls.
    Sum,
    /// Arithmetic mean of numeric values, ignoring nulls. Always `Float64`.
    Avg,
    /// Minimum value, ignoring nulls.
    Min,
    /// Maximum value, ignoring nulls.
    Max,
    /// Count all rows in the group (including nulls).
    Count,
    /// Count distinct non-null values.
    CountDistinct,
}

impl AggregateFunction {
    /// Canonical lowercase name, used as the derived column prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::CountDistinct => "count_distinct",
        }
    }

    /// Output type of this function over a column of type `input`.
    fn output_type(&self, column: &str, input: &DataType) -> PipelineResult<DataType> {
        let unsupported = || {
            PipelineError::config(format!(
                "{}() is not supported on column '{column}' of type {input}",
                self.name()
            ))
        };
        match self {
            Self::Count => Ok(DataType::Int64),
            Self::CountDistinct if input.is_scalar() => Ok(DataType::Int64),
            Self::Sum if input.is_numeric() => Ok(input.clone()),
            Self::Avg if input.is_numeric() => Ok(DataType::Float64),
            Self::Min | Self::Max => match input {
                DataType::Int64 | DataType::Float64 | DataType::Utf8 | DataType::Bool => {
                    Ok(input.clone())
                }
                _ => Err(unsupported()),
            },
            _ => Err(unsupported()),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregateFunction {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "avg" | "mean" => Ok(Self::Avg),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "count" => Ok(Self::Count),
            "count_distinct" | "countdistinct" => Ok(Self::CountDistinct),
            other => Err(PipelineError::config(format!(
                "unknown aggregate function '{other}' (expected sum, avg, min, max, count, count_distinct)"
            ))),
        }
    }
}

/// One `(source column, function)` projection. The derived column is named
/// `"{function}_{column}"` after the canonical lowercase function name, whatever spelling or alias
/// the caller used: `("high", "mean")` and `("high", "AVG")` both produce `avg_high`, so asking for
/// both in one call is a duplicate-column error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub column: String,
    pub function: String,
}

impl AggregateSpec {
    pub fn new(column: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            function: function.into(),
        }
    }

    /// Parse the function name.
    pub fn parsed_function(&self) -> PipelineResult<AggregateFunction> {
        self.function.parse()
    }

    /// Name of the derived output column.
    pub fn output_name(&self) -> PipelineResult<String> {
        Ok(format!("{}_{}", self.parsed_function()?, self.column))
    }
}

static NULL: Value = Value::Null;

struct CompiledAggregate {
    source: usize,
    source_type: DataType,
    function: AggregateFunction,
    output: Field,
}

/// Group `dataset` by `group_by` and compute one derived column per [`AggregateSpec`].
///
/// - An empty `group_by` puts every row in a single group, so exactly one row comes back, even
///   for an empty dataset.
/// - Null group values form their own group.
/// - Output rows are ordered by first appearance of their group key.
/// - Unknown functions, unknown columns and unsupported column types fail with
///   [`PipelineError::Configuration`] before any row is read.
pub fn aggregate<S: AsRef<str>>(
    dataset: &DataSet,
    group_by: &[S],
    specs: &[AggregateSpec],
) -> PipelineResult<DataSet> {
    let (group_fields, group_idxs, compiled) = compile(&dataset.schema, group_by, specs)?;

    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
    for (row_idx, row) in dataset.rows.iter().enumerate() {
        let key: Vec<Value> = group_idxs
            .iter()
            .zip(&group_fields)
            .map(|(&i, field)| coerce(row.get(i).unwrap_or(&NULL), &field.data_type))
            .collect();
        match index.get(&key) {
            Some(&g) => groups[g].1.push(row_idx),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![row_idx]));
            }
        }
    }
    if group_idxs.is_empty() && groups.is_empty() {
        groups.push((Vec::new(), Vec::new()));
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut out = key;
        for agg in &compiled {
            let values = members.iter().map(|&r| {
                coerce(
                    dataset.rows[r].get(agg.source).unwrap_or(&NULL),
                    &agg.source_type,
                )
            });
            out.push(evaluate(agg, values)?);
        }
        rows.push(out);
    }

    let mut fields = group_fields;
    fields.extend(compiled.into_iter().map(|agg| agg.output));
    Ok(DataSet::new(Schema::new(fields), rows))
}

fn compile<S: AsRef<str>>(
    schema: &Schema,
    group_by: &[S],
    specs: &[AggregateSpec],
) -> PipelineResult<(Vec<Field>, Vec<usize>, Vec<CompiledAggregate>)> {
    let mut names = HashSet::new();
    let mut group_fields = Vec::with_capacity(group_by.len());
    let mut group_idxs = Vec::with_capacity(group_by.len());

    for name in group_by {
        let name = name.as_ref();
        let idx = schema
            .index_of(name)
            .ok_or_else(|| PipelineError::config(format!("unknown group column '{name}'")))?;
        let field = &schema.fields[idx];
        if !field.data_type.is_scalar() {
            return Err(PipelineError::config(format!(
                "cannot group by column '{name}' of type {}",
                field.data_type
            )));
        }
        if !names.insert(name.to_string()) {
            return Err(PipelineError::config(format!("duplicate group column '{name}'")));
        }
        group_fields.push(field.clone());
        group_idxs.push(idx);
    }

    let mut compiled = Vec::with_capacity(specs.len());
    for spec in specs {
        let function = spec.parsed_function()?;
        let source = schema.index_of(&spec.column).ok_or_else(|| {
            PipelineError::config(format!("unknown aggregate column '{}'", spec.column))
        })?;
        let source_type = schema.fields[source].data_type.clone();
        let output_type = function.output_type(&spec.column, &source_type)?;
        let output_name = format!("{function}_{}", spec.column);
        if !names.insert(output_name.clone()) {
            return Err(PipelineError::config(format!(
                "duplicate output column '{output_name}'"
            )));
        }
        compiled.push(CompiledAggregate {
            source,
            source_type,
            function,
            output: Field::new(output_name, output_type),
        });
    }

    Ok((group_fields, group_idxs, compiled))
}

/// Integers stored in float columns are widened so keys and extrema compare numerically.
fn coerce(value: &Value, data_type: &DataType) -> Value {
    match (data_type, value) {
        (DataType::Float64, Value::Int64(v)) => Value::float(*v as f64),
        _ => value.clone(),
    }
}

fn evaluate<I>(agg: &CompiledAggregate, values: I) -> PipelineResult<Value>
where
    I: Iterator<Item = Value>,
{
    match agg.function {
        AggregateFunction::Count => Ok(Value::Int64(values.count() as i64)),
        AggregateFunction::CountDistinct => {
            let distinct: HashSet<Value> = values.filter(|v| !v.is_null()).collect();
            Ok(Value::Int64(distinct.len() as i64))
        }
        AggregateFunction::Min => Ok(values.filter(|v| !v.is_null()).min().unwrap_or(Value::Null)),
        AggregateFunction::Max => Ok(values.filter(|v| !v.is_null()).max().unwrap_or(Value::Null)),
        AggregateFunction::Avg => {
            let (sum, n) = values
                .filter_map(|v| v.as_f64())
                .fold((0.0_f64, 0_usize), |(s, n), x| (s + x, n + 1));
            Ok(if n == 0 {
                Value::Null
            } else {
                Value::float(sum / n as f64)
            })
        }
        AggregateFunction::Sum => match agg.source_type {
            DataType::Int64 => {
                let mut acc: Option<i64> = None;
                for v in values {
                    if let Value::Int64(x) = v {
                        let next = acc.unwrap_or(0).checked_add(x).ok_or_else(|| {
                            PipelineError::config(format!(
                                "'{}' overflows int64; declare the source column as float64",
                                agg.output.name
                            ))
                        })?;
                        acc = Some(next);
                    }
                }
                Ok(acc.map(Value::Int64).unwrap_or(Value::Null))
            }
            _ => {
                let mut acc: Option<f64> = None;
                for v in values {
                    if let Some(x) = v.as_f64() {
                        acc = Some(acc.unwrap_or(0.0) + x);
                    }
                }
                Ok(acc.map(Value::float).unwrap_or(Value::Null))
            }
        },
    }
}
