//! Column pruning for [`crate::types::DataSet`].

use std::collections::BTreeSet;

use crate::detect::FieldPath;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

static NULL: Value = Value::Null;

/// Slots kept at one record level, with a nested plan for records that lose children.
struct LevelPlan {
    keep: Vec<(usize, Option<LevelPlan>)>,
}

/// Returns a new [`DataSet`] with the fields at `paths` removed from the schema and every row.
///
/// - An empty `paths` list returns an unchanged copy.
/// - Paths inside arrays of records are removed from every element record.
/// - Records left without children are kept as empty records.
/// - A path that does not name a field is a [`PipelineError::Configuration`] error.
pub fn prune_columns(dataset: &DataSet, paths: &[FieldPath]) -> PipelineResult<DataSet> {
    if paths.is_empty() {
        return Ok(dataset.clone());
    }

    let mut unmatched: BTreeSet<FieldPath> = paths.iter().cloned().collect();
    let (fields, plan) = plan_level(
        &dataset.schema.fields,
        &FieldPath::new(Vec::new()),
        paths,
        &mut unmatched,
    );
    if let Some(path) = unmatched.first() {
        return Err(PipelineError::config(format!(
            "cannot prune '{path}': no such field"
        )));
    }

    let rows = dataset
        .rows
        .iter()
        .map(|row| apply_level(&plan, row))
        .collect();
    Ok(DataSet::new(Schema::new(fields), rows))
}

fn plan_level(
    fields: &[Field],
    prefix: &FieldPath,
    removals: &[FieldPath],
    unmatched: &mut BTreeSet<FieldPath>,
) -> (Vec<Field>, LevelPlan) {
    let mut out_fields = Vec::with_capacity(fields.len());
    let mut keep = Vec::with_capacity(fields.len());

    for (idx, field) in fields.iter().enumerate() {
        let path = prefix.child(&field.name);
        if removals.contains(&path) {
            unmatched.remove(&path);
            continue;
        }
        if !removals.iter().any(|r| path.is_ancestor_of(r)) {
            out_fields.push(field.clone());
            keep.push((idx, None));
            continue;
        }

        let record_children = match &field.data_type {
            DataType::Struct(children) => Some((children, false)),
            DataType::List(inner) => match inner.as_ref() {
                DataType::Struct(children) => Some((children, true)),
                _ => None,
            },
            _ => None,
        };

        match record_children {
            Some((children, in_array)) => {
                let (children, sub) = plan_level(children, &path, removals, unmatched);
                let record = DataType::Struct(children);
                let data_type = if in_array {
                    DataType::list(record)
                } else {
                    record
                };
                out_fields.push(Field::new(field.name.clone(), data_type));
                keep.push((idx, Some(sub)));
            }
            // Removals below a leaf stay unmatched and are reported by the caller.
            None => {
                out_fields.push(field.clone());
                keep.push((idx, None));
            }
        }
    }

    (out_fields, LevelPlan { keep })
}

fn apply_level(plan: &LevelPlan, slots: &[Value]) -> Vec<Value> {
    plan.keep
        .iter()
        .map(|(idx, sub)| {
            let value = slots.get(*idx).unwrap_or(&NULL);
            match sub {
                Some(sub) => apply_nested(sub, value),
                None => value.clone(),
            }
        })
        .collect()
}

fn apply_nested(plan: &LevelPlan, value: &Value) -> Value {
    match value {
        Value::Record(children) => Value::Record(apply_level(plan, children)),
        Value::List(items) => Value::List(items.iter().map(|item| apply_nested(plan, item)).collect()),
        other => other.clone(),
    }
}
