//! JSON ingestion implementation.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single JSON object
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Nested objects map to `Struct` fields, arrays of objects to `List(Struct)` and other arrays to
//! `List` of their element type. Keys missing at any depth read as [`Value::Null`].

use std::fs;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Ingest JSON into an in-memory `DataSet`, inferring the schema when `schema` is `None`.
pub fn ingest_json_from_path(
    path: impl AsRef<Path>,
    schema: Option<&Schema>,
) -> PipelineResult<DataSet> {
    let text = fs::read_to_string(path)?;
    ingest_json_from_str(&text, schema)
}

/// Ingest JSON from an in-memory string into a [`DataSet`].
pub fn ingest_json_from_str(input: &str, schema: Option<&Schema>) -> PipelineResult<DataSet> {
    let values = parse_documents(input)?;
    let objects = values
        .iter()
        .enumerate()
        .map(|(idx0, v)| {
            v.as_object()
                .ok_or_else(|| PipelineError::mismatch(format!("row {} is not a json object", idx0 + 1)))
        })
        .collect::<PipelineResult<Vec<&JsonMap>>>()?;

    let inferred;
    let schema = match schema {
        Some(schema) => schema,
        None => {
            inferred = infer_json_schema(&objects)?;
            &inferred
        }
    };

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(objects.len());
    for (idx0, obj) in objects.iter().enumerate() {
        rows.push(convert_object(idx0 + 1, "", &schema.fields, obj)?);
    }
    Ok(DataSet::new(schema.clone(), rows))
}

fn parse_documents(input: &str) -> PipelineResult<Vec<serde_json::Value>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::mismatch("json input is empty"));
    }

    // First try parsing as a single JSON value (array or object).
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return match v {
            serde_json::Value::Array(items) => Ok(items),
            serde_json::Value::Object(_) => Ok(vec![v]),
            _ => Err(PipelineError::mismatch(
                "json must be an object, an array of objects, or NDJSON",
            )),
        };
    }

    // Fall back to NDJSON.
    let mut values = Vec::new();
    for (i, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
            PipelineError::mismatch(format!("invalid ndjson at line {}: {}", i + 1, e))
        })?;
        values.push(v);
    }
    Ok(values)
}

/// Infer a nested schema from JSON objects, merging types across rows.
///
/// `null` + T = T, `Int64` + `Float64` = `Float64`, struct fields merge in first-seen order.
/// Any other disagreement is a [`PipelineError::SchemaMismatch`].
pub fn infer_json_schema(objects: &[&JsonMap]) -> PipelineResult<Schema> {
    let mut fields: Vec<Field> = Vec::new();
    for obj in objects {
        merge_object_fields(&mut fields, "", obj)?;
    }
    Ok(Schema::new(fields))
}

fn merge_object_fields(fields: &mut Vec<Field>, prefix: &str, obj: &JsonMap) -> PipelineResult<()> {
    for (key, value) in obj {
        let path = join(prefix, key);
        let observed = json_type(&path, value)?;
        match fields.iter_mut().find(|f| &f.name == key) {
            Some(field) => {
                let current = std::mem::replace(&mut field.data_type, DataType::Null);
                field.data_type = merge_types(&path, current, observed)?;
            }
            None => fields.push(Field::new(key.clone(), observed)),
        }
    }
    Ok(())
}

fn json_type(path: &str, value: &serde_json::Value) -> PipelineResult<DataType> {
    Ok(match value {
        serde_json::Value::Null => DataType::Null,
        serde_json::Value::Bool(_) => DataType::Bool,
        serde_json::Value::Number(n) if n.is_i64() => DataType::Int64,
        serde_json::Value::Number(_) => DataType::Float64,
        serde_json::Value::String(_) => DataType::Utf8,
        serde_json::Value::Array(items) => {
            let mut element = DataType::Null;
            for item in items {
                element = merge_types(path, element, json_type(path, item)?)?;
            }
            DataType::list(element)
        }
        serde_json::Value::Object(map) => {
            let mut fields = Vec::new();
            merge_object_fields(&mut fields, path, map)?;
            DataType::Struct(fields)
        }
    })
}

fn merge_types(path: &str, current: DataType, observed: DataType) -> PipelineResult<DataType> {
    match (current, observed) {
        (DataType::Null, t) | (t, DataType::Null) => Ok(t),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            Ok(DataType::Float64)
        }
        (DataType::List(a), DataType::List(b)) => Ok(DataType::list(merge_types(path, *a, *b)?)),
        (DataType::Struct(mut a), DataType::Struct(b)) => {
            for field in b {
                let child = join(path, &field.name);
                match a.iter_mut().find(|f| f.name == field.name) {
                    Some(existing) => {
                        let current = std::mem::replace(&mut existing.data_type, DataType::Null);
                        existing.data_type = merge_types(&child, current, field.data_type)?;
                    }
                    None => a.push(field),
                }
            }
            Ok(DataType::Struct(a))
        }
        (a, b) if a == b => Ok(a),
        (a, b) => Err(PipelineError::mismatch(format!(
            "field '{path}' has conflicting types {a} and {b}"
        ))),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn convert_object(row: usize, prefix: &str, fields: &[Field], obj: &JsonMap) -> PipelineResult<Vec<Value>> {
    fields
        .iter()
        .map(|field| match obj.get(&field.name) {
            Some(v) => convert_json_value(row, &join(prefix, &field.name), &field.data_type, v),
            None => Ok(Value::Null),
        })
        .collect()
}

/// Convert one JSON value to a [`Value`] of `data_type`. `column` is the dotted path for errors.
pub(crate) fn convert_json_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    v: &serde_json::Value,
) -> PipelineResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }

    let parse_error = |message: &str| PipelineError::ParseError {
        row,
        column: column.to_string(),
        raw: v.to_string(),
        message: message.to_string(),
    };

    match data_type {
        DataType::Utf8 => v
            .as_str()
            .map(Value::utf8)
            .ok_or_else(|| parse_error("expected string")),
        DataType::Bool => v
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| parse_error("expected bool")),
        DataType::Int64 => {
            if let Some(n) = v.as_i64() {
                Ok(Value::Int64(n))
            } else if v.is_u64() {
                Err(parse_error("u64 out of range for i64"))
            } else {
                Err(parse_error("expected integer number"))
            }
        }
        DataType::Float64 => v
            .as_f64()
            .map(Value::float)
            .ok_or_else(|| parse_error("expected number")),
        DataType::Null => Err(parse_error("expected null")),
        DataType::List(element) => {
            let items = v.as_array().ok_or_else(|| parse_error("expected array"))?;
            items
                .iter()
                .map(|item| convert_json_value(row, column, element, item))
                .collect::<PipelineResult<Vec<_>>>()
                .map(Value::List)
        }
        DataType::Struct(children) => {
            let obj = v.as_object().ok_or_else(|| parse_error("expected object"))?;
            convert_object(row, column, children, obj).map(Value::Record)
        }
    }
}
