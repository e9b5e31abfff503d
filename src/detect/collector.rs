//! Per-leaf value-set collection.
//!
//! Cells are normalized before they reach the set: list cells are flattened element-wise,
//! strings are trimmed, everything else (including `Null`) is kept as is. A missing parent
//! record yields a single `Null` for the leaf; an empty array of records yields nothing.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use crate::types::{DataSet, Value};

use super::walker::LeafField;

/// Distinct normalized values observed at one leaf path.
pub type ValueSet = BTreeSet<Value>;

static NULL: Value = Value::Null;

/// Collect the distinct normalized values of `leaf` across every row of `dataset`.
pub fn collect_value_set(dataset: &DataSet, leaf: &LeafField) -> ValueSet {
    let mut out = ValueSet::new();
    for row in &dataset.rows {
        let _ = visit_leaf(row, &leaf.route, &mut |v: &Value| -> ControlFlow<()> {
            if !out.contains(v) {
                out.insert(v.clone());
            }
            ControlFlow::Continue(())
        });
    }
    out
}

/// Scan `leaf` until `accept` rejects a normalized value.
///
/// Returns the rejected value (if any) and the number of rows scanned.
pub fn find_rejected<F>(dataset: &DataSet, leaf: &LeafField, mut accept: F) -> (Option<Value>, usize)
where
    F: FnMut(&Value) -> bool,
{
    for (idx, row) in dataset.rows.iter().enumerate() {
        let flow = visit_leaf(row, &leaf.route, &mut |v: &Value| {
            if accept(v) {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(v.clone())
            }
        });
        if let ControlFlow::Break(rejected) = flow {
            return (Some(rejected), idx + 1);
        }
    }
    (None, dataset.row_count())
}

fn visit_leaf<B, F>(slots: &[Value], route: &[usize], f: &mut F) -> ControlFlow<B>
where
    F: FnMut(&Value) -> ControlFlow<B>,
{
    let Some((&idx, rest)) = route.split_first() else {
        return ControlFlow::Continue(());
    };
    let value = slots.get(idx).unwrap_or(&NULL);
    if rest.is_empty() {
        visit_normalized(value, f)
    } else {
        visit_nested(value, rest, f)
    }
}

fn visit_nested<B, F>(value: &Value, rest: &[usize], f: &mut F) -> ControlFlow<B>
where
    F: FnMut(&Value) -> ControlFlow<B>,
{
    match value {
        Value::Record(children) => visit_leaf(children, rest, f),
        Value::List(items) => {
            for item in items {
                visit_nested(item, rest, f)?;
            }
            ControlFlow::Continue(())
        }
        _ => f(&NULL),
    }
}

fn visit_normalized<B, F>(value: &Value, f: &mut F) -> ControlFlow<B>
where
    F: FnMut(&Value) -> ControlFlow<B>,
{
    match value {
        Value::List(items) => {
            for item in items {
                visit_normalized(item, f)?;
            }
            ControlFlow::Continue(())
        }
        Value::Utf8(s) => {
            let trimmed = s.trim();
            if trimmed.len() == s.len() {
                f(value)
            } else {
                f(&Value::Utf8(trimmed.to_string()))
            }
        }
        other => f(other),
    }
}
