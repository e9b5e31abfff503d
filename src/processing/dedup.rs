//! Row deduplication for [`crate::types::DataSet`].

use std::collections::HashSet;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, Value};

/// Returns a new [`DataSet`] keeping only the first occurrence of each distinct row.
///
/// Rows are compared on every field, recursively for nested records and lists. Surviving rows
/// keep their input order.
pub fn dedup(dataset: &DataSet) -> DataSet {
    let mut seen: HashSet<&[Value]> = HashSet::with_capacity(dataset.row_count());
    let mut rows = Vec::new();
    for row in &dataset.rows {
        if seen.insert(row.as_slice()) {
            rows.push(row.clone());
        }
    }
    DataSet::new(dataset.schema.clone(), rows)
}

/// Like [`dedup`], but two rows are duplicates when they agree on `columns` only.
///
/// Returns a [`PipelineError::Configuration`] error if a column does not exist.
pub fn dedup_on<S: AsRef<str>>(dataset: &DataSet, columns: &[S]) -> PipelineResult<DataSet> {
    let idxs = columns
        .iter()
        .map(|c| {
            let c = c.as_ref();
            dataset
                .schema
                .index_of(c)
                .ok_or_else(|| PipelineError::config(format!("unknown dedup column '{c}'")))
        })
        .collect::<PipelineResult<Vec<usize>>>()?;

    let mut seen: HashSet<Vec<&Value>> = HashSet::with_capacity(dataset.row_count());
    let mut rows = Vec::new();
    for row in &dataset.rows {
        let key: Vec<&Value> = idxs.iter().filter_map(|&i| row.get(i)).collect();
        if seen.insert(key) {
            rows.push(row.clone());
        }
    }
    Ok(DataSet::new(dataset.schema.clone(), rows))
}
