//! Depth-first enumeration of schema leaves.
//!
//! Records are descended into with their name appended to the path. Arrays of records are
//! descended into without an index segment, so `fills: list<struct<px>>` yields the leaf
//! `fills.px`. Every other field is a leaf.

use std::collections::HashSet;
use std::fmt;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataType, Field, LeafClass, Schema};

/// Default nesting limit for [`walk`].
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Dotted path of field names identifying a field in the schema tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Path from its field names, outermost first.
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Split a dotted string (`"meta.venue"`) into a path.
    pub fn parse(dotted: &str) -> Self {
        Self(dotted.split('.').map(str::to_string).collect())
    }

    /// Field names from the top-level column down to the field.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Path of a child field of `self`.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// Returns `true` if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &FieldPath) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

/// A leaf reached by the walker.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafField {
    /// Dotted path of the leaf.
    pub path: FieldPath,
    /// Positional slot index at every level from the row down to the leaf.
    pub route: Vec<usize>,
    /// Declared type of the leaf.
    pub data_type: DataType,
    /// Leaf class derived from `data_type`.
    pub class: LeafClass,
}

struct Frame<'a> {
    fields: &'a [Field],
    next: usize,
    prefix: Vec<String>,
    route: Vec<usize>,
}

/// Lazy depth-first iterator over the leaves of a schema.
///
/// Yields a [`PipelineError::SchemaTraversal`] and then stops if a record level has empty,
/// dotted or duplicate field names, or if nesting goes deeper than `max_depth`.
pub struct LeafIter<'a> {
    stack: Vec<Frame<'a>>,
    max_depth: usize,
    pending: Option<PipelineError>,
    failed: bool,
}

/// Walk `schema` depth-first, parent before children, in field order.
pub fn walk(schema: &Schema, max_depth: usize) -> LeafIter<'_> {
    let pending = check_siblings(&schema.fields, &[]).err();
    LeafIter {
        stack: vec![Frame {
            fields: &schema.fields,
            next: 0,
            prefix: Vec::new(),
            route: Vec::new(),
        }],
        max_depth,
        pending,
        failed: false,
    }
}

/// Collect every leaf of `schema`, failing on the first traversal error.
pub fn leaves(schema: &Schema, max_depth: usize) -> PipelineResult<Vec<LeafField>> {
    walk(schema, max_depth).collect()
}

impl<'a> LeafIter<'a> {
    fn descend(
        &mut self,
        children: &'a [Field],
        prefix: Vec<String>,
        route: Vec<usize>,
    ) -> PipelineResult<()> {
        if prefix.len() >= self.max_depth {
            return Err(PipelineError::SchemaTraversal {
                path: prefix.join("."),
                message: format!("nesting exceeds max depth {}", self.max_depth),
            });
        }
        check_siblings(children, &prefix)?;
        self.stack.push(Frame {
            fields: children,
            next: 0,
            prefix,
            route,
        });
        Ok(())
    }
}

impl<'a> Iterator for LeafIter<'a> {
    type Item = PipelineResult<LeafField>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(err) = self.pending.take() {
            self.failed = true;
            return Some(Err(err));
        }

        loop {
            let frame = self.stack.last_mut()?;
            let fields = frame.fields;
            if frame.next >= fields.len() {
                self.stack.pop();
                continue;
            }
            let idx = frame.next;
            frame.next += 1;

            let field = &fields[idx];
            let mut prefix = frame.prefix.clone();
            prefix.push(field.name.clone());
            let mut route = frame.route.clone();
            route.push(idx);

            let children = match &field.data_type {
                DataType::Struct(children) => Some(children),
                DataType::List(inner) => match inner.as_ref() {
                    DataType::Struct(children) => Some(children),
                    _ => None,
                },
                _ => None,
            };

            match children {
                Some(children) => {
                    if let Err(err) = self.descend(children, prefix, route) {
                        self.failed = true;
                        return Some(Err(err));
                    }
                }
                None => {
                    return Some(Ok(LeafField {
                        path: FieldPath::new(prefix),
                        route,
                        data_type: field.data_type.clone(),
                        class: field.data_type.leaf_class(),
                    }));
                }
            }
        }
    }
}

fn check_siblings(fields: &[Field], prefix: &[String]) -> PipelineResult<()> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        let problem = if field.name.is_empty() {
            Some("empty field name")
        } else if field.name.contains('.') {
            Some("field name contains '.'")
        } else if !seen.insert(field.name.as_str()) {
            Some("duplicate field name")
        } else {
            None
        };
        if let Some(problem) = problem {
            let mut path = prefix.to_vec();
            path.push(field.name.clone());
            return Err(PipelineError::SchemaTraversal {
                path: path.join("."),
                message: problem.to_string(),
            });
        }
    }
    Ok(())
}
