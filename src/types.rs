//! Core data model types.
//!
//! A [`DataSet`] is an in-memory table of rows described by a [`Schema`] tree. Schema fields are
//! either records ([`DataType::Struct`]), arrays of records (`List(Struct)`) or leaves. Rows are
//! positional: slot `i` of a row (or of a [`Value::Record`]) holds the value of field `i` at that
//! schema level.

use std::fmt;

use ordered_float::OrderedFloat;

use crate::error::{PipelineError, PipelineResult};

/// Logical data type for a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// No value was ever observed, so no type could be inferred.
    Null,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// UTF-8 string.
    Utf8,
    /// Variable-length list of a single element type.
    List(Box<DataType>),
    /// Nested record with ordered child fields.
    Struct(Vec<Field>),
}

/// Structural role of a field in the schema tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A nested record; its children are walked.
    Record,
    /// A list whose elements are records; the element fields are walked in the parent's namespace.
    ArrayOfRecord,
    /// Anything else: scalars and lists of non-record elements.
    Leaf,
}

/// Declared type class of a leaf, used for null-likeness judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafClass {
    /// Compared against the null string set.
    StringLike,
    /// Compared against the null numeric set.
    NumericLike,
    /// No declared type at all; always null-like.
    Absent,
    /// Types the null sets do not cover; never null-like.
    OtherUnsupported,
}

impl DataType {
    /// Shorthand for `DataType::List(Box::new(element))`.
    pub fn list(element: DataType) -> Self {
        Self::List(Box::new(element))
    }

    /// Structural role of a field of this type.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Struct(_) => FieldKind::Record,
            Self::List(inner) if matches!(**inner, Self::Struct(_)) => FieldKind::ArrayOfRecord,
            _ => FieldKind::Leaf,
        }
    }

    /// Declared leaf class. Lists of scalars take the class of their element.
    pub fn leaf_class(&self) -> LeafClass {
        match self {
            Self::Utf8 => LeafClass::StringLike,
            Self::Int64 | Self::Float64 => LeafClass::NumericLike,
            Self::Null => LeafClass::Absent,
            Self::List(inner) => match **inner {
                Self::Utf8 | Self::Int64 | Self::Float64 | Self::Null => inner.leaf_class(),
                _ => LeafClass::OtherUnsupported,
            },
            Self::Bool | Self::Struct(_) => LeafClass::OtherUnsupported,
        }
    }

    /// Returns `true` for `Int64` and `Float64`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }

    /// Returns `true` for types that are neither lists nor records.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Struct(_))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool => f.write_str("bool"),
            Self::Int64 => f.write_str("int64"),
            Self::Float64 => f.write_str("float64"),
            Self::Utf8 => f.write_str("utf8"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Struct(fields) => {
                f.write_str("struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.data_type)?;
                }
                f.write_str(">")
            }
        }
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Create a nested record field.
    pub fn record(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::new(name, DataType::Struct(fields))
    }

    /// Structural role of this field.
    pub fn kind(&self) -> FieldKind {
        self.data_type.kind()
    }
}

/// Root of the schema tree: the ordered top-level fields of every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate top-level field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a top-level field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns a top-level field by name, if present.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single value in a [`DataSet`].
///
/// Values are totally ordered and hashable (floats compare via [`OrderedFloat`]) so they can be
/// collected into sets, used as grouping keys and compared row-by-row for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// Missing/absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(OrderedFloat<f64>),
    /// UTF-8 string.
    Utf8(String),
    /// List cell.
    List(Vec<Value>),
    /// Nested record, positional over the child fields of its [`DataType::Struct`].
    Record(Vec<Value>),
}

impl Value {
    /// Float value from a plain `f64`.
    pub fn float(v: f64) -> Self {
        Self::Float64(OrderedFloat(v))
    }

    /// String value.
    pub fn utf8(s: impl Into<String>) -> Self {
        Self::Utf8(s.into())
    }

    /// Returns `true` for the absent marker [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of `Int64` and `Float64` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(v.0),
            _ => None,
        }
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int64(_) => "int64",
            Self::Float64(_) => "float64",
            Self::Utf8(_) => "utf8",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{}", v.0),
            Self::Utf8(s) => f.write_str(s),
            Self::List(items) | Self::Record(items) => {
                let (open, close) = if matches!(self, Self::List(_)) {
                    ("[", "]")
                } else {
                    ("{", "}")
                };
                f.write_str(open)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(close)
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Utf8(v)
    }
}

static NULL: Value = Value::Null;

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the top-level [`Schema`] fields.
/// Every pipeline stage takes a `&DataSet` and returns a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of top-level columns.
    pub fn column_count(&self) -> usize {
        self.schema.fields.len()
    }

    /// Iterate the values of a top-level column, or `None` if the column does not exist.
    pub fn column_values<'a>(
        &'a self,
        name: &str,
    ) -> Option<impl Iterator<Item = &'a Value> + use<'a>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(move |row| row.get(idx).unwrap_or(&NULL)))
    }

    /// Check that every row conforms to the schema.
    ///
    /// `Null` is accepted in any slot and `Int64` is accepted where `Float64` is declared.
    pub fn validate(&self) -> PipelineResult<()> {
        for (idx0, row) in self.rows.iter().enumerate() {
            let row_num = idx0 + 1;
            if row.len() != self.schema.fields.len() {
                return Err(PipelineError::mismatch(format!(
                    "row {row_num} has {} values, schema has {} fields",
                    row.len(),
                    self.schema.fields.len()
                )));
            }
            for (field, value) in self.schema.fields.iter().zip(row) {
                check_value(&field.name, &field.data_type, value).map_err(|message| {
                    PipelineError::mismatch(format!("row {row_num}: {message}"))
                })?;
            }
        }
        Ok(())
    }
}

fn check_value(path: &str, data_type: &DataType, value: &Value) -> Result<(), String> {
    match (data_type, value) {
        (_, Value::Null)
        | (DataType::Bool, Value::Bool(_))
        | (DataType::Int64, Value::Int64(_))
        | (DataType::Float64, Value::Float64(_) | Value::Int64(_))
        | (DataType::Utf8, Value::Utf8(_)) => Ok(()),
        (DataType::List(element), Value::List(items)) => items
            .iter()
            .try_for_each(|item| check_value(path, element, item)),
        (DataType::Struct(fields), Value::Record(values)) => {
            if fields.len() != values.len() {
                return Err(format!(
                    "'{path}' record has {} values, schema has {} fields",
                    values.len(),
                    fields.len()
                ));
            }
            fields.iter().zip(values).try_for_each(|(field, v)| {
                check_value(&format!("{path}.{}", field.name), &field.data_type, v)
            })
        }
        _ => Err(format!(
            "'{path}' expects {data_type}, found {}",
            value.type_name()
        )),
    }
}
