//! Record sinks: write a finished [`DataSet`] as CSV or NDJSON.
//!
//! A batch is rendered fully in memory before the target file is touched, so a failing batch
//! leaves no partial output behind.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::{CsvOptions, IngestionFormat};
use crate::types::{DataSet, DataType, Field, Value};

/// Destination for the pipeline's output batch.
pub trait RecordSink {
    /// Short human-readable name used in events and error context.
    fn describe(&self) -> String;

    /// Write the whole batch, or return an error having written nothing.
    fn write(&self, dataset: &DataSet) -> PipelineResult<()>;
}

/// Writes a header row plus one line per row. Nested cells are written as JSON text, `Null` as an
/// empty cell, and floats always with a decimal point or exponent.
#[derive(Debug, Clone)]
pub struct CsvSink {
    pub path: PathBuf,
    pub options: CsvOptions,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: CsvOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }
}

impl RecordSink for CsvSink {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn write(&self, dataset: &DataSet) -> PipelineResult<()> {
        let bytes = render_csv(dataset, &self.options)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

/// Writes one JSON object per row (NDJSON), nested records as nested objects.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    pub path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for JsonLinesSink {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn write(&self, dataset: &DataSet) -> PipelineResult<()> {
        let bytes = render_json_lines(dataset)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

/// Sink chosen by `path`'s extension (`csv`, `json`, `ndjson`, `jsonl`) unless `format` is given.
pub struct PathSink {
    inner: Box<dyn RecordSink + Send + Sync>,
}

impl PathSink {
    pub fn new(path: impl AsRef<Path>, format: Option<IngestionFormat>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let format = match format {
            Some(f) => f,
            None => IngestionFormat::from_path(path)?,
        };
        let inner: Box<dyn RecordSink + Send + Sync> = match format {
            IngestionFormat::Csv => Box::new(CsvSink::new(path)),
            IngestionFormat::Json => Box::new(JsonLinesSink::new(path)),
        };
        Ok(Self { inner })
    }
}

impl fmt::Debug for PathSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSink")
            .field("target", &self.inner.describe())
            .finish()
    }
}

impl RecordSink for PathSink {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn write(&self, dataset: &DataSet) -> PipelineResult<()> {
        self.inner.write(dataset)
    }
}

/// Write `dataset` to `path`, picking the format by extension.
pub fn write_to_path(path: impl AsRef<Path>, dataset: &DataSet) -> PipelineResult<()> {
    PathSink::new(path, None)?.write(dataset)
}

/// Render `dataset` as CSV bytes.
pub fn render_csv(dataset: &DataSet, options: &CsvOptions) -> PipelineResult<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .from_writer(Vec::new());

    wtr.write_record(dataset.schema.field_names())?;
    for row in &dataset.rows {
        let cells = dataset
            .schema
            .fields
            .iter()
            .zip(row)
            .map(|(field, value)| csv_cell(value, &field.data_type))
            .collect::<PipelineResult<Vec<String>>>()?;
        wtr.write_record(&cells)?;
    }
    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))
}

fn csv_cell(value: &Value, data_type: &DataType) -> PipelineResult<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::List(_) | Value::Record(_) => serde_json::to_string(&to_json(value, data_type))?,
        // `{:?}` keeps the decimal point (`15.0`), so the column reads back as Float64.
        Value::Float64(f) => format!("{:?}", f.0),
        other => other.to_string(),
    })
}

/// Render `dataset` as newline-delimited JSON objects.
pub fn render_json_lines(dataset: &DataSet) -> PipelineResult<Vec<u8>> {
    let mut out = Vec::new();
    for row in &dataset.rows {
        let object = record_to_json(row, &dataset.schema.fields);
        serde_json::to_writer(&mut out, &object)?;
        out.push(b'\n');
    }
    Ok(out)
}

fn record_to_json(slots: &[Value], fields: &[Field]) -> serde_json::Value {
    let map = fields
        .iter()
        .zip(slots)
        .map(|(field, value)| (field.name.clone(), to_json(value, &field.data_type)))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map)
}

static UNTYPED: DataType = DataType::Null;

/// JSON form of a value. Non-finite floats have no JSON form and are written as `null`.
fn to_json(value: &Value, data_type: &DataType) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int64(n) => serde_json::Value::from(*n),
        Value::Float64(f) => serde_json::Number::from_f64(f.0)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Utf8(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => {
            let element = match data_type {
                DataType::List(element) => element.as_ref(),
                _ => &UNTYPED,
            };
            serde_json::Value::Array(items.iter().map(|item| to_json(item, element)).collect())
        }
        Value::Record(slots) => match data_type {
            DataType::Struct(fields) => record_to_json(slots, fields),
            _ => serde_json::Value::Array(
                slots
                    .iter()
                    .map(|item| to_json(item, &UNTYPED))
                    .collect(),
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::json::ingest_json_from_str;
    use crate::ingestion::{read_from_path, IngestionOptions};
    use crate::types::Schema;

    fn nested() -> DataSet {
        let schema = Schema::new(vec![
            Field::new("open", DataType::Int64),
            Field::new("avg_high", DataType::Float64),
            Field::record("meta", vec![Field::new("venue", DataType::Utf8)]),
        ]);
        DataSet::new(
            schema,
            vec![
                vec![
                    Value::Int64(1),
                    Value::float(15.0),
                    Value::Record(vec![Value::from("X")]),
                ],
                vec![Value::Int64(2), Value::Null, Value::Null],
            ],
        )
    }

    #[test]
    fn csv_writes_nested_cells_as_json_and_nulls_empty() {
        let bytes = render_csv(&nested(), &CsvOptions::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "open,avg_high,meta\n1,15.0,\"{\"\"venue\"\":\"\"X\"\"}\"\n2,,\n"
        );
    }

    #[test]
    fn csv_sink_honours_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let sink = CsvSink::new(&path).with_options(CsvOptions {
            delimiter: b';',
            quote: b'"',
        });
        sink.write(&nested()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("open;avg_high;meta\n1;15.0;"));
        assert_eq!(sink.describe(), path.display().to_string());
    }

    #[test]
    fn json_lines_read_back_through_json_ingestion() {
        let ds = nested();
        let bytes = render_json_lines(&ds).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 2);
        let back = ingest_json_from_str(&text, Some(&ds.schema)).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn csv_floats_keep_their_type_on_read_back() {
        let schema = Schema::new(vec![
            Field::new("open", DataType::Int64),
            Field::new("avg_high", DataType::Float64),
        ]);
        let ds = DataSet::new(
            schema,
            vec![
                vec![Value::Int64(1), Value::float(15.0)],
                vec![Value::Int64(2), Value::float(1e20)],
                vec![Value::Int64(3), Value::float(0.25)],
            ],
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agg.csv");
        write_to_path(&path, &ds).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "open,avg_high\n1,15.0\n2,1e20\n3,0.25\n"
        );

        let back = read_from_path(&path, &IngestionOptions::default()).unwrap();
        assert_eq!(back.schema, ds.schema);
        assert_eq!(back.rows, ds.rows);
    }

    #[test]
    fn write_to_path_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let json_path = dir.path().join("out.jsonl");
        write_to_path(&csv_path, &nested()).unwrap();
        write_to_path(&json_path, &nested()).unwrap();

        assert!(fs::read_to_string(&csv_path).unwrap().starts_with("open,avg_high,meta\n"));
        assert!(fs::read_to_string(&json_path).unwrap().starts_with("{\"open\":1,"));

        let err = write_to_path(dir.path().join("out.parquet"), &nested()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
        assert!(!dir.path().join("out.parquet").exists());
    }
}
