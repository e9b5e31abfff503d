use std::fs;

use ohlcv_clean::ingestion::{read_from_path, IngestionFormat, IngestionOptions, PathSource, RecordSource};
use ohlcv_clean::types::{DataType, Field, Schema, Value};

#[test]
fn detects_format_by_extension() {
    let csv = read_from_path("tests/fixtures/bars.csv", &IngestionOptions::default()).unwrap();
    let json = read_from_path("tests/fixtures/bars_array.json", &IngestionOptions::default()).unwrap();
    let ndjson = read_from_path("tests/fixtures/bars_nested.ndjson", &IngestionOptions::default()).unwrap();
    assert_eq!(csv.column_count(), 7);
    assert_eq!(json.row_count(), 2);
    assert_eq!(ndjson.row_count(), 4);
}

#[test]
fn forced_format_overrides_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bars_without_extension");
    fs::write(&path, "{\"open\": 1}\n{\"open\": 2}\n").unwrap();

    let opts = IngestionOptions {
        format: Some(IngestionFormat::Json),
        ..Default::default()
    };
    let ds = read_from_path(&path, &opts).unwrap();
    assert_eq!(ds.rows, vec![vec![Value::Int64(1)], vec![Value::Int64(2)]]);

    assert!(read_from_path(&path, &IngestionOptions::default()).is_err());
}

#[test]
fn explicit_schema_is_passed_through() {
    let opts = IngestionOptions {
        schema: Some(Schema::new(vec![
            Field::new("high", DataType::Float64),
            Field::new("open", DataType::Int64),
        ])),
        ..Default::default()
    };
    let source = PathSource::new("tests/fixtures/bars.csv", opts);
    let ds = source.read().unwrap();
    assert_eq!(ds.column_count(), 2);
    assert_eq!(ds.rows[0], vec![Value::float(10.0), Value::Int64(1)]);
    assert_eq!(source.describe(), "tests/fixtures/bars.csv");
}
