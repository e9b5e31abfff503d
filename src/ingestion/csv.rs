//! CSV ingestion implementation.

use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::json;

/// Reader settings. Defaults match a comma-separated file with a header row and `"` quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

impl CsvOptions {
    pub fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(true)
            .delimiter(self.delimiter)
            .quote(self.quote);
        builder
    }
}

/// Ingest a CSV file into an in-memory [`DataSet`].
///
/// Rules:
///
/// - CSV must have headers.
/// - With a schema, headers must contain all schema fields (order can differ) and each value is
///   parsed according to the schema field type. `Struct`/`List` cells are parsed as JSON text.
/// - Without a schema, column types are inferred (see [`infer_csv_schema`]).
/// - Empty and whitespace-only cells become [`Value::Null`]; strings are trimmed.
pub fn ingest_csv_from_path(
    path: impl AsRef<Path>,
    schema: Option<&Schema>,
    options: &CsvOptions,
) -> PipelineResult<DataSet> {
    let mut rdr = options.reader_builder().from_path(path)?;
    ingest_csv_from_reader(&mut rdr, schema)
}

/// Ingest CSV data from an existing CSV reader.
pub fn ingest_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    schema: Option<&Schema>,
) -> PipelineResult<DataSet> {
    let headers = rdr.headers()?.clone();
    let records = rdr.records().collect::<Result<Vec<_>, _>>()?;

    let inferred;
    let schema = match schema {
        Some(schema) => schema,
        None => {
            inferred = infer_csv_schema(&headers, &records);
            &inferred
        }
    };

    // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
    let mut col_idxs = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        match headers.iter().position(|h| h.trim() == field.name) {
            Some(idx) => col_idxs.push(idx),
            None => {
                return Err(PipelineError::mismatch(format!(
                    "missing required column '{field}'. headers={:?}",
                    headers.iter().collect::<Vec<_>>(),
                    field = field.name
                )));
            }
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(records.len());
    for (row_idx0, record) in records.iter().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, &field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

/// Infer a flat schema from CSV cells.
///
/// Per column: all cells empty → `Null`; all integers → `Int64`; all numbers → `Float64`; all
/// `true`/`false` → `Bool`; otherwise `Utf8`. Empty cells do not vote.
pub fn infer_csv_schema(headers: &csv::StringRecord, records: &[csv::StringRecord]) -> Schema {
    let fields = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells = records
                .iter()
                .map(|r| r.get(idx).unwrap_or("").trim())
                .filter(|c| !c.is_empty());
            Field::new(name.trim(), infer_cell_type(cells))
        })
        .collect();
    Schema::new(fields)
}

fn infer_cell_type<'a>(cells: impl Iterator<Item = &'a str>) -> DataType {
    let mut seen = false;
    let (mut all_int, mut all_float, mut all_bool) = (true, true, true);
    for cell in cells {
        seen = true;
        all_int &= cell.parse::<i64>().is_ok();
        all_float &= cell.parse::<f64>().is_ok();
        all_bool &= cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false");
        if !(all_int || all_float || all_bool) {
            return DataType::Utf8;
        }
    }

    match (seen, all_int, all_float, all_bool) {
        (false, ..) => DataType::Null,
        (_, true, ..) => DataType::Int64,
        (_, _, true, _) => DataType::Float64,
        (_, _, _, true) => DataType::Bool,
        _ => DataType::Utf8,
    }
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    raw: &str,
) -> PipelineResult<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    let parse_error = |message: String| PipelineError::ParseError {
        row,
        column: column.to_owned(),
        raw: raw.to_owned(),
        message,
    };

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| parse_error(e.to_string())),
        DataType::Float64 => trimmed
            .parse::<f64>()
            .map(Value::float)
            .map_err(|e| parse_error(e.to_string())),
        DataType::Bool => parse_bool(trimmed).map(Value::Bool).map_err(parse_error),
        DataType::Null => Err(parse_error("expected an empty cell".to_string())),
        DataType::List(_) | DataType::Struct(_) => {
            let parsed: serde_json::Value =
                serde_json::from_str(trimmed).map_err(|e| parse_error(e.to_string()))?;
            json::convert_json_value(row, column, data_type, &parsed)
        }
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(input: &str) -> csv::Reader<&[u8]> {
        CsvOptions::default()
            .reader_builder()
            .from_reader(input.as_bytes())
    }

    #[test]
    fn infers_types_per_column() {
        let input = "open,low,flag,halted,empty\n1,2.5,NULL,true,\n2,3,,FALSE, \n";
        let ds = ingest_csv_from_reader(&mut reader(input), None).unwrap();
        let types: Vec<DataType> = ds
            .schema
            .fields
            .iter()
            .map(|f| f.data_type.clone())
            .collect();
        assert_eq!(
            types,
            vec![
                DataType::Int64,
                DataType::Float64,
                DataType::Utf8,
                DataType::Bool,
                DataType::Null
            ]
        );
        assert_eq!(
            ds.rows[1],
            vec![
                Value::Int64(2),
                Value::float(3.0),
                Value::Null,
                Value::Bool(false),
                Value::Null
            ]
        );
    }

    #[test]
    fn strings_are_trimmed() {
        let input = "name\n  Ada  \n";
        let ds = ingest_csv_from_reader(&mut reader(input), None).unwrap();
        assert_eq!(ds.rows[0][0], Value::from("Ada"));
    }

    #[test]
    fn nested_cells_parse_as_json_text() {
        let schema = Schema::new(vec![Field::record(
            "meta",
            vec![Field::new("venue", DataType::Utf8)],
        )]);
        let input = "meta\n\"{\"\"venue\"\":\"\"X\"\"}\"\n";
        let ds = ingest_csv_from_reader(&mut reader(input), Some(&schema)).unwrap();
        assert_eq!(ds.rows[0][0], Value::Record(vec![Value::from("X")]));
    }

    #[test]
    fn custom_delimiter_and_quote() {
        let opts = CsvOptions {
            delimiter: b';',
            quote: b'\'',
        };
        let mut rdr = opts.reader_builder().from_reader("a;b\n'x;y';2\n".as_bytes());
        let ds = ingest_csv_from_reader(&mut rdr, None).unwrap();
        assert_eq!(ds.rows[0], vec![Value::from("x;y"), Value::Int64(2)]);
    }
}
