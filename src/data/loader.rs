use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, Int8Array, LargeStringArray, StringArray, UInt16Array, UInt32Array, UInt64Array,
    UInt8Array,
};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Dataset, DatasetSchema, Record};
use crate::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a health-record table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, columns matched by name
/// * `.json`    – `[{ "location": "Texas", "age": 42.0, ... }, ...]`
/// * `.parquet` – flat columns (strings, ints, floats, bools)
pub fn load_file(path: &Path, schema: &DatasetSchema) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" => read_csv(std::fs::File::open(path)?, schema)?,
        "json" => read_json(std::fs::File::open(path)?, schema)?,
        "parquet" | "pq" => load_parquet(path, schema)?,
        other => return Err(AnalysisError::UnsupportedFormat(other.to_string())),
    };

    info!(
        "loaded {} records from {} ({} locations, {} genders)",
        dataset.len(),
        path.display(),
        dataset.locations().len(),
        dataset.genders().len()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Cell – a single loosely typed value before schema conversion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// An Arrow type the loader cannot interpret; rejected by every conversion.
    Unsupported(DataType),
}

impl Cell {
    fn describe(&self) -> String {
        match self {
            Cell::Text(s) => format!("text '{s}'"),
            Cell::Integer(i) => format!("integer {i}"),
            Cell::Float(v) => format!("float {v}"),
            Cell::Bool(b) => format!("bool {b}"),
            Cell::Null => "an empty cell".to_string(),
            Cell::Unsupported(dt) => format!("unsupported Arrow type {dt:?}"),
        }
    }
}

/// Turns one row of cells into a typed [`Record`], reporting the first
/// offending column.
struct RowReader<'a> {
    schema: &'a DatasetSchema,
    row: usize,
}

impl<'a> RowReader<'a> {
    fn read(&self, cell: impl Fn(&str) -> Option<Cell>) -> Result<Record> {
        let take = |name: &str| cell(name).ok_or_else(|| AnalysisError::missing_column(name));

        let race = self
            .schema
            .race_columns
            .iter()
            .map(|name| self.indicator(name, take(name)?))
            .collect::<Result<Vec<u8>>>()?;

        Ok(Record {
            location: self.text(DatasetSchema::LOCATION, take(DatasetSchema::LOCATION)?)?,
            gender: self.text(DatasetSchema::GENDER, take(DatasetSchema::GENDER)?)?,
            age: self.float(DatasetSchema::AGE, take(DatasetSchema::AGE)?)?,
            bmi: self.float(DatasetSchema::BMI, take(DatasetSchema::BMI)?)?,
            blood_glucose_level: self.float(
                DatasetSchema::BLOOD_GLUCOSE_LEVEL,
                take(DatasetSchema::BLOOD_GLUCOSE_LEVEL)?,
            )?,
            hypertension: self.indicator(
                DatasetSchema::HYPERTENSION,
                take(DatasetSchema::HYPERTENSION)?,
            )?,
            heart_disease: self.indicator(
                DatasetSchema::HEART_DISEASE,
                take(DatasetSchema::HEART_DISEASE)?,
            )?,
            diabetes: self.indicator(DatasetSchema::DIABETES, take(DatasetSchema::DIABETES)?)?,
            year: self.integer(DatasetSchema::YEAR, take(DatasetSchema::YEAR)?)?,
            smoking_history: self.text(
                DatasetSchema::SMOKING_HISTORY,
                take(DatasetSchema::SMOKING_HISTORY)?,
            )?,
            race,
        })
    }

    fn text(&self, column: &str, cell: Cell) -> Result<String> {
        match cell {
            Cell::Text(s) => Ok(s),
            other => Err(self.wrong_type(column, "text", &other)),
        }
    }

    fn float(&self, column: &str, cell: Cell) -> Result<f64> {
        match cell {
            Cell::Float(v) => Ok(v),
            Cell::Integer(i) => Ok(i as f64),
            other => Err(self.wrong_type(column, "a number", &other)),
        }
    }

    fn integer(&self, column: &str, cell: Cell) -> Result<i64> {
        match cell {
            Cell::Integer(i) => Ok(i),
            // Pandas writes integer columns with missing values as floats.
            Cell::Float(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
            other => Err(self.wrong_type(column, "an integer", &other)),
        }
    }

    fn indicator(&self, column: &str, cell: Cell) -> Result<u8> {
        let value = match cell {
            Cell::Bool(b) => return Ok(u8::from(b)),
            other => self.integer(column, other)?,
        };
        match value {
            0 | 1 => Ok(value as u8),
            v => Err(AnalysisError::bad_cell(
                column,
                self.row,
                format!("indicator must be 0 or 1, got {v}"),
            )),
        }
    }

    fn wrong_type(&self, column: &str, expected: &str, found: &Cell) -> AnalysisError {
        AnalysisError::bad_cell(
            column,
            self.row,
            format!("expected {expected}, found {}", found.describe()),
        )
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Read a CSV table with a header row. Extra columns are ignored.
pub fn read_csv<R: Read>(input: R, schema: &DatasetSchema) -> Result<Dataset> {
    let mut reader = csv::Reader::from_reader(input);
    let headers: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect();

    for column in schema.required_columns() {
        if !headers.contains_key(column) {
            return Err(AnalysisError::missing_column(column));
        }
    }

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let raw = result?;
        let record = RowReader { schema, row }.read(|name| {
            headers
                .get(name)
                .map(|&idx| guess_cell_type(raw.get(idx).unwrap_or("")))
        })?;
        records.push(record);
    }
    debug!("parsed {} CSV rows", records.len());

    Dataset::from_records(schema.clone(), records)
}

fn guess_cell_type(s: &str) -> Cell {
    let s = s.trim();
    if s.is_empty() {
        return Cell::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Cell::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Cell::Float(f);
    }
    match s {
        "true" | "True" => Cell::Bool(true),
        "false" | "False" => Cell::Bool(false),
        _ => Cell::Text(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON layout (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "year": 2020, "gender": "Female", "age": 32.0, "location": "Alabama",
///     "race:AfricanAmerican": 0, ..., "diabetes": 0 },
///   ...
/// ]
/// ```
pub fn read_json<R: Read>(input: R, schema: &DatasetSchema) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_reader(input)?;

    let rows = root.as_array().ok_or_else(|| AnalysisError::Schema {
        column: "<root>".to_string(),
        row: None,
        reason: "expected a top-level JSON array of records".to_string(),
    })?;

    let mut records = Vec::with_capacity(rows.len());
    for (row, value) in rows.iter().enumerate() {
        let obj = value.as_object().ok_or_else(|| AnalysisError::Schema {
            column: "<record>".to_string(),
            row: Some(row),
            reason: "row is not a JSON object".to_string(),
        })?;
        let record = RowReader { schema, row }.read(|name| obj.get(name).map(json_to_cell))?;
        records.push(record);
    }

    Dataset::from_records(schema.clone(), records)
}

fn json_to_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::String(s) => Cell::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Cell::Float(f)
            } else {
                Cell::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Cell::Bool(*b),
        JsonValue::Null => Cell::Null,
        other => Cell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per schema column.
///
/// Works with files written by both Pandas (`df.to_parquet()`) and Polars
/// (`df.write_parquet()`).
fn load_parquet(path: &Path, schema: &DatasetSchema) -> Result<Dataset> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let batch_schema = batch.schema();

        let columns: HashMap<&str, ArrayRef> = schema
            .required_columns()
            .into_iter()
            .map(|name| {
                let idx = batch_schema
                    .index_of(name)
                    .map_err(|_| AnalysisError::missing_column(name))?;
                Ok::<_, AnalysisError>((name, decode_column(batch.column(idx))?))
            })
            .collect::<Result<_>>()?;

        let offset = records.len();
        for i in 0..batch.num_rows() {
            let row_reader = RowReader {
                schema,
                row: offset + i,
            };
            let record =
                row_reader.read(|name| columns.get(name).map(|col| extract_cell(col, i)))?;
            records.push(record);
        }
    }

    Dataset::from_records(schema.clone(), records)
}

/// Unpack dictionary (Pandas/Polars categoricals) and view encodings into
/// plain arrays.
fn decode_column(col: &ArrayRef) -> Result<ArrayRef> {
    match col.data_type() {
        DataType::Dictionary(_, value) => decode_column(&cast(col, value.as_ref())?),
        DataType::Utf8View => Ok(cast(col, &DataType::Utf8)?),
        _ => Ok(Arc::clone(col)),
    }
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &ArrayRef, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Null;
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<StringArray>() {
        Cell::Text(arr.value(row).to_string())
    } else if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        Cell::Text(arr.value(row).to_string())
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Cell::Integer(arr.value(row))
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        Cell::Integer(i64::from(arr.value(row)))
    } else if let Some(arr) = any.downcast_ref::<Int16Array>() {
        Cell::Integer(i64::from(arr.value(row)))
    } else if let Some(arr) = any.downcast_ref::<Int8Array>() {
        Cell::Integer(i64::from(arr.value(row)))
    } else if let Some(arr) = any.downcast_ref::<UInt64Array>() {
        let v = arr.value(row);
        i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Integer)
    } else if let Some(arr) = any.downcast_ref::<UInt32Array>() {
        Cell::Integer(i64::from(arr.value(row)))
    } else if let Some(arr) = any.downcast_ref::<UInt16Array>() {
        Cell::Integer(i64::from(arr.value(row)))
    } else if let Some(arr) = any.downcast_ref::<UInt8Array>() {
        Cell::Integer(i64::from(arr.value(row)))
    } else if let Some(arr) = any.downcast_ref::<Float64Array>() {
        Cell::Float(arr.value(row))
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        Cell::Float(f64::from(arr.value(row)))
    } else if let Some(arr) = any.downcast_ref::<BooleanArray>() {
        Cell::Bool(arr.value(row))
    } else {
        Cell::Unsupported(col.data_type().clone())
    }
}
