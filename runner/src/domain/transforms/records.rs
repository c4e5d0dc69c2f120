//! JSON Lines record tables

use serde_json::{Map, Number, Value};
use thiserror::Error;

pub type Record = Map<String, Value>;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Column {column} not present in any record")]
    MissingColumn { column: String },

    #[error("Invalid value in column {column} at row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("Line {line} is not a JSON object: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode records: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Ordered rows of loosely typed records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<Record>,
}

impl Table {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    /// Decode one JSON object per line. Blank lines are skipped; line numbers
    /// in errors are 1-based.
    pub fn from_json_lines(data: &[u8]) -> Result<Self, TransformError> {
        let mut rows = Vec::new();
        for (idx, line) in data.split(|&b| b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let record: Record = serde_json::from_slice(line).map_err(|source| {
                TransformError::Decode {
                    line: idx + 1,
                    source,
                }
            })?;
            rows.push(record);
        }
        Ok(Self { rows })
    }

    pub fn to_json_lines(&self) -> Result<Vec<u8>, TransformError> {
        let mut out = Vec::new();
        for row in &self.rows {
            serde_json::to_writer(&mut out, row).map_err(TransformError::Encode)?;
            out.push(b'\n');
        }
        Ok(out)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Record> {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.rows.iter().any(|row| row.contains_key(column))
    }

    /// An empty table trivially satisfies any column requirement.
    pub fn require_column(&self, column: &str) -> Result<(), TransformError> {
        if self.is_empty() || self.has_column(column) {
            Ok(())
        } else {
            Err(TransformError::MissingColumn {
                column: column.to_string(),
            })
        }
    }

    /// Numeric value of `column` for every row, failing on the first row
    /// where it is absent or not a number.
    pub fn numbers(&self, column: &str) -> Result<Vec<f64>, TransformError> {
        self.require_column(column)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, record)| {
                record
                    .get(column)
                    .and_then(as_number)
                    .ok_or_else(|| TransformError::InvalidValue {
                        column: column.to_string(),
                        row,
                        reason: "expected a number".to_string(),
                    })
            })
            .collect()
    }

    /// Set `column` on every row from `values`, which must be row-aligned.
    pub fn set_numbers(&mut self, column: &str, values: &[f64]) -> Result<(), TransformError> {
        for (row, (record, value)) in self.rows.iter_mut().zip(values).enumerate() {
            record.insert(column.to_string(), number(column, row, *value)?);
        }
        Ok(())
    }
}

/// Numbers and numeric strings as `f64`
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn is_null(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// JSON number from a finite `f64`
pub fn number(column: &str, row: usize, value: f64) -> Result<Value, TransformError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| TransformError::InvalidValue {
            column: column.to_string(),
            row,
            reason: format!("{value} is not a finite number"),
        })
}
