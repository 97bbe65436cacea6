//! In-memory tabular data: cells, inferred column types and record sets.
//!
//! A [`RecordSet`] is an ordered list of column names plus ordered rows of
//! [`Value`]s. Column types are not declared up front; they are inferred
//! from the values a column holds when a caller asks for them, the same way
//! the store and the CSV reader hand data over.

pub mod csv_io;

use std::collections::HashSet;
use std::fmt;

use chrono::{Duration, NaiveDateTime};

use crate::error::{EtlError, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static NULL: Value = Value::Null;

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Interval(Duration),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of integer and float cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Timestamp(_) => "timestamp",
            Value::Interval(_) => "interval",
        }
    }

    /// Type of a non-null cell.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::Text(_) => Some(DataType::Text),
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Timestamp(_) => Some(DataType::Timestamp),
            Value::Interval(_) => Some(DataType::Interval),
        }
    }

    fn key(&self) -> CellKey<'_> {
        match self {
            Value::Null => CellKey::Null,
            Value::Integer(i) => CellKey::Integer(*i),
            Value::Float(f) => CellKey::Float(float_bits(*f)),
            Value::Text(s) => CellKey::Text(s),
            Value::Boolean(b) => CellKey::Boolean(*b),
            Value::Timestamp(ts) => CellKey::Timestamp(*ts),
            Value::Interval(d) => CellKey::Interval(d.num_nanoseconds(), d.num_milliseconds()),
        }
    }
}

/// Renders an interval as a number of seconds, e.g. `90 seconds`.
pub fn interval_text(d: &Duration) -> String {
    format!("{} seconds", d.num_milliseconds() as f64 / 1000.0)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Interval(d) => f.write_str(&interval_text(d)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Hashable view of a cell used for grouping, joining and deduplication.
/// Floats compare by bit pattern with `-0.0` folded into `0.0` and a single NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CellKey<'a> {
    Null,
    Integer(i64),
    Float(u64),
    Text(&'a str),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Interval(Option<i64>, i64),
}

fn float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

pub(crate) fn row_key(row: &[Value]) -> Vec<CellKey<'_>> {
    row.iter().map(Value::key).collect()
}

pub(crate) fn cell_key(value: &Value) -> CellKey<'_> {
    value.key()
}

/// In-memory column type, inferred from the non-null values of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Interval,
    /// All-null or heterogeneous columns.
    Generic,
}

impl DataType {
    /// Infers the column type of a sequence of cells.
    ///
    /// Integers mixed with floats widen to `Float`; any other mix, or a column
    /// without a single non-null value, is `Generic`.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
        let mut seen: Option<DataType> = None;
        for value in values {
            let Some(current) = value.data_type() else {
                continue;
            };
            seen = Some(match seen {
                None => current,
                Some(prev) if prev == current => prev,
                Some(DataType::Integer) if current == DataType::Float => DataType::Float,
                Some(DataType::Float) if current == DataType::Integer => DataType::Float,
                Some(_) => return DataType::Generic,
            });
        }
        seen.unwrap_or(DataType::Generic)
    }
}

/// An ordered collection of uniformly-shaped rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RecordSet {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        let mut records = Self::new(columns);
        for row in rows {
            records.push_row(row)?;
        }
        Ok(records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::RowArity {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| EtlError::MissingColumn(name.to_string()))
    }

    pub fn value(&self, row: usize, column: &str) -> Result<&Value> {
        let idx = self.column_index(column)?;
        Ok(self
            .rows
            .get(row)
            .map(|r| &r[idx])
            .unwrap_or(&NULL))
    }

    pub fn column_values(&self, column: &str) -> Result<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Inferred type of every column, in column order.
    pub fn dtypes(&self) -> Vec<(String, DataType)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), DataType::infer(self.rows.iter().map(|r| &r[idx]))))
            .collect()
    }

    /// Replaces the named column, or appends it when absent.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(EtlError::RowArity {
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        match self.columns.iter().position(|c| c == name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Rewrites every cell of one column.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&Value) -> Result<Value>,
    {
        let idx = self.column_index(column)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx])?;
        }
        Ok(())
    }

    /// Keeps the rows for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F) -> Result<()>
    where
        F: FnMut(&[Value]) -> Result<bool>,
    {
        let mut kept = Vec::with_capacity(self.rows.len());
        for row in std::mem::take(&mut self.rows) {
            if keep(&row)? {
                kept.push(row);
            }
        }
        self.rows = kept;
        Ok(())
    }

    /// Removes rows equal to an earlier row across all columns.
    /// Returns the number of rows removed.
    pub fn drop_duplicates(&mut self) -> usize {
        let before = self.rows.len();
        let mut keep = Vec::with_capacity(before);
        {
            let mut seen = HashSet::with_capacity(before);
            for row in &self.rows {
                keep.push(seen.insert(row_key(row)));
            }
        }
        let mut flags = keep.into_iter();
        self.rows.retain(|_| flags.next().unwrap_or(false));
        before - self.rows.len()
    }

    /// Removes rows whose value in `column` already appeared in an earlier row.
    /// Returns the number of rows removed.
    pub fn drop_duplicates_by(&mut self, column: &str) -> Result<usize> {
        let idx = self.column_index(column)?;
        let before = self.rows.len();
        let mut keep = Vec::with_capacity(before);
        {
            let mut seen = HashSet::with_capacity(before);
            for row in &self.rows {
                keep.push(seen.insert(cell_key(&row[idx])));
            }
        }
        let mut flags = keep.into_iter();
        self.rows.retain(|_| flags.next().unwrap_or(false));
        Ok(before - self.rows.len())
    }

    /// Appends the rows of `other`, which must have the same columns in the same order.
    pub fn concat(mut self, other: RecordSet) -> Result<Self> {
        if self.columns != other.columns {
            return Err(EtlError::ColumnMismatch(format!(
                "[{}] vs [{}]",
                self.columns.join(", "),
                other.columns.join(", ")
            )));
        }
        self.rows.extend(other.rows);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordSet {
        RecordSet::from_rows(
            ["id", "name"],
            vec![
                vec![Value::Integer(1), Value::text("a")],
                vec![Value::Integer(2), Value::text("b")],
                vec![Value::Integer(1), Value::text("a")],
                vec![Value::Integer(1), Value::text("c")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_infer_widens_integers_mixed_with_floats() {
        let values = [Value::Integer(1), Value::Null, Value::Float(2.5)];
        assert_eq!(DataType::infer(&values), DataType::Float);
    }

    #[test]
    fn test_infer_all_null_and_mixed_are_generic() {
        assert_eq!(DataType::infer(&[Value::Null, Value::Null]), DataType::Generic);
        assert_eq!(
            DataType::infer(&[Value::Integer(1), Value::text("x")]),
            DataType::Generic
        );
    }

    #[test]
    fn test_push_row_rejects_wrong_arity() {
        let mut records = RecordSet::new(["a", "b"]);
        let err = records.push_row(vec![Value::Null]).unwrap_err();
        assert!(matches!(err, EtlError::RowArity { expected: 2, found: 1 }));
    }

    #[test]
    fn test_drop_duplicates_keeps_first_occurrence() {
        let mut records = sample();
        assert_eq!(records.drop_duplicates(), 1);
        assert_eq!(records.len(), 3);
        assert_eq!(records.rows()[2][1], Value::text("c"));
    }

    #[test]
    fn test_drop_duplicates_by_column() {
        let mut records = sample();
        assert_eq!(records.drop_duplicates_by("id").unwrap(), 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records.rows()[0][1], Value::text("a"));
    }

    #[test]
    fn test_float_zero_signs_are_duplicates() {
        let mut records =
            RecordSet::from_rows(["x"], vec![vec![Value::Float(0.0)], vec![Value::Float(-0.0)]])
                .unwrap();
        assert_eq!(records.drop_duplicates(), 1);
    }

    #[test]
    fn test_missing_column_is_typed_error() {
        let records = sample();
        assert!(matches!(
            records.column_index("nope"),
            Err(EtlError::MissingColumn(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_set_column_appends_or_replaces() {
        let mut records = sample();
        records
            .set_column("flag", vec![Value::Boolean(true); 4])
            .unwrap();
        assert_eq!(records.width(), 3);
        records.set_column("id", vec![Value::Null; 4]).unwrap();
        assert!(records.column_values("id").unwrap().all(Value::is_null));
    }

    #[test]
    fn test_concat_requires_same_columns() {
        let left = RecordSet::new(["a"]);
        let right = RecordSet::new(["b"]);
        assert!(matches!(left.concat(right), Err(EtlError::ColumnMismatch(_))));
    }
}
