//! CSV import for staging tables and CSV export of merged data.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{RecordSet, Value};
use crate::error::Result;

/// Reads a CSV file with a header row into a record set.
///
/// Each column is typed as a whole: boolean when every non-empty field is
/// `true`/`false` (any case), integer when every field parses as `i64`, float
/// when every field parses as a finite `f64`, otherwise text. Empty fields are
/// null.
pub fn read_csv(path: &Path) -> Result<RecordSet> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut raw: Vec<csv::StringRecord> = Vec::new();
    for record in reader.records() {
        raw.push(record?);
    }

    let parsers: Vec<FieldKind> = (0..columns.len())
        .map(|idx| FieldKind::infer(raw.iter().map(|r| r.get(idx).unwrap_or(""))))
        .collect();

    let mut records = RecordSet::new(columns);
    for record in &raw {
        let row = parsers
            .iter()
            .enumerate()
            .map(|(idx, kind)| kind.parse(record.get(idx).unwrap_or("")))
            .collect();
        records.push_row(row)?;
    }

    info!(path = %path.display(), rows = records.len(), columns = records.width(), "Read CSV file");
    Ok(records)
}

/// Writes a record set as CSV, creating parent directories. Nulls become empty fields.
pub fn write_csv(records: &RecordSet, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(records.columns())?;
    for row in records.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = records.len(), "Wrote CSV file");
    Ok(path.to_path_buf())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Boolean,
    Integer,
    Float,
    Text,
}

impl FieldKind {
    fn infer<'a>(fields: impl Iterator<Item = &'a str>) -> Self {
        let (mut boolean, mut integer, mut float) = (true, true, true);
        let mut any = false;
        for field in fields.filter(|f| !f.is_empty()) {
            any = true;
            boolean &= parse_bool(field).is_some();
            integer &= field.parse::<i64>().is_ok();
            float &= field.parse::<f64>().map(f64::is_finite).unwrap_or(false);
        }
        match (any, boolean, integer, float) {
            (false, ..) => FieldKind::Text,
            (true, true, ..) => FieldKind::Boolean,
            (true, _, true, _) => FieldKind::Integer,
            (true, _, _, true) => FieldKind::Float,
            _ => FieldKind::Text,
        }
    }

    fn parse(self, field: &str) -> Value {
        if field.is_empty() {
            return Value::Null;
        }
        match self {
            FieldKind::Boolean => parse_bool(field).map(Value::Boolean).unwrap_or(Value::Null),
            FieldKind::Integer => field.parse().map(Value::Integer).unwrap_or(Value::Null),
            FieldKind::Float => field.parse().map(Value::Float).unwrap_or(Value::Null),
            FieldKind::Text => Value::text(field),
        }
    }
}

fn parse_bool(field: &str) -> Option<bool> {
    if field.eq_ignore_ascii_case("true") {
        Some(true)
    } else if field.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
