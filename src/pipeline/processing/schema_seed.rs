//! Table definitions and seed scripts inferred from a record set.
//!
//! Column types come from the values each column holds, so the generated
//! `CREATE TABLE` matches whatever the merge produced. The seed script is one
//! `INSERT` per row in the same column order.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::RESERVED_COLUMN_RENAMES;
use crate::error::{EtlError, Result};
use crate::frame::{interval_text, DataType, RecordSet, Value, TIMESTAMP_FORMAT};
use crate::store::quote_ident;

/// Column type in the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Interval,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Float => "FLOAT",
            SqlType::Text => "TEXT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Interval => "INTERVAL",
        }
    }
}

impl From<DataType> for SqlType {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::Integer => SqlType::Integer,
            DataType::Float => SqlType::Float,
            DataType::Boolean => SqlType::Boolean,
            DataType::Timestamp => SqlType::Timestamp,
            DataType::Interval => SqlType::Interval,
            DataType::Text | DataType::Generic => SqlType::Text,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name in the record set.
    pub source: String,
    /// Column name in the target table.
    pub name: String,
    pub sql_type: SqlType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredSchema {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

impl InferredSchema {
    /// Infers one column definition per record set column, in order.
    pub fn infer(records: &RecordSet, table: &str) -> Result<Self> {
        if records.width() == 0 {
            return Err(EtlError::EmptySchema(table.to_string()));
        }
        let columns = records
            .dtypes()
            .into_iter()
            .map(|(source, data_type)| ColumnDef {
                name: target_column_name(&source).to_string(),
                sql_type: SqlType::from(data_type),
                source,
            })
            .collect();
        Ok(Self {
            table: table.to_string(),
            columns,
        })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn create_table_sql(&self) -> String {
        let body = self
            .columns
            .iter()
            .map(|c| format!("    {} {}", quote_ident(&c.name), c.sql_type))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE {} (\n{}\n);", quote_ident(&self.table), body)
    }
}

pub fn infer_schema(records: &RecordSet, table: &str) -> Result<InferredSchema> {
    InferredSchema::infer(records, table)
}

/// Name a source column gets in the target table.
pub fn target_column_name(column: &str) -> &str {
    RESERVED_COLUMN_RENAMES
        .iter()
        .find(|(reserved, _)| *reserved == column)
        .map(|(_, renamed)| *renamed)
        .unwrap_or(column)
}

/// Renders a cell as a SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => float_literal(*f),
        Value::Text(s) => quote_literal(s),
        Value::Boolean(true) => "TRUE".to_string(),
        Value::Boolean(false) => "FALSE".to_string(),
        Value::Timestamp(ts) => quote_literal(&ts.format(TIMESTAMP_FORMAT).to_string()),
        Value::Interval(d) => quote_literal(&interval_text(d)),
    }
}

fn float_literal(f: f64) -> String {
    if !f.is_finite() {
        "NULL".to_string()
    } else if f.fract() == 0.0 {
        if f.abs() < i64::MAX as f64 {
            (f as i64).to_string()
        } else {
            format!("{f:.0}")
        }
    } else {
        format!("{f:.6}")
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// One `INSERT` statement per row, newline terminated.
pub fn render_seed(records: &RecordSet, table: &str) -> String {
    let table = quote_ident(table);
    let mut script = String::new();
    for row in records.rows() {
        let values = row.iter().map(sql_literal).collect::<Vec<_>>().join(", ");
        script.push_str(&format!("INSERT INTO {table} VALUES ({values});\n"));
    }
    script
}

pub fn write_schema(schema: &InferredSchema, path: &Path) -> Result<PathBuf> {
    write_script(path, &schema.create_table_sql())
}

pub fn write_seed(seed: &str, path: &Path) -> Result<PathBuf> {
    write_script(path, seed)
}

fn write_script(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    debug!(path = %path.display(), bytes = contents.len(), "Wrote SQL script");
    Ok(path.to_path_buf())
}

/// Paths and schema produced by [`SchemaSeedGenerator::generate`].
#[derive(Debug, Clone)]
pub struct GeneratedScripts {
    pub schema: InferredSchema,
    pub schema_path: PathBuf,
    pub seed_path: PathBuf,
    pub rows: usize,
}

/// Writes `<table>_schema.sql` and `<table>_seed.sql` into one directory.
#[derive(Debug, Clone)]
pub struct SchemaSeedGenerator {
    output_dir: PathBuf,
}

impl SchemaSeedGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn schema_path(&self, table: &str) -> PathBuf {
        self.output_dir.join(format!("{table}_schema.sql"))
    }

    pub fn seed_path(&self, table: &str) -> PathBuf {
        self.output_dir.join(format!("{table}_seed.sql"))
    }

    pub fn generate(&self, records: &RecordSet, table: &str) -> Result<GeneratedScripts> {
        let schema = infer_schema(records, table)?;
        let schema_path = write_schema(&schema, &self.schema_path(table))?;
        let seed_path = write_seed(&render_seed(records, table), &self.seed_path(table))?;

        info!(
            table,
            columns = schema.columns.len(),
            rows = records.len(),
            schema = %schema_path.display(),
            seed = %seed_path.display(),
            "Generated schema and seed scripts"
        );
        Ok(GeneratedScripts {
            schema,
            schema_path,
            seed_path,
            rows: records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn test_integer_and_text_columns() {
        let records = RecordSet::from_rows(
            ["id", "name"],
            vec![
                vec![Value::Integer(1), Value::text("a")],
                vec![Value::Null, Value::text("b")],
            ],
        )
        .unwrap();

        let schema = infer_schema(&records, "t").unwrap();
        assert_eq!(schema.columns.len(), 2);
        assert_eq!(schema.columns[0].sql_type, SqlType::Integer);
        assert_eq!(schema.columns[1].sql_type, SqlType::Text);
        assert_eq!(
            schema.create_table_sql(),
            "CREATE TABLE \"t\" (\n    \"id\" INTEGER,\n    \"name\" TEXT\n);"
        );
    }

    #[test]
    fn test_reserved_columns_are_renamed() {
        let records = RecordSet::from_rows(
            ["key", "explicit", "mode"],
            vec![vec![Value::Integer(5), Value::Boolean(false), Value::Null]],
        )
        .unwrap();

        let schema = infer_schema(&records, "tracks").unwrap();
        assert_eq!(schema.column_names(), vec!["key_column", "explicit_column", "mode"]);
        assert_eq!(schema.columns[1].sql_type, SqlType::Boolean);
        // All-null columns fall back to text
        assert_eq!(schema.columns[2].sql_type, SqlType::Text);
    }

    #[test]
    fn test_empty_record_set_has_no_schema() {
        let err = infer_schema(&RecordSet::default(), "t").unwrap_err();
        assert!(matches!(err, EtlError::EmptySchema(t) if t == "t"));
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(sql_literal(&Value::Float(2.0)), "2");
        assert_eq!(sql_literal(&Value::Float(2.5)), "2.500000");
        assert_eq!(sql_literal(&Value::Float(-0.125)), "-0.125000");
        assert_eq!(sql_literal(&Value::Float(f64::NAN)), "NULL");
        assert_eq!(sql_literal(&Value::Float(f64::INFINITY)), "NULL");
    }

    #[test]
    fn test_other_literals() {
        let ts = NaiveDate::from_ymd_opt(2020, 1, 26)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        assert_eq!(sql_literal(&Value::Null), "NULL");
        assert_eq!(sql_literal(&Value::Boolean(true)), "TRUE");
        assert_eq!(sql_literal(&Value::Integer(-7)), "-7");
        assert_eq!(sql_literal(&Value::text("don't; stop")), "'don''t; stop'");
        assert_eq!(sql_literal(&Value::Timestamp(ts)), "'2020-01-26 20:00:00'");
        assert_eq!(
            sql_literal(&Value::Interval(chrono::Duration::seconds(90))),
            "'90 seconds'"
        );
    }

    #[test]
    fn test_render_seed_one_line_per_row() {
        let records = RecordSet::from_rows(
            ["a", "b"],
            vec![
                vec![Value::Integer(1), Value::text("x")],
                vec![Value::Float(2.0), Value::Null],
            ],
        )
        .unwrap();

        let seed = render_seed(&records, "t");
        assert_eq!(
            seed,
            "INSERT INTO \"t\" VALUES (1, 'x');\nINSERT INTO \"t\" VALUES (2, NULL);\n"
        );
    }

    #[test]
    fn test_generator_writes_both_scripts() {
        let dir = tempdir().unwrap();
        let generator = SchemaSeedGenerator::new(dir.path().join("sql"));
        let records =
            RecordSet::from_rows(["n"], vec![vec![Value::Integer(1)]]).unwrap();

        let scripts = generator.generate(&records, "combined").unwrap();
        assert!(scripts.schema_path.ends_with("combined_schema.sql"));
        assert!(scripts.seed_path.ends_with("combined_seed.sql"));
        assert_eq!(
            fs::read_to_string(&scripts.seed_path).unwrap(),
            "INSERT INTO \"combined\" VALUES (1);\n"
        );
        assert!(fs::read_to_string(&scripts.schema_path)
            .unwrap()
            .starts_with("CREATE TABLE \"combined\""));
        assert_eq!(scripts.rows, 1);
    }
}
