use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, error, info, warn};

use super::{quote_ident, split_statements, BatchReport, Store};
use crate::config::ConnectionParams;
use crate::error::{EtlError, Result};
use crate::frame::{interval_text, RecordSet, Value, TIMESTAMP_FORMAT};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Timestamp(ts) => {
                ToSqlOutput::Owned(SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()))
            }
            Value::Interval(d) => ToSqlOutput::Owned(SqlValue::Text(interval_text(d))),
        })
    }
}

/// Converts a stored cell back into a [`Value`]. SQLite keeps booleans as
/// integers, so the column's declared type decides whether they come back as
/// [`Value::Boolean`].
fn from_sql_ref(value: ValueRef<'_>, decl_type: Option<&str>) -> Value {
    let declared_boolean = decl_type.is_some_and(|t| t.eq_ignore_ascii_case("BOOLEAN"));
    match value {
        ValueRef::Integer(i) if declared_boolean => Value::Boolean(i != 0),
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Text(hex::encode(bytes)),
    }
}

/// SQLite-backed [`Store`]. The database name from [`ConnectionParams`] is
/// the database file.
pub struct SqliteStore {
    params: ConnectionParams,
    conn: Option<Connection>,
}

impl SqliteStore {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params, conn: None }
    }

    /// Opens a store and keeps the connection open until [`Store::close`].
    pub fn connect(params: ConnectionParams) -> Result<Self> {
        let mut store = Self::new(params);
        store.open()?;
        Ok(store)
    }

    fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(EtlError::NotConnected)
    }

    /// Runs `f` against an open connection. A connection opened here is
    /// closed again before returning, whether `f` succeeded or not.
    fn scoped<T>(&mut self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let opened_here = !self.is_open();
        if opened_here {
            self.open()?;
        }
        let result = self.connection().and_then(f);
        if opened_here {
            self.close();
        }
        result
    }

    fn ensure_open(&mut self) -> Result<()> {
        if !self.is_open() {
            warn!("Connection closed. Reopening...");
            self.open()?;
        }
        Ok(())
    }
}

impl Store for SqliteStore {
    fn open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let path = self.params.database_path();
        debug!(
            database = %path.display(),
            user = self.params.user.as_deref().unwrap_or(""),
            host = self.params.host.as_deref().unwrap_or(""),
            "Opening store connection"
        );
        let conn = Connection::open(&path)?;
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_conn, e)) = conn.close() {
                warn!("Error while closing store connection: {}", e);
            }
            debug!("Closed store connection");
        }
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        self.scoped(|conn| {
            let tx = conn.unchecked_transaction()?;
            let affected = tx.execute(sql, params_from_iter(params.iter()))?;
            tx.commit()?;
            debug!(affected, "✓ Statement executed");
            Ok(affected)
        })
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<RecordSet> {
        self.scoped(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let decl_types: Vec<Option<String>> = stmt
                .columns()
                .iter()
                .map(|c| c.decl_type().map(String::from))
                .collect();
            let width = columns.len();
            let mut records = RecordSet::new(columns);

            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(from_sql_ref(row.get_ref(idx)?, decl_types[idx].as_deref()));
                }
                records.push_row(values)?;
            }
            debug!(rows = records.len(), columns = width, "Query returned rows");
            Ok(records)
        })
    }

    fn execute_script(&mut self, script: &str, batch_size: usize) -> Result<BatchReport> {
        if batch_size == 0 {
            return Err(EtlError::Config("batch size must be greater than zero".to_string()));
        }
        let statements = split_statements(script);
        let opened_here = !self.is_open();
        let mut report = BatchReport::default();

        let result = (|| -> Result<BatchReport> {
            for (batch_index, batch) in statements.chunks(batch_size).enumerate() {
                let start = batch_index * batch_size;
                self.ensure_open()?;
                let conn = self.connection()?;
                let tx = conn.unchecked_transaction()?;
                if let Err(source) = batch.iter().try_for_each(|statement| tx.execute_batch(statement)) {
                    error!(start, error = %source, "✗ Error inserting batch, rolling back");
                    if let Err(e) = tx.rollback() {
                        warn!("Rollback failed: {}", e);
                    }
                    return Err(EtlError::Batch { start, source });
                }
                tx.commit()?;
                report.statements += batch.len();
                report.batches += 1;
                info!(start, statements = batch.len(), "✓ Successfully inserted batch");
            }
            Ok(report)
        })();

        if opened_here {
            self.close();
        }
        result
    }

    fn insert_records(
        &mut self,
        table: &str,
        records: &RecordSet,
        batch_size: usize,
    ) -> Result<usize> {
        if batch_size == 0 {
            return Err(EtlError::Config("batch size must be greater than zero".to_string()));
        }
        let placeholders = (1..=records.width())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO {} VALUES ({})", quote_ident(table), placeholders);

        self.scoped(|conn| {
            let mut inserted = 0;
            for batch in records.rows().chunks(batch_size) {
                let tx = conn.unchecked_transaction()?;
                {
                    let mut stmt = tx.prepare_cached(&sql)?;
                    for row in batch {
                        inserted += stmt.execute(params_from_iter(row.iter()))?;
                    }
                }
                tx.commit()?;
            }
            info!(table, rows = inserted, "✓ Inserted records");
            Ok(inserted)
        })
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        self.close();
    }
}
