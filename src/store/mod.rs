//! Relational store access.

pub mod sqlite;

pub use sqlite::SqliteStore;

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{EtlError, Result};
use crate::frame::{RecordSet, Value};

/// Placeholder substituted by [`load_query`].
pub const TABLE_NAME_PLACEHOLDER: &str = "{{table_name}}";

/// Outcome of a batched script execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub statements: usize,
    pub batches: usize,
}

/// Connection-scoped access to a relational store.
///
/// Calls made while the store is closed open a connection for the duration
/// of the call and close it again afterwards, error or not. Calls made after
/// an explicit [`Store::open`] reuse that connection until [`Store::close`].
pub trait Store: Send {
    fn open(&mut self) -> Result<()>;

    /// Releases the connection. Closing a closed store is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Executes one statement and commits it. Returns the affected row count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Runs a read-only statement and returns every row with its column names.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<RecordSet>;

    /// Executes a multi-statement script in batches of `batch_size`
    /// statements, one transaction per batch. A failing batch is rolled back
    /// and aborts the script.
    fn execute_script(&mut self, script: &str, batch_size: usize) -> Result<BatchReport>;

    /// Inserts every row of `records` into `table` with bound parameters.
    fn insert_records(&mut self, table: &str, records: &RecordSet, batch_size: usize)
        -> Result<usize>;
}

/// A store shared between concurrently running tasks.
pub type SharedStore = Arc<Mutex<dyn Store>>;

pub fn shared(store: impl Store + 'static) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Locks a shared store for the duration of the returned guard.
pub fn lock(store: &SharedStore) -> Result<MutexGuard<'_, dyn Store + 'static>> {
    store.lock().map_err(|_| EtlError::LockPoisoned("store"))
}

/// Reads a SQL template and substitutes [`TABLE_NAME_PLACEHOLDER`] when a table name is given.
pub fn load_query(path: &Path, table_name: Option<&str>) -> Result<String> {
    let template = fs::read_to_string(path)?;
    Ok(match table_name {
        Some(table) => template.replace(TABLE_NAME_PLACEHOLDER, table),
        None => template,
    })
}

/// Quotes an identifier for use in generated SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Splits a script into statements on `;`, ignoring semicolons inside
/// single-quoted literals, double-quoted identifiers and `--` comments.
/// Blank statements are dropped and each statement is trimmed.
pub fn split_statements(script: &str) -> Vec<String> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Single,
        Double,
        Comment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                ';' => {
                    push_statement(&mut statements, &mut current);
                    continue;
                }
                '\'' => state = State::Single,
                '"' => state = State::Double,
                '-' if chars.peek() == Some(&'-') => state = State::Comment,
                _ => {}
            },
            State::Single if c == '\'' => state = State::Normal,
            State::Double if c == '"' => state = State::Normal,
            State::Comment if c == '\n' => state = State::Normal,
            _ => {}
        }
        current.push(c);
    }
    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    let only_comments = statement
        .lines()
        .all(|line| line.trim().is_empty() || line.trim_start().starts_with("--"));
    if !only_comments {
        statements.push(statement.to_string());
    }
    current.clear();
}
