use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {name}: {source}")]
    Env {
        name: String,
        #[source]
        source: std::env::VarError,
    },

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Column layouts differ: {0}")]
    ColumnMismatch(String),

    #[error("Cannot infer a schema for table '{0}' without columns")]
    EmptySchema(String),

    #[error("Row has {found} values but the record set has {expected} columns")]
    RowArity { expected: usize, found: usize },

    #[error("No normalizer registered for dataset: {0}")]
    UnknownDataset(String),

    #[error("No value under key '{key}' from task '{task}'")]
    MissingHandoff { task: String, key: String },

    #[error("Invalid task graph: {0}")]
    Graph(String),

    #[error("Batch starting at statement {start} failed: {source}")]
    Batch {
        start: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store connection is not open")]
    NotConnected,

    #[error("Blocking work did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0} lock poisoned by a panicked task")]
    LockPoisoned(&'static str),

    #[error("Task '{task}' failed after {attempts} attempt(s): {message}")]
    Task {
        task: String,
        attempts: u32,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, EtlError>;
