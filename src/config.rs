use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{EtlError, Result};

pub const DB_USER_VAR: &str = "ETL_DB_USER";
pub const DB_PASSWORD_VAR: &str = "ETL_DB_PASSWORD";
pub const DB_HOST_VAR: &str = "ETL_DB_HOST";
pub const DB_PORT_VAR: &str = "ETL_DB_PORT";
pub const DB_NAME_VAR: &str = "ETL_DB_NAME";

const IN_MEMORY: &str = ":memory:";

/// Relational store connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: String,
}

impl ConnectionParams {
    /// Reads connection parameters from the environment, loading `.env` first.
    /// Only the database name is required.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database = env::var(DB_NAME_VAR).map_err(|source| EtlError::Env {
            name: DB_NAME_VAR.to_string(),
            source,
        })?;
        let port = match optional_var(DB_PORT_VAR) {
            Some(raw) => Some(raw.parse::<u16>().map_err(|e| {
                EtlError::Config(format!("{DB_PORT_VAR}='{raw}' is not a valid port: {e}"))
            })?),
            None => None,
        };

        Ok(Self {
            user: optional_var(DB_USER_VAR),
            password: optional_var(DB_PASSWORD_VAR),
            host: optional_var(DB_HOST_VAR),
            port,
            database,
        })
    }

    /// Parameters for a local SQLite database file (or `:memory:`).
    pub fn sqlite(database: impl AsRef<Path>) -> Self {
        Self {
            user: None,
            password: None,
            host: None,
            port: None,
            database: database.as_ref().to_string_lossy().into_owned(),
        }
    }

    /// Database file for the SQLite backend: the database name as given when
    /// it has an extension or is `:memory:`, otherwise with `.db` appended.
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database);
        if self.database == IN_MEMORY || path.extension().is_some() {
            path
        } else {
            path.with_extension("db")
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_appends_extension() {
        assert_eq!(
            ConnectionParams::sqlite("staging").database_path(),
            PathBuf::from("staging.db")
        );
        assert_eq!(
            ConnectionParams::sqlite("data/etl.sqlite").database_path(),
            PathBuf::from("data/etl.sqlite")
        );
        assert_eq!(
            ConnectionParams::sqlite(":memory:").database_path(),
            PathBuf::from(":memory:")
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut params = ConnectionParams::sqlite("x");
        params.password = Some("hunter2".to_string());
        let rendered = format!("{params:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}
