use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{
    AWARD_STAGING_TABLE, DEFAULT_BATCH_SIZE, DEFAULT_EXPORT_DIR, DEFAULT_EXPORT_FILE,
    DEFAULT_QUERY_PATH, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_SECS, DEFAULT_SCHEMA_SEED_DIR,
    TARGET_TABLE, TRACK_STAGING_TABLE,
};
use crate::error::{EtlError, Result};

/// Configuration for one pipeline run. Every field has a default, so an
/// empty or missing config file gives the standard award/track pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub description: String,
    pub award_table: String,
    pub track_table: String,
    pub target_table: String,
    pub query_path: PathBuf,
    pub schema_seed_dir: PathBuf,
    pub export_csv: bool,
    pub export_dir: PathBuf,
    pub export_file: String,
    pub batch_size: usize,
    /// Drop the target table before creating it.
    pub replace_target: bool,
    pub error_handling: ErrorHandlingStrategy,
    pub retry: RetryPolicy,
}

/// What happens to the rest of the graph when a task fails for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandlingStrategy {
    /// Skip every task that has not started yet
    StopOnFirstError,
    /// Skip only the tasks downstream of the failure
    ContinueOnError,
}

/// Whole-task retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay_secs: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "etl_process_spotify_grammy".to_string(),
            description: "Parallel dataset loading and cleaning".to_string(),
            award_table: AWARD_STAGING_TABLE.to_string(),
            track_table: TRACK_STAGING_TABLE.to_string(),
            target_table: TARGET_TABLE.to_string(),
            query_path: PathBuf::from(DEFAULT_QUERY_PATH),
            schema_seed_dir: PathBuf::from(DEFAULT_SCHEMA_SEED_DIR),
            export_csv: true,
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            export_file: DEFAULT_EXPORT_FILE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            replace_target: false,
            error_handling: ErrorHandlingStrategy::ContinueOnError,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        config.validate()?;
        info!("Loaded pipeline configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EtlError::Config("batch_size must be at least 1".to_string()));
        }
        for (field, value) in [
            ("award_table", &self.award_table),
            ("track_table", &self.track_table),
            ("target_table", &self.target_table),
            ("export_file", &self.export_file),
        ] {
            if value.trim().is_empty() {
                return Err(EtlError::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn export_path(&self) -> PathBuf {
        self.export_dir.join(&self.export_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_standard_pipeline() {
        let config = PipelineConfig::default();
        assert_eq!(config.target_table, "spotify_grammy_clean");
        assert_eq!(config.batch_size, 3000);
        assert_eq!(config.retry.max_attempts(), 2);
        assert_eq!(config.retry.delay(), Duration::from_secs(300));
        assert_eq!(
            config.export_path(),
            PathBuf::from("data/clean/combined_data_with_grammy_nomination.csv")
        );
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "batch_size = 10\nerror_handling = \"stop_on_first_error\"\n\n[retry]\nretries = 3\n",
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.error_handling, ErrorHandlingStrategy::StopOnFirstError);
        assert_eq!(config.retry.retries, 3);
        assert_eq!(config.retry.delay_secs, 300);
        assert_eq!(config.award_table, "grammy_staging");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_zero_batch_size_is_invalid() {
        let config = PipelineConfig {
            batch_size: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));
    }
}
