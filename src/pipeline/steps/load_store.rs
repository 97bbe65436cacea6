use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{PipelineStep, StepResult, TaskContext};
use crate::constants::{LOAD_TO_STORE_TASK, SCHEMA_PATH_KEY, SCHEMA_SEED_TASK, SEED_PATH_KEY};
use crate::error::Result;
use crate::store::{quote_ident, BatchReport, Store};

/// Creates the target table and runs the seed script in batches
pub struct LoadStoreStep;

impl LoadStoreStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoadStoreStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a schema script and then a seed script against `store`.
///
/// When `replace_table` names a table it is dropped first. Returns the
/// outcome of the seed script.
pub fn load_scripts(
    store: &mut dyn Store,
    schema_path: &Path,
    seed_path: &Path,
    batch_size: usize,
    replace_table: Option<&str>,
) -> Result<BatchReport> {
    let schema = fs::read_to_string(schema_path)?;
    let seed = fs::read_to_string(seed_path)?;

    if let Some(table) = replace_table {
        warn!("Dropping table '{}' before reloading", table);
        store.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), &[])?;
    }
    store.execute_script(&schema, batch_size)?;
    info!("Table created from {}", schema_path.display());

    let report = store.execute_script(&seed, batch_size)?;
    info!(
        statements = report.statements,
        batches = report.batches,
        "Seed script applied from {}",
        seed_path.display()
    );
    Ok(report)
}

#[async_trait]
impl PipelineStep for LoadStoreStep {
    async fn execute(&self, ctx: &TaskContext) -> Result<StepResult> {
        let config = ctx.config();
        info!("🗄️ Loading '{}' into the store", config.target_table);

        let schema_path = ctx.pull_path(SCHEMA_SEED_TASK, SCHEMA_PATH_KEY)?;
        let seed_path = ctx.pull_path(SCHEMA_SEED_TASK, SEED_PATH_KEY)?;
        let replace = config
            .replace_target
            .then(|| config.target_table.clone());
        let batch_size = config.batch_size;

        let report = ctx
            .with_store(move |store| {
                load_scripts(store, &schema_path, &seed_path, batch_size, replace.as_deref())
            })
            .await?;

        let message = format!(
            "Inserted {} rows into {} in {} batch(es)",
            report.statements, config.target_table, report.batches
        );
        info!("✅ {}", message);
        Ok(StepResult::success(report.statements, message).with_metadata("batches", report.batches))
    }

    fn step_name(&self) -> &'static str {
        LOAD_TO_STORE_TASK
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![SCHEMA_SEED_TASK]
    }
}
