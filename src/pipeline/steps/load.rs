use async_trait::async_trait;
use tracing::{debug, info};

use super::{PipelineStep, StepResult, TaskContext};
use crate::error::Result;
use crate::store::load_query;

/// Reads a whole staging table into a record set
pub struct LoadDatasetStep {
    task: &'static str,
    table: String,
    output_key: &'static str,
}

impl LoadDatasetStep {
    pub fn new(task: &'static str, table: impl Into<String>, output_key: &'static str) -> Self {
        Self {
            task,
            table: table.into(),
            output_key,
        }
    }
}

#[async_trait]
impl PipelineStep for LoadDatasetStep {
    async fn execute(&self, ctx: &TaskContext) -> Result<StepResult> {
        info!("🔄 Loading table '{}'", self.table);

        let sql = load_query(&ctx.config().query_path, Some(&self.table))?;
        debug!(query = %sql.trim(), "Resolved load query");

        let records = ctx.with_store(move |store| store.query(&sql, &[])).await?;
        let rows = records.len();
        let columns = records.width();
        ctx.push_records(self.task, self.output_key, records)?;

        let message = format!("Loaded {} rows ({} columns) from {}", rows, columns, self.table);
        info!("✅ {}", message);
        Ok(StepResult::success(rows, message).with_metadata("table", &self.table))
    }

    fn step_name(&self) -> &'static str {
        self.task
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }
}
