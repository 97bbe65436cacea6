use async_trait::async_trait;
use tracing::info;

use super::{PipelineStep, StepResult, TaskContext};
use crate::constants::{
    COMBINED_DATA_KEY, MERGE_TASK, SCHEMA_PATH_KEY, SCHEMA_SEED_TASK, SEED_PATH_KEY,
};
use crate::error::Result;
use crate::pipeline::processing::SchemaSeedGenerator;

/// Writes the target table definition and seed script for the merged data
pub struct SchemaSeedStep;

impl SchemaSeedStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SchemaSeedStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for SchemaSeedStep {
    async fn execute(&self, ctx: &TaskContext) -> Result<StepResult> {
        let config = ctx.config();
        info!("📝 Inferring schema for table '{}'", config.target_table);

        let combined = ctx.pull_records(MERGE_TASK, COMBINED_DATA_KEY)?;
        let generator = SchemaSeedGenerator::new(&config.schema_seed_dir);
        let scripts = generator.generate(&combined, &config.target_table)?;

        ctx.push_path(SCHEMA_SEED_TASK, SCHEMA_PATH_KEY, &scripts.schema_path)?;
        ctx.push_path(SCHEMA_SEED_TASK, SEED_PATH_KEY, &scripts.seed_path)?;

        let message = format!(
            "✓ The SQL scripts have been successfully saved to {} and {}",
            scripts.schema_path.display(),
            scripts.seed_path.display()
        );
        info!("{}", message);
        Ok(StepResult::success(scripts.rows, message)
            .with_metadata("columns", scripts.schema.columns.len()))
    }

    fn step_name(&self) -> &'static str {
        SCHEMA_SEED_TASK
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![MERGE_TASK]
    }
}
