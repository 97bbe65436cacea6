use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{run_blocking, PipelineStep, StepResult, TaskContext};
use crate::error::Result;
use crate::pipeline::processing::NormalizationRegistry;

/// Pipeline step that normalizes one loaded dataset
pub struct TransformStep {
    task: &'static str,
    dataset: &'static str,
    upstream: &'static str,
    input_key: &'static str,
    output_key: &'static str,
    registry: Arc<NormalizationRegistry>,
}

impl TransformStep {
    pub fn new(
        task: &'static str,
        dataset: &'static str,
        upstream: (&'static str, &'static str),
        output_key: &'static str,
        registry: Arc<NormalizationRegistry>,
    ) -> Self {
        Self {
            task,
            dataset,
            upstream: upstream.0,
            input_key: upstream.1,
            output_key,
            registry,
        }
    }
}

#[async_trait]
impl PipelineStep for TransformStep {
    async fn execute(&self, ctx: &TaskContext) -> Result<StepResult> {
        info!("🔧 Normalizing {} dataset", self.dataset);

        let records = ctx.pull_records(self.upstream, self.input_key)?;
        let input_rows = records.len();
        let registry = Arc::clone(&self.registry);
        let dataset = self.dataset;
        let normalized = run_blocking(move || registry.normalize(dataset, records)).await?;
        let rows = normalized.len();
        ctx.push_records(self.task, self.output_key, normalized)?;

        let message = format!(
            "Normalized {} dataset: {} of {} rows kept",
            self.dataset, rows, input_rows
        );
        info!("✅ {}", message);
        Ok(StepResult::success(rows, message).with_metadata("input_rows", input_rows))
    }

    fn step_name(&self) -> &'static str {
        self.task
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![self.upstream]
    }
}
