// Data pipeline: processing, steps, and the task graph that runs them

pub mod orchestrator;
pub mod pipeline_config;
pub mod processing;
pub mod staging;
pub mod steps;

use std::sync::Arc;

use tracing::info;

use crate::constants::{
    AWARD_CLEAN_KEY, AWARD_DATASET, AWARD_DATA_KEY, LOAD_AWARD_TASK, LOAD_TRACK_TASK,
    TRACK_CLEAN_KEY, TRACK_DATASET, TRACK_DATA_KEY, TRANSFORM_AWARD_TASK, TRANSFORM_TRACK_TASK,
};
use crate::error::Result;
use crate::store::SharedStore;
use orchestrator::{GraphRunResult, TaskGraph};
use pipeline_config::PipelineConfig;
use processing::NormalizationRegistry;
use steps::{
    LoadDatasetStep, LoadStoreStep, MergeStep, SchemaSeedStep, TaskContext, TransformStep,
};

/// Builds the award/track graph:
///
/// ```text
/// load_grammy_dataset  -> transform_grammy_data  \
///                                                 merge_datasets -> infer_schema_and_seed -> create_table_and_insert_data
/// load_spotify_dataset -> transform_spotify_data /
/// ```
pub fn build_graph(config: &PipelineConfig) -> Result<TaskGraph> {
    let registry = Arc::new(NormalizationRegistry::new());
    let mut graph = TaskGraph::new(&config.name)
        .with_retry(config.retry)
        .with_error_handling(config.error_handling);

    graph.add_step(Arc::new(LoadDatasetStep::new(
        LOAD_AWARD_TASK,
        &config.award_table,
        AWARD_DATA_KEY,
    )))?;
    graph.add_step(Arc::new(LoadDatasetStep::new(
        LOAD_TRACK_TASK,
        &config.track_table,
        TRACK_DATA_KEY,
    )))?;
    graph.add_step(Arc::new(TransformStep::new(
        TRANSFORM_AWARD_TASK,
        AWARD_DATASET,
        (LOAD_AWARD_TASK, AWARD_DATA_KEY),
        AWARD_CLEAN_KEY,
        Arc::clone(&registry),
    )))?;
    graph.add_step(Arc::new(TransformStep::new(
        TRANSFORM_TRACK_TASK,
        TRACK_DATASET,
        (LOAD_TRACK_TASK, TRACK_DATA_KEY),
        TRACK_CLEAN_KEY,
        registry,
    )))?;
    graph.add_step(Arc::new(MergeStep::new()))?;
    graph.add_step(Arc::new(SchemaSeedStep::new()))?;
    graph.add_step(Arc::new(LoadStoreStep::new()))?;

    graph.validate()?;
    Ok(graph)
}

/// Runs the whole graph once against `store`.
pub async fn run_pipeline(config: PipelineConfig, store: SharedStore) -> Result<GraphRunResult> {
    config.validate()?;
    let graph = build_graph(&config)?;
    let ctx = Arc::new(TaskContext::new(config, store));
    info!(run_id = %ctx.run_id(), "Pipeline context ready");
    graph.run(ctx).await
}
