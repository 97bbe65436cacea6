use async_trait::async_trait;
use tracing::info;

use super::{PipelineStep, StepResult, TaskContext};
use crate::constants::{
    AWARD_CLEAN_KEY, COMBINED_DATA_KEY, MERGE_TASK, TRANSFORM_AWARD_TASK, TRANSFORM_TRACK_TASK,
    TRACK_CLEAN_KEY,
};
use crate::error::Result;
use crate::frame::csv_io::write_csv;
use crate::pipeline::processing::fuzzy_merge;

/// Joins the normalized award and track sets and optionally exports the result
pub struct MergeStep;

impl MergeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MergeStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for MergeStep {
    async fn execute(&self, ctx: &TaskContext) -> Result<StepResult> {
        info!("🔗 Merging award and track datasets");

        let awards = ctx.pull_records(TRANSFORM_AWARD_TASK, AWARD_CLEAN_KEY)?;
        let tracks = ctx.pull_records(TRANSFORM_TRACK_TASK, TRACK_CLEAN_KEY)?;
        let output = fuzzy_merge(&awards, &tracks)?;
        let report = output.report;

        info!(
            "Number of records only in Spotify (albums): {}",
            report.album.right_only
        );
        info!(
            "Number of records only in Spotify (songs): {}",
            report.song.right_only
        );
        info!(
            "Total number of records in the combined data: {}",
            report.combined_rows
        );

        let mut result = StepResult::success(
            report.combined_rows,
            format!(
                "Merged {} awards with {} tracks into {} rows",
                awards.len(),
                tracks.len(),
                report.combined_rows
            ),
        )
        .with_metadata("album_matches", report.album.both)
        .with_metadata("song_matches", report.song.both)
        .with_metadata("album_track_only", report.album.right_only)
        .with_metadata("song_track_only", report.song.right_only)
        .with_metadata("duplicates_removed", report.duplicates_removed);

        if ctx.config().export_csv {
            let path = write_csv(&output.records, &ctx.config().export_path())?;
            info!("💾 Combined data saved at: {}", path.display());
            result = result.with_metadata("export_path", path.display());
        }

        ctx.push_records(MERGE_TASK, COMBINED_DATA_KEY, output.records)?;
        info!("✅ {}", result.message);
        Ok(result)
    }

    fn step_name(&self) -> &'static str {
        MERGE_TASK
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![TRANSFORM_AWARD_TASK, TRANSFORM_TRACK_TASK]
    }
}
