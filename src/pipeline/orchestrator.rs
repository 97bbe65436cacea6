use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::pipeline_config::{ErrorHandlingStrategy, RetryPolicy};
use super::steps::{PipelineStep, SharedContext, StepResult};
use crate::error::{EtlError, Result};

/// Named steps plus the edges between them.
///
/// Steps whose dependencies have all finished form a wave; the steps of one
/// wave run concurrently and a wave only starts once the previous one is done.
pub struct TaskGraph {
    name: String,
    steps: Vec<Arc<dyn PipelineStep>>,
    retry: RetryPolicy,
    error_handling: ErrorHandlingStrategy,
}

impl TaskGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            retry: RetryPolicy::default(),
            error_handling: ErrorHandlingStrategy::ContinueOnError,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_error_handling(mut self, strategy: ErrorHandlingStrategy) -> Self {
        self.error_handling = strategy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a step. Task ids must be unique.
    pub fn add_step(&mut self, step: Arc<dyn PipelineStep>) -> Result<()> {
        let id = step.step_name();
        if self.steps.iter().any(|s| s.step_name() == id) {
            return Err(EtlError::Graph(format!("duplicate task id '{id}'")));
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Dependencies of every task, in insertion order.
    pub fn edges(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        self.steps
            .iter()
            .map(|s| (s.step_name(), s.dependencies()))
            .collect()
    }

    /// Groups task indices into waves. Fails on unknown dependencies and cycles.
    fn waves(&self) -> Result<Vec<Vec<usize>>> {
        let index: HashMap<&str, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.step_name(), i))
            .collect();

        let mut pending: Vec<(usize, Vec<usize>)> = Vec::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            let mut deps = Vec::new();
            for dep in step.dependencies() {
                let &d = index.get(dep).ok_or_else(|| {
                    EtlError::Graph(format!(
                        "task '{}' depends on unknown task '{}'",
                        step.step_name(),
                        dep
                    ))
                })?;
                deps.push(d);
            }
            pending.push((i, deps));
        }

        let mut done: HashSet<usize> = HashSet::new();
        let mut waves = Vec::new();
        while !pending.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|(_, deps)| deps.iter().all(|d| done.contains(d)));
            if ready.is_empty() {
                let names: Vec<&str> = blocked
                    .iter()
                    .map(|(i, _)| self.steps[*i].step_name())
                    .collect();
                return Err(EtlError::Graph(format!(
                    "dependency cycle among [{}]",
                    names.join(", ")
                )));
            }
            let wave: Vec<usize> = ready.into_iter().map(|(i, _)| i).collect();
            done.extend(wave.iter().copied());
            waves.push(wave);
            pending = blocked;
        }
        Ok(waves)
    }

    pub fn validate(&self) -> Result<()> {
        self.waves().map(|_| ())
    }

    /// Task ids in an order that respects every dependency.
    pub fn topological_order(&self) -> Result<Vec<&'static str>> {
        Ok(self
            .waves()?
            .into_iter()
            .flatten()
            .map(|i| self.steps[i].step_name())
            .collect())
    }

    /// Runs every task once, with retries, and reports on each.
    ///
    /// A task whose dependency failed or was skipped is skipped. Under
    /// [`ErrorHandlingStrategy::StopOnFirstError`] every task after the first
    /// failed wave is skipped as well.
    pub async fn run(&self, ctx: SharedContext) -> Result<GraphRunResult> {
        let waves = self.waves()?;
        let mut result = GraphRunResult::new(self.name.clone(), ctx.run_id());
        info!(
            "🚀 Starting pipeline '{}' ({} tasks, {} waves, run {})",
            self.name,
            self.steps.len(),
            waves.len(),
            ctx.run_id()
        );

        let mut states: HashMap<&'static str, TaskState> = HashMap::new();
        let mut stop = false;

        for wave in waves {
            let mut handles = Vec::new();
            for i in wave {
                let step = Arc::clone(&self.steps[i]);
                let id = step.step_name();
                let blocked_by = step
                    .dependencies()
                    .into_iter()
                    .find(|d| states.get(d) != Some(&TaskState::Succeeded));

                if stop || blocked_by.is_some() {
                    let reason = match blocked_by {
                        Some(dep) => format!("upstream task '{dep}' did not succeed"),
                        None => "pipeline stopped after an earlier failure".to_string(),
                    };
                    warn!("⏭️ Skipping task '{}': {}", id, reason);
                    states.insert(id, TaskState::Skipped);
                    result.tasks.push(TaskReport::skipped(id, reason));
                    continue;
                }

                let ctx = Arc::clone(&ctx);
                let retry = self.retry;
                handles.push((
                    id,
                    tokio::spawn(async move { run_with_retry(step, ctx, retry).await }),
                ));
            }

            for (id, handle) in handles {
                let report = match handle.await {
                    Ok(report) => report,
                    Err(join_error) => {
                        error!("❌ Task '{}' aborted: {}", id, join_error);
                        TaskReport::aborted(id, join_error.to_string())
                    }
                };
                if report.state == TaskState::Failed
                    && self.error_handling == ErrorHandlingStrategy::StopOnFirstError
                {
                    stop = true;
                }
                states.insert(id, report.state);
                result.tasks.push(report);
            }
        }

        result.complete();
        if result.success {
            info!("🎉 Pipeline '{}' completed successfully", self.name);
        } else {
            error!(
                "💥 Pipeline '{}' finished with failed tasks: [{}]",
                self.name,
                result.failed_tasks().join(", ")
            );
        }
        Ok(result)
    }
}

async fn run_with_retry(
    step: Arc<dyn PipelineStep>,
    ctx: SharedContext,
    retry: RetryPolicy,
) -> TaskReport {
    let id = step.step_name();
    let started_at = Utc::now();
    let max_attempts = retry.max_attempts();
    let mut attempts = 0;

    loop {
        attempts += 1;
        info!("🔄 Running task '{}' (attempt {}/{})", id, attempts, max_attempts);
        match step.execute(&ctx).await {
            Ok(step_result) => {
                return TaskReport::finished(id, started_at, attempts, Ok(step_result));
            }
            Err(e) if attempts < max_attempts => {
                warn!(
                    "⚠️ Task '{}' failed on attempt {}: {}. Retrying in {}s",
                    id, attempts, e, retry.delay_secs
                );
                tokio::time::sleep(retry.delay()).await;
            }
            Err(e) => {
                error!("❌ Task '{}' failed after {} attempt(s): {}", id, attempts, e);
                return TaskReport::finished(id, started_at, attempts, Err(e));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Succeeded,
    Failed,
    Skipped,
}

/// Outcome of one task in a run
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub state: TaskState,
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub processed_count: usize,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl TaskReport {
    fn finished(
        task: &str,
        started_at: DateTime<Utc>,
        attempts: u32,
        outcome: Result<StepResult>,
    ) -> Self {
        let duration_ms = Some((Utc::now() - started_at).num_milliseconds());
        let (state, step_result) = match outcome {
            Ok(step_result) => (TaskState::Succeeded, step_result),
            Err(e) => (
                TaskState::Failed,
                StepResult {
                    message: e.to_string(),
                    ..StepResult::default()
                },
            ),
        };
        Self {
            task: task.to_string(),
            state,
            attempts,
            started_at: Some(started_at),
            duration_ms,
            processed_count: step_result.processed_count,
            message: step_result.message,
            metadata: step_result.metadata,
        }
    }

    fn skipped(task: &str, reason: String) -> Self {
        Self {
            task: task.to_string(),
            state: TaskState::Skipped,
            attempts: 0,
            started_at: None,
            duration_ms: None,
            processed_count: 0,
            message: reason,
            metadata: BTreeMap::new(),
        }
    }

    fn aborted(task: &str, message: String) -> Self {
        Self {
            state: TaskState::Failed,
            attempts: 1,
            ..Self::skipped(task, message)
        }
    }
}

/// Result of executing a complete task graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphRunResult {
    pub pipeline_name: String,
    pub run_id: Uuid,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tasks: Vec<TaskReport>,
}

impl GraphRunResult {
    pub fn new(pipeline_name: String, run_id: Uuid) -> Self {
        Self {
            pipeline_name,
            run_id,
            success: true,
            started_at: Utc::now(),
            completed_at: None,
            tasks: Vec::new(),
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
        self.success = self.tasks.iter().all(|t| t.state == TaskState::Succeeded);
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    pub fn task(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.task == id)
    }

    pub fn failed_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Failed)
            .map(|t| t.task.as_str())
            .collect()
    }

    /// Turns the first failed task into an error.
    pub fn into_result(self) -> Result<Self> {
        match self.tasks.iter().find(|t| t.state == TaskState::Failed) {
            Some(failed) => Err(EtlError::Task {
                task: failed.task.clone(),
                attempts: failed.attempts,
                message: failed.message.clone(),
            }),
            None => Ok(self),
        }
    }

    /// Writes the run result as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionParams;
    use crate::pipeline::pipeline_config::PipelineConfig;
    use crate::pipeline::steps::TaskContext;
    use crate::store::{self, SqliteStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeStep {
        id: &'static str,
        deps: Vec<&'static str>,
        failures_before_success: u32,
        calls: AtomicU32,
    }

    impl FakeStep {
        fn new(id: &'static str, deps: Vec<&'static str>) -> Self {
            Self::flaky(id, deps, 0)
        }

        fn flaky(id: &'static str, deps: Vec<&'static str>, failures: u32) -> Self {
            Self {
                id,
                deps,
                failures_before_success: failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PipelineStep for FakeStep {
        async fn execute(&self, ctx: &TaskContext) -> Result<StepResult> {
            for dep in &self.deps {
                ctx.pull_records(dep, "out")?;
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(EtlError::Graph(format!("{} attempt {}", self.id, call + 1)));
            }
            ctx.push_records(self.id, "out", crate::frame::RecordSet::new(["x"]))?;
            Ok(StepResult::success(1, format!("{} done", self.id)))
        }

        fn step_name(&self) -> &'static str {
            self.id
        }

        fn dependencies(&self) -> Vec<&'static str> {
            self.deps.clone()
        }
    }

    fn context() -> SharedContext {
        let store = store::shared(SqliteStore::new(ConnectionParams::sqlite(":memory:")));
        Arc::new(TaskContext::new(PipelineConfig::default(), store))
    }

    fn graph(steps: Vec<FakeStep>) -> TaskGraph {
        let mut graph = TaskGraph::new("test").with_retry(RetryPolicy::none());
        for step in steps {
            graph.add_step(Arc::new(step)).unwrap();
        }
        graph
    }

    fn diamond() -> Vec<FakeStep> {
        vec![
            FakeStep::new("merge", vec!["left", "right"]),
            FakeStep::new("left", vec![]),
            FakeStep::new("right", vec![]),
            FakeStep::new("load", vec!["merge"]),
        ]
    }

    #[test]
    fn test_topological_order_respects_dependencies() {
        let order = graph(diamond()).topological_order().unwrap();
        assert_eq!(order, vec!["left", "right", "merge", "load"]);
    }

    #[test]
    fn test_duplicate_task_ids_are_rejected() {
        let mut graph = graph(vec![FakeStep::new("a", vec![])]);
        let err = graph.add_step(Arc::new(FakeStep::new("a", vec![]))).unwrap_err();
        assert!(matches!(err, EtlError::Graph(_)));
    }

    #[test]
    fn test_unknown_dependency_and_cycle_are_invalid() {
        let unknown = graph(vec![FakeStep::new("a", vec!["ghost"])]);
        assert!(matches!(unknown.validate(), Err(EtlError::Graph(m)) if m.contains("ghost")));

        let cycle = graph(vec![
            FakeStep::new("a", vec!["b"]),
            FakeStep::new("b", vec!["a"]),
            FakeStep::new("c", vec![]),
        ]);
        assert!(matches!(cycle.validate(), Err(EtlError::Graph(m)) if m.contains("cycle")));
    }

    #[tokio::test]
    async fn test_run_executes_every_task_with_handoffs() {
        let result = graph(diamond()).run(context()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.tasks.len(), 4);
        assert!(result.tasks.iter().all(|t| t.attempts == 1));
        assert!(result.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_skips_downstream_only() {
        let steps = vec![
            FakeStep::flaky("left", vec![], 5),
            FakeStep::new("right", vec![]),
            FakeStep::new("merge", vec!["left", "right"]),
            FakeStep::new("other", vec!["right"]),
        ];
        let result = graph(steps).run(context()).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.task("left").unwrap().state, TaskState::Failed);
        assert_eq!(result.task("right").unwrap().state, TaskState::Succeeded);
        assert_eq!(result.task("merge").unwrap().state, TaskState::Skipped);
        assert_eq!(result.task("other").unwrap().state, TaskState::Succeeded);
        assert_eq!(result.failed_tasks(), vec!["left"]);

        let err = result.into_result().unwrap_err();
        assert!(matches!(err, EtlError::Task { task, attempts: 1, .. } if task == "left"));
    }

    #[tokio::test]
    async fn test_stop_on_first_error_skips_independent_tasks() {
        let steps = vec![
            FakeStep::flaky("a", vec![], 5),
            FakeStep::new("b", vec![]),
            FakeStep::new("c", vec!["b"]),
        ];
        let result = graph(steps)
            .with_error_handling(ErrorHandlingStrategy::StopOnFirstError)
            .run(context())
            .await
            .unwrap();

        assert_eq!(result.task("b").unwrap().state, TaskState::Succeeded);
        assert_eq!(result.task("c").unwrap().state, TaskState::Skipped);
    }

    #[tokio::test]
    async fn test_retry_recovers_flaky_task() {
        let mut graph = TaskGraph::new("retry").with_retry(RetryPolicy {
            retries: 2,
            delay_secs: 0,
        });
        graph
            .add_step(Arc::new(FakeStep::flaky("flaky", vec![], 2)))
            .unwrap();

        let result = graph.run(context()).await.unwrap();
        let report = result.task("flaky").unwrap();
        assert_eq!(report.state, TaskState::Succeeded);
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn test_run_result_serializes_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let result = graph(diamond()).run(context()).await.unwrap();

        let path = result.write_json(&dir.path().join("reports/run.json")).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["tasks"][0]["state"], "succeeded");
        assert_eq!(json["pipeline_name"], "test");
    }
}
