use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use super::pipeline_config::PipelineConfig;
use crate::error::{EtlError, Result};
use crate::frame::RecordSet;
use crate::store::{self, SharedStore, Store};

/// Common trait for all pipeline steps
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Execute this step, reading upstream outputs from and publishing its own to `ctx`
    async fn execute(&self, ctx: &TaskContext) -> Result<StepResult>;

    /// Task id of this step, unique within a graph
    fn step_name(&self) -> &'static str;

    /// Steps that must complete before this one starts
    fn dependencies(&self) -> Vec<&'static str>;
}

/// Result of executing a pipeline step
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepResult {
    pub processed_count: usize,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl StepResult {
    pub fn success(processed: usize, message: String) -> Self {
        Self {
            processed_count: processed,
            message,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Value published by one step for its dependents.
#[derive(Debug, Clone)]
pub enum Artifact {
    Records(RecordSet),
    Path(PathBuf),
}

/// State shared by every step of one run: configuration, the store and the
/// values steps hand to each other, keyed by (producing task, key).
pub struct TaskContext {
    run_id: Uuid,
    config: PipelineConfig,
    store: SharedStore,
    handoffs: Mutex<HashMap<(String, String), Artifact>>,
}

impl TaskContext {
    pub fn new(config: PipelineConfig, store: SharedStore) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            store,
            handoffs: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs `f` with exclusive access to the store on the blocking pool.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        run_blocking(move || {
            let mut guard = store::lock(&store)?;
            f(&mut *guard)
        })
        .await
    }

    /// Publishes a value. A later push under the same key replaces it.
    pub fn push(&self, task: &str, key: &str, artifact: Artifact) -> Result<()> {
        self.handoffs
            .lock()
            .map_err(|_| EtlError::LockPoisoned("handoff"))?
            .insert((task.to_string(), key.to_string()), artifact);
        Ok(())
    }

    pub fn pull(&self, task: &str, key: &str) -> Result<Artifact> {
        self.handoffs
            .lock()
            .map_err(|_| EtlError::LockPoisoned("handoff"))?
            .get(&(task.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| missing(task, key))
    }

    pub fn pull_records(&self, task: &str, key: &str) -> Result<RecordSet> {
        match self.pull(task, key)? {
            Artifact::Records(records) => Ok(records),
            Artifact::Path(_) => Err(missing(task, key)),
        }
    }

    pub fn pull_path(&self, task: &str, key: &str) -> Result<PathBuf> {
        match self.pull(task, key)? {
            Artifact::Path(path) => Ok(path),
            Artifact::Records(_) => Err(missing(task, key)),
        }
    }

    pub fn push_records(&self, task: &str, key: &str, records: RecordSet) -> Result<()> {
        self.push(task, key, Artifact::Records(records))
    }

    pub fn push_path(&self, task: &str, key: &str, path: &Path) -> Result<()> {
        self.push(task, key, Artifact::Path(path.to_path_buf()))
    }
}

/// Runs synchronous store or CPU-bound work on tokio's blocking pool so
/// tasks in the same wave overlap.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn missing(task: &str, key: &str) -> EtlError {
    EtlError::MissingHandoff {
        task: task.to_string(),
        key: key.to_string(),
    }
}

pub type SharedContext = Arc<TaskContext>;

pub mod load;
pub mod load_store;
pub mod merge;
pub mod schema_seed;
pub mod transform;

pub use load::LoadDatasetStep;
pub use load_store::LoadStoreStep;
pub use merge::MergeStep;
pub use schema_seed::SchemaSeedStep;
pub use transform::TransformStep;
