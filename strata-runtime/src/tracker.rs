//! Execution tracker
//!
//! Keyed registry of in-flight pipeline executions. Executions are
//! inserted at call entry, their snapshots refreshed as stages progress,
//! and always removed on completion or failure, so the active list never
//! contains an execution whose terminal event has fired.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use strata_core::{ExecutionId, PipelineExecution};

/// In-memory registry of in-flight executions
#[derive(Clone, Default)]
pub struct ExecutionTracker {
    inner: Arc<RwLock<HashMap<ExecutionId, PipelineExecution>>>,
}

impl ExecutionTracker {
    /// Create a new empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an execution as in-flight
    pub async fn insert(&self, execution: PipelineExecution) {
        self.inner.write().await.insert(execution.id, execution);
    }

    /// Refresh the snapshot of an in-flight execution.
    ///
    /// No-op if the execution has already been evicted.
    pub async fn update(&self, execution: PipelineExecution) {
        let mut inner = self.inner.write().await;
        if let Some(slot) = inner.get_mut(&execution.id) {
            *slot = execution;
        }
    }

    /// Get a snapshot of an in-flight execution
    pub async fn get(&self, id: ExecutionId) -> Option<PipelineExecution> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Snapshots of all in-flight executions
    pub async fn active(&self) -> Vec<PipelineExecution> {
        self.inner.read().await.values().cloned().collect()
    }

    /// Number of in-flight executions
    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Evict an execution, returning its final snapshot
    pub async fn remove(&self, id: ExecutionId) -> Option<PipelineExecution> {
        self.inner.write().await.remove(&id)
    }
}
