//! # Task Executor Traits
//!
//! The interface the reconciler needs from the remote optimization engine.
//! The engine runs at most one job at a time and keeps a bounded cache of
//! finished job results, which is why [`TaskExecutor::user_tasks`] is
//! best-effort.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constants::summary;
use crate::error::ExecutorError;
use crate::models::TargetCluster;
use crate::state_machine::TaskState;

/// Free-form request parameters forwarded to the engine verbs
pub type TaskParameters = BTreeMap<String, String>;

/// Health of the engine as seen by one status call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineStatus {
    pub ready: bool,
    pub in_execution: bool,
}

impl EngineStatus {
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The engine is busy with a job and will not accept another one
    pub fn in_execution(&self) -> bool {
        self.in_execution
    }
}

/// Summary of the proposal computed by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub data_to_move_mb: i64,
    pub num_replica_movements: i64,
    pub intra_broker_data_to_move_mb: i64,
    pub num_intra_broker_replica_movements: i64,
    pub num_leader_movements: i64,
    pub recent_windows: i64,
    pub provision_recommendation: String,
}

impl OptimizationSummary {
    /// Human-readable form stored on the task
    pub fn to_summary_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (summary::DATA_TO_MOVE.to_string(), self.data_to_move_mb.to_string()),
            (
                summary::REPLICA_MOVEMENTS.to_string(),
                self.num_replica_movements.to_string(),
            ),
            (
                summary::INTRA_BROKER_DATA_TO_MOVE.to_string(),
                self.intra_broker_data_to_move_mb.to_string(),
            ),
            (
                summary::INTRA_BROKER_REPLICA_MOVEMENTS.to_string(),
                self.num_intra_broker_replica_movements.to_string(),
            ),
            (
                summary::LEADER_MOVEMENTS.to_string(),
                self.num_leader_movements.to_string(),
            ),
            (summary::RECENT_WINDOWS.to_string(), self.recent_windows.to_string()),
            (
                summary::PROVISION_RECOMMENDATION.to_string(),
                self.provision_recommendation.clone(),
            ),
        ])
    }
}

/// Result of a job submission or a job status poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Remote job ID
    pub task_id: String,
    pub state: TaskState,
    /// Start time as reported by the engine (RFC 1123 text)
    pub started_at: String,
    pub request_url: String,
    pub response_status_code: u16,
    pub result: Option<OptimizationSummary>,
    pub error: Option<String>,
}

impl TaskResult {
    /// Stand-in for a job the engine has forgotten
    pub fn missing(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            state: TaskState::CompletedWithError,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Client of the remote optimization engine for one cluster
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Readiness and busy signal of the engine
    async fn status(&self) -> Result<EngineStatus, ExecutorError>;

    async fn add_brokers(&self, params: &TaskParameters) -> Result<TaskResult, ExecutorError>;

    async fn remove_brokers(&self, params: &TaskParameters) -> Result<TaskResult, ExecutorError>;

    async fn rebalance(&self, params: &TaskParameters) -> Result<TaskResult, ExecutorError>;

    /// Stop whatever job the engine is running
    async fn stop_execution(&self) -> Result<TaskResult, ExecutorError>;

    /// Bulk poll of job results. Unknown IDs are simply absent from the answer.
    async fn user_tasks(&self, task_ids: &[String]) -> Result<Vec<TaskResult>, ExecutorError>;
}

/// Builds an executor for a resolved cluster
#[async_trait]
pub trait ExecutorFactory: Send + Sync {
    async fn create(&self, cluster: &TargetCluster) -> Result<Arc<dyn TaskExecutor>, ExecutorError>;
}
