//! # Operation Record
//!
//! A declarative request for one rebalancing action, as stored in the object
//! store. The predicates here drive classification, finalization and event
//! filtering; they only read the record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::{ObjectKey, ObjectMeta};
use super::task::{CurrentTask, ErrorPolicy, TaskOperation};
use crate::constants::{CLUSTER_REF_LABEL, OPERATION_FINALIZER, PAUSE_ANNOTATION};
use crate::error::{ReconcilerError, ReconcilerResult};
use crate::state_machine::TaskState;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub current_task: Option<CurrentTask>,
    /// Oldest first, bounded by the configured history length
    #[serde(default)]
    pub failed_tasks: Vec<CurrentTask>,
    #[serde(default)]
    pub retry_count: u32,
    /// Copy of `spec.error_policy` taken when the status was last merged
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: OperationSpec,
    #[serde(default)]
    pub status: OperationStatus,
}

impl Operation {
    pub fn new(metadata: ObjectMeta, task: CurrentTask) -> Self {
        Self {
            metadata,
            spec: OperationSpec::default(),
            status: OperationStatus {
                current_task: Some(task),
                ..OperationStatus::default()
            },
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn current_task(&self) -> Option<&CurrentTask> {
        self.status.current_task.as_ref()
    }

    pub fn current_task_mut(&mut self) -> Option<&mut CurrentTask> {
        self.status.current_task.as_mut()
    }

    pub fn current_task_operation(&self) -> Option<&TaskOperation> {
        self.current_task().map(|t| &t.operation)
    }

    pub fn current_task_state(&self) -> Option<TaskState> {
        self.current_task().and_then(|t| t.state)
    }

    /// Task kind is set and is one the engine can execute
    pub fn is_current_task_operation_valid(&self) -> bool {
        self.current_task_operation()
            .is_some_and(TaskOperation::is_supported)
    }

    /// Task kind is missing or empty
    pub fn is_current_task_operation_unset(&self) -> bool {
        self.current_task_operation()
            .map_or(true, |op| op.as_str().is_empty())
    }

    pub fn is_paused(&self) -> bool {
        self.metadata
            .annotations
            .get(PAUSE_ANNOTATION)
            .is_some_and(|v| v == "true")
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.is_being_deleted()
    }

    pub fn has_finalizer(&self) -> bool {
        self.metadata.has_finalizer(OPERATION_FINALIZER)
    }

    /// Terminal: completed, or failed under an ignore policy
    pub fn is_done(&self) -> bool {
        match self.current_task_state() {
            Some(TaskState::Completed) => true,
            Some(TaskState::CompletedWithError) => {
                self.status.error_policy == ErrorPolicy::Ignore
            }
            _ => false,
        }
    }

    pub fn is_current_task_running(&self) -> bool {
        self.current_task().is_some_and(CurrentTask::is_running)
    }

    pub fn is_waiting_for_first_execution(&self) -> bool {
        self.current_task_state().is_none() && self.status.retry_count == 0 && !self.is_paused()
    }

    /// The last attempt failed (or was archived after failing) and policy allows a retry
    pub fn is_waiting_for_retry_execution(&self) -> bool {
        if self.is_paused() || self.status.error_policy != ErrorPolicy::Retry {
            return false;
        }
        match self.current_task_state() {
            Some(TaskState::CompletedWithError) => true,
            None => self.status.retry_count > 0,
            _ => false,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.is_current_task_running()
    }

    /// Running, marked for deletion and still guarded: must be stopped first
    pub fn is_waiting_for_finalization(&self) -> bool {
        self.is_current_task_running() && self.is_being_deleted() && self.has_finalizer()
    }

    /// When the latest attempt finished, falling back to the newest archived failure
    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.current_task()
            .and_then(|t| t.finished)
            .or_else(|| self.status.failed_tasks.last().and_then(|t| t.finished))
    }

    /// The retry backoff window has fully elapsed since the last attempt
    pub fn is_ready_for_retry_execution(&self, now: DateTime<Utc>, backoff: Duration) -> bool {
        match self.last_attempt_at() {
            Some(last) => now - last > backoff,
            None => true,
        }
    }

    /// Resolve the target cluster from the reference label
    pub fn cluster_reference(&self) -> ReconcilerResult<ObjectKey> {
        match self.metadata.labels.get(CLUSTER_REF_LABEL) {
            Some(name) if !name.is_empty() => {
                Ok(ObjectKey::new(self.metadata.namespace.clone(), name.clone()))
            }
            _ => Err(ReconcilerError::MissingClusterReference {
                operation: self.key(),
                label: CLUSTER_REF_LABEL.to_string(),
            }),
        }
    }

    /// Append a failed attempt, evicting the oldest entries beyond `max_len`
    pub fn archive_failed_task(&mut self, task: CurrentTask, max_len: usize) {
        self.status.failed_tasks.push(task);
        let overflow = self.status.failed_tasks.len().saturating_sub(max_len);
        if overflow > 0 {
            self.status.failed_tasks.drain(..overflow);
        }
    }
}
