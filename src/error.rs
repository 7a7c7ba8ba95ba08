//! Error types for the rebalance reconciler.
//!
//! Every error is scoped to a single reconciliation pass. The reconciler maps
//! each variant onto a requeue decision; nothing here is fatal to the process.

use crate::config::ConfigurationError;
use crate::executor::TaskResult;
use crate::models::ObjectKey;
use thiserror::Error;

/// Errors raised by an [`OperationStore`](crate::store::OperationStore) implementation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Object {key} not found")]
    NotFound { key: ObjectKey },
    /// Write rejected because the caller holds a stale resource version
    #[error("Conflict writing {key}: stored version {current}, attempted {attempted}")]
    Conflict {
        key: ObjectKey,
        current: u64,
        attempted: u64,
    },
    #[error("Store backend error during {operation}: {reason}")]
    Backend { operation: String, reason: String },
}

impl StoreError {
    /// Create a backend error
    pub fn backend<O: Into<String>, R: std::fmt::Display>(operation: O, reason: R) -> Self {
        Self::Backend {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised by a [`TaskExecutor`](crate::executor::TaskExecutor)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorError {
    /// The engine could not be reached at all
    #[error("Optimization engine unreachable: {0}")]
    Unreachable(String),
    /// The engine answered but the job failed; a partial result may still describe the attempt
    #[error("Optimization engine request failed: {reason}")]
    Failed {
        reason: String,
        partial: Option<Box<TaskResult>>,
    },
    #[error("Operation '{0}' is not supported by the optimization engine")]
    UnsupportedOperation(String),
}

impl ExecutorError {
    /// Create a failure that carries no usable result
    pub fn failed<R: Into<String>>(reason: R) -> Self {
        Self::Failed {
            reason: reason.into(),
            partial: None,
        }
    }

    /// Create a failure that still describes the attempt
    pub fn failed_with_result<R: Into<String>>(reason: R, partial: TaskResult) -> Self {
        Self::Failed {
            reason: reason.into(),
            partial: Some(Box::new(partial)),
        }
    }

    /// Split the partial result off the error, if one was attached
    pub fn into_partial(self) -> (Self, Option<TaskResult>) {
        match self {
            Self::Failed { reason, partial } => (
                Self::Failed {
                    reason,
                    partial: None,
                },
                partial.map(|result| *result),
            ),
            other => (other, None),
        }
    }
}

/// Top-level error for a reconciliation pass
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Could not find cluster reference label '{label}' on operation {operation}")]
    MissingClusterReference { operation: ObjectKey, label: String },

    #[error("Could not build task executor for cluster {cluster}: {reason}")]
    ExecutorFactory { cluster: ObjectKey, reason: String },

    #[error("Dispatch of operation {operation} failed without a result: {source}")]
    Dispatch {
        operation: ObjectKey,
        #[source]
        source: ExecutorError,
    },

    #[error("Could not parse task start time '{value}': {reason}")]
    InvalidStartTime { value: String, reason: String },

    #[error("Status update for {operation} still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { operation: ObjectKey, attempts: u32 },

    #[error("Could not sync current task of {operation}: {reason}")]
    TaskSync { operation: ObjectKey, reason: String },
}

impl ReconcilerError {
    /// Whether the error came from an optimistic-concurrency rejection
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_conflict())
    }
}

pub type ReconcilerResult<T> = anyhow::Result<T, ReconcilerError>;
