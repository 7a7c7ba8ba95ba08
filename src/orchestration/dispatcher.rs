//! # Executor Dispatcher
//!
//! Invokes the engine verb matching a task kind and classifies the answer.

use tracing::{debug, warn};

use crate::error::ExecutorError;
use crate::executor::{TaskExecutor, TaskParameters, TaskResult};
use crate::models::TaskOperation;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The engine accepted the request
    Completed(TaskResult),
    /// The request failed but the engine described the attempt; it is merged
    /// so the failure is recorded
    FailedWithResult {
        result: TaskResult,
        error: ExecutorError,
    },
    /// The request failed without any usable result
    Failed(ExecutorError),
}

pub async fn dispatch(
    executor: &dyn TaskExecutor,
    kind: &TaskOperation,
    parameters: &TaskParameters,
) -> DispatchOutcome {
    let response = match kind {
        TaskOperation::AddBroker => executor.add_brokers(parameters).await,
        TaskOperation::RemoveBroker => executor.remove_brokers(parameters).await,
        TaskOperation::Rebalance => executor.rebalance(parameters).await,
        TaskOperation::StopExecution => executor.stop_execution().await,
        TaskOperation::Unsupported(raw) => {
            return DispatchOutcome::Failed(ExecutorError::UnsupportedOperation(raw.clone()));
        }
    };

    match response {
        Ok(result) => {
            debug!(kind = %kind, task_id = %result.task_id, state = %result.state, "Engine accepted request");
            DispatchOutcome::Completed(result)
        }
        Err(err) => match err.into_partial() {
            (error, Some(result)) => {
                warn!(kind = %kind, task_id = %result.task_id, error = %error, "Engine request failed with result");
                DispatchOutcome::FailedWithResult { result, error }
            }
            (error, None) => DispatchOutcome::Failed(error),
        },
    }
}
