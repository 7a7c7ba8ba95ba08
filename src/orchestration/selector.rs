//! # Operation Selector
//!
//! Picks at most one operation to hand to the engine. A stop request always
//! wins; otherwise the engine must be idle with nothing in progress.

use chrono::{DateTime, Duration, Utc};

use super::classifier::{ExecutionCategory, OperationQueues};
use crate::models::{Operation, TaskOperation};

/// Inputs to a selection besides the queues themselves
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext {
    pub now: DateTime<Utc>,
    pub retry_backoff: Duration,
    /// The engine reported a job in execution
    pub engine_busy: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Dispatch `kind` for this operation
    Dispatch {
        operation: Box<Operation>,
        kind: TaskOperation,
    },
    /// A candidate exists but the engine or another operation is busy
    Busy,
    Nothing,
}

impl Selection {
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            Self::Dispatch { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

pub fn select(queues: &OperationQueues, ctx: &SelectionContext) -> Selection {
    if let Some(stopping) = queues.head(ExecutionCategory::StopExecution) {
        return Selection::Dispatch {
            operation: Box::new(stopping.clone()),
            kind: TaskOperation::StopExecution,
        };
    }

    let Some(candidate) = next_candidate(queues, ctx) else {
        return Selection::Nothing;
    };

    if ctx.engine_busy || !queues.get(ExecutionCategory::InProgress).is_empty() {
        return Selection::Busy;
    }

    match candidate.current_task_operation() {
        Some(kind) => Selection::Dispatch {
            kind: kind.clone(),
            operation: Box::new(candidate.clone()),
        },
        None => Selection::Nothing,
    }
}

fn next_candidate<'a>(queues: &'a OperationQueues, ctx: &SelectionContext) -> Option<&'a Operation> {
    let first = queues.head(ExecutionCategory::FirstExecution);

    if let Some(op) = first.filter(|op| op.current_task_operation() == Some(&TaskOperation::AddBroker)) {
        return Some(op);
    }

    if let Some(retry) = queues.head(ExecutionCategory::RetryExecution) {
        // A retry still inside its backoff window blocks everything else this pass
        return retry
            .is_ready_for_retry_execution(ctx.now, ctx.retry_backoff)
            .then_some(retry);
    }

    first
}
