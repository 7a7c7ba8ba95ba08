use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use proptest::strategy::Just;

use rebalance_reconciler::models::{Operation, TaskOperation};
use rebalance_reconciler::test_utils::OperationBuilder;
use rebalance_reconciler::TaskState;

/// Strategy for the executable operation kinds a user may request
pub fn task_operation_strategy() -> impl Strategy<Value = TaskOperation> {
    prop_oneof![
        Just(TaskOperation::AddBroker),
        Just(TaskOperation::RemoveBroker),
        Just(TaskOperation::Rebalance),
    ]
}

/// Strategy for the state of a current task, `None` when never dispatched
pub fn task_state_strategy() -> impl Strategy<Value = Option<TaskState>> {
    prop_oneof![
        Just(None),
        Just(Some(TaskState::Active)),
        Just(Some(TaskState::InExecution)),
        Just(Some(TaskState::Completed)),
        Just(Some(TaskState::CompletedWithError)),
    ]
}

/// Shape of a generated record, turned into an [`Operation`] relative to a fixed `now`
#[derive(Debug, Clone)]
pub struct OperationShape {
    pub operation: TaskOperation,
    pub state: Option<TaskState>,
    pub created_secs_ago: i64,
    pub finished_secs_ago: Option<i64>,
    pub retry_count: u32,
    pub paused: bool,
    pub deleting: bool,
}

impl OperationShape {
    pub fn build(&self, index: usize, now: DateTime<Utc>) -> Operation {
        let mut builder = OperationBuilder::new(&format!("op-{index}"))
            .operation(self.operation.clone())
            .retry_count(self.retry_count)
            .created_at(now - Duration::seconds(self.created_secs_ago))
            .with_finalizer();
        if let Some(state) = self.state {
            builder = builder.state(state);
            if state.is_terminal() {
                let ago = self.finished_secs_ago.unwrap_or(0);
                builder = builder.finished(now - Duration::seconds(ago));
            }
        }
        if self.paused {
            builder = builder.paused();
        }
        if self.deleting {
            builder = builder.deleting();
        }
        builder.build()
    }
}

pub fn operation_shape_strategy() -> impl Strategy<Value = OperationShape> {
    (
        task_operation_strategy(),
        task_state_strategy(),
        0i64..3_600,
        prop::option::of(0i64..600),
        0u32..3,
        prop::bool::weighted(0.1),
        prop::bool::weighted(0.1),
    )
        .prop_map(
            |(operation, state, created_secs_ago, finished_secs_ago, retry_count, paused, deleting)| {
                OperationShape {
                    operation,
                    state,
                    created_secs_ago,
                    finished_secs_ago,
                    retry_count,
                    paused,
                    deleting,
                }
            },
        )
}

/// Strategy for all records of one cluster
pub fn cluster_strategy() -> impl Strategy<Value = Vec<OperationShape>> {
    prop::collection::vec(operation_shape_strategy(), 0..12)
}

pub fn build_cluster(shapes: &[OperationShape], now: DateTime<Utc>) -> Vec<Operation> {
    shapes
        .iter()
        .enumerate()
        .map(|(index, shape)| shape.build(index, now))
        .collect()
}
