//! # Operation Classifier
//!
//! Partitions the non-terminal operations of one cluster into execution
//! readiness buckets and orders each bucket by priority.
//!
//! Classification is first-match in [`ExecutionCategory::ALL`] order. Within a
//! bucket, operations are ordered by task kind priority (highest first) and
//! then by creation time (oldest first). The sort is stable, so records that
//! tie on both keep their listing order.

use std::cmp::Reverse;

use crate::models::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExecutionCategory {
    /// Running remotely while the record is being deleted
    StopExecution,
    /// Never dispatched
    FirstExecution,
    /// Failed and eligible for another attempt
    RetryExecution,
    /// Running remotely
    InProgress,
}

impl ExecutionCategory {
    pub const ALL: [ExecutionCategory; 4] = [
        Self::StopExecution,
        Self::FirstExecution,
        Self::RetryExecution,
        Self::InProgress,
    ];

    /// The first category the operation belongs to, if any
    pub fn of(operation: &Operation) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.matches(operation))
    }

    fn matches(self, operation: &Operation) -> bool {
        match self {
            Self::StopExecution => operation.is_waiting_for_finalization(),
            Self::FirstExecution => operation.is_waiting_for_first_execution(),
            Self::RetryExecution => operation.is_waiting_for_retry_execution(),
            Self::InProgress => operation.is_in_progress(),
        }
    }
}

/// Operations grouped by category, each group in execution order
#[derive(Debug, Clone, Default)]
pub struct OperationQueues {
    stop_execution: Vec<Operation>,
    first_execution: Vec<Operation>,
    retry_execution: Vec<Operation>,
    in_progress: Vec<Operation>,
}

impl OperationQueues {
    pub fn get(&self, category: ExecutionCategory) -> &[Operation] {
        match category {
            ExecutionCategory::StopExecution => &self.stop_execution,
            ExecutionCategory::FirstExecution => &self.first_execution,
            ExecutionCategory::RetryExecution => &self.retry_execution,
            ExecutionCategory::InProgress => &self.in_progress,
        }
    }

    fn get_mut(&mut self, category: ExecutionCategory) -> &mut Vec<Operation> {
        match category {
            ExecutionCategory::StopExecution => &mut self.stop_execution,
            ExecutionCategory::FirstExecution => &mut self.first_execution,
            ExecutionCategory::RetryExecution => &mut self.retry_execution,
            ExecutionCategory::InProgress => &mut self.in_progress,
        }
    }

    pub fn head(&self, category: ExecutionCategory) -> Option<&Operation> {
        self.get(category).first()
    }

    pub fn is_empty(&self) -> bool {
        ExecutionCategory::ALL
            .into_iter()
            .all(|category| self.get(category).is_empty())
    }

    pub fn len(&self) -> usize {
        ExecutionCategory::ALL
            .into_iter()
            .map(|category| self.get(category).len())
            .sum()
    }
}

/// Classify and order a set of operations
pub fn classify<'a, I>(operations: I) -> OperationQueues
where
    I: IntoIterator<Item = &'a Operation>,
{
    let mut queues = OperationQueues::default();
    for operation in operations {
        if let Some(category) = ExecutionCategory::of(operation) {
            queues.get_mut(category).push(operation.clone());
        }
    }
    for category in ExecutionCategory::ALL {
        sort_by_priority(queues.get_mut(category));
    }
    queues
}

/// Stable sort: kind priority descending, then creation time ascending
pub fn sort_by_priority(operations: &mut [Operation]) {
    operations.sort_by_key(|op| {
        (
            Reverse(op.current_task_operation().map_or(0, |kind| kind.priority())),
            op.metadata.creation_timestamp,
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorPolicy, TaskOperation};
    use crate::state_machine::TaskState;
    use crate::test_utils::OperationBuilder;
    use chrono::{Duration, Utc};

    #[test]
    fn test_category_precedence() {
        let stopping = OperationBuilder::new("stop")
            .state(TaskState::InExecution)
            .with_finalizer()
            .deleting()
            .build();
        assert_eq!(
            ExecutionCategory::of(&stopping),
            Some(ExecutionCategory::StopExecution)
        );

        let running = OperationBuilder::new("run").state(TaskState::Active).build();
        assert_eq!(
            ExecutionCategory::of(&running),
            Some(ExecutionCategory::InProgress)
        );

        let failed = OperationBuilder::new("fail")
            .state(TaskState::CompletedWithError)
            .build();
        assert_eq!(
            ExecutionCategory::of(&failed),
            Some(ExecutionCategory::RetryExecution)
        );

        let fresh = OperationBuilder::new("fresh").build();
        assert_eq!(
            ExecutionCategory::of(&fresh),
            Some(ExecutionCategory::FirstExecution)
        );
    }

    #[test]
    fn test_unclassified_records() {
        let paused = OperationBuilder::new("paused").paused().build();
        assert_eq!(ExecutionCategory::of(&paused), None);

        let failed_ignored = OperationBuilder::new("ignored")
            .state(TaskState::CompletedWithError)
            .error_policy(ErrorPolicy::Ignore)
            .build();
        assert_eq!(ExecutionCategory::of(&failed_ignored), None);

        // Deleting without the guard is not stopped, only watched
        let unguarded = OperationBuilder::new("unguarded")
            .state(TaskState::InExecution)
            .deleting()
            .build();
        assert_eq!(
            ExecutionCategory::of(&unguarded),
            Some(ExecutionCategory::InProgress)
        );
    }

    #[test]
    fn test_priority_then_age_ordering() {
        let now = Utc::now();
        let old_rebalance = OperationBuilder::new("rebalance")
            .created_at(now - Duration::minutes(10))
            .build();
        let new_add = OperationBuilder::new("add")
            .operation(TaskOperation::AddBroker)
            .created_at(now)
            .build();
        let old_remove = OperationBuilder::new("remove-old")
            .operation(TaskOperation::RemoveBroker)
            .created_at(now - Duration::minutes(5))
            .build();
        let new_remove = OperationBuilder::new("remove-new")
            .operation(TaskOperation::RemoveBroker)
            .created_at(now - Duration::minutes(1))
            .build();

        let queues = classify(&[old_rebalance, new_remove, new_add, old_remove]);
        let names: Vec<&str> = queues
            .get(ExecutionCategory::FirstExecution)
            .iter()
            .map(Operation::name)
            .collect();

        assert_eq!(names, vec!["add", "remove-old", "remove-new", "rebalance"]);
        assert_eq!(queues.len(), 4);
    }

    #[test]
    fn test_empty_queues() {
        let done = OperationBuilder::new("done").state(TaskState::Completed).build();
        let queues = classify(&[done]);
        assert!(queues.is_empty());
        assert!(queues.head(ExecutionCategory::FirstExecution).is_none());
    }
}
