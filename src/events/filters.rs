//! # Change Notification Filters
//!
//! Decide whether a store notification about an operation record should
//! trigger a reconciliation pass. Records that are done and not being deleted
//! never need another pass.

use crate::models::Operation;

fn is_settled(operation: &Operation) -> bool {
    operation.is_done() && !operation.is_being_deleted()
}

/// A newly observed record is reconciled unless it is settled or has no task kind
pub fn should_reconcile_create(operation: &Operation) -> bool {
    !is_settled(operation) && !operation.is_current_task_operation_unset()
}

/// An updated record is reconciled only when something the loop acts on changed
pub fn should_reconcile_update(old: &Operation, new: &Operation) -> bool {
    if is_settled(new) {
        return false;
    }
    old.status.current_task != new.status.current_task
        || old.metadata.deletion_timestamp != new.metadata.deletion_timestamp
        || old.is_paused() != new.is_paused()
        || old.metadata.generation != new.metadata.generation
}
