//! # Dispatch Planner
//!
//! The decision half of a reconciliation pass, as a pure function over a
//! snapshot of one cluster's records and the engine status. Everything with
//! side effects stays in the reconciler.

use chrono::{DateTime, Duration, Utc};

use super::classifier::classify;
use super::selector::{select, Selection, SelectionContext};
use crate::executor::EngineStatus;
use crate::models::{Operation, TaskOperation};

/// Immutable view of one cluster taken after polling
#[derive(Debug, Clone, Copy)]
pub struct ClusterSnapshot<'a> {
    /// The record whose change triggered the pass, in its latest known form
    pub trigger: &'a Operation,
    /// In-scope records: same cluster, supported kind, not done
    pub operations: &'a [Operation],
    pub engine: EngineStatus,
    pub now: DateTime<Utc>,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchPlan {
    /// The trigger is being deleted and nothing runs for it
    ReleaseTriggerGuard,
    /// No pending work for the cluster
    Idle,
    /// Pending work, but nothing is eligible yet
    Wait,
    /// A candidate must wait for the engine
    Busy,
    Dispatch {
        operation: Box<Operation>,
        kind: TaskOperation,
    },
}

pub fn plan_dispatch(snapshot: &ClusterSnapshot<'_>) -> DispatchPlan {
    let trigger = snapshot.trigger;
    if trigger.is_being_deleted() && trigger.has_finalizer() && !trigger.is_current_task_running() {
        return DispatchPlan::ReleaseTriggerGuard;
    }

    let queues = classify(snapshot.operations);
    if queues.is_empty() {
        return DispatchPlan::Idle;
    }

    let ctx = SelectionContext {
        now: snapshot.now,
        retry_backoff: snapshot.retry_backoff,
        engine_busy: snapshot.engine.in_execution(),
    };
    match select(&queues, &ctx) {
        Selection::Dispatch { operation, kind } => DispatchPlan::Dispatch { operation, kind },
        Selection::Busy => DispatchPlan::Busy,
        Selection::Nothing => DispatchPlan::Wait,
    }
}
