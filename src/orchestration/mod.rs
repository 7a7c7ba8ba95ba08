//! # Orchestration
//!
//! The decision core driving rebalancing operations against the optimization
//! engine.
//!
//! ## Core Components
//!
//! - **Classifier**: sorts pending operations into execution readiness buckets
//! - **Selector**: picks the single operation the engine should run next
//! - **Planner**: pure per-pass decision over a cluster snapshot
//! - **Dispatcher**: calls the engine verb for the selected operation
//! - **ResultProcessor**: merges engine results into status, archives failures
//! - **FinalizerManager**: deletion guard lifecycle
//! - **DispatchLeases**: per-cluster single-dispatcher claim
//! - **OperationReconciler**: runs one reconciliation pass

pub mod classifier;
pub mod conflict_retry;
pub mod dispatch_lease;
pub mod dispatcher;
pub mod finalizer;
pub mod planner;
pub mod reconciler;
pub mod result_processor;
pub mod selector;
pub mod types;

pub use classifier::{classify, ExecutionCategory, OperationQueues};
pub use conflict_retry::{retry_on_conflict, ConflictBackoff};
pub use dispatch_lease::{DispatchLeaseGuard, DispatchLeases};
pub use dispatcher::{dispatch, DispatchOutcome};
pub use finalizer::FinalizerManager;
pub use planner::{plan_dispatch, ClusterSnapshot, DispatchPlan};
pub use reconciler::OperationReconciler;
pub use result_processor::{parse_start_time, MergeMode, ResultProcessor};
pub use selector::{select, Selection, SelectionContext};
pub use types::ReconcileAction;
