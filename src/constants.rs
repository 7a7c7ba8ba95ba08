//! # System Constants
//!
//! Fixed identifiers and limits shared by the reconciler components. Tunable
//! values live in [`ReconcilerConfig`](crate::config::ReconcilerConfig); the
//! defaults there are taken from here.

/// Deletion guard token attached to operation records
pub const OPERATION_FINALIZER: &str = "finalizer.cruisecontroloperations.kafka.banzaicloud.io";

/// Label carrying the name of the target cluster
pub const CLUSTER_REF_LABEL: &str = "kafka.cluster";

/// Annotation that pauses an operation when set to `"true"`
pub const PAUSE_ANNOTATION: &str = "pause";

/// Maximum number of archived failed tasks kept per record
pub const DEFAULT_FAILED_TASKS_HISTORY_MAX_LENGTH: usize = 50;

/// Fixed requeue interval for expected steady-state waits
pub const DEFAULT_REQUEUE_INTERVAL_SECONDS: u64 = 10;

/// Minimum wait after a failed attempt before the task is retried
pub const DEFAULT_RETRY_BACKOFF_SECONDS: u64 = 30;

/// Lifetime of a per-cluster dispatch lease before it may be taken over
pub const DEFAULT_DISPATCH_LEASE_TTL_SECONDS: u64 = 300;

/// Error recorded when the engine no longer knows a dispatched job
pub const MISSING_TASK_RESULT_ERROR: &str = "missing Cruise Control user task result";

/// Keys of the formatted optimization summary
pub mod summary {
    pub const DATA_TO_MOVE: &str = "Data to move";
    pub const REPLICA_MOVEMENTS: &str = "Number of replica movements";
    pub const INTRA_BROKER_DATA_TO_MOVE: &str = "Intra broker data to move";
    pub const INTRA_BROKER_REPLICA_MOVEMENTS: &str = "Number of intra broker replica movements";
    pub const LEADER_MOVEMENTS: &str = "Number of leader movements";
    pub const RECENT_WINDOWS: &str = "Recent windows";
    pub const PROVISION_RECOMMENDATION: &str = "Provision recommendation";
}

