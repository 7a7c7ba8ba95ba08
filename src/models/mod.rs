pub mod cluster;
pub mod metadata;
pub mod operation;
pub mod task;

// Re-export core models for easy access
pub use cluster::TargetCluster;
pub use metadata::{ObjectKey, ObjectMeta};
pub use operation::{Operation, OperationSpec, OperationStatus};
pub use task::{set_field, CurrentTask, ErrorPolicy, TaskOperation};
