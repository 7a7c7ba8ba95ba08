//! # Optimization Engine Interface
//!
//! Abstract client of the remote engine. Concrete HTTP clients live outside
//! this crate; tests use [`ScriptedTaskExecutor`](crate::test_utils::ScriptedTaskExecutor).

pub mod traits;

pub use traits::{
    EngineStatus, ExecutorFactory, OptimizationSummary, TaskExecutor, TaskParameters, TaskResult,
};
