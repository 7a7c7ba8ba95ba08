#![allow(clippy::doc_markdown)] // Allow technical terms like Cruise Control in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Rebalance Reconciler
//!
//! Decision core of an operator that drives long-running rebalancing
//! operations (add broker, remove broker, rebalance, stop execution) of a
//! streaming cluster against a remote optimization engine.
//!
//! ## Overview
//!
//! Operations are declared as records in an object store. A reconciliation
//! pass inspects every pending record of the target cluster, decides which
//! single operation the engine may run next, follows the progress of jobs
//! already dispatched, applies the retry and error policy, and keeps records
//! from being deleted while their job is still running.
//!
//! ## Module Organization
//!
//! - [`models`] - Operation records, tasks and metadata
//! - [`state_machine`] - Remote task states
//! - [`executor`] - Optimization engine interface
//! - [`store`] - Object store interface and in-memory store
//! - [`orchestration`] - Classification, selection, dispatch and the reconciliation loop
//! - [`events`] - Change notification filters
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rebalance_reconciler::config::ConfigManager;
//! use rebalance_reconciler::models::ObjectKey;
//! use rebalance_reconciler::orchestration::OperationReconciler;
//! use rebalance_reconciler::store::InMemoryOperationStore;
//! use rebalance_reconciler::test_utils::{ScriptedExecutorFactory, ScriptedTaskExecutor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! rebalance_reconciler::logging::init_structured_logging(&manager.config().logging);
//!
//! let store = Arc::new(InMemoryOperationStore::new());
//! let executors = Arc::new(ScriptedExecutorFactory::new(Arc::new(ScriptedTaskExecutor::new())));
//! let reconciler = OperationReconciler::new(store, executors, manager.config().clone());
//!
//! let action = reconciler.reconcile(&ObjectKey::new("kafka", "rebalance-1")).await?;
//! println!("next: {action:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod executor;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;
pub mod test_utils;

pub use config::{ConfigManager, ReconcilerConfig};
pub use error::{ExecutorError, ReconcilerError, ReconcilerResult, StoreError};
pub use models::{ObjectKey, Operation, TaskOperation};
pub use orchestration::{OperationReconciler, ReconcileAction};
pub use state_machine::TaskState;
