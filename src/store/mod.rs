//! # Operation Store
//!
//! Store interface consumed by the reconciler plus an in-memory implementation.

pub mod memory;
pub mod traits;

pub use memory::InMemoryOperationStore;
pub use traits::OperationStore;
