//! # Store Events
//!
//! Filters applied to store change notifications before they are turned into
//! reconciliation requests.

pub mod filters;

pub use filters::{should_reconcile_create, should_reconcile_update};
