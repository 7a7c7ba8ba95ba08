//! # Operation Store Interface
//!
//! The declarative object store holding operation records and cluster
//! records. Every write is optimistic: implementations reject a write whose
//! `metadata.resource_version` is stale with [`StoreError::Conflict`] and
//! return the stored object (with its new version) on success.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ObjectKey, Operation, TargetCluster};

#[async_trait]
pub trait OperationStore: Send + Sync {
    /// All operation records in a namespace
    async fn list(&self, namespace: &str) -> Result<Vec<Operation>, StoreError>;

    async fn get(&self, key: &ObjectKey) -> Result<Operation, StoreError>;

    /// Write metadata and spec. The status subresource is left untouched.
    async fn update(&self, operation: &Operation) -> Result<Operation, StoreError>;

    /// Write the status subresource only
    async fn update_status(&self, operation: &Operation) -> Result<Operation, StoreError>;

    /// Resolve a cluster record; `Ok(None)` when it does not exist
    async fn get_cluster(&self, key: &ObjectKey) -> Result<Option<TargetCluster>, StoreError>;
}
