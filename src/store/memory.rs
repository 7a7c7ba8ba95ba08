//! # In-Memory Operation Store
//!
//! A process-local [`OperationStore`] with the same optimistic-concurrency
//! contract as a real object store: every write bumps the resource version,
//! stale writes are rejected, and an object marked for deletion disappears as
//! soon as its last finalizer is removed.
//!
//! Faults can be injected for tests: forced conflicts on status writes and
//! failing list calls.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

use super::traits::OperationStore;
use crate::error::StoreError;
use crate::models::{ObjectKey, Operation, TargetCluster};

#[derive(Default)]
pub struct InMemoryOperationStore {
    operations: RwLock<HashMap<ObjectKey, Operation>>,
    clusters: RwLock<HashMap<ObjectKey, TargetCluster>>,
    pending_conflicts: DashMap<ObjectKey, u32>,
    fail_list: AtomicBool,
    status_writes: AtomicU64,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a record, as an external writer would
    pub fn insert(&self, mut operation: Operation) -> Operation {
        let key = operation.key();
        let mut operations = self.operations.write();
        let previous_version = operations
            .get(&key)
            .map_or(0, |op| op.metadata.resource_version);
        operation.metadata.resource_version = previous_version + 1;
        operations.insert(key, operation.clone());
        operation
    }

    pub fn insert_cluster(&self, cluster: TargetCluster) {
        self.clusters.write().insert(cluster.key.clone(), cluster);
    }

    pub fn remove_cluster(&self, key: &ObjectKey) {
        self.clusters.write().remove(key);
    }

    /// Current stored copy of a record
    pub fn snapshot(&self, key: &ObjectKey) -> Option<Operation> {
        self.operations.read().get(key).cloned()
    }

    /// Set the deletion marker the way a user delete request would.
    /// Records without finalizers are removed immediately.
    pub fn mark_for_deletion(&self, key: &ObjectKey) -> bool {
        let mut operations = self.operations.write();
        let Some(operation) = operations.get_mut(key) else {
            return false;
        };
        if operation.metadata.finalizers.is_empty() {
            operations.remove(key);
            return true;
        }
        if operation.metadata.deletion_timestamp.is_none() {
            operation.metadata.deletion_timestamp = Some(Utc::now());
            operation.metadata.resource_version += 1;
        }
        true
    }

    /// Make the next `count` status writes for `key` fail with a conflict,
    /// simulating a concurrent writer that bumps the version each time
    pub fn inject_status_conflicts(&self, key: &ObjectKey, count: u32) {
        self.pending_conflicts.insert(key.clone(), count);
    }

    pub fn fail_list_calls(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Number of successful status writes so far
    pub fn status_write_count(&self) -> u64 {
        self.status_writes.load(Ordering::SeqCst)
    }

    fn take_injected_conflict(&self, key: &ObjectKey) -> bool {
        let Some(mut remaining) = self.pending_conflicts.get_mut(key) else {
            return false;
        };
        if *remaining == 0 {
            return false;
        }
        *remaining -= 1;
        true
    }

    fn check_version(stored: &Operation, incoming: &Operation) -> Result<(), StoreError> {
        if stored.metadata.resource_version != incoming.metadata.resource_version {
            return Err(StoreError::Conflict {
                key: incoming.key(),
                current: stored.metadata.resource_version,
                attempted: incoming.metadata.resource_version,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn list(&self, namespace: &str) -> Result<Vec<Operation>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::backend("list", "injected list failure"));
        }
        let mut items: Vec<Operation> = self
            .operations
            .read()
            .values()
            .filter(|op| op.namespace() == namespace)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(items)
    }

    async fn get(&self, key: &ObjectKey) -> Result<Operation, StoreError> {
        self.snapshot(key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    async fn update(&self, operation: &Operation) -> Result<Operation, StoreError> {
        let key = operation.key();
        let mut operations = self.operations.write();
        let stored = operations
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        Self::check_version(stored, operation)?;

        if stored.spec != operation.spec {
            stored.metadata.generation += 1;
        }
        let generation = stored.metadata.generation;
        let deletion_timestamp = stored.metadata.deletion_timestamp;
        stored.metadata = operation.metadata.clone();
        stored.metadata.generation = generation;
        // The deletion marker can only be set by a delete request, never cleared.
        stored.metadata.deletion_timestamp = deletion_timestamp;
        stored.metadata.resource_version += 1;
        stored.spec = operation.spec.clone();

        let updated = stored.clone();
        if updated.is_being_deleted() && updated.metadata.finalizers.is_empty() {
            debug!(operation = %key, "last finalizer removed, deleting record");
            operations.remove(&key);
        }
        Ok(updated)
    }

    async fn update_status(&self, operation: &Operation) -> Result<Operation, StoreError> {
        let key = operation.key();
        let mut operations = self.operations.write();
        let stored = operations
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

        if self.take_injected_conflict(&key) {
            stored.metadata.resource_version += 1;
            return Err(StoreError::Conflict {
                key,
                current: stored.metadata.resource_version,
                attempted: operation.metadata.resource_version,
            });
        }
        Self::check_version(stored, operation)?;

        stored.status = operation.status.clone();
        stored.metadata.resource_version += 1;
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }

    async fn get_cluster(&self, key: &ObjectKey) -> Result<Option<TargetCluster>, StoreError> {
        Ok(self.clusters.read().get(key).cloned())
    }
}
