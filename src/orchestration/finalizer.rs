//! # Finalizer Manager
//!
//! Owns the deletion guard on operation records. The guard keeps the store
//! from deleting a record whose job is still running remotely; it is lifted
//! once the record is done, or once a record marked for deletion has nothing
//! running.

use std::sync::Arc;
use tracing::{debug, instrument};

use super::conflict_retry::{retry_on_conflict, ConflictBackoff};
use crate::constants::OPERATION_FINALIZER;
use crate::error::{ReconcilerError, ReconcilerResult};
use crate::logging::log_operation_event;
use crate::models::Operation;
use crate::store::OperationStore;

pub struct FinalizerManager {
    store: Arc<dyn OperationStore>,
    backoff: ConflictBackoff,
}

impl FinalizerManager {
    pub fn new(store: Arc<dyn OperationStore>, backoff: ConflictBackoff) -> Self {
        Self { store, backoff }
    }

    /// The guard should be attached to a record that is not being deleted
    pub fn needs_guard(operation: &Operation) -> bool {
        !operation.is_being_deleted() && !operation.has_finalizer()
    }

    /// The guard can be lifted: done, or deleting with nothing running
    pub fn can_release(operation: &Operation) -> bool {
        operation.has_finalizer()
            && (operation.is_done()
                || (operation.is_being_deleted() && !operation.is_current_task_running()))
    }

    /// Attach the guard if needed. Returns the stored record.
    #[instrument(skip_all, fields(operation = %operation.key()))]
    pub async fn ensure_guard(&self, operation: &Operation) -> ReconcilerResult<Operation> {
        if !Self::needs_guard(operation) {
            return Ok(operation.clone());
        }
        let updated = self
            .write_guard(operation, |op| op.metadata.add_finalizer(OPERATION_FINALIZER))
            .await?;
        log_operation_event("guard_attached", &updated.key(), None, None, None);
        Ok(updated)
    }

    /// Remove the guard if present. Returns the record as last written; the
    /// store may already have deleted it.
    #[instrument(skip_all, fields(operation = %operation.key()))]
    pub async fn release_guard(&self, operation: &Operation) -> ReconcilerResult<Operation> {
        if !operation.has_finalizer() {
            return Ok(operation.clone());
        }
        let updated = self
            .write_guard(operation, |op| op.metadata.remove_finalizer(OPERATION_FINALIZER))
            .await?;
        log_operation_event("guard_released", &updated.key(), None, None, None);
        Ok(updated)
    }

    async fn write_guard<F>(&self, operation: &Operation, change: F) -> ReconcilerResult<Operation>
    where
        F: Fn(&mut Operation) -> bool,
    {
        let key = operation.key();
        let store = self.store.as_ref();
        let change = &change;
        retry_on_conflict(&self.backoff, &key, |attempt| {
            let key = key.clone();
            let initial = operation.clone();
            async move {
                let mut candidate = if attempt == 1 {
                    initial
                } else {
                    store.get(&key).await?
                };
                if !change(&mut candidate) {
                    debug!(operation = %key, "Guard already in the requested state");
                    return Ok::<Operation, ReconcilerError>(candidate);
                }
                Ok(store.update(&candidate).await?)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::TaskState;
    use crate::store::InMemoryOperationStore;
    use crate::test_utils::OperationBuilder;

    fn manager(store: Arc<InMemoryOperationStore>) -> FinalizerManager {
        FinalizerManager::new(store, ConflictBackoff::default())
    }

    #[test]
    fn test_release_rules() {
        let done = OperationBuilder::new("op")
            .state(TaskState::Completed)
            .with_finalizer()
            .build();
        assert!(FinalizerManager::can_release(&done));

        let running_deleting = OperationBuilder::new("op")
            .state(TaskState::InExecution)
            .with_finalizer()
            .deleting()
            .build();
        assert!(!FinalizerManager::can_release(&running_deleting));

        let idle_deleting = OperationBuilder::new("op").with_finalizer().deleting().build();
        assert!(FinalizerManager::can_release(&idle_deleting));

        let unguarded = OperationBuilder::new("op").state(TaskState::Completed).build();
        assert!(!FinalizerManager::can_release(&unguarded));
    }

    #[tokio::test]
    async fn test_guard_attach_is_idempotent() {
        let store = Arc::new(InMemoryOperationStore::new());
        let stored = store.insert(OperationBuilder::new("op").build());
        let manager = manager(store.clone());

        let once = manager.ensure_guard(&stored).await.unwrap();
        let twice = manager.ensure_guard(&once).await.unwrap();

        assert_eq!(twice.metadata.finalizers, vec![OPERATION_FINALIZER.to_string()]);
        assert_eq!(once.metadata.resource_version, twice.metadata.resource_version);
    }

    #[tokio::test]
    async fn test_no_guard_on_deleting_record() {
        let store = Arc::new(InMemoryOperationStore::new());
        let stored = store.insert(OperationBuilder::new("op").deleting().build());

        let result = manager(store).ensure_guard(&stored).await.unwrap();
        assert!(!result.has_finalizer());
    }

    #[tokio::test]
    async fn test_release_lets_store_delete() {
        let store = Arc::new(InMemoryOperationStore::new());
        let stored = store.insert(OperationBuilder::new("op").with_finalizer().build());
        let key = stored.key();
        store.mark_for_deletion(&key);
        let marked = store.snapshot(&key).unwrap();

        let released = manager(store.clone()).release_guard(&marked).await.unwrap();

        assert!(!released.has_finalizer());
        assert!(store.snapshot(&key).is_none());
    }

    #[tokio::test]
    async fn test_release_retries_with_fresh_copy() {
        let store = Arc::new(InMemoryOperationStore::new());
        let stale = store.insert(
            OperationBuilder::new("op")
                .state(TaskState::Completed)
                .with_finalizer()
                .build(),
        );
        // Another writer bumps the version first
        store.update_status(&stale).await.unwrap();

        let released = manager(store.clone()).release_guard(&stale).await.unwrap();
        assert!(!released.has_finalizer());
        assert!(!store.snapshot(&stale.key()).unwrap().has_finalizer());
    }
}
