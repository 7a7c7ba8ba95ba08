#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;

use rebalance_reconciler::config::{ConflictBackoffConfig, ReconcilerConfig};
use rebalance_reconciler::models::{ObjectKey, Operation, TargetCluster};
use rebalance_reconciler::orchestration::{OperationReconciler, ReconcileAction};
use rebalance_reconciler::store::InMemoryOperationStore;
use rebalance_reconciler::test_utils::{ScriptedExecutorFactory, ScriptedTaskExecutor, TEST_CLUSTER, TEST_NAMESPACE};
use rebalance_reconciler::ReconcilerResult;

pub const RETRY_BACKOFF_SECONDS: u64 = 60;
pub const REQUEUE_INTERVAL_SECONDS: u64 = 10;

/// Configuration with a fast conflict backoff so retries do not slow tests down
pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        requeue_interval_seconds: REQUEUE_INTERVAL_SECONDS,
        retry_backoff_seconds: RETRY_BACKOFF_SECONDS,
        failed_tasks_history_max_length: 5,
        conflict_backoff: ConflictBackoffConfig {
            initial_delay_ms: 1,
            factor: 1.0,
            jitter: 0.0,
            steps: 5,
            max_delay_ms: 5,
        },
        ..ReconcilerConfig::default()
    }
}

pub fn cluster_key() -> ObjectKey {
    ObjectKey::new(TEST_NAMESPACE, TEST_CLUSTER)
}

/// Store, scripted engine and reconciler wired together around one cluster
pub struct ReconcileHarness {
    pub store: Arc<InMemoryOperationStore>,
    pub executor: Arc<ScriptedTaskExecutor>,
    pub factory: Arc<ScriptedExecutorFactory>,
    pub reconciler: OperationReconciler,
}

impl ReconcileHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let store = Arc::new(InMemoryOperationStore::new());
        store.insert_cluster(
            TargetCluster::new(cluster_key())
                .with_engine_endpoint("http://cruisecontrol:8090/kafkacruisecontrol"),
        );
        let executor = Arc::new(ScriptedTaskExecutor::new());
        let factory = Arc::new(ScriptedExecutorFactory::new(executor.clone()));
        let reconciler = OperationReconciler::new(store.clone(), factory.clone(), config);
        Self {
            store,
            executor,
            factory,
            reconciler,
        }
    }

    /// A second reconciler over the same store, engine and leases
    pub fn sibling(&self) -> OperationReconciler {
        OperationReconciler::new(
            self.store.clone(),
            self.factory.clone(),
            self.reconciler.config().clone(),
        )
        .with_leases(self.reconciler.leases().clone())
    }

    pub fn add(&self, operation: Operation) -> ObjectKey {
        self.store.insert(operation).key()
    }

    pub async fn reconcile(&self, key: &ObjectKey) -> ReconcilerResult<ReconcileAction> {
        self.reconciler.reconcile(key).await
    }

    /// Stored copy of a record; panics if it was deleted
    pub fn get(&self, key: &ObjectKey) -> Operation {
        self.store
            .snapshot(key)
            .unwrap_or_else(|| panic!("record {key} should exist"))
    }

    pub fn dispatch_count(&self) -> usize {
        self.executor.dispatch_calls().len()
    }
}

impl Default for ReconcileHarness {
    fn default() -> Self {
        Self::new()
    }
}
