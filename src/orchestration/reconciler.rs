//! # Operation Reconciler
//!
//! One reconciliation pass for one operation record. A pass looks at every
//! record of the trigger's cluster, because the engine executes a single job
//! at a time and the next job is chosen across all of them.
//!
//! ## Pass outline
//!
//! 1. List the namespace and locate the trigger
//! 2. Release the guard of a done record
//! 3. Skip unsupported task kinds
//! 4. Resolve the target cluster
//! 5. Attach the guard
//! 6. Build the executor and check engine health
//! 7. Poll and merge the state of every dispatched record of the cluster
//! 8. Plan: release, wait, or dispatch one operation
//! 9. Dispatch under the cluster's lease and persist the result
//!
//! Every early exit maps to a [`ReconcileAction`] or an error. Errors are
//! scoped to the pass; the caller requeues with its own backoff.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::conflict_retry::ConflictBackoff;
use super::dispatch_lease::DispatchLeases;
use super::dispatcher::{dispatch, DispatchOutcome};
use super::finalizer::FinalizerManager;
use super::planner::{plan_dispatch, ClusterSnapshot, DispatchPlan};
use super::result_processor::ResultProcessor;
use super::types::ReconcileAction;
use crate::config::ReconcilerConfig;
use crate::error::{ExecutorError, ReconcilerError, ReconcilerResult};
use crate::executor::{ExecutorFactory, TaskExecutor, TaskResult};
use crate::logging::{log_error, log_operation_event};
use crate::models::{ObjectKey, Operation, TaskOperation};
use crate::state_machine::TaskState;
use crate::store::OperationStore;

pub struct OperationReconciler {
    store: Arc<dyn OperationStore>,
    executors: Arc<dyn ExecutorFactory>,
    config: ReconcilerConfig,
    finalizers: FinalizerManager,
    results: ResultProcessor,
    leases: Arc<DispatchLeases>,
}

impl OperationReconciler {
    pub fn new(
        store: Arc<dyn OperationStore>,
        executors: Arc<dyn ExecutorFactory>,
        config: ReconcilerConfig,
    ) -> Self {
        let backoff = ConflictBackoff::from(&config.conflict_backoff);
        let leases = Arc::new(DispatchLeases::new(config.dispatch_lease_ttl()));
        Self {
            finalizers: FinalizerManager::new(store.clone(), backoff.clone()),
            results: ResultProcessor::new(config.failed_tasks_history_max_length, backoff),
            store,
            executors,
            config,
            leases,
        }
    }

    /// Share dispatch leases with other reconcilers in the same process
    pub fn with_leases(mut self, leases: Arc<DispatchLeases>) -> Self {
        self.leases = leases;
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn leases(&self) -> &Arc<DispatchLeases> {
        &self.leases
    }

    fn requeue(&self) -> ReconcileAction {
        ReconcileAction::RequeueAfter(self.config.requeue_interval())
    }

    #[instrument(skip(self), fields(namespace = %key.namespace, name = %key.name))]
    pub async fn reconcile(&self, key: &ObjectKey) -> ReconcilerResult<ReconcileAction> {
        let mut operations = self.store.list(&key.namespace).await?;
        let Some(trigger_index) = operations.iter().position(|op| op.key() == *key) else {
            debug!("Operation no longer exists");
            return Ok(ReconcileAction::Done);
        };
        let mut trigger = operations[trigger_index].clone();

        if trigger.is_done() && trigger.has_finalizer() {
            self.finalizers.release_guard(&trigger).await?;
            return Ok(ReconcileAction::Done);
        }

        if !trigger.is_current_task_operation_valid() {
            let kind = trigger
                .current_task_operation()
                .map(|op| op.to_string())
                .unwrap_or_default();
            warn!(kind = %kind, "Operation kind is not supported, waiting for a change");
            return Ok(ReconcileAction::Done);
        }

        let cluster_key = trigger.cluster_reference()?;
        let Some(cluster) = self.store.get_cluster(&cluster_key).await? else {
            if trigger.is_being_deleted() {
                info!(cluster = %cluster_key, "Target cluster is gone, releasing guard");
                self.finalizers.release_guard(&trigger).await?;
            }
            return Ok(ReconcileAction::Done);
        };

        trigger = self.finalizers.ensure_guard(&trigger).await?;
        operations[trigger_index] = trigger.clone();

        let executor = self
            .executors
            .create(&cluster)
            .await
            .map_err(|e| ReconcilerError::ExecutorFactory {
                cluster: cluster_key.clone(),
                reason: e.to_string(),
            })?;

        let engine = match executor.status().await {
            Ok(status) if status.is_ready() => status,
            Ok(_) => {
                info!(cluster = %cluster_key, "Optimization engine is not ready yet");
                return Ok(self.requeue());
            }
            Err(e) => {
                log_error("reconciler", "engine_status", &e.to_string(), Some(&cluster_key.to_string()));
                return Ok(self.requeue());
            }
        };

        let mut in_scope: Vec<Operation> = operations
            .into_iter()
            .filter(|op| {
                op.cluster_reference().is_ok_and(|reference| reference == cluster_key)
                    && op.is_current_task_operation_valid()
                    && !op.is_done()
            })
            .collect();

        let now = Utc::now();
        if let Err(e) = self
            .results
            .sync_current_tasks(self.store.as_ref(), executor.as_ref(), &mut in_scope, now)
            .await
        {
            log_error("reconciler", "sync_current_tasks", &e.to_string(), None);
            return Ok(self.requeue());
        }

        if let Some(latest) = in_scope.iter().find(|op| op.key() == *key) {
            trigger = latest.clone();
        }

        let plan = plan_dispatch(&ClusterSnapshot {
            trigger: &trigger,
            operations: &in_scope,
            engine,
            now,
            retry_backoff: self.config.retry_backoff(),
        });

        match plan {
            DispatchPlan::ReleaseTriggerGuard => {
                self.finalizers.release_guard(&trigger).await?;
                Ok(ReconcileAction::Done)
            }
            DispatchPlan::Idle => {
                debug!(cluster = %cluster_key, "No more operations for execution");
                Ok(ReconcileAction::Done)
            }
            DispatchPlan::Wait | DispatchPlan::Busy => Ok(self.requeue()),
            DispatchPlan::Dispatch { operation, kind } => {
                self.execute(executor.as_ref(), &cluster_key, &operation, kind)
                    .await
            }
        }
    }

    /// Dispatch under the cluster lease and persist the outcome
    async fn execute(
        &self,
        executor: &dyn TaskExecutor,
        cluster_key: &ObjectKey,
        operation: &Operation,
        kind: TaskOperation,
    ) -> ReconcilerResult<ReconcileAction> {
        let Some(lease) = self.leases.try_acquire(cluster_key) else {
            debug!(cluster = %cluster_key, "Another pass is dispatching for this cluster");
            return Ok(self.requeue());
        };

        // Another pass may have dispatched between our status check and the lease
        if kind != TaskOperation::StopExecution {
            match executor.status().await {
                Ok(status) if status.is_ready() && !status.in_execution() => {}
                _ => return Ok(self.requeue()),
            }
        }

        let parameters = operation
            .current_task()
            .map(|task| task.parameters.clone())
            .unwrap_or_default();
        info!(
            operation = %operation.key(),
            kind = %kind,
            parameters = ?parameters,
            "Executing optimization engine task"
        );

        let result = match dispatch(executor, &kind, &parameters).await {
            DispatchOutcome::Completed(result) => result,
            DispatchOutcome::FailedWithResult { result, error } => {
                log_error("reconciler", "dispatch", &error.to_string(), Some(&operation.key().to_string()));
                failed_attempt(result, &error)
            }
            DispatchOutcome::Failed(error) => {
                log_error("reconciler", "dispatch", &error.to_string(), Some(&operation.key().to_string()));
                return Err(ReconcilerError::Dispatch {
                    operation: operation.key(),
                    source: error,
                });
            }
        };

        // The engine call may have been slow; keep the claim until the result is stored
        if !lease.extend() {
            warn!(
                cluster = %cluster_key,
                holder = %lease.holder(),
                "Dispatch lease expired during the engine call"
            );
        }

        let written = self
            .results
            .persist_post_execution(self.store.as_ref(), operation, &kind, &result, Utc::now())
            .await?;

        let state = result.state.to_string();
        log_operation_event(
            "dispatched",
            &written.key(),
            Some(&result.task_id),
            Some(&state),
            Some(kind.as_str()),
        );
        Ok(ReconcileAction::Done)
    }
}

/// A partial result of a failed request always records a failed attempt
fn failed_attempt(mut result: TaskResult, error: &ExecutorError) -> TaskResult {
    result.state = TaskState::CompletedWithError;
    if result.error.is_none() {
        result.error = Some(error.to_string());
    }
    result
}
