//! # Test Utilities
//!
//! Builders and scripted collaborators shared by unit and integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::constants::{CLUSTER_REF_LABEL, OPERATION_FINALIZER, PAUSE_ANNOTATION};
use crate::error::ExecutorError;
use crate::executor::{EngineStatus, ExecutorFactory, TaskExecutor, TaskParameters, TaskResult};
use crate::models::{CurrentTask, ErrorPolicy, ObjectMeta, Operation, TargetCluster, TaskOperation};
use crate::state_machine::TaskState;

pub const TEST_NAMESPACE: &str = "kafka";
pub const TEST_CLUSTER: &str = "kafka";

/// Fluent builder for operation records
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    metadata: ObjectMeta,
    task: CurrentTask,
    error_policy: ErrorPolicy,
    retry_count: u32,
    failed_tasks: Vec<CurrentTask>,
}

impl OperationBuilder {
    pub fn new(name: &str) -> Self {
        let mut metadata = ObjectMeta::new(TEST_NAMESPACE, name);
        metadata
            .labels
            .insert(CLUSTER_REF_LABEL.to_string(), TEST_CLUSTER.to_string());
        Self {
            metadata,
            task: CurrentTask::new(TaskOperation::Rebalance, BTreeMap::new()),
            error_policy: ErrorPolicy::Retry,
            retry_count: 0,
            failed_tasks: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.metadata.namespace = namespace.to_string();
        self
    }

    pub fn operation(mut self, operation: TaskOperation) -> Self {
        self.task.operation = operation;
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.task
            .parameters
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Set the task state; a job ID is assigned if none was given
    pub fn state(mut self, state: TaskState) -> Self {
        self.task.state = Some(state);
        if self.task.id.is_empty() {
            self.task.id = format!("job-{}", self.metadata.name);
        }
        self
    }

    pub fn task_id(mut self, id: &str) -> Self {
        self.task.id = id.to_string();
        self
    }

    pub fn finished(mut self, at: DateTime<Utc>) -> Self {
        self.task.finished = Some(at);
        self
    }

    pub fn started(mut self, at: DateTime<Utc>) -> Self {
        self.task.started = Some(at);
        self
    }

    /// Sets both the requested policy and the copy merged into status
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    pub fn failed_task(mut self, task: CurrentTask) -> Self {
        self.failed_tasks.push(task);
        self
    }

    pub fn paused(mut self) -> Self {
        self.metadata
            .annotations
            .insert(PAUSE_ANNOTATION.to_string(), "true".to_string());
        self
    }

    pub fn cluster(mut self, name: &str) -> Self {
        self.metadata
            .labels
            .insert(CLUSTER_REF_LABEL.to_string(), name.to_string());
        self
    }

    pub fn without_cluster(mut self) -> Self {
        self.metadata.labels.remove(CLUSTER_REF_LABEL);
        self
    }

    pub fn with_finalizer(mut self) -> Self {
        self.metadata.add_finalizer(OPERATION_FINALIZER);
        self
    }

    pub fn deleting(mut self) -> Self {
        self.metadata.deletion_timestamp = Some(Utc::now());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.metadata.creation_timestamp = at;
        self
    }

    pub fn build(self) -> Operation {
        let mut operation = Operation::new(self.metadata, self.task);
        operation.spec.error_policy = self.error_policy;
        operation.status.error_policy = self.error_policy;
        operation.status.retry_count = self.retry_count;
        operation.status.failed_tasks = self.failed_tasks;
        operation
    }
}

/// A failed task snapshot as it would appear in the history
pub fn failed_task_at(operation: TaskOperation, finished: DateTime<Utc>) -> CurrentTask {
    let mut task = CurrentTask::new(operation, BTreeMap::new());
    task.id = Uuid::new_v4().to_string();
    task.state = Some(TaskState::CompletedWithError);
    task.finished = Some(finished);
    task
}

/// A call observed by [`ScriptedTaskExecutor`]
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorCall {
    Status,
    AddBrokers(TaskParameters),
    RemoveBrokers(TaskParameters),
    Rebalance(TaskParameters),
    StopExecution,
    UserTasks(Vec<String>),
}

impl ExecutorCall {
    pub fn is_dispatch(&self) -> bool {
        !matches!(self, Self::Status | Self::UserTasks(_))
    }
}

/// Executor whose answers are scripted by the test
///
/// Dispatch verbs pop queued responses; with an empty queue they accept the
/// job as `Active` under a fresh ID. Accepted jobs are remembered and
/// returned by `user_tasks` until the test changes or forgets them.
pub struct ScriptedTaskExecutor {
    status: Mutex<Result<EngineStatus, ExecutorError>>,
    dispatch_responses: Mutex<VecDeque<Result<TaskResult, ExecutorError>>>,
    known_tasks: Mutex<HashMap<String, TaskResult>>,
    user_tasks_error: Mutex<Option<ExecutorError>>,
    calls: Mutex<Vec<ExecutorCall>>,
}

impl Default for ScriptedTaskExecutor {
    fn default() -> Self {
        Self {
            status: Mutex::new(Ok(EngineStatus {
                ready: true,
                in_execution: false,
            })),
            dispatch_responses: Mutex::new(VecDeque::new()),
            known_tasks: Mutex::new(HashMap::new()),
            user_tasks_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedTaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: EngineStatus) {
        *self.status.lock() = Ok(status);
    }

    pub fn fail_status(&self, error: ExecutorError) {
        *self.status.lock() = Err(error);
    }

    pub fn push_dispatch_response(&self, response: Result<TaskResult, ExecutorError>) {
        self.dispatch_responses.lock().push_back(response);
    }

    /// Register or replace the polled state of a job
    pub fn set_task_result(&self, result: TaskResult) {
        self.known_tasks
            .lock()
            .insert(result.task_id.clone(), result);
    }

    /// Drop a job from the result cache, as an engine with a full cache would
    pub fn forget_task(&self, task_id: &str) {
        self.known_tasks.lock().remove(task_id);
    }

    pub fn fail_user_tasks(&self, error: Option<ExecutorError>) {
        *self.user_tasks_error.lock() = error;
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls.lock().clone()
    }

    pub fn dispatch_calls(&self) -> Vec<ExecutorCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.is_dispatch())
            .cloned()
            .collect()
    }

    fn record(&self, call: ExecutorCall) {
        self.calls.lock().push(call);
    }

    fn next_dispatch(&self, verb: &str) -> Result<TaskResult, ExecutorError> {
        let response = self
            .dispatch_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(accepted_job(verb)));
        if let Ok(result) = &response {
            self.set_task_result(result.clone());
        }
        response
    }
}

/// A freshly accepted job as the engine reports it
pub fn accepted_job(verb: &str) -> TaskResult {
    TaskResult {
        task_id: Uuid::new_v4().to_string(),
        state: TaskState::Active,
        started_at: Utc::now().to_rfc2822(),
        request_url: format!("http://cruisecontrol:8090/kafkacruisecontrol/{verb}"),
        response_status_code: 200,
        result: None,
        error: None,
    }
}

#[async_trait]
impl TaskExecutor for ScriptedTaskExecutor {
    async fn status(&self) -> Result<EngineStatus, ExecutorError> {
        self.record(ExecutorCall::Status);
        self.status.lock().clone()
    }

    async fn add_brokers(&self, params: &TaskParameters) -> Result<TaskResult, ExecutorError> {
        self.record(ExecutorCall::AddBrokers(params.clone()));
        self.next_dispatch("add_broker")
    }

    async fn remove_brokers(&self, params: &TaskParameters) -> Result<TaskResult, ExecutorError> {
        self.record(ExecutorCall::RemoveBrokers(params.clone()));
        self.next_dispatch("remove_broker")
    }

    async fn rebalance(&self, params: &TaskParameters) -> Result<TaskResult, ExecutorError> {
        self.record(ExecutorCall::Rebalance(params.clone()));
        self.next_dispatch("rebalance")
    }

    async fn stop_execution(&self) -> Result<TaskResult, ExecutorError> {
        self.record(ExecutorCall::StopExecution);
        self.next_dispatch("stop_proposal_execution")
    }

    async fn user_tasks(&self, task_ids: &[String]) -> Result<Vec<TaskResult>, ExecutorError> {
        self.record(ExecutorCall::UserTasks(task_ids.to_vec()));
        if let Some(error) = self.user_tasks_error.lock().clone() {
            return Err(error);
        }
        let known = self.known_tasks.lock();
        Ok(task_ids
            .iter()
            .filter_map(|id| known.get(id).cloned())
            .collect())
    }
}

/// Factory handing out one shared [`ScriptedTaskExecutor`]
pub struct ScriptedExecutorFactory {
    executor: Arc<ScriptedTaskExecutor>,
    fail: AtomicBool,
    created: AtomicUsize,
}

impl ScriptedExecutorFactory {
    pub fn new(executor: Arc<ScriptedTaskExecutor>) -> Self {
        Self {
            executor,
            fail: AtomicBool::new(false),
            created: AtomicUsize::new(0),
        }
    }

    pub fn fail_creation(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutorFactory for ScriptedExecutorFactory {
    async fn create(&self, cluster: &TargetCluster) -> Result<Arc<dyn TaskExecutor>, ExecutorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExecutorError::Unreachable(format!(
                "no engine endpoint for cluster {}",
                cluster.key
            )));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.executor.clone())
    }
}
