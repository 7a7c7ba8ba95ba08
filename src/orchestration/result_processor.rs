//! # Result Processor
//!
//! Merges engine results into operation status and persists them.
//!
//! Two merge modes exist. Polling only follows the remote state of a job
//! that is already recorded. Post-execution merging records a freshly
//! dispatched job and handles the retry bookkeeping: a previous failed
//! attempt is archived before it is overwritten, and a new failure under
//! the retry policy is archived right away so the record becomes eligible
//! for a retry once the backoff window has passed.
//!
//! Every field write goes through [`set_field`], so a merge reports whether
//! anything changed and unchanged records are never written back.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, error, instrument, warn};

use super::conflict_retry::{retry_on_conflict, ConflictBackoff};
use crate::constants::MISSING_TASK_RESULT_ERROR;
use crate::error::{ReconcilerError, ReconcilerResult};
use crate::executor::{TaskExecutor, TaskResult};
use crate::models::{set_field, ErrorPolicy, Operation, TaskOperation};
use crate::state_machine::TaskState;
use crate::store::OperationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Periodic status poll of a known job
    Poll,
    /// Result of a dispatch made in this pass
    PostExecution,
}

pub struct ResultProcessor {
    history_max_length: usize,
    backoff: ConflictBackoff,
}

impl ResultProcessor {
    pub fn new(history_max_length: usize, backoff: ConflictBackoff) -> Self {
        Self {
            history_max_length,
            backoff,
        }
    }

    /// Merge `result` into the record. Returns true when the status changed.
    pub fn merge(
        &self,
        operation: &mut Operation,
        result: &TaskResult,
        mode: MergeMode,
        now: DateTime<Utc>,
    ) -> ReconcilerResult<bool> {
        let key = operation.key();
        let spec_policy = operation.spec.error_policy;
        let mut dirty = set_field(&mut operation.status.error_policy, spec_policy);

        if mode == MergeMode::PostExecution {
            let previous_failed = operation
                .current_task()
                .is_some_and(|task| task.state == Some(TaskState::CompletedWithError));
            if previous_failed {
                self.archive_current_task(operation);
                dirty = true;
            }
        }

        let task = operation
            .current_task_mut()
            .ok_or_else(|| ReconcilerError::TaskSync {
                operation: key.clone(),
                reason: "record has no current task".to_string(),
            })?;

        if mode == MergeMode::PostExecution {
            if task.started.is_none() {
                task.started = Some(parse_start_time(&result.started_at, now)?);
                dirty = true;
            }
            dirty |= set_field(&mut task.id, result.task_id.clone());
            dirty |= set_field(
                &mut task.summary,
                result.result.as_ref().map(|summary| summary.to_summary_map()),
            );
            if let Some(error) = &result.error {
                dirty |= set_field(&mut task.error_message, error.clone());
            }
            dirty |= set_field(&mut task.http_request, result.request_url.clone());
            dirty |= set_field(&mut task.http_response_code, Some(result.response_status_code));
        } else if let Some(error) = result.error.as_ref().filter(|_| task.error_message.is_empty()) {
            // A recorded failure reason outlives the engine's result cache
            dirty |= set_field(&mut task.error_message, error.clone());
        }

        if result.state.is_terminal() && task.finished.is_none() {
            task.finished = Some(now);
            dirty = true;
        }
        dirty |= set_field(&mut task.state, Some(result.state));

        if mode == MergeMode::PostExecution
            && result.state == TaskState::CompletedWithError
            && spec_policy == ErrorPolicy::Retry
        {
            self.archive_current_task(operation);
            dirty = true;
        }

        Ok(dirty)
    }

    fn archive_current_task(&self, operation: &mut Operation) {
        let Some(task) = operation.current_task_mut() else {
            return;
        };
        let snapshot = task.clone();
        task.reset();
        debug!(
            operation = %operation.key(),
            task_id = %snapshot.id,
            "Archiving failed task"
        );
        operation.archive_failed_task(snapshot, self.history_max_length);
        operation.status.retry_count += 1;
    }

    /// Poll the engine for every dispatched, unfinished record and persist the
    /// records whose status changed. Updated records replace their entries in
    /// `operations`.
    #[instrument(skip_all, fields(records = operations.len()))]
    pub async fn sync_current_tasks(
        &self,
        store: &dyn OperationStore,
        executor: &dyn TaskExecutor,
        operations: &mut [Operation],
        now: DateTime<Utc>,
    ) -> ReconcilerResult<()> {
        let task_ids: Vec<String> = operations
            .iter()
            .filter(|op| !op.is_done())
            .filter_map(|op| op.current_task().filter(|t| t.is_dispatched()).map(|t| t.id.clone()))
            .collect();
        if task_ids.is_empty() {
            return Ok(());
        }

        let results: HashMap<String, TaskResult> = executor
            .user_tasks(&task_ids)
            .await?
            .into_iter()
            .map(|result| (result.task_id.clone(), result))
            .collect();

        for operation in operations.iter_mut() {
            let Some(task_id) = operation
                .current_task()
                .filter(|t| t.is_dispatched() && !operation.is_done())
                .map(|t| t.id.clone())
            else {
                continue;
            };

            let result = match results.get(&task_id) {
                Some(result) => result.clone(),
                None => {
                    error!(
                        operation = %operation.key(),
                        task_id = %task_id,
                        error = MISSING_TASK_RESULT_ERROR,
                        "Task result missing from the engine; its result cache is probably too small, treating the task as failed"
                    );
                    TaskResult::missing(task_id.clone(), MISSING_TASK_RESULT_ERROR)
                }
            };

            let mut merged = operation.clone();
            if !self.merge(&mut merged, &result, MergeMode::Poll, now)? {
                continue;
            }
            *operation = self
                .persist(store, merged, &task_id, None, &result, MergeMode::Poll, now)
                .await?;
        }
        Ok(())
    }

    /// Persist the result of a dispatch made in this pass. `kind` is applied
    /// to the task before merging, so a forced stop survives a reload.
    #[instrument(skip_all, fields(operation = %operation.key(), kind = %kind))]
    pub async fn persist_post_execution(
        &self,
        store: &dyn OperationStore,
        operation: &Operation,
        kind: &TaskOperation,
        result: &TaskResult,
        now: DateTime<Utc>,
    ) -> ReconcilerResult<Operation> {
        let previous_task_id = operation
            .current_task()
            .map(|task| task.id.clone())
            .unwrap_or_default();
        let mut merged = operation.clone();
        apply_kind(&mut merged, kind);
        self.merge(&mut merged, result, MergeMode::PostExecution, now)?;
        self.persist(
            store,
            merged,
            &previous_task_id,
            Some(kind),
            result,
            MergeMode::PostExecution,
            now,
        )
        .await
    }

    /// Write `merged`; on conflict reload, redo the change and try again.
    ///
    /// `expected_task_id` is the job the merge was computed against. When the
    /// reloaded record has moved on to another job, the result no longer
    /// applies and the reloaded record is returned unwritten.
    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        store: &dyn OperationStore,
        merged: Operation,
        expected_task_id: &str,
        kind: Option<&TaskOperation>,
        result: &TaskResult,
        mode: MergeMode,
        now: DateTime<Utc>,
    ) -> ReconcilerResult<Operation> {
        let key = merged.key();
        retry_on_conflict(&self.backoff, &key, |attempt| {
            let key = key.clone();
            let merged = merged.clone();
            async move {
                let candidate = if attempt == 1 {
                    merged
                } else {
                    let mut fresh = store.get(&key).await?;
                    if is_superseded(&fresh, expected_task_id, result, mode) {
                        warn!(
                            operation = %key,
                            task_id = %result.task_id,
                            current_task_id = ?fresh.current_task().map(|t| t.id.as_str()),
                            "Record moved on to another attempt, dropping stale result"
                        );
                        return Ok::<Operation, ReconcilerError>(fresh);
                    }
                    if let Some(kind) = kind {
                        apply_kind(&mut fresh, kind);
                    }
                    self.merge(&mut fresh, result, mode, now)?;
                    fresh
                };
                let written = store.update_status(&candidate).await?;
                Ok::<Operation, ReconcilerError>(written)
            }
        })
        .await
    }
}

/// The reloaded record no longer carries the attempt a result was merged for
fn is_superseded(fresh: &Operation, expected_task_id: &str, result: &TaskResult, mode: MergeMode) -> bool {
    let current_id = fresh.current_task().map_or("", |task| task.id.as_str());
    match mode {
        MergeMode::Poll => current_id != result.task_id || fresh.is_done(),
        MergeMode::PostExecution => !current_id.is_empty() && current_id != expected_task_id,
    }
}

fn apply_kind(operation: &mut Operation, kind: &TaskOperation) {
    if let Some(task) = operation.current_task_mut() {
        set_field(&mut task.operation, kind.clone());
    }
}

/// Parse the engine's RFC 1123 start time; empty text means "now"
pub fn parse_start_time(text: &str, now: DateTime<Utc>) -> ReconcilerResult<DateTime<Utc>> {
    if text.trim().is_empty() {
        return Ok(now);
    }
    DateTime::parse_from_rfc2822(text.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| ReconcilerError::InvalidStartTime {
            value: text.to_string(),
            reason: e.to_string(),
        })
}
