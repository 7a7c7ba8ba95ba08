//! # Current Task
//!
//! One execution attempt of an operation. Identified by a remote job ID once
//! the engine has accepted it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::state_machine::TaskState;

/// Kind of work requested from the optimization engine
///
/// Records are written by users, so any string may show up; values the
/// reconciler cannot execute are kept as `Unsupported` for logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskOperation {
    AddBroker,
    RemoveBroker,
    Rebalance,
    StopExecution,
    Unsupported(String),
}

impl TaskOperation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AddBroker => "add_broker",
            Self::RemoveBroker => "remove_broker",
            Self::Rebalance => "rebalance",
            Self::StopExecution => "stop_execution",
            Self::Unsupported(raw) => raw,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// Execution weight: capacity-adding work first, rebalances last
    pub fn priority(&self) -> u8 {
        match self {
            Self::AddBroker => 2,
            Self::RemoveBroker => 1,
            Self::Rebalance | Self::StopExecution | Self::Unsupported(_) => 0,
        }
    }
}

impl From<String> for TaskOperation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "add_broker" => Self::AddBroker,
            "remove_broker" => Self::RemoveBroker,
            "rebalance" => Self::Rebalance,
            "stop_execution" => Self::StopExecution,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<TaskOperation> for String {
    fn from(value: TaskOperation) -> Self {
        match value {
            TaskOperation::Unsupported(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Governs whether a failed attempt is retried or becomes terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Retry,
    Ignore,
}

/// The single task currently owned by an operation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTask {
    pub operation: TaskOperation,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Remote job ID, empty until dispatched
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub state: Option<TaskState>,
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished: Option<DateTime<Utc>>,
    #[serde(default)]
    pub http_request: String,
    #[serde(default)]
    pub http_response_code: Option<u16>,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub summary: Option<BTreeMap<String, String>>,
}

impl CurrentTask {
    pub fn new(operation: TaskOperation, parameters: BTreeMap<String, String>) -> Self {
        Self {
            operation,
            parameters,
            id: String::new(),
            state: None,
            started: None,
            finished: None,
            http_request: String::new(),
            http_response_code: None,
            error_message: String::new(),
            summary: None,
        }
    }

    /// Clear every attempt-level field, keeping the requested operation and parameters
    pub fn reset(&mut self) {
        *self = Self::new(self.operation.clone(), std::mem::take(&mut self.parameters));
    }

    pub fn is_dispatched(&self) -> bool {
        !self.id.is_empty()
    }

    /// The engine is still working on this task
    pub fn is_running(&self) -> bool {
        self.state.is_some_and(|s| s.is_running()) && self.finished.is_none()
    }

    pub fn has_failed(&self) -> bool {
        self.state.is_some_and(|s| s.is_error())
    }
}

/// Write `value` into `slot` if it differs. Returns true when the slot changed.
pub fn set_field<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parsing() {
        assert_eq!(TaskOperation::from("add_broker".to_string()), TaskOperation::AddBroker);
        assert_eq!(
            TaskOperation::from("remove_disks".to_string()),
            TaskOperation::Unsupported("remove_disks".to_string())
        );
        assert!(!TaskOperation::from(String::new()).is_supported());
    }

    #[test]
    fn test_operation_priorities() {
        assert!(TaskOperation::AddBroker.priority() > TaskOperation::RemoveBroker.priority());
        assert!(TaskOperation::RemoveBroker.priority() > TaskOperation::Rebalance.priority());
    }

    #[test]
    fn test_operation_serde() {
        let json = serde_json::to_string(&TaskOperation::RemoveBroker).unwrap();
        assert_eq!(json, "\"remove_broker\"");
        let parsed: TaskOperation = serde_json::from_str("\"unknown_op\"").unwrap();
        assert_eq!(parsed, TaskOperation::Unsupported("unknown_op".to_string()));
    }

    #[test]
    fn test_reset_keeps_request() {
        let mut params = BTreeMap::new();
        params.insert("brokerid".to_string(), "3".to_string());
        let mut task = CurrentTask::new(TaskOperation::RemoveBroker, params.clone());
        task.id = "job-1".to_string();
        task.state = Some(TaskState::CompletedWithError);
        task.finished = Some(Utc::now());
        task.error_message = "boom".to_string();

        task.reset();

        assert_eq!(task, CurrentTask::new(TaskOperation::RemoveBroker, params));
    }

    #[test]
    fn test_running_requires_unfinished() {
        let mut task = CurrentTask::new(TaskOperation::Rebalance, BTreeMap::new());
        assert!(!task.is_running());
        task.state = Some(TaskState::InExecution);
        assert!(task.is_running());
        task.finished = Some(Utc::now());
        assert!(!task.is_running());
    }

    #[test]
    fn test_set_field_reports_changes() {
        let mut value = 1;
        assert!(!set_field(&mut value, 1));
        assert!(set_field(&mut value, 2));
        assert_eq!(value, 2);
    }
}
