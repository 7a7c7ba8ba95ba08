use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task as reported by the optimization engine
///
/// A task that was never dispatched has no state at all; the record models
/// that as `Option<TaskState>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Accepted by the engine, waiting to run
    Active,
    /// Currently moving replicas or leadership
    InExecution,
    /// Finished successfully
    Completed,
    /// Finished with an error
    CompletedWithError,
}

impl TaskState {
    /// Check if this is a terminal state (the engine will not change it again)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithError)
    }

    /// Check if this is an error state that may allow a retry
    pub fn is_error(&self) -> bool {
        matches!(self, Self::CompletedWithError)
    }

    /// Check if the engine is still working on the task
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Active | Self::InExecution)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::InExecution => write!(f, "InExecution"),
            Self::Completed => write!(f, "Completed"),
            Self::CompletedWithError => write!(f, "CompletedWithError"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "InExecution" => Ok(Self::InExecution),
            "Completed" => Ok(Self::Completed),
            "CompletedWithError" => Ok(Self::CompletedWithError),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// Default state for freshly accepted tasks
impl Default for TaskState {
    fn default() -> Self {
        Self::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_terminal_check() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::CompletedWithError.is_terminal());
        assert!(!TaskState::Active.is_terminal());
        assert!(!TaskState::InExecution.is_terminal());
    }

    #[test]
    fn test_task_state_running_check() {
        assert!(TaskState::Active.is_running());
        assert!(TaskState::InExecution.is_running());
        assert!(!TaskState::Completed.is_running());
        assert!(!TaskState::CompletedWithError.is_running());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(TaskState::InExecution.to_string(), "InExecution");
        assert_eq!(
            "CompletedWithError".parse::<TaskState>().unwrap(),
            TaskState::CompletedWithError
        );
        assert!("completed".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&TaskState::CompletedWithError).unwrap();
        assert_eq!(json, "\"CompletedWithError\"");

        let parsed: TaskState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TaskState::CompletedWithError);
    }
}
