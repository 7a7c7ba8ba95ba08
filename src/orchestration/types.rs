//! Shared orchestration types.

use std::time::Duration;

/// What the caller should do after a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Nothing to do until the record changes again
    Done,
    /// Run another pass after the given delay
    RequeueAfter(Duration),
}

impl ReconcileAction {
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::Done => None,
            Self::RequeueAfter(delay) => Some(*delay),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
