//! Code-quality server data transfer objects
//!
//! These types represent what the task-status API returns. They are kept
//! separate from the verdict logic in `gitops-core` so this crate stays a
//! plain client library.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a background analysis task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Task is queued
    Pending,
    /// Task is running
    InProgress,
    /// Task finished and produced an analysis
    Success,
    /// Task was canceled before finishing
    Canceled,
    /// Task failed
    Failed,
}

impl TaskState {
    /// No further transition occurs from this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Canceled | TaskState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::InProgress => "IN_PROGRESS",
            TaskState::Success => "SUCCESS",
            TaskState::Canceled => "CANCELED",
            TaskState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a background task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Current state
    pub status: TaskState,

    /// Analysis produced by the task (set once the task reached `SUCCESS`)
    #[serde(rename = "analysisId", default, skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
}

impl TaskStatus {
    pub fn new(status: TaskState) -> Self {
        Self {
            status,
            analysis_id: None,
        }
    }

    pub fn success(analysis_id: impl Into<String>) -> Self {
        Self {
            status: TaskState::Success,
            analysis_id: Some(analysis_id.into()),
        }
    }
}
