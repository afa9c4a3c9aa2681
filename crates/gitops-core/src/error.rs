//! Error taxonomy of the pipeline core
//!
//! Expected failure states (a rejected workflow, a red quality gate) and
//! caller bugs (`InvalidArgument`) are separate variants so the driver can
//! report them differently. `ErrorKind` is the coarse classification used
//! for exit codes and reporting.

use gitops_client::TaskState;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::event::TriggerEvent;

/// Result alias used throughout the core
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Coarse classification of a `PipelineError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input; a caller bug, never retried
    InvalidArgument,
    /// The trigger does not match any GitOps rule
    UnsupportedWorkflow,
    /// A file, git or network operation failed
    IoFailure,
    /// The mutual-exclusion region could not be acquired in time
    LockTimeout,
    /// The analysis task ended canceled/failed or its endpoint was unreachable
    TaskFailed,
    /// The quality gate reported an error
    QualityGateFailed,
    /// The task-status API broke its contract
    Protocol,
    /// The configured wall-clock bound on polling was exceeded
    PollTimeout,
}

/// Why an analysis task is considered failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailureCause {
    /// The task reached `CANCELED` or `FAILED`
    Terminal(TaskState),
    /// The task-status endpoint could not be queried
    Unreachable(String),
}

impl fmt::Display for TaskFailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailureCause::Terminal(state) => write!(f, "task ended {}", state),
            TaskFailureCause::Unreachable(reason) => {
                write!(f, "task-status endpoint unreachable: {}", reason)
            }
        }
    }
}

/// Errors surfaced by the pipeline core
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported workflow: no GitOps rule accepts {event}")]
    UnsupportedWorkflow { event: Box<TriggerEvent> },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} failed: {source:#}")]
    VersionControl {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("timed out after {waited:?} waiting for lock region '{region}'")]
    LockTimeout { region: String, waited: Duration },

    #[error("analysis task {task_id} did not succeed: {cause}")]
    TaskFailed {
        task_id: String,
        cause: TaskFailureCause,
    },

    #[error("quality gate failed for analysis {analysis_id} (status {status})")]
    QualityGateFailed { analysis_id: String, status: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("analysis task {task_id} not finished after {waited:?}")]
    PollTimeout { task_id: String, waited: Duration },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PipelineError::UnsupportedWorkflow { .. } => ErrorKind::UnsupportedWorkflow,
            PipelineError::Io { .. } | PipelineError::VersionControl { .. } => {
                ErrorKind::IoFailure
            }
            PipelineError::LockTimeout { .. } => ErrorKind::LockTimeout,
            PipelineError::TaskFailed { .. } => ErrorKind::TaskFailed,
            PipelineError::QualityGateFailed { .. } => ErrorKind::QualityGateFailed,
            PipelineError::Protocol(_) => ErrorKind::Protocol,
            PipelineError::PollTimeout { .. } => ErrorKind::PollTimeout,
        }
    }

    /// True for errors caused by the caller rather than the environment
    pub fn is_caller_bug(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PipelineError::InvalidArgument(msg.into())
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }
}
