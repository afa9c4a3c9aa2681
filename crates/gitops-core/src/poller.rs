//! Code-quality task polling
//!
//! The scanner hands analysis off to a background task on the code-quality
//! server. `AsyncTaskPoller` re-fetches that task at a fixed interval until it
//! reaches a terminal state, then looks up the quality gate of the produced
//! analysis and turns it into a `QualityVerdict`.

use chrono::{DateTime, Utc};
use gitops_client::{TaskState, TaskStatusClient};
use gitops_config::QualityConfig;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{PipelineError, Result, TaskFailureCause};

/// Outcome of a quality gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityVerdict {
    Pass,
    Warn,
    Fail,
    /// No verdict could be obtained (task failed, protocol error, timeout)
    Unknown,
}

impl QualityVerdict {
    /// Map a raw quality-gate status: `ERROR` fails, `WARN` warns, anything else passes
    pub fn from_gate_status(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ERROR" => QualityVerdict::Fail,
            "WARN" => QualityVerdict::Warn,
            _ => QualityVerdict::Pass,
        }
    }

    /// Verdict to report for a failed wait; `None` for errors unrelated to polling
    pub fn from_error(err: &PipelineError) -> Option<Self> {
        match err {
            PipelineError::QualityGateFailed { .. } => Some(QualityVerdict::Fail),
            PipelineError::TaskFailed { .. }
            | PipelineError::Protocol(_)
            | PipelineError::PollTimeout { .. } => Some(QualityVerdict::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityVerdict::Pass => "PASS",
            QualityVerdict::Warn => "WARN",
            QualityVerdict::Fail => "FAIL",
            QualityVerdict::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetched task state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollObservation {
    pub at: DateTime<Utc>,
    pub state: TaskState,
}

/// Result of a successful wait (verdict `Pass` or `Warn`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub verdict: QualityVerdict,
    pub analysis_id: String,
    /// Raw quality-gate status as returned by the server
    pub gate_status: String,
    pub polls: u32,
    pub sleeps: u32,
    pub history: Vec<PollObservation>,
}

/// Polls a background analysis task until it yields a quality verdict
pub struct AsyncTaskPoller<C> {
    client: C,
    interval: Duration,
    max_wait: Option<Duration>,
}

impl<C: TaskStatusClient> AsyncTaskPoller<C> {
    /// Poll every `interval`, without an upper bound on the total wait
    pub fn new(client: C, interval: Duration) -> Self {
        Self {
            client,
            interval,
            max_wait: None,
        }
    }

    pub fn from_config(client: C, config: &QualityConfig) -> Self {
        Self::new(client, Duration::from_secs(config.query_interval_secs))
            .with_max_wait(config.max_wait_secs.map(Duration::from_secs))
    }

    /// Give up with `PollTimeout` once the task is still running after `max_wait`
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for `task_id` to finish and evaluate its quality gate
    ///
    /// Never sleeps when the first fetch is already terminal. A failed fetch
    /// is treated like a `FAILED` task; there is no retry at this layer.
    pub async fn wait_for_quality_result(&self, task_id: &str) -> Result<PollReport> {
        if task_id.trim().is_empty() {
            return Err(PipelineError::invalid("task id is empty"));
        }
        if self.interval.is_zero() {
            return Err(PipelineError::invalid("query interval must be positive"));
        }

        let started = Instant::now();
        let mut history = Vec::new();
        let mut sleeps = 0u32;

        let analysis_id = loop {
            let status = self.client.fetch_task(task_id).await.map_err(|e| {
                PipelineError::TaskFailed {
                    task_id: task_id.to_string(),
                    cause: TaskFailureCause::Unreachable(format!("{:#}", e)),
                }
            })?;
            debug!("Task {} is {}", task_id, status.status);
            history.push(PollObservation {
                at: Utc::now(),
                state: status.status,
            });

            match status.status {
                TaskState::Success => break status.analysis_id,
                TaskState::Canceled | TaskState::Failed => {
                    return Err(PipelineError::TaskFailed {
                        task_id: task_id.to_string(),
                        cause: TaskFailureCause::Terminal(status.status),
                    });
                }
                TaskState::Pending | TaskState::InProgress => {}
            }

            if let Some(max_wait) = self.max_wait {
                let waited = started.elapsed();
                if waited >= max_wait {
                    return Err(PipelineError::PollTimeout {
                        task_id: task_id.to_string(),
                        waited,
                    });
                }
            }
            tokio::time::sleep(self.interval).await;
            sleeps += 1;
        };

        let analysis_id = analysis_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::Protocol(format!(
                    "task {} succeeded without an analysis id",
                    task_id
                ))
            })?;

        let gate_status = self
            .client
            .fetch_quality_verdict(&analysis_id)
            .await
            .map_err(|e| PipelineError::TaskFailed {
                task_id: task_id.to_string(),
                cause: TaskFailureCause::Unreachable(format!("{:#}", e)),
            })?;

        let verdict = QualityVerdict::from_gate_status(&gate_status);
        match verdict {
            QualityVerdict::Fail => {
                return Err(PipelineError::QualityGateFailed {
                    analysis_id,
                    status: gate_status,
                });
            }
            QualityVerdict::Warn => {
                warn!(
                    "Quality gate of analysis {} passed with warnings",
                    analysis_id
                );
            }
            QualityVerdict::Pass | QualityVerdict::Unknown => {
                info!("Quality gate of analysis {} passed", analysis_id);
            }
        }

        Ok(PollReport {
            verdict,
            analysis_id,
            gate_status,
            polls: history.len() as u32,
            sleeps,
            history,
        })
    }
}
