//! Task-status client trait
//!
//! This module defines the `TaskStatusClient` trait that the code-quality
//! poller drives. Implementations hit a real server (`SonarClient`) or are
//! scripted in tests.

use crate::types::TaskStatus;
use async_trait::async_trait;

/// Code-quality server task API
///
/// Defines the two lookups needed to turn a background analysis task into a
/// quality verdict. Errors mean the endpoint could not be reached or answered
/// with something unparseable; callers treat them as hard failures.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow sharing across
/// async tasks and threads.
///
/// # Example
///
/// ```rust,ignore
/// use gitops_client::{TaskState, TaskStatusClient};
///
/// async fn is_done(client: &dyn TaskStatusClient, id: &str) -> anyhow::Result<bool> {
///     Ok(client.fetch_task(id).await?.status.is_terminal())
/// }
/// ```
#[async_trait]
pub trait TaskStatusClient: Send + Sync {
    /// Fetch the current status of a background task
    ///
    /// # Arguments
    ///
    /// * `task_id` - Task identifier reported by the scanner
    async fn fetch_task(&self, task_id: &str) -> anyhow::Result<TaskStatus>;

    /// Fetch the raw quality-gate status of a finished analysis
    ///
    /// Returns the server's status string unchanged (e.g. `OK`, `WARN`, `ERROR`).
    ///
    /// # Arguments
    ///
    /// * `analysis_id` - Analysis produced by a successful task
    async fn fetch_quality_verdict(&self, analysis_id: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl<T: TaskStatusClient + ?Sized> TaskStatusClient for std::sync::Arc<T> {
    async fn fetch_task(&self, task_id: &str) -> anyhow::Result<TaskStatus> {
        (**self).fetch_task(task_id).await
    }

    async fn fetch_quality_verdict(&self, analysis_id: &str) -> anyhow::Result<String> {
        (**self).fetch_quality_verdict(analysis_id).await
    }
}

#[async_trait]
impl<T: TaskStatusClient + ?Sized> TaskStatusClient for &T {
    async fn fetch_task(&self, task_id: &str) -> anyhow::Result<TaskStatus> {
        (**self).fetch_task(task_id).await
    }

    async fn fetch_quality_verdict(&self, analysis_id: &str) -> anyhow::Result<String> {
        (**self).fetch_quality_verdict(analysis_id).await
    }
}
