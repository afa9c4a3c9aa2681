//! reqwest-based code-quality server client
//!
//! Direct implementation of the `TaskStatusClient` trait against the
//! SonarQube web API. Every call is a single request; retrying is left to
//! the caller.

use crate::task_client::TaskStatusClient;
use crate::types::TaskStatus;
use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

/// Response of `GET /api/ce/task`
#[derive(Debug, Deserialize)]
struct CeTaskResponse {
    task: TaskStatus,
}

/// Response of `GET /api/qualitygates/project_status`
#[derive(Debug, Deserialize)]
struct ProjectStatusResponse {
    #[serde(rename = "projectStatus")]
    project_status: ProjectStatus,
}

#[derive(Debug, Deserialize)]
struct ProjectStatus {
    status: String,
}

/// Direct code-quality server client using reqwest
#[derive(Debug, Clone)]
pub struct SonarClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl SonarClient {
    /// Create a new client for the server at `base_url`
    ///
    /// The token, if any, is sent as the basic-auth user with an empty password.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.basic_auth(token, Some(""));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?;

        response
            .json::<T>()
            .await
            .with_context(|| format!("Unexpected response body from {}", url))
    }
}

#[async_trait]
impl TaskStatusClient for SonarClient {
    async fn fetch_task(&self, task_id: &str) -> anyhow::Result<TaskStatus> {
        debug!("Fetching analysis task {}", task_id);
        let response: CeTaskResponse = self.get_json("/api/ce/task", &[("id", task_id)]).await?;
        debug!("Task {} is {}", task_id, response.task.status);
        Ok(response.task)
    }

    async fn fetch_quality_verdict(&self, analysis_id: &str) -> anyhow::Result<String> {
        debug!("Fetching quality gate for analysis {}", analysis_id);
        let response: ProjectStatusResponse = self
            .get_json(
                "/api/qualitygates/project_status",
                &[("analysisId", analysis_id)],
            )
            .await?;
        Ok(response.project_status.status)
    }
}
