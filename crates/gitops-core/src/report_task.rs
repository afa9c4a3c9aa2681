//! Scanner `report-task.txt` parsing
//!
//! After uploading an analysis the scanner writes `key=value` lines such as
//! `ceTaskId=AVAn5RKqYwETbXvgas-I` describing the background task it queued.

use gitops_client::FileStore;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{PipelineError, Result};

const TASK_ID: &str = "ceTaskId";
const TASK_URL: &str = "ceTaskUrl";
const SERVER_URL: &str = "serverUrl";

/// Background task described by a scanner report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTask {
    pub task_id: String,
    pub task_url: Option<String>,
    pub server_url: Option<String>,
}

impl ReportTask {
    /// Parse report lines; fails with `Protocol` when `ceTaskId` is missing
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let entries: HashMap<&str, &str> = lines
            .iter()
            .map(|line| line.as_ref().trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let task_id = entries
            .get(TASK_ID)
            .ok_or_else(|| PipelineError::Protocol(format!("scanner report has no {}", TASK_ID)))?;
        Ok(Self {
            task_id: task_id.to_string(),
            task_url: entries.get(TASK_URL).map(|v| v.to_string()),
            server_url: entries.get(SERVER_URL).map(|v| v.to_string()),
        })
    }

    /// Read the report at `path`
    ///
    /// A missing report means no analysis was uploaded, which is reported as
    /// `InvalidArgument`.
    pub fn read(files: &dyn FileStore, path: &Path) -> Result<Self> {
        if !files.exists(path) {
            return Err(PipelineError::invalid(format!(
                "scanner report {} not found; pass the task id explicitly",
                path.display()
            )));
        }
        let lines = files
            .read_lines(path)
            .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&lines)
    }
}
