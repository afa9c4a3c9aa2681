//! Trigger events
//!
//! One `TriggerEvent` is built per pipeline invocation from the webhook
//! environment and consumed once by the checkout dispatcher.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{PipelineError, Result};

const ACTION_TYPE: &str = "gitlabActionType";
const BRANCH: &str = "gitlabBranch";
const MR_IID: &str = "gitlabMergeRequestIid";
const MR_ID: &str = "gitlabMergeRequestId";
const SOURCE_REPO_NAME: &str = "gitlabSourceRepoName";
const SOURCE_REPO_URLS: [&str; 3] = [
    "gitlabSourceRepoSshUrl",
    "gitlabSourceRepoHttpUrl",
    "gitlabSourceRepoURL",
];
const SOURCE_BRANCH: &str = "gitlabSourceBranch";
const TARGET_BRANCH: &str = "gitlabTargetBranch";
const TRIGGER_PHRASE: &str = "gitlabTriggerPhrase";

/// Merge request fields shared by merge and note events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestEvent {
    pub mr_id: u64,
    /// Name of the source repository (used as its remote name)
    pub source_repo: String,
    pub source_repo_url: String,
    pub source_branch: String,
    pub target_branch: String,
}

/// What triggered this pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TriggerEvent {
    Push {
        branch: String,
    },
    Merge {
        request: MergeRequestEvent,
    },
    Note {
        request: MergeRequestEvent,
        comment: String,
    },
    Manual {
        branch: String,
    },
}

impl TriggerEvent {
    pub fn push(branch: impl Into<String>) -> Self {
        TriggerEvent::Push {
            branch: branch.into(),
        }
    }

    pub fn manual(branch: impl Into<String>) -> Self {
        TriggerEvent::Manual {
            branch: branch.into(),
        }
    }

    /// Merge request carried by a merge or note event
    pub fn merge_request(&self) -> Option<&MergeRequestEvent> {
        match self {
            TriggerEvent::Merge { request } | TriggerEvent::Note { request, .. } => Some(request),
            TriggerEvent::Push { .. } | TriggerEvent::Manual { .. } => None,
        }
    }

    /// Build the event from the CI environment of this process
    ///
    /// See [`TriggerEvent::from_env_vars`].
    pub fn from_env(manual_branch: Option<&str>) -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_vars(&vars, manual_branch)
    }

    /// Build the event from GitLab webhook variables
    ///
    /// Without `gitlabActionType` the run is manual and `manual_branch` names
    /// the branch to build. Missing variables and action types other than
    /// `PUSH`, `MERGE` and `NOTE` fail with `InvalidArgument`.
    pub fn from_env_vars(
        vars: &HashMap<String, String>,
        manual_branch: Option<&str>,
    ) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key)
                .map(str::to_string)
                .ok_or_else(|| PipelineError::invalid(format!("{} is not set", key)))
        };

        let Some(action) = get(ACTION_TYPE) else {
            let branch = manual_branch
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .ok_or_else(|| {
                    PipelineError::invalid("manual run without a branch to build")
                })?;
            return Ok(TriggerEvent::manual(branch));
        };

        match action.to_ascii_uppercase().as_str() {
            "PUSH" => {
                let branch = get(BRANCH)
                    .or_else(|| get(SOURCE_BRANCH))
                    .ok_or_else(|| PipelineError::invalid(format!("{} is not set", BRANCH)))?;
                Ok(TriggerEvent::push(branch))
            }
            kind @ ("MERGE" | "NOTE") => {
                let raw_id = get(MR_IID).or_else(|| get(MR_ID)).ok_or_else(|| {
                    PipelineError::invalid(format!("{} is not set", MR_IID))
                })?;
                let mr_id = raw_id.parse::<u64>().map_err(|_| {
                    PipelineError::invalid(format!("merge request id '{}' is not a number", raw_id))
                })?;
                let source_repo_url = SOURCE_REPO_URLS
                    .iter()
                    .find_map(|&key| get(key))
                    .ok_or_else(|| {
                        PipelineError::invalid(format!("{} is not set", SOURCE_REPO_URLS[0]))
                    })?
                    .to_string();
                let request = MergeRequestEvent {
                    mr_id,
                    source_repo: require(SOURCE_REPO_NAME)?,
                    source_repo_url,
                    source_branch: require(SOURCE_BRANCH)?,
                    target_branch: require(TARGET_BRANCH)?,
                };
                if kind == "MERGE" {
                    Ok(TriggerEvent::Merge { request })
                } else {
                    let comment = get(TRIGGER_PHRASE).unwrap_or_default().to_string();
                    Ok(TriggerEvent::Note { request, comment })
                }
            }
            other => Err(PipelineError::invalid(format!(
                "unsupported {} '{}'",
                ACTION_TYPE, other
            ))),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::Push { branch } => write!(f, "push to '{}'", branch),
            TriggerEvent::Merge { request } => write!(
                f,
                "merge request !{} ({}/{} -> {})",
                request.mr_id, request.source_repo, request.source_branch, request.target_branch
            ),
            TriggerEvent::Note { request, .. } => write!(
                f,
                "note on merge request !{} ({}/{} -> {})",
                request.mr_id, request.source_repo, request.source_branch, request.target_branch
            ),
            TriggerEvent::Manual { branch } => write!(f, "manual run on '{}'", branch),
        }
    }
}
