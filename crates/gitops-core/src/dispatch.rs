//! Checkout dispatch
//!
//! Turns a `TriggerEvent` into exactly one `CheckoutPlan`, enforcing the
//! GitOps rule that only recognized branch classes are built. Rules, first
//! match wins:
//!
//! 1. merge or note event whose target branch is recognized: merge-request checkout
//! 2. push event whose branch is recognized: branch checkout
//! 3. manual run whose branch is recognized: branch checkout
//! 4. anything else: `UnsupportedWorkflow`

use gitops_client::{FileStore, MergeRequestCheckout, VersionControlClient};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::branch::{BranchClass, BranchPatterns};
use crate::error::{PipelineError, Result};
use crate::event::TriggerEvent;

/// What to check out for this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutPlan {
    CheckoutBranch {
        repo_url: String,
        branch: String,
    },
    CheckoutMergeRequest {
        mr_id: u64,
        source_repo: String,
        source_repo_url: String,
        source_branch: String,
        target_repo_url: String,
        target_branch: String,
    },
}

impl CheckoutPlan {
    /// Run the plan through the version control collaborator
    pub fn execute(&self, vcs: &dyn VersionControlClient) -> Result<()> {
        let outcome = match self {
            CheckoutPlan::CheckoutBranch { repo_url, branch } => {
                vcs.checkout_branch(repo_url, branch)
            }
            CheckoutPlan::CheckoutMergeRequest {
                mr_id,
                source_repo,
                source_repo_url,
                source_branch,
                target_repo_url,
                target_branch,
            } => vcs.checkout_merge_request(&MergeRequestCheckout {
                mr_id: *mr_id,
                source_repo,
                source_repo_url,
                source_branch,
                target_repo_url,
                target_branch,
            }),
        };
        outcome.map_err(|source| PipelineError::VersionControl {
            operation: "checkout",
            source,
        })
    }
}

/// Pure decision logic from event to plan
///
/// Holds no state between calls; the same event and patterns always yield
/// the same plan.
#[derive(Debug, Clone)]
pub struct CheckoutDispatcher<'a> {
    patterns: &'a BranchPatterns,
    repo_url: String,
}

impl<'a> CheckoutDispatcher<'a> {
    /// `repo_url` is the target repository: built for pushes and manual runs,
    /// merged into for merge requests
    pub fn new(patterns: &'a BranchPatterns, repo_url: impl Into<String>) -> Self {
        Self {
            patterns,
            repo_url: repo_url.into(),
        }
    }

    pub fn dispatch(&self, event: &TriggerEvent) -> Result<CheckoutPlan> {
        let plan = match event {
            TriggerEvent::Merge { request } | TriggerEvent::Note { request, .. }
                if self.recognized(&request.target_branch)? =>
            {
                Some(CheckoutPlan::CheckoutMergeRequest {
                    mr_id: request.mr_id,
                    source_repo: request.source_repo.clone(),
                    source_repo_url: request.source_repo_url.clone(),
                    source_branch: request.source_branch.clone(),
                    target_repo_url: self.repo_url.clone(),
                    target_branch: request.target_branch.clone(),
                })
            }
            TriggerEvent::Push { branch } | TriggerEvent::Manual { branch }
                if self.recognized(branch)? =>
            {
                Some(CheckoutPlan::CheckoutBranch {
                    repo_url: self.repo_url.clone(),
                    branch: branch.clone(),
                })
            }
            _ => None,
        };

        match plan {
            Some(plan) => {
                info!("Dispatching {} to {:?}", event, plan);
                Ok(plan)
            }
            None => Err(PipelineError::UnsupportedWorkflow {
                event: Box::new(event.clone()),
            }),
        }
    }

    fn recognized(&self, branch: &str) -> Result<bool> {
        if branch.is_empty() {
            return Ok(false);
        }
        Ok(self.patterns.classify(branch)? != BranchClass::Unclassified)
    }
}

/// Outcome of a completed checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReport {
    pub plan: CheckoutPlan,
    /// Commit message at HEAD after checkout
    pub commit_message: String,
    /// Tags pointing at HEAD after checkout
    pub tags: Vec<String>,
}

/// Checkout stage: clean workspace, dispatch, execute, inspect HEAD
pub struct GitOpsCheckout<'a> {
    dispatcher: CheckoutDispatcher<'a>,
    vcs: &'a dyn VersionControlClient,
    files: &'a dyn FileStore,
}

impl<'a> GitOpsCheckout<'a> {
    pub fn new(
        dispatcher: CheckoutDispatcher<'a>,
        vcs: &'a dyn VersionControlClient,
        files: &'a dyn FileStore,
    ) -> Self {
        Self {
            dispatcher,
            vcs,
            files,
        }
    }

    /// Clear `workspace`, then check out whatever `event` calls for
    ///
    /// The workspace is cleared even when the event is rejected, so a retried
    /// stage never sees a stale checkout.
    pub fn run(&self, event: &TriggerEvent, workspace: &Path) -> Result<CheckoutReport> {
        self.files.clear_directory(workspace).map_err(|e| {
            PipelineError::io(format!("clearing workspace {}", workspace.display()), e)
        })?;

        let plan = self.dispatcher.dispatch(event)?;
        plan.execute(self.vcs)?;

        let commit_message = self
            .vcs
            .get_commit_message("HEAD")
            .map_err(|source| PipelineError::VersionControl {
                operation: "reading HEAD commit message",
                source,
            })?;
        let tags = self
            .vcs
            .list_tags_at("HEAD")
            .map_err(|source| PipelineError::VersionControl {
                operation: "listing tags at HEAD",
                source,
            })?;
        if !tags.is_empty() {
            info!("HEAD is tagged {}", tags.join(", "));
        }

        Ok(CheckoutReport {
            plan,
            commit_message,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::event::MergeRequestEvent;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::sync::Mutex;

    const REPO: &str = "git@gitlab.example.com:team/app.git";

    fn patterns() -> BranchPatterns {
        BranchPatterns::new("^develop$", "^test$", "^release$").unwrap()
    }

    fn merge_request(target: &str) -> MergeRequestEvent {
        MergeRequestEvent {
            mr_id: 42,
            source_repo: "contrib".to_string(),
            source_repo_url: "git@gitlab.example.com:contrib/app.git".to_string(),
            source_branch: "feature/x".to_string(),
            target_branch: target.to_string(),
        }
    }

    #[test]
    fn test_push_to_development_branch() {
        let p = BranchPatterns::new("^develop$", "^test$", "^master$").unwrap();
        let plan = CheckoutDispatcher::new(&p, REPO)
            .dispatch(&TriggerEvent::push("develop"))
            .unwrap();
        assert_eq!(
            plan,
            CheckoutPlan::CheckoutBranch {
                repo_url: REPO.to_string(),
                branch: "develop".to_string(),
            }
        );
    }

    #[test]
    fn test_merge_into_production_branch() {
        let p = patterns();
        let plan = CheckoutDispatcher::new(&p, REPO)
            .dispatch(&TriggerEvent::Merge {
                request: merge_request("release"),
            })
            .unwrap();
        assert_eq!(
            plan,
            CheckoutPlan::CheckoutMergeRequest {
                mr_id: 42,
                source_repo: "contrib".to_string(),
                source_repo_url: "git@gitlab.example.com:contrib/app.git".to_string(),
                source_branch: "feature/x".to_string(),
                target_repo_url: REPO.to_string(),
                target_branch: "release".to_string(),
            }
        );
    }

    #[test]
    fn test_note_behaves_like_merge() {
        let p = patterns();
        let plan = CheckoutDispatcher::new(&p, REPO)
            .dispatch(&TriggerEvent::Note {
                request: merge_request("test"),
                comment: "rebuild".to_string(),
            })
            .unwrap();
        assert!(matches!(
            plan,
            CheckoutPlan::CheckoutMergeRequest { mr_id: 42, .. }
        ));
    }

    #[test]
    fn test_manual_run_on_recognized_branch() {
        let p = patterns();
        let plan = CheckoutDispatcher::new(&p, REPO)
            .dispatch(&TriggerEvent::manual("test"))
            .unwrap();
        assert_eq!(
            plan,
            CheckoutPlan::CheckoutBranch {
                repo_url: REPO.to_string(),
                branch: "test".to_string(),
            }
        );
    }

    #[test]
    fn test_unrecognized_branches_are_rejected() {
        let p = patterns();
        let dispatcher = CheckoutDispatcher::new(&p, REPO);

        let rejected = [
            TriggerEvent::push("feature/x"),
            TriggerEvent::manual("hotfix/typo"),
            TriggerEvent::Merge {
                request: merge_request("feature/y"),
            },
            TriggerEvent::push(""),
        ];
        for event in rejected {
            let err = dispatcher.dispatch(&event).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedWorkflow);
            match err {
                PipelineError::UnsupportedWorkflow { event: carried } => {
                    assert_eq!(*carried, event)
                }
                other => panic!("Expected UnsupportedWorkflow, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_merge_uses_target_not_source() {
        // Source branch is recognized, target is not: still rejected
        let p = patterns();
        let mut request = merge_request("feature/y");
        request.source_branch = "develop".to_string();
        let err = CheckoutDispatcher::new(&p, REPO)
            .dispatch(&TriggerEvent::Merge { request })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedWorkflow);
    }

    #[test]
    fn test_dispatch_is_idempotent() {
        let p = patterns();
        let dispatcher = CheckoutDispatcher::new(&p, REPO);
        let event = TriggerEvent::push("release");
        assert_eq!(
            dispatcher.dispatch(&event).unwrap(),
            dispatcher.dispatch(&event).unwrap()
        );
    }

    /// Mock version control client recording calls
    #[derive(Default)]
    struct MockVcs {
        calls: Mutex<Vec<String>>,
        fail_checkout: bool,
    }

    impl VersionControlClient for MockVcs {
        fn checkout_branch(&self, repo_url: &str, branch: &str) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("branch {} {}", repo_url, branch));
            if self.fail_checkout {
                anyhow::bail!("remote hung up");
            }
            Ok(())
        }

        fn checkout_merge_request(
            &self,
            request: &MergeRequestCheckout<'_>,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!(
                "mr {} {} into {}",
                request.mr_id, request.source_branch, request.target_branch
            ));
            Ok(())
        }

        fn get_commit_message(&self, reference: &str) -> anyhow::Result<String> {
            Ok(format!("message of {}", reference))
        }

        fn list_tags_at(&self, _reference: &str) -> anyhow::Result<Vec<String>> {
            Ok(vec!["v1.2.0".to_string()])
        }
    }

    /// Mock file store recording cleared directories
    #[derive(Default)]
    struct MockFiles {
        cleared: Mutex<Vec<std::path::PathBuf>>,
    }

    impl FileStore for MockFiles {
        fn read_lines(&self, _path: &Path) -> io::Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn write_lines(&self, _path: &Path, _lines: &[String]) -> io::Result<()> {
            Ok(())
        }

        fn exists(&self, _path: &Path) -> bool {
            false
        }

        fn clear_directory(&self, path: &Path) -> io::Result<()> {
            self.cleared.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn test_checkout_stage_runs_plan_and_reports_head() {
        let p = patterns();
        let vcs = MockVcs::default();
        let files = MockFiles::default();
        let stage = GitOpsCheckout::new(CheckoutDispatcher::new(&p, REPO), &vcs, &files);

        let report = stage
            .run(
                &TriggerEvent::Merge {
                    request: merge_request("release"),
                },
                Path::new("/ws"),
            )
            .unwrap();

        assert_eq!(*files.cleared.lock().unwrap(), vec![Path::new("/ws")]);
        assert_eq!(
            *vcs.calls.lock().unwrap(),
            vec!["mr 42 feature/x into release".to_string()]
        );
        assert_eq!(report.commit_message, "message of HEAD");
        assert_eq!(report.tags, vec!["v1.2.0".to_string()]);
    }

    #[test]
    fn test_checkout_stage_clears_workspace_before_rejecting() {
        let p = patterns();
        let vcs = MockVcs::default();
        let files = MockFiles::default();
        let stage = GitOpsCheckout::new(CheckoutDispatcher::new(&p, REPO), &vcs, &files);

        let err = stage
            .run(&TriggerEvent::push("feature/x"), Path::new("/ws"))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedWorkflow);
        assert_eq!(files.cleared.lock().unwrap().len(), 1);
        assert!(vcs.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_checkout_failure_is_io_failure() {
        let p = patterns();
        let vcs = MockVcs {
            fail_checkout: true,
            ..Default::default()
        };
        let files = MockFiles::default();
        let stage = GitOpsCheckout::new(CheckoutDispatcher::new(&p, REPO), &vcs, &files);

        let err = stage
            .run(&TriggerEvent::push("develop"), Path::new("/ws"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(err.to_string().contains("remote hung up"));
    }
}
