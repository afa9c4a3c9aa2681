//! Version control client trait and git CLI implementation

use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Merge request to check out with a pre-build merge into its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestCheckout<'a> {
    pub mr_id: u64,
    /// Remote name of the source repository
    pub source_repo: &'a str,
    pub source_repo_url: &'a str,
    pub source_branch: &'a str,
    pub target_repo_url: &'a str,
    pub target_branch: &'a str,
}

/// Version control operations used by the checkout stage
///
/// All failures are fatal for the calling pipeline instance.
pub trait VersionControlClient: Send + Sync {
    /// Check out `branch` of the repository at `repo_url`
    fn checkout_branch(&self, repo_url: &str, branch: &str) -> Result<()>;

    /// Check out the target branch and merge the merge request's source branch into it
    fn checkout_merge_request(&self, request: &MergeRequestCheckout<'_>) -> Result<()>;

    /// Full commit message of `reference`
    fn get_commit_message(&self, reference: &str) -> Result<String>;

    /// Tags pointing at `reference`
    fn list_tags_at(&self, reference: &str) -> Result<Vec<String>>;
}

/// Git client shelling out to the `git` binary inside one working directory
#[derive(Debug, Clone)]
pub struct GitCliClient {
    workdir: PathBuf,
    user_name: String,
    user_email: String,
}

impl GitCliClient {
    /// Create a client operating in `workdir`
    ///
    /// The identity is only used for the merge commit of a merge request checkout.
    pub fn new(
        workdir: impl Into<PathBuf>,
        user_name: impl Into<String>,
        user_email: impl Into<String>,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            user_name: user_name.into(),
            user_email: user_email.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run git in the working directory; error unless it exits successfully
    fn git(&self, args: &[&str]) -> Result<Output> {
        debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.workdir)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .context("Failed to run git")?;

        if !output.status.success() {
            bail!(
                "git {} failed ({}): {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output)
    }

    /// Run git and capture trimmed stdout
    fn git_stdout(&self, args: &[&str]) -> Result<String> {
        let output = self.git(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn ensure_repository(&self, origin_url: &str) -> Result<()> {
        std::fs::create_dir_all(&self.workdir)
            .with_context(|| format!("Failed to create {}", self.workdir.display()))?;
        self.git(&["init", "--quiet"])?;
        if self.git(&["remote", "get-url", "origin"]).is_ok() {
            self.git(&["remote", "set-url", "origin", origin_url])?;
        } else {
            self.git(&["remote", "add", "origin", origin_url])?;
        }
        Ok(())
    }
}

impl VersionControlClient for GitCliClient {
    fn checkout_branch(&self, repo_url: &str, branch: &str) -> Result<()> {
        info!("Checking out {} from {}", branch, repo_url);
        self.ensure_repository(repo_url)?;
        // Tags come along so tags at the checked-out commit can be listed
        let tracking = format!("refs/remotes/origin/{}", branch);
        let refspec = format!("+refs/heads/{}:{}", branch, tracking);
        self.git(&["fetch", "--quiet", "--force", "--tags", "origin", &refspec])?;
        self.git(&["checkout", "--quiet", "-B", branch, &tracking])?;
        Ok(())
    }

    fn checkout_merge_request(&self, request: &MergeRequestCheckout<'_>) -> Result<()> {
        info!(
            "Checking out merge request !{} ({}/{} into {})",
            request.mr_id, request.source_repo, request.source_branch, request.target_branch
        );
        self.checkout_branch(request.target_repo_url, request.target_branch)?;

        let source_remote = if request.source_repo.is_empty() || request.source_repo == "origin" {
            "source"
        } else {
            request.source_repo
        };
        if self.git(&["remote", "get-url", source_remote]).is_ok() {
            self.git(&["remote", "set-url", source_remote, request.source_repo_url])?;
        } else {
            self.git(&["remote", "add", source_remote, request.source_repo_url])?;
        }
        self.git(&["fetch", "--quiet", source_remote, request.source_branch])?;

        let message = format!(
            "Merge branch '{}' into '{}' (merge request !{})",
            request.source_branch, request.target_branch, request.mr_id
        );
        let name = format!("user.name={}", self.user_name);
        let email = format!("user.email={}", self.user_email);
        self.git(&[
            "-c",
            &name,
            "-c",
            &email,
            "merge",
            "--no-ff",
            "--quiet",
            "-m",
            &message,
            "FETCH_HEAD",
        ])?;
        Ok(())
    }

    fn get_commit_message(&self, reference: &str) -> Result<String> {
        self.git_stdout(&["log", "-1", "--format=%B", reference])
    }

    fn list_tags_at(&self, reference: &str) -> Result<Vec<String>> {
        let out = self.git_stdout(&["tag", "--points-at", reference])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}
