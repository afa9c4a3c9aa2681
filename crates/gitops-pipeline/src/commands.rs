//! Subcommand implementations
//!
//! Each command wires configuration and collaborators into one core
//! component and prints its result to stdout.

use gitops_client::{FileStore, GitCliClient, LocalFileStore, SonarClient};
use gitops_config::PipelineConfig;
use gitops_core::{
    AsyncTaskPoller, BranchLockStore, BranchPatterns, CheckoutDispatcher, CheckoutPlan,
    FileLockRegion, GitOpsCheckout, PipelineError, QualityVerdict, ReportTask, Result,
    TriggerEvent,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Command;

/// How a successful command wants the process to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    /// `is-allowed` answered "locked"
    Locked,
}

/// `config_path` is the file `config` was loaded from, if any
pub(crate) fn run(
    command: Command,
    config: &PipelineConfig,
    config_path: Option<&Path>,
) -> Result<Outcome> {
    match command {
        Command::Classify { reference } => {
            let patterns = BranchPatterns::from_config(&config.branches)?;
            println!("{}", patterns.classify(&reference)?);
            Ok(Outcome::Success)
        }
        Command::Checkout { branch } => checkout(branch, config, config_path),
        Command::IsAllowed { branch } => {
            if lock_store(config).is_allowed(&branch)? {
                println!("allowed");
                Ok(Outcome::Success)
            } else {
                println!("locked");
                Ok(Outcome::Locked)
            }
        }
        Command::Lock { branches } => {
            let set = lock_store(config).lock(branches.as_slice())?;
            print_lines(set.iter());
            Ok(Outcome::Success)
        }
        Command::Unlock { branches } => {
            let set = lock_store(config).unlock(branches.as_slice())?;
            print_lines(set.iter());
            Ok(Outcome::Success)
        }
        Command::Locked => {
            print_lines(lock_store(config).locked()?.iter());
            Ok(Outcome::Success)
        }
        Command::QualityGate { task_id, interval } => {
            let runtime = tokio::runtime::Runtime::new()
                .map_err(|e| PipelineError::Io {
                    context: "starting async runtime".to_string(),
                    source: e,
                })?;
            runtime.block_on(quality_gate(task_id, interval, config))
        }
    }
}

fn checkout(
    branch: Option<String>,
    config: &PipelineConfig,
    config_path: Option<&Path>,
) -> Result<Outcome> {
    let repo = &config.repository;
    if repo.url.trim().is_empty() {
        return Err(PipelineError::InvalidArgument(
            "repository.url is not configured".to_string(),
        ));
    }

    let manual_branch = branch.as_deref().or(repo.manual_branch.as_deref());
    let event = TriggerEvent::from_env(manual_branch)?;
    log::info!("Triggered by {}", event);

    let patterns = BranchPatterns::from_config(&config.branches)?;
    let vcs = GitCliClient::new(
        &repo.workspace,
        &repo.merge_user_name,
        &repo.merge_user_email,
    );
    let files = LocalFileStore;
    let stage = GitOpsCheckout::new(
        CheckoutDispatcher::new(&patterns, repo.url.as_str()),
        &vcs,
        &files,
    );

    // Later steps of the same job must find the config the checkout ran with
    let preserved = PreservedConfig::capture(&files, config_path, &repo.workspace)?;
    let report = stage.run(&event, &repo.workspace)?;
    if let Some(preserved) = &preserved {
        preserved.restore(&files)?;
    }
    match &report.plan {
        CheckoutPlan::CheckoutBranch { branch, .. } => println!("checked out {}", branch),
        CheckoutPlan::CheckoutMergeRequest {
            mr_id,
            target_branch,
            ..
        } => println!("checked out merge request !{} into {}", mr_id, target_branch),
    }
    println!("{}", report.commit_message.trim_end());
    if !report.tags.is_empty() {
        println!("tags: {}", report.tags.join(" "));
    }
    Ok(Outcome::Success)
}

/// Config file inside the workspace, kept across the workspace clean-up
#[derive(Debug, Clone, PartialEq, Eq)]
struct PreservedConfig {
    path: PathBuf,
    lines: Vec<String>,
}

impl PreservedConfig {
    /// Snapshot `config_path` when it lies inside `workspace`
    fn capture(
        files: &dyn FileStore,
        config_path: Option<&Path>,
        workspace: &Path,
    ) -> Result<Option<Self>> {
        let Some(path) = config_path else {
            return Ok(None);
        };
        let (Ok(path), Ok(workspace)) = (path.canonicalize(), workspace.canonicalize()) else {
            return Ok(None);
        };
        if !path.starts_with(&workspace) {
            return Ok(None);
        }
        let lines = files.read_lines(&path).map_err(|e| PipelineError::Io {
            context: format!("reading {}", path.display()),
            source: e,
        })?;
        log::debug!("Keeping {} across the workspace clean-up", path.display());
        Ok(Some(Self { path, lines }))
    }

    /// Write the snapshot back unless the checkout brought its own copy
    fn restore(&self, files: &dyn FileStore) -> Result<bool> {
        if files.exists(&self.path) {
            return Ok(false);
        }
        files
            .write_lines(&self.path, &self.lines)
            .map_err(|e| PipelineError::Io {
                context: format!("restoring {}", self.path.display()),
                source: e,
            })?;
        log::info!("Restored {} after checkout", self.path.display());
        Ok(true)
    }
}

fn lock_store(config: &PipelineConfig) -> BranchLockStore<FileLockRegion, LocalFileStore> {
    let locks = &config.locks;
    BranchLockStore::new(
        FileLockRegion::new(
            &locks.region_dir,
            Duration::from_secs(locks.acquire_timeout_secs),
        ),
        LocalFileStore,
        &locks.file,
        locks.region.as_str(),
    )
}

async fn quality_gate(
    task_id: Option<String>,
    interval: Option<u64>,
    config: &PipelineConfig,
) -> Result<Outcome> {
    let quality = &config.quality;

    // The scanner report names the task and, when unconfigured, the server
    let (task_id, reported_server) = match task_id {
        Some(id) => (id, None),
        None => {
            let report = ReportTask::read(&LocalFileStore, &quality.report_task_file)?;
            (report.task_id, report.server_url)
        }
    };
    let server_url = Some(quality.server_url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .or(reported_server)
        .ok_or_else(|| {
            PipelineError::InvalidArgument("quality.server_url is not configured".to_string())
        })?;

    let token = std::env::var(&quality.token_env).ok();
    if token.is_none() {
        log::debug!("{} is not set, querying without authentication", quality.token_env);
    }

    let mut poller = AsyncTaskPoller::from_config(SonarClient::new(server_url, token), quality);
    if let Some(secs) = interval {
        poller = poller.with_interval(Duration::from_secs(secs));
    }

    log::info!(
        "Waiting for analysis task {} (every {:?})",
        task_id,
        poller.interval()
    );
    match poller.wait_for_quality_result(&task_id).await {
        Ok(report) => {
            log::info!("Task {} finished after {} polls", task_id, report.polls);
            println!("{}", report.verdict);
            Ok(Outcome::Success)
        }
        Err(err) => {
            if let Some(verdict) = QualityVerdict::from_error(&err) {
                println!("{}", verdict);
            }
            Err(err)
        }
    }
}

fn print_lines<'a>(lines: impl Iterator<Item = &'a str>) {
    for line in lines {
        println!("{}", line);
    }
}
