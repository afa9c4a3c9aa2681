//! Locked target branches shared by all pipeline instances
//!
//! The set lives in one text file, one branch name per line. Every read and
//! every read-modify-write runs inside the same named mutual-exclusion
//! region, so concurrent lock/unlock calls cannot lose updates.

use gitops_client::FileStore;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::region::MutualExclusionRegion;

/// Ordered set of locked branch names without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockedBranchSet {
    branches: Vec<String>,
}

impl LockedBranchSet {
    /// Parse file lines; blank lines are ignored, duplicates collapse to the first
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for line in lines {
            let name = line.as_ref().trim();
            if !name.is_empty() {
                set.insert(name);
            }
        }
        set
    }

    pub fn contains(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }

    /// Append `branch`; false if it was already present
    pub fn insert(&mut self, branch: &str) -> bool {
        if self.contains(branch) {
            return false;
        }
        self.branches.push(branch.to_string());
        true
    }

    /// Remove `branch`; false if it was not present
    pub fn remove(&mut self, branch: &str) -> bool {
        let before = self.branches.len();
        self.branches.retain(|b| b != branch);
        self.branches.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn as_lines(&self) -> &[String] {
        &self.branches
    }
}

/// Persisted set of target branches that currently must not accept merges
pub struct BranchLockStore<R, F> {
    region: R,
    files: F,
    path: PathBuf,
    region_name: String,
}

impl<R: MutualExclusionRegion, F: FileStore> BranchLockStore<R, F> {
    /// `path` is the locked-branches file, `region_name` the region every
    /// instance sharing that file must use
    pub fn new(
        region: R,
        files: F,
        path: impl Into<PathBuf>,
        region_name: impl Into<String>,
    ) -> Self {
        Self {
            region,
            files,
            path: path.into(),
            region_name: region_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// False iff `target_branch` is in the persisted set
    pub fn is_allowed(&self, target_branch: &str) -> Result<bool> {
        validate_branch(target_branch)?;
        self.region.with_lock(&self.region_name, || {
            let allowed = !self.read()?.contains(target_branch);
            debug!(
                "Merges into '{}' are {}",
                target_branch,
                if allowed { "allowed" } else { "locked" }
            );
            Ok(allowed)
        })
    }

    /// Add `branches` to the set; already locked branches are skipped
    ///
    /// Returns the set as written.
    pub fn lock<S: AsRef<str>>(&self, branches: &[S]) -> Result<LockedBranchSet> {
        validate_all(branches)?;
        self.region.with_lock(&self.region_name, || {
            let mut set = self.read()?;
            for branch in branches {
                let branch = branch.as_ref();
                if set.insert(branch) {
                    info!("Locked branch '{}'", branch);
                } else {
                    info!("Branch '{}' is already locked", branch);
                }
            }
            self.write(&set)?;
            Ok(set)
        })
    }

    /// Remove `branches` from the set; branches not locked are skipped
    ///
    /// Returns the set as written.
    pub fn unlock<S: AsRef<str>>(&self, branches: &[S]) -> Result<LockedBranchSet> {
        validate_all(branches)?;
        self.region.with_lock(&self.region_name, || {
            let mut set = self.read()?;
            for branch in branches {
                let branch = branch.as_ref();
                if set.remove(branch) {
                    info!("Unlocked branch '{}'", branch);
                } else {
                    info!("Branch '{}' was not locked", branch);
                }
            }
            self.write(&set)?;
            Ok(set)
        })
    }

    /// Current set of locked branches
    pub fn locked(&self) -> Result<LockedBranchSet> {
        self.region.with_lock(&self.region_name, || self.read())
    }

    fn read(&self) -> Result<LockedBranchSet> {
        let lines = self.files.read_lines(&self.path).map_err(|e| {
            PipelineError::io(format!("reading {}", self.path.display()), e)
        })?;
        Ok(LockedBranchSet::from_lines(lines))
    }

    fn write(&self, set: &LockedBranchSet) -> Result<()> {
        self.files
            .write_lines(&self.path, set.as_lines())
            .map_err(|e| PipelineError::io(format!("writing {}", self.path.display()), e))
    }
}

/// Branch names are stored one per line, so they must be single-line and non-blank
fn validate_branch(branch: &str) -> Result<()> {
    if branch.trim().is_empty() {
        return Err(PipelineError::invalid("branch name is empty"));
    }
    if branch.trim() != branch || branch.contains(['\n', '\r']) {
        return Err(PipelineError::invalid(format!(
            "branch name {:?} has surrounding whitespace or line breaks",
            branch
        )));
    }
    Ok(())
}

fn validate_all<S: AsRef<str>>(branches: &[S]) -> Result<()> {
    branches.iter().try_for_each(|b| validate_branch(b.as_ref()))
}
