//! Branch classification under the GitOps branching model
//!
//! A ref belongs to one of three branch classes when it matches that class's
//! pattern as a whole string. Classes are tried in the fixed order
//! development, test, production; the first match wins.

use gitops_config::BranchesConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, Result};

/// Branch class of a ref
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchClass {
    Development,
    Test,
    Production,
    Unclassified,
}

impl BranchClass {
    /// Classes the pipeline is allowed to build
    pub fn is_recognized(&self) -> bool {
        !matches!(self, BranchClass::Unclassified)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BranchClass::Development => "development",
            BranchClass::Test => "test",
            BranchClass::Production => "production",
            BranchClass::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for BranchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-string matcher for one named branch-class pattern
#[derive(Debug, Clone)]
pub struct RefMatcher {
    class: BranchClass,
    source: String,
    regex: Regex,
}

impl RefMatcher {
    /// Compile `pattern` for `class`
    ///
    /// Fails with `InvalidArgument` when the pattern is empty or not a valid
    /// regular expression.
    pub fn new(class: BranchClass, pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(PipelineError::invalid(format!(
                "{} branch pattern is empty",
                class
            )));
        }
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            PipelineError::invalid(format!("{} branch pattern is invalid: {}", class, e))
        })?;
        Ok(Self {
            class,
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn class(&self) -> BranchClass {
        self.class
    }

    /// Pattern as configured
    pub fn pattern(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, reference: &str) -> bool {
        self.regex.is_match(reference)
    }
}

/// The three configured branch-class patterns, compiled once
#[derive(Debug, Clone)]
pub struct BranchPatterns {
    development: RefMatcher,
    test: RefMatcher,
    production: RefMatcher,
}

impl BranchPatterns {
    pub fn new(development: &str, test: &str, production: &str) -> Result<Self> {
        Ok(Self {
            development: RefMatcher::new(BranchClass::Development, development)?,
            test: RefMatcher::new(BranchClass::Test, test)?,
            production: RefMatcher::new(BranchClass::Production, production)?,
        })
    }

    pub fn from_config(config: &BranchesConfig) -> Result<Self> {
        Self::new(&config.development, &config.test, &config.production)
    }

    /// Matchers in tie-break order
    fn ordered(&self) -> [&RefMatcher; 3] {
        [&self.development, &self.test, &self.production]
    }

    /// Classify `reference`; `Unclassified` when no pattern matches
    ///
    /// Fails with `InvalidArgument` only for an empty ref.
    pub fn classify(&self, reference: &str) -> Result<BranchClass> {
        if reference.is_empty() {
            return Err(PipelineError::invalid("ref to classify is empty"));
        }
        let class = self
            .ordered()
            .into_iter()
            .find(|m| m.matches(reference))
            .map(RefMatcher::class)
            .unwrap_or(BranchClass::Unclassified);
        log::debug!("Classified '{}' as {}", reference, class);
        Ok(class)
    }

    /// Classes whose pattern matches `reference`, in tie-break order
    ///
    /// More than one entry means the configured patterns overlap.
    pub fn matching_classes(&self, reference: &str) -> Vec<BranchClass> {
        self.ordered()
            .into_iter()
            .filter(|m| m.matches(reference))
            .map(RefMatcher::class)
            .collect()
    }
}

/// Classify `reference` against `patterns`
pub fn classify(reference: &str, patterns: &BranchPatterns) -> Result<BranchClass> {
    patterns.classify(reference)
}
