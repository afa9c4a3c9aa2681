use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GitOps pipeline driver
#[derive(Parser, Debug)]
#[command(name = "gitops-pipeline", version, about)]
pub(crate) struct Cli {
    /// Configuration file (default: discovered .gitops-pipeline.toml)
    #[arg(long, global = true, env = "GITOPS_PIPELINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Print the branch class of a ref
    Classify {
        /// Branch or ref name
        reference: String,
    },
    /// Clean the workspace and check out what the triggering event calls for
    Checkout {
        /// Branch to build when the run was not triggered by a webhook
        #[arg(long)]
        branch: Option<String>,
    },
    /// Exit 0 if merges into BRANCH are allowed, 1 if it is locked
    IsAllowed {
        branch: String,
    },
    /// Lock merge target branches
    Lock {
        #[arg(required = true)]
        branches: Vec<String>,
    },
    /// Unlock merge target branches
    Unlock {
        #[arg(required = true)]
        branches: Vec<String>,
    },
    /// List locked branches
    Locked,
    /// Wait for the code-quality analysis task and evaluate its quality gate
    QualityGate {
        /// Background task id (default: read from the scanner report)
        #[arg(long)]
        task_id: Option<String>,
        /// Seconds between task status polls
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
}
