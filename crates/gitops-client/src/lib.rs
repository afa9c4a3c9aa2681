//! Collaborator clients for the GitOps pipeline core
//!
//! This crate provides the narrow interfaces the pipeline core consumes,
//! together with their production implementations. The core only ever sees
//! the traits, so tests substitute scripted implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐  ┌────────────────┐  ┌───────────────────┐
//! │ VersionControlClient │  │   FileStore    │  │ TaskStatusClient  │
//! └──────────────────────┘  └────────────────┘  └───────────────────┘
//!            │                      │                     │
//!            ▼                      ▼                     ▼
//! ┌──────────────────────┐  ┌────────────────┐  ┌───────────────────┐
//! │ GitCliClient         │  │ LocalFileStore │  │ SonarClient       │
//! │ (git binary)         │  │ (atomic write) │  │ (reqwest)         │
//! └──────────────────────┘  └────────────────┘  └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use gitops_client::{SonarClient, TaskStatusClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = SonarClient::new("https://sonar.example.com", None);
//! let status = client.fetch_task("AVAn5RKqYwETbXvgas-I").await?;
//! println!("task is {}", status.status);
//! # Ok(())
//! # }
//! ```

pub mod file_store;
pub mod sonar_client;
pub mod task_client;
pub mod types;
pub mod vcs;

pub use file_store::{FileStore, LocalFileStore};
pub use sonar_client::SonarClient;
pub use task_client::TaskStatusClient;
pub use types::{TaskState, TaskStatus};
pub use vcs::{GitCliClient, MergeRequestCheckout, VersionControlClient};
