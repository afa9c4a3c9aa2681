//! GitOps pipeline core
//!
//! Decides what a pipeline run checks out, guards merge targets with a
//! persisted lock set, and waits for code-quality analysis to yield a verdict.
//!
//! # Architecture
//!
//! ```text
//!  TriggerEvent ──► CheckoutDispatcher ──► CheckoutPlan ──► VersionControlClient
//!                        │
//!                        ▼
//!                  BranchPatterns (RefMatcher × 3)
//!
//!  BranchLockStore ──► MutualExclusionRegion ──► FileStore
//!
//!  AsyncTaskPoller ──► TaskStatusClient ──► QualityVerdict
//! ```
//!
//! Collaborators live in `gitops-client`; everything here depends on their
//! traits only, so each component is tested against hand-written mocks.
//!
//! # Example
//!
//! ```rust
//! use gitops_core::{BranchPatterns, CheckoutDispatcher, CheckoutPlan, TriggerEvent};
//!
//! let patterns = BranchPatterns::new("^develop$", "^release/.+$", "^master$")?;
//! let dispatcher = CheckoutDispatcher::new(&patterns, "git@example.com:team/app.git");
//! let plan = dispatcher.dispatch(&TriggerEvent::push("develop"))?;
//! assert!(matches!(plan, CheckoutPlan::CheckoutBranch { .. }));
//! # Ok::<(), gitops_core::PipelineError>(())
//! ```

pub mod branch;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod lock_store;
pub mod poller;
pub mod region;
pub mod report_task;

pub use branch::{classify, BranchClass, BranchPatterns, RefMatcher};
pub use dispatch::{CheckoutDispatcher, CheckoutPlan, CheckoutReport, GitOpsCheckout};
pub use error::{ErrorKind, PipelineError, Result, TaskFailureCause};
pub use event::{MergeRequestEvent, TriggerEvent};
pub use lock_store::{BranchLockStore, LockedBranchSet};
pub use poller::{AsyncTaskPoller, PollObservation, PollReport, QualityVerdict};
pub use region::{FileLockRegion, InProcessRegion, MutualExclusionRegion};
pub use report_task::ReportTask;
