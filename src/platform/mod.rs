//! PR host services
//!
//! Provides the interface the workflows use to talk to the PR host and CI
//! provider. GitHub is the only implementation.

mod detection;
mod factory;
mod github;

pub use detection::parse_repo_info;
pub use factory::create_platform_service;
pub use github::GitHubService;

use crate::error::Result;
use crate::types::{
    CheckRunSet, CommitMessage, MergeMethod, MergeResult, NewPullRequest, PlatformConfig,
    PullRequest,
};
use async_trait::async_trait;

/// Platform service trait for PR operations
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Fetch a PR with its reviews and checks
    async fn get_pr(&self, pr_number: u64) -> Result<PullRequest>;

    /// Find an existing open PR for a head branch
    async fn find_pr_for_branch(&self, head_branch: &str) -> Result<Option<PullRequest>>;

    /// Create a new PR
    async fn create_pr(&self, pr: &NewPullRequest) -> Result<PullRequest>;

    /// Update title and/or body; `None` leaves the field untouched
    async fn update_pr(
        &self,
        pr_number: u64,
        title: Option<&str>,
        body: Option<&str>,
    ) -> Result<PullRequest>;

    /// Merge a PR
    ///
    /// `head_sha` pins the commit that was checked; the host refuses the
    /// merge if the branch moved. `message` is ignored for rebase merges.
    async fn merge_pr(
        &self,
        pr_number: u64,
        method: MergeMethod,
        message: Option<&CommitMessage>,
        head_sha: &str,
    ) -> Result<MergeResult>;

    /// Current check runs for the PR's head commit
    async fn list_checks(&self, pr_number: u64) -> Result<CheckRunSet>;

    /// Re-request the given check runs
    async fn rerun_checks(&self, pr_number: u64, check_ids: &[u64]) -> Result<()>;

    /// Request reviews
    async fn add_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()>;

    /// Add labels
    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()>;

    /// Delete a branch on the host; an already missing branch is not an error
    async fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;
}
