//! Version control capability
//!
//! The workflows only see [`VcsService`]; [`GitCli`] drives the `git` binary.

mod git;

pub use git::GitCli;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// History-rewriting operation that can stop on conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOperation {
    /// `git rebase`
    Rebase,
    /// `git merge`
    Merge,
}

impl std::fmt::Display for ConflictOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rebase => write!(f, "rebase"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// Result of a rebase, merge or continue step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Finished with no conflicts
    Clean,
    /// Stopped; these paths are in conflict
    Conflicted(Vec<String>),
}

/// Per-file conflict decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileResolution {
    /// Keep the PR branch's version
    KeepHead,
    /// Take the base branch's version
    TakeBase,
    /// The operator edited the file; stage it as is
    Edited,
    /// Leave the file in conflict
    Skip,
}

/// How a branch is pushed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMode {
    /// Plain push
    Normal {
        /// Record the remote branch as upstream
        set_upstream: bool,
    },
    /// `--force-with-lease=<branch>:<expected>`
    ForceWithLease {
        /// Remote tip the push is allowed to replace
        expected: String,
    },
}

/// Git operations needed by the PR workflows
#[async_trait]
pub trait VcsService: Send + Sync {
    /// Repository root
    fn root(&self) -> &Path;

    /// Name of the checked-out branch
    async fn current_branch(&self) -> Result<String>;

    /// Commit id of `HEAD`
    async fn head_commit(&self) -> Result<String>;

    /// URL of a remote
    async fn remote_url(&self, remote: &str) -> Result<String>;

    /// Commit id of `<remote>/<branch>` as last fetched, if it exists
    async fn remote_tip(&self, remote: &str, branch: &str) -> Result<Option<String>>;

    /// Whether `ancestor` is reachable from `descendant`
    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Fetch the given branches from a remote
    async fn fetch(&self, remote: &str, branches: &[&str]) -> Result<()>;

    /// No staged, unstaged or conflicted changes (untracked files ignored)
    async fn is_worktree_clean(&self) -> Result<bool>;

    /// Paths that would conflict when merging `upstream`; never mutates
    async fn trial_merge(&self, upstream: &str) -> Result<Vec<String>>;

    /// Rebase the current branch onto `upstream`
    async fn rebase(&self, upstream: &str) -> Result<OperationStatus>;

    /// Merge `upstream` into the current branch
    async fn merge(&self, upstream: &str) -> Result<OperationStatus>;

    /// Paths currently unmerged in the index
    async fn conflicted_files(&self) -> Result<Vec<String>>;

    /// Apply a decision to one conflicted path
    async fn resolve_file(
        &self,
        path: &str,
        resolution: FileResolution,
        operation: ConflictOperation,
    ) -> Result<()>;

    /// Continue a stopped rebase or conclude a merge
    async fn continue_operation(&self, operation: ConflictOperation) -> Result<OperationStatus>;

    /// Abort a stopped rebase or merge
    async fn abort_operation(&self, operation: ConflictOperation) -> Result<()>;

    /// `git reset --hard <commit>`
    async fn reset_hard(&self, commit: &str) -> Result<()>;

    /// Push a branch
    async fn push(&self, remote: &str, branch: &str, mode: PushMode) -> Result<()>;

    /// Switch branches
    async fn checkout(&self, branch: &str) -> Result<()>;

    /// Delete a local branch
    async fn delete_local_branch(&self, branch: &str) -> Result<()>;

    /// Commits (ahead, behind) of `head` relative to `base`
    async fn ahead_behind(&self, base: &str, head: &str) -> Result<(usize, usize)>;

    /// Diff of `HEAD` against the merge base with `base`
    async fn diff(&self, base: &str) -> Result<String>;

    /// Commit subjects in `base..HEAD`, oldest first
    async fn log_subjects(&self, base: &str) -> Result<Vec<String>>;
}
