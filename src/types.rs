//! Core types for auto-pr

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// PR state as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    /// PR is open and ready for review
    Open,
    /// PR is open as a draft
    Draft,
    /// PR was merged
    Merged,
    /// PR was closed without merging
    Closed,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Draft => write!(f, "draft"),
            Self::Merged => write!(f, "merged"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Review/approval summary for a PR
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    /// Reviewers whose latest review approves
    pub approved_by: Vec<String>,
    /// Reviewers whose latest review requests changes
    pub changes_requested_by: Vec<String>,
    /// Reviewers who were requested but have not reviewed
    pub pending: Vec<String>,
    /// Number of comment-only reviews
    pub commented: usize,
}

impl ReviewSummary {
    /// At least one approval and no outstanding change requests
    pub fn is_approved(&self) -> bool {
        !self.approved_by.is_empty() && self.changes_requested_by.is_empty()
    }

    /// Whether anyone asked for changes
    pub fn needs_changes(&self) -> bool {
        !self.changes_requested_by.is_empty()
    }

    /// Whether no review activity exists at all
    pub fn is_empty(&self) -> bool {
        self.approved_by.is_empty()
            && self.changes_requested_by.is_empty()
            && self.pending.is_empty()
            && self.commented == 0
    }
}

impl std::fmt::Display for ReviewSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "no reviews yet");
        }
        let mut parts = Vec::new();
        if !self.approved_by.is_empty() {
            parts.push(format!("approved by {}", self.approved_by.join(", ")));
        }
        if !self.changes_requested_by.is_empty() {
            parts.push(format!(
                "changes requested by {}",
                self.changes_requested_by.join(", ")
            ));
        }
        if !self.pending.is_empty() {
            parts.push(format!("waiting on {}", self.pending.join(", ")));
        }
        if self.commented > 0 {
            parts.push(format!("{} comment(s)", self.commented));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// A pull request as seen by the core
///
/// The host owns this data; the core only keeps the copy from the latest
/// fetch and never treats it as authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
    /// Current state of the PR
    pub state: PrState,
    /// Head branch name
    pub head_ref: String,
    /// Base branch name
    pub base_ref: String,
    /// Commit at the tip of the head branch
    pub head_sha: String,
    /// Whether PR can be merged (no conflicts)
    /// - `Some(true)` = mergeable
    /// - `Some(false)` = has conflicts
    /// - `None` = unknown (host still computing)
    pub mergeable: Option<bool>,
    /// Review summary
    pub reviews: ReviewSummary,
    /// Checks attached to the head commit
    pub checks: CheckRunSet,
    /// Web URL for the PR
    pub html_url: String,
}

impl PullRequest {
    /// Whether the host confirmed merge conflicts
    pub fn has_conflicts(&self) -> bool {
        self.mergeable == Some(false)
    }

    /// Human-readable reasons the PR cannot be merged right now
    pub fn blocking_reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        match self.state {
            PrState::Open => {}
            PrState::Draft => reasons.push("PR is a draft".to_string()),
            other => reasons.push(format!("PR is {other}")),
        }
        if self.has_conflicts() {
            reasons.push("Has merge conflicts".to_string());
        }
        let pending = self.checks.pending_names();
        if !pending.is_empty() {
            reasons.push(format!("Checks pending: {}", pending.join(", ")));
        }
        let flaky = self.checks.flaky_names();
        let failing: Vec<String> = self
            .checks
            .failing_names()
            .into_iter()
            .filter(|name| !flaky.contains(name))
            .collect();
        if !failing.is_empty() {
            reasons.push(format!("Checks failed: {}", failing.join(", ")));
        }
        if !flaky.is_empty() {
            reasons.push(format!("Flaky checks failed: {}", flaky.join(", ")));
        }
        if self.reviews.needs_changes() {
            reasons.push(format!(
                "Changes requested by: {}",
                self.reviews.changes_requested_by.join(", ")
            ));
        }
        reasons
    }
}

// =============================================================================
// CI checks
// =============================================================================

/// Status of a single CI check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Waiting for a runner
    Queued,
    /// Running
    InProgress,
    /// Finished successfully
    Success,
    /// Finished with a failure
    Failure,
    /// Cancelled before finishing
    Cancelled,
    /// Exceeded the CI provider's own time limit
    TimedOut,
}

impl CheckStatus {
    /// Whether no further automatic transition will happen
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::InProgress)
    }

    /// Whether this status counts as a failed check
    pub const fn is_failing(self) -> bool {
        matches!(self, Self::Failure | Self::Cancelled | Self::TimedOut)
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::InProgress => write!(f, "in progress"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Classification assigned to a check by the flaky policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckClassification {
    /// Not failing, or not yet classified
    #[default]
    Unclassified,
    /// Failing, but listed as known-unreliable
    Flaky,
    /// Failing and halts the merge
    Blocking,
}

/// A single CI check run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    /// Check name (unique within a set)
    pub name: String,
    /// Current status
    pub status: CheckStatus,
    /// Policy classification
    #[serde(default)]
    pub classification: CheckClassification,
    /// Host id, used to re-request the run
    pub id: Option<u64>,
    /// Details URL
    pub url: Option<String>,
    /// When the run started
    pub started_at: Option<DateTime<Utc>>,
    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckRun {
    /// Create an unclassified run with no timestamps
    pub fn new(name: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            name: name.into(),
            status,
            classification: CheckClassification::Unclassified,
            id: None,
            url: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Checks keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRunSet {
    runs: BTreeMap<String, CheckRun>,
}

impl CheckRunSet {
    /// Build a set from runs as listed by the host
    ///
    /// When several runs share a name (re-runs), the most recently started
    /// one wins; with equal or missing start times the later entry wins.
    pub fn from_runs(runs: impl IntoIterator<Item = CheckRun>) -> Self {
        let mut set = Self::default();
        for run in runs {
            set.insert(run);
        }
        set
    }

    /// Insert a run, keeping the newest run per name
    pub fn insert(&mut self, run: CheckRun) {
        if let Some(existing) = self.runs.get(&run.name)
            && let (Some(old), Some(new)) = (existing.started_at, run.started_at)
            && old > new
        {
            return;
        }
        self.runs.insert(run.name.clone(), run);
    }

    /// Look up a run by name
    pub fn get(&self, name: &str) -> Option<&CheckRun> {
        self.runs.get(name)
    }

    /// Iterate runs in name order
    pub fn iter(&self) -> impl Iterator<Item = &CheckRun> {
        self.runs.values()
    }

    /// Mutable iteration in name order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CheckRun> {
        self.runs.values_mut()
    }

    /// Number of runs
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Every run has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.runs.values().all(|r| r.status.is_terminal())
    }

    /// Every run succeeded
    pub fn all_passed(&self) -> bool {
        self.runs.values().all(|r| r.status == CheckStatus::Success)
    }

    /// Names of runs that have not finished
    pub fn pending_names(&self) -> Vec<String> {
        self.names_where(|r| !r.status.is_terminal())
    }

    /// Names of failing runs
    pub fn failing_names(&self) -> Vec<String> {
        self.names_where(|r| r.status.is_failing())
    }

    /// Names of runs classified as blocking
    pub fn blocking_names(&self) -> Vec<String> {
        self.names_where(|r| r.classification == CheckClassification::Blocking)
    }

    /// Names of runs classified as flaky
    pub fn flaky_names(&self) -> Vec<String> {
        self.names_where(|r| r.classification == CheckClassification::Flaky)
    }

    /// Host ids of failing runs (for re-requesting them)
    pub fn failing_ids(&self) -> Vec<u64> {
        self.runs
            .values()
            .filter(|r| r.status.is_failing())
            .filter_map(|r| r.id)
            .collect()
    }

    /// Counts for display
    pub fn summary(&self) -> CheckSummary {
        let mut summary = CheckSummary {
            total: self.runs.len(),
            ..CheckSummary::default()
        };
        for run in self.runs.values() {
            match run.status {
                CheckStatus::Success => summary.passed += 1,
                s if s.is_failing() => summary.failed += 1,
                _ => summary.pending += 1,
            }
        }
        summary
    }

    fn names_where(&self, pred: impl Fn(&CheckRun) -> bool) -> Vec<String> {
        self.runs
            .values()
            .filter(|r| pred(r))
            .map(|r| r.name.clone())
            .collect()
    }
}

/// Check counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    /// All runs
    pub total: usize,
    /// Successful runs
    pub passed: usize,
    /// Failing runs
    pub failed: usize,
    /// Runs not yet terminal
    pub pending: usize,
}

impl std::fmt::Display for CheckSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} pending",
            self.passed, self.failed, self.pending
        )
    }
}

// =============================================================================
// Conflicts
// =============================================================================

/// Conflict state of the head branch against its base
///
/// Recomputed on every merge attempt; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictState {
    /// No conflicts
    None,
    /// Conflicts found, no resolution attempted
    Detected(Vec<String>),
    /// Resolution in progress; paths still to handle
    Resolving(Vec<String>),
    /// All conflicts resolved
    Resolved,
    /// Resolution gave up; paths that remain in conflict
    Unresolved(Vec<String>),
}

impl ConflictState {
    /// Whether a merge may proceed from this state
    pub const fn allows_merge(&self) -> bool {
        matches!(self, Self::None | Self::Resolved)
    }

    /// Paths carried by this state
    pub fn paths(&self) -> &[String] {
        match self {
            Self::Detected(paths) | Self::Resolving(paths) | Self::Unresolved(paths) => paths,
            Self::None | Self::Resolved => &[],
        }
    }
}

impl std::fmt::Display for ConflictState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Detected(p) => write!(f, "detected ({} file(s))", p.len()),
            Self::Resolving(p) => write!(f, "resolving ({} remaining)", p.len()),
            Self::Resolved => write!(f, "resolved"),
            Self::Unresolved(p) => write!(f, "unresolved ({} file(s))", p.len()),
        }
    }
}

// =============================================================================
// Merge-related types
// =============================================================================

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Create a merge commit
    Merge,
    /// Squash all commits into one
    Squash,
    /// Rebase commits onto base branch
    Rebase,
}

impl MergeMethod {
    /// Whether the host records a commit message for this method
    pub const fn takes_message(self) -> bool {
        !matches!(self, Self::Rebase)
    }
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Squash => write!(f, "squash"),
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}

/// Commit title and body handed to the host merge call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitMessage {
    /// First line
    pub title: String,
    /// Remaining lines
    pub body: Option<String>,
}

impl CommitMessage {
    /// Split text into title (first non-empty line) and body
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let (title, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
        let body = rest.trim();
        Self {
            title: title.trim().to_string(),
            body: (!body.is_empty()).then(|| body.to_string()),
        }
    }
}

/// Result of a host merge operation
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// The SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation (especially on failure)
    pub message: Option<String>,
}

/// Where a merge attempt ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Not decided yet, or no merge was requested (message only)
    Pending,
    /// The host merged the PR (or it was already merged)
    Success,
    /// Checks did not pass and the operator did not override
    BlockedByChecks,
    /// Conflicts remain with the base branch
    BlockedByConflict,
    /// Change requests are outstanding or approvals are missing
    BlockedByReview,
    /// The host refused or the PR is not mergeable
    Failed,
    /// The operator declined at a decision point
    Aborted,
}

impl std::fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::BlockedByChecks => write!(f, "blocked by checks"),
            Self::BlockedByConflict => write!(f, "blocked by conflict"),
            Self::BlockedByReview => write!(f, "blocked by review"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Record of one merge attempt
#[derive(Debug)]
pub struct MergeAttempt {
    /// PR number
    pub pr_number: u64,
    /// Merge method
    pub method: MergeMethod,
    /// Outcome
    pub outcome: MergeOutcome,
    /// Whether branch deletion was requested
    pub delete_branch: bool,
    /// Accepted merge message
    pub message: Option<String>,
    /// Merge commit sha
    pub sha: Option<String>,
    /// The PR was merged before this attempt
    pub already_merged: bool,
    /// The remote head branch was deleted
    pub branch_deleted: bool,
    /// Human-readable explanation
    pub detail: Option<String>,
    /// Error behind a non-success outcome
    pub failure: Option<crate::error::Error>,
}

impl MergeAttempt {
    /// New pending attempt
    pub const fn new(pr_number: u64, method: MergeMethod, delete_branch: bool) -> Self {
        Self {
            pr_number,
            method,
            outcome: MergeOutcome::Pending,
            delete_branch,
            message: None,
            sha: None,
            already_merged: false,
            branch_deleted: false,
            detail: None,
            failure: None,
        }
    }

    /// End the attempt with an outcome and explanation
    #[must_use]
    pub fn finish(mut self, outcome: MergeOutcome, detail: impl Into<String>) -> Self {
        self.outcome = outcome;
        self.detail = Some(detail.into());
        self
    }

    /// End the attempt with an outcome caused by `error`
    #[must_use]
    pub fn fail(mut self, outcome: MergeOutcome, error: crate::error::Error) -> Self {
        self.outcome = outcome;
        self.detail = Some(error.to_string());
        self.failure = Some(error);
        self
    }

    /// Whether the PR ended up merged
    pub fn is_success(&self) -> bool {
        self.outcome == MergeOutcome::Success
    }
}

/// Fields for a new PR
#[derive(Debug, Clone, Default)]
pub struct NewPullRequest {
    /// Head branch
    pub head: String,
    /// Base branch
    pub base: String,
    /// Title
    pub title: String,
    /// Body
    pub body: Option<String>,
    /// Create as draft
    pub draft: bool,
}

/// Platform configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com)
    pub host: Option<String>,
}
