//! Error types for auto-pr

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by auto-pr
#[derive(Debug, Error)]
pub enum Error {
    /// Polling the CI provider kept failing after all retries
    #[error("polling checks failed after {attempts} attempt(s): {message}")]
    Polling {
        /// Number of attempts made
        attempts: u32,
        /// Last error seen
        message: String,
    },

    /// Blocking checks failed
    #[error("blocking check(s) failed on PR #{pr_number}: {}", checks.join(", "))]
    BlockingChecks {
        /// PR number
        pr_number: u64,
        /// Names of the failing checks
        checks: Vec<String>,
    },

    /// Only checks from the flaky allow-list failed
    #[error("flaky check(s) failed on PR #{pr_number}: {}", checks.join(", "))]
    FlakyChecks {
        /// PR number
        pr_number: u64,
        /// Names of the failing checks
        checks: Vec<String>,
    },

    /// Checks were still running when the timeout elapsed
    #[error("checks still pending on PR #{pr_number} after {timeout_secs}s: {}", pending.join(", "))]
    ChecksTimedOut {
        /// PR number
        pr_number: u64,
        /// Configured timeout
        timeout_secs: u64,
        /// Names of the checks still running
        pending: Vec<String>,
    },

    /// Merge conflicts remain after the resolution attempt
    #[error("unresolved conflicts with {base}: {}", paths.join(", "))]
    ConflictUnresolved {
        /// Base branch
        base: String,
        /// Paths still in conflict
        paths: Vec<String>,
    },

    /// Reviews do not allow merging yet
    #[error("PR #{pr_number} is not approved: {}", review_gap(*required, *approved, changes_requested_by))]
    ReviewRequired {
        /// PR number
        pr_number: u64,
        /// Approvals required by configuration
        required: usize,
        /// Approvals present
        approved: usize,
        /// Reviewers with outstanding change requests
        changes_requested_by: Vec<String>,
    },

    /// Text generation failed
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Generic PR host error
    #[error("platform error: {0}")]
    Platform(String),

    /// PR not found on the host
    #[error("pull request #{0} not found")]
    PrNotFound(u64),

    /// Git command failed
    #[error("git error: {0}")]
    Vcs(String),

    /// The PR head branch is not checked out
    #[error("expected branch '{expected}' to be checked out, found '{actual}'")]
    WrongBranch {
        /// Branch that must be checked out
        expected: String,
        /// Branch that is checked out
        actual: String,
    },

    /// Worktree has uncommitted changes
    #[error("working tree has uncommitted changes; commit or stash them first")]
    DirtyWorktree,

    /// Force push refused because this attempt did not rewrite the branch
    #[error("refusing to force-push '{branch}': {reason}")]
    UnsafePush {
        /// Branch that would have been pushed
        branch: String,
        /// Why the push was refused
        reason: String,
    },

    /// Remote URL could not be parsed
    #[error("unrecognized remote URL: {0}")]
    RemoteUrl(String),

    /// Authentication error
    #[error("authentication error: {0}")]
    Auth(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation cancelled by the operator
    #[error("operation cancelled")]
    Cancelled,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable failure classification reported to the caller
    pub const fn classification(&self) -> &'static str {
        match self {
            Self::Polling { .. } => "polling_error",
            Self::BlockingChecks { .. } => "blocking_check_failure",
            Self::FlakyChecks { .. } => "flaky_check_failure",
            Self::ChecksTimedOut { .. } => "timed_out",
            Self::ConflictUnresolved { .. } => "conflict_unresolved",
            Self::ReviewRequired { .. } => "review_required",
            Self::GenerationFailed(_) => "generation_failed",
            Self::GitHubApi(_) | Self::Platform(_) | Self::PrNotFound(_) => "host_api_error",
            Self::Vcs(_) | Self::WrongBranch { .. } | Self::DirtyWorktree | Self::UnsafePush { .. } => {
                "vcs_error"
            }
            Self::RemoteUrl(_) | Self::Auth(_) | Self::Config(_) => "configuration_error",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Process exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Polling { .. } | Self::GitHubApi(_) | Self::Platform(_) | Self::PrNotFound(_) => 7,
            Self::ConflictUnresolved { .. } => 8,
            Self::ReviewRequired { .. } => 6,
            Self::BlockingChecks { .. } | Self::FlakyChecks { .. } | Self::ChecksTimedOut { .. } => 9,
            Self::GenerationFailed(_) => 5,
            Self::Vcs(_) | Self::WrongBranch { .. } | Self::DirtyWorktree | Self::UnsafePush { .. } => {
                4
            }
            Self::RemoteUrl(_) | Self::Auth(_) | Self::Config(_) => 3,
            Self::Cancelled => 130,
            Self::Internal(_) => 1,
        }
    }
}

fn review_gap(required: usize, approved: usize, changes_requested_by: &[String]) -> String {
    if changes_requested_by.is_empty() {
        format!("{approved} of {required} required approval(s)")
    } else {
        format!("changes requested by {}", changes_requested_by.join(", "))
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        Self::GitHubApi(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Platform(err.to_string())
    }
}
