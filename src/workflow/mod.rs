//! Per-PR lifecycle
//!
//! Nothing is stored between runs: the state is derived from the host every
//! time, so a restarted process picks up wherever the PR actually is.
//! [`create_pr`] and [`update_pr`] move a branch into and through the open
//! states; merging lives in [`crate::merge`].

mod create;
mod update;

pub use create::{CreatePrOptions, CreatePrOutcome, create_pr};
pub use update::{UpdatePrOptions, UpdatePrOutcome, update_pr};

use crate::checks::FlakyPolicy;
use crate::error::Result;
use crate::platform::PlatformService;
use crate::types::{PrState, PullRequest, ReviewSummary};
use crate::vcs::VcsService;
use serde::Serialize;
use tracing::{debug, warn};

/// Lifecycle state of the PR for a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// No open PR for the branch
    NoPr,
    /// Open, nothing more specific applies
    PrOpen,
    /// Draft PR
    PrDraft,
    /// At least one check still running
    ChecksPending,
    /// Every check passed
    ChecksPassed,
    /// Host reports conflicts with the base
    Conflict,
    /// Merged
    Merged,
    /// Closed without merging
    Closed,
}

impl WorkflowState {
    /// No further transition without outside action
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Merged | Self::Closed)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPr => write!(f, "no PR"),
            Self::PrOpen => write!(f, "open"),
            Self::PrDraft => write!(f, "draft"),
            Self::ChecksPending => write!(f, "checks pending"),
            Self::ChecksPassed => write!(f, "checks passed"),
            Self::Conflict => write!(f, "conflict"),
            Self::Merged => write!(f, "merged"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Derive the state of a PR
///
/// Precedence: merged, closed, draft, conflict, checks pending, checks
/// passed, open. A PR with no checks at all is plain open.
pub fn derive_state(pr: Option<&PullRequest>) -> WorkflowState {
    let Some(pr) = pr else {
        return WorkflowState::NoPr;
    };
    match pr.state {
        PrState::Merged => WorkflowState::Merged,
        PrState::Closed => WorkflowState::Closed,
        PrState::Draft => WorkflowState::PrDraft,
        PrState::Open if pr.has_conflicts() => WorkflowState::Conflict,
        PrState::Open if !pr.checks.is_terminal() => WorkflowState::ChecksPending,
        PrState::Open if !pr.checks.is_empty() && pr.checks.all_passed() => {
            WorkflowState::ChecksPassed
        }
        PrState::Open => WorkflowState::PrOpen,
    }
}

/// Everything `status` shows
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Branch the report is for
    pub branch: String,
    /// Derived state
    pub state: WorkflowState,
    /// The PR, if any
    pub pr: Option<PullRequest>,
    /// Commits on the branch not on the base
    pub ahead: Option<usize>,
    /// Commits on the base not on the branch
    pub behind: Option<usize>,
    /// Review summary
    pub reviews: ReviewSummary,
    /// Why the PR cannot be merged now
    pub blocking_reasons: Vec<String>,
    /// Suggested next command
    pub next_command: Option<String>,
}

impl StatusReport {
    /// Build a report from already-fetched parts
    pub fn new(
        branch: &str,
        pr: Option<PullRequest>,
        ahead_behind: Option<(usize, usize)>,
    ) -> Self {
        let state = derive_state(pr.as_ref());
        let reviews = pr.as_ref().map(|p| p.reviews.clone()).unwrap_or_default();
        let blocking_reasons = pr.as_ref().map(PullRequest::blocking_reasons).unwrap_or_default();
        let next_command = next_command(state, pr.as_ref());
        Self {
            branch: branch.to_string(),
            state,
            pr,
            ahead: ahead_behind.map(|(a, _)| a),
            behind: ahead_behind.map(|(_, b)| b),
            reviews,
            blocking_reasons,
            next_command,
        }
    }

    /// Conflicts, or an open PR with failing checks or change requests
    pub fn needs_attention(&self) -> bool {
        match (self.state, &self.pr) {
            (WorkflowState::Conflict, _) => true,
            (WorkflowState::PrOpen, Some(pr)) => {
                !pr.checks.failing_names().is_empty() || pr.reviews.needs_changes()
            }
            _ => false,
        }
    }
}

/// Command that moves the PR forward from `state`
pub fn next_command(state: WorkflowState, pr: Option<&PullRequest>) -> Option<String> {
    let number = pr.map(|p| p.number);
    match (state, number) {
        (WorkflowState::NoPr, _) => Some("auto-pr create-pr".to_string()),
        (WorkflowState::Conflict, Some(n)) => Some(format!("auto-pr merge-pr -n {n} --sync")),
        (WorkflowState::PrDraft, Some(n)) => Some(format!("auto-pr update-pr -n {n}")),
        (WorkflowState::Merged | WorkflowState::Closed, _) | (_, None) => None,
        (_, Some(n)) if pr.is_some_and(|p| p.reviews.needs_changes()) => {
            Some(format!("auto-pr update-pr -n {n}"))
        }
        (_, Some(n)) => Some(format!("auto-pr merge-pr -n {n}")),
    }
}

/// Materialize the status of `branch`, or of PR `pr_number` when given
///
/// Failing checks are classified with `flaky` the same way the merge gate
/// classifies them. Ahead/behind counts are measured against
/// `<remote>/<base>` and left out when the repository cannot answer.
pub async fn status(
    platform: &dyn PlatformService,
    vcs: &dyn VcsService,
    remote: &str,
    branch: &str,
    pr_number: Option<u64>,
    flaky: &FlakyPolicy,
) -> Result<StatusReport> {
    let mut pr = match pr_number {
        Some(n) => Some(platform.get_pr(n).await?),
        None => match platform.find_pr_for_branch(branch).await? {
            // The branch lookup is shallow; fetch checks and reviews too
            Some(found) => Some(platform.get_pr(found.number).await?),
            None => None,
        },
    };

    if let Some(pr) = pr.as_mut() {
        flaky.classify(&mut pr.checks);
    }

    let ahead_behind = match &pr {
        Some(pr) if matches!(pr.state, PrState::Open | PrState::Draft) => {
            let base = format!("{remote}/{}", pr.base_ref);
            match vcs.ahead_behind(&base, &pr.head_ref).await {
                Ok(counts) => Some(counts),
                Err(e) => {
                    warn!(base, head = %pr.head_ref, error = %e, "ahead/behind unavailable");
                    None
                }
            }
        }
        _ => None,
    };

    let report = StatusReport::new(branch, pr, ahead_behind);
    debug!(branch, state = %report.state, "status derived");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckRun, CheckRunSet, CheckStatus};

    fn pr(state: PrState, mergeable: Option<bool>, checks: &[CheckStatus]) -> PullRequest {
        PullRequest {
            number: 12,
            title: "t".into(),
            body: None,
            state,
            head_ref: "feat".into(),
            base_ref: "main".into(),
            head_sha: "abc".into(),
            mergeable,
            reviews: ReviewSummary::default(),
            checks: CheckRunSet::from_runs(
                checks
                    .iter()
                    .enumerate()
                    .map(|(i, s)| CheckRun::new(&format!("check-{i}"), *s)),
            ),
            html_url: String::new(),
        }
    }

    #[test]
    fn test_precedence() {
        use CheckStatus::{InProgress, Success};
        assert_eq!(derive_state(None), WorkflowState::NoPr);
        assert_eq!(
            derive_state(Some(&pr(PrState::Merged, Some(false), &[InProgress]))),
            WorkflowState::Merged
        );
        assert_eq!(
            derive_state(Some(&pr(PrState::Draft, Some(false), &[InProgress]))),
            WorkflowState::PrDraft
        );
        assert_eq!(
            derive_state(Some(&pr(PrState::Open, Some(false), &[InProgress]))),
            WorkflowState::Conflict
        );
        assert_eq!(
            derive_state(Some(&pr(PrState::Open, None, &[Success, InProgress]))),
            WorkflowState::ChecksPending
        );
        assert_eq!(
            derive_state(Some(&pr(PrState::Open, Some(true), &[Success]))),
            WorkflowState::ChecksPassed
        );
        assert_eq!(
            derive_state(Some(&pr(PrState::Open, Some(true), &[]))),
            WorkflowState::PrOpen
        );
    }

    #[test]
    fn test_failing_checks_need_attention() {
        let report = StatusReport::new(
            "feat",
            Some(pr(PrState::Open, Some(true), &[CheckStatus::Failure])),
            Some((2, 0)),
        );
        assert_eq!(report.state, WorkflowState::PrOpen);
        assert!(report.needs_attention());
        assert_eq!(report.next_command.as_deref(), Some("auto-pr merge-pr -n 12"));
        assert_eq!(report.ahead, Some(2));
    }

    #[test]
    fn test_terminal_states_have_no_next_command() {
        let report = StatusReport::new("feat", Some(pr(PrState::Closed, None, &[])), None);
        assert!(report.state.is_terminal());
        assert!(report.next_command.is_none());
        assert!(!report.needs_attention());
    }

    #[test]
    fn test_no_pr_suggests_create() {
        let report = StatusReport::new("feat", None, None);
        assert_eq!(report.next_command.as_deref(), Some("auto-pr create-pr"));
    }
}
