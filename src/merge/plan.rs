//! Merge planning - pure decisions over already-fetched PR state
//!
//! Nothing here talks to the host or the repository, so every branch of the
//! orchestrator's decision making can be unit tested from plain values.

use crate::error::{Error, Result};
use crate::types::{MergeMethod, PrState, PullRequest};

/// What to do with a PR before any checks run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precheck {
    /// Open and ready
    Proceed,
    /// Nothing to do; report success without touching the host
    AlreadyMerged,
    /// Cannot merge a closed PR
    Closed,
    /// Draft PRs must be marked ready first
    Draft,
}

/// Decide whether a merge attempt should start at all
pub fn precheck(pr: &PullRequest) -> Precheck {
    match pr.state {
        PrState::Merged => Precheck::AlreadyMerged,
        PrState::Closed => Precheck::Closed,
        PrState::Draft => Precheck::Draft,
        PrState::Open => Precheck::Proceed,
    }
}

/// Refuse while change requests are outstanding or approvals are short
pub fn review_gate(pr: &PullRequest, required_approvals: usize) -> Result<()> {
    let reviews = &pr.reviews;
    let approved = reviews.approved_by.len();
    if reviews.needs_changes() || approved < required_approvals {
        return Err(Error::ReviewRequired {
            pr_number: pr.number,
            required: required_approvals,
            approved,
            changes_requested_by: reviews.changes_requested_by.clone(),
        });
    }
    Ok(())
}

/// Host's view of whether the head merges cleanly into the base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mergeability {
    /// No conflicts
    Clean,
    /// Host reports conflicts
    Conflicted,
    /// Host is still computing
    Unknown,
}

impl Mergeability {
    /// Read the tri-state flag off a PR
    pub const fn of(pr: &PullRequest) -> Self {
        match pr.mergeable {
            Some(true) => Self::Clean,
            Some(false) => Self::Conflicted,
            None => Self::Unknown,
        }
    }
}

/// Whether the merge method needs a generated commit message
pub const fn needs_message(method: MergeMethod) -> bool {
    method.takes_message()
}

/// Material the merge message is generated from
///
/// Commit subjects are listed oldest first when known.
pub fn merge_summary(pr: &PullRequest, subjects: &[String]) -> String {
    let mut summary = format!("Pull request #{}: {}\n", pr.number, pr.title);
    summary.push_str(&format!("Merging {} into {}\n", pr.head_ref, pr.base_ref));
    if let Some(body) = pr.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        summary.push_str("\nDescription:\n");
        summary.push_str(body);
        summary.push('\n');
    }
    if !subjects.is_empty() {
        summary.push_str("\nCommits:\n");
        for subject in subjects {
            summary.push_str("- ");
            summary.push_str(subject);
            summary.push('\n');
        }
    }
    summary
}

/// Prompt shown before a rebase merge, which carries no message
pub fn rebase_confirmation(pr: &PullRequest) -> String {
    format!(
        "Rebase-merge PR #{} ({} -> {})?",
        pr.number, pr.head_ref, pr.base_ref
    )
}
