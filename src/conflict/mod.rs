//! Merge conflict detection and resolution
//!
//! [`ConflictResolver`] detects conflicts between the PR head branch and its
//! base with a trial merge, then applies a [`ConflictStrategy`]. Any history
//! rewrite is pushed back only through the lease recorded in
//! [`ResolutionAttempt`].

mod resolver;

pub use resolver::ConflictResolver;

use crate::error::{Error, Result};
use crate::types::ConflictState;
use serde::Deserialize;

/// How conflicts are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Ask the operator
    Interactive,
    /// Rebase; give up on the first conflict
    Auto,
    /// Report conflicts without touching the branch
    Abort,
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interactive => write!(f, "interactive"),
            Self::Auto => write!(f, "auto"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

/// Operator's choice for detected conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictApproach {
    /// Rebase onto the base branch
    Rebase,
    /// Merge the base branch in
    Merge,
    /// Resolve outside the tool, then continue
    Manual,
    /// Leave the branch alone
    Abort,
}

impl std::fmt::Display for ConflictApproach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rebase => write!(f, "rebase onto base"),
            Self::Merge => write!(f, "merge base into branch"),
            Self::Manual => write!(f, "resolve manually"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

/// Tips recorded before the branch is touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionAttempt {
    /// Branch being rewritten
    pub branch: String,
    /// Local tip before the attempt
    pub pre_attempt_tip: String,
    /// Remote tip before the attempt, if the branch exists remotely
    pub remote_tip: Option<String>,
    /// Whether `remote_tip` is contained in the local history
    pub remote_in_history: bool,
}

impl ResolutionAttempt {
    /// Refuse when the remote branch has commits the local checkout lacks
    pub fn ensure_remote_in_history(&self) -> Result<()> {
        if self.remote_in_history {
            return Ok(());
        }
        Err(Error::UnsafePush {
            branch: self.branch.clone(),
            reason: format!(
                "remote tip {} is not in the local history; pull it first",
                self.remote_tip.as_deref().unwrap_or("?")
            ),
        })
    }

    /// Lease for a force push, or why pushing would be unsafe
    ///
    /// The push is allowed only when `current_tip` differs from the recorded
    /// local tip, i.e. this attempt rewrote the branch, and the remote tip it
    /// replaces is known and was already part of the local history.
    pub fn push_lease(&self, current_tip: &str) -> Result<&str> {
        if current_tip == self.pre_attempt_tip {
            return Err(Error::UnsafePush {
                branch: self.branch.clone(),
                reason: "local tip was not rewritten by this attempt".to_string(),
            });
        }
        self.ensure_remote_in_history()?;
        self.remote_tip.as_deref().ok_or_else(|| Error::UnsafePush {
            branch: self.branch.clone(),
            reason: "remote tip unknown; nothing to lease against".to_string(),
        })
    }
}

/// Result of one resolution run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictResolution {
    /// Final state
    pub state: ConflictState,
    /// Every state passed through, oldest first, ending with `state`
    pub trail: Vec<ConflictState>,
    /// Whether the branch was pushed
    pub pushed: bool,
}

impl ConflictResolution {
    fn finish(mut trail: Vec<ConflictState>, state: ConflictState, pushed: bool) -> Self {
        if trail.last() != Some(&state) {
            trail.push(state.clone());
        }
        Self {
            state,
            trail,
            pushed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt() -> ResolutionAttempt {
        ResolutionAttempt {
            branch: "feature".into(),
            pre_attempt_tip: "aaa".into(),
            remote_tip: Some("aaa".into()),
            remote_in_history: true,
        }
    }

    #[test]
    fn test_push_refused_when_tip_unchanged() {
        let err = attempt().push_lease("aaa").unwrap_err();
        assert!(matches!(err, Error::UnsafePush { ref branch, .. } if branch == "feature"));
    }

    #[test]
    fn test_push_leases_against_recorded_remote_tip() {
        assert_eq!(attempt().push_lease("bbb").unwrap(), "aaa");
    }

    #[test]
    fn test_push_refused_without_remote_tip() {
        let attempt = ResolutionAttempt {
            remote_tip: None,
            ..attempt()
        };
        assert!(attempt.push_lease("bbb").is_err());
    }

    #[test]
    fn test_push_refused_when_remote_diverged() {
        let attempt = ResolutionAttempt {
            remote_tip: Some("zzz".into()),
            remote_in_history: false,
            ..attempt()
        };
        let err = attempt.push_lease("bbb").unwrap_err();
        assert!(matches!(err, Error::UnsafePush { ref reason, .. } if reason.contains("zzz")));
    }

    #[test]
    fn test_finish_appends_final_state_once() {
        let res = ConflictResolution::finish(
            vec![ConflictState::Detected(vec!["a".into()])],
            ConflictState::Resolved,
            true,
        );
        assert_eq!(res.trail.len(), 2);
        let res = ConflictResolution::finish(vec![ConflictState::None], ConflictState::None, false);
        assert_eq!(res.trail, vec![ConflictState::None]);
    }
}
