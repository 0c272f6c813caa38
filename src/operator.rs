//! Decision points that need a human
//!
//! Every prompt the workflows raise goes through [`Operator`], so the same
//! orchestration runs against a terminal, a scripted test double, or
//! [`AutoOperator`] when no terminal is attached.

use crate::checks::{CheckAction, CheckOutcome};
use crate::conflict::ConflictApproach;
use crate::error::Result;
use crate::refine::MessageDraft;
use crate::vcs::FileResolution;

/// Interactive decisions raised by the workflows
pub trait Operator: Send + Sync {
    /// Show the current draft
    fn present_draft(&self, draft: &MessageDraft);

    /// Read a raw refinement decision (`y`, `n`, `r`, `e`, or feedback)
    fn read_decision(&self) -> Result<String>;

    /// Open `current` for editing; `None` when the edit was aborted
    fn edit_text(&self, current: &str) -> Result<Option<String>>;

    /// Informational message
    fn notify(&self, message: &str);

    /// Pick how to proceed after a non-passing check verdict
    fn choose_check_action(
        &self,
        outcome: &CheckOutcome,
        allowed: &[CheckAction],
    ) -> Result<CheckAction>;

    /// Pick how to approach detected conflicts
    fn choose_conflict_approach(&self, paths: &[String]) -> Result<ConflictApproach>;

    /// Decide one conflicted file; `remaining` includes `path`
    fn choose_file_resolution(&self, path: &str, remaining: usize) -> Result<FileResolution>;

    /// Wait while the operator resolves conflicts by hand; `false` gives up
    fn wait_for_manual_resolution(&self, paths: &[String]) -> Result<bool>;

    /// Yes/no confirmation
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Non-interactive operator
///
/// Accepts drafts and confirmations, but never takes a risky choice on the
/// operator's behalf: check failures and conflicts abort.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoOperator;

impl Operator for AutoOperator {
    fn present_draft(&self, _draft: &MessageDraft) {}

    fn read_decision(&self) -> Result<String> {
        Ok("y".to_string())
    }

    fn edit_text(&self, _current: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn notify(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn choose_check_action(
        &self,
        _outcome: &CheckOutcome,
        _allowed: &[CheckAction],
    ) -> Result<CheckAction> {
        Ok(CheckAction::Abort)
    }

    fn choose_conflict_approach(&self, _paths: &[String]) -> Result<ConflictApproach> {
        Ok(ConflictApproach::Abort)
    }

    fn choose_file_resolution(&self, _path: &str, _remaining: usize) -> Result<FileResolution> {
        Ok(FileResolution::Skip)
    }

    fn wait_for_manual_resolution(&self, _paths: &[String]) -> Result<bool> {
        Ok(false)
    }

    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}
