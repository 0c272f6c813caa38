//! Regenerating the description of an existing PR

use crate::error::{Error, Result};
use crate::generate::{GenerationContext, MessageKind, TextGenerator};
use crate::operator::Operator;
use crate::platform::PlatformService;
use crate::progress::ProgressCallback;
use crate::refine::{MessageRefinementLoop, RefineOutcome};
use crate::types::{CommitMessage, PrState, PullRequest};
use crate::vcs::VcsService;
use crate::workflow::create::change_summary;
use tracing::debug;

/// Options for `update_pr`
#[derive(Debug, Clone, Default)]
pub struct UpdatePrOptions {
    /// Remote the base branch is fetched from
    pub remote: String,
    /// PR to update; defaults to the open PR for the current branch
    pub pr_number: Option<u64>,
    /// Generate and show the text only
    pub dry_run: bool,
    /// Accept the first draft
    pub auto_confirm: bool,
    /// Extra guidance for generation
    pub hint: Option<String>,
    /// Output language
    pub language: Option<String>,
}

/// How `update_pr` ended
#[derive(Debug, Clone)]
pub enum UpdatePrOutcome {
    /// Title and description replaced
    Updated(PullRequest),
    /// Dry run; the accepted text was not used
    DryRun(CommitMessage),
    /// Operator declined the text
    Cancelled,
}

/// Regenerate title and description from the PR's current diff
///
/// The head branch must be checked out, since the diff is taken locally.
pub async fn update_pr(
    platform: &dyn PlatformService,
    vcs: &dyn VcsService,
    generator: &dyn TextGenerator,
    operator: &dyn Operator,
    progress: &dyn ProgressCallback,
    options: &UpdatePrOptions,
) -> Result<UpdatePrOutcome> {
    let branch = vcs.current_branch().await?;
    let pr = match options.pr_number {
        Some(n) => platform.get_pr(n).await?,
        None => platform
            .find_pr_for_branch(&branch)
            .await?
            .ok_or_else(|| Error::Platform(format!("no open PR for branch '{branch}'")))?,
    };

    if matches!(pr.state, PrState::Merged | PrState::Closed) {
        return Err(Error::Platform(format!(
            "PR #{} is {}; nothing to update",
            pr.number, pr.state
        )));
    }
    if branch != pr.head_ref {
        return Err(Error::WrongBranch {
            expected: pr.head_ref,
            actual: branch,
        });
    }

    vcs.fetch(&options.remote, &[pr.base_ref.as_str()]).await?;
    let upstream = format!("{}/{}", options.remote, pr.base_ref);
    let summary = change_summary(vcs, &upstream).await?;
    debug!(pr_number = pr.number, "regenerating description");

    let context = GenerationContext::new(MessageKind::PrDescription, summary)
        .with_hint(options.hint.clone())
        .with_language(options.language.clone());
    let text = match MessageRefinementLoop::new(generator, operator)
        .auto_confirm(options.auto_confirm)
        .refine(context)
        .await?
    {
        RefineOutcome::Accepted(text) => text,
        RefineOutcome::Cancelled => return Ok(UpdatePrOutcome::Cancelled),
    };
    let message = CommitMessage::from_text(&text);

    if options.dry_run {
        return Ok(UpdatePrOutcome::DryRun(message));
    }

    let updated = platform
        .update_pr(
            pr.number,
            Some(&message.title),
            Some(message.body.as_deref().unwrap_or_default()),
        )
        .await?;
    progress
        .on_message(&format!("📝 Updated PR #{}", updated.number))
        .await;
    Ok(UpdatePrOutcome::Updated(updated))
}
