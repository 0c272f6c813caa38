//! Opening a PR for the current branch

use crate::error::{Error, Result};
use crate::generate::{GenerationContext, MessageKind, TextGenerator};
use crate::operator::Operator;
use crate::platform::PlatformService;
use crate::progress::ProgressCallback;
use crate::refine::{MessageRefinementLoop, RefineOutcome};
use crate::types::{CommitMessage, NewPullRequest, PullRequest};
use crate::vcs::{PushMode, VcsService};
use tracing::{debug, warn};

/// Options for `create_pr`
#[derive(Debug, Clone, Default)]
pub struct CreatePrOptions {
    /// Remote to push to
    pub remote: String,
    /// Base branch
    pub base: String,
    /// Open as draft
    pub draft: bool,
    /// Generate and show the text only
    pub dry_run: bool,
    /// Accept the first draft
    pub auto_confirm: bool,
    /// Extra guidance for generation
    pub hint: Option<String>,
    /// Output language
    pub language: Option<String>,
    /// Reviewers to request
    pub reviewers: Vec<String>,
    /// Labels to add
    pub labels: Vec<String>,
}

/// How `create_pr` ended
#[derive(Debug, Clone)]
pub enum CreatePrOutcome {
    /// PR opened
    Created(PullRequest),
    /// An open PR already exists for the branch; nothing was changed
    AlreadyExists(PullRequest),
    /// Dry run; the accepted text was not used
    DryRun(CommitMessage),
    /// Operator declined the text
    Cancelled,
}

/// Generate a title and description, push the branch and open a PR
///
/// Nothing is pushed or created until the operator accepted the text.
/// Reviewer and label failures are warnings; the PR already exists by then.
pub async fn create_pr(
    platform: &dyn PlatformService,
    vcs: &dyn VcsService,
    generator: &dyn TextGenerator,
    operator: &dyn Operator,
    progress: &dyn ProgressCallback,
    options: &CreatePrOptions,
) -> Result<CreatePrOutcome> {
    let branch = vcs.current_branch().await?;
    if branch == options.base {
        return Err(Error::Vcs(format!(
            "'{branch}' is the base branch; check out a feature branch first"
        )));
    }

    if let Some(existing) = platform.find_pr_for_branch(&branch).await? {
        debug!(pr_number = existing.number, branch, "PR already exists");
        return Ok(CreatePrOutcome::AlreadyExists(existing));
    }

    vcs.fetch(&options.remote, &[options.base.as_str()]).await?;
    let upstream = format!("{}/{}", options.remote, options.base);
    let summary = change_summary(vcs, &upstream).await?;

    let context = GenerationContext::new(MessageKind::PrDescription, summary)
        .with_hint(options.hint.clone())
        .with_language(options.language.clone());
    let text = match MessageRefinementLoop::new(generator, operator)
        .auto_confirm(options.auto_confirm)
        .refine(context)
        .await?
    {
        RefineOutcome::Accepted(text) => text,
        RefineOutcome::Cancelled => return Ok(CreatePrOutcome::Cancelled),
    };
    let message = CommitMessage::from_text(&text);

    if options.dry_run {
        return Ok(CreatePrOutcome::DryRun(message));
    }

    progress
        .on_message(&format!("📤 Pushing {branch} to {}", options.remote))
        .await;
    vcs.push(
        &options.remote,
        &branch,
        PushMode::Normal { set_upstream: true },
    )
    .await?;

    let pr = platform
        .create_pr(&NewPullRequest {
            head: branch.clone(),
            base: options.base.clone(),
            title: message.title,
            body: message.body,
            draft: options.draft,
        })
        .await?;
    progress
        .on_message(&format!("✨ Created PR #{}: {}", pr.number, pr.title))
        .await;

    if !options.reviewers.is_empty()
        && let Err(e) = platform.add_reviewers(pr.number, &options.reviewers).await
    {
        warn!(pr_number = pr.number, error = %e, "failed to request reviewers");
        progress
            .on_message(&format!("⚠️  Could not request reviewers: {e}"))
            .await;
    }
    if !options.labels.is_empty()
        && let Err(e) = platform.add_labels(pr.number, &options.labels).await
    {
        warn!(pr_number = pr.number, error = %e, "failed to add labels");
        progress
            .on_message(&format!("⚠️  Could not add labels: {e}"))
            .await;
    }

    Ok(CreatePrOutcome::Created(pr))
}

/// Commit subjects plus the diff against `upstream`
///
/// An empty diff is an error: there is nothing to describe.
pub(crate) async fn change_summary(vcs: &dyn VcsService, upstream: &str) -> Result<String> {
    let diff = vcs.diff(upstream).await?;
    if diff.trim().is_empty() {
        return Err(Error::Vcs(format!("no changes against {upstream}")));
    }
    let subjects = vcs.log_subjects(upstream).await?;

    let mut summary = String::new();
    if !subjects.is_empty() {
        summary.push_str("Commits:\n");
        for subject in &subjects {
            summary.push_str("- ");
            summary.push_str(subject);
            summary.push('\n');
        }
        summary.push('\n');
    }
    summary.push_str(&diff);
    Ok(summary)
}
