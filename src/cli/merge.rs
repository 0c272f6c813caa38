//! Merge command - wait for checks, resolve conflicts, merge and clean up

use crate::cli::CliProgress;
use crate::cli::context::{CommandContext, operator};
use crate::cli::style::{Stylize, check};
use anstream::println;
use async_trait::async_trait;
use auto_pr::conflict::ConflictStrategy;
use auto_pr::error::{Error, Result};
use auto_pr::generate::{GenerationContext, TextGenerator};
use auto_pr::merge::{MergeOptions, MergeOrchestrator};
use auto_pr::types::{MergeAttempt, MergeMethod, MergeOutcome};
use auto_pr::vcs::VcsService;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Flags for the merge-pr command; `None` falls back to config
#[derive(Debug, Clone, Default)]
pub struct MergeCommandOptions {
    /// PR to merge; defaults to the open PR for the current branch
    pub pr_number: Option<u64>,
    /// Merge method
    pub method: Option<MergeMethod>,
    /// Conflict strategy
    pub conflict_strategy: Option<ConflictStrategy>,
    /// Wait for checks
    pub wait: Option<bool>,
    /// Check timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Resolve conflicts with base first
    pub sync: bool,
    /// Delete the head branch after merging
    pub delete_branch: Option<bool>,
    /// Only generate the merge message
    pub message_only: bool,
    /// Accept the first draft and skip confirmations
    pub yes: bool,
    /// Generation hint
    pub hint: Option<String>,
    /// Output language
    pub language: Option<String>,
    /// Model override
    pub model: Option<String>,
}

/// Stand-in when no generator could be configured and none is needed
struct MissingGenerator(String);

#[async_trait]
impl TextGenerator for MissingGenerator {
    async fn generate(&self, _context: &GenerationContext) -> Result<String> {
        Err(Error::GenerationFailed(self.0.clone()))
    }
}

/// Run the merge-pr command
#[allow(clippy::future_not_send)]
pub async fn run_merge(
    path: &Path,
    remote: Option<&str>,
    options: MergeCommandOptions,
    progress: &CliProgress,
    cancel: CancellationToken,
) -> Result<()> {
    let ctx = CommandContext::new(path, remote).await?;

    let pr_number = match options.pr_number {
        Some(n) => n,
        None => {
            let branch = ctx.vcs.current_branch().await?;
            ctx.platform
                .find_pr_for_branch(&branch)
                .await?
                .map(|pr| pr.number)
                .ok_or_else(|| Error::Platform(format!("no open PR for branch '{branch}'")))?
        }
    };

    let mut merge_options = MergeOptions::from_config(&ctx.config.merge);
    if let Some(method) = options.method {
        merge_options.method = method;
    }
    if let Some(strategy) = options.conflict_strategy {
        merge_options.conflict_strategy = strategy;
    }
    if let Some(wait) = options.wait {
        merge_options.wait_for_checks = wait;
    }
    if let Some(delete) = options.delete_branch {
        merge_options.delete_branch = delete;
    }
    merge_options.sync |= options.sync;
    merge_options.check_timeout = options.timeout_secs.map(Duration::from_secs);
    merge_options.message_only = options.message_only;
    merge_options.auto_confirm = options.yes;
    merge_options.hint = options.hint;
    merge_options.language = ctx.language(options.language);

    // Rebase merges never generate text, so a missing API key is fine there
    let generator: Box<dyn TextGenerator> = match ctx.generator(options.model.as_deref()) {
        Ok(generator) => Box::new(generator),
        Err(e) if !merge_options.method.takes_message() && !merge_options.message_only => {
            Box::new(MissingGenerator(e.to_string()))
        }
        Err(e) => return Err(e),
    };
    let operator = operator();

    println!(
        "{} {}",
        "Merging".emphasis(),
        format!("PR #{pr_number} ({})", merge_options.method).accent()
    );

    let mut orchestrator = MergeOrchestrator::new(
        ctx.platform.as_ref(),
        &ctx.vcs,
        generator.as_ref(),
        operator.as_ref(),
    )
    .with_progress(progress)
    .with_check_config(ctx.check_config()?)
    .with_remote(&ctx.remote_name)
    .with_cancel(cancel);

    let attempt = orchestrator.merge(pr_number, &merge_options).await;
    progress.finish();
    let attempt = attempt?;

    print_summary(&attempt);
    match attempt.failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn print_summary(attempt: &MergeAttempt) {
    println!();
    let detail = attempt.detail.as_deref().unwrap_or_default();
    match attempt.outcome {
        MergeOutcome::Success if attempt.already_merged => {
            println!("{} {}", check(), detail.muted());
        }
        MergeOutcome::Success => {
            println!("{} {}", check(), "Merge complete!".success());
            if let Some(ref sha) = attempt.sha {
                println!("   Commit: {}", sha.accent());
            }
            if attempt.delete_branch && !attempt.branch_deleted {
                println!("   {}", "Head branch was not deleted".warn());
            }
        }
        MergeOutcome::Pending => {
            println!("{}", "Merge message (not merged):".emphasis());
            println!();
            println!("{}", attempt.message.as_deref().unwrap_or_default());
        }
        MergeOutcome::Aborted => println!("{}", "Aborted".muted()),
        MergeOutcome::BlockedByChecks
        | MergeOutcome::BlockedByConflict
        | MergeOutcome::BlockedByReview
        | MergeOutcome::Failed => {
            println!(
                "{} {}",
                format!("PR #{} {}:", attempt.pr_number, attempt.outcome).warn(),
                detail
            );
            println!(
                "   {}",
                format!(
                    "Re-run 'auto-pr merge-pr -n {}' once resolved; nothing was merged.",
                    attempt.pr_number
                )
                .muted()
            );
        }
    }
}
