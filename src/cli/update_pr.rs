//! Update-pr command - regenerate the description of an open PR

use crate::cli::CliProgress;
use crate::cli::context::{CommandContext, operator};
use crate::cli::style::{Stylize, check, link};
use anstream::println;
use auto_pr::error::{Error, Result};
use auto_pr::workflow::{UpdatePrOptions, UpdatePrOutcome, update_pr};
use std::path::Path;

/// Flags for the update-pr command
#[derive(Debug, Clone, Default)]
pub struct UpdateCommandOptions {
    /// PR to update
    pub pr_number: Option<u64>,
    /// Show the text without updating
    pub dry_run: bool,
    /// Accept the first draft
    pub yes: bool,
    /// Generation hint
    pub hint: Option<String>,
    /// Output language
    pub language: Option<String>,
    /// Model override
    pub model: Option<String>,
}

/// Run the update-pr command
#[allow(clippy::future_not_send)]
pub async fn run_update(
    path: &Path,
    remote: Option<&str>,
    options: UpdateCommandOptions,
    progress: &CliProgress,
) -> Result<()> {
    let ctx = CommandContext::new(path, remote).await?;
    let generator = ctx.generator(options.model.as_deref())?;
    let operator = operator();

    let update_options = UpdatePrOptions {
        remote: ctx.remote_name.clone(),
        pr_number: options.pr_number,
        dry_run: options.dry_run,
        auto_confirm: options.yes,
        hint: options.hint,
        language: ctx.language(options.language),
    };

    let outcome = update_pr(
        ctx.platform.as_ref(),
        &ctx.vcs,
        &generator,
        operator.as_ref(),
        progress,
        &update_options,
    )
    .await?;

    println!();
    match outcome {
        UpdatePrOutcome::Updated(pr) => {
            println!(
                "{} Updated {}",
                check(),
                link(&format!("PR #{}", pr.number), &pr.html_url).accent()
            );
            Ok(())
        }
        UpdatePrOutcome::DryRun(message) => {
            println!("{}", "Dry run - PR not updated".muted());
            println!();
            println!("{}", message.title.emphasis());
            if let Some(body) = message.body {
                println!();
                println!("{body}");
            }
            Ok(())
        }
        UpdatePrOutcome::Cancelled => {
            println!("{}", "Aborted".muted());
            Err(Error::Cancelled)
        }
    }
}
