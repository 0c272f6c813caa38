//! Create-pr command - describe the branch and open a PR

use crate::cli::CliProgress;
use crate::cli::context::{CommandContext, operator};
use crate::cli::style::{Stylize, check, link};
use anstream::println;
use auto_pr::error::{Error, Result};
use auto_pr::workflow::{CreatePrOptions, CreatePrOutcome, create_pr};
use std::path::Path;

/// Flags for the create-pr command
#[derive(Debug, Clone, Default)]
pub struct CreateCommandOptions {
    /// Base branch; defaults to config
    pub base: Option<String>,
    /// Open as draft
    pub draft: bool,
    /// Show the text without pushing or creating
    pub dry_run: bool,
    /// Accept the first draft
    pub yes: bool,
    /// Generation hint
    pub hint: Option<String>,
    /// Output language
    pub language: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Extra reviewers
    pub reviewers: Vec<String>,
    /// Extra labels
    pub labels: Vec<String>,
}

/// Run the create-pr command
#[allow(clippy::future_not_send)]
pub async fn run_create(
    path: &Path,
    remote: Option<&str>,
    options: CreateCommandOptions,
    progress: &CliProgress,
) -> Result<()> {
    let ctx = CommandContext::new(path, remote).await?;
    let generator = ctx.generator(options.model.as_deref())?;
    let operator = operator();

    let pr_config = &ctx.config.pr;
    let mut reviewers = pr_config.reviewers.clone();
    reviewers.extend(options.reviewers);
    let mut labels = pr_config.labels.clone();
    labels.extend(options.labels);

    let create_options = CreatePrOptions {
        remote: ctx.remote_name.clone(),
        base: options.base.unwrap_or_else(|| pr_config.base.clone()),
        draft: options.draft || pr_config.draft,
        dry_run: options.dry_run,
        auto_confirm: options.yes,
        hint: options.hint,
        language: ctx.language(options.language),
        reviewers,
        labels,
    };

    let outcome = create_pr(
        ctx.platform.as_ref(),
        &ctx.vcs,
        &generator,
        operator.as_ref(),
        progress,
        &create_options,
    )
    .await?;

    println!();
    match outcome {
        CreatePrOutcome::Created(pr) => {
            println!(
                "{} Created {} {}",
                check(),
                link(&format!("PR #{}", pr.number), &pr.html_url).accent(),
                pr.title.emphasis()
            );
            if pr.state == auto_pr::types::PrState::Draft {
                println!("   {}", "Opened as draft".muted());
            }
            Ok(())
        }
        CreatePrOutcome::AlreadyExists(pr) => {
            println!(
                "{} {}",
                format!("PR #{} already exists for {}", pr.number, pr.head_ref).warn(),
                pr.html_url.muted()
            );
            println!(
                "   {}",
                format!("Run 'auto-pr update-pr -n {}' to refresh its description.", pr.number)
                    .muted()
            );
            Err(Error::Platform(format!(
                "an open PR already exists for '{}'",
                pr.head_ref
            )))
        }
        CreatePrOutcome::DryRun(message) => {
            println!("{}", "Dry run - nothing pushed or created".muted());
            println!();
            println!("{}", message.title.emphasis());
            if let Some(body) = message.body {
                println!();
                println!("{body}");
            }
            Ok(())
        }
        CreatePrOutcome::Cancelled => {
            println!("{}", "Aborted".muted());
            Err(Error::Cancelled)
        }
    }
}
