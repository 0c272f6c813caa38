//! auto-pr CLI - drive pull requests from creation to merge

mod cli;

use anstream::eprintln;
use auto_pr::conflict::ConflictStrategy;
use auto_pr::error::{Error, Result};
use auto_pr::types::MergeMethod;
use clap::{Args, Parser, Subcommand};
use cli::CliProgress;
use cli::create_pr::{CreateCommandOptions, run_create};
use cli::merge::{MergeCommandOptions, run_merge};
use cli::status::run_status;
use cli::style::Stylize;
use cli::update_pr::{UpdateCommandOptions, run_update};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Drive pull requests from creation to merge
#[derive(Parser)]
#[command(name = "auto-pr", version, about, long_about = None)]
struct Cli {
    /// Path to the repository (defaults to the current directory)
    #[arg(long, global = true, default_value = ".")]
    path: PathBuf,

    /// Git remote to use (defaults to origin)
    #[arg(long, global = true)]
    remote: Option<String>,

    /// Debug logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by commands that generate text
#[derive(Args, Debug, Clone, Default)]
struct GenerationArgs {
    /// Extra guidance for the generated text
    #[arg(long)]
    hint: Option<String>,

    /// Language to write the text in
    #[arg(short, long)]
    language: Option<String>,

    /// Model to use instead of the configured one
    #[arg(short, long)]
    model: Option<String>,

    /// Accept the first draft and skip confirmations
    #[arg(short, long)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Push the current branch and open a PR with a generated description
    CreatePr {
        /// Base branch
        #[arg(short, long)]
        base: Option<String>,

        /// Open the PR as a draft
        #[arg(long)]
        draft: bool,

        /// Show the generated text without pushing or creating
        #[arg(long)]
        dry_run: bool,

        /// Request a review (repeatable)
        #[arg(long = "reviewer", value_name = "LOGIN")]
        reviewers: Vec<String>,

        /// Add a label (repeatable)
        #[arg(long = "label", value_name = "NAME")]
        labels: Vec<String>,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Wait for checks, resolve conflicts and merge a PR
    MergePr {
        /// PR number (defaults to the open PR for the current branch)
        #[arg(short = 'n', long)]
        pr_number: Option<u64>,

        /// Merge method
        #[arg(long, value_enum)]
        merge_method: Option<MergeMethod>,

        /// How to handle merge conflicts
        #[arg(long, value_enum)]
        conflict_strategy: Option<ConflictStrategy>,

        /// Wait for checks to finish
        #[arg(long, overrides_with = "no_wait")]
        wait: bool,

        /// Look at checks once instead of waiting
        #[arg(long)]
        no_wait: bool,

        /// Give up waiting for checks after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Resolve conflicts with the base branch before checking CI
        #[arg(long)]
        sync: bool,

        /// Delete the head branch after merging
        #[arg(long, overrides_with = "keep_branch")]
        delete_branch: bool,

        /// Keep the head branch after merging
        #[arg(long)]
        keep_branch: bool,

        /// Only generate the merge message; do not merge
        #[arg(long)]
        message_only: bool,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Regenerate the description of an open PR
    UpdatePr {
        /// PR number (defaults to the open PR for the current branch)
        #[arg(short = 'n', long)]
        pr_number: Option<u64>,

        /// Show the generated text without updating
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Show where the current branch's PR stands
    Status {
        /// PR number (defaults to the open PR for the current branch)
        #[arg(short = 'n', long)]
        pr_number: Option<u64>,
    },
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (_, true) => Some(false),
        (true, false) => Some(true),
        (false, false) => None,
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("auto_pr=debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel on the first Ctrl-C, exit on the second
fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("{}", "Cancelling... (Ctrl-C again to exit)".warn());
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let progress = CliProgress::for_flags(cli.verbose, cli.quiet);
    let path = cli.path.as_path();
    let remote = cli.remote.as_deref();

    match cli.command {
        Commands::CreatePr {
            base,
            draft,
            dry_run,
            reviewers,
            labels,
            generation,
        } => {
            let options = CreateCommandOptions {
                base,
                draft,
                dry_run,
                yes: generation.yes,
                hint: generation.hint,
                language: generation.language,
                model: generation.model,
                reviewers,
                labels,
            };
            run_create(path, remote, options, &progress).await
        }
        Commands::MergePr {
            pr_number,
            merge_method,
            conflict_strategy,
            wait,
            no_wait,
            timeout,
            sync,
            delete_branch,
            keep_branch,
            message_only,
            generation,
        } => {
            let options = MergeCommandOptions {
                pr_number,
                method: merge_method,
                conflict_strategy,
                wait: flag_pair(wait, no_wait),
                timeout_secs: timeout,
                sync,
                delete_branch: flag_pair(delete_branch, keep_branch),
                message_only,
                yes: generation.yes,
                hint: generation.hint,
                language: generation.language,
                model: generation.model,
            };
            run_merge(path, remote, options, &progress, cancel).await
        }
        Commands::UpdatePr {
            pr_number,
            dry_run,
            generation,
        } => {
            let options = UpdateCommandOptions {
                pr_number,
                dry_run,
                yes: generation.yes,
                hint: generation.hint,
                language: generation.language,
                model: generation.model,
            };
            run_update(path, remote, options, &progress).await
        }
        Commands::Status { pr_number } => run_status(path, remote, pr_number).await,
    }
}

fn report(error: &Error) -> ExitCode {
    eprintln!("{} {error}", "error:".error());
    eprintln!("{}", format!("({})", error.classification()).muted());
    ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    match run(cli, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}
