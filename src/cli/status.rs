//! Status command - where the current branch's PR stands

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, arrow, check, cross, link};
use anstream::println;
use auto_pr::error::Result;
use auto_pr::types::{CheckClassification, CheckStatus, PullRequest};
use auto_pr::vcs::VcsService;
use auto_pr::workflow::{StatusReport, WorkflowState, status};
use std::path::Path;

/// Run the status command
#[allow(clippy::future_not_send)]
pub async fn run_status(path: &Path, remote: Option<&str>, pr_number: Option<u64>) -> Result<()> {
    let ctx = CommandContext::new(path, remote).await?;
    let branch = ctx.vcs.current_branch().await?;
    let checks = ctx.check_config()?;
    let report = status(
        ctx.platform.as_ref(),
        &ctx.vcs,
        &ctx.remote_name,
        &branch,
        pr_number,
        &checks.flaky,
    )
    .await?;

    print_report(&report);
    Ok(())
}

fn state_label(state: WorkflowState) -> String {
    let text = state.to_string();
    match state {
        WorkflowState::Merged | WorkflowState::ChecksPassed => text.success(),
        WorkflowState::Conflict | WorkflowState::Closed => text.error(),
        WorkflowState::ChecksPending | WorkflowState::PrDraft => text.warn(),
        WorkflowState::NoPr | WorkflowState::PrOpen => text.accent(),
    }
}

fn print_report(report: &StatusReport) {
    println!("{} {}", "Branch:".emphasis(), report.branch.accent());

    let Some(ref pr) = report.pr else {
        println!("{} {}", "State:".emphasis(), state_label(report.state));
        print_next(report);
        return;
    };

    println!(
        "{} {} {}",
        "PR:".emphasis(),
        link(&format!("#{}", pr.number), &pr.html_url).accent(),
        pr.title
    );
    println!("{} {}", "State:".emphasis(), state_label(report.state));
    if let (Some(ahead), Some(behind)) = (report.ahead, report.behind) {
        println!(
            "{} {ahead} ahead, {behind} behind {}",
            "Commits:".emphasis(),
            pr.base_ref.accent()
        );
    }
    if !report.reviews.is_empty() {
        println!("{} {}", "Reviews:".emphasis(), report.reviews);
    }

    print_checks(pr);

    if !report.blocking_reasons.is_empty() {
        println!("{}", "Blocking:".emphasis());
        for reason in &report.blocking_reasons {
            println!("  {} {}", arrow(), reason.warn());
        }
    }
    if report.needs_attention() {
        println!("{}", "Needs attention".warn());
    }
    print_next(report);
}

fn print_checks(pr: &PullRequest) {
    if pr.checks.is_empty() {
        return;
    }
    let summary = pr.checks.summary();
    println!(
        "{} {} passed, {} failed, {} pending",
        "Checks:".emphasis(),
        summary.passed,
        summary.failed,
        summary.pending
    );
    for run in pr.checks.iter() {
        let icon = match run.status {
            CheckStatus::Success => check(),
            s if s.is_failing() => cross(),
            _ => "•".muted(),
        };
        let tag = match run.classification {
            CheckClassification::Flaky => " (flaky)".warn(),
            CheckClassification::Blocking => " (blocking)".error(),
            CheckClassification::Unclassified => String::new(),
        };
        println!("  {icon} {}{tag} {}", run.name, run.status.to_string().muted());
    }
}

fn print_next(report: &StatusReport) {
    if let Some(ref next) = report.next_command {
        println!();
        println!("{} {}", "Next:".muted(), next.accent());
    }
}
