//! Terminal implementation of the operator prompts

use crate::cli::style::{Stylize, arrow};
use anstream::println;
use auto_pr::checks::{CheckAction, CheckOutcome};
use auto_pr::conflict::ConflictApproach;
use auto_pr::error::{Error, Result};
use auto_pr::operator::Operator;
use auto_pr::refine::MessageDraft;
use auto_pr::vcs::FileResolution;
use dialoguer::{Confirm, Editor, Input, Select};

fn prompt_error(e: impl std::fmt::Display) -> Error {
    Error::Internal(format!("Failed to read input: {e}"))
}

/// dialoguer-backed prompts
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn present_draft(&self, draft: &MessageDraft) {
        println!();
        println!(
            "{} {}",
            format!("Proposed {}", draft.context.kind).emphasis(),
            format!("(revision {})", draft.revision).muted()
        );
        println!("{}", "─".repeat(60).muted());
        println!("{}", draft.text);
        println!("{}", "─".repeat(60).muted());
        if !draft.context.feedback.is_empty() {
            println!(
                "{}",
                format!("Feedback so far: {}", draft.context.feedback.join("; ")).muted()
            );
        }
        println!(
            "{}",
            "[y]es  [n]o  [r]eroll  [e]dit  or type feedback".muted()
        );
    }

    fn read_decision(&self) -> Result<String> {
        Input::<String>::new()
            .with_prompt("Use this?")
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)
    }

    fn edit_text(&self, current: &str) -> Result<Option<String>> {
        Editor::new().edit(current).map_err(prompt_error)
    }

    fn notify(&self, message: &str) {
        println!("{}", message.warn());
    }

    fn choose_check_action(
        &self,
        outcome: &CheckOutcome,
        allowed: &[CheckAction],
    ) -> Result<CheckAction> {
        println!();
        println!(
            "{} PR #{}: {}",
            "Checks".emphasis(),
            outcome.pr_number,
            outcome.verdict.warn()
        );
        for name in outcome.checks.blocking_names() {
            println!("  {} {} {}", arrow(), name, "(blocking)".error());
        }
        for name in outcome.checks.flaky_names() {
            println!("  {} {} {}", arrow(), name, "(flaky)".warn());
        }
        for name in outcome.checks.pending_names() {
            println!("  {} {} {}", arrow(), name, "(pending)".muted());
        }

        let labels: Vec<String> = allowed.iter().map(ToString::to_string).collect();
        let index = Select::new()
            .with_prompt("What now?")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(prompt_error)?;
        allowed
            .get(index)
            .copied()
            .ok_or_else(|| Error::Internal(format!("no action at index {index}")))
    }

    fn choose_conflict_approach(&self, paths: &[String]) -> Result<ConflictApproach> {
        println!();
        println!("{} in {} file(s):", "Conflicts".warn(), paths.len());
        for path in paths {
            println!("  {} {}", arrow(), path.accent());
        }
        let approaches = [
            ConflictApproach::Rebase,
            ConflictApproach::Merge,
            ConflictApproach::Manual,
            ConflictApproach::Abort,
        ];
        let labels: Vec<String> = approaches.iter().map(ToString::to_string).collect();
        let index = Select::new()
            .with_prompt("How do you want to resolve them?")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(prompt_error)?;
        Ok(approaches.get(index).copied().unwrap_or(ConflictApproach::Abort))
    }

    fn choose_file_resolution(&self, path: &str, remaining: usize) -> Result<FileResolution> {
        let choices = [
            (FileResolution::KeepHead, "keep this branch's version"),
            (FileResolution::TakeBase, "take the base version"),
            (FileResolution::Edited, "I edited the file; mark it resolved"),
            (FileResolution::Skip, "skip (leave unresolved)"),
        ];
        let labels: Vec<&str> = choices.iter().map(|(_, label)| *label).collect();
        let index = Select::new()
            .with_prompt(format!("{} ({remaining} left)", path.accent()))
            .items(&labels)
            .default(0)
            .interact()
            .map_err(prompt_error)?;
        Ok(choices
            .get(index)
            .map_or(FileResolution::Skip, |(resolution, _)| *resolution))
    }

    fn wait_for_manual_resolution(&self, paths: &[String]) -> Result<bool> {
        println!();
        println!("Resolve these files in another terminal, then commit:");
        for path in paths {
            println!("  {} {}", arrow(), path.accent());
        }
        Confirm::new()
            .with_prompt("Done resolving?")
            .default(true)
            .interact()
            .map_err(prompt_error)
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()
            .map_err(prompt_error)
    }
}
