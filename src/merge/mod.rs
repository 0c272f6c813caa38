//! Merge orchestration
//!
//! Three-phase pattern per attempt:
//! 1. Gather - fetch the PR, settle checks and conflicts (effectful)
//! 2. Plan - decide from the gathered state (pure, see `plan`)
//! 3. Execute - merge on the host and clean up (effectful, see `execute`)
//!
//! A [`MergeAttempt`] reaches success only after checks passed (or flaky
//! failures were explicitly ignored), no conflicts remain, and the operator
//! accepted the merge message.

mod execute;
mod plan;

pub use execute::{cleanup_branch, execute_merge};
pub use plan::{Mergeability, Precheck, merge_summary, precheck, review_gate};

use crate::checks::{
    CheckAction, CheckMonitor, CheckMonitorConfig, CheckVerdict, allowed_actions,
};
use crate::config::MergeConfig;
use crate::conflict::{ConflictResolver, ConflictStrategy};
use crate::error::{Error, Result};
use crate::generate::{GenerationContext, MessageKind, TextGenerator};
use crate::operator::Operator;
use crate::platform::PlatformService;
use crate::progress::{NoopProgress, ProgressCallback};
use crate::refine::{MessageRefinementLoop, RefineOutcome};
use crate::types::{
    CommitMessage, ConflictState, MergeAttempt, MergeMethod, MergeOutcome, PrState, PullRequest,
};
use crate::vcs::VcsService;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Re-fetches of an unknown mergeable flag before letting the host decide
pub const MERGEABLE_POLLS: u32 = 5;

/// Options for one merge attempt
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Merge method
    pub method: MergeMethod,
    /// Resolve conflicts with the base before looking at checks
    pub sync: bool,
    /// Wait for checks; otherwise take one snapshot
    pub wait_for_checks: bool,
    /// Override the configured check timeout
    pub check_timeout: Option<Duration>,
    /// How conflicts are handled
    pub conflict_strategy: ConflictStrategy,
    /// Only produce the merge message
    pub message_only: bool,
    /// Delete the head branch after merging
    pub delete_branch: bool,
    /// Accept the first generated message / skip confirmations
    pub auto_confirm: bool,
    /// Extra guidance for message generation
    pub hint: Option<String>,
    /// Output language for generated text
    pub language: Option<String>,
    /// Approvals needed before merging
    pub required_approvals: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}

impl MergeOptions {
    /// Options seeded from the `[merge]` config section
    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            method: config.method,
            sync: config.sync,
            wait_for_checks: config.wait,
            check_timeout: None,
            conflict_strategy: config.conflict_strategy,
            message_only: false,
            delete_branch: config.delete_branch,
            auto_confirm: false,
            hint: None,
            language: None,
            required_approvals: config.required_approvals,
        }
    }
}

enum ChecksGate {
    Passed { runs: usize },
    Blocked(Error),
    Cancelled,
}

enum ConflictGate {
    Clear { pushed: bool },
    Blocked(Error),
}

/// Drives a PR from open to merged
pub struct MergeOrchestrator<'a> {
    platform: &'a dyn PlatformService,
    vcs: &'a dyn VcsService,
    generator: &'a dyn TextGenerator,
    operator: &'a dyn Operator,
    progress: &'a dyn ProgressCallback,
    checks: CheckMonitorConfig,
    remote: String,
    cancel: CancellationToken,
    mergeable_poll_delay: Duration,
    attempts: u32,
}

impl<'a> MergeOrchestrator<'a> {
    /// Create an orchestrator with default check settings against `origin`
    pub fn new(
        platform: &'a dyn PlatformService,
        vcs: &'a dyn VcsService,
        generator: &'a dyn TextGenerator,
        operator: &'a dyn Operator,
    ) -> Self {
        Self {
            platform,
            vcs,
            generator,
            operator,
            progress: &NoopProgress,
            checks: CheckMonitorConfig::default(),
            remote: "origin".to_string(),
            cancel: CancellationToken::new(),
            mergeable_poll_delay: Duration::from_secs(2),
            attempts: 0,
        }
    }

    /// Report progress to `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Use `config` for check polling
    #[must_use]
    pub fn with_check_config(mut self, config: CheckMonitorConfig) -> Self {
        self.checks = config;
        self
    }

    /// Remote the head and base branches live on
    #[must_use]
    pub fn with_remote(mut self, remote: &str) -> Self {
        self.remote = remote.to_string();
        self
    }

    /// Stop waiting when `cancel` fires
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one merge attempt
    ///
    /// Capability failures (host, repository, generator) are returned as
    /// errors. Everything else, including refusals and operator aborts, is
    /// reported through the attempt's outcome.
    pub async fn merge(&mut self, pr_number: u64, options: &MergeOptions) -> Result<MergeAttempt> {
        self.attempts += 1;
        debug!(pr_number, attempt = self.attempts, method = %options.method, "starting merge");

        // =====================================================================
        // Phase 1: Gather
        // =====================================================================

        let mut pr = self.platform.get_pr(pr_number).await?;
        let attempt = MergeAttempt::new(pr_number, options.method, options.delete_branch);
        let mut attempt = match self.precheck(&pr, attempt).await {
            ControlFlow::Break(done) => return Ok(done),
            ControlFlow::Continue(attempt) => attempt,
        };

        if options.message_only {
            return self.message_only(&pr, options, attempt).await;
        }

        if let Err(err) = plan::review_gate(&pr, options.required_approvals) {
            return Ok(self.blocked_by_review(attempt, err).await);
        }

        // Once a head had check runs, a new head must show its own runs
        // before an empty set can count as passed
        let mut require_runs = false;
        if options.sync {
            match self.resolve_conflicts(&pr, options.conflict_strategy).await? {
                ConflictGate::Blocked(err) => {
                    return Ok(attempt.fail(MergeOutcome::BlockedByConflict, err));
                }
                ConflictGate::Clear { pushed: true } => {
                    require_runs = !pr.checks.is_empty();
                    pr = self.platform.get_pr(pr_number).await?;
                }
                ConflictGate::Clear { pushed: false } => {}
            }
        }

        // A push during conflict resolution restarts CI, so loop until the
        // checked head is also the head being merged.
        loop {
            let checked_sha = pr.head_sha.clone();
            let checked_runs = match self.settle_checks(&pr, options, require_runs).await? {
                ChecksGate::Passed { runs } => runs,
                ChecksGate::Blocked(err) => {
                    return Ok(attempt.fail(MergeOutcome::BlockedByChecks, err));
                }
                ChecksGate::Cancelled => {
                    return Ok(attempt.fail(MergeOutcome::Aborted, Error::Cancelled));
                }
            };

            pr = self.refresh_mergeable(pr_number).await?;
            attempt = match self.precheck(&pr, attempt).await {
                ControlFlow::Break(done) => return Ok(done),
                ControlFlow::Continue(attempt) => attempt,
            };
            if pr.head_sha != checked_sha {
                require_runs = checked_runs > 0;
                debug!(pr_number, old = %checked_sha, new = %pr.head_sha, "head moved");
                self.progress
                    .on_message("🔁 Head moved while checks ran; checking again")
                    .await;
                continue;
            }

            match Mergeability::of(&pr) {
                Mergeability::Clean => break,
                Mergeability::Unknown => {
                    warn!(pr_number, "mergeable status still unknown; letting the host decide");
                    break;
                }
                Mergeability::Conflicted => {
                    match self.resolve_conflicts(&pr, options.conflict_strategy).await? {
                        ConflictGate::Blocked(err) => {
                            return Ok(attempt.fail(MergeOutcome::BlockedByConflict, err));
                        }
                        ConflictGate::Clear { pushed: true } => {
                            require_runs = checked_runs > 0;
                            pr = self.platform.get_pr(pr_number).await?;
                        }
                        // The local trial merge is clean; the host view is stale
                        ConflictGate::Clear { pushed: false } => break,
                    }
                }
            }
        }

        // =====================================================================
        // Phase 2: Plan
        // =====================================================================

        // Reviews may have changed while checks ran
        if let Err(err) = plan::review_gate(&pr, options.required_approvals) {
            return Ok(self.blocked_by_review(attempt, err).await);
        }

        let message = if plan::needs_message(options.method) {
            match self.refine_message(&pr, options).await? {
                RefineOutcome::Accepted(text) => {
                    let message = CommitMessage::from_text(&text);
                    attempt.message = Some(text);
                    Some(message)
                }
                RefineOutcome::Cancelled => {
                    return Ok(attempt.fail(MergeOutcome::Aborted, Error::Cancelled));
                }
            }
        } else {
            if !options.auto_confirm && !self.operator.confirm(&plan::rebase_confirmation(&pr))? {
                return Ok(attempt.fail(MergeOutcome::Aborted, Error::Cancelled));
            }
            None
        };

        if self.cancel.is_cancelled() {
            return Ok(attempt.fail(MergeOutcome::Aborted, Error::Cancelled));
        }

        // =====================================================================
        // Phase 3: Execute
        // =====================================================================

        match execute_merge(self.platform, &pr, options.method, message.as_ref(), self.progress)
            .await
        {
            Ok(result) => attempt.sha = result.sha,
            Err(e) => {
                warn!(pr_number, error = %e, "host merge failed");
                return Ok(attempt.fail(MergeOutcome::Failed, e));
            }
        }

        if options.delete_branch {
            attempt.branch_deleted =
                cleanup_branch(self.platform, self.vcs, &pr, self.progress).await;
        }

        let detail = format!("merged PR #{pr_number} into {}", pr.base_ref);
        Ok(attempt.finish(MergeOutcome::Success, detail))
    }

    /// Stop early for merged, closed and draft PRs
    async fn precheck(
        &self,
        pr: &PullRequest,
        attempt: MergeAttempt,
    ) -> ControlFlow<MergeAttempt, MergeAttempt> {
        match plan::precheck(pr) {
            Precheck::Proceed => ControlFlow::Continue(attempt),
            Precheck::AlreadyMerged => {
                self.progress
                    .on_message(&format!("✅ PR #{} is already merged", pr.number))
                    .await;
                let detail = format!("PR #{} is already merged", pr.number);
                let mut done = attempt.finish(MergeOutcome::Success, detail);
                done.already_merged = true;
                ControlFlow::Break(done)
            }
            Precheck::Closed => ControlFlow::Break(attempt.fail(
                MergeOutcome::Failed,
                Error::Platform(format!("PR #{} is closed", pr.number)),
            )),
            Precheck::Draft => ControlFlow::Break(attempt.fail(
                MergeOutcome::Failed,
                Error::Platform(format!(
                    "PR #{} is a draft; mark it ready for review first",
                    pr.number
                )),
            )),
        }
    }

    async fn blocked_by_review(&self, attempt: MergeAttempt, err: Error) -> MergeAttempt {
        self.progress.on_message(&format!("🚫 {err}")).await;
        attempt.fail(MergeOutcome::BlockedByReview, err)
    }

    async fn message_only(
        &self,
        pr: &PullRequest,
        options: &MergeOptions,
        mut attempt: MergeAttempt,
    ) -> Result<MergeAttempt> {
        match self.refine_message(pr, options).await? {
            RefineOutcome::Accepted(text) => {
                attempt.message = Some(text);
                Ok(attempt.finish(MergeOutcome::Pending, "message only; PR not merged"))
            }
            RefineOutcome::Cancelled => Ok(attempt.fail(MergeOutcome::Aborted, Error::Cancelled)),
        }
    }

    /// Wait for checks and ask the operator about anything but a pass
    async fn settle_checks(
        &self,
        pr: &PullRequest,
        options: &MergeOptions,
        require_runs: bool,
    ) -> Result<ChecksGate> {
        let config = match options.check_timeout {
            Some(timeout) => self.checks.clone().with_timeout(timeout),
            None => self.checks.clone(),
        };
        let timeout = config.timeout;
        let monitor = CheckMonitor::new(self.platform, config).require_runs(require_runs);

        self.progress
            .on_message(&format!("⏳ Checking CI for PR #{}", pr.number))
            .await;
        let mut outcome = if options.wait_for_checks {
            monitor.await_checks(pr.number, &self.cancel, self.progress).await
        } else {
            monitor.snapshot(pr.number, self.progress).await
        };

        loop {
            match outcome.verdict {
                CheckVerdict::AllPassed => {
                    return Ok(ChecksGate::Passed {
                        runs: outcome.checks.len(),
                    });
                }
                CheckVerdict::Cancelled => return Ok(ChecksGate::Cancelled),
                _ => {}
            }

            let allowed = allowed_actions(&outcome.verdict);
            let action = self.operator.choose_check_action(&outcome, &allowed)?;
            debug!(pr_number = pr.number, verdict = %outcome.verdict, %action, "check decision");
            if !allowed.contains(&action) {
                self.operator
                    .notify(&format!("Cannot {action} when {}", outcome.verdict));
                continue;
            }

            outcome = match action {
                CheckAction::Abort => {
                    let err = outcome.failure(timeout).unwrap_or_else(|| {
                        Error::Internal(format!("no failure for verdict '{}'", outcome.verdict))
                    });
                    return Ok(ChecksGate::Blocked(err));
                }
                CheckAction::Ignore => {
                    self.progress
                        .on_message(&format!(
                            "⚠️  Ignoring flaky checks: {}",
                            outcome.checks.flaky_names().join(", ")
                        ))
                        .await;
                    return Ok(ChecksGate::Passed {
                        runs: outcome.checks.len(),
                    });
                }
                CheckAction::Wait => {
                    monitor.await_checks(pr.number, &self.cancel, self.progress).await
                }
                CheckAction::Retry => {
                    let ids = outcome.checks.failing_ids();
                    if ids.is_empty() {
                        self.operator.notify("No failed runs to re-run; waiting instead");
                    } else {
                        self.platform.rerun_checks(pr.number, &ids).await?;
                        self.progress
                            .on_message(&format!("🔁 Re-running {} check(s)", ids.len()))
                            .await;
                    }
                    monitor.await_checks(pr.number, &self.cancel, self.progress).await
                }
            };
        }
    }

    /// Fetch the PR, re-polling while the host is still computing mergeability
    async fn refresh_mergeable(&self, pr_number: u64) -> Result<PullRequest> {
        let mut pr = self.platform.get_pr(pr_number).await?;
        let mut polls = 0;
        while pr.state == PrState::Open
            && Mergeability::of(&pr) == Mergeability::Unknown
            && polls < MERGEABLE_POLLS
        {
            polls += 1;
            debug!(pr_number, polls, "mergeable status unknown, polling again");
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = sleep(self.mergeable_poll_delay) => {}
            }
            pr = self.platform.get_pr(pr_number).await?;
        }
        Ok(pr)
    }

    async fn resolve_conflicts(
        &self,
        pr: &PullRequest,
        strategy: ConflictStrategy,
    ) -> Result<ConflictGate> {
        self.progress
            .on_message(&format!(
                "🔍 Checking PR #{} for conflicts with {}",
                pr.number, pr.base_ref
            ))
            .await;
        let resolver = ConflictResolver::new(self.vcs, self.operator, &self.remote);
        let resolution = match resolver.resolve(pr, &pr.base_ref, strategy).await {
            Ok(resolution) => resolution,
            Err(err @ Error::UnsafePush { .. }) => {
                warn!(pr_number = pr.number, error = %err, "refusing to rewrite the branch");
                return Ok(ConflictGate::Blocked(err));
            }
            Err(err) => return Err(err),
        };

        match resolution.state {
            ConflictState::None => Ok(ConflictGate::Clear { pushed: false }),
            ConflictState::Resolved => {
                self.progress
                    .on_message("✅ Conflicts resolved and pushed")
                    .await;
                Ok(ConflictGate::Clear {
                    pushed: resolution.pushed,
                })
            }
            ConflictState::Detected(paths)
            | ConflictState::Resolving(paths)
            | ConflictState::Unresolved(paths) => Ok(ConflictGate::Blocked(
                Error::ConflictUnresolved {
                    base: pr.base_ref.clone(),
                    paths,
                },
            )),
        }
    }

    async fn refine_message(
        &self,
        pr: &PullRequest,
        options: &MergeOptions,
    ) -> Result<RefineOutcome> {
        let subjects = self.commit_subjects(pr).await;
        let context = GenerationContext::new(
            MessageKind::MergeMessage,
            plan::merge_summary(pr, &subjects),
        )
        .with_hint(options.hint.clone())
        .with_language(options.language.clone());

        MessageRefinementLoop::new(self.generator, self.operator)
            .auto_confirm(options.auto_confirm)
            .refine(context)
            .await
    }

    /// Subjects of the PR's commits, when the head branch is checked out
    async fn commit_subjects(&self, pr: &PullRequest) -> Vec<String> {
        match self.vcs.current_branch().await {
            Ok(branch) if branch == pr.head_ref => {}
            _ => return Vec::new(),
        }
        let base = format!("{}/{}", self.remote, pr.base_ref);
        self.vcs.log_subjects(&base).await.unwrap_or_else(|e| {
            debug!(error = %e, "commit subjects unavailable");
            Vec::new()
        })
    }
}
