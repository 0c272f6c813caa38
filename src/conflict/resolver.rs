//! Conflict resolution strategies

use crate::conflict::{
    ConflictApproach, ConflictResolution, ConflictStrategy, ResolutionAttempt,
};
use crate::error::{Error, Result};
use crate::operator::Operator;
use crate::types::{ConflictState, PullRequest};
use crate::vcs::{ConflictOperation, FileResolution, OperationStatus, PushMode, VcsService};
use tracing::{debug, warn};

/// Detects and resolves conflicts between a PR branch and its base
pub struct ConflictResolver<'a> {
    vcs: &'a dyn VcsService,
    operator: &'a dyn Operator,
    remote: String,
}

impl<'a> ConflictResolver<'a> {
    /// Create a resolver working against `remote`
    pub fn new(vcs: &'a dyn VcsService, operator: &'a dyn Operator, remote: &str) -> Self {
        Self {
            vcs,
            operator,
            remote: remote.to_string(),
        }
    }

    /// Paths that conflict between the PR head and `<remote>/<base>`
    ///
    /// Requires the head branch checked out with a clean worktree. The
    /// branch is left untouched.
    pub async fn detect(&self, pr: &PullRequest, base: &str) -> Result<Vec<String>> {
        let current = self.vcs.current_branch().await?;
        if current != pr.head_ref {
            return Err(Error::WrongBranch {
                expected: pr.head_ref.clone(),
                actual: current,
            });
        }
        if !self.vcs.is_worktree_clean().await? {
            return Err(Error::DirtyWorktree);
        }

        self.vcs
            .fetch(&self.remote, &[base, pr.head_ref.as_str()])
            .await?;
        let paths = self.vcs.trial_merge(&self.upstream(base)).await?;
        debug!(pr_number = pr.number, base, conflicts = paths.len(), "trial merge done");
        Ok(paths)
    }

    /// Detect conflicts and apply `strategy`
    pub async fn resolve(
        &self,
        pr: &PullRequest,
        base: &str,
        strategy: ConflictStrategy,
    ) -> Result<ConflictResolution> {
        let paths = self.detect(pr, base).await?;
        if paths.is_empty() {
            return Ok(ConflictResolution::finish(Vec::new(), ConflictState::None, false));
        }

        let detected = ConflictState::Detected(paths.clone());
        let trail = vec![detected.clone()];
        let upstream = self.upstream(base);

        let approach = match strategy {
            ConflictStrategy::Abort => ConflictApproach::Abort,
            ConflictStrategy::Auto => ConflictApproach::Rebase,
            ConflictStrategy::Interactive => self.operator.choose_conflict_approach(&paths)?,
        };
        debug!(pr_number = pr.number, %strategy, %approach, "resolving conflicts");

        let interactive = strategy == ConflictStrategy::Interactive;
        match approach {
            ConflictApproach::Abort => Ok(ConflictResolution::finish(trail, detected, false)),
            ConflictApproach::Rebase => {
                self.run_operation(pr, &upstream, ConflictOperation::Rebase, interactive, trail)
                    .await
            }
            ConflictApproach::Merge => {
                self.run_operation(pr, &upstream, ConflictOperation::Merge, interactive, trail)
                    .await
            }
            ConflictApproach::Manual => self.run_manual(pr, &upstream, paths, trail).await,
        }
    }

    fn upstream(&self, base: &str) -> String {
        format!("{}/{base}", self.remote)
    }

    /// Record local and remote tips before touching the branch
    ///
    /// Fails without touching anything when the remote branch carries
    /// commits that are not in the local history.
    async fn begin(&self, pr: &PullRequest) -> Result<ResolutionAttempt> {
        let pre_attempt_tip = self.vcs.head_commit().await?;
        let remote_tip = self.vcs.remote_tip(&self.remote, &pr.head_ref).await?;
        let remote_in_history = match remote_tip.as_deref() {
            Some(tip) if tip != pre_attempt_tip => {
                self.vcs.is_ancestor(tip, &pre_attempt_tip).await?
            }
            _ => true,
        };
        let attempt = ResolutionAttempt {
            branch: pr.head_ref.clone(),
            pre_attempt_tip,
            remote_tip,
            remote_in_history,
        };
        debug!(
            branch = %attempt.branch,
            local = %attempt.pre_attempt_tip,
            remote = ?attempt.remote_tip,
            remote_in_history,
            "recorded tips before rewrite"
        );
        attempt.ensure_remote_in_history()?;
        Ok(attempt)
    }

    async fn run_operation(
        &self,
        pr: &PullRequest,
        upstream: &str,
        operation: ConflictOperation,
        step_by_step: bool,
        trail: Vec<ConflictState>,
    ) -> Result<ConflictResolution> {
        let attempt = self.begin(pr).await?;
        let result = self
            .drive_operation(&attempt, upstream, operation, step_by_step, trail)
            .await;
        if result.is_err() {
            self.restore(&attempt, Some(operation)).await;
        }
        result
    }

    async fn drive_operation(
        &self,
        attempt: &ResolutionAttempt,
        upstream: &str,
        operation: ConflictOperation,
        step_by_step: bool,
        mut trail: Vec<ConflictState>,
    ) -> Result<ConflictResolution> {
        let status = match operation {
            ConflictOperation::Rebase => self.vcs.rebase(upstream).await?,
            ConflictOperation::Merge => self.vcs.merge(upstream).await?,
        };
        let mut conflicted = match status {
            OperationStatus::Clean => return self.complete(attempt, trail).await,
            OperationStatus::Conflicted(paths) if !step_by_step => {
                return self.give_up(attempt, Some(operation), paths, trail).await;
            }
            OperationStatus::Conflicted(paths) => paths,
        };

        self.operator.notify(&format!(
            "{operation} stopped on {} conflicted file(s); resolving one at a time",
            conflicted.len()
        ));

        // A rebase may stop again on a later commit
        loop {
            trail.push(ConflictState::Resolving(conflicted.clone()));
            let mut skipped = Vec::new();
            for (i, path) in conflicted.iter().enumerate() {
                let decision = self
                    .operator
                    .choose_file_resolution(path, conflicted.len() - i)?;
                debug!(path, ?decision, "file decision");
                if decision == FileResolution::Skip {
                    skipped.push(path.clone());
                } else {
                    self.vcs.resolve_file(path, decision, operation).await?;
                }
                trail.push(ConflictState::Resolving(conflicted[i + 1..].to_vec()));
            }

            if !skipped.is_empty() {
                return self
                    .give_up(attempt, Some(operation), skipped, trail)
                    .await;
            }
            let still = self.vcs.conflicted_files().await?;
            if !still.is_empty() {
                return self.give_up(attempt, Some(operation), still, trail).await;
            }

            match self.vcs.continue_operation(operation).await? {
                OperationStatus::Clean => return self.complete(attempt, trail).await,
                OperationStatus::Conflicted(next) => conflicted = next,
            }
        }
    }

    async fn run_manual(
        &self,
        pr: &PullRequest,
        upstream: &str,
        paths: Vec<String>,
        mut trail: Vec<ConflictState>,
    ) -> Result<ConflictResolution> {
        let attempt = self.begin(pr).await?;
        trail.push(ConflictState::Resolving(paths.clone()));
        let result = self.await_manual(&attempt, upstream, paths, trail).await;
        if result.is_err() {
            self.restore(&attempt, None).await;
        }
        result
    }

    async fn await_manual(
        &self,
        attempt: &ResolutionAttempt,
        upstream: &str,
        paths: Vec<String>,
        trail: Vec<ConflictState>,
    ) -> Result<ConflictResolution> {
        if !self.operator.wait_for_manual_resolution(&paths)? {
            return self.give_up(attempt, None, paths, trail).await;
        }
        let mut remaining = self.vcs.conflicted_files().await?;
        if remaining.is_empty() && !self.vcs.is_worktree_clean().await? {
            remaining = paths;
        }
        if remaining.is_empty() {
            remaining = self.vcs.trial_merge(upstream).await?;
        }
        if remaining.is_empty() {
            self.complete(attempt, trail).await
        } else {
            self.give_up(attempt, None, remaining, trail).await
        }
    }

    /// Push the rewritten branch with a lease on the recorded remote tip
    async fn complete(
        &self,
        attempt: &ResolutionAttempt,
        trail: Vec<ConflictState>,
    ) -> Result<ConflictResolution> {
        let tip = self.vcs.head_commit().await?;
        let expected = attempt.push_lease(&tip)?.to_string();
        debug!(branch = %attempt.branch, %tip, %expected, "force-pushing with lease");
        self.vcs
            .push(
                &self.remote,
                &attempt.branch,
                PushMode::ForceWithLease { expected },
            )
            .await?;
        Ok(ConflictResolution::finish(trail, ConflictState::Resolved, true))
    }

    /// Abort, reset to the recorded tip, and report what is left
    async fn give_up(
        &self,
        attempt: &ResolutionAttempt,
        operation: Option<ConflictOperation>,
        paths: Vec<String>,
        trail: Vec<ConflictState>,
    ) -> Result<ConflictResolution> {
        self.abort_in_progress(operation).await?;
        self.vcs.reset_hard(&attempt.pre_attempt_tip).await?;
        debug!(branch = %attempt.branch, remaining = paths.len(), "conflicts left unresolved");
        Ok(ConflictResolution::finish(
            trail,
            ConflictState::Unresolved(paths),
            false,
        ))
    }

    async fn abort_in_progress(&self, operation: Option<ConflictOperation>) -> Result<()> {
        match operation {
            Some(op) => self.vcs.abort_operation(op).await,
            // The operator may have started either one by hand
            None => {
                self.vcs.abort_operation(ConflictOperation::Rebase).await?;
                self.vcs.abort_operation(ConflictOperation::Merge).await
            }
        }
    }

    /// Best-effort restore after an error
    async fn restore(&self, attempt: &ResolutionAttempt, operation: Option<ConflictOperation>) {
        if let Err(e) = self.abort_in_progress(operation).await {
            warn!(error = %e, "failed to abort in-progress operation");
        }
        if let Err(e) = self.vcs.reset_hard(&attempt.pre_attempt_tip).await {
            warn!(
                branch = %attempt.branch,
                tip = %attempt.pre_attempt_tip,
                error = %e,
                "failed to reset branch; reset it manually"
            );
        }
    }
}
