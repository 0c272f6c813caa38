//! Poll loop

use crate::checks::{CheckMonitorConfig, CheckOutcome, CheckVerdict};
use crate::error::Error;
use crate::platform::PlatformService;
use crate::progress::ProgressCallback;
use crate::types::{CheckRun, CheckRunSet};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_retry::Retry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Polls check status for a PR
pub struct CheckMonitor<'a> {
    platform: &'a dyn PlatformService,
    config: CheckMonitorConfig,
    require_runs: bool,
}

enum Polled {
    Cancelled,
    Deadline,
    Done(Result<CheckRunSet, (u32, Error)>),
}

impl<'a> CheckMonitor<'a> {
    /// Create a monitor
    pub fn new(platform: &'a dyn PlatformService, config: CheckMonitorConfig) -> Self {
        Self {
            platform,
            config,
            require_runs: false,
        }
    }

    /// Treat an empty check set as pending rather than passed
    ///
    /// Used after a push, before the host has registered runs for the new
    /// head.
    #[must_use]
    pub const fn require_runs(mut self, require: bool) -> Self {
        self.require_runs = require;
        self
    }

    fn settled(&self, set: &CheckRunSet) -> bool {
        set.is_terminal() && !(self.require_runs && set.is_empty())
    }

    /// Monitor configuration
    pub const fn config(&self) -> &CheckMonitorConfig {
        &self.config
    }

    /// Poll until every check is terminal, the timeout elapses, or `cancel`
    /// fires
    ///
    /// Polls are sequential: the next one starts only after the previous
    /// completed and the interval was slept. A poll still in flight at the
    /// deadline is dropped and the wait ends with [`CheckVerdict::TimedOut`].
    /// A poll that keeps failing after its retries ends the wait with
    /// [`CheckVerdict::PollingError`].
    pub async fn await_checks(
        &self,
        pr_number: u64,
        cancel: &CancellationToken,
        progress: &dyn ProgressCallback,
    ) -> CheckOutcome {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut last = CheckRunSet::default();
        let mut polls = 0;

        loop {
            // The poll itself is bounded by the deadline, not just the sleep
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => Polled::Cancelled,
                result = self.poll(pr_number) => Polled::Done(result),
                () = sleep_until(deadline) => Polled::Deadline,
            };
            let set = match polled {
                Polled::Cancelled => {
                    debug!(pr_number, polls, "check wait cancelled");
                    return outcome(pr_number, CheckVerdict::Cancelled, last, polls, started);
                }
                Polled::Deadline => {
                    warn!(pr_number, polls, "check poll still running at the deadline");
                    return outcome(pr_number, CheckVerdict::TimedOut, last, polls, started);
                }
                Polled::Done(Err((attempts, err))) => {
                    progress.on_error(&err).await;
                    let verdict = CheckVerdict::PollingError {
                        attempts,
                        message: err.to_string(),
                    };
                    return outcome(pr_number, verdict, last, polls, started);
                }
                Polled::Done(Ok(set)) => set,
            };
            polls += 1;
            report_changes(&last, &set, progress).await;
            last = set;

            if self.settled(&last) {
                let verdict = CheckVerdict::from_terminal(&last);
                debug!(pr_number, polls, %verdict, "checks terminal");
                return outcome(pr_number, verdict, last, polls, started);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(pr_number, polls, "check wait timed out");
                return outcome(pr_number, CheckVerdict::TimedOut, last, polls, started);
            }

            let wait = self.config.poll_interval().min(deadline - now);
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(pr_number, polls, "check wait cancelled");
                    return outcome(pr_number, CheckVerdict::Cancelled, last, polls, started);
                }
                () = sleep(wait) => {}
            }
        }
    }

    /// Single poll with no waiting; a non-terminal set is reported as timed
    /// out
    pub async fn snapshot(
        &self,
        pr_number: u64,
        progress: &dyn ProgressCallback,
    ) -> CheckOutcome {
        let started = Instant::now();
        let polled = tokio::select! {
            biased;
            result = self.poll(pr_number) => result,
            () = sleep(self.config.timeout) => {
                warn!(pr_number, "check snapshot still running at the deadline");
                return outcome(pr_number, CheckVerdict::TimedOut, CheckRunSet::default(), 0, started);
            }
        };
        match polled {
            Err((attempts, err)) => {
                progress.on_error(&err).await;
                let verdict = CheckVerdict::PollingError {
                    attempts,
                    message: err.to_string(),
                };
                outcome(pr_number, verdict, CheckRunSet::default(), 0, started)
            }
            Ok(set) => {
                report_changes(&CheckRunSet::default(), &set, progress).await;
                let verdict = if self.settled(&set) {
                    CheckVerdict::from_terminal(&set)
                } else {
                    CheckVerdict::TimedOut
                };
                outcome(pr_number, verdict, set, 1, started)
            }
        }
    }

    /// Fetch and classify, retrying transient failures
    async fn poll(&self, pr_number: u64) -> Result<CheckRunSet, (u32, Error)> {
        let mut attempts = 0u32;
        let result = Retry::spawn(self.config.retry.delays(), || {
            attempts += 1;
            let attempt = attempts;
            async move {
                self.platform
                    .list_checks(pr_number)
                    .await
                    .inspect_err(|e| warn!(pr_number, attempt, error = %e, "polling checks failed"))
            }
        })
        .await;

        match result {
            Ok(mut set) => {
                self.config.flaky.classify(&mut set);
                Ok(set)
            }
            Err(err) => Err((attempts, err)),
        }
    }
}

fn outcome(
    pr_number: u64,
    verdict: CheckVerdict,
    checks: CheckRunSet,
    polls: u32,
    started: Instant,
) -> CheckOutcome {
    CheckOutcome {
        pr_number,
        verdict,
        checks,
        polls,
        elapsed: started.elapsed(),
    }
}

/// Emit one event per check whose status changed, then a summary
async fn report_changes(
    previous: &CheckRunSet,
    current: &CheckRunSet,
    progress: &dyn ProgressCallback,
) {
    for run in current.iter() {
        if changed(previous.get(&run.name), run) {
            progress.on_check_status(run).await;
        }
    }
    let summary = current.summary();
    progress
        .on_poll(summary.passed, summary.failed, summary.pending)
        .await;
}

fn changed(previous: Option<&CheckRun>, run: &CheckRun) -> bool {
    previous.is_none_or(|p| p.status != run.status)
}
