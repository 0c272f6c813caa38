//! CI check monitoring
//!
//! [`CheckMonitor`] polls the PR host until every check is terminal, the
//! timeout elapses, or the caller cancels. Failing checks are classified as
//! flaky or blocking by [`FlakyPolicy`].

mod monitor;

pub use monitor::CheckMonitor;

use crate::error::{Error, Result};
use crate::types::{CheckClassification, CheckRunSet};
use regex::{Regex, RegexBuilder};
use std::time::Duration;
use tokio_retry::strategy::FibonacciBackoff;

/// Shortest allowed poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Longest allowed poll interval
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Retry schedule for a single failed poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per poll, including the first
    pub attempts: u32,
    /// First delay
    pub base_delay: Duration,
    /// Delay ceiling
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delays slept between attempts (Fibonacci, capped)
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let base = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        FibonacciBackoff::from_millis(base.max(1))
            .max_delay(self.max_delay)
            .take(self.attempts.saturating_sub(1) as usize)
    }
}

/// Names and patterns of known-unreliable checks
#[derive(Debug, Clone, Default)]
pub struct FlakyPolicy {
    names: Vec<String>,
    patterns: Vec<Regex>,
}

impl FlakyPolicy {
    /// Build a policy; patterns are case-insensitive regexes
    pub fn new(names: Vec<String>, patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Config(format!("invalid flaky pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names, patterns })
    }

    /// Whether a check name is on the allow-list
    pub fn is_flaky(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
            || self.patterns.iter().any(|p| p.is_match(name))
    }

    /// Assign a classification to every run in `set`
    ///
    /// Failing runs become flaky or blocking; everything else is reset to
    /// unclassified.
    pub fn classify(&self, set: &mut CheckRunSet) {
        for run in set.iter_mut() {
            run.classification = if !run.status.is_failing() {
                CheckClassification::Unclassified
            } else if self.is_flaky(&run.name) {
                CheckClassification::Flaky
            } else {
                CheckClassification::Blocking
            };
        }
    }
}

/// Timing and policy for [`CheckMonitor`]
#[derive(Debug, Clone)]
pub struct CheckMonitorConfig {
    /// Overall wait limit
    pub timeout: Duration,
    poll_interval: Duration,
    /// Per-poll retry schedule
    pub retry: RetryPolicy,
    /// Flaky allow-list
    pub flaky: FlakyPolicy,
}

impl Default for CheckMonitorConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(600), Duration::from_secs(10))
    }
}

impl CheckMonitorConfig {
    /// Config with the interval clamped to 5..=15 seconds
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL),
            retry: RetryPolicy::default(),
            flaky: FlakyPolicy::default(),
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the flaky policy
    #[must_use]
    pub fn with_flaky(mut self, flaky: FlakyPolicy) -> Self {
        self.flaky = flaky;
        self
    }

    /// Replace the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Effective poll interval
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Result of waiting on checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckVerdict {
    /// Every check succeeded (or there are none)
    AllPassed,
    /// At least one blocking check failed
    BlockingFailure,
    /// Only flaky checks failed
    FlakyFailure,
    /// Checks were still running at the deadline
    TimedOut,
    /// The caller cancelled
    Cancelled,
    /// Fetching check status kept failing
    PollingError {
        /// Attempts made on the last poll
        attempts: u32,
        /// Last error
        message: String,
    },
}

impl CheckVerdict {
    /// Verdict for a set that is already terminal
    pub fn from_terminal(set: &CheckRunSet) -> Self {
        if set.all_passed() {
            Self::AllPassed
        } else if !set.blocking_names().is_empty() {
            Self::BlockingFailure
        } else {
            Self::FlakyFailure
        }
    }
}

impl std::fmt::Display for CheckVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllPassed => write!(f, "all checks passed"),
            Self::BlockingFailure => write!(f, "blocking checks failed"),
            Self::FlakyFailure => write!(f, "flaky checks failed"),
            Self::TimedOut => write!(f, "timed out waiting for checks"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::PollingError { message, .. } => write!(f, "polling failed: {message}"),
        }
    }
}

/// Outcome of one wait
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// PR the checks belong to
    pub pr_number: u64,
    /// Verdict
    pub verdict: CheckVerdict,
    /// Last successfully fetched, classified set
    pub checks: CheckRunSet,
    /// Successful polls made
    pub polls: u32,
    /// Time spent waiting
    pub elapsed: Duration,
}

impl CheckOutcome {
    /// Error describing a non-passing verdict; `None` for all-passed or
    /// cancelled
    pub fn failure(&self, timeout: Duration) -> Option<Error> {
        let pr_number = self.pr_number;
        match &self.verdict {
            CheckVerdict::AllPassed | CheckVerdict::Cancelled => None,
            CheckVerdict::BlockingFailure => Some(Error::BlockingChecks {
                pr_number,
                checks: self.checks.blocking_names(),
            }),
            CheckVerdict::FlakyFailure => Some(Error::FlakyChecks {
                pr_number,
                checks: self.checks.flaky_names(),
            }),
            CheckVerdict::TimedOut => Some(Error::ChecksTimedOut {
                pr_number,
                timeout_secs: timeout.as_secs(),
                pending: self.checks.pending_names(),
            }),
            CheckVerdict::PollingError { attempts, message } => Some(Error::Polling {
                attempts: *attempts,
                message: message.clone(),
            }),
        }
    }
}

/// Operator response to a non-passing verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAction {
    /// Re-request failed runs, then wait again
    Retry,
    /// Proceed despite flaky failures
    Ignore,
    /// Poll for another window
    Wait,
    /// Stop; the merge is blocked by checks
    Abort,
}

impl std::fmt::Display for CheckAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retry => write!(f, "retry failed checks"),
            Self::Ignore => write!(f, "ignore and merge anyway"),
            Self::Wait => write!(f, "keep waiting"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

/// Actions the operator may pick for a verdict
///
/// `Ignore` is only ever offered for flaky failures.
pub fn allowed_actions(verdict: &CheckVerdict) -> Vec<CheckAction> {
    use CheckAction::{Abort, Ignore, Retry, Wait};
    match verdict {
        CheckVerdict::AllPassed | CheckVerdict::Cancelled => Vec::new(),
        CheckVerdict::FlakyFailure => vec![Retry, Ignore, Wait, Abort],
        CheckVerdict::BlockingFailure => vec![Retry, Wait, Abort],
        CheckVerdict::TimedOut => vec![Wait, Retry, Abort],
        CheckVerdict::PollingError { .. } => vec![Wait, Abort],
    }
}
