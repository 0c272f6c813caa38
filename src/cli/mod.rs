//! CLI commands

pub mod context;
pub mod create_pr;
pub mod merge;
pub mod prompt;
pub mod status;
pub mod style;
pub mod update_pr;

use anstream::{eprintln, println};
use async_trait::async_trait;
use auto_pr::error::Error;
use auto_pr::progress::ProgressCallback;
use auto_pr::types::{CheckRun, CheckStatus};
use indicatif::ProgressBar;
use std::sync::Mutex;
use std::time::Duration;
use style::{Stylize, check, cross, spinner_style};

/// Progress output for terminal commands
///
/// Check polling shows a spinner with the running tally; messages and
/// status changes print above it.
pub struct CliProgress {
    verbose: bool,
    quiet: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    /// Only terminal check states are printed
    pub const fn compact() -> Self {
        Self {
            verbose: false,
            quiet: false,
            spinner: Mutex::new(None),
        }
    }

    /// Every check status change is printed
    pub const fn verbose() -> Self {
        Self {
            verbose: true,
            quiet: false,
            spinner: Mutex::new(None),
        }
    }

    /// Nothing but errors
    pub const fn quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            spinner: Mutex::new(None),
        }
    }

    /// Pick a mode from the global flags
    pub const fn for_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Self::quiet()
        } else if verbose {
            Self::verbose()
        } else {
            Self::compact()
        }
    }

    /// Print a line above the spinner, if any
    fn line(&self, text: &str) {
        if self.quiet {
            return;
        }
        match self.spinner.lock().ok().and_then(|s| s.clone()) {
            Some(spinner) => spinner.println(text),
            None => println!("{text}"),
        }
    }

    /// Stop the spinner
    pub fn finish(&self) {
        if let Ok(mut guard) = self.spinner.lock()
            && let Some(spinner) = guard.take()
        {
            spinner.finish_and_clear();
        }
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_message(&self, message: &str) {
        self.finish();
        self.line(message);
    }

    async fn on_check_status(&self, run: &CheckRun) {
        let icon = match run.status {
            CheckStatus::Success => check(),
            s if s.is_failing() => cross(),
            _ => "•".muted(),
        };
        if self.verbose || run.status.is_terminal() {
            self.line(&format!("  {icon} {} {}", run.name, run.status.muted()));
        }
    }

    async fn on_poll(&self, passed: usize, failed: usize, pending: usize) {
        if self.quiet {
            return;
        }
        let Ok(mut guard) = self.spinner.lock() else {
            return;
        };
        let spinner = guard.get_or_insert_with(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(spinner_style());
            spinner.enable_steady_tick(Duration::from_millis(80));
            spinner
        });
        spinner.set_message(format!(
            "Checks: {} passed, {} failed, {} pending",
            passed.success(),
            failed.error(),
            pending.accent()
        ));
    }

    async fn on_error(&self, error: &Error) {
        self.finish();
        eprintln!("{}", format!("⚠️  {error}").warn());
    }
}
