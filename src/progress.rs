//! Progress reporting for long-running workflows
//!
//! The CLI renders these events; tests and library callers can use
//! [`NoopProgress`].

use crate::error::Error;
use crate::types::CheckRun;
use async_trait::async_trait;

/// Callback interface for workflow progress
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// Free-form status line
    async fn on_message(&self, message: &str);

    /// A check changed status since the previous poll
    async fn on_check_status(&self, run: &CheckRun);

    /// One poll finished; counts across the whole set
    async fn on_poll(&self, passed: usize, failed: usize, pending: usize);

    /// A recoverable error occurred
    async fn on_error(&self, error: &Error);
}

/// Progress callback that discards everything
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_message(&self, _message: &str) {}
    async fn on_check_status(&self, _run: &CheckRun) {}
    async fn on_poll(&self, _passed: usize, _failed: usize, _pending: usize) {}
    async fn on_error(&self, _error: &Error) {}
}
