//! Progress callback that records every event

#![allow(dead_code)]

use async_trait::async_trait;
use auto_pr::error::Error;
use auto_pr::progress::ProgressCallback;
use auto_pr::types::{CheckRun, CheckStatus};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<String>>,
    check_events: Mutex<Vec<(String, CheckStatus)>>,
    polls: Mutex<Vec<(usize, usize, usize)>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn check_events(&self) -> Vec<(String, CheckStatus)> {
        self.check_events.lock().unwrap().clone()
    }

    pub fn polls(&self) -> Vec<(usize, usize, usize)> {
        self.polls.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn has_message(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

#[async_trait]
impl ProgressCallback for RecordingProgress {
    async fn on_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    async fn on_check_status(&self, run: &CheckRun) {
        self.check_events
            .lock()
            .unwrap()
            .push((run.name.clone(), run.status));
    }

    async fn on_poll(&self, passed: usize, failed: usize, pending: usize) {
        self.polls.lock().unwrap().push((passed, failed, pending));
    }

    async fn on_error(&self, error: &Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}
