//! Mock platform service for testing
//!
//! These are test utilities - not all may be used in current tests but are
//! available for future test development.

#![allow(dead_code)]

use async_trait::async_trait;
use auto_pr::error::{Error, Result};
use auto_pr::platform::PlatformService;
use auto_pr::types::{
    CheckRunSet, CommitMessage, MergeMethod, MergeResult, NewPullRequest, PlatformConfig, PrState,
    PullRequest,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Call record for `update_pr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePrCall {
    pub pr_number: u64,
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Call record for `merge_pr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePrCall {
    pub pr_number: u64,
    pub method: MergeMethod,
    pub message: Option<CommitMessage>,
    pub head_sha: String,
}

/// Scripted `list_checks` response
#[derive(Debug, Clone)]
enum ChecksResponse {
    Ok(CheckRunSet),
    Err(String),
}

/// Pops the front of a script, except the last entry which repeats
fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// Simple mock platform service for testing
///
/// This manually implements `PlatformService` rather than using mockall,
/// because mockall has issues with methods returning references.
///
/// Features:
/// - Scripted `get_pr` and `list_checks` sequences (the last entry repeats)
/// - Call tracking for verification, including poll timestamps
/// - Error injection for failure path testing
/// - A successful merge flips the stored PR to merged
pub struct MockPlatformService {
    config: PlatformConfig,
    next_pr_number: AtomicU64,
    prs: Mutex<HashMap<u64, VecDeque<PullRequest>>>,
    find_pr_responses: Mutex<HashMap<String, Option<PullRequest>>>,
    checks: Mutex<VecDeque<ChecksResponse>>,
    merge_response: Mutex<Option<MergeResult>>,
    // Call tracking
    get_pr_calls: Mutex<Vec<u64>>,
    list_checks_calls: Mutex<Vec<Instant>>,
    create_pr_calls: Mutex<Vec<NewPullRequest>>,
    update_pr_calls: Mutex<Vec<UpdatePrCall>>,
    merge_pr_calls: Mutex<Vec<MergePrCall>>,
    rerun_calls: Mutex<Vec<(u64, Vec<u64>)>>,
    reviewer_calls: Mutex<Vec<(u64, Vec<String>)>>,
    label_calls: Mutex<Vec<(u64, Vec<String>)>>,
    delete_branch_calls: Mutex<Vec<String>>,
    // Error injection
    error_on_get_pr: Mutex<Option<String>>,
    error_on_create_pr: Mutex<Option<String>>,
    error_on_merge_pr: Mutex<Option<String>>,
    error_on_delete_branch: Mutex<Option<String>>,
    error_on_add_reviewers: Mutex<Option<String>>,
    checks_delay: Mutex<Option<Duration>>,
}

impl MockPlatformService {
    /// Create a new mock with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            next_pr_number: AtomicU64::new(1),
            prs: Mutex::new(HashMap::new()),
            find_pr_responses: Mutex::new(HashMap::new()),
            checks: Mutex::new(VecDeque::new()),
            merge_response: Mutex::new(None),
            get_pr_calls: Mutex::new(Vec::new()),
            list_checks_calls: Mutex::new(Vec::new()),
            create_pr_calls: Mutex::new(Vec::new()),
            update_pr_calls: Mutex::new(Vec::new()),
            merge_pr_calls: Mutex::new(Vec::new()),
            rerun_calls: Mutex::new(Vec::new()),
            reviewer_calls: Mutex::new(Vec::new()),
            label_calls: Mutex::new(Vec::new()),
            delete_branch_calls: Mutex::new(Vec::new()),
            error_on_get_pr: Mutex::new(None),
            error_on_create_pr: Mutex::new(None),
            error_on_merge_pr: Mutex::new(None),
            error_on_delete_branch: Mutex::new(None),
            error_on_add_reviewers: Mutex::new(None),
            checks_delay: Mutex::new(None),
        }
    }

    // === Error injection methods ===

    /// Make `get_pr` return an error
    pub fn fail_get_pr(&self, msg: &str) {
        *self.error_on_get_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `create_pr` return an error
    pub fn fail_create_pr(&self, msg: &str) {
        *self.error_on_create_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `merge_pr` return an error
    pub fn fail_merge_pr(&self, msg: &str) {
        *self.error_on_merge_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `delete_branch` return an error
    pub fn fail_delete_branch(&self, msg: &str) {
        *self.error_on_delete_branch.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `add_reviewers` return an error
    pub fn fail_add_reviewers(&self, msg: &str) {
        *self.error_on_add_reviewers.lock().unwrap() = Some(msg.to_string());
    }

    // === Response setup ===

    /// Replace the `get_pr` script for this PR with a single state
    pub fn set_pr(&self, pr: PullRequest) {
        self.prs
            .lock()
            .unwrap()
            .insert(pr.number, VecDeque::from([pr]));
    }

    /// Append a state to the `get_pr` script for this PR
    pub fn queue_pr(&self, pr: PullRequest) {
        self.prs
            .lock()
            .unwrap()
            .entry(pr.number)
            .or_default()
            .push_back(pr);
    }

    /// Set the response for `find_pr_for_branch` for a specific branch
    pub fn set_find_pr_response(&self, branch: &str, pr: Option<PullRequest>) {
        self.find_pr_responses
            .lock()
            .unwrap()
            .insert(branch.to_string(), pr);
    }

    /// Append a successful `list_checks` response
    pub fn queue_checks(&self, checks: CheckRunSet) {
        self.checks
            .lock()
            .unwrap()
            .push_back(ChecksResponse::Ok(checks));
    }

    /// Make every `list_checks` call take `delay` before answering
    pub fn delay_checks(&self, delay: Duration) {
        *self.checks_delay.lock().unwrap() = Some(delay);
    }

    /// Append a failing `list_checks` response
    pub fn queue_checks_error(&self, msg: &str) {
        self.checks
            .lock()
            .unwrap()
            .push_back(ChecksResponse::Err(msg.to_string()));
    }

    /// Set the result `merge_pr` returns
    pub fn set_merge_response(&self, result: MergeResult) {
        *self.merge_response.lock().unwrap() = Some(result);
    }

    // === Call inspection ===

    pub fn get_pr_calls(&self) -> Vec<u64> {
        self.get_pr_calls.lock().unwrap().clone()
    }

    /// Timestamps (tokio clock) of every `list_checks` call
    pub fn list_checks_calls(&self) -> Vec<Instant> {
        self.list_checks_calls.lock().unwrap().clone()
    }

    pub fn create_pr_calls(&self) -> Vec<NewPullRequest> {
        self.create_pr_calls.lock().unwrap().clone()
    }

    pub fn update_pr_calls(&self) -> Vec<UpdatePrCall> {
        self.update_pr_calls.lock().unwrap().clone()
    }

    pub fn merge_pr_calls(&self) -> Vec<MergePrCall> {
        self.merge_pr_calls.lock().unwrap().clone()
    }

    pub fn rerun_calls(&self) -> Vec<(u64, Vec<u64>)> {
        self.rerun_calls.lock().unwrap().clone()
    }

    pub fn reviewer_calls(&self) -> Vec<(u64, Vec<String>)> {
        self.reviewer_calls.lock().unwrap().clone()
    }

    pub fn label_calls(&self) -> Vec<(u64, Vec<String>)> {
        self.label_calls.lock().unwrap().clone()
    }

    pub fn delete_branch_calls(&self) -> Vec<String> {
        self.delete_branch_calls.lock().unwrap().clone()
    }

    /// Whether any call changed host state
    pub fn mutated(&self) -> bool {
        !self.create_pr_calls.lock().unwrap().is_empty()
            || !self.update_pr_calls.lock().unwrap().is_empty()
            || !self.merge_pr_calls.lock().unwrap().is_empty()
            || !self.rerun_calls.lock().unwrap().is_empty()
            || !self.reviewer_calls.lock().unwrap().is_empty()
            || !self.label_calls.lock().unwrap().is_empty()
            || !self.delete_branch_calls.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn get_pr(&self, pr_number: u64) -> Result<PullRequest> {
        self.get_pr_calls.lock().unwrap().push(pr_number);
        if let Some(msg) = self.error_on_get_pr.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }
        self.prs
            .lock()
            .unwrap()
            .get_mut(&pr_number)
            .and_then(next_scripted)
            .ok_or(Error::PrNotFound(pr_number))
    }

    async fn find_pr_for_branch(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        Ok(self
            .find_pr_responses
            .lock()
            .unwrap()
            .get(head_branch)
            .cloned()
            .flatten())
    }

    async fn create_pr(&self, pr: &NewPullRequest) -> Result<PullRequest> {
        self.create_pr_calls.lock().unwrap().push(pr.clone());
        if let Some(msg) = self.error_on_create_pr.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }
        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        let mut created = crate::common::make_pr(number, &pr.head, &pr.base);
        created.title.clone_from(&pr.title);
        created.body.clone_from(&pr.body);
        if pr.draft {
            created.state = PrState::Draft;
        }
        self.set_pr(created.clone());
        Ok(created)
    }

    async fn update_pr(
        &self,
        pr_number: u64,
        title: Option<&str>,
        body: Option<&str>,
    ) -> Result<PullRequest> {
        self.update_pr_calls.lock().unwrap().push(UpdatePrCall {
            pr_number,
            title: title.map(String::from),
            body: body.map(String::from),
        });
        let mut pr = self.get_pr(pr_number).await?;
        if let Some(title) = title {
            pr.title = title.to_string();
        }
        if let Some(body) = body {
            pr.body = Some(body.to_string());
        }
        Ok(pr)
    }

    async fn merge_pr(
        &self,
        pr_number: u64,
        method: MergeMethod,
        message: Option<&CommitMessage>,
        head_sha: &str,
    ) -> Result<MergeResult> {
        self.merge_pr_calls.lock().unwrap().push(MergePrCall {
            pr_number,
            method,
            message: message.cloned(),
            head_sha: head_sha.to_string(),
        });
        if let Some(msg) = self.error_on_merge_pr.lock().unwrap().as_ref() {
            return Err(Error::GitHubApi(msg.clone()));
        }
        let result = self
            .merge_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(MergeResult {
                merged: true,
                sha: Some("merge-sha".to_string()),
                message: None,
            });
        if result.merged {
            let merged = self
                .prs
                .lock()
                .unwrap()
                .get(&pr_number)
                .and_then(|q| q.back().cloned());
            if let Some(mut pr) = merged {
                pr.state = PrState::Merged;
                self.set_pr(pr);
            }
        }
        Ok(result)
    }

    async fn list_checks(&self, _pr_number: u64) -> Result<CheckRunSet> {
        self.list_checks_calls.lock().unwrap().push(Instant::now());
        let delay = *self.checks_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match next_scripted(&mut self.checks.lock().unwrap()) {
            Some(ChecksResponse::Ok(set)) => Ok(set),
            Some(ChecksResponse::Err(msg)) => Err(Error::Platform(msg)),
            None => Ok(CheckRunSet::default()),
        }
    }

    async fn rerun_checks(&self, pr_number: u64, check_ids: &[u64]) -> Result<()> {
        self.rerun_calls
            .lock()
            .unwrap()
            .push((pr_number, check_ids.to_vec()));
        Ok(())
    }

    async fn add_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()> {
        self.reviewer_calls
            .lock()
            .unwrap()
            .push((pr_number, reviewers.to_vec()));
        if let Some(msg) = self.error_on_add_reviewers.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }
        Ok(())
    }

    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()> {
        self.label_calls
            .lock()
            .unwrap()
            .push((pr_number, labels.to_vec()));
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.delete_branch_calls
            .lock()
            .unwrap()
            .push(branch.to_string());
        if let Some(msg) = self.error_on_delete_branch.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
