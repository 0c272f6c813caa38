//! Mock repository for testing
//!
//! Scripted in the same style as the platform mock: queues of responses for
//! the history-rewriting calls and an ordered call log for verification.

#![allow(dead_code)]

use async_trait::async_trait;
use auto_pr::error::{Error, Result};
use auto_pr::vcs::{ConflictOperation, FileResolution, OperationStatus, PushMode, VcsService};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Call record for `push`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCall {
    pub remote: String,
    pub branch: String,
    pub mode: PushMode,
}

/// In-memory stand-in for a git checkout
///
/// A clean rebase, merge or continue moves the head to a new commit id
/// (`rewritten-N`), so the lease check sees a rewritten tip.
pub struct MockVcs {
    root: PathBuf,
    branch: Mutex<String>,
    head: Mutex<String>,
    clean: Mutex<bool>,
    remote_url: String,
    remote_tips: Mutex<HashMap<String, String>>,
    ancestry: Mutex<HashSet<(String, String)>>,
    diff: Mutex<String>,
    subjects: Mutex<Vec<String>>,
    ahead_behind: Mutex<(usize, usize)>,
    rewrites: Mutex<u32>,
    // Scripts
    trial_merges: Mutex<VecDeque<Vec<String>>>,
    operation_results: Mutex<VecDeque<OperationStatus>>,
    continue_results: Mutex<VecDeque<OperationStatus>>,
    conflicted: Mutex<VecDeque<Vec<String>>>,
    // Call tracking
    calls: Mutex<Vec<String>>,
    pushes: Mutex<Vec<PushCall>>,
    resolved_files: Mutex<Vec<(String, FileResolution)>>,
    // Error injection
    error_on_push: Mutex<Option<String>>,
    error_on_checkout: Mutex<Option<String>>,
    error_on_ahead_behind: Mutex<Option<String>>,
}

impl MockVcs {
    /// Repository with `branch` checked out at commit `head`
    pub fn new(branch: &str, head: &str) -> Self {
        Self {
            root: PathBuf::from("/repo"),
            branch: Mutex::new(branch.to_string()),
            head: Mutex::new(head.to_string()),
            clean: Mutex::new(true),
            remote_url: "git@github.com:acme/widgets.git".to_string(),
            remote_tips: Mutex::new(HashMap::from([(branch.to_string(), head.to_string())])),
            ancestry: Mutex::new(HashSet::new()),
            diff: Mutex::new("diff --git a/src/lib.rs b/src/lib.rs\n+fn added() {}\n".to_string()),
            subjects: Mutex::new(vec!["Add retry backoff".to_string()]),
            ahead_behind: Mutex::new((1, 0)),
            rewrites: Mutex::new(0),
            trial_merges: Mutex::new(VecDeque::new()),
            operation_results: Mutex::new(VecDeque::new()),
            continue_results: Mutex::new(VecDeque::new()),
            conflicted: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
            resolved_files: Mutex::new(Vec::new()),
            error_on_push: Mutex::new(None),
            error_on_checkout: Mutex::new(None),
            error_on_ahead_behind: Mutex::new(None),
        }
    }

    // === Setup ===

    pub fn set_clean(&self, clean: bool) {
        *self.clean.lock().unwrap() = clean;
    }

    pub fn set_remote_tip(&self, branch: &str, tip: Option<&str>) {
        let mut tips = self.remote_tips.lock().unwrap();
        match tip {
            Some(tip) => tips.insert(branch.to_string(), tip.to_string()),
            None => tips.remove(branch),
        };
    }

    /// Make `ancestor` reachable from `descendant`; unrelated commits are not
    pub fn mark_ancestor(&self, ancestor: &str, descendant: &str) {
        self.ancestry
            .lock()
            .unwrap()
            .insert((ancestor.to_string(), descendant.to_string()));
    }

    pub fn set_diff(&self, diff: &str) {
        *self.diff.lock().unwrap() = diff.to_string();
    }

    pub fn set_subjects(&self, subjects: &[&str]) {
        *self.subjects.lock().unwrap() = subjects.iter().map(ToString::to_string).collect();
    }

    pub fn set_ahead_behind(&self, ahead: usize, behind: usize) {
        *self.ahead_behind.lock().unwrap() = (ahead, behind);
    }

    /// Paths the next `trial_merge` reports (empty when the script runs out)
    pub fn queue_trial_merge(&self, paths: &[&str]) {
        self.trial_merges.lock().unwrap().push_back(owned(paths));
    }

    /// Result of the next `rebase` or `merge` (clean when the script runs out)
    pub fn queue_operation(&self, status: OperationStatus) {
        self.operation_results.lock().unwrap().push_back(status);
    }

    /// Result of the next `continue_operation` (clean when the script runs out)
    pub fn queue_continue(&self, status: OperationStatus) {
        self.continue_results.lock().unwrap().push_back(status);
    }

    /// Paths the next `conflicted_files` reports (empty when the script runs out)
    pub fn queue_conflicted(&self, paths: &[&str]) {
        self.conflicted.lock().unwrap().push_back(owned(paths));
    }

    pub fn fail_push(&self, msg: &str) {
        *self.error_on_push.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_checkout(&self, msg: &str) {
        *self.error_on_checkout.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_ahead_behind(&self, msg: &str) {
        *self.error_on_ahead_behind.lock().unwrap() = Some(msg.to_string());
    }

    // === Inspection ===

    /// Ordered log of mutating and fetch calls, e.g. `"reset_hard abc"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> Vec<PushCall> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn resolved_files(&self) -> Vec<(String, FileResolution)> {
        self.resolved_files.lock().unwrap().clone()
    }

    pub fn head(&self) -> String {
        self.head.lock().unwrap().clone()
    }

    pub fn branch(&self) -> String {
        self.branch.lock().unwrap().clone()
    }

    /// Whether anything touched the branch or the remote
    pub fn mutated(&self) -> bool {
        self.calls().iter().any(|c| {
            !(c.starts_with("fetch") || c.starts_with("trial_merge"))
        })
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn rewrite_head(&self) {
        let mut rewrites = self.rewrites.lock().unwrap();
        *rewrites += 1;
        *self.head.lock().unwrap() = format!("rewritten-{rewrites}");
    }

    fn finish_operation(&self, status: OperationStatus) -> OperationStatus {
        if status == OperationStatus::Clean {
            self.rewrite_head();
        }
        status
    }
}

fn owned(paths: &[&str]) -> Vec<String> {
    paths.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl VcsService for MockVcs {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn current_branch(&self) -> Result<String> {
        Ok(self.branch())
    }

    async fn head_commit(&self) -> Result<String> {
        Ok(self.head())
    }

    async fn remote_url(&self, _remote: &str) -> Result<String> {
        Ok(self.remote_url.clone())
    }

    async fn remote_tip(&self, _remote: &str, branch: &str) -> Result<Option<String>> {
        Ok(self.remote_tips.lock().unwrap().get(branch).cloned())
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        Ok(ancestor == descendant
            || self
                .ancestry
                .lock()
                .unwrap()
                .contains(&(ancestor.to_string(), descendant.to_string())))
    }

    async fn fetch(&self, remote: &str, branches: &[&str]) -> Result<()> {
        self.record(format!("fetch {remote} {}", branches.join(" ")));
        Ok(())
    }

    async fn is_worktree_clean(&self) -> Result<bool> {
        Ok(*self.clean.lock().unwrap())
    }

    async fn trial_merge(&self, upstream: &str) -> Result<Vec<String>> {
        self.record(format!("trial_merge {upstream}"));
        Ok(self.trial_merges.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn rebase(&self, upstream: &str) -> Result<OperationStatus> {
        self.record(format!("rebase {upstream}"));
        let status = self
            .operation_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OperationStatus::Clean);
        Ok(self.finish_operation(status))
    }

    async fn merge(&self, upstream: &str) -> Result<OperationStatus> {
        self.record(format!("merge {upstream}"));
        let status = self
            .operation_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OperationStatus::Clean);
        Ok(self.finish_operation(status))
    }

    async fn conflicted_files(&self) -> Result<Vec<String>> {
        Ok(self.conflicted.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn resolve_file(
        &self,
        path: &str,
        resolution: FileResolution,
        _operation: ConflictOperation,
    ) -> Result<()> {
        self.record(format!("resolve_file {path}"));
        self.resolved_files
            .lock()
            .unwrap()
            .push((path.to_string(), resolution));
        Ok(())
    }

    async fn continue_operation(&self, operation: ConflictOperation) -> Result<OperationStatus> {
        self.record(format!("continue {operation}"));
        let status = self
            .continue_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OperationStatus::Clean);
        Ok(self.finish_operation(status))
    }

    async fn abort_operation(&self, operation: ConflictOperation) -> Result<()> {
        self.record(format!("abort {operation}"));
        Ok(())
    }

    async fn reset_hard(&self, commit: &str) -> Result<()> {
        self.record(format!("reset_hard {commit}"));
        *self.head.lock().unwrap() = commit.to_string();
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str, mode: PushMode) -> Result<()> {
        self.record(format!("push {remote} {branch}"));
        if let Some(msg) = self.error_on_push.lock().unwrap().as_ref() {
            return Err(Error::Vcs(msg.clone()));
        }
        self.pushes.lock().unwrap().push(PushCall {
            remote: remote.to_string(),
            branch: branch.to_string(),
            mode,
        });
        Ok(())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.record(format!("checkout {branch}"));
        if let Some(msg) = self.error_on_checkout.lock().unwrap().as_ref() {
            return Err(Error::Vcs(msg.clone()));
        }
        *self.branch.lock().unwrap() = branch.to_string();
        Ok(())
    }

    async fn delete_local_branch(&self, branch: &str) -> Result<()> {
        self.record(format!("delete_local_branch {branch}"));
        Ok(())
    }

    async fn ahead_behind(&self, _base: &str, _head: &str) -> Result<(usize, usize)> {
        if let Some(msg) = self.error_on_ahead_behind.lock().unwrap().as_ref() {
            return Err(Error::Vcs(msg.clone()));
        }
        Ok(*self.ahead_behind.lock().unwrap())
    }

    async fn diff(&self, _base: &str) -> Result<String> {
        Ok(self.diff.lock().unwrap().clone())
    }

    async fn log_subjects(&self, _base: &str) -> Result<Vec<String>> {
        Ok(self.subjects.lock().unwrap().clone())
    }
}
