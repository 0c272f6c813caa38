//! Scripted operator
//!
//! Each decision point pops from its own queue. Running out of script is an
//! error, so a test fails loudly when the workflow asks something unexpected.

#![allow(dead_code)]

use auto_pr::checks::{CheckAction, CheckOutcome, CheckVerdict};
use auto_pr::conflict::ConflictApproach;
use auto_pr::error::{Error, Result};
use auto_pr::operator::Operator;
use auto_pr::refine::MessageDraft;
use auto_pr::vcs::FileResolution;
use std::collections::VecDeque;
use std::sync::Mutex;

/// What the operator was offered at a check prompt
#[derive(Debug, Clone)]
pub struct CheckPrompt {
    pub verdict: CheckVerdict,
    pub allowed: Vec<CheckAction>,
}

#[derive(Default)]
pub struct ScriptedOperator {
    decisions: Mutex<VecDeque<String>>,
    edits: Mutex<VecDeque<Option<String>>>,
    check_actions: Mutex<VecDeque<CheckAction>>,
    approaches: Mutex<VecDeque<ConflictApproach>>,
    file_resolutions: Mutex<VecDeque<FileResolution>>,
    manual: Mutex<VecDeque<bool>>,
    confirms: Mutex<VecDeque<bool>>,
    // Call tracking
    presented: Mutex<Vec<MessageDraft>>,
    notices: Mutex<Vec<String>>,
    check_prompts: Mutex<Vec<CheckPrompt>>,
    file_prompts: Mutex<Vec<(String, usize)>>,
    confirm_prompts: Mutex<Vec<String>>,
}

fn pop<T>(queue: &Mutex<VecDeque<T>>, what: &str) -> Result<T> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .ok_or_else(|| Error::Internal(format!("unscripted {what}")))
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    // === Script builders ===

    pub fn decisions(self, inputs: &[&str]) -> Self {
        self.decisions
            .lock()
            .unwrap()
            .extend(inputs.iter().map(ToString::to_string));
        self
    }

    pub fn edits(self, edits: &[Option<&str>]) -> Self {
        self.edits
            .lock()
            .unwrap()
            .extend(edits.iter().map(|e| e.map(ToString::to_string)));
        self
    }

    pub fn check_actions(self, actions: &[CheckAction]) -> Self {
        self.check_actions.lock().unwrap().extend(actions);
        self
    }

    pub fn approaches(self, approaches: &[ConflictApproach]) -> Self {
        self.approaches.lock().unwrap().extend(approaches);
        self
    }

    pub fn file_resolutions(self, resolutions: &[FileResolution]) -> Self {
        self.file_resolutions.lock().unwrap().extend(resolutions);
        self
    }

    pub fn manual(self, answers: &[bool]) -> Self {
        self.manual.lock().unwrap().extend(answers);
        self
    }

    pub fn confirms(self, answers: &[bool]) -> Self {
        self.confirms.lock().unwrap().extend(answers);
        self
    }

    // === Inspection ===

    pub fn presented(&self) -> Vec<MessageDraft> {
        self.presented.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn check_prompts(&self) -> Vec<CheckPrompt> {
        self.check_prompts.lock().unwrap().clone()
    }

    pub fn file_prompts(&self) -> Vec<(String, usize)> {
        self.file_prompts.lock().unwrap().clone()
    }

    pub fn confirm_prompts(&self) -> Vec<String> {
        self.confirm_prompts.lock().unwrap().clone()
    }
}

impl Operator for ScriptedOperator {
    fn present_draft(&self, draft: &MessageDraft) {
        self.presented.lock().unwrap().push(draft.clone());
    }

    fn read_decision(&self) -> Result<String> {
        pop(&self.decisions, "decision")
    }

    fn edit_text(&self, _current: &str) -> Result<Option<String>> {
        pop(&self.edits, "edit")
    }

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn choose_check_action(
        &self,
        outcome: &CheckOutcome,
        allowed: &[CheckAction],
    ) -> Result<CheckAction> {
        self.check_prompts.lock().unwrap().push(CheckPrompt {
            verdict: outcome.verdict.clone(),
            allowed: allowed.to_vec(),
        });
        pop(&self.check_actions, "check action")
    }

    fn choose_conflict_approach(&self, _paths: &[String]) -> Result<ConflictApproach> {
        pop(&self.approaches, "conflict approach")
    }

    fn choose_file_resolution(&self, path: &str, remaining: usize) -> Result<FileResolution> {
        self.file_prompts
            .lock()
            .unwrap()
            .push((path.to_string(), remaining));
        pop(&self.file_resolutions, "file resolution")
    }

    fn wait_for_manual_resolution(&self, _paths: &[String]) -> Result<bool> {
        pop(&self.manual, "manual resolution")
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.confirm_prompts.lock().unwrap().push(prompt.to_string());
        pop(&self.confirms, "confirmation")
    }
}
