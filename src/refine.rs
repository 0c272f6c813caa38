//! Confirm / reroll / edit / feedback loop around generated text
//!
//! No mutating action that needs generated text happens until the operator
//! accepts a draft here (or auto-confirm accepts the first one).

use crate::error::{Error, Result};
use crate::generate::{GenerationContext, TextGenerator, clean_output};
use crate::operator::Operator;
use tracing::{debug, warn};

/// Current draft and everything needed to regenerate it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    /// Current text
    pub text: String,
    /// Generation inputs, including all feedback so far
    pub context: GenerationContext,
    /// Successful generations so far (1 for the first draft)
    pub revision: u32,
}

/// Parsed operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// `y` / `yes`
    Accept,
    /// `n` / `no`
    Cancel,
    /// `r` / `reroll`
    Reroll,
    /// `e` / `edit`
    Edit,
    /// Empty input
    Redisplay,
    /// Anything else
    Feedback(String),
}

impl Decision {
    /// Parse input; keywords are case-insensitive and trimmed
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Self::Redisplay,
            "y" | "yes" => Self::Accept,
            "n" | "no" => Self::Cancel,
            "r" | "reroll" => Self::Reroll,
            "e" | "edit" => Self::Edit,
            _ => Self::Feedback(trimmed.to_string()),
        }
    }
}

/// How the loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineOutcome {
    /// Final text
    Accepted(String),
    /// Operator declined
    Cancelled,
}

#[derive(Debug)]
enum RefineState {
    Drafting,
    AwaitingDecision,
    Regenerating,
    Editing,
    Accepted(String),
    Cancelled,
}

/// Drives a draft to acceptance or cancellation
pub struct MessageRefinementLoop<'a> {
    generator: &'a dyn TextGenerator,
    operator: &'a dyn Operator,
    auto_confirm: bool,
}

impl<'a> MessageRefinementLoop<'a> {
    /// Create a loop
    pub fn new(generator: &'a dyn TextGenerator, operator: &'a dyn Operator) -> Self {
        Self {
            generator,
            operator,
            auto_confirm: false,
        }
    }

    /// Accept the first draft without asking
    #[must_use]
    pub const fn auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    /// Run the loop
    ///
    /// If the first draft cannot be generated the error is returned, since
    /// there is nothing to show. Later generation failures are reported to
    /// the operator and the previous draft is kept.
    pub async fn refine(&self, context: GenerationContext) -> Result<RefineOutcome> {
        let mut state = RefineState::Drafting;
        let mut pending = Some(context);
        let mut draft: Option<MessageDraft> = None;

        loop {
            state = match state {
                RefineState::Accepted(text) => return Ok(RefineOutcome::Accepted(text)),
                RefineState::Cancelled => return Ok(RefineOutcome::Cancelled),
                RefineState::Drafting => {
                    let context = pending
                        .take()
                        .ok_or_else(|| Error::Internal("drafting without a context".into()))?;
                    let text = self.generate(&context).await?;
                    debug!(kind = %context.kind, "first draft ready");
                    let first = MessageDraft {
                        text,
                        context,
                        revision: 1,
                    };
                    let next = if self.auto_confirm {
                        RefineState::Accepted(first.text.clone())
                    } else {
                        RefineState::AwaitingDecision
                    };
                    draft = Some(first);
                    next
                }
                RefineState::AwaitingDecision => {
                    let current = current_draft(&mut draft)?;
                    self.operator.present_draft(current);
                    match Decision::parse(&self.operator.read_decision()?) {
                        Decision::Accept => RefineState::Accepted(current.text.clone()),
                        Decision::Cancel => RefineState::Cancelled,
                        Decision::Reroll => RefineState::Regenerating,
                        Decision::Edit => RefineState::Editing,
                        Decision::Redisplay => RefineState::AwaitingDecision,
                        Decision::Feedback(feedback) => {
                            debug!(revision = current.revision, "feedback received");
                            current.context.feedback.push(feedback);
                            RefineState::Regenerating
                        }
                    }
                }
                RefineState::Regenerating => {
                    let current = current_draft(&mut draft)?;
                    match self.generate(&current.context).await {
                        Ok(text) => {
                            current.text = text;
                            current.revision += 1;
                        }
                        Err(e) => {
                            warn!(error = %e, "regeneration failed, keeping previous draft");
                            self.operator
                                .notify(&format!("{e}; keeping the previous draft"));
                        }
                    }
                    RefineState::AwaitingDecision
                }
                RefineState::Editing => {
                    match self.operator.edit_text(&current_draft(&mut draft)?.text)? {
                        Some(edited) if !edited.trim().is_empty() => {
                            RefineState::Accepted(edited.trim().to_string())
                        }
                        _ => {
                            self.operator.notify("Edit aborted; draft unchanged");
                            RefineState::AwaitingDecision
                        }
                    }
                }
            };
        }
    }

    /// Generate and clean; empty output counts as a failure
    async fn generate(&self, context: &GenerationContext) -> Result<String> {
        let raw = self.generator.generate(context).await.map_err(|e| match e {
            Error::GenerationFailed(_) | Error::Cancelled => e,
            other => Error::GenerationFailed(other.to_string()),
        })?;
        let text = clean_output(&raw);
        if text.is_empty() {
            return Err(Error::GenerationFailed("model returned empty output".into()));
        }
        Ok(text)
    }
}

fn current_draft(draft: &mut Option<MessageDraft>) -> Result<&mut MessageDraft> {
    draft
        .as_mut()
        .ok_or_else(|| Error::Internal("no draft to work on".into()))
}
