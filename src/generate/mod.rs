//! Text generation capability
//!
//! [`TextGenerator`] is a black box that turns a [`GenerationContext`] into
//! text. [`ChatCompletionsGenerator`] talks to any OpenAI-compatible
//! endpoint; prompts are built in [`prompt`] and replies cleaned by
//! [`clean_output`].

mod clean;
mod openai;
pub mod prompt;

pub use clean::clean_output;
pub use openai::{ChatCompletionsGenerator, GeneratorSettings};

use crate::error::Result;
use async_trait::async_trait;

/// What is being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// PR title only
    PrTitle,
    /// PR title line followed by a description
    PrDescription,
    /// Merge commit message
    MergeMessage,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrTitle => write!(f, "PR title"),
            Self::PrDescription => write!(f, "PR description"),
            Self::MergeMessage => write!(f, "merge message"),
        }
    }
}

/// Inputs for one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationContext {
    /// What to write
    pub kind: MessageKind,
    /// Diff, commit log or PR summary the text describes
    pub summary: String,
    /// Operator hint
    pub hint: Option<String>,
    /// Output language; `None` means English
    pub language: Option<String>,
    /// Operator feedback, oldest first
    pub feedback: Vec<String>,
}

impl GenerationContext {
    /// Context with no hint, language or feedback
    pub fn new(kind: MessageKind, summary: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            hint: None,
            language: None,
            feedback: Vec::new(),
        }
    }

    /// Set the operator hint; blank hints are dropped
    #[must_use]
    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        self.hint = hint.filter(|h| !h.trim().is_empty());
        self
    }

    /// Set the output language
    #[must_use]
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }
}

/// Generate text from a context
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce raw text; callers clean it with [`clean_output`]
    async fn generate(&self, context: &GenerationContext) -> Result<String>;
}
