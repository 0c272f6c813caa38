//! Prompt construction

use crate::generate::{GenerationContext, MessageKind};
use std::fmt::Write as _;

/// Longest summary sent to the model; diffs beyond this are cut
pub const MAX_SUMMARY_CHARS: usize = 60_000;

/// System and user messages for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// System message
    pub system: String,
    /// User message
    pub user: String,
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- system ---")?;
        writeln!(f, "{}", self.system)?;
        writeln!(f, "--- user ---")?;
        write!(f, "{}", self.user)
    }
}

fn format_rules(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::PrTitle => {
            "Write a single-line pull request title of at most 72 characters. \
             Use the imperative mood. Output only the title."
        }
        MessageKind::PrDescription => {
            "Write a pull request. The first line is the title (at most 72 \
             characters, imperative mood). Leave one blank line, then write a \
             Markdown description with a short summary paragraph and a bullet \
             list of the notable changes. Output only the pull request text."
        }
        MessageKind::MergeMessage => {
            "Write a merge commit message. The first line is a conventional \
             commit subject (type: summary) of at most 72 characters. Leave one \
             blank line, then summarize what the pull request changes in a few \
             wrapped lines. Output only the message."
        }
    }
}

/// Cut `text` to at most `max` characters on a char boundary
fn truncate(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Build the prompt for a context
pub fn build(context: &GenerationContext) -> Prompt {
    let system = format!(
        "You are an experienced engineer writing {} text for a code review tool.\n\
         <instructions>\n{}\n</instructions>",
        context.kind,
        format_rules(context.kind)
    );

    let mut user = String::new();
    let (summary, truncated) = truncate(&context.summary, MAX_SUMMARY_CHARS);
    let _ = writeln!(user, "<git_diff>\n{summary}");
    if truncated {
        let _ = writeln!(user, "[diff truncated]");
    }
    let _ = writeln!(user, "</git_diff>");

    if let Some(ref hint) = context.hint {
        let _ = writeln!(user, "<hint>\n{hint}\n</hint>");
    }
    if let Some(ref language) = context.language {
        let _ = writeln!(
            user,
            "<language_instructions>\nWrite the text in {language}.\n</language_instructions>"
        );
    }
    if !context.feedback.is_empty() {
        let _ = writeln!(user, "Apply all of the following feedback, in order:");
        for (i, item) in context.feedback.iter().enumerate() {
            let _ = writeln!(user, "{}. {item}", i + 1);
        }
    }

    Prompt { system, user }
}
