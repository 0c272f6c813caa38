//! Cleanup of model output

/// Prompt tags that models sometimes echo back
const LEAKED_TAGS: &[&str] = &[
    "<git-status>",
    "</git-status>",
    "<git_status>",
    "</git_status>",
    "<git-diff>",
    "</git-diff>",
    "<git_diff>",
    "</git_diff>",
    "<repository_context>",
    "</repository_context>",
    "<instructions>",
    "</instructions>",
    "<format>",
    "</format>",
    "<conventions>",
    "</conventions>",
    "<hint>",
    "</hint>",
    "<language_instructions>",
    "</language_instructions>",
];

/// Preambles that precede the actual message; longest first
const INDICATORS: &[&str] = &[
    "# Your commit message:",
    "Here's the commit message:",
    "The commit message is:",
    "Final commit message:",
    "Your commit message:",
    "Here's the message:",
    "# Commit Message",
    "Commit message:",
    "The message is:",
    "Final message:",
    "# Your message:",
    "Your message:",
    "# Message",
    "Message:",
];

/// Strip leaked tags, leading indicators and a surrounding code fence
pub fn clean_output(raw: &str) -> String {
    let mut text = raw.to_string();
    for tag in LEAKED_TAGS {
        text = text.replace(tag, "");
    }

    let mut text = text.trim();
    // Only the last indicator counts; anything before it is preamble
    if let Some((pos, len)) = INDICATORS
        .iter()
        .filter_map(|ind| text.rfind(ind).map(|pos| (pos, ind.len())))
        .max_by_key(|(pos, _)| *pos)
    {
        text = text[pos + len..].trim();
    }

    strip_fence(text).trim().to_string()
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop an info string such as ```markdown
    match inner.split_once('\n') {
        Some((info, body)) if !info.trim().contains(' ') => body,
        _ => inner,
    }
}
