//! Terminal styling helpers
//!
//! Output goes through `anstream`, which strips the escape codes when stdout
//! is not a terminal.

use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use std::fmt::Display;

pub const CHECK: &str = "✓";
pub const CROSS: &str = "✗";
pub const ARROW: &str = "→";

/// Semantic colors for any displayable value
pub trait Stylize {
    fn muted(&self) -> String;
    fn emphasis(&self) -> String;
    fn accent(&self) -> String;
    fn warn(&self) -> String;
    fn success(&self) -> String;
    fn error(&self) -> String;
}

impl<T: Display + ?Sized> Stylize for T {
    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    fn emphasis(&self) -> String {
        self.bold().to_string()
    }

    fn accent(&self) -> String {
        self.cyan().to_string()
    }

    fn warn(&self) -> String {
        self.yellow().to_string()
    }

    fn success(&self) -> String {
        self.green().to_string()
    }

    fn error(&self) -> String {
        self.red().to_string()
    }
}

pub fn check() -> String {
    CHECK.success()
}

pub fn cross() -> String {
    CROSS.error()
}

pub fn arrow() -> String {
    ARROW.muted()
}

pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
}

/// Clickable link where the terminal supports it, `text (url)` otherwise
pub fn link(text: &str, url: &str) -> String {
    if url.is_empty() {
        text.to_string()
    } else if supports_hyperlinks::supports_hyperlinks() {
        terminal_link::Link::new(text, url).to_string()
    } else {
        format!("{text} ({})", url.muted())
    }
}
