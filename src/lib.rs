//! auto-pr: drive pull requests from creation to merge
//!
//! The library holds the PR lifecycle core:
//!
//! - [`checks`] - CI polling with flaky/blocking classification
//! - [`conflict`] - conflict detection and resolution strategies
//! - [`refine`] - the confirm/reroll/edit/feedback loop around generated text
//! - [`merge`] - the merge orchestrator composing the three above
//! - [`workflow`] - the per-PR lifecycle derived from the PR host
//!
//! External systems (PR host, git, language model) are reached through the
//! capability traits in [`platform`], [`vcs`] and [`generate`].

pub mod auth;
pub mod checks;
pub mod config;
pub mod conflict;
pub mod error;
pub mod generate;
pub mod merge;
pub mod operator;
pub mod platform;
pub mod progress;
pub mod refine;
pub mod types;
pub mod vcs;
pub mod workflow;
