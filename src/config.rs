//! Configuration files
//!
//! Loaded from `~/.config/auto-pr/config.toml` and then `.auto-pr.toml` at the
//! repository root. A section present in the repository file replaces the
//! same section from the user file. Everything is optional.

use crate::checks::{CheckMonitorConfig, FlakyPolicy, RetryPolicy};
use crate::conflict::ConflictStrategy;
use crate::error::{Error, Result};
use crate::types::MergeMethod;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Repository-level config file name
pub const REPO_CONFIG_FILE: &str = ".auto-pr.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// CI polling settings
    pub checks: ChecksConfig,
    /// Merge defaults
    pub merge: MergeConfig,
    /// PR creation defaults
    pub pr: PrConfig,
    /// Language model settings
    pub generation: GenerationConfig,
}

/// `[checks]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Give up waiting after this many seconds
    pub timeout_secs: u64,
    /// Seconds between polls
    pub poll_interval_secs: u64,
    /// Check names known to be unreliable
    pub flaky_checks: Vec<String>,
    /// Regex patterns matched against check names
    pub flaky_patterns: Vec<String>,
    /// Attempts per poll before reporting a polling error
    pub retry_attempts: u32,
    /// First backoff delay
    pub retry_base_delay_ms: u64,
    /// Backoff ceiling
    pub retry_max_delay_ms: u64,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            poll_interval_secs: 10,
            flaky_checks: Vec::new(),
            flaky_patterns: ["e2e", "integration", "visual", "flaky", "unstable"]
                .into_iter()
                .map(String::from)
                .collect(),
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 5_000,
        }
    }
}

impl ChecksConfig {
    /// Build the monitor configuration, validating flaky patterns
    pub fn monitor_config(&self) -> Result<CheckMonitorConfig> {
        let flaky = FlakyPolicy::new(self.flaky_checks.clone(), &self.flaky_patterns)?;
        Ok(CheckMonitorConfig::new(
            Duration::from_secs(self.timeout_secs),
            Duration::from_secs(self.poll_interval_secs),
        )
        .with_retry(RetryPolicy {
            attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        })
        .with_flaky(flaky))
    }
}

/// `[merge]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Default merge method
    pub method: MergeMethod,
    /// Default conflict strategy
    pub conflict_strategy: ConflictStrategy,
    /// Delete the head branch after merging
    pub delete_branch: bool,
    /// Sync with base before checking CI
    pub sync: bool,
    /// Wait for checks instead of taking a single snapshot
    pub wait: bool,
    /// Approvals needed before merging; change requests always block
    pub required_approvals: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            method: MergeMethod::Merge,
            conflict_strategy: ConflictStrategy::Interactive,
            delete_branch: true,
            sync: false,
            wait: true,
            required_approvals: 0,
        }
    }
}

/// `[pr]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrConfig {
    /// Default base branch
    pub base: String,
    /// Reviewers requested on new PRs
    pub reviewers: Vec<String>,
    /// Labels added to new PRs
    pub labels: Vec<String>,
    /// Create PRs as drafts
    pub draft: bool,
}

impl Default for PrConfig {
    fn default() -> Self {
        Self {
            base: "main".to_string(),
            reviewers: Vec::new(),
            labels: Vec::new(),
            draft: false,
        }
    }
}

/// `[generation]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible API root
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Output language
    pub language: Option<String>,
    /// Completion token cap
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            language: None,
            max_tokens: 1024,
        }
    }
}

/// On-disk shape; sections stay optional so files can be layered
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    checks: Option<ChecksConfig>,
    merge: Option<MergeConfig>,
    pr: Option<PrConfig>,
    generation: Option<GenerationConfig>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found");
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let file = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(Some(file))
    }

    fn overlay(self, top: Self) -> Self {
        Self {
            checks: top.checks.or(self.checks),
            merge: top.merge.or(self.merge),
            pr: top.pr.or(self.pr),
            generation: top.generation.or(self.generation),
        }
    }

    fn into_config(self) -> Config {
        Config {
            checks: self.checks.unwrap_or_default(),
            merge: self.merge.unwrap_or_default(),
            pr: self.pr.unwrap_or_default(),
            generation: self.generation.unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load user config, then repository config from `repo_root`
    pub fn load(repo_root: &Path) -> Result<Self> {
        Self::load_from(user_config_path().as_deref(), &repo_root.join(REPO_CONFIG_FILE))
    }

    /// Load from explicit paths; missing files are skipped
    pub fn load_from(user: Option<&Path>, repo: &Path) -> Result<Self> {
        let user_file = match user {
            Some(path) => ConfigFile::read(path)?.unwrap_or_default(),
            None => ConfigFile::default(),
        };
        let repo_file = ConfigFile::read(repo)?.unwrap_or_default();
        Ok(user_file.overlay(repo_file).into_config())
    }
}

/// `~/.config/auto-pr/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("auto-pr").join("config.toml"))
}
