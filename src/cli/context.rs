//! Shared command context for CLI commands
//!
//! Extracts the setup shared by create-pr, update-pr, merge-pr and status.

use auto_pr::checks::CheckMonitorConfig;
use auto_pr::config::Config;
use auto_pr::error::Result;
use auto_pr::generate::{ChatCompletionsGenerator, GeneratorSettings};
use auto_pr::operator::{AutoOperator, Operator};
use auto_pr::platform::{PlatformService, create_platform_service, parse_repo_info};
use auto_pr::vcs::{GitCli, VcsService};
use std::io::IsTerminal;
use std::path::Path;
use tracing::debug;

use crate::cli::prompt::ConsoleOperator;

/// Shared context for commands that talk to the PR host
///
/// - Opening the git repository
/// - Loading user and repository config
/// - Detecting the host from the remote URL and creating the service
pub struct CommandContext {
    /// The git repository
    pub vcs: GitCli,
    /// Merged configuration
    pub config: Config,
    /// PR host
    pub platform: Box<dyn PlatformService>,
    /// Selected remote name
    pub remote_name: String,
}

impl CommandContext {
    /// Create a new command context
    pub async fn new(path: &Path, remote: Option<&str>) -> Result<Self> {
        let vcs = GitCli::open(path).await?;
        let config = Config::load(vcs.root())?;

        let remote_name = remote.unwrap_or("origin").to_string();
        let url = vcs.remote_url(&remote_name).await?;
        let platform_config = parse_repo_info(&url)?;
        debug!(
            owner = %platform_config.owner,
            repo = %platform_config.repo,
            remote = %remote_name,
            "detected repository"
        );
        let platform = create_platform_service(&platform_config).await?;

        Ok(Self {
            vcs,
            config,
            platform,
            remote_name,
        })
    }

    /// Generator from the `[generation]` section, with an optional model
    /// override
    pub fn generator(&self, model: Option<&str>) -> Result<ChatCompletionsGenerator> {
        let settings = GeneratorSettings::from_config(&self.config.generation, model)?;
        ChatCompletionsGenerator::new(settings)
    }

    /// Poll settings from the `[checks]` section
    pub fn check_config(&self) -> Result<CheckMonitorConfig> {
        self.config.checks.monitor_config()
    }

    /// `language` flag, falling back to config
    pub fn language(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.config.generation.language.clone())
    }
}

/// Terminal prompts when attached to one, otherwise the non-interactive
/// operator
pub fn operator() -> Box<dyn Operator> {
    if std::io::stdin().is_terminal() && std::io::stdout().is_terminal() {
        Box::new(ConsoleOperator)
    } else {
        debug!("no terminal attached, using non-interactive operator");
        Box::new(AutoOperator)
    }
}
