//! GitHub credentials
//!
//! A token from `GITHUB_TOKEN`/`GH_TOKEN` wins over the one `gh` has stored.

mod github;

pub use github::{GitHubAuthConfig, get_github_auth};

/// Where a token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// `gh auth token`
    Cli,
    /// Environment variable
    EnvVar,
}

impl std::fmt::Display for AuthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "gh CLI"),
            Self::EnvVar => write!(f, "environment"),
        }
    }
}
