//! Remote URL parsing

use crate::error::{Error, Result};
use crate::types::PlatformConfig;
use regex::Regex;
use url::Url;

/// `git@host:owner/repo.git`
const SCP_LIKE: &str = r"^(?:[\w.-]+@)?([\w.-]+):([\w.-]+)/([\w.-]+?)(?:\.git)?/?$";

/// Extract owner, repo and host from a git remote URL
///
/// Accepts HTTPS, `ssh://` and scp-like SSH forms. `github.com` maps to
/// `host: None`; any other host is treated as GitHub Enterprise.
pub fn parse_repo_info(remote_url: &str) -> Result<PlatformConfig> {
    let remote_url = remote_url.trim();
    let (host, owner, repo) = if remote_url.contains("://") {
        let url = Url::parse(remote_url).map_err(|_| Error::RemoteUrl(remote_url.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::RemoteUrl(remote_url.to_string()))?
            .to_string();
        let mut segments = url
            .path_segments()
            .ok_or_else(|| Error::RemoteUrl(remote_url.to_string()))?
            .filter(|s| !s.is_empty());
        let (Some(owner), Some(repo), None) = (segments.next(), segments.next(), segments.next())
        else {
            return Err(Error::RemoteUrl(remote_url.to_string()));
        };
        (
            host,
            owner.to_string(),
            repo.trim_end_matches(".git").to_string(),
        )
    } else {
        let scp_like = Regex::new(SCP_LIKE).map_err(|e| Error::Internal(e.to_string()))?;
        let caps = scp_like
            .captures(remote_url)
            .ok_or_else(|| Error::RemoteUrl(remote_url.to_string()))?;
        (caps[1].to_string(), caps[2].to_string(), caps[3].to_string())
    };

    if owner.is_empty() || repo.is_empty() {
        return Err(Error::RemoteUrl(remote_url.to_string()));
    }

    Ok(PlatformConfig {
        owner,
        repo,
        host: (host != "github.com").then_some(host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https() {
        let config = parse_repo_info("https://github.com/acme/widgets.git").unwrap();
        assert_eq!(config.owner, "acme");
        assert_eq!(config.repo, "widgets");
        assert!(config.host.is_none());
    }

    #[test]
    fn test_parse_scp_like_ssh() {
        let config = parse_repo_info("git@github.com:acme/widgets.git").unwrap();
        assert_eq!(config.owner, "acme");
        assert_eq!(config.repo, "widgets");
    }

    #[test]
    fn test_parse_ssh_scheme_enterprise() {
        let config = parse_repo_info("ssh://git@git.corp.example/team/service").unwrap();
        assert_eq!(config.host.as_deref(), Some("git.corp.example"));
        assert_eq!(config.repo, "service");
    }

    #[test]
    fn test_reject_garbage() {
        assert!(matches!(
            parse_repo_info("not a remote"),
            Err(Error::RemoteUrl(_))
        ));
        assert!(parse_repo_info("https://github.com/only-owner").is_err());
    }
}
