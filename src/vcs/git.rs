//! `git` command-line implementation of [`VcsService`]

use crate::error::{Error, Result};
use crate::vcs::{ConflictOperation, FileResolution, OperationStatus, PushMode, VcsService};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured output of one git invocation
#[derive(Debug)]
struct GitOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Git repository driven through the `git` binary
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    /// Open the repository containing `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let scratch = Self {
            root: path.to_path_buf(),
        };
        let top = scratch.git(&["rev-parse", "--show-toplevel"]).await?;
        Ok(Self {
            root: PathBuf::from(top.trim()),
        })
    }

    async fn run(&self, args: &[&str]) -> Result<GitOutput> {
        debug!(?args, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .env("GIT_EDITOR", "true")
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| Error::Vcs(format!("failed to run git: {e}")))?;
        Ok(GitOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run git, failing on a non-zero exit
    async fn git(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::Vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                output.stderr.trim()
            )))
        }
    }

    /// Map a failed rebase/merge step to conflicts, or to an error when
    /// nothing is actually conflicted
    async fn stopped(&self, args: &[&str], output: GitOutput) -> Result<OperationStatus> {
        if output.success {
            return Ok(OperationStatus::Clean);
        }
        let conflicted = self.conflicted_files().await?;
        if conflicted.is_empty() {
            return Err(Error::Vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                output.stderr.trim()
            )));
        }
        debug!(count = conflicted.len(), "operation stopped on conflicts");
        Ok(OperationStatus::Conflicted(conflicted))
    }
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl VcsService for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn current_branch(&self) -> Result<String> {
        let name = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let name = name.trim();
        if name == "HEAD" {
            return Err(Error::Vcs("HEAD is detached".to_string()));
        }
        Ok(name.to_string())
    }

    async fn head_commit(&self) -> Result<String> {
        Ok(self.git(&["rev-parse", "HEAD"]).await?.trim().to_string())
    }

    async fn remote_url(&self, remote: &str) -> Result<String> {
        Ok(self
            .git(&["remote", "get-url", remote])
            .await?
            .trim()
            .to_string())
    }

    async fn remote_tip(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        let reference = format!("refs/remotes/{remote}/{branch}");
        let output = self
            .run(&["rev-parse", "--verify", "--quiet", &reference])
            .await?;
        Ok(output
            .success
            .then(|| output.stdout.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let args = ["merge-base", "--is-ancestor", ancestor, descendant];
        let output = self.run(&args).await?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(Error::Vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                output.stderr.trim()
            ))),
        }
    }

    async fn fetch(&self, remote: &str, branches: &[&str]) -> Result<()> {
        let mut args = vec!["fetch", remote];
        args.extend_from_slice(branches);
        self.git(&args).await?;
        Ok(())
    }

    async fn is_worktree_clean(&self) -> Result<bool> {
        let status = self
            .git(&["status", "--porcelain", "--untracked-files=no"])
            .await?;
        Ok(status.trim().is_empty())
    }

    async fn trial_merge(&self, upstream: &str) -> Result<Vec<String>> {
        let args = ["merge", "--no-commit", "--no-ff", upstream];
        let output = self.run(&args).await?;
        let conflicted = if output.success {
            Vec::new()
        } else {
            self.conflicted_files().await?
        };

        // "Already up to date" leaves no merge in progress to abort
        let abort = self.run(&["merge", "--abort"]).await?;
        if !abort.success {
            debug!(stderr = %abort.stderr.trim(), "nothing to abort after trial merge");
        }

        if !output.success && conflicted.is_empty() {
            return Err(Error::Vcs(format!(
                "trial merge with {upstream} failed: {}",
                output.stderr.trim()
            )));
        }
        Ok(conflicted)
    }

    async fn rebase(&self, upstream: &str) -> Result<OperationStatus> {
        let args = ["rebase", upstream];
        let output = self.run(&args).await?;
        self.stopped(&args, output).await
    }

    async fn merge(&self, upstream: &str) -> Result<OperationStatus> {
        let args = ["merge", "--no-edit", upstream];
        let output = self.run(&args).await?;
        self.stopped(&args, output).await
    }

    async fn conflicted_files(&self) -> Result<Vec<String>> {
        let output = self
            .git(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Ok(lines(&output))
    }

    async fn resolve_file(
        &self,
        path: &str,
        resolution: FileResolution,
        operation: ConflictOperation,
    ) -> Result<()> {
        // During a rebase "ours" is the upstream being replayed onto
        let side = match (resolution, operation) {
            (FileResolution::KeepHead, ConflictOperation::Rebase)
            | (FileResolution::TakeBase, ConflictOperation::Merge) => Some("--theirs"),
            (FileResolution::TakeBase, ConflictOperation::Rebase)
            | (FileResolution::KeepHead, ConflictOperation::Merge) => Some("--ours"),
            (FileResolution::Edited, _) => None,
            (FileResolution::Skip, _) => return Ok(()),
        };
        if let Some(side) = side {
            self.git(&["checkout", side, "--", path]).await?;
        }
        self.git(&["add", "--", path]).await?;
        Ok(())
    }

    async fn continue_operation(&self, operation: ConflictOperation) -> Result<OperationStatus> {
        let args: &[&str] = match operation {
            ConflictOperation::Rebase => &["-c", "core.editor=true", "rebase", "--continue"],
            ConflictOperation::Merge => &["commit", "--no-edit"],
        };
        let output = self.run(args).await?;
        self.stopped(args, output).await
    }

    async fn abort_operation(&self, operation: ConflictOperation) -> Result<()> {
        let args = match operation {
            ConflictOperation::Rebase => ["rebase", "--abort"],
            ConflictOperation::Merge => ["merge", "--abort"],
        };
        let output = self.run(&args).await?;
        if !output.success {
            warn!(%operation, stderr = %output.stderr.trim(), "abort reported failure");
        }
        Ok(())
    }

    async fn reset_hard(&self, commit: &str) -> Result<()> {
        self.git(&["reset", "--hard", commit]).await?;
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str, mode: PushMode) -> Result<()> {
        match mode {
            PushMode::Normal { set_upstream } => {
                let mut args = vec!["push"];
                if set_upstream {
                    args.push("--set-upstream");
                }
                args.extend([remote, branch]);
                self.git(&args).await?;
            }
            PushMode::ForceWithLease { expected } => {
                let lease = format!("--force-with-lease={branch}:{expected}");
                self.git(&["push", &lease, remote, branch]).await?;
            }
        }
        Ok(())
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", branch]).await?;
        Ok(())
    }

    async fn delete_local_branch(&self, branch: &str) -> Result<()> {
        self.git(&["branch", "-D", branch]).await?;
        Ok(())
    }

    async fn ahead_behind(&self, base: &str, head: &str) -> Result<(usize, usize)> {
        let range = format!("{base}...{head}");
        let output = self
            .git(&["rev-list", "--left-right", "--count", &range])
            .await?;
        parse_left_right(&output)
            .map(|(behind, ahead)| (ahead, behind))
            .ok_or_else(|| Error::Vcs(format!("unexpected rev-list output: {output}")))
    }

    async fn diff(&self, base: &str) -> Result<String> {
        let range = format!("{base}...HEAD");
        self.git(&["diff", &range]).await
    }

    async fn log_subjects(&self, base: &str) -> Result<Vec<String>> {
        let range = format!("{base}..HEAD");
        let output = self
            .git(&["log", "--reverse", "--format=%s", &range])
            .await?;
        Ok(lines(&output))
    }
}

/// Parse `git rev-list --left-right --count` output
fn parse_left_right(output: &str) -> Option<(usize, usize)> {
    let mut parts = output.split_whitespace();
    let left = parts.next()?.parse().ok()?;
    let right = parts.next()?.parse().ok()?;
    Some((left, right))
}
