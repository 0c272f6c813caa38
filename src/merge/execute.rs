//! Merge execution - the host merge call and branch cleanup

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::progress::ProgressCallback;
use crate::types::{CommitMessage, MergeMethod, MergeResult, PullRequest};
use crate::vcs::VcsService;
use tracing::{debug, warn};

/// Merge `pr` on the host, pinned to the head sha the checks ran against
///
/// A response that reports no merge is turned into an error carrying the
/// host's message.
pub async fn execute_merge(
    platform: &dyn PlatformService,
    pr: &PullRequest,
    method: MergeMethod,
    message: Option<&CommitMessage>,
    progress: &dyn ProgressCallback,
) -> Result<MergeResult> {
    progress
        .on_message(&format!("🔀 Merging PR #{}: {}", pr.number, pr.title))
        .await;
    debug!(pr_number = pr.number, %method, sha = %pr.head_sha, "merging");

    let result = platform
        .merge_pr(pr.number, method, message, &pr.head_sha)
        .await?;
    if !result.merged {
        return Err(Error::Platform(result.message.unwrap_or_else(|| {
            format!("host declined to merge PR #{}", pr.number)
        })));
    }

    let sha_display = result.sha.as_deref().unwrap_or("(no sha)");
    progress.on_message(&format!("✅ Merged: {sha_display}")).await;
    Ok(result)
}

/// Delete the head branch remotely, then locally
///
/// Only called after the host confirmed the merge. Failures are logged and
/// reported as progress, never returned. Returns whether the remote branch
/// was deleted.
pub async fn cleanup_branch(
    platform: &dyn PlatformService,
    vcs: &dyn VcsService,
    pr: &PullRequest,
    progress: &dyn ProgressCallback,
) -> bool {
    let branch = pr.head_ref.as_str();
    if let Err(e) = platform.delete_branch(branch).await {
        warn!(branch, error = %e, "failed to delete remote branch");
        progress
            .on_message(&format!("⚠️  Could not delete remote branch {branch}: {e}"))
            .await;
        return false;
    }
    progress
        .on_message(&format!("🗑️  Deleted remote branch {branch}"))
        .await;

    match vcs.current_branch().await {
        Ok(current) if current == branch => {
            if let Err(e) = vcs.checkout(&pr.base_ref).await {
                warn!(branch, base = %pr.base_ref, error = %e, "failed to switch to base");
                progress
                    .on_message(&format!(
                        "⚠️  Could not switch to {}; local branch {branch} kept",
                        pr.base_ref
                    ))
                    .await;
                return true;
            }
        }
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "could not read current branch; keeping local branch");
            return true;
        }
    }

    match vcs.delete_local_branch(branch).await {
        Ok(()) => debug!(branch, "deleted local branch"),
        // Usually the branch was never checked out here
        Err(e) => debug!(branch, error = %e, "local branch not deleted"),
    }
    true
}
