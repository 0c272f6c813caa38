//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{
    CheckRun, CheckRunSet, CheckStatus, CommitMessage, MergeMethod, MergeResult,
    NewPullRequest, PlatformConfig, PrState, PullRequest, ReviewSummary,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const GITHUB_API: &str = "https://api.github.com";

/// Upper bound for a single API request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PER_PAGE: usize = 100;
const MAX_PAGES: u32 = 10;

#[derive(Deserialize)]
struct CheckRunsResponse {
    total_count: Option<usize>,
    check_runs: Vec<RawCheckRun>,
}

#[derive(Deserialize)]
struct RawCheckRun {
    id: u64,
    name: String,
    status: String,
    conclusion: Option<String>,
    html_url: Option<String>,
    details_url: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct CombinedStatus {
    total_count: Option<usize>,
    statuses: Vec<RawStatus>,
}

/// Whether another page may hold more items
fn has_more(page_len: usize, seen: usize, total: Option<usize>) -> bool {
    page_len == PER_PAGE && total.is_none_or(|t| seen < t)
}

#[derive(Deserialize)]
struct RawStatus {
    context: String,
    state: String,
    target_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

/// Map a check-run `status`/`conclusion` pair
fn check_run_status(status: &str, conclusion: Option<&str>) -> CheckStatus {
    match status {
        "completed" => match conclusion {
            Some("success" | "neutral" | "skipped") => CheckStatus::Success,
            Some("cancelled") => CheckStatus::Cancelled,
            Some("timed_out") => CheckStatus::TimedOut,
            // failure, action_required, startup_failure, stale, or missing
            _ => CheckStatus::Failure,
        },
        "in_progress" => CheckStatus::InProgress,
        _ => CheckStatus::Queued,
    }
}

/// Map a legacy commit status `state`
fn commit_status(state: &str) -> CheckStatus {
    match state {
        "success" => CheckStatus::Success,
        "failure" | "error" => CheckStatus::Failure,
        _ => CheckStatus::InProgress,
    }
}

/// Raw REST calls octocrab has no typed builder for
///
/// Check runs, commit statuses, check re-runs, review requests and ref deletion.
struct RestClient {
    http: Client,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
}

impl RestClient {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/repos/{}/{}/{path}",
            self.api_base, self.owner, self.repo
        );
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// One page of a list endpoint
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page: u32,
        what: &str,
    ) -> Result<T> {
        let page = page.to_string();
        let per_page = PER_PAGE.to_string();
        let response = self
            .request(Method::GET, path)
            .query(&[("per_page", per_page.as_str()), ("page", page.as_str())])
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch {what}: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::GitHubApi(format!(
                "Fetching {what} returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse {what}: {e}")))
    }

    /// Check runs and legacy statuses for a commit, merged into one set
    async fn checks_for_sha(&self, sha: &str) -> Result<CheckRunSet> {
        let mut check_runs = Vec::new();
        for page in 1..=MAX_PAGES {
            let body: CheckRunsResponse = self
                .get_page(&format!("commits/{sha}/check-runs"), page, "check runs")
                .await?;
            let page_len = body.check_runs.len();
            check_runs.extend(body.check_runs);
            if !has_more(page_len, check_runs.len(), body.total_count) {
                break;
            }
        }

        let mut statuses = Vec::new();
        for page in 1..=MAX_PAGES {
            let body: CombinedStatus = self
                .get_page(&format!("commits/{sha}/status"), page, "commit status")
                .await?;
            let page_len = body.statuses.len();
            statuses.extend(body.statuses);
            if !has_more(page_len, statuses.len(), body.total_count) {
                break;
            }
        }

        let mut set = CheckRunSet::default();
        for raw in check_runs {
            let mut run = CheckRun::new(
                raw.name,
                check_run_status(&raw.status, raw.conclusion.as_deref()),
            );
            run.id = Some(raw.id);
            run.url = raw.details_url.or(raw.html_url);
            run.started_at = raw.started_at;
            run.completed_at = raw.completed_at;
            set.insert(run);
        }
        for raw in statuses {
            let status = commit_status(&raw.state);
            let mut run = CheckRun::new(raw.context, status);
            run.url = raw.target_url;
            run.started_at = raw.created_at;
            run.completed_at = if status.is_terminal() {
                raw.updated_at
            } else {
                None
            };
            set.insert(run);
        }

        debug!(sha, count = set.len(), "fetched checks");
        Ok(set)
    }

    /// Re-run a failed check
    ///
    /// Actions jobs share their id with the check run. Runs created by other
    /// apps are re-requested through the checks API instead.
    async fn rerun_check(&self, id: u64) -> Result<()> {
        let response = self
            .request(Method::POST, &format!("actions/jobs/{id}/rerun"))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if !matches!(
            status,
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            return Err(Error::GitHubApi(format!("Re-running job {id} returned {status}")));
        }

        debug!(id, %status, "not an Actions job, re-requesting check run");
        let response = self
            .request(Method::POST, &format!("check-runs/{id}/rerequest"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::GitHubApi(format!(
                "Re-requesting check run {id} returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn request_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()> {
        let response = self
            .request(
                Method::POST,
                &format!("pulls/{pr_number}/requested_reviewers"),
            )
            .json(&serde_json::json!({ "reviewers": reviewers }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::GitHubApi(format!(
                "Requesting reviewers returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Delete `refs/heads/<branch>`; returns false when it was already gone
    async fn delete_ref(&self, branch: &str) -> Result<bool> {
        let response = self
            .request(Method::DELETE, &format!("git/refs/heads/{branch}"))
            .send()
            .await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => Ok(false),
            s => Err(Error::GitHubApi(format!(
                "Deleting branch {branch} returned {s}"
            ))),
        }
    }
}

/// GitHub service using octocrab
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    rest: RestClient,
}

impl GitHubService {
    /// Create a new GitHub service
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let api_base = host
            .as_ref()
            .map_or_else(|| GITHUB_API.to_string(), |h| format!("https://{h}/api/v3"));
        Self::with_api_base(token, PlatformConfig { owner, repo, host }, &api_base)
    }

    /// Create a service against an explicit API root
    pub fn with_api_base(token: &str, config: PlatformConfig, api_base: &str) -> Result<Self> {
        let api_base = api_base.trim_end_matches('/').to_string();
        let mut builder = Octocrab::builder()
            .personal_token(token.to_string())
            .set_connect_timeout(Some(REQUEST_TIMEOUT))
            .set_read_timeout(Some(REQUEST_TIMEOUT))
            .set_write_timeout(Some(REQUEST_TIMEOUT));
        if api_base != GITHUB_API {
            builder = builder
                .base_uri(api_base.as_str())
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }
        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http = Client::builder()
            .user_agent("auto-pr")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::GitHubApi(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            rest: RestClient {
                http,
                api_base,
                token: token.to_string(),
                owner: config.owner.clone(),
                repo: config.repo.clone(),
            },
            config,
        })
    }

    async fn reviews(
        &self,
        pr_number: u64,
        requested: &[octocrab::models::Author],
    ) -> Result<ReviewSummary> {
        use octocrab::models::pulls::ReviewState;

        let reviews = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list_reviews(pr_number)
            .send()
            .await?;

        // Latest approve/request-changes per reviewer counts
        let mut latest: BTreeMap<String, ReviewState> = BTreeMap::new();
        let mut commented = 0;
        for review in reviews.items {
            let (Some(user), Some(state)) = (review.user, review.state) else {
                continue;
            };
            match state {
                ReviewState::Approved | ReviewState::ChangesRequested | ReviewState::Dismissed => {
                    latest.insert(user.login, state);
                }
                ReviewState::Commented => commented += 1,
                _ => {}
            }
        }

        let mut summary = ReviewSummary {
            commented,
            ..ReviewSummary::default()
        };
        for (login, state) in latest {
            match state {
                ReviewState::Approved => summary.approved_by.push(login),
                ReviewState::ChangesRequested => summary.changes_requested_by.push(login),
                _ => {}
            }
        }
        summary.pending = requested.iter().map(|a| a.login.clone()).collect();
        Ok(summary)
    }
}

/// Helper to convert octocrab PR to our `PullRequest` type
fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    let is_draft = pr.draft.unwrap_or(false);
    let state = match pr.state {
        Some(octocrab::models::IssueState::Open) if is_draft => PrState::Draft,
        Some(octocrab::models::IssueState::Open) => PrState::Open,
        Some(_) | None if pr.merged_at.is_some() => PrState::Merged,
        // IssueState is non-exhaustive, so use wildcard for Closed and any future variants
        Some(_) | None => PrState::Closed,
    };
    PullRequest {
        number: pr.number,
        title: pr.title.clone().unwrap_or_default(),
        body: pr.body.clone(),
        state,
        head_ref: pr.head.ref_field.clone(),
        base_ref: pr.base.ref_field.clone(),
        head_sha: pr.head.sha.clone(),
        mergeable: pr.mergeable,
        reviews: ReviewSummary::default(),
        checks: CheckRunSet::default(),
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn get_pr(&self, pr_number: u64) -> Result<PullRequest> {
        debug!(pr_number, "getting PR");
        let raw = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(pr_number)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. } if source.status_code == 404 => {
                    Error::PrNotFound(pr_number)
                }
                _ => Error::from(e),
            })?;

        let mut pr = pr_from_octocrab(&raw);
        let requested = raw.requested_reviewers.clone().unwrap_or_default();
        pr.reviews = self.reviews(pr_number, &requested).await?;
        if !matches!(pr.state, PrState::Merged | PrState::Closed) {
            pr.checks = self.rest.checks_for_sha(&pr.head_sha).await?;
        }

        debug!(pr_number, state = %pr.state, mergeable = ?pr.mergeable, "got PR");
        Ok(pr)
    }

    async fn find_pr_for_branch(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        debug!(head_branch, "finding existing PR");
        let head = format!("{}:{}", &self.config.owner, head_branch);

        let prs = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .head(head)
            .state(octocrab::params::State::Open)
            .send()
            .await?;

        let result = prs.items.first().map(pr_from_octocrab);
        if let Some(ref pr) = result {
            debug!(pr_number = pr.number, "found existing PR");
        } else {
            debug!("no existing PR found");
        }
        Ok(result)
    }

    async fn create_pr(&self, new_pr: &NewPullRequest) -> Result<PullRequest> {
        debug!(head = %new_pr.head, base = %new_pr.base, draft = new_pr.draft, "creating PR");
        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let mut builder = pulls
            .create(&new_pr.title, &new_pr.head, &new_pr.base)
            .draft(new_pr.draft);

        if let Some(ref body) = new_pr.body {
            builder = builder.body(body);
        }

        let pr = builder.send().await?;

        let result = pr_from_octocrab(&pr);
        debug!(pr_number = result.number, "created PR");
        Ok(result)
    }

    async fn update_pr(
        &self,
        pr_number: u64,
        title: Option<&str>,
        body: Option<&str>,
    ) -> Result<PullRequest> {
        debug!(pr_number, "updating PR");
        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let mut builder = pulls.update(pr_number);
        if let Some(title) = title {
            builder = builder.title(title);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let pr = builder.send().await?;

        debug!(pr_number, "updated PR");
        Ok(pr_from_octocrab(&pr))
    }

    async fn merge_pr(
        &self,
        pr_number: u64,
        method: MergeMethod,
        message: Option<&CommitMessage>,
        head_sha: &str,
    ) -> Result<MergeResult> {
        debug!(pr_number, %method, head_sha, "merging PR");

        let octocrab_method = match method {
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
        };

        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let mut builder = pulls
            .merge(pr_number)
            .method(octocrab_method)
            .sha(head_sha);
        if method.takes_message()
            && let Some(message) = message
        {
            builder = builder.title(message.title.clone());
            if let Some(ref body) = message.body {
                builder = builder.message(body.clone());
            }
        }
        let result = builder
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Merge failed: {e}")))?;

        let merge_result = MergeResult {
            merged: result.merged,
            sha: result.sha,
            message: result.message,
        };

        debug!(
            pr_number,
            merged = merge_result.merged,
            sha = ?merge_result.sha,
            "merge complete"
        );
        Ok(merge_result)
    }

    async fn list_checks(&self, pr_number: u64) -> Result<CheckRunSet> {
        debug!(pr_number, "listing checks");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(pr_number)
            .await?;
        self.rest.checks_for_sha(&pr.head.sha).await
    }

    async fn rerun_checks(&self, pr_number: u64, check_ids: &[u64]) -> Result<()> {
        debug!(pr_number, count = check_ids.len(), "re-running checks");
        for id in check_ids {
            self.rest.rerun_check(*id).await?;
        }
        Ok(())
    }

    async fn add_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()> {
        if reviewers.is_empty() {
            return Ok(());
        }
        debug!(pr_number, ?reviewers, "requesting reviewers");
        self.rest.request_reviewers(pr_number, reviewers).await
    }

    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        debug!(pr_number, ?labels, "adding labels");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .add_labels(pr_number, labels)
            .await?;
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "deleting remote branch");
        if !self.rest.delete_ref(branch).await? {
            debug!(branch, "remote branch already gone");
        }
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
