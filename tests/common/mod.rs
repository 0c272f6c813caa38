//! Shared test fixtures and doubles

#![allow(dead_code)]

pub mod generator;
pub mod mock_platform;
pub mod mock_vcs;
pub mod operator;
pub mod progress;

pub use generator::ScriptedGenerator;
pub use mock_platform::MockPlatformService;
pub use mock_vcs::MockVcs;
pub use operator::ScriptedOperator;
pub use progress::RecordingProgress;

use auto_pr::types::{
    CheckRun, CheckRunSet, CheckStatus, PlatformConfig, PrState, PullRequest, ReviewSummary,
};

pub fn github_config() -> PlatformConfig {
    PlatformConfig {
        owner: "acme".to_string(),
        repo: "widgets".to_string(),
        host: None,
    }
}

pub fn mock_platform() -> MockPlatformService {
    MockPlatformService::with_config(github_config())
}

/// Open, mergeable PR with no checks or reviews
pub fn make_pr(number: u64, head: &str, base: &str) -> PullRequest {
    PullRequest {
        number,
        title: format!("PR {number}"),
        body: None,
        state: PrState::Open,
        head_ref: head.to_string(),
        base_ref: base.to_string(),
        head_sha: "head-1".to_string(),
        mergeable: Some(true),
        reviews: ReviewSummary::default(),
        checks: CheckRunSet::default(),
        html_url: format!("https://github.com/acme/widgets/pull/{number}"),
    }
}

/// Check set from `(name, status)` pairs
pub fn checks(runs: &[(&str, CheckStatus)]) -> CheckRunSet {
    CheckRunSet::from_runs(runs.iter().map(|(name, status)| CheckRun::new(*name, *status)))
}

/// Check set from `(name, status, id)` triples
pub fn checks_with_ids(runs: &[(&str, CheckStatus, u64)]) -> CheckRunSet {
    CheckRunSet::from_runs(runs.iter().map(|(name, status, id)| {
        let mut run = CheckRun::new(*name, *status);
        run.id = Some(*id);
        run
    }))
}
