//! Serde models for the GitHub REST endpoints the pipeline consumes.
//!
//! Only the fields the jobs actually read are declared; everything else in
//! the responses is ignored.

use serde::Deserialize;

/// `GET /repos/{owner}/{repo}/actions/runs` response envelope.
#[derive(Debug, Deserialize)]
pub struct WorkflowRunsResponse {
    #[serde(default)]
    pub workflow_runs: Vec<ApiWorkflowRun>,
}

/// One workflow run as returned by the runs-listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiWorkflowRun {
    pub id: u64,
    pub name: Option<String>,
    pub head_sha: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub event: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// `GET /repos/{owner}/{repo}/commits/{sha}` response.
#[derive(Debug, Deserialize)]
pub struct CommitDetailResponse {
    #[serde(default)]
    pub stats: CommitStats,
    #[serde(default)]
    pub files: Vec<CommitFile>,
    pub commit: Option<CommitMeta>,
    #[serde(default)]
    pub parents: Vec<CommitParent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub struct CommitFile {
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct CommitMeta {
    #[serde(default)]
    pub message: String,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct CommitParent {
    #[allow(dead_code)]
    pub sha: Option<String>,
}

/// `GET /repos/{owner}/{repo}/commits/{sha}/status` response.
#[derive(Debug, Deserialize)]
pub struct CombinedStatusResponse {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub statuses: Vec<StatusCheck>,
}

#[derive(Debug, Deserialize)]
pub struct StatusCheck {
    #[serde(default)]
    pub context: String,
}

/// `GET /repos/{owner}/{repo}/actions/runs/{id}` response.
#[derive(Debug, Deserialize)]
pub struct RunDetailResponse {
    #[serde(default = "default_attempt")]
    pub run_attempt: u32,
    #[serde(default)]
    pub path: String,
    pub event: Option<String>,
    pub run_started_at: Option<String>,
    pub actor: Option<Actor>,
}

fn default_attempt() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub login: String,
}

/// `GET /repos/{owner}/{repo}/actions/runs/{id}/jobs` response envelope.
#[derive(Debug, Deserialize)]
pub struct JobsResponse {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub name: String,
    pub conclusion: Option<String>,
}

/// `GET /repos/{owner}/{repo}/commits/{sha}/pulls` element.
#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub number: Option<u64>,
    pub state: Option<String>,
    #[serde(default)]
    pub merged: bool,
    pub title: Option<String>,
}

/// `GET /rate_limit` response.
#[derive(Debug, Deserialize)]
pub struct RateLimitResponse {
    pub rate: RateLimit,
}

#[derive(Debug, Deserialize)]
pub struct RateLimit {
    pub remaining: u64,
    /// Epoch seconds when the quota resets.
    pub reset: i64,
}
