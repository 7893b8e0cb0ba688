//! Remote build labeler.
//!
//! For every unique (project, commit) pair in an enriched commit-change CSV,
//! queries the GitHub API for commit stats, workflow-run outcomes, and
//! pull-request linkage, then broadcasts the results back onto every row
//! sharing the commit hash as `gha_*` columns plus a final `build_label`.
//!
//! Per-commit API failures are soft: logged and skipped, never fatal for the
//! batch. Nothing is retried.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use dataset::features::is_test_file;
use tracing::{debug, info, warn};

use crate::classify::{classify_runs, classify_status_checks, BuildConclusion, CiStatus};
use crate::client::GhaClient;
use crate::error::GhaError;
use crate::models::{
    CombinedStatusResponse, CommitDetailResponse, JobsResponse, PullRequest, RunDetailResponse,
    WorkflowRunsResponse,
};

/// Extra columns appended by the labeler, in output order.
const OUTPUT_COLUMNS: [&str; 17] = [
    "gha_build_conclusion",
    "gha_files_changed",
    "gha_additions",
    "gha_deletions",
    "gha_has_test_changes",
    "gha_is_merge",
    "gha_has_ci",
    "gha_has_pr",
    "gha_total_workflows",
    "gha_success_workflows",
    "gha_failure_workflows",
    "gha_cancelled_workflows",
    "gha_avg_run_duration_seconds",
    "gha_latest_run_id",
    "build_label",
    "gha_workflow_names",
    "gha_workflow_events",
];

/// GitHub coordinates resolved from a project identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCoords {
    pub owner: String,
    pub repo: String,
}

/// Parse a project identifier into (owner, repo).
///
/// Three forms, in priority order: Maven-style `org.apache:repo` (any
/// `org.`/`com.` coordinate with the prefix stripped), generic
/// `owner:repo`, and plain `owner/repo`.
pub fn resolve_project(project_id: &str) -> Option<ProjectCoords> {
    if let Some((group, repo)) = project_id.split_once(':') {
        if group.is_empty() || repo.is_empty() {
            return None;
        }
        let owner = group
            .strip_prefix("org.")
            .or_else(|| group.strip_prefix("com."))
            .unwrap_or(group);
        return Some(ProjectCoords {
            owner: owner.to_string(),
            repo: repo.split(':').next().unwrap_or(repo).to_string(),
        });
    }
    if let Some((owner, repo)) = project_id.split_once('/') {
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        return Some(ProjectCoords {
            owner: owner.to_string(),
            repo: repo.split('/').next().unwrap_or(repo).to_string(),
        });
    }
    None
}

/// Commit-level facts from the commit-detail endpoint.
#[derive(Debug, Clone)]
pub struct CommitSummary {
    pub files_changed: usize,
    pub additions: u64,
    pub deletions: u64,
    pub test_files_changed: usize,
    pub has_test_changes: bool,
    pub message: String,
    pub author: String,
    pub date: String,
    pub is_merge: bool,
}

/// Best-effort per-run job detail.
#[derive(Debug, Clone)]
pub struct RunDetailSummary {
    pub run_attempt: u32,
    pub total_jobs: usize,
    pub failed_jobs: Vec<String>,
    pub workflow_file: String,
    pub trigger_event: String,
    pub actor: String,
}

/// Pull-request linkage for a commit.
#[derive(Debug, Clone)]
pub struct PrLink {
    pub number: Option<u64>,
    pub state: Option<String>,
    pub merged: bool,
    pub title: Option<String>,
}

/// Everything the labeler learned about one commit.
///
/// An explicit aggregate with named optional fields; the four API results
/// never collide the way merged dictionaries would.
#[derive(Debug, Clone)]
pub struct CommitAnnotation {
    pub project_id: String,
    pub coords: ProjectCoords,
    pub commit: CommitSummary,
    pub ci: CiStatus,
    pub run_detail: Option<RunDetailSummary>,
    pub pr: Option<PrLink>,
}

/// Summary of one labeling pass.
#[derive(Debug, Clone, Default)]
pub struct LabelReport {
    pub rows_written: usize,
    pub commits_processed: usize,
    pub commits_skipped: usize,
    pub label_counts: BTreeMap<String, usize>,
}

/// Remote build labeler over one [`GhaClient`].
pub struct RemoteLabeler {
    client: GhaClient,
}

impl RemoteLabeler {
    pub fn new(client: GhaClient) -> Self {
        Self { client }
    }

    /// Label the enriched CSV at `input`, writing the augmented table to
    /// `output`. At most `max_commits` unique commits are queried.
    pub async fn label_file(
        &self,
        input: &Path,
        output: &Path,
        max_commits: usize,
    ) -> Result<LabelReport, GhaError> {
        let mut reader = csv::Reader::from_path(input)?;
        let headers = reader.headers()?.clone();
        let project_idx = column_index(&headers, "PROJECT_ID")?;
        let hash_idx = column_index(&headers, "COMMIT_HASH")?;

        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<Result<_, csv::Error>>()?;
        info!(rows = rows.len(), input = %input.display(), "Loaded enriched dataset");

        // Unique (project, commit) pairs in first-seen order; one fetch
        // serves every file-change row of the commit.
        let mut seen = HashSet::new();
        let mut pairs: Vec<(String, String)> = Vec::new();
        for row in &rows {
            let project = row.get(project_idx).unwrap_or_default().to_string();
            let hash = row.get(hash_idx).unwrap_or_default().to_string();
            if hash.is_empty() || !seen.insert((project.clone(), hash.clone())) {
                continue;
            }
            pairs.push((project, hash));
        }
        if pairs.len() > max_commits {
            info!(
                unique = pairs.len(),
                max_commits, "Limiting commits processed this run"
            );
            pairs.truncate(max_commits);
        }
        info!(commits = pairs.len(), "Processing unique commits via GitHub API");

        let mut report = LabelReport::default();
        let mut annotations: HashMap<String, CommitAnnotation> = HashMap::new();
        for (processed, (project_id, hash)) in pairs.iter().enumerate() {
            match self.annotate_commit(project_id, hash).await {
                Some(annotation) => {
                    let short_sha = &hash[..hash.len().min(8)];
                    debug!(
                        commit = %short_sha,
                        conclusion = annotation.ci.build_conclusion.as_str(),
                        workflows = annotation.ci.total_workflows,
                        files = annotation.commit.files_changed,
                        "Commit annotated"
                    );
                    annotations.insert(hash.clone(), annotation);
                    report.commits_processed += 1;
                }
                None => report.commits_skipped += 1,
            }
            if (processed + 1) % 10 == 0 {
                info!(
                    processed = processed + 1,
                    total = pairs.len(),
                    api_calls = self.client.calls_made(),
                    "Labeling progress"
                );
            }
        }

        let mut writer = csv::Writer::from_path(output)?;
        let mut out_header = headers.clone();
        for col in OUTPUT_COLUMNS {
            out_header.push_field(col);
        }
        writer.write_record(&out_header)?;

        for row in &rows {
            let hash = row.get(hash_idx).unwrap_or_default();
            let mut out = row.clone();
            append_columns(&mut out, annotations.get(hash));
            writer.write_record(&out)?;
            report.rows_written += 1;

            let label = annotations
                .get(hash)
                .map_or(BuildConclusion::NotProcessed, |a| a.ci.build_conclusion)
                .label();
            *report.label_counts.entry(label.to_string()).or_default() += 1;
        }
        writer
            .flush()
            .map_err(|e| GhaError::Io {
                path: output.display().to_string(),
                source: e,
            })?;

        info!(
            rows = report.rows_written,
            processed = report.commits_processed,
            skipped = report.commits_skipped,
            "Labeling complete"
        );
        for (label, count) in &report.label_counts {
            info!(label = %label, rows = count, "Build label distribution");
        }
        Ok(report)
    }

    /// Run the per-commit annotation steps. Any step failure logs and skips
    /// the commit (or degrades the annotation); nothing here is fatal.
    pub async fn annotate_commit(
        &self,
        project_id: &str,
        sha: &str,
    ) -> Option<CommitAnnotation> {
        let Some(coords) = resolve_project(project_id) else {
            warn!(project = %project_id, "Could not resolve GitHub coordinates, skipping");
            return None;
        };

        let commit = match self.fetch_commit_details(&coords, sha).await {
            Ok(commit) => commit,
            Err(e) if e.is_not_found() => {
                warn!(commit = %sha, owner = %coords.owner, repo = %coords.repo, "Commit not found, skipping");
                return None;
            }
            Err(e) => {
                warn!(commit = %sha, error = %e, "Commit detail fetch failed, skipping");
                return None;
            }
        };

        let ci = match self.fetch_ci_status(&coords, sha).await {
            Ok(ci) => ci,
            Err(e) => {
                warn!(commit = %sha, error = %e, "CI status query failed");
                CiStatus::error()
            }
        };

        let run_detail = match ci.latest_run_id {
            Some(run_id) => match self.fetch_run_detail(&coords, run_id).await {
                Ok(detail) => detail,
                Err(e) => {
                    warn!(run_id, error = %e, "Run detail fetch failed");
                    None
                }
            },
            None => None,
        };

        let pr = match self.fetch_pr_link(&coords, sha).await {
            Ok(pr) => pr,
            Err(e) => {
                warn!(commit = %sha, error = %e, "PR lookup failed");
                None
            }
        };

        Some(CommitAnnotation {
            project_id: project_id.to_string(),
            coords,
            commit,
            ci,
            run_detail,
            pr,
        })
    }

    /// Single commit-detail call; 404 and other non-200s surface as errors
    /// for the caller to classify. Never retried.
    async fn fetch_commit_details(
        &self,
        coords: &ProjectCoords,
        sha: &str,
    ) -> Result<CommitSummary, GhaError> {
        self.client.throttle().await;
        let path = format!("/repos/{}/{}/commits/{sha}", coords.owner, coords.repo);
        let detail: CommitDetailResponse = self.client.get_json(&path, &[]).await?;

        let test_files_changed = detail
            .files
            .iter()
            .filter(|f| is_test_file(&f.filename))
            .count();
        let (message, author, date) = detail
            .commit
            .map(|c| {
                let (author, date) = c
                    .author
                    .map(|a| (a.name, a.date))
                    .unwrap_or_default();
                (c.message, author, date)
            })
            .unwrap_or_default();

        Ok(CommitSummary {
            files_changed: detail.files.len(),
            additions: detail.stats.additions,
            deletions: detail.stats.deletions,
            test_files_changed,
            has_test_changes: test_files_changed > 0,
            message,
            author,
            date,
            is_merge: detail.parents.len() > 1,
        })
    }

    /// Workflow runs filtered by SHA; falls back to the status-checks
    /// endpoint when no runs exist (or the runs endpoint errors).
    async fn fetch_ci_status(
        &self,
        coords: &ProjectCoords,
        sha: &str,
    ) -> Result<CiStatus, GhaError> {
        self.client.throttle().await;
        let path = format!("/repos/{}/{}/actions/runs", coords.owner, coords.repo);
        let query = [
            ("head_sha", sha.to_string()),
            ("per_page", "100".to_string()),
        ];
        match self
            .client
            .get_json::<WorkflowRunsResponse>(&path, &query)
            .await
        {
            Ok(response) if !response.workflow_runs.is_empty() => {
                debug!(
                    commit = %sha,
                    runs = response.workflow_runs.len(),
                    "Workflow runs found"
                );
                Ok(classify_runs(&response.workflow_runs))
            }
            Ok(_) => {
                debug!(commit = %sha, "No workflow runs, checking commit statuses");
                self.fetch_status_checks(coords, sha).await
            }
            Err(GhaError::Status { status, .. }) => {
                debug!(commit = %sha, %status, "Runs endpoint refused, checking commit statuses");
                self.fetch_status_checks(coords, sha).await
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_status_checks(
        &self,
        coords: &ProjectCoords,
        sha: &str,
    ) -> Result<CiStatus, GhaError> {
        self.client.throttle().await;
        let path = format!(
            "/repos/{}/{}/commits/{sha}/status",
            coords.owner, coords.repo
        );
        match self
            .client
            .get_json::<CombinedStatusResponse>(&path, &[])
            .await
        {
            Ok(status) => Ok(classify_status_checks(&status)),
            Err(GhaError::Status { .. }) => Ok(CiStatus::no_ci()),
            Err(e) => Err(e),
        }
    }

    /// Best-effort per-run job detail; `Ok(None)` means the run has no
    /// retrievable detail, an `Err` means the request itself failed.
    async fn fetch_run_detail(
        &self,
        coords: &ProjectCoords,
        run_id: u64,
    ) -> Result<Option<RunDetailSummary>, GhaError> {
        self.client.throttle().await;
        let base = format!(
            "/repos/{}/{}/actions/runs/{run_id}",
            coords.owner, coords.repo
        );
        let detail = match self.client.get_json::<RunDetailResponse>(&base, &[]).await {
            Ok(detail) => detail,
            Err(GhaError::Status { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        self.client.throttle().await;
        let jobs = match self
            .client
            .get_json::<JobsResponse>(&format!("{base}/jobs"), &[])
            .await
        {
            Ok(response) => response.jobs,
            Err(_) => Vec::new(),
        };

        let failed_jobs: Vec<String> = jobs
            .iter()
            .filter(|j| j.conclusion.as_deref() == Some("failure"))
            .map(|j| j.name.clone())
            .collect();

        Ok(Some(RunDetailSummary {
            run_attempt: detail.run_attempt,
            total_jobs: jobs.len(),
            failed_jobs,
            workflow_file: detail.path,
            trigger_event: detail.event.unwrap_or_default(),
            actor: detail.actor.map(|a| a.login).unwrap_or_default(),
        }))
    }

    /// First associated pull request, if any.
    async fn fetch_pr_link(
        &self,
        coords: &ProjectCoords,
        sha: &str,
    ) -> Result<Option<PrLink>, GhaError> {
        self.client.throttle().await;
        let path = format!(
            "/repos/{}/{}/commits/{sha}/pulls",
            coords.owner, coords.repo
        );
        let pulls: Vec<PullRequest> = self.client.get_json(&path, &[]).await?;
        Ok(pulls.into_iter().next().map(|pr| PrLink {
            number: pr.number,
            state: pr.state,
            merged: pr.merged,
            title: pr.title,
        }))
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, GhaError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| GhaError::MissingColumn {
            column: name.to_string(),
        })
}

fn bool_field(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Append the `gha_*` columns for one row, defaulting everything when the
/// commit was never annotated.
fn append_columns(out: &mut csv::StringRecord, annotation: Option<&CommitAnnotation>) {
    match annotation {
        Some(a) => {
            out.push_field(a.ci.build_conclusion.as_str());
            out.push_field(&a.commit.files_changed.to_string());
            out.push_field(&a.commit.additions.to_string());
            out.push_field(&a.commit.deletions.to_string());
            out.push_field(bool_field(a.commit.has_test_changes));
            out.push_field(bool_field(a.commit.is_merge));
            out.push_field(bool_field(a.ci.has_ci));
            out.push_field(bool_field(a.pr.is_some()));
            out.push_field(&a.ci.total_workflows.to_string());
            out.push_field(&a.ci.success_workflows.to_string());
            out.push_field(&a.ci.failure_workflows.to_string());
            out.push_field(&a.ci.cancelled_workflows.to_string());
            out.push_field(&a.ci.avg_run_duration_seconds.to_string());
            out.push_field(
                &a.ci
                    .latest_run_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            );
            out.push_field(a.ci.build_conclusion.label());
            out.push_field(&a.ci.workflow_names.join(";"));
            out.push_field(&a.ci.workflow_events.join(";"));
        }
        None => {
            out.push_field(BuildConclusion::NotProcessed.as_str());
            // Zero default for every numeric and boolean column.
            for _ in 0..13 {
                out.push_field("0");
            }
            out.push_field(BuildConclusion::NotProcessed.label());
            out.push_field("");
            out.push_field("");
        }
    }
}
