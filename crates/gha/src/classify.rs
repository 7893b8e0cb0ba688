//! Build-outcome classification from workflow runs and status checks.

use chrono::DateTime;

use crate::models::{ApiWorkflowRun, CombinedStatusResponse};

/// Aggregate build conclusion for one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildConclusion {
    Failed,
    Passed,
    Cancelled,
    /// Runs concluded, but with none of the terminal outcomes above.
    Mixed,
    /// Runs exist but none has concluded yet.
    Pending,
    /// No workflow runs and no status checks.
    NoCi,
    /// CI could not be queried at all (transport failure).
    Error,
    Unknown,
    /// Commit never reached the labeler (over the cap, or skipped).
    NotProcessed,
}

impl BuildConclusion {
    /// Lowercase wire form used in the `gha_build_conclusion` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Passed => "passed",
            Self::Cancelled => "cancelled",
            Self::Mixed => "mixed",
            Self::Pending => "pending",
            Self::NoCi => "no_ci",
            Self::Error => "error",
            Self::Unknown => "unknown",
            Self::NotProcessed => "not_processed",
        }
    }

    /// Final categorical `build_label` column value.
    pub fn label(self) -> &'static str {
        match self {
            Self::Failed => "FAILED",
            Self::Passed => "PASSED",
            Self::Cancelled => "CANCELLED",
            Self::NoCi => "NO_CI",
            _ => "UNKNOWN",
        }
    }
}

/// CI outcome summary for one commit, derived from its workflow runs or,
/// when none exist, its status checks.
#[derive(Debug, Clone)]
pub struct CiStatus {
    pub build_conclusion: BuildConclusion,
    pub has_ci: bool,
    pub total_workflows: usize,
    pub success_workflows: usize,
    pub failure_workflows: usize,
    pub cancelled_workflows: usize,
    pub skipped_workflows: usize,
    pub workflow_names: Vec<String>,
    pub workflow_events: Vec<String>,
    pub avg_run_duration_seconds: f64,
    pub latest_run_id: Option<u64>,
}

impl CiStatus {
    /// Status for a commit with no CI signal at all.
    pub fn no_ci() -> Self {
        Self::empty(BuildConclusion::NoCi, false)
    }

    /// Status recorded when the CI endpoints could not be reached.
    pub fn error() -> Self {
        Self::empty(BuildConclusion::Error, false)
    }

    fn empty(conclusion: BuildConclusion, has_ci: bool) -> Self {
        Self {
            build_conclusion: conclusion,
            has_ci,
            total_workflows: 0,
            success_workflows: 0,
            failure_workflows: 0,
            cancelled_workflows: 0,
            skipped_workflows: 0,
            workflow_names: Vec::new(),
            workflow_events: Vec::new(),
            avg_run_duration_seconds: 0.0,
            latest_run_id: None,
        }
    }
}

/// Classify a non-empty set of workflow runs for one commit.
///
/// Priority order: any failure wins, then success, then cancelled; runs
/// with only other conclusions are mixed, and runs with no conclusions at
/// all are still pending.
pub fn classify_runs(runs: &[ApiWorkflowRun]) -> CiStatus {
    let conclusions: Vec<&str> = runs
        .iter()
        .filter_map(|r| r.conclusion.as_deref())
        .collect();

    let count_of = |what: &str| conclusions.iter().filter(|c| **c == what).count();
    let success = count_of("success");
    let failure = count_of("failure");
    let cancelled = count_of("cancelled");
    let skipped = count_of("skipped");

    let build_conclusion = if failure > 0 {
        BuildConclusion::Failed
    } else if success > 0 {
        BuildConclusion::Passed
    } else if cancelled > 0 {
        BuildConclusion::Cancelled
    } else if !conclusions.is_empty() {
        BuildConclusion::Mixed
    } else {
        BuildConclusion::Pending
    };

    let mut events: Vec<String> = runs.iter().filter_map(|r| r.event.clone()).collect();
    events.sort();
    events.dedup();

    CiStatus {
        build_conclusion,
        has_ci: true,
        total_workflows: runs.len(),
        success_workflows: success,
        failure_workflows: failure,
        cancelled_workflows: cancelled,
        skipped_workflows: skipped,
        workflow_names: runs
            .iter()
            .map(|r| r.name.clone().unwrap_or_else(|| "unknown".to_string()))
            .collect(),
        workflow_events: events,
        avg_run_duration_seconds: average_duration_seconds(runs),
        latest_run_id: runs.first().map(|r| r.id),
    }
}

/// Map the combined-status fallback endpoint onto the same label space.
pub fn classify_status_checks(status: &CombinedStatusResponse) -> CiStatus {
    if status.statuses.is_empty() {
        return CiStatus::no_ci();
    }
    let conclusion = match status.state.as_str() {
        "success" => BuildConclusion::Passed,
        "failure" | "error" => BuildConclusion::Failed,
        "pending" => BuildConclusion::Pending,
        _ => BuildConclusion::Unknown,
    };
    CiStatus::empty(conclusion, true)
}

/// Mean wall-clock duration over runs carrying both timestamps.
fn average_duration_seconds(runs: &[ApiWorkflowRun]) -> f64 {
    let durations: Vec<f64> = runs
        .iter()
        .filter_map(|r| {
            let created = DateTime::parse_from_rfc3339(r.created_at.as_deref()?).ok()?;
            let updated = DateTime::parse_from_rfc3339(r.updated_at.as_deref()?).ok()?;
            Some((updated - created).num_seconds() as f64)
        })
        .collect();
    if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    }
}
