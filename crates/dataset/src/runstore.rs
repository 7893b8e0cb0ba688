//! Append-only JSON store of GitHub Actions workflow runs.
//!
//! The collector re-runs incrementally; merges are idempotent and keyed by
//! run id, so repeated collections never produce duplicate records.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::DatasetError;

/// One workflow run, as persisted in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowRun {
    /// Unique run id.
    pub id: u64,
    /// Commit SHA the run was triggered against.
    pub head_sha: Option<String>,
    /// Terminal outcome (success, failure, cancelled, skipped) or `None`
    /// while the run is still pending.
    pub conclusion: Option<String>,
    /// Repository event that triggered the run.
    pub event: Option<String>,
    /// RFC 3339 creation timestamp.
    pub created_at: Option<String>,
}

/// Result of merging freshly collected runs into the store.
#[derive(Debug, Clone, Copy)]
pub struct MergeOutcome {
    /// Runs added by this merge.
    pub added: usize,
    /// Total runs in the store after the merge.
    pub total: usize,
}

/// Load the store at `path`.
///
/// A missing or unparsable file yields an empty store; collection always
/// starts from whatever state is recoverable.
pub fn load(path: &Path) -> Vec<WorkflowRun> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store unreadable, starting empty");
            return Vec::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(runs) => runs,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store corrupt, starting empty");
            Vec::new()
        }
    }
}

/// Merge `fetched` into the store at `path`, deduplicating by run id, and
/// rewrite the store.
pub fn merge_and_save(path: &Path, fetched: Vec<WorkflowRun>) -> Result<MergeOutcome, DatasetError> {
    let mut existing = load(path);
    let known: HashSet<u64> = existing.iter().map(|r| r.id).collect();

    let new_runs: Vec<WorkflowRun> = fetched
        .into_iter()
        .filter(|r| !known.contains(&r.id))
        .collect();
    let added = new_runs.len();
    existing.extend(new_runs);

    let json = serde_json::to_vec_pretty(&existing)?;
    fs::write(path, json).map_err(|e| DatasetError::io(path.display().to_string(), e))?;

    let outcome = MergeOutcome {
        added,
        total: existing.len(),
    };
    info!(
        path = %path.display(),
        added = outcome.added,
        total = outcome.total,
        "Workflow-run store updated"
    );
    Ok(outcome)
}
