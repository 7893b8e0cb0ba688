//! Joining the workflow-run store against repository history.

use std::collections::HashSet;
use std::path::Path;

use dataset::features::{has_fix_keyword, is_test_file};
use dataset::runstore;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::MineError;
use crate::git::{self, RepoHandle};

/// One labeled, feature-complete commit row.
#[derive(Debug, Clone, Serialize)]
pub struct MinedRow {
    pub commit_hash: String,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub files_changed: usize,
    /// 1 when the commit message carries a fix keyword.
    pub has_fix_keyword: u8,
    /// Count of touched files matching the test-path heuristic.
    pub changed_tests: usize,
    /// 0 = success, 1 = failure.
    pub pipeline_failed: u8,
}

/// Load the run store and keep only commits with a resolvable
/// success/failure conclusion, in store order, one label per SHA.
///
/// Non-terminal conclusions (skipped, cancelled, pending) are excluded
/// entirely; those commits are never labeled.
pub fn load_labels(store_path: &Path) -> Result<Vec<(String, u8)>, MineError> {
    let runs = runstore::load(store_path);
    let mut seen = HashSet::new();
    let labels: Vec<(String, u8)> = runs
        .into_iter()
        .filter_map(|run| {
            let sha = run.head_sha?;
            let label = match run.conclusion.as_deref().map(str::to_lowercase).as_deref() {
                Some("success") => 0,
                Some("failure") => 1,
                _ => return None,
            };
            if sha.is_empty() || !seen.insert(sha.clone()) {
                return None;
            }
            Some((sha, label))
        })
        .collect();

    if labels.is_empty() {
        return Err(MineError::NoLabels);
    }
    info!(
        store = %store_path.display(),
        labeled = labels.len(),
        "Labeled SHAs loaded from run store"
    );
    Ok(labels)
}

/// Traverse the labeled commits in `repo`, computing per-commit aggregates.
///
/// SHAs missing from this clone's history are skipped silently; an empty
/// result is fatal.
pub async fn mine_commits(
    repo: &RepoHandle,
    labels: &[(String, u8)],
) -> Result<Vec<MinedRow>, MineError> {
    let mut rows = Vec::new();

    for (sha, label) in labels {
        let Some(commit) = git::show_commit(repo.path(), sha).await? else {
            continue;
        };

        let lines_added = commit.files.iter().map(|f| f.added).sum();
        let lines_deleted = commit.files.iter().map(|f| f.removed).sum();
        let changed_tests = commit
            .files
            .iter()
            .filter(|f| is_test_file(&f.path))
            .count();

        rows.push(MinedRow {
            commit_hash: sha.clone(),
            lines_added,
            lines_deleted,
            files_changed: commit.files.len(),
            has_fix_keyword: u8::from(has_fix_keyword(&commit.message)),
            changed_tests,
            pipeline_failed: *label,
        });
        debug!(commit = %sha, files = rows.last().map_or(0, |r| r.files_changed), "Commit mined");
    }

    if rows.is_empty() {
        return Err(MineError::NoRows);
    }
    info!(rows = rows.len(), "Mining complete");
    Ok(rows)
}

/// Write rows to `out_csv`: headerless append when the table already
/// exists, fresh with header otherwise. Duplicate commit hashes within the
/// batch are dropped before writing.
pub fn write_rows(out_csv: &Path, rows: &[MinedRow]) -> Result<usize, MineError> {
    let mut seen = HashSet::new();
    let deduped: Vec<&MinedRow> = rows
        .iter()
        .filter(|r| seen.insert(r.commit_hash.clone()))
        .collect();

    if let Some(parent) = out_csv.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MineError::io(parent.display().to_string(), e))?;
        }
    }

    let exists = out_csv.exists();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(out_csv)
        .map_err(|e| MineError::io(out_csv.display().to_string(), e))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!exists)
        .from_writer(file);

    for row in &deduped {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .map_err(|e| MineError::io(out_csv.display().to_string(), e))?;

    info!(
        rows = deduped.len(),
        appended = exists,
        output = %out_csv.display(),
        "Feature table written"
    );
    Ok(deduped.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{materialize, RepoSource};
    use serde_json::json;
    use std::process::Command;

    fn write_store(dir: &tempfile::TempDir, runs: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("gha_runs.json");
        std::fs::write(&path, serde_json::to_vec(&runs).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_labels_keep_only_terminal_conclusions() {
        let dir = tempfile::tempdir().unwrap();
        let store = write_store(
            &dir,
            json!([
                {"id": 1, "head_sha": "aaa", "conclusion": "success", "event": "push", "created_at": null},
                {"id": 2, "head_sha": "bbb", "conclusion": "failure", "event": "push", "created_at": null},
                {"id": 3, "head_sha": "ccc", "conclusion": "skipped", "event": "push", "created_at": null},
                {"id": 4, "head_sha": "ddd", "conclusion": null, "event": "push", "created_at": null}
            ]),
        );
        let labels = load_labels(&store).unwrap();
        assert_eq!(
            labels,
            vec![("aaa".to_string(), 0), ("bbb".to_string(), 1)]
        );
    }

    #[test]
    fn test_skipped_only_store_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = write_store(
            &dir,
            json!([
                {"id": 1, "head_sha": "aaa", "conclusion": "skipped", "event": "push", "created_at": null}
            ]),
        );
        assert!(matches!(load_labels(&store), Err(MineError::NoLabels)));
    }

    #[test]
    fn test_first_label_per_sha_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = write_store(
            &dir,
            json!([
                {"id": 1, "head_sha": "aaa", "conclusion": "failure", "event": "push", "created_at": null},
                {"id": 2, "head_sha": "aaa", "conclusion": "success", "event": "push", "created_at": null}
            ]),
        );
        let labels = load_labels(&store).unwrap();
        assert_eq!(labels, vec![("aaa".to_string(), 1)]);
    }

    #[test]
    fn test_write_rows_append_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("pr_dataset.csv");
        let row = |hash: &str| MinedRow {
            commit_hash: hash.to_string(),
            lines_added: 5,
            lines_deleted: 2,
            files_changed: 1,
            has_fix_keyword: 1,
            changed_tests: 0,
            pipeline_failed: 0,
        };

        let written = write_rows(&out, &[row("aaa"), row("aaa"), row("bbb")]).unwrap();
        assert_eq!(written, 2);
        write_rows(&out, &[row("ccc")]).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        // One header plus three data rows; append never repeats the header.
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("commit_hash,lines_added,lines_deleted"));
        assert_eq!(content.matches("commit_hash").count(), 1);
    }

    fn git(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "tester")
            .env("GIT_AUTHOR_EMAIL", "tester@example.com")
            .env("GIT_COMMITTER_NAME", "tester")
            .env("GIT_COMMITTER_EMAIL", "tester@example.com")
            .status()
            .expect("git must be installed for miner tests");
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo(dir: &std::path::Path) -> String {
        git(dir, &["init", "-q"]);
        std::fs::create_dir_all(dir.join("tests")).unwrap();
        std::fs::write(dir.join("main.py"), "print('hi')\n").unwrap();
        std::fs::write(dir.join("tests/test_main.py"), "assert True\n").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", "fix crash in main"]);
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir)
            .output()
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[tokio::test]
    async fn test_mine_real_repository() {
        let dir = tempfile::tempdir().unwrap();
        let sha = init_repo(dir.path());

        let repo = materialize(&RepoSource::Local(dir.path().to_path_buf()))
            .await
            .unwrap();
        let labels = vec![(sha.clone(), 1), ("0000000000".to_string(), 0)];
        let rows = mine_commits(&repo, &labels).await.unwrap();

        // The unknown SHA is dropped silently.
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.commit_hash, sha);
        assert_eq!(row.files_changed, 2);
        assert_eq!(row.lines_added, 2);
        assert_eq!(row.has_fix_keyword, 1);
        assert_eq!(row.changed_tests, 1);
        assert_eq!(row.pipeline_failed, 1);
    }

    #[tokio::test]
    async fn test_mine_without_matches_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let repo = materialize(&RepoSource::Local(dir.path().to_path_buf()))
            .await
            .unwrap();
        let labels = vec![("0000000000".to_string(), 0)];
        assert!(matches!(
            mine_commits(&repo, &labels).await,
            Err(MineError::NoRows)
        ));
    }
}
