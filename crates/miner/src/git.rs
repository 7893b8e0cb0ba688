//! Git operations via shell commands.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::MineError;

/// Where the repository to traverse comes from.
#[derive(Debug, Clone)]
pub enum RepoSource {
    /// An existing local clone.
    Local(PathBuf),
    /// A remote URL, cloned on demand.
    Remote {
        url: String,
        /// Persistent clone cache; a temp directory is used when absent.
        cache_dir: Option<PathBuf>,
    },
}

/// A usable working copy, with temp-clone lifetime tied to the handle.
pub struct RepoHandle {
    path: PathBuf,
    _temp: Option<tempfile::TempDir>,
}

impl RepoHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One file touched by a commit, from `git show --numstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub added: u64,
    pub removed: u64,
    pub path: String,
}

/// Message and file changes of one commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub message: String,
    pub files: Vec<FileChange>,
}

/// Resolve a [`RepoSource`] into a working copy, cloning when needed.
///
/// Remote clones into a cache directory are reused on later runs.
pub async fn materialize(source: &RepoSource) -> Result<RepoHandle, MineError> {
    match source {
        RepoSource::Local(path) => {
            run_git(&["rev-parse", "--git-dir"], Some(path), "rev-parse").await?;
            Ok(RepoHandle {
                path: path.clone(),
                _temp: None,
            })
        }
        RepoSource::Remote { url, cache_dir } => {
            let (target, temp) = match cache_dir {
                Some(cache) => {
                    std::fs::create_dir_all(cache)
                        .map_err(|e| MineError::io(cache.display().to_string(), e))?;
                    (cache.join(repo_dir_name(url)), None)
                }
                None => {
                    let temp = tempfile::tempdir()
                        .map_err(|e| MineError::io("tempdir", e))?;
                    (temp.path().join(repo_dir_name(url)), Some(temp))
                }
            };

            if target.join(".git").is_dir() {
                info!(path = %target.display(), "Reusing cached clone");
            } else {
                info!(url = %url, path = %target.display(), "Cloning repository");
                let target_str = target.display().to_string();
                run_git(&["clone", url, &target_str], None, "clone").await?;
            }

            Ok(RepoHandle {
                path: target,
                _temp: temp,
            })
        }
    }
}

/// Fetch one commit's message and numstat.
///
/// Returns `Ok(None)` when the SHA is not reachable in this clone's history
/// (the CI may have run on a ref that never landed); mining skips it.
pub async fn show_commit(repo: &Path, sha: &str) -> Result<Option<CommitInfo>, MineError> {
    let message = match try_git(&["show", "-s", "--format=%B", sha], repo).await? {
        Some(out) => out.trim_end().to_string(),
        None => {
            debug!(commit = %sha, "SHA not in repository history, skipping");
            return Ok(None);
        }
    };

    let numstat = match try_git(&["show", "--numstat", "--format=", sha], repo).await? {
        Some(out) => out,
        None => return Ok(None),
    };

    Ok(Some(CommitInfo {
        message,
        files: parse_numstat(&numstat),
    }))
}

/// Parse `git show --numstat` output: `added<TAB>removed<TAB>path` lines,
/// with `-` for binary files.
pub fn parse_numstat(output: &str) -> Vec<FileChange> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let added = parts.next()?.trim();
            let removed = parts.next()?.trim();
            let path = parts.next()?.trim();
            if path.is_empty() {
                return None;
            }
            Some(FileChange {
                added: added.parse().unwrap_or(0),
                removed: removed.parse().unwrap_or(0),
                path: path.to_string(),
            })
        })
        .collect()
}

/// Run git, treating a non-zero exit as `Ok(None)`.
async fn try_git(args: &[&str], cwd: &Path) -> Result<Option<String>, MineError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| MineError::io("git", e))?;
    if output.status.success() {
        Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
    } else {
        Ok(None)
    }
}

/// Run git, treating a non-zero exit as fatal.
async fn run_git(args: &[&str], cwd: Option<&Path>, operation: &str) -> Result<String, MineError> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd
        .output()
        .await
        .map_err(|e| MineError::io("git", e))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(MineError::git(
            operation,
            String::from_utf8_lossy(&output.stderr).to_string(),
        ))
    }
}

fn repo_dir_name(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("repo")
        .trim_end_matches(".git")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numstat_plain() {
        let parsed = parse_numstat("12\t3\tsrc/foo.py\n0\t7\tREADME.md\n");
        assert_eq!(
            parsed,
            vec![
                FileChange {
                    added: 12,
                    removed: 3,
                    path: "src/foo.py".to_string()
                },
                FileChange {
                    added: 0,
                    removed: 7,
                    path: "README.md".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_numstat_binary_dash_counts_as_zero() {
        let parsed = parse_numstat("-\t-\tassets/logo.png\n");
        assert_eq!(parsed[0].added, 0);
        assert_eq!(parsed[0].removed, 0);
        assert_eq!(parsed[0].path, "assets/logo.png");
    }

    #[test]
    fn test_parse_numstat_rename_keeps_raw_path() {
        let parsed = parse_numstat("1\t1\tsrc/{old.py => new.py}\n");
        assert_eq!(parsed[0].path, "src/{old.py => new.py}");
    }

    #[test]
    fn test_parse_numstat_skips_blank_lines() {
        assert!(parse_numstat("\n\n").is_empty());
    }

    #[test]
    fn test_repo_dir_name() {
        assert_eq!(repo_dir_name("https://github.com/acme/widgets.git"), "widgets");
        assert_eq!(repo_dir_name("https://github.com/acme/widgets/"), "widgets");
    }
}
