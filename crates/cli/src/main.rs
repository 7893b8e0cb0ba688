//! buildset CLI
//!
//! Standalone batch jobs for assembling a labeled CI build-outcome dataset:
//! CSV repair and enrichment, remote labeling via the GitHub API, paginated
//! workflow-run collection, and local repository mining.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use gha::labeler::RemoteLabeler;
use gha::GhaClient;
use miner::git::RepoSource;

/// Assembles labeled CI build-outcome datasets from commit exports and GitHub Actions
#[derive(Parser)]
#[command(name = "buildset")]
#[command(about = "Assembles labeled CI build-outcome datasets from commit exports and GitHub Actions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair a malformed commit-change CSV export to the fixed 8-column schema
    Repair {
        /// Raw commit-change export
        #[arg(long)]
        input: PathBuf,

        /// Repaired CSV to write
        #[arg(long)]
        output: PathBuf,
    },
    /// Derive fix-keyword, files-changed, and changed-tests columns
    Enrich {
        /// Repaired CSV (output of `repair`)
        #[arg(long)]
        input: PathBuf,

        /// Enriched CSV to write
        #[arg(long)]
        output: PathBuf,

        /// Rows buffered per output chunk
        #[arg(long, default_value_t = dataset::enrich::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Attach gha_* columns and build labels via the GitHub API
    Label {
        /// Enriched CSV (output of `enrich`)
        #[arg(long)]
        input: PathBuf,

        /// Labeled CSV to write
        #[arg(long)]
        output: PathBuf,

        /// GitHub personal access token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,

        /// Maximum unique commits to query this run
        #[arg(long, default_value_t = 1000)]
        max_commits: usize,
    },
    /// Collect a repository's workflow runs into the JSON run store
    Collect {
        /// Repository owner
        #[arg(long)]
        owner: String,

        /// Repository name
        #[arg(long)]
        repo: String,

        /// GitHub personal access token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,

        /// Run store path (created or appended, deduplicated by run id)
        #[arg(long)]
        out: PathBuf,

        /// Runs requested per page
        #[arg(long, default_value_t = 100)]
        per_page: u32,
    },
    /// Join the run store against git history into a labeled feature table
    Mine {
        /// Workflow-run store (output of `collect`)
        #[arg(long)]
        gha_json: PathBuf,

        /// Feature table to write or append to
        #[arg(long)]
        out_csv: PathBuf,

        /// Path to an existing local clone
        #[arg(long, conflicts_with = "repo_url")]
        local_repo: Option<PathBuf>,

        /// Remote repository URL, cloned on demand
        #[arg(long)]
        repo_url: Option<String>,

        /// Persistent directory for remote clones
        #[arg(long, requires = "repo_url")]
        cache_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Repair { input, output } => {
            let report = dataset::repair::repair_file(&input, &output)
                .context("CSV repair failed")?;
            info!(
                rows = report.rows_written,
                repaired = report.repaired_rows,
                output = %output.display(),
                "Repaired export written"
            );
        }
        Commands::Enrich {
            input,
            output,
            chunk_size,
        } => {
            dataset::enrich::enrich_file(&input, &output, chunk_size)
                .context("Feature enrichment failed")?;
        }
        Commands::Label {
            input,
            output,
            token,
            max_commits,
        } => {
            let client = GhaClient::new(&token)?;
            let labeler = RemoteLabeler::new(client);
            labeler
                .label_file(&input, &output, max_commits)
                .await
                .context("Remote labeling failed")?;
        }
        Commands::Collect {
            owner,
            repo,
            token,
            out,
            per_page,
        } => {
            let client = GhaClient::new(&token)?;
            let runs = gha::collector::collect_runs(&client, &owner, &repo, per_page)
                .await
                .context("Workflow-run collection failed")?;
            let outcome = dataset::runstore::merge_and_save(&out, runs)?;
            info!(
                added = outcome.added,
                total = outcome.total,
                out = %out.display(),
                "Run store written"
            );
        }
        Commands::Mine {
            gha_json,
            out_csv,
            local_repo,
            repo_url,
            cache_dir,
        } => {
            let source = match (local_repo, repo_url) {
                (Some(path), _) => RepoSource::Local(path),
                (None, Some(url)) => RepoSource::Remote { url, cache_dir },
                (None, None) => {
                    bail!("Provide either --local-repo or --repo-url (optionally with --cache-dir)")
                }
            };

            let labels = miner::mine::load_labels(&gha_json)?;
            let repo = miner::git::materialize(&source).await?;
            let rows = miner::mine::mine_commits(&repo, &labels).await?;
            let written = miner::mine::write_rows(&out_csv, &rows)?;
            info!(rows = written, out = %out_csv.display(), "Feature table updated");
        }
    }

    Ok(())
}
