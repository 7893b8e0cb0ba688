//! Feature enrichment of repaired commit-change exports.
//!
//! Adds `has_fix_keyword`, `files_changed`, and `changed_tests` columns.
//! Commit-level aggregates are computed in a dedicated pre-pass over the
//! whole file, so they are correct regardless of how commits fall across
//! output chunks; rows are then streamed through in bounded-memory chunks.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::DatasetError;
use crate::features::{has_fix_keyword, is_test_file};
use crate::schema::ENRICHED_COLUMNS;

/// Default number of rows buffered per output chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Per-commit aggregates derived during the pre-pass.
#[derive(Debug, Clone, Copy, Default)]
struct CommitStats {
    files_changed: usize,
    changed_tests: bool,
}

/// Summary of one enrichment pass.
#[derive(Debug, Clone, Default)]
pub struct EnrichReport {
    /// Rows written to the output.
    pub rows_written: usize,
    /// Distinct commit hashes observed.
    pub commits_seen: usize,
}

/// Enrich the repaired CSV at `input`, writing to `output`.
pub fn enrich_file(
    input: &Path,
    output: &Path,
    chunk_size: usize,
) -> Result<EnrichReport, DatasetError> {
    let chunk_size = chunk_size.max(1);

    // Pre-pass: group rows by commit hash for files_changed / changed_tests.
    let mut reader = csv::Reader::from_path(input)?;
    let headers = reader.headers()?.clone();
    let hash_idx = column_index(&headers, "COMMIT_HASH")?;
    let file_idx = column_index(&headers, "FILE")?;
    let note_idx = column_index(&headers, "NOTE")?;

    let mut stats: HashMap<String, CommitStats> = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let hash = record.get(hash_idx).unwrap_or_default();
        let file = record.get(file_idx).unwrap_or_default();
        let entry = stats.entry(hash.to_string()).or_default();
        entry.files_changed += 1;
        entry.changed_tests |= is_test_file(file);
    }
    info!(
        input = %input.display(),
        commits = stats.len(),
        "Commit aggregates computed"
    );

    // Second pass: stream rows through in chunks, appending derived columns.
    let mut reader = csv::Reader::from_path(input)?;
    let mut writer = csv::Writer::from_path(output)?;

    let mut out_header = headers.clone();
    for col in ENRICHED_COLUMNS {
        out_header.push_field(col);
    }
    writer.write_record(&out_header)?;

    let mut report = EnrichReport {
        rows_written: 0,
        commits_seen: stats.len(),
    };

    let mut chunk: Vec<csv::StringRecord> = Vec::with_capacity(chunk_size);
    let mut flush_chunk = |chunk: &mut Vec<csv::StringRecord>,
                           report: &mut EnrichReport|
     -> Result<(), DatasetError> {
        for record in chunk.drain(..) {
            let hash = record.get(hash_idx).unwrap_or_default();
            let note = record.get(note_idx).unwrap_or_default();
            let commit = stats.get(hash).copied().unwrap_or_default();

            let mut out = record.clone();
            out.push_field(if has_fix_keyword(note) { "true" } else { "false" });
            out.push_field(&commit.files_changed.to_string());
            out.push_field(if commit.changed_tests { "true" } else { "false" });
            writer.write_record(&out)?;
            report.rows_written += 1;
        }
        writer.flush().map_err(|e| DatasetError::io(output.display().to_string(), e))?;
        Ok(())
    };

    for record in reader.records() {
        chunk.push(record?);
        if chunk.len() >= chunk_size {
            debug!(rows = report.rows_written + chunk.len(), "Enrichment chunk flushed");
            flush_chunk(&mut chunk, &mut report)?;
        }
    }
    flush_chunk(&mut chunk, &mut report)?;

    info!(
        rows = report.rows_written,
        commits = report.commits_seen,
        output = %output.display(),
        "Enrichment complete"
    );
    Ok(report)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, DatasetError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| DatasetError::MissingColumn {
            column: name.to_string(),
        })
}
