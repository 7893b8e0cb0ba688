//! Structural repair of malformed commit-change CSV exports.
//!
//! Source exports carry unescaped commas in the NOTE column (inflating field
//! counts) and truncated rows (deflating them). Every output record is
//! normalized to exactly [`EXPECTED_FIELD_COUNT`] fields: excess fields are
//! folded into NOTE, missing trailing fields are empty-padded.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::DatasetError;
use crate::schema::{COMMIT_CHANGE_COLUMNS, EXPECTED_FIELD_COUNT};

/// Separator used when folding surplus fields back into NOTE.
const NOTE_JOIN: &str = ", ";

/// How many repaired-row diagnostics to keep for the operator log.
const MAX_DIAGNOSTICS: usize = 10;

/// Progress log interval, in input lines.
const PROGRESS_INTERVAL: usize = 50_000;

/// Summary of one repair pass.
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    /// Non-empty input lines read.
    pub lines_read: usize,
    /// Records written to the output.
    pub rows_written: usize,
    /// Records whose field count had to be adjusted.
    pub repaired_rows: usize,
    /// First few repaired rows: (line number, observed field count, sample).
    pub diagnostics: Vec<(usize, usize, String)>,
}

/// Repair `input` into a well-formed 8-column CSV at `output`.
///
/// Never fails on malformed content or undecodable bytes; only I/O and
/// output-write errors propagate.
pub fn repair_file(input: &Path, output: &Path) -> Result<RepairReport, DatasetError> {
    let bytes = fs::read(input).map_err(|e| DatasetError::io(input.display().to_string(), e))?;
    let (text, encoding) = decode_lossy(&bytes);
    info!(
        input = %input.display(),
        encoding,
        "Repairing commit-change export"
    );

    let mut writer = csv::Writer::from_path(output)?;
    writer.write_record(COMMIT_CHANGE_COLUMNS)?;

    let mut report = RepairReport::default();
    let mut first_line = true;

    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        report.lines_read += 1;

        // The export's own header row passes through as data otherwise.
        if first_line {
            first_line = false;
            if is_header_line(line) {
                continue;
            }
        }

        let fields = split_line(line);
        let observed = fields.len();
        let repaired = normalize_fields(fields);

        if observed != EXPECTED_FIELD_COUNT {
            report.repaired_rows += 1;
            if report.diagnostics.len() < MAX_DIAGNOSTICS {
                let sample: String = line.chars().take(100).collect();
                report.diagnostics.push((line_num, observed, sample));
            }
        }

        writer.write_record(&repaired)?;
        report.rows_written += 1;

        if report.lines_read % PROGRESS_INTERVAL == 0 {
            info!(
                lines = report.lines_read,
                rows = report.rows_written,
                "Repair progress"
            );
        }
    }

    writer.flush().map_err(|e| DatasetError::io(output.display().to_string(), e))?;

    info!(
        lines = report.lines_read,
        rows = report.rows_written,
        repaired = report.repaired_rows,
        "Repair complete"
    );
    for (line_num, count, sample) in &report.diagnostics {
        warn!(line = line_num, fields = count, sample = %sample, "Repaired malformed row");
    }

    Ok(report)
}

/// Decode raw bytes: strict UTF-8 first, then Windows-1252 (which covers the
/// latin-1 family and never rejects input). Undecodable sequences become
/// replacement characters instead of failing the job.
pub fn decode_lossy(bytes: &[u8]) -> (String, &'static str) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), "utf-8");
    }
    let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
    if had_errors {
        debug!("Replacement characters substituted during decode");
    }
    (text.into_owned(), "windows-1252")
}

/// Split one line into fields, quote-aware first, naive on parse failure.
fn split_line(line: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut records = reader.records();
    match records.next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        // Malformed quoting: fall back to raw delimiter splitting.
        _ => line.split(',').map(str::to_string).collect(),
    }
}

/// Force a field vector to exactly [`EXPECTED_FIELD_COUNT`] entries.
///
/// Surplus fields are joined into the trailing NOTE field; missing trailing
/// fields become empty strings.
pub fn normalize_fields(mut fields: Vec<String>) -> Vec<String> {
    match fields.len() {
        n if n > EXPECTED_FIELD_COUNT => {
            let note = fields.split_off(EXPECTED_FIELD_COUNT - 1).join(NOTE_JOIN);
            fields.push(note);
            fields
        }
        n if n < EXPECTED_FIELD_COUNT => {
            fields.resize(EXPECTED_FIELD_COUNT, String::new());
            fields
        }
        _ => fields,
    }
}

fn is_header_line(line: &str) -> bool {
    let fields = split_line(line);
    fields.len() == EXPECTED_FIELD_COUNT
        && fields
            .iter()
            .zip(COMMIT_CHANGE_COLUMNS.iter())
            .all(|(f, c)| f.trim().eq_ignore_ascii_case(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fields(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_overlong_row_folds_into_note() {
        let input = fields(&[
            "org.apache:ant", "build.xml", "abc123", "2020-01-01", "42", "10", "2", "fixed it",
            "really", "badly",
        ]);
        let repaired = normalize_fields(input);
        assert_eq!(repaired.len(), EXPECTED_FIELD_COUNT);
        assert_eq!(repaired[7], "fixed it, really, badly");
    }

    #[test]
    fn test_short_row_is_padded() {
        let repaired = normalize_fields(fields(&["org.apache:ant", "build.xml", "abc123"]));
        assert_eq!(repaired.len(), EXPECTED_FIELD_COUNT);
        assert_eq!(repaired[2], "abc123");
        assert_eq!(repaired[7], "");
        assert!(repaired[3..].iter().all(String::is_empty));
    }

    #[test]
    fn test_exact_row_unchanged() {
        let input = fields(&["p", "f", "h", "d", "c", "1", "2", "note"]);
        assert_eq!(normalize_fields(input.clone()), input);
    }

    #[test]
    fn test_quoted_commas_survive() {
        let split = split_line("p,f,h,d,c,1,2,\"note, with comma\"");
        assert_eq!(split.len(), EXPECTED_FIELD_COUNT);
        assert_eq!(split[7], "note, with comma");
    }

    #[test]
    fn test_decode_falls_back_on_invalid_utf8() {
        // 0xE9 is é in latin-1 / windows-1252 but invalid standalone UTF-8.
        let (text, encoding) = decode_lossy(b"caf\xe9");
        assert_eq!(encoding, "windows-1252");
        assert_eq!(text, "caf\u{e9}");
    }

    #[test]
    fn test_repair_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        let output = dir.path().join("fixed.csv");

        let mut f = std::fs::File::create(&input).unwrap();
        writeln!(f, "PROJECT_ID,FILE,COMMIT_HASH,DATE,COMMITTER_ID,LINES_ADDED,LINES_REMOVED,NOTE").unwrap();
        writeln!(f, "p1,src/a.py,abc,2020,7,1,0,plain note").unwrap();
        writeln!(f, "p1,src/b.py,abc,2020,7,2,1,broken, comma, note").unwrap();
        writeln!(f, "p1,src/c.py,def").unwrap();
        drop(f);

        let report = repair_file(&input, &output).unwrap();
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.repaired_rows, 2);
        assert_eq!(report.diagnostics.len(), 2);

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == EXPECTED_FIELD_COUNT));
        assert_eq!(&rows[1][7], "broken, comma, note");
        assert_eq!(&rows[2][7], "");
    }
}
