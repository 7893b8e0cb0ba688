//! Fixed column schema for commit-change exports.

/// Column headers of a repaired commit-change CSV, in order.
pub const COMMIT_CHANGE_COLUMNS: [&str; 8] = [
    "PROJECT_ID",
    "FILE",
    "COMMIT_HASH",
    "DATE",
    "COMMITTER_ID",
    "LINES_ADDED",
    "LINES_REMOVED",
    "NOTE",
];

/// Number of fields every repaired record carries.
pub const EXPECTED_FIELD_COUNT: usize = COMMIT_CHANGE_COLUMNS.len();

/// Derived columns appended by enrichment, in output order.
pub const ENRICHED_COLUMNS: [&str; 3] = ["has_fix_keyword", "files_changed", "changed_tests"];
