pub mod normalize;

pub use normalize::{normalize, ColumnType};

use crate::parser::ast::SortMode;
use normalize::normalize_all;

/// Result of comparing actual vs expected output
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonResult {
    /// Results match
    Match,
    /// Results don't match
    Mismatch { reason: String },
}

impl ComparisonResult {
    /// Check if comparison passed
    pub fn is_match(&self) -> bool {
        matches!(self, ComparisonResult::Match)
    }

    /// Create a mismatch result
    pub fn mismatch(reason: impl Into<String>) -> Self {
        ComparisonResult::Mismatch {
            reason: reason.into(),
        }
    }
}

/// Compare flattened query output against the expected values.
///
/// Both sides are normalized under `column_types`, reordered according to
/// `sort_mode`, then compared position by position. Only the first
/// difference is reported.
pub fn compare(
    actual: &[String],
    expected: &[String],
    column_types: &str,
    sort_mode: SortMode,
) -> ComparisonResult {
    let type_tags: Vec<char> = column_types.chars().collect();
    let num_cols = type_tags.len().max(1);

    let mut actual = normalize_all(actual, &type_tags);
    let mut expected = normalize_all(expected, &type_tags);

    apply_sort(&mut actual, sort_mode, num_cols);
    apply_sort(&mut expected, sort_mode, num_cols);

    if actual.len() != expected.len() {
        return ComparisonResult::mismatch(format!(
            "Row count mismatch: got {}, expected {}",
            actual.len(),
            expected.len()
        ));
    }

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        if a != e {
            return ComparisonResult::mismatch(format!(
                "Mismatch at row {}, col {}: got '{}', expected '{}'",
                i / num_cols,
                i % num_cols,
                a,
                e
            ));
        }
    }

    ComparisonResult::Match
}

fn apply_sort(values: &mut Vec<String>, sort_mode: SortMode, num_cols: usize) {
    match sort_mode {
        SortMode::NoSort => {}
        SortMode::RowSort => {
            let mut rows: Vec<&[String]> = values.chunks(num_cols).collect();
            rows.sort();
            let sorted = rows.concat();
            *values = sorted;
        }
        SortMode::ValueSort => values.sort(),
    }
}
