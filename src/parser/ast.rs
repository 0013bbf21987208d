use std::fmt::Display;
use std::str::FromStr;

/// A single record parsed from a sqllogictest script
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// SQL that must succeed, or fail when `expect_error` is set
    Statement {
        sql: String,
        expect_error: bool,
        /// 1-based line of the `statement` header
        line_number: usize,
    },
    /// SQL whose output is compared against `expected_values`
    Query {
        sql: String,
        /// One type tag per result column, e.g. `"ITR"`
        column_types: String,
        sort_mode: SortMode,
        /// Flattened expected output, `column_types.len()` values per row
        expected_values: Vec<String>,
        label: Option<String>,
        line_number: usize,
    },
    /// A directive that affects execution rather than producing SQL
    Control {
        directive: ControlDirective,
        argument: Option<String>,
        line_number: usize,
    },
}

impl Record {
    /// Line of the directive that produced this record
    pub fn line_number(&self) -> usize {
        match self {
            Record::Statement { line_number, .. }
            | Record::Query { line_number, .. }
            | Record::Control { line_number, .. } => *line_number,
        }
    }

    /// Check if this record stops processing of its file
    pub fn is_halt(&self) -> bool {
        matches!(
            self,
            Record::Control {
                directive: ControlDirective::Halt,
                ..
            }
        )
    }
}

/// Control directives surfaced to the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlDirective {
    /// Stop processing the current file
    Halt,
}

impl Display for ControlDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlDirective::Halt => f.write_str("halt"),
        }
    }
}

/// How query output is ordered before comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Compare in the order the database returned
    #[default]
    NoSort,
    /// Sort whole rows lexicographically
    RowSort,
    /// Sort every value independently of its row
    ValueSort,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nosort" => Ok(SortMode::NoSort),
            "rowsort" => Ok(SortMode::RowSort),
            "valuesort" => Ok(SortMode::ValueSort),
            _ => Err(format!("unknown sort mode: {}", s)),
        }
    }
}

impl Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortMode::NoSort => f.write_str("nosort"),
            SortMode::RowSort => f.write_str("rowsort"),
            SortMode::ValueSort => f.write_str("valuesort"),
        }
    }
}
