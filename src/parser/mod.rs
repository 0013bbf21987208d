pub mod ast;

use ast::*;
use miette::{Diagnostic, SourceSpan};
use std::io;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, trace};

/// Target name matched by `skipif`/`onlyif` unless the caller picks another
pub const DEFAULT_TARGET: &str = "sqlite";

/// Line that ends the SQL of a query and starts its expected values
const SEPARATOR: &str = "----";

/// Prefixes of lines that start a new directive
const DIRECTIVE_PREFIXES: [&str; 5] = [
    "statement ",
    "query ",
    "hash-threshold ",
    "skipif ",
    "onlyif ",
];

/// Parse a sqllogictest script, yielding records lazily
pub fn parse<'a>(input: &'a str, target: &str) -> Parser<'a> {
    Parser::new(input, target)
}

/// Read a script from disk, replacing invalid UTF-8 instead of failing
pub fn read_script(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

struct Line<'a> {
    text: &'a str,
    span: Range<usize>,
}

/// Pull-based cursor over the records of one script.
///
/// All scan state (position, pending skip, hash threshold) lives here and
/// is dropped with the parser, so every file gets a fresh one.
pub struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
    target: String,
    skip_next: bool,
    hash_threshold: i64,
    halted: bool,
    warnings: Vec<ParseWarning>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, target: &str) -> Self {
        Self {
            lines: split_lines(input),
            pos: 0,
            target: target.to_string(),
            skip_next: false,
            hash_threshold: 0,
            halted: false,
            warnings: Vec::new(),
        }
    }

    /// Last `hash-threshold` seen so far (0 when disabled)
    pub fn hash_threshold(&self) -> i64 {
        self.hash_threshold
    }

    /// Anomalies recovered from so far
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    fn parse_statement(&mut self, header: &str, line_number: usize) -> Option<Record> {
        let skip = std::mem::take(&mut self.skip_next);
        let expect_error = header.to_lowercase().contains("error");
        self.pos += 1;

        let sql_lines = self.take_block();

        if skip {
            debug!(line_number, "skipping statement");
            return None;
        }
        if sql_lines.is_empty() {
            self.warn(line_number, WarningKind::EmptyBody("statement"));
            return None;
        }

        Some(Record::Statement {
            sql: sql_lines.join("\n"),
            expect_error,
            line_number,
        })
    }

    fn parse_query(&mut self, header: &str, line_number: usize) -> Option<Record> {
        let skip = std::mem::take(&mut self.skip_next);
        self.pos += 1;

        let mut tokens = header.split_whitespace();
        let Some(column_types) = tokens.next() else {
            self.warn(line_number, WarningKind::MissingColumnTypes);
            return None;
        };

        let mut sort_mode = SortMode::NoSort;
        let mut label = None;
        for token in tokens {
            match token.parse::<SortMode>() {
                Ok(mode) => sort_mode = mode,
                Err(_) => label = Some(token.to_string()),
            }
        }

        // Blank lines inside the SQL are dropped, not terminators
        let mut sql_lines = Vec::new();
        loop {
            let Some(line) = self.lines.get(self.pos) else {
                self.warn(line_number, WarningKind::UnterminatedQuery);
                return None;
            };
            let text = line.text;
            self.pos += 1;
            if text == SEPARATOR {
                break;
            }
            if !text.trim().is_empty() {
                sql_lines.push(text);
            }
        }

        let mut expected_values = Vec::new();
        for line in self.take_block() {
            if line.contains('|') {
                expected_values.extend(line.split('|').map(str::to_string));
            } else {
                expected_values.push(line.to_string());
            }
        }

        if skip {
            debug!(line_number, "skipping query");
            return None;
        }
        if sql_lines.is_empty() {
            self.warn(line_number, WarningKind::EmptyBody("query"));
            return None;
        }

        Some(Record::Query {
            sql: sql_lines.join("\n"),
            column_types: column_types.to_string(),
            sort_mode,
            expected_values,
            label,
            line_number,
        })
    }

    fn parse_hash_threshold(&mut self, value: &str, line_number: usize) {
        match value.trim().parse::<i64>() {
            Ok(threshold) => self.hash_threshold = threshold,
            Err(_) => self.warn(
                line_number,
                WarningKind::InvalidHashThreshold(value.trim().to_string()),
            ),
        }
        self.pos += 1;
    }

    /// Consume lines up to the next blank line or directive
    fn take_block(&mut self) -> Vec<&'a str> {
        let start = self.pos;
        while let Some(line) = self.lines.get(self.pos) {
            if line.text.trim().is_empty() || is_directive(line.text) {
                break;
            }
            self.pos += 1;
        }
        self.lines[start..self.pos].iter().map(|l| l.text).collect()
    }

    fn warn(&mut self, line_number: usize, kind: WarningKind) {
        debug!(line_number, "{}", kind);
        let span = self
            .lines
            .get(line_number - 1)
            .map(|line| SourceSpan::new(line.span.start.into(), line.span.len()))
            .unwrap_or_else(|| SourceSpan::new(0.into(), 0));
        self.warnings.push(ParseWarning {
            kind,
            line_number,
            span,
        });
    }
}

impl Iterator for Parser<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        while !self.halted && self.pos < self.lines.len() {
            let line = self.lines[self.pos].text;
            let line_number = self.pos + 1;

            if line.trim().is_empty() || line.starts_with('#') {
                self.pos += 1;
                continue;
            }

            if let Some(name) = line.strip_prefix("skipif ") {
                if name.trim() == self.target {
                    self.skip_next = true;
                }
                self.pos += 1;
                continue;
            }

            if let Some(name) = line.strip_prefix("onlyif ") {
                if name.trim() != self.target {
                    self.skip_next = true;
                }
                self.pos += 1;
                continue;
            }

            if line == "halt" {
                self.halted = true;
                self.pos = self.lines.len();
                return Some(Record::Control {
                    directive: ControlDirective::Halt,
                    argument: None,
                    line_number,
                });
            }

            if let Some(value) = line.strip_prefix("hash-threshold ") {
                self.parse_hash_threshold(value, line_number);
                continue;
            }

            if let Some(header) = line.strip_prefix("statement ") {
                match self.parse_statement(header, line_number) {
                    Some(record) => return Some(record),
                    None => continue,
                }
            }

            if let Some(header) = line.strip_prefix("query ") {
                match self.parse_query(header, line_number) {
                    Some(record) => return Some(record),
                    None => continue,
                }
            }

            trace!(line_number, "ignoring unrecognized line");
            self.pos += 1;
        }
        None
    }
}

/// Check if a line starts a new directive
fn is_directive(line: &str) -> bool {
    let line = line.trim_start();
    line == "halt" || DIRECTIVE_PREFIXES.iter().any(|p| line.starts_with(p))
}

fn split_lines(input: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    input
        .split_inclusive('\n')
        .map(|raw| {
            let text = raw.trim_end_matches(|c| c == '\n' || c == '\r');
            let line = Line {
                text,
                span: offset..offset + text.len(),
            };
            offset += raw.len();
            line
        })
        .collect()
}

/// A malformed construct the parser stepped over
#[derive(Debug, Clone, PartialEq, thiserror::Error, Diagnostic)]
#[error("line {line_number}: {kind}")]
#[diagnostic(code(slt::parse), severity(Warning))]
pub struct ParseWarning {
    pub kind: WarningKind,
    pub line_number: usize,
    #[label("here")]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WarningKind {
    #[error("query has no '----' separator before end of file")]
    UnterminatedQuery,

    #[error("invalid hash-threshold value {0:?}")]
    InvalidHashThreshold(String),

    #[error("query header has no column types")]
    MissingColumnTypes,

    #[error("{0} has no SQL")]
    EmptyBody(&'static str),
}
