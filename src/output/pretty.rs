use super::{display_path, OutputFormat};
use crate::runner::{FileResult, RunSummary};
use colored::Colorize;
use std::io::{self, Write};
use std::path::PathBuf;

const RULE_WIDTH: usize = 60;

/// Closing message tier, by file pass rate
#[derive(Debug, PartialEq)]
enum Progress {
    Complete,
    /// 90% or more
    AlmostThere,
    /// 50% or more
    Halfway,
    Started,
    NothingPassed,
}

impl Progress {
    fn of(summary: &RunSummary) -> Self {
        let rate = summary.pass_rate();
        if summary.total_files() > 0 && summary.is_success() {
            Progress::Complete
        } else if rate >= 90.0 {
            Progress::AlmostThere
        } else if rate >= 50.0 {
            Progress::Halfway
        } else if rate > 0.0 {
            Progress::Started
        } else {
            Progress::NothingPassed
        }
    }
}

/// Pretty human-readable output
pub struct PrettyOutput {
    root: Option<PathBuf>,
    summary_only: bool,
}

impl PrettyOutput {
    pub fn new(root: Option<PathBuf>, summary_only: bool) -> Self {
        Self { root, summary_only }
    }
}

impl OutputFormat for PrettyOutput {
    fn write_start(&mut self, total_files: usize) {
        println!("Running {} test file(s)...", total_files);
        println!();
    }

    fn write_file(&mut self, result: &FileResult) {
        if self.summary_only {
            return;
        }

        let path = display_path(&result.file, self.root.as_deref());

        if result.is_passed() {
            println!(
                "  Testing {}... {} ({} stmt, {} queries)",
                path,
                "PASS".green(),
                result.statements,
                result.queries
            );
        } else {
            println!("  Testing {}... {}", path, "FAIL".red());
            if let Some(detail) = result.detail() {
                for line in detail.lines() {
                    println!("        {}", line);
                }
            }
        }

        if result.parse_warnings > 0 {
            println!(
                "        {}",
                format!("{} malformed record(s) skipped", result.parse_warnings).yellow()
            );
        }
    }

    fn write_summary(&mut self, summary: &RunSummary) {
        println!();
        println!("{}", "=".repeat(RULE_WIDTH));
        println!(
            "Files:      {}/{} passed ({:.1}%)",
            summary.files_passed,
            summary.total_files(),
            summary.pass_rate()
        );
        println!(
            "Statements: {}/{} passed",
            summary.statements - summary.failed_statements,
            summary.statements
        );
        println!(
            "Queries:    {}/{} passed",
            summary.queries - summary.failed_queries,
            summary.queries
        );
        println!(
            "{}",
            format!("Time:       {:.1}s", summary.duration.as_secs_f64()).dimmed()
        );

        if let Some(failure) = &summary.first_failure {
            let path = display_path(&failure.file, self.root.as_deref());
            println!();
            match failure.line_number {
                Some(line) => println!("{} {}:{}", "First failure:".red().bold(), path, line),
                None => println!("{} {}", "First failure:".red().bold(), path),
            }
            println!("  {}", failure.detail);
        }

        println!();
        match Progress::of(summary) {
            Progress::Complete => {
                println!("{}", "=".repeat(RULE_WIDTH));
                println!(
                    "{}",
                    "  CONGRATULATIONS! You've achieved 100% conformance!"
                        .green()
                        .bold()
                );
                println!("{}", "=".repeat(RULE_WIDTH));
            }
            Progress::AlmostThere => println!(
                "{}",
                format!("Almost there! {} file(s) to go.", summary.files_failed).yellow()
            ),
            Progress::Halfway => println!("Good progress! Keep building."),
            Progress::Started => println!("Getting started!"),
            Progress::NothingPassed => println!(
                "{}",
                format!("{} file(s) failed.", summary.files_failed).red().bold()
            ),
        }
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(passed: usize, failed: usize) -> RunSummary {
        RunSummary {
            files_passed: passed,
            files_failed: failed,
            ..Default::default()
        }
    }

    #[test]
    fn test_progress_tiers() {
        assert_eq!(Progress::of(&summary(10, 0)), Progress::Complete);
        assert_eq!(Progress::of(&summary(9, 1)), Progress::AlmostThere);
        assert_eq!(Progress::of(&summary(99, 1)), Progress::AlmostThere);
        assert_eq!(Progress::of(&summary(5, 5)), Progress::Halfway);
        assert_eq!(Progress::of(&summary(1, 9)), Progress::Started);
        assert_eq!(Progress::of(&summary(0, 3)), Progress::NothingPassed);
        assert_eq!(Progress::of(&summary(0, 0)), Progress::NothingPassed);
    }
}
