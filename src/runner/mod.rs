mod discover;
pub mod executor;

pub use discover::{discover_test_files, TEST_EXTENSION};

use crate::backends::DatabaseInstance;
use crate::comparison::ComparisonResult;
use crate::parser::ast::{ControlDirective, Record};
use crate::parser::{self, DEFAULT_TARGET};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A record whose outcome didn't match the script
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// Line of the failing record's directive
    pub line_number: usize,
    pub detail: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line_number, self.detail)
    }
}

/// Result of running all records in a file
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Source file path
    pub file: PathBuf,
    pub statements: usize,
    pub failed_statements: usize,
    pub queries: usize,
    pub failed_queries: usize,
    /// First record that failed, if any
    pub failure: Option<Failure>,
    /// Set when the file could not be run at all
    pub error: Option<String>,
    /// Malformed constructs the parser skipped
    pub parse_warnings: usize,
    /// Total duration
    pub duration: Duration,
}

impl FileResult {
    fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            statements: 0,
            failed_statements: 0,
            queries: 0,
            failed_queries: 0,
            failure: None,
            error: None,
            parse_warnings: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.failure.is_none() && self.error.is_none()
    }

    /// Human-readable reason the file failed
    pub fn detail(&self) -> Option<String> {
        match (&self.error, &self.failure) {
            (Some(error), _) => Some(error.clone()),
            (None, Some(failure)) => Some(failure.to_string()),
            (None, None) => None,
        }
    }

    fn record_failure(&mut self, line_number: usize, detail: String) {
        debug!(file = %self.file.display(), line_number, %detail, "record failed");
        if self.failure.is_none() {
            self.failure = Some(Failure {
                line_number,
                detail,
            });
        }
    }
}

/// First failing file of a run
#[derive(Debug, Clone, PartialEq)]
pub struct FirstFailure {
    pub file: PathBuf,
    /// Missing when the file failed before any record ran
    pub line_number: Option<usize>,
    pub detail: String,
}

/// Aggregated results from a test run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_passed: usize,
    pub files_failed: usize,
    pub statements: usize,
    pub failed_statements: usize,
    pub queries: usize,
    pub failed_queries: usize,
    pub first_failure: Option<FirstFailure>,
    /// Total duration
    pub duration: Duration,
}

impl RunSummary {
    pub fn add(&mut self, result: &FileResult) {
        self.statements += result.statements;
        self.failed_statements += result.failed_statements;
        self.queries += result.queries;
        self.failed_queries += result.failed_queries;

        if result.is_passed() {
            self.files_passed += 1;
            return;
        }

        self.files_failed += 1;
        if self.first_failure.is_none() {
            self.first_failure = Some(FirstFailure {
                file: result.file.clone(),
                line_number: result.failure.as_ref().map(|f| f.line_number),
                detail: result.detail().unwrap_or_default(),
            });
        }
    }

    pub fn total_files(&self) -> usize {
        self.files_passed + self.files_failed
    }

    /// Percentage of files that passed
    pub fn pass_rate(&self) -> f64 {
        match self.total_files() {
            0 => 0.0,
            total => self.files_passed as f64 / total as f64 * 100.0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.files_failed == 0
    }
}

/// Test runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Name matched by `skipif`/`onlyif`
    pub target: String,
    /// Stop at the first failing record and skip remaining files
    pub fail_fast: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            fail_fast: false,
        }
    }
}

impl RunnerConfig {
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Runs scripts one after another against a single database instance
pub struct TestRunner<D: DatabaseInstance> {
    db: D,
    config: RunnerConfig,
}

impl<D: DatabaseInstance> TestRunner<D> {
    pub fn new(db: D) -> Self {
        Self {
            db,
            config: RunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run every file in order, reporting each as it completes.
    /// The database is stopped before returning.
    pub async fn run_files<F>(&mut self, files: &[PathBuf], mut on_file: F) -> RunSummary
    where
        F: FnMut(&FileResult),
    {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        for file in files {
            let result = self.run_file(file).await;
            on_file(&result);
            summary.add(&result);

            if !result.is_passed() && self.config.fail_fast {
                info!("stopping on first failure");
                break;
            }
        }

        self.db.stop().await;
        summary.duration = start.elapsed();
        summary
    }

    /// Run a single file against a freshly restarted database
    pub async fn run_file(&mut self, path: &Path) -> FileResult {
        match parser::read_script(path) {
            Ok(script) => self.run_script(path, &script).await,
            Err(e) => {
                let mut result = FileResult::new(path);
                result.error = Some(format!("read error: {}", e));
                result
            }
        }
    }

    /// Run the records of an already-loaded script
    pub async fn run_script(&mut self, path: &Path, script: &str) -> FileResult {
        let start = Instant::now();
        let mut result = FileResult::new(path);

        if let Err(e) = self.db.restart().await {
            result.error = Some(format!("Database failed to start: {}", e));
            result.duration = start.elapsed();
            return result;
        }

        let mut records = parser::parse(script, &self.config.target);
        for record in records.by_ref() {
            let outcome = match &record {
                Record::Control {
                    directive: ControlDirective::Halt,
                    ..
                } => break,
                Record::Statement {
                    sql, expect_error, ..
                } => {
                    result.statements += 1;
                    let outcome = executor::run_statement(&mut self.db, sql, *expect_error).await;
                    if !outcome.is_match() {
                        result.failed_statements += 1;
                    }
                    outcome
                }
                Record::Query {
                    sql,
                    column_types,
                    sort_mode,
                    expected_values,
                    ..
                } => {
                    result.queries += 1;
                    let outcome = executor::run_query(
                        &mut self.db,
                        sql,
                        column_types,
                        *sort_mode,
                        expected_values,
                    )
                    .await;
                    if !outcome.is_match() {
                        result.failed_queries += 1;
                    }
                    outcome
                }
            };

            if let ComparisonResult::Mismatch { reason } = outcome {
                result.record_failure(record.line_number(), reason);
                if self.config.fail_fast {
                    break;
                }
            }
        }
        result.parse_warnings = records.warnings().len();
        result.duration = start.elapsed();

        info!(
            file = %path.display(),
            passed = result.is_passed(),
            statements = result.statements,
            queries = result.queries,
            "finished file"
        );
        result
    }
}

/// Errors raised before any file runs
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("glob error: {0}")]
    Glob(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{BackendError, QueryResult};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Answers from a fixed SQL -> result table and counts restarts
    #[derive(Default)]
    struct FakeDatabase {
        answers: HashMap<String, QueryResult>,
        executed: Vec<String>,
        restarts: usize,
        fail_start: bool,
    }

    impl FakeDatabase {
        fn answer(mut self, sql: &str, result: QueryResult) -> Self {
            self.answers.insert(sql.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl DatabaseInstance for FakeDatabase {
        async fn start(&mut self) -> Result<(), BackendError> {
            if self.fail_start {
                return Err(BackendError::Spawn("no binary".to_string()));
            }
            self.restarts += 1;
            Ok(())
        }

        async fn stop(&mut self) {}

        async fn execute(&mut self, sql: &str) -> QueryResult {
            self.executed.push(sql.to_string());
            self.answers
                .get(sql)
                .cloned()
                .unwrap_or_else(|| QueryResult::success(vec![]))
        }
    }

    fn values(values: &[&str]) -> QueryResult {
        QueryResult::success(values.iter().map(|v| v.to_string()).collect())
    }

    const SCRIPT: &str = "statement ok
CREATE TABLE t(a INTEGER, b TEXT)

statement error
SELECT * FROM missing

query IT rowsort
SELECT a, b FROM t
----
1
one
2
two

halt

statement ok
DROP TABLE t";

    #[tokio::test]
    async fn test_run_script_passes() {
        let db = FakeDatabase::default()
            .answer("SELECT * FROM missing", QueryResult::error("Error: no such table"))
            .answer("SELECT a, b FROM t", values(&["2", "two", "1.0", "one"]));
        let mut runner = TestRunner::new(db);

        let result = runner.run_script(Path::new("t.test"), SCRIPT).await;
        assert!(result.is_passed(), "{:?}", result.detail());
        assert_eq!(result.statements, 2);
        assert_eq!(result.queries, 1);
        assert!(!runner.db.executed.contains(&"DROP TABLE t".to_string()));
        assert_eq!(runner.db.restarts, 1);
    }

    #[tokio::test]
    async fn test_failures_keep_counting() {
        let db = FakeDatabase::default()
            .answer("SELECT a, b FROM t", values(&["1", "one"]));
        let mut runner = TestRunner::new(db);

        let result = runner.run_script(Path::new("t.test"), SCRIPT).await;
        assert!(!result.is_passed());
        assert_eq!(result.failed_statements, 1);
        assert_eq!(result.failed_queries, 1);
        assert_eq!(
            result.failure,
            Some(Failure {
                line_number: 4,
                detail: "Expected error but got success".to_string(),
            })
        );
        assert_eq!(
            result.detail().as_deref(),
            Some("Line 4: Expected error but got success")
        );
    }

    #[tokio::test]
    async fn test_fail_fast_stops_file() {
        let mut runner = TestRunner::new(FakeDatabase::default())
            .with_config(RunnerConfig::default().with_fail_fast(true));

        let result = runner.run_script(Path::new("t.test"), SCRIPT).await;
        assert_eq!(result.statements, 2);
        assert_eq!(result.queries, 0);
        assert_eq!(result.failed_statements, 1);
    }

    #[tokio::test]
    async fn test_target_controls_conditionals() {
        let script = "onlyif postgresql\nstatement ok\nSELECT pg\n\nskipif postgresql\nstatement ok\nSELECT not_pg";
        let mut runner = TestRunner::new(FakeDatabase::default())
            .with_config(RunnerConfig::default().with_target("postgresql"));

        runner.run_script(Path::new("t.test"), script).await;
        assert_eq!(runner.db.executed, vec!["SELECT pg"]);
    }

    #[tokio::test]
    async fn test_start_failure_fails_file() {
        let db = FakeDatabase {
            fail_start: true,
            ..Default::default()
        };
        let mut runner = TestRunner::new(db);

        let result = runner.run_script(Path::new("t.test"), SCRIPT).await;
        assert!(!result.is_passed());
        assert_eq!(result.statements, 0);
        assert_eq!(
            result.detail().as_deref(),
            Some("Database failed to start: Error starting database: no binary")
        );
    }

    #[tokio::test]
    async fn test_parse_warnings_are_counted() {
        let script = "statement ok\nSELECT 1\n\nquery I nosort\nSELECT 2";
        let mut runner = TestRunner::new(FakeDatabase::default());

        let result = runner.run_script(Path::new("t.test"), script).await;
        assert!(result.is_passed());
        assert_eq!(result.parse_warnings, 1);
    }

    #[tokio::test]
    async fn test_run_files_restarts_per_file_and_summarizes() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.test");
        let bad = dir.path().join("b.test");
        std::fs::write(&good, "statement ok\nSELECT 1\n").unwrap();
        std::fs::write(&bad, "statement error\nSELECT 1\n").unwrap();

        let mut runner = TestRunner::new(FakeDatabase::default());
        let mut seen = Vec::new();
        let summary = runner
            .run_files(&[good.clone(), bad.clone(), good.clone()], |r| {
                seen.push(r.file.clone())
            })
            .await;

        assert_eq!(seen, vec![good.clone(), bad.clone(), good]);
        assert_eq!(runner.db.restarts, 3);
        assert_eq!(summary.files_passed, 2);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.statements, 3);
        assert_eq!(summary.failed_statements, 1);
        assert!(!summary.is_success());
        assert_eq!(
            summary.first_failure,
            Some(FirstFailure {
                file: bad,
                line_number: Some(1),
                detail: "Line 1: Expected error but got success".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_fail_fast_skips_remaining_files() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("a.test");
        let good = dir.path().join("b.test");
        std::fs::write(&bad, "statement error\nSELECT 1\n").unwrap();
        std::fs::write(&good, "statement ok\nSELECT 1\n").unwrap();

        let mut runner = TestRunner::new(FakeDatabase::default())
            .with_config(RunnerConfig::default().with_fail_fast(true));
        let summary = runner.run_files(&[bad, good], |_| {}).await;

        assert_eq!(summary.total_files(), 1);
        assert_eq!(summary.pass_rate(), 0.0);
    }

    #[test]
    fn test_summary_pass_rate() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.pass_rate(), 0.0);

        let passed = FileResult::new(Path::new("a.test"));
        let mut failed = FileResult::new(Path::new("b.test"));
        failed.error = Some("read error: gone".to_string());

        summary.add(&passed);
        summary.add(&passed);
        summary.add(&passed);
        summary.add(&failed);
        assert_eq!(summary.pass_rate(), 75.0);
        assert_eq!(
            summary.first_failure.as_ref().map(|f| f.line_number),
            Some(None)
        );
    }
}
