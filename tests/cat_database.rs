//! End-to-end runs against `cat`, which answers every request with the
//! request itself: `SELECT 1` comes back as the single value `SELECT 1;`.
#![cfg(unix)]

use slt_runner::{discover_test_files, ProcessDriver, RunnerConfig, TestRunner};
use std::fs;
use std::time::Duration;

fn cat() -> ProcessDriver {
    ProcessDriver::new("cat").with_stop_timeout(Duration::from_secs(2))
}

const ECHO_SCRIPT: &str = "# cat echoes the framed request
statement ok
SELECT 1

statement error
Error: expected

query T nosort
SELECT x
----
SELECT x;

query TT nosort
a|b
----
a|b;

skipif sqlite
query T nosort
never sent
----
wrong

hash-threshold 8

halt

query T nosort
after halt
----
wrong
";

#[tokio::test]
async fn test_echo_script_passes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.test");
    fs::write(&path, ECHO_SCRIPT).unwrap();

    let mut runner = TestRunner::new(cat());
    let summary = runner.run_files(&[path], |_| {}).await;

    assert!(summary.is_success(), "{:?}", summary.first_failure);
    assert_eq!(summary.statements, 2);
    assert_eq!(summary.queries, 2);
    assert_eq!(summary.pass_rate(), 100.0);
}

#[tokio::test]
async fn test_mismatch_reports_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a_pass.test"),
        "statement ok\nCREATE TABLE t(x)\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("b_fail.test"),
        "statement ok\nSELECT 1\n\nquery T nosort\nSELECT 2\n----\n2\n\nstatement error\nSELECT 3\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not a test").unwrap();

    let files = discover_test_files(dir.path(), None).unwrap();
    assert_eq!(files.len(), 2);

    let mut reported = Vec::new();
    let mut runner = TestRunner::new(cat());
    let summary = runner
        .run_files(&files, |result| reported.push(result.is_passed()))
        .await;

    assert_eq!(reported, vec![true, false]);
    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.failed_queries, 1);
    assert_eq!(summary.failed_statements, 1);

    let failure = summary.first_failure.unwrap();
    assert!(failure.file.ends_with("b_fail.test"));
    assert_eq!(failure.line_number, Some(4));
    assert_eq!(
        failure.detail,
        "Line 4: Mismatch at row 0, col 0: got 'SELECT 2;', expected '2'"
    );
}

#[tokio::test]
async fn test_fail_fast_and_target() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.test"),
        "onlyif postgresql\nstatement error\nSELECT 1\n\nstatement ok\nSELECT 2\n",
    )
    .unwrap();
    fs::write(dir.path().join("b.test"), "statement ok\nSELECT 3\n").unwrap();

    let files = discover_test_files(dir.path(), None).unwrap();
    let config = RunnerConfig::default()
        .with_target("postgresql")
        .with_fail_fast(true);
    let mut runner = TestRunner::new(cat()).with_config(config);
    let summary = runner.run_files(&files, |_| {}).await;

    assert_eq!(summary.total_files(), 1);
    assert_eq!(summary.statements, 1);
    assert_eq!(summary.failed_statements, 1);
}

#[tokio::test]
async fn test_missing_binary_fails_every_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.test");
    fs::write(&path, "statement ok\nSELECT 1\n").unwrap();

    let mut runner = TestRunner::new(ProcessDriver::new(dir.path().join("no-such-db")));
    let summary = runner.run_files(&[path.clone(), path], |_| {}).await;

    assert_eq!(summary.files_failed, 2);
    assert_eq!(summary.statements, 0);
    let failure = summary.first_failure.unwrap();
    assert_eq!(failure.line_number, None);
    assert!(failure.detail.starts_with("Database failed to start"));
}
