use super::{display_path, OutputFormat};
use crate::runner::{FileResult, RunSummary};
use serde::Serialize;
use std::path::PathBuf;

/// JSON output for machine consumption
pub struct JsonOutput {
    root: Option<PathBuf>,
    files: Vec<JsonFileResult>,
}

impl JsonOutput {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonFileResult {
    path: String,
    passed: bool,
    statements: usize,
    failed_statements: usize,
    queries: usize,
    failed_queries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    parse_warnings: usize,
    duration_ms: u128,
}

#[derive(Debug, Serialize)]
struct JsonFirstFailure {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    reason: String,
}

#[derive(Debug, Serialize)]
struct JsonSummary {
    files: usize,
    files_passed: usize,
    files_failed: usize,
    statements: usize,
    failed_statements: usize,
    queries: usize,
    failed_queries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_failure: Option<JsonFirstFailure>,
    duration_ms: u128,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    files: &'a [JsonFileResult],
    summary: JsonSummary,
}

impl JsonOutput {
    fn file_result(&self, result: &FileResult) -> JsonFileResult {
        JsonFileResult {
            path: display_path(&result.file, self.root.as_deref()),
            passed: result.is_passed(),
            statements: result.statements,
            failed_statements: result.failed_statements,
            queries: result.queries,
            failed_queries: result.failed_queries,
            line: result.failure.as_ref().map(|f| f.line_number),
            reason: result
                .error
                .clone()
                .or_else(|| result.failure.as_ref().map(|f| f.detail.clone())),
            parse_warnings: result.parse_warnings,
            duration_ms: result.duration.as_millis(),
        }
    }

    fn summary(&self, summary: &RunSummary) -> JsonSummary {
        JsonSummary {
            files: summary.total_files(),
            files_passed: summary.files_passed,
            files_failed: summary.files_failed,
            statements: summary.statements,
            failed_statements: summary.failed_statements,
            queries: summary.queries,
            failed_queries: summary.failed_queries,
            first_failure: summary.first_failure.as_ref().map(|f| JsonFirstFailure {
                path: display_path(&f.file, self.root.as_deref()),
                line: f.line_number,
                reason: f.detail.clone(),
            }),
            duration_ms: summary.duration.as_millis(),
        }
    }

    fn report(&self, summary: &RunSummary) -> serde_json::Result<String> {
        let report = JsonReport {
            files: &self.files,
            summary: self.summary(summary),
        };
        serde_json::to_string_pretty(&report)
    }
}

impl OutputFormat for JsonOutput {
    fn write_start(&mut self, _total_files: usize) {}

    fn write_file(&mut self, result: &FileResult) {
        let json_result = self.file_result(result);
        self.files.push(json_result);
    }

    fn write_summary(&mut self, summary: &RunSummary) {
        match self.report(summary) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing JSON: {e}"),
        }
    }

    fn flush(&mut self) {
        // JSON output is done all at once in write_summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{Failure, FirstFailure};
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn test_report_shape() {
        let mut output = JsonOutput::new(Some(PathBuf::from("suite")));
        let result = FileResult {
            file: PathBuf::from("suite/select1.test"),
            statements: 3,
            failed_statements: 0,
            queries: 2,
            failed_queries: 1,
            failure: Some(Failure {
                line_number: 12,
                detail: "Row count mismatch: got 1, expected 2".to_string(),
            }),
            error: None,
            parse_warnings: 0,
            duration: Duration::from_millis(5),
        };
        output.write_file(&result);

        let mut summary = RunSummary::default();
        summary.add(&result);

        let json: serde_json::Value =
            serde_json::from_str(&output.report(&summary).unwrap()).unwrap();
        assert_eq!(json["files"][0]["path"], "select1.test");
        assert_eq!(json["files"][0]["passed"], false);
        assert_eq!(json["files"][0]["line"], 12);
        assert_eq!(json["summary"]["files_failed"], 1);
        assert_eq!(json["summary"]["first_failure"]["line"], 12);
        assert_eq!(
            summary.first_failure,
            Some(FirstFailure {
                file: Path::new("suite/select1.test").to_path_buf(),
                line_number: Some(12),
                detail: "Line 12: Row count mismatch: got 1, expected 2".to_string(),
            })
        );
    }
}
