pub mod json;
pub mod pretty;

use crate::runner::{FileResult, RunSummary};
use std::path::{Path, PathBuf};

/// Output format trait
pub trait OutputFormat {
    /// Announce the run before any file executes
    fn write_start(&mut self, total_files: usize);

    /// Write results for a completed file
    fn write_file(&mut self, result: &FileResult);

    /// Write the final summary
    fn write_summary(&mut self, summary: &RunSummary);

    /// Flush any buffered output
    fn flush(&mut self);
}

/// Available output formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Format {
    Pretty,
    Json,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "json" => Ok(Format::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Create an output formatter for the given format.
///
/// File paths are shown relative to `root` when they live under it.
/// `summary_only` suppresses per-file lines in the pretty format.
pub fn create_output(
    format: Format,
    root: Option<PathBuf>,
    summary_only: bool,
) -> Box<dyn OutputFormat> {
    match format {
        Format::Pretty => Box::new(pretty::PrettyOutput::new(root, summary_only)),
        Format::Json => Box::new(json::JsonOutput::new(root)),
    }
}

/// Display a path relative to `root` if possible
pub(crate) fn display_path(path: &Path, root: Option<&Path>) -> String {
    root.and_then(|root| path.strip_prefix(root).ok())
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}
