use super::RunnerError;
use std::path::{Path, PathBuf};

/// Extension of sqllogictest scripts
pub const TEST_EXTENSION: &str = "test";

/// Find test scripts under `path`, sorted.
///
/// A directory is searched recursively for `*.test` files; a file is taken
/// as-is. When `filter` is set, only files whose stem contains it are kept.
pub fn discover_test_files(path: &Path, filter: Option<&str>) -> Result<Vec<PathBuf>, RunnerError> {
    let mut files = if path.is_dir() {
        let pattern = format!(
            "{}/**/*.{}",
            glob::Pattern::escape(&path.to_string_lossy()),
            TEST_EXTENSION
        );

        let mut files = Vec::new();
        for entry in glob::glob(&pattern).map_err(|e| RunnerError::Glob(e.to_string()))? {
            let file = entry.map_err(|e| RunnerError::Glob(e.to_string()))?;
            if file.is_file() {
                files.push(file);
            }
        }
        files
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        return Err(RunnerError::NotFound(path.to_path_buf()));
    };

    if let Some(filter) = filter {
        files.retain(|file| matches_filter(file, filter));
    }
    files.sort();
    Ok(files)
}

/// Check if a file's stem contains the filter
fn matches_filter(file: &Path, filter: &str) -> bool {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().contains(filter))
        .unwrap_or(false)
}
