use crate::backends::DatabaseInstance;
use crate::comparison::{compare, ComparisonResult};
use crate::parser::ast::SortMode;

/// Run a statement and check it succeeded or failed as expected
pub async fn run_statement<D>(db: &mut D, sql: &str, expect_error: bool) -> ComparisonResult
where
    D: DatabaseInstance + ?Sized,
{
    let result = db.execute(sql).await;

    match (expect_error, result.error) {
        (true, None) => ComparisonResult::mismatch("Expected error but got success"),
        (false, Some(error)) => ComparisonResult::mismatch(error),
        _ => ComparisonResult::Match,
    }
}

/// Run a query and compare its output against the expected values
pub async fn run_query<D>(
    db: &mut D,
    sql: &str,
    column_types: &str,
    sort_mode: SortMode,
    expected_values: &[String],
) -> ComparisonResult
where
    D: DatabaseInstance + ?Sized,
{
    let result = db.execute(sql).await;

    if let Some(error) = result.error {
        return ComparisonResult::mismatch(error);
    }

    compare(&result.values, expected_values, column_types, sort_mode)
}
