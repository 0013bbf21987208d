pub mod process;

use async_trait::async_trait;

/// Result from executing SQL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Values returned, flattened across rows in output order
    pub values: Vec<String>,
    /// Error message if the call failed
    pub error: Option<String>,
}

impl QueryResult {
    /// Create a successful result with values
    pub fn success(values: Vec<String>) -> Self {
        Self {
            values,
            error: None,
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            values: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Check if this result is an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A database under test that accepts one SQL unit at a time.
///
/// Calls are strictly sequential: a caller must not issue `execute` again
/// until the previous call has returned.
#[async_trait]
pub trait DatabaseInstance: Send {
    /// Start the database
    async fn start(&mut self) -> Result<(), BackendError>;

    /// Stop the database. Never fails, safe to call when not running.
    async fn stop(&mut self);

    /// Stop then start, discarding all database state
    async fn restart(&mut self) -> Result<(), BackendError> {
        self.stop().await;
        self.start().await
    }

    /// Execute SQL. Faults are reported through the result, never raised.
    async fn execute(&mut self, sql: &str) -> QueryResult;
}

/// Errors that can occur talking to the database process
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("Database process not running")]
    NotRunning,

    #[error("Error starting database: {0}")]
    Spawn(String),

    #[error("Database process crashed: {0}")]
    Crashed(String),

    #[error("Database process died: {0}")]
    Died(String),

    #[error("failed to read response: {0}")]
    Read(String),
}
