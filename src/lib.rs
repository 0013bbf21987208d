pub mod backends;
pub mod comparison;
pub mod output;
pub mod parser;
pub mod runner;

pub use backends::process::ProcessDriver;
pub use backends::{BackendError, DatabaseInstance, QueryResult};
pub use comparison::{compare, normalize, ComparisonResult};
pub use output::{create_output, Format, OutputFormat};
pub use parser::ast::{ControlDirective, Record, SortMode};
pub use parser::{parse, ParseWarning, Parser, DEFAULT_TARGET};
pub use runner::{
    discover_test_files, FileResult, RunSummary, RunnerConfig, RunnerError, TestRunner,
};
