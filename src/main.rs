use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{NamedSource, Report};
use slt_runner::{
    create_output, discover_test_files, parser, Format, ProcessDriver, Record, RunnerConfig,
    TestRunner, DEFAULT_TARGET,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Default location of the sqllogictest suite
const DEFAULT_TEST_ROOT: &str = "third_party/sqllogictest/test";
/// Release build of the database, tried first
const DEFAULT_RELEASE_BINARY: &str = "target/release/sql-challenge";
/// Debug build of the database, tried when there is no release build
const DEFAULT_DEBUG_BINARY: &str = "target/debug/sql-challenge";

#[derive(Parser)]
#[command(name = "slt-runner")]
#[command(about = "Run sqllogictest scripts against a database over stdin/stdout")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tests
    Run {
        /// Test files or directories (default: the bundled suite)
        paths: Vec<PathBuf>,

        /// Database binary (default: target/release/sql-challenge, then target/debug)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Extra argument passed to the database binary (repeatable)
        #[arg(long = "db-arg", allow_hyphen_values = true)]
        db_args: Vec<String>,

        /// Database name matched by skipif/onlyif
        #[arg(long, default_value = DEFAULT_TARGET)]
        target: String,

        /// Stop on first failure
        #[arg(short = 'x', long)]
        fail_fast: bool,

        /// Run only test files whose name contains this pattern
        #[arg(short = 'f', long = "file")]
        filter: Option<String>,

        /// Log every SQL statement sent to the database
        #[arg(short, long)]
        verbose: bool,

        /// Show summary only, not per-file results
        #[arg(long)]
        summary: bool,

        /// Output format (pretty, json)
        #[arg(short, long, default_value = "pretty")]
        output: String,

        /// Seconds to wait for the database to exit before killing it
        #[arg(long, default_value_t = 5)]
        stop_timeout: u64,
    },

    /// Report malformed records in test files without running them
    Check {
        /// Test files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Database name matched by skipif/onlyif
        #[arg(long, default_value = DEFAULT_TARGET)]
        target: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            paths,
            db,
            db_args,
            target,
            fail_fast,
            filter,
            verbose,
            summary,
            output,
            stop_timeout,
        } => {
            init_tracing(verbose);
            let options = RunOptions {
                paths,
                db,
                db_args,
                target,
                fail_fast,
                filter,
                summary_only: summary,
                output,
                stop_timeout: Duration::from_secs(stop_timeout),
            };
            run_tests(options).await
        }
        Commands::Check { paths, target } => {
            init_tracing(false);
            check_files(paths, &target)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "slt_runner=debug"
    } else {
        "slt_runner=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

struct RunOptions {
    paths: Vec<PathBuf>,
    db: Option<PathBuf>,
    db_args: Vec<String>,
    target: String,
    fail_fast: bool,
    filter: Option<String>,
    summary_only: bool,
    output: String,
    stop_timeout: Duration,
}

async fn run_tests(options: RunOptions) -> ExitCode {
    let format: Format = match options.output.parse() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let Some(binary) = options.db.or_else(default_binary) else {
        eprintln!("Error: Database binary not found.");
        eprintln!("Run 'cargo build --release' first, or pass --db.");
        return ExitCode::from(1);
    };

    let paths = if options.paths.is_empty() {
        let root = PathBuf::from(DEFAULT_TEST_ROOT);
        if !root.exists() {
            eprintln!("Error: SQLLogicTest suite not found at {}.", root.display());
            eprintln!("Run: git submodule update --init --recursive");
            return ExitCode::from(1);
        }
        vec![root]
    } else {
        options.paths
    };

    let mut files = Vec::new();
    for path in &paths {
        match discover_test_files(path, options.filter.as_deref()) {
            Ok(found) => files.extend(found),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(1);
            }
        }
    }

    if files.is_empty() {
        match &options.filter {
            Some(pattern) => eprintln!("No test files matching '{}'", pattern),
            None => eprintln!("No test files found"),
        }
        return ExitCode::from(1);
    }

    // Paths print relative to the suite root when there is exactly one
    let root = match paths.as_slice() {
        [single] if single.is_dir() => Some(single.clone()),
        _ => None,
    };

    let driver = ProcessDriver::new(binary)
        .with_args(options.db_args)
        .with_stop_timeout(options.stop_timeout);
    let config = RunnerConfig::default()
        .with_target(options.target)
        .with_fail_fast(options.fail_fast);
    let mut runner = TestRunner::new(driver).with_config(config);

    let mut output = create_output(format, root, options.summary_only);
    output.write_start(files.len());
    output.flush();

    let summary = runner
        .run_files(&files, |result| {
            output.write_file(result);
            output.flush();
        })
        .await;

    output.write_summary(&summary);
    output.flush();

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Prefer a release build of the database, then a debug build
fn default_binary() -> Option<PathBuf> {
    [DEFAULT_RELEASE_BINARY, DEFAULT_DEBUG_BINARY]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn check_files(paths: Vec<PathBuf>, target: &str) -> ExitCode {
    let mut has_warnings = false;

    for path in &paths {
        let files = match discover_test_files(path, None) {
            Ok(files) => files,
            Err(e) => {
                eprintln!("{}: {}", "Error".red().bold(), e);
                has_warnings = true;
                continue;
            }
        };

        for file in &files {
            if !check_single_file(file, target) {
                has_warnings = true;
            }
        }
    }

    if has_warnings {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn check_single_file(path: &Path, target: &str) -> bool {
    let content = match parser::read_script(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{} - {}: {}", path.display(), "ERROR".red().bold(), e);
            return false;
        }
    };

    let mut records = parser::parse(&content, target);
    let (mut statements, mut queries) = (0, 0);
    for record in records.by_ref() {
        match record {
            Record::Statement { .. } => statements += 1,
            Record::Query { .. } => queries += 1,
            Record::Control { .. } => {}
        }
    }

    let warnings = records.warnings();
    if warnings.is_empty() {
        println!(
            "{} - {} ({} statements, {} queries, hash-threshold {})",
            path.display(),
            "OK".green(),
            statements,
            queries,
            records.hash_threshold()
        );
        return true;
    }

    println!(
        "{} - {} warning(s)",
        path.display().to_string().yellow(),
        warnings.len()
    );
    for warning in warnings {
        // Debug formatting renders the full miette diagnostic with source
        let report = Report::new(warning.clone()).with_source_code(NamedSource::new(
            path.display().to_string(),
            content.clone(),
        ));
        eprintln!("{:?}", report);
    }
    false
}
