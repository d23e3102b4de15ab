//! Command-line driver.
//!
//! `bookvox <run.yaml>` narrates every configured book. Exit codes are a
//! contract for surrounding tooling:
//!
//! | code | meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | nothing to do / usage shown / run finished           |
//! | 1    | a recognized domain error (message printed)          |
//! | 10   | unexpected internal error (full diagnostic printed)  |
//!
//! A run that finished but recorded per-fragment or per-book errors exits
//! 0 with a loud `finished with ERRORS` line — the failed fragments stay
//! uncommitted and regenerate next run.

use std::error::Error as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bookvox::clock::SystemClock;
use bookvox::config::GlobalConfig;
use bookvox::{Language, ReaderError, RunOutcome, Scheduler};

const BANNER: &str =
    "==========================================================================";

#[derive(Parser)]
#[command(
    name = "bookvox",
    version,
    about = "Incremental audiobook narrator",
    long_about = "Converts marked-up book text into tagged MP3s, regenerating only \
                  fragments whose text changed since the last run."
)]
struct Args {
    /// YAML run configuration (engine, endpoint, list of books).
    config: Option<PathBuf>,
}

fn print_usage() {
    println!("Provide the path to a YAML run configuration as parameter.");
    println!("Book text files must be UTF-8 encoded.");
    println!(
        "Supported languages (both default and embedded with sign @): {}",
        Language::supported_tokens()
    );
}

fn run(config_path: &Path) -> Result<RunOutcome, ReaderError> {
    println!("Processing config: {}", config_path.display());
    let config = GlobalConfig::load(config_path)?;
    let clock = Arc::new(SystemClock);
    let backend = config.build_backend(clock.clone())?;
    let scheduler =
        Scheduler::new(backend.as_ref(), &*clock, Duration::from_secs(config.check_delay));
    scheduler.run(&config.audiobooks)
}

/// Two-part error report: what failed, then the cause chain.
fn print_domain_error(err: &ReaderError) {
    println!("\n{BANNER}");
    println!("[ERROR] {err}");
    println!("{BANNER}");
    let mut cause = err.source();
    if cause.is_some() {
        println!("Details:");
    }
    while let Some(err) = cause {
        println!("{err}");
        cause = err.source();
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let Some(config_path) = args.config else {
        print_usage();
        return ExitCode::SUCCESS;
    };

    match catch_unwind(AssertUnwindSafe(|| run(&config_path))) {
        Ok(Ok(RunOutcome::Completed)) => {
            println!("finished.");
            ExitCode::SUCCESS
        }
        Ok(Ok(RunOutcome::CompletedWithErrors)) => {
            println!("finished with ERRORS. See log above.");
            ExitCode::SUCCESS
        }
        Ok(Err(err)) => {
            print_domain_error(&err);
            ExitCode::from(1)
        }
        Err(panic) => {
            let detail = panic
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| panic.downcast_ref::<&str>().copied())
                .unwrap_or("unknown panic payload");
            println!("\n{BANNER}");
            println!("[ERROR] Unhandled internal error. Details below.");
            println!("{BANNER}");
            println!("Details:\n{detail}");
            ExitCode::from(10)
        }
    }
}
