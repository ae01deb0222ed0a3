//! Launch Matrix CLI
//! =================
//!
//! Command-line front end for a [`SuiteFile`]: show the matrix a suite would
//! run, or start every cell once and probe it over HTTP.
//!
//! ```text
//! # Display names of every cell, no processes started
//! $ launch-matrix-cli list suite.json
//!
//! # Start each launcher, GET / on it, tear everything down
//! $ launch-matrix-cli probe suite.json --path /health --attempts 30
//! ```
//!
//! `probe` exits non-zero when any cell fails to answer with a 2xx status or
//! when teardown is not clean.

// cargo run --bin launch-matrix-cli -- list suite.json

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use launch_matrix::*;

#[derive(Debug, Parser)]
#[command(name = "launch-matrix-cli", version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Print the display name of every matrix cell
    List {
        /// Suite description (JSON)
        suite: PathBuf,
    },

    /// Start every cell and send one GET request to it
    Probe {
        /// Suite description (JSON)
        suite: PathBuf,

        /// Request path
        #[arg(long, default_value = "/")]
        path: String,

        /// Override the retry budget (attempts per request)
        #[arg(long)]
        attempts: Option<u32>,

        /// Override the delay between attempts, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
}

fn main() -> MatrixResult<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    LoggingConfig::new()
        .level(level)
        .logger_name("launch-matrix-cli")
        .init_global();

    match cli.cmd {
        Cmd::List { suite } => list(SuiteFile::load(&suite)?),
        Cmd::Probe {
            suite,
            path,
            attempts,
            delay_ms,
        } => probe(SuiteFile::load(&suite)?, &path, attempts, delay_ms),
    }
}

fn list(suite: SuiteFile) -> MatrixResult<()> {
    let orchestrator = MatrixOrchestrator::new(suite.registry(), suite.config())?;
    let names = orchestrator.generator().names(&suite.specification)?;
    println!(
        "{} cell(s) for `{}`:",
        names.len(),
        suite.specification.name
    );
    for name in names {
        println!("  {name}");
    }
    orchestrator.teardown();
    Ok(())
}

fn probe(
    suite: SuiteFile,
    path: &str,
    attempts: Option<u32>,
    delay_ms: Option<u64>,
) -> MatrixResult<()> {
    let mut config = suite.config();
    if let Some(attempts) = attempts {
        config.retry.max_attempts = attempts;
    }
    if let Some(delay_ms) = delay_ms {
        config.retry.delay = Duration::from_millis(delay_ms);
    }
    let orchestrator = MatrixOrchestrator::new(suite.registry(), config)?;

    let mut failed = 0usize;
    let outcome = orchestrator.contexts(&suite.specification).map(|cells| {
        for cell in cells {
            match cell.client().get(path) {
                Ok(res) if res.is_success() => println!("ok    {cell}: HTTP {}", res.status),
                Ok(res) => {
                    failed += 1;
                    println!("FAIL  {cell}: HTTP {}", res.status);
                }
                Err(e) => {
                    failed += 1;
                    println!("FAIL  {cell}: {e}");
                }
            }
        }
    });

    let report = orchestrator.teardown();
    print!("{report}");
    outcome?;

    if failed > 0 || !report.is_clean() {
        return Err(MatrixError::Internal(format!(
            "{failed} cell(s) failed, teardown clean: {}",
            report.is_clean()
        )));
    }
    Ok(())
}
