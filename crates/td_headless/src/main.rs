//! Headless placement runner.
//!
//! This binary drives the placement engine without graphics, controlled via
//! JSON on stdin/stdout. Designed for scripted play, CI testing and replay
//! verification.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode with the built-in scenario
//! cargo run -p td_headless
//!
//! # Interactive mode with a scenario file, state after every command
//! cargo run -p td_headless -- run --scenario assets/scenarios/meadow.ron --auto-state
//!
//! # Replay a JSON-lines script several times and compare final hashes
//! cargo run -p td_headless -- verify --script session.jsonl --runs 5
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use td_headless::{verify_script, Command, HeadlessConfig, HeadlessRunner, Scenario};

#[derive(Parser)]
#[command(name = "td_headless")]
#[command(about = "Headless building placement runner for scripted play and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single interactive session
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Output state after every command
        #[arg(long)]
        auto_state: bool,
    },

    /// Verify determinism by replaying a command script several times
    Verify {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// JSON-lines command script
        #[arg(long)]
        script: PathBuf,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            auto_state,
        }) => cmd_run(scenario, auto_state),
        Some(Commands::Verify {
            scenario,
            script,
            runs,
        }) => cmd_verify(scenario, script, runs),
        None => cmd_run(None, false),
    }
}

/// Load a scenario file, or fall back to the built-in one.
fn load_scenario(path: Option<PathBuf>) -> Scenario {
    let Some(path) = path else {
        return Scenario::default();
    };
    match Scenario::load(&path) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to load scenario");
            eprintln!("Failed to load scenario: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run a single interactive session
fn cmd_run(scenario: Option<PathBuf>, auto_state: bool) {
    let scenario = load_scenario(scenario);
    tracing::info!(scenario = %scenario.name, "Starting interactive session");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
    };
    let mut runner = match HeadlessRunner::with_config(scenario, config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to build scenario: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    if let Err(e) = runner.run(stdin.lock(), io::stdout().lock()) {
        tracing::error!(error = %e, "Session aborted");
        std::process::exit(1);
    }
}

/// Verify determinism of a command script
fn cmd_verify(scenario: Option<PathBuf>, script: PathBuf, runs: usize) {
    let scenario = load_scenario(scenario);
    tracing::info!(
        "Verifying determinism: {} with {} ({} runs)",
        scenario.name,
        script.display(),
        runs
    );

    let contents = match std::fs::read_to_string(&script) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Failed to read script: {}", e);
            std::process::exit(1);
        }
    };

    let mut commands = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Command::from_json(line) {
            Ok(command) => commands.push(command),
            Err(e) => {
                eprintln!("Script line {}: {}", number + 1, e);
                std::process::exit(1);
            }
        }
    }

    let report = match verify_script(&scenario, &commands, runs) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Failed to build scenario: {}", e);
            std::process::exit(1);
        }
    };

    if report.is_deterministic() {
        eprintln!("PASS: All {} runs produced identical results", runs);
        if let Some(hash) = report.hashes.first() {
            eprintln!("  Final hash: {:016x}", hash);
        }
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (run, hash) in report.hashes.iter().enumerate() {
            eprintln!("  Run {}: {:016x}", run, hash);
        }
        std::process::exit(1);
    }
}
