//! Tower defense placement - development tools

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "td-tools")]
#[command(about = "Development tools for the building placement engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate building catalogs and board configs
    Validate {
        /// Data file or directory
        #[arg(default_value = "assets/data")]
        path: String,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {path}");
            match td_tools::validate::validate_path(std::path::Path::new(&path)) {
                Ok(report) => tracing::info!(
                    catalogs = report.catalogs.len(),
                    boards = report.boards.len(),
                    "Validation passed"
                ),
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
