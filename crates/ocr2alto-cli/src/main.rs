//! CLI application for turning scanned pages into ALTO-XML archives.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, recognize, reconcile, run, sort, status};

/// ocr2alto - OCR scanned pages and archive them as ALTO-XML
#[derive(Parser)]
#[command(name = "ocr2alto")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize every page image in the input area
    Recognize(recognize::RecognizeArgs),

    /// Regroup staged outputs into project folders
    Sort,

    /// Reconcile one batch and generate its ALTO files
    Reconcile,

    /// Recognize, then sort and reconcile until nothing is left
    Run(run::RunArgs),

    /// Show the work waiting in each stage
    Status,

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Recognize(args) => recognize::run(args, config_path).await,
        Commands::Sort => sort::run(config_path).await,
        Commands::Reconcile => reconcile::run(config_path).await,
        Commands::Run(args) => run::run(args, config_path).await,
        Commands::Status => status::run(config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
