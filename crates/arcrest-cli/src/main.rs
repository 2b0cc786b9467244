//! Command-line interface for `arcrest`, an ArcGIS REST map service extractor.
//!
//! This binary provides a CLI around the [`arcrest_core`] library: it copies the
//! vector layers of a map service into tables of a local GeoPackage.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured logging.
//! It parses arguments, configures logging, and delegates to command handlers.
//!
//! # Available Commands
//!
//! - `extract` - Extract all or selected layers of a service into a GeoPackage
//! - `layers` - List the layers of a service without extracting them

mod display;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{Level, error, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use arcrest_core::options::{DEFAULT_OUT_SR, ExtractionOptions, ExtractionRequest};
use arcrest_core::{ExtractError, operations};

/// Exit status after Ctrl-C, as shells report it for SIGINT.
const CANCELLED_EXIT_CODE: u8 = 130;

#[derive(Parser)]
#[command(
    name = "arcrest",
    version,
    about = "Extract ArcGIS REST map service layers into a GeoPackage",
    long_about = "arcrest copies the vector layers of an ArcGIS REST map service into tables of a \
                  local OGC GeoPackage.\nEach layer is queried once; failing layers are reported \
                  and skipped."
)]
/// Command-line arguments and options for the `arcrest` CLI.
///
/// This struct defines the top-level CLI interface, including global flags for
/// logging verbosity and the subcommand to execute.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `arcrest` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Extracts layers of a map service into a GeoPackage.
    ///
    /// The GeoPackage and its parent directory are created when missing; an
    /// existing GeoPackage is reused and new tables get unique names.
    Extract {
        /// Map service address, e.g. `https://host/arcgis/rest/services/Folder/Name/MapServer`.
        #[arg(short, long, value_name = "URL")]
        url: String,

        /// Path of the output GeoPackage.
        #[arg(short, long, value_name = "GPKG")]
        output: String,

        /// Comma-separated layer ids to extract (default: all layers).
        #[arg(short, long, value_name = "IDS", value_delimiter = ',')]
        layers: Vec<i64>,

        /// Spatial reference (WKID) the service should return geometries in.
        #[arg(long, value_name = "WKID", default_value_t = DEFAULT_OUT_SR)]
        out_sr: i32,

        /// Timeout in seconds for metadata requests.
        #[arg(long, value_name = "SECONDS", default_value_t = 10)]
        metadata_timeout: u64,

        /// Timeout in seconds for feature queries.
        #[arg(long, value_name = "SECONDS", default_value_t = 30)]
        query_timeout: u64,
    },

    /// Lists the layers of a map service and their geometry types.
    Layers {
        /// Map service address.
        #[arg(short, long, value_name = "URL")]
        url: String,

        /// Timeout in seconds for metadata requests.
        #[arg(long, value_name = "SECONDS", default_value_t = 10)]
        metadata_timeout: u64,
    },
}

/// Entry point for the `arcrest` command-line interface.
///
/// This function parses command-line arguments, configures the logging system based on
/// verbosity flags, and dispatches to the appropriate command handler. Ctrl-C stops the
/// run immediately with exit status 130; a table being written at that moment may be
/// left incomplete.
///
/// # Errors
///
/// Returns an error if command execution fails or if the logging system cannot be initialized.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity flags
    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true) // Show module paths for better context
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    tokio::select! {
        result = run(cli.command) => result.map(|()| ExitCode::SUCCESS),
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n\nExtraction cancelled by user (Ctrl+C)");
            Ok(ExitCode::from(CANCELLED_EXIT_CODE))
        },
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Extract {
            url,
            output,
            layers,
            out_sr,
            metadata_timeout,
            query_timeout,
        } => {
            let options = ExtractionOptions::new()
                .with_out_sr(Some(out_sr))
                .with_metadata_timeout(Duration::from_secs(metadata_timeout))
                .with_query_timeout(Duration::from_secs(query_timeout));
            handle_extract(&url, &output, layers, &options).await
        },
        Commands::Layers {
            url,
            metadata_timeout,
        } => {
            let options =
                ExtractionOptions::new().with_metadata_timeout(Duration::from_secs(metadata_timeout));
            handle_layers(&url, &options).await
        },
    }
}

async fn handle_extract(
    url: &str,
    output: &str,
    layer_ids: Vec<i64>,
    options: &ExtractionOptions,
) -> Result<()> {
    let request = ExtractionRequest::new(url, output, Some(layer_ids))
        .map_err(|e| fatal(&ExtractError::from(e)))?;

    println!("{}", display::format_configuration(&request, options));
    println!("\nSTARTING EXTRACTION...");

    let report = operations::extract_to_geopackage(&request, options)
        .await
        .map_err(|e| fatal(&e))?;

    info!("{report}");
    display::display_report(&report);
    Ok(())
}

async fn handle_layers(url: &str, options: &ExtractionOptions) -> Result<()> {
    let service = operations::describe(url, options)
        .await
        .map_err(|e| fatal(&e))?;
    display::display_service(&service);
    Ok(())
}

/// Logs a run-aborting error with its recovery hint and turns it into the
/// error reported by `main`.
fn fatal(err: &ExtractError) -> anyhow::Error {
    error!("{err}");
    if let Some(suggestion) = err.recovery_suggestion() {
        eprintln!("Hint: {suggestion}");
    }
    anyhow!(err.user_message())
}
