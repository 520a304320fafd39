//! Command line interface for the presteps extraction and curation pipeline.
//!
//! The `presteps` binary exposes the three stages of the pipeline:
//! - Paragraph extraction from PDF reports
//! - Legacy curation of `(context, label)` pairs for a binary relevance classifier
//! - KPI curation of question-answering train and validation sets
//!
//! # Usage
//!
//! ```bash
//! # Extract every PDF of a folder into JSON
//! presteps extract reports/ --output-folder extracted/
//!
//! # Curate one extracted document against an annotation workbook
//! presteps curate extracted/report_output.json annotations.xlsx kpi_mapping.csv
//!
//! # Build the question-answering dataset
//! presteps kpi-curation --annotation-folder annotations/ \
//!   --extracted-text-json-folder extracted/ --kpi-mapping-file kpi_mapping.csv \
//!   --relevance-file-path relevance.xlsx --output-folder curated/
//! ```
//!
//! Progress is logged to stderr with a verbosity chosen by `-v` and, with `--logs-folder`, to a
//! timestamped log file as well.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use clap::{builder::ArgAction, Args, Parser, Subcommand};
use presteps::{
  configuration::{CurationConfig, ExtractionSettings, LegacySettings},
  error::PrestepsError,
};
use tracing::{debug, trace};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod commands;
pub mod error;
pub mod interaction;

use crate::{commands::*, error::*, interaction::*};

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Extraction and curation pre-steps for KPI datasets")]
pub struct Cli {
  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Folder for a timestamped log file of the run. Without it, logs only go to stderr.
  #[arg(long, global = true)]
  logs_folder: Option<PathBuf>,

  /// The subcommand to execute
  #[command(subcommand)]
  command: Commands,
}

/// Configures the logging system based on the verbosity level
///
/// # Arguments
///
/// * `verbosity` - Number of times the verbose flag was used (0-4)
/// * `logs_folder` - Where to write `presteps_<YYYYmmddHHMMSS>.log`, if anywhere
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
///
/// The returned guard flushes the log file when dropped.
fn setup_logging(verbosity: u8, logs_folder: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
  let filter = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  let (file_layer, guard) = match logs_folder {
    Some(folder) => {
      std::fs::create_dir_all(folder)?;
      let file_name = format!("presteps_{}.log", chrono::Local::now().format("%Y%m%d%H%M%S"));
      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(folder, file_name));
      let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
      (Some(layer), Some(guard))
    },
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(
      fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true),
    )
    .with(file_layer)
    .init();
  Ok(guard)
}

/// Entry point for the presteps CLI application
///
/// Parses the command line, sets up logging and runs the requested stage. Failures are printed
/// as a styled error line and end the process with a non-zero exit code.
fn main() {
  let cli = Cli::parse();
  let interaction = Terminal;

  let result = setup_logging(cli.verbose, cli.logs_folder.as_ref()).and_then(|_guard| {
    trace!("Running with verbosity {}", cli.verbose);
    let result = match cli.command {
      Commands::Extract(options) => extract(&interaction, options),
      Commands::Curate(options) => curate(&interaction, options),
      Commands::KpiCuration(options) => kpi_curation(&interaction, options),
    };
    debug!("Command finished");
    result
  });

  if let Err(e) = result {
    let _ = interaction.reply(ResponseContent::Error(&e));
    std::process::exit(1);
  }
}
