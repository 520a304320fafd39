//! Error types for the `presteps` command line interface.

use thiserror::Error;

use super::*;

/// Error type alias used throughout the CLI.
pub type Result<T> = core::result::Result<T, PrestepsCliError>;

/// Errors surfaced to the user by the CLI.
#[derive(Error, Debug)]
pub enum PrestepsCliError {
  /// An error from the pipeline library.
  #[error(transparent)]
  Presteps(#[from] PrestepsError),

  /// A file system operation of the CLI itself failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// A required option was neither passed nor set in the configuration file.
  #[error("Missing required option --{0}, pass it or set it in the --config file")]
  MissingOption(&'static str),
}
