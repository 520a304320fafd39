//! Error types for the presteps library.
//!
//! The pipeline separates two kinds of failures:
//! - Structural failures (a required input is missing, unreadable or lacks mandatory columns)
//!   propagate to the caller as [`PrestepsError`].
//! - Soft failures on a single row (an unparseable field, an unresolved question, an answer that
//!   cannot be located) are represented by the same enum but are logged and turn into a dropped
//!   row rather than an error for the whole batch.
//!
//! # Examples
//!
//! ```no_run
//! use presteps::{dataset::load_relevance_judgments, error::PrestepsError};
//!
//! match load_relevance_judgments("relevance.xlsx") {
//!   Err(PrestepsError::MissingColumns { file, columns }) =>
//!     println!("{file} lacks {columns:?}"),
//!   Err(e) => println!("Other error: {e}"),
//!   Ok(judgments) => println!("{} judgments", judgments.len()),
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::kpi::KpiId;

/// Error type alias used for the [`presteps`](crate) crate.
pub type Result<T> = core::result::Result<T, PrestepsError>;

/// Errors that can occur while extracting or curating data.
#[derive(Error, Debug)]
pub enum PrestepsError {
  /// A tabular input lacks one or more mandatory columns.
  ///
  /// Fatal for single-table operations such as loading the relevance judgments. During folder
  /// aggregation the offending file is skipped instead.
  #[error("{file} is missing required columns: {columns:?}")]
  MissingColumns {
    /// The file (or table name) that was checked.
    file:    String,
    /// The columns that could not be found.
    columns: Vec<String>,
  },

  /// A structured field could not be parsed into its expected form.
  ///
  /// Raised for `source_page` and `relevant_paragraphs` values. The row carrying it is dropped.
  #[error("Could not parse {field} from {value:?}")]
  UnparseableField {
    /// Name of the field being parsed.
    field: &'static str,
    /// The raw value that failed to parse.
    value: String,
  },

  /// No question template exists for a KPI identifier.
  #[error("No question is mapped for KPI {0}")]
  UnresolvedQuestion(KpiId),

  /// An answer could not be located in its paragraph.
  #[error("The answer could not be located in the paragraph")]
  NoAnswerFound,

  /// An annotation row lists several paragraphs but not one page per paragraph.
  #[error("{paragraphs} relevant paragraphs cannot be paired with {pages} source pages")]
  MisalignedPages {
    /// Number of relevant paragraphs on the row.
    paragraphs: usize,
    /// Number of source pages on the row.
    pages:      usize,
  },

  /// The given input path is neither a file nor a directory.
  #[error("{0:?} is neither a file nor a folder")]
  InvalidInputPath(PathBuf),

  /// The validation ratio lies outside `[0, 1]`.
  #[error("Validation ratio must lie within [0, 1], got {0}")]
  InvalidRatio(f64),

  /// A file system operation failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// Extracted-text JSON could not be read or written.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A delimited text table could not be read or written.
  #[error(transparent)]
  Csv(#[from] csv::Error),

  /// A spreadsheet could not be opened or read.
  #[error(transparent)]
  Spreadsheet(#[from] calamine::Error),

  /// A spreadsheet could not be written.
  #[error(transparent)]
  XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

  /// PDF parsing and text extraction errors from lopdf.
  #[error(transparent)]
  Pdf(#[from] lopdf::Error),

  /// A TOML configuration file could not be deserialized.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// A folder scan pattern was invalid.
  #[error(transparent)]
  Pattern(#[from] glob::PatternError),

  /// Catch-all for configuration problems.
  #[error("{0}")]
  Config(String),
}
