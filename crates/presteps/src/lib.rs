//! Pre-processing steps for KPI question-answering datasets built from sustainability reports.
//!
//! `presteps` covers the two stages that sit between raw PDF reports and a model-ready dataset:
//!
//! - Paragraph extraction from PDF documents into a page-indexed JSON representation
//! - Curation of human annotations against that extracted text into labeled training examples
//!
//! # Features
//!
//! - **Annotation handling**: Aggregate annotation spreadsheets from a folder, validate their
//!   columns and clean them into one record per annotated paragraph
//! - **Paragraph matching**: Recover the full extracted paragraph behind an annotated snippet with
//!   exact matching first and fuzzy partial-ratio matching as a fallback
//! - **Answer spans**: Locate answer offsets with numeric boundary safety
//! - **Dataset assembly**: Synthesize extra answerable examples, derive unanswerable examples from
//!   relevance-model output, deduplicate and split into train/validation sets
//! - **Legacy curation**: Produce `(context, label)` pairs for a binary relevance classifier
//!
//! # Getting Started
//!
//! ```no_run
//! use presteps::{configuration::CurationConfig, dataset::curate, prelude::*};
//!
//! fn main() -> Result<(), PrestepsError> {
//!   let config = CurationConfig::new(
//!     "data/annotations",
//!     "data/extracted",
//!     "data/kpi_mapping.csv",
//!   )
//!   .with_relevance_file("data/relevance.xlsx")
//!   .with_val_ratio(0.2);
//!
//!   let (train, val) = curate(&config)?;
//!   println!("{} training and {} validation examples", train.len(), val.len());
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`normalize`]: Storage and matching text normalization profiles
//! - [`annotation`]: Annotation aggregation, cleaning and caching
//! - [`kpi`]: KPI identifiers and the KPI mapping table
//! - [`document`]: Extracted documents and their loading
//! - [`matcher`]: Answer-span location and closest-paragraph matching
//! - [`similarity`]: Fuzzy string similarity
//! - [`dataset`]: Answerable/unanswerable example builders and the dataset assembler
//! - [`legacy`]: The single-file binary relevance curator
//! - [`extract`]: The PDF extraction collaborator
//! - [`table`]: Spreadsheet and CSV input/output
//! - [`configuration`]: Settings for curation, legacy curation and extraction
//! - [`prelude`]: Common traits and types for ergonomic imports

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::{BTreeMap, BTreeSet, HashMap, HashSet},
  fmt::Display,
  path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod annotation;
pub mod configuration;
pub mod dataset;
pub mod document;
pub mod error;
pub mod extract;
pub mod kpi;
pub mod legacy;
pub mod matcher;
pub mod normalize;
pub mod similarity;
pub mod table;

use crate::{error::*, kpi::KpiId, table::Table};

/// Common traits and types for ergonomic imports.
///
/// # Usage
///
/// ```no_run
/// use presteps::prelude::*;
///
/// fn example() -> Result<(), PrestepsError> {
///   let documents = DocumentSet::load_dir("data/extracted")?;
///   println!("{} documents loaded", documents.len());
///   Ok(())
/// }
/// ```
pub mod prelude {
  pub use crate::{
    annotation::Annotation, dataset::Example, document::DocumentSet, error::PrestepsError,
    extract::Extractor, kpi::KpiMapping,
  };
}
