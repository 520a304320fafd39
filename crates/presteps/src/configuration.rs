//! Settings for curation, legacy curation and extraction.
//!
//! Every settings type deserializes from TOML with per-field defaults, so a configuration file
//! only needs the values it changes:
//!
//! ```toml
//! annotation_folder = "data/annotations"
//! extracted_text_json_folder = "data/extracted"
//! kpi_mapping_file = "data/kpi_mapping.csv"
//! relevance_file = "data/relevance.xlsx"
//! val_ratio = 0.2
//! shuffle_seed = 7
//! ```
//!
//! The CLI loads such a file first and applies its own flags on top.

use super::*;
use crate::annotation::{CleanOptions, DEFAULT_CACHE_FILE};

/// Seed for the train subsample of the train/validation split.
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Default share of examples held out for validation.
pub const DEFAULT_VAL_RATIO: f64 = 0.2;

/// Default minimum number of alphabetic characters in an extracted paragraph.
pub const DEFAULT_MIN_PARAGRAPH_LENGTH: usize = 20;

/// Settings of the KPI question-answering curation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
  /// Folder with the annotation spreadsheets.
  pub annotation_folder:          PathBuf,
  /// Folder with the extraction JSON files.
  pub extracted_text_json_folder: PathBuf,
  /// KPI mapping file.
  pub kpi_mapping_file:           PathBuf,
  /// Aggregate annotation cache, read when present and written otherwise.
  pub agg_annotation:             PathBuf,
  /// Relevance judgments used to derive unanswerable examples.
  pub relevance_file:             Option<PathBuf>,
  /// Share of examples held out for validation, within `[0, 1]`.
  pub val_ratio:                  f64,
  /// Whether answers are also searched on the other pages of each document.
  pub find_new_answerable:        bool,
  /// Whether unanswerable examples are derived from the relevance judgments.
  pub create_unanswerable:        bool,
  /// Seed of the shuffle before splitting; unseeded when absent.
  pub shuffle_seed:               Option<u64>,
  /// Seed of the train subsample.
  pub split_seed:                 u64,
  /// Companies whose annotations are discarded.
  pub exclude_companies:          BTreeSet<String>,
}

impl Default for CurationConfig {
  fn default() -> Self {
    Self {
      annotation_folder:          PathBuf::new(),
      extracted_text_json_folder: PathBuf::new(),
      kpi_mapping_file:           PathBuf::new(),
      agg_annotation:             PathBuf::from(DEFAULT_CACHE_FILE),
      relevance_file:             None,
      val_ratio:                  DEFAULT_VAL_RATIO,
      find_new_answerable:        true,
      create_unanswerable:        true,
      shuffle_seed:               None,
      split_seed:                 DEFAULT_SPLIT_SEED,
      exclude_companies:          CleanOptions::default().exclude_companies,
    }
  }
}

impl CurationConfig {
  /// Creates a configuration for the three mandatory inputs, everything else at its default.
  pub fn new(
    annotation_folder: impl Into<PathBuf>,
    extracted_text_json_folder: impl Into<PathBuf>,
    kpi_mapping_file: impl Into<PathBuf>,
  ) -> Self {
    Self {
      annotation_folder: annotation_folder.into(),
      extracted_text_json_folder: extracted_text_json_folder.into(),
      kpi_mapping_file: kpi_mapping_file.into(),
      ..Self::default()
    }
  }

  /// Parses a configuration from TOML text.
  pub fn from_toml_str(toml_str: &str) -> Result<Self> { Ok(toml::from_str(toml_str)?) }

  /// Parses a configuration from a TOML file.
  pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  /// Sets the relevance judgments file.
  pub fn with_relevance_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.relevance_file = Some(path.into());
    self
  }

  /// Sets the aggregate annotation cache location.
  pub fn with_agg_annotation(mut self, path: impl Into<PathBuf>) -> Self {
    self.agg_annotation = path.into();
    self
  }

  /// Sets the validation share.
  pub fn with_val_ratio(mut self, val_ratio: f64) -> Self {
    self.val_ratio = val_ratio;
    self
  }

  /// Enables or disables the search for answers on other pages.
  pub fn with_find_new_answerable(mut self, enabled: bool) -> Self {
    self.find_new_answerable = enabled;
    self
  }

  /// Enables or disables unanswerable examples.
  pub fn with_create_unanswerable(mut self, enabled: bool) -> Self {
    self.create_unanswerable = enabled;
    self
  }

  /// Seeds the shuffle before the split.
  pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
    self.shuffle_seed = seed;
    self
  }

  /// Seeds the train subsample.
  pub fn with_split_seed(mut self, seed: u64) -> Self {
    self.split_seed = seed;
    self
  }

  /// Fails with [`PrestepsError::InvalidRatio`] unless `val_ratio` lies within `[0, 1]`.
  pub fn validate(&self) -> Result<()> {
    if (0.0..=1.0).contains(&self.val_ratio) {
      Ok(())
    } else {
      Err(PrestepsError::InvalidRatio(self.val_ratio))
    }
  }

  /// Cleaning options derived from this configuration.
  pub fn clean_options(&self) -> CleanOptions {
    CleanOptions { exclude_companies: self.exclude_companies.clone() }
  }
}

/// Settings of the legacy binary relevance curation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacySettings {
  /// Negative examples sampled per annotation row.
  pub neg_pos_ratio:      usize,
  /// Whether negative examples are sampled at all.
  pub create_neg_samples: bool,
  /// Seed of the negative sampling; unseeded when absent.
  pub seed:               Option<u64>,
}

impl Default for LegacySettings {
  fn default() -> Self { Self { neg_pos_ratio: 1, create_neg_samples: false, seed: None } }
}

/// Settings of the PDF extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
  /// Paragraphs with fewer alphabetic characters are discarded.
  pub min_paragraph_length: usize,
  /// Skip a PDF whose output file already exists.
  pub skip_extracted_files: bool,
  /// Write the extracted document next to the other outputs.
  pub store_to_file:        bool,
}

impl Default for ExtractionSettings {
  fn default() -> Self {
    Self {
      min_paragraph_length: DEFAULT_MIN_PARAGRAPH_LENGTH,
      skip_extracted_files: false,
      store_to_file:        true,
    }
  }
}
