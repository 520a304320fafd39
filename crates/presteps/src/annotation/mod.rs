//! Annotation aggregation, cleaning and caching.
//!
//! Annotators record their judgments in spreadsheets, one row per (document, KPI, year) with the
//! answer and the paragraph(s) it was read from. This module turns a folder of such spreadsheets
//! into validated [`Annotation`] records:
//!
//! 1. [`aggregate`] collects the rows of every annotation spreadsheet in a folder
//! 2. [`clean`] validates, normalizes and splits them into one record per paragraph
//! 3. [`write_cache`] / [`read_cache`] persist the cleaned records so later runs can skip
//!    the first two steps, and [`read_or_build`] ties everything together
//!
//! # Examples
//!
//! ```no_run
//! use presteps::{
//!   annotation::{read_or_build, CleanOptions},
//!   kpi::load_kpi_mapping,
//! };
//!
//! # fn main() -> presteps::error::Result<()> {
//! let mapping = load_kpi_mapping("kpi_mapping.csv")?;
//! let annotations = read_or_build(
//!   "aggregated_annotation.xlsx",
//!   "annotations/",
//!   &mapping,
//!   &CleanOptions::default(),
//! )?;
//! println!("{} cleaned annotations", annotations.len());
//! # Ok(())
//! # }
//! ```

use super::*;
use crate::kpi::KpiMapping;

pub mod clean;

pub use self::clean::{clean, CleanOptions};

/// Columns every annotation spreadsheet must provide.
pub const REQUIRED_COLUMNS: [&str; 8] = [
  "company",
  "source_file",
  "source_page",
  "kpi_id",
  "year",
  "answer",
  "data_type",
  "relevant_paragraphs",
];

/// Columns of the aggregate cache, in order.
pub const CACHE_COLUMNS: [&str; 11] = [
  "company",
  "source_file",
  "source_page",
  "kpi_id",
  "year",
  "answer",
  "data_type",
  "relevant_paragraphs",
  "annotator",
  "sector",
  "question",
];

/// Worksheet that holds the annotations in an annotation workbook.
pub const ANNOTATION_SHEET: &str = "data_ex_in_xls";

/// Default location of the aggregate cache.
pub const DEFAULT_CACHE_FILE: &str = "aggregated_annotation.xlsx";

/// Extensions of files considered by [`aggregate`].
const ANNOTATION_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

/// One row of an annotation spreadsheet, every cell as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnnotation {
  /// Reporting company.
  pub company:             String,
  /// PDF file name as typed by the annotator.
  pub source_file:         String,
  /// One-indexed page list, e.g. `[12, 13]`.
  pub source_page:         String,
  /// KPI identifier.
  pub kpi_id:              String,
  /// Reporting year.
  pub year:                String,
  /// Answer text.
  pub answer:              String,
  /// Where the answer was found, e.g. `TEXT` or `TABLE`.
  pub data_type:           String,
  /// Bracketed, quoted list of snippets, e.g. `["first", "second"]`.
  pub relevant_paragraphs: String,
  /// Who annotated the row; defaults to the spreadsheet file name.
  pub annotator:           String,
  /// Industry sector, if annotated.
  pub sector:              String,
}

impl RawAnnotation {
  /// Reads a row of an annotation table, falling back to `default_annotator` when the table has
  /// no `annotator` column.
  fn from_record(record: &table::Record<'_>, default_annotator: &str) -> Self {
    Self {
      company:             record.get("company").to_string(),
      source_file:         record.get("source_file").to_string(),
      source_page:         record.get("source_page").to_string(),
      kpi_id:              record.get("kpi_id").to_string(),
      year:                record.get("year").to_string(),
      answer:              record.get("answer").to_string(),
      data_type:           record.get("data_type").to_string(),
      relevant_paragraphs: record.get("relevant_paragraphs").to_string(),
      annotator:           record.try_get("annotator").unwrap_or(default_annotator).to_string(),
      sector:              record.get("sector").to_string(),
    }
  }

  /// Whether every annotated field is empty.
  pub fn is_blank(&self) -> bool {
    [
      &self.company,
      &self.source_file,
      &self.source_page,
      &self.kpi_id,
      &self.year,
      &self.answer,
      &self.data_type,
      &self.relevant_paragraphs,
    ]
    .iter()
    .all(|field| field.trim().is_empty())
  }
}

/// A cleaned annotation: one relevant paragraph on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
  /// Reporting company.
  pub company:            String,
  /// PDF file name, always ending in a single `.pdf`.
  pub source_file:        String,
  /// Zero-indexed page of `relevant_paragraph`.
  pub source_page:        u32,
  /// KPI identifier.
  pub kpi_id:             KpiId,
  /// Reporting year as annotated.
  pub year:               String,
  /// Answer text with line breaks folded into spaces.
  pub answer:             String,
  /// Where the answer was found, e.g. `TEXT`.
  pub data_type:          String,
  /// The snippet (or, after matching, the paragraph) that contains the answer.
  pub relevant_paragraph: String,
  /// Who annotated the row.
  pub annotator:          String,
  /// Industry sector, possibly empty.
  pub sector:             String,
  /// Question derived from `kpi_id` and `year`.
  pub question:           String,
}

impl Annotation {
  /// Cells in [`CACHE_COLUMNS`] order.
  fn to_row(&self) -> Vec<String> {
    vec![
      self.company.clone(),
      self.source_file.clone(),
      self.source_page.to_string(),
      self.kpi_id.to_string(),
      self.year.clone(),
      self.answer.clone(),
      self.data_type.clone(),
      self.relevant_paragraph.clone(),
      self.annotator.clone(),
      self.sector.clone(),
      self.question.clone(),
    ]
  }

  /// Parses a row of the aggregate cache.
  fn from_record(record: &table::Record<'_>) -> Result<Self> {
    let page = record.get("source_page");
    Ok(Self {
      company:            record.get("company").to_string(),
      source_file:        record.get("source_file").to_string(),
      source_page:        page.parse().map_err(|_| PrestepsError::UnparseableField {
        field: "source_page",
        value: page.to_string(),
      })?,
      kpi_id:             record.get("kpi_id").parse()?,
      year:               record.get("year").to_string(),
      answer:             record.get("answer").to_string(),
      data_type:          record.get("data_type").to_string(),
      relevant_paragraph: record.get("relevant_paragraphs").to_string(),
      annotator:          record.get("annotator").to_string(),
      sector:             record.get("sector").to_string(),
      question:           record.get("question").to_string(),
    })
  }
}

/// Collects the rows of every annotation spreadsheet in `folder`.
///
/// A file qualifies when its name contains `annotation` and it is an `.xlsx`, `.xls` or `.csv`
/// file. Workbooks are read from the [`ANNOTATION_SHEET`] worksheet when they have one. A file
/// that cannot be read or lacks one of the [`REQUIRED_COLUMNS`] is logged and skipped. A folder
/// without qualifying files yields no rows.
pub fn aggregate(folder: impl AsRef<Path>) -> Result<Vec<RawAnnotation>> {
  let folder = folder.as_ref();
  if !folder.is_dir() {
    return Err(PrestepsError::InvalidInputPath(folder.to_path_buf()));
  }

  let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
    .filter_map(|entry| entry.ok().map(|entry| entry.path()))
    .filter(|path| is_annotation_file(path))
    .collect();
  files.sort();

  let mut rows = Vec::new();
  let mut aggregated = 0;
  for path in &files {
    match read_annotation_file(path) {
      Ok(file_rows) => {
        debug!("Read {} annotation rows from {path:?}", file_rows.len());
        rows.extend(file_rows);
        aggregated += 1;
      },
      Err(e) => error!("Error processing file {path:?}: {e}"),
    }
  }

  if aggregated == 0 {
    warn!(
      "No valid annotation files found in {folder:?}. Make sure the names have 'annotation' in \
       the file names."
    );
  } else {
    info!("Aggregated {} rows from {aggregated} files", rows.len());
  }
  Ok(rows)
}

/// Whether `path` names an annotation spreadsheet.
fn is_annotation_file(path: &Path) -> bool {
  let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
    return false;
  };
  let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
  path.is_file()
    && name.contains("annotation")
    && !name.starts_with("~$")
    && ANNOTATION_EXTENSIONS.contains(&extension.to_lowercase().as_str())
}

/// Reads and validates one annotation spreadsheet.
fn read_annotation_file(path: &Path) -> Result<Vec<RawAnnotation>> {
  let file_name =
    path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
  let mut table = Table::read_sheet(path, Some(ANNOTATION_SHEET))?;
  table.require_columns(&file_name, &REQUIRED_COLUMNS)?;
  if table.column("sector").is_none() {
    if let Some(idx) = table.column("Sector") {
      table.headers[idx] = "sector".to_string();
    }
  }
  Ok(table.records().map(|record| RawAnnotation::from_record(&record, &file_name)).collect())
}

/// Writes cleaned annotations to the aggregate cache.
pub fn write_cache(path: impl AsRef<Path>, annotations: &[Annotation]) -> Result<()> {
  let path = path.as_ref();
  let mut table = Table::new(CACHE_COLUMNS);
  for annotation in annotations {
    table.push_row(annotation.to_row());
  }
  table.write(path)?;
  info!("Aggregated annotation file is created and saved at location {path:?}");
  Ok(())
}

/// Reads cleaned annotations back from the aggregate cache.
///
/// Rows whose page or KPI cannot be parsed are logged and skipped.
pub fn read_cache(path: impl AsRef<Path>) -> Result<Vec<Annotation>> {
  let path = path.as_ref();
  let table = Table::read(path)?;
  table.require_columns(&path.display().to_string(), &CACHE_COLUMNS)?;
  let annotations: Vec<Annotation> = table
    .records()
    .filter_map(|record| match Annotation::from_record(&record) {
      Ok(annotation) => Some(annotation),
      Err(e) => {
        warn!("Skipping cached annotation row: {e}");
        None
      },
    })
    .collect();
  debug!("Loaded {} annotations from {path:?}", annotations.len());
  Ok(annotations)
}

/// Returns the cleaned annotations, building and caching them when no cache exists.
///
/// An existing cache file is trusted as-is; only its existence is checked. When nothing could be
/// aggregated no cache is written, so a later run with annotations in place is not shadowed by an
/// empty cache.
pub fn read_or_build(
  cache: impl AsRef<Path>,
  annotation_folder: impl AsRef<Path>,
  mapping: &KpiMapping,
  options: &CleanOptions,
) -> Result<Vec<Annotation>> {
  let cache = cache.as_ref();
  if cache.exists() {
    info!("{cache:?} found, loading the data");
    return read_cache(cache);
  }

  info!("{cache:?} not available, will create it from the annotation folder");
  let raw = aggregate(annotation_folder)?;
  let annotations = clean(&raw, mapping, options);
  if annotations.is_empty() {
    warn!("No annotations survived cleaning, not writing {cache:?}");
  } else {
    write_cache(cache, &annotations)?;
  }
  Ok(annotations)
}
