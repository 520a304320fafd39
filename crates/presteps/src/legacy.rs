//! The single-file binary relevance curator.
//!
//! For one extracted document and one annotation workbook, [`Curator`] produces
//! `(context, label)` pairs for a binary text-relevance classifier: label `1` for paragraphs that
//! contain an annotated snippet on the annotated page and label `0` for paragraphs sampled at
//! random from the same document.
//!
//! Rows that cannot be matched yield a single empty context rather than an error, so every
//! annotation row is accounted for in the output.
//!
//! # Examples
//!
//! ```no_run
//! use presteps::{configuration::LegacySettings, legacy::Curator};
//!
//! # fn main() -> presteps::error::Result<()> {
//! let settings = LegacySettings { create_neg_samples: true, ..LegacySettings::default() };
//! let mut curator = Curator::new(
//!   "annotations.xlsx",
//!   "extracted/report_output.json",
//!   "kpi_mapping.csv",
//!   settings,
//! )?;
//! let examples = curator.create_curator_df()?;
//! println!("{} curated examples", examples.len());
//! # Ok(())
//! # }
//! ```

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::*;
use crate::{
  annotation::{clean::parse_source_page, ANNOTATION_SHEET},
  configuration::LegacySettings,
  document::{ExtractedDocument, OUTPUT_SUFFIX},
  kpi::{load_kpi_mapping, KpiMapping},
};

/// Columns of the curated legacy dataset, in order.
pub const LEGACY_COLUMNS: [&str; 12] = [
  "question",
  "context",
  "label",
  "answer",
  "annotation_file",
  "company",
  "year",
  "source_file",
  "source_page",
  "Index",
  "data_type",
  "kpi_id",
];

/// Output file of a single-document curation run.
pub const CURATED_FILE: &str = "Curated_dataset.csv";

lazy_static! {
  static ref LEGACY_WHITESPACE_RUN: Regex = Regex::new(r"\s{2,}").unwrap();
}

/// One row of the annotation workbook as the legacy curator reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyRow {
  /// Position of the row in the workbook.
  pub index:               usize,
  /// Reporting company.
  pub company:             String,
  /// Reporting year.
  pub year:                String,
  /// PDF file name.
  pub source_file:         String,
  /// Zero-indexed pages.
  pub source_page:         Vec<u32>,
  /// KPI identifier as written in the workbook.
  pub kpi_id:              String,
  /// Answer text.
  pub answer:              String,
  /// Where the answer was found, e.g. `TEXT`.
  pub data_type:           String,
  /// Snippet list literal, e.g. `["first", "second"]`.
  pub relevant_paragraphs: String,
}

impl LegacyRow {
  /// Reads the row at `index` of an annotation workbook.
  fn from_record(index: usize, record: &table::Record<'_>) -> Self {
    let raw_page = record.get("source_page");
    let source_page = parse_source_page(raw_page).unwrap_or_else(|e| {
      warn!("Row {index}: {e}");
      Vec::new()
    });
    Self {
      index,
      company:             record.get("company").to_string(),
      year:                record.get("year").to_string(),
      source_file:         record.get("source_file").to_string(),
      source_page,
      kpi_id:              record.get("kpi_id").to_string(),
      answer:              record.get("answer").to_string(),
      data_type:           record.get("data_type").to_string(),
      relevant_paragraphs: record.get("relevant_paragraphs").to_string(),
    }
  }
}

/// One curated `(context, label)` example with the annotation it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyExample {
  /// KPI question, empty when the KPI is not mapped.
  pub question:        String,
  /// Candidate paragraph; empty when the row produced no match.
  pub context:         String,
  /// `1` for relevant, `0` for sampled paragraphs.
  pub label:           u8,
  /// Annotated answer.
  pub answer:          String,
  /// File name of the annotation workbook.
  pub annotation_file: String,
  /// Reporting company.
  pub company:         String,
  /// Reporting year.
  pub year:            String,
  /// PDF file name.
  pub source_file:     String,
  /// Zero-indexed pages.
  pub source_page:     Vec<u32>,
  /// Row of the annotation workbook.
  pub index:           usize,
  /// Where the answer was found.
  pub data_type:       String,
  /// KPI identifier.
  pub kpi_id:          String,
}

impl LegacyExample {
  /// Cells in [`LEGACY_COLUMNS`] order; pages render as a list of strings, e.g. `["0"]`.
  fn to_row(&self) -> Vec<String> {
    let pages: Vec<String> = self.source_page.iter().map(|page| format!("\"{page}\"")).collect();
    vec![
      self.question.clone(),
      self.context.clone(),
      self.label.to_string(),
      self.answer.clone(),
      self.annotation_file.clone(),
      self.company.clone(),
      self.year.clone(),
      self.source_file.clone(),
      format!("[{}]", pages.join(", ")),
      self.index.to_string(),
      self.data_type.clone(),
      self.kpi_id.clone(),
    ]
  }
}

/// Writes curated legacy examples to an `.xlsx` or delimited file.
pub fn write_legacy_examples(path: impl AsRef<Path>, examples: &[LegacyExample]) -> Result<()> {
  let mut table = Table::new(LEGACY_COLUMNS);
  for example in examples {
    table.push_row(example.to_row());
  }
  table.write(path)
}

/// Curates one extracted document against one annotation workbook.
#[derive(Debug)]
pub struct Curator {
  /// Annotation workbook.
  annotation_file: PathBuf,
  /// File name of the extraction JSON with the output suffix removed, e.g. `report.json`.
  json_file_name:  String,
  /// The extracted document.
  document:        ExtractedDocument,
  /// KPI questions.
  mapping:         KpiMapping,
  /// Sampling settings.
  settings:        LegacySettings,
  /// Source of negative samples.
  rng:             StdRng,
}

impl Curator {
  /// Loads the extracted document and the KPI mapping.
  pub fn new(
    annotation_file: impl AsRef<Path>,
    extract_json: impl AsRef<Path>,
    kpi_mapping_path: impl AsRef<Path>,
    settings: LegacySettings,
  ) -> Result<Self> {
    let extract_json = extract_json.as_ref();
    let json_file_name = extract_json
      .file_name()
      .map(|name| name.to_string_lossy().replace(OUTPUT_SUFFIX, ""))
      .ok_or_else(|| PrestepsError::InvalidInputPath(extract_json.to_path_buf()))?;
    let rng = match settings.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    Ok(Self {
      annotation_file: annotation_file.as_ref().to_path_buf(),
      json_file_name,
      document: ExtractedDocument::load(extract_json)?,
      mapping: load_kpi_mapping(kpi_mapping_path)?,
      settings,
      rng,
    })
  }

  /// Cleans a snippet the way annotation workbooks need it.
  ///
  /// Curly quotes become straight quotes, newlines and tabs become spaces, other characters
  /// outside printable ASCII are dropped and whitespace runs collapse to one space. Only then
  /// are the `BOE` unit marker and backslashes removed. The result is not trimmed.
  ///
  /// ```
  /// use presteps::legacy::Curator;
  ///
  /// assert_eq!(Curator::clean_text("“Scope 1”\tBOE emissions"), r#""Scope 1"  emissions"#);
  /// assert_eq!(Curator::clean_text(" a\n\n b "), " a b ");
  /// ```
  pub fn clean_text(text: &str) -> String {
    let printable: String = text
      .chars()
      .filter_map(|c| match c {
        '“' | '”' => Some('"'),
        '\n' | '\t' => Some(' '),
        '\r' | ' '..='~' => Some(c),
        _ => None,
      })
      .collect();
    LEGACY_WHITESPACE_RUN.replace_all(&printable, " ").replace("BOE", "").replace('\\', "")
  }

  /// Whether `row` belongs to the loaded document and is a text annotation.
  fn is_own_text_row(&self, row: &LegacyRow) -> bool {
    let json_stem = self.json_file_name.replace(".json", "");
    let pdf_stem = row.source_file.replace(".pdf", "");
    json_stem == pdf_stem && row.data_type == "TEXT"
  }

  /// Relevant contexts for `row`.
  ///
  /// The snippet list is cleaned and parsed as a list literal; any other literal counts as a
  /// single snippet. On the first annotated page, paragraphs containing any snippet are returned,
  /// or the snippets themselves when none does. A single empty context is returned when the
  /// snippets cannot be parsed or are empty, the row belongs to another document or is not a
  /// text annotation, or the page was not extracted.
  pub fn create_pos_examples(&self, row: &LegacyRow) -> Vec<String> {
    let cleaned = Self::clean_text(&row.relevant_paragraphs);
    let sentences = match parse_literal(&cleaned) {
      Some(Literal::List(items)) => items,
      Some(Literal::Scalar) => vec![cleaned.clone()],
      None => {
        trace!("Row {}: relevant paragraphs are not a literal: {cleaned}", row.index);
        return vec![String::new()];
      },
    };
    if sentences.is_empty() || !self.is_own_text_row(row) {
      return vec![String::new()];
    }

    let Some(page) = row.source_page.first() else {
      return vec![String::new()];
    };
    let Some(paragraphs) = self.document.pages.get(page) else {
      return vec![String::new()];
    };
    let matching: Vec<String> = paragraphs
      .iter()
      .filter(|paragraph| sentences.iter().any(|sentence| paragraph.contains(sentence.as_str())))
      .cloned()
      .collect();
    if matching.is_empty() {
      sentences
    } else {
      matching
    }
  }

  /// Randomly sampled contexts for `row`.
  ///
  /// Draws `neg_pos_ratio` paragraphs with replacement from every paragraph of the document but
  /// the first. A single empty context is returned when the document is empty, the row belongs
  /// to another document or is not a text annotation.
  pub fn create_neg_examples(&mut self, row: &LegacyRow) -> Vec<String> {
    if self.document.is_empty() || !self.is_own_text_row(row) {
      return vec![String::new()];
    }
    let pool: Vec<&str> = self.document.paragraphs().skip(1).map(|(_, text)| text).collect();
    if pool.is_empty() {
      return vec![String::new()];
    }
    (0..self.settings.neg_pos_ratio)
      .filter_map(|_| pool.choose(&mut self.rng).map(|text| text.to_string()))
      .collect()
  }

  /// Curates every row of the annotation workbook.
  ///
  /// Each row contributes its positive contexts with label `1` and, when negative sampling is
  /// enabled, its negative contexts with label `0`. Questions come from the KPI mapping. An
  /// empty document yields no examples.
  pub fn create_curator_df(&mut self) -> Result<Vec<LegacyExample>> {
    if self.document.is_empty() {
      debug!("{} has no extracted text, nothing to curate", self.json_file_name);
      return Ok(Vec::new());
    }

    let table = Table::read_sheet(&self.annotation_file, Some(ANNOTATION_SHEET))?;
    let annotation_file = self
      .annotation_file
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();
    let rows: Vec<LegacyRow> = table
      .records()
      .enumerate()
      .map(|(idx, record)| LegacyRow::from_record(idx, &record))
      .collect();

    let mut examples = Vec::new();
    for row in &rows {
      let question = row
        .kpi_id
        .parse::<KpiId>()
        .ok()
        .and_then(|kpi_id| self.mapping.template(&kpi_id).map(str::to_string))
        .unwrap_or_default();

      let mut contexts: Vec<(String, u8)> =
        self.create_pos_examples(row).into_iter().map(|context| (context, 1)).collect();
      if self.settings.create_neg_samples {
        contexts.extend(self.create_neg_examples(row).into_iter().map(|context| (context, 0)));
      }

      examples.extend(contexts.into_iter().map(|(context, label)| LegacyExample {
        question: question.clone(),
        context,
        label,
        answer: row.answer.clone(),
        annotation_file: annotation_file.clone(),
        company: row.company.clone(),
        year: row.year.clone(),
        source_file: row.source_file.clone(),
        source_page: row.source_page.clone(),
        index: row.index,
        data_type: row.data_type.clone(),
        kpi_id: row.kpi_id.clone(),
      }));
    }
    info!("Curated {} examples from {}", examples.len(), self.json_file_name);
    Ok(examples)
  }
}

/// Curates an extraction JSON file, or every file of a folder, against one annotation workbook.
///
/// A single file is written to [`CURATED_FILE`] in `output_folder`. A folder is written to
/// `Curated_dataset_<ddmmYYYY_HHMM>.csv`, with files that fail logged and skipped. Any other
/// path fails with [`PrestepsError::InvalidInputPath`]. Returns the written file.
pub fn run_local_curation(
  path: impl AsRef<Path>,
  annotation_file: impl AsRef<Path>,
  kpi_mapping: impl AsRef<Path>,
  settings: &LegacySettings,
  output_folder: impl AsRef<Path>,
) -> Result<PathBuf> {
  let path = path.as_ref();
  let annotation_file = annotation_file.as_ref();
  let kpi_mapping = kpi_mapping.as_ref();
  let output_folder = output_folder.as_ref();
  info!("Curation started");

  let curate_one = |file: &Path| -> Result<Vec<LegacyExample>> {
    info!("Processing file {file:?}");
    Curator::new(annotation_file, file, kpi_mapping, settings.clone())?.create_curator_df()
  };

  let (examples, output) = if path.is_file() {
    (curate_one(path)?, output_folder.join(CURATED_FILE))
  } else if path.is_dir() {
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
      .filter_map(|entry| entry.ok().map(|entry| entry.path()))
      .filter(|file| file.is_file())
      .collect();
    files.sort();

    let mut examples = Vec::new();
    for file in &files {
      match curate_one(file) {
        Ok(curated) => examples.extend(curated),
        Err(e) => error!("Could not curate {file:?}: {e}"),
      }
    }
    let timestamp = chrono::Local::now().format("%d%m%Y_%H%M");
    (examples, output_folder.join(format!("Curated_dataset_{timestamp}.csv")))
  } else {
    return Err(PrestepsError::InvalidInputPath(path.to_path_buf()));
  };

  write_legacy_examples(&output, &examples)?;
  info!("Curation ended, wrote {} examples to {output:?}", examples.len());
  Ok(output)
}

/// Shape of a parsed literal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Literal {
  /// A list of string literals.
  List(Vec<String>),
  /// A single string, number or constant.
  Scalar,
}

/// Parses a list of quoted strings, or a single quoted string, number or constant.
fn parse_literal(text: &str) -> Option<Literal> {
  let text = text.trim();
  if let Some(inner) = text.strip_prefix('[') {
    let mut rest = inner.trim_start();
    let mut items = Vec::new();
    loop {
      if let Some(after) = rest.strip_prefix(']') {
        return after.trim().is_empty().then_some(Literal::List(items));
      }
      let (item, after) = quoted(rest)?;
      items.push(item.to_string());
      rest = after.trim_start();
      if let Some(after) = rest.strip_prefix(',') {
        rest = after.trim_start();
      } else if !rest.starts_with(']') {
        return None;
      }
    }
  }

  match quoted(text) {
    Some((_, rest)) => rest.trim().is_empty().then_some(Literal::Scalar),
    None => (text.parse::<f64>().is_ok() || matches!(text, "True" | "False" | "None"))
      .then_some(Literal::Scalar),
  }
}

/// Splits a leading `'...'` or `"..."` string off `text`.
fn quoted(text: &str) -> Option<(&str, &str)> {
  let quote = text.chars().next().filter(|c| matches!(c, '"' | '\''))?;
  let body = &text[1..];
  let end = body.find(quote)?;
  Some((&body[..end], &body[end + 1..]))
}

#[cfg(test)]
mod tests {
  use super::*;

  const EXTRACTED: &str = r#"{
    "0": {"0": {"paragraph": "Annual Report 2016"}},
    "1": {"0": {"paragraph": "In 2016, revenue grew by 5%."}, "1": {"paragraph": "Outlook"}}
  }"#;

  const ANNOTATIONS: &str = "company,source_file,source_page,kpi_id,year,answer,data_type,\
                             relevant_paragraphs\nAcme,report.pdf,[2],3,2016,5%,TEXT,\"[\"\"grew \
                             by 5%\"\"]\"\nAcme,report.pdf,[2],3,2016,5%,TABLE,\"[\"\"x\"\"]\"\n";

  fn curator(dir: &Path, settings: LegacySettings) -> Curator {
    let json = dir.join("report_output.json");
    let annotations = dir.join("annotations.csv");
    let mapping = dir.join("kpi_mapping.csv");
    std::fs::write(&json, EXTRACTED).unwrap();
    std::fs::write(&annotations, ANNOTATIONS).unwrap();
    std::fs::write(
      &mapping,
      "kpi_id,question,add_year,kpi_category\n3,What was the growth?,false,TEXT\n",
    )
    .unwrap();
    Curator::new(annotations, json, mapping, settings).unwrap()
  }

  fn row(relevant_paragraphs: &str) -> LegacyRow {
    LegacyRow {
      index:               0,
      company:             "Acme".into(),
      year:                "2016".into(),
      source_file:         "report.pdf".into(),
      source_page:         vec![1],
      kpi_id:              "3".into(),
      answer:              "5%".into(),
      data_type:           "TEXT".into(),
      relevant_paragraphs: relevant_paragraphs.into(),
    }
  }

  #[test]
  fn test_parse_literal() {
    assert_eq!(
      parse_literal(r#"["a", 'b c', ]"#),
      Some(Literal::List(vec!["a".into(), "b c".into()]))
    );
    assert_eq!(parse_literal("[]"), Some(Literal::List(vec![])));
    assert_eq!(parse_literal("'single'"), Some(Literal::Scalar));
    assert_eq!(parse_literal("12.5"), Some(Literal::Scalar));
    assert_eq!(parse_literal("grew by 5%"), None);
    assert_eq!(parse_literal(r#"["a" "b"]"#), None);
  }

  #[test]
  fn test_clean_text_removes_markers_after_collapsing() {
    assert_eq!(Curator::clean_text("12 BOE \t per day"), "12  per day");
    assert_eq!(Curator::clean_text("[“a\\b”]\u{9d}"), r#"["ab"]"#);
    assert_eq!(Curator::clean_text("BOBOEE"), "BOE");
  }

  #[traced_test]
  #[test]
  fn test_pos_examples() {
    let dir = tempdir().unwrap();
    let curator = curator(dir.path(), LegacySettings::default());

    assert_eq!(curator.create_pos_examples(&row(r#"["grew by 5%"]"#)), vec![
      "In 2016, revenue grew by 5%."
    ]);
    assert_eq!(curator.create_pos_examples(&row(r#"["fell by 3%"]"#)), vec!["fell by 3%"]);
    assert_eq!(curator.create_pos_examples(&row("grew by 5%")), vec![""]);
    assert_eq!(curator.create_pos_examples(&row("[]")), vec![""]);

    let mut other_document = row(r#"["grew by 5%"]"#);
    other_document.source_file = "other.pdf".into();
    assert_eq!(curator.create_pos_examples(&other_document), vec![""]);

    let mut table = row(r#"["grew by 5%"]"#);
    table.data_type = "TABLE".into();
    assert_eq!(curator.create_pos_examples(&table), vec![""]);

    let mut missing_page = row(r#"["grew by 5%"]"#);
    missing_page.source_page = vec![7];
    assert_eq!(curator.create_pos_examples(&missing_page), vec![""]);
  }

  #[traced_test]
  #[test]
  fn test_neg_examples_skip_first_paragraph() {
    let dir = tempdir().unwrap();
    let settings = LegacySettings { neg_pos_ratio: 5, create_neg_samples: true, seed: Some(3) };
    let mut curator = curator(dir.path(), settings);

    let negatives = curator.create_neg_examples(&row(r#"["grew by 5%"]"#));
    assert_eq!(negatives.len(), 5);
    assert!(negatives.iter().all(|context| context != "Annual Report 2016"));

    let mut other_document = row(r#"["grew by 5%"]"#);
    other_document.source_file = "other.pdf".into();
    assert_eq!(curator.create_neg_examples(&other_document), vec![""]);
  }

  #[traced_test]
  #[test]
  fn test_create_curator_df() {
    let dir = tempdir().unwrap();
    let mut curator = curator(dir.path(), LegacySettings::default());
    let examples = curator.create_curator_df().unwrap();

    assert_eq!(examples.len(), 2);
    assert_eq!(examples[0].context, "In 2016, revenue grew by 5%.");
    assert_eq!(examples[0].label, 1);
    assert_eq!(examples[0].question, "What was the growth?");
    assert_eq!(examples[0].annotation_file, "annotations.csv");
    assert_eq!(examples[0].source_page, vec![1]);
    assert_eq!(examples[1].context, "");
    assert_eq!(examples[1].index, 1);
  }

  #[traced_test]
  #[test]
  fn test_run_local_curation() {
    let dir = tempdir().unwrap();
    curator(dir.path(), LegacySettings::default());
    let output = dir.path().join("out");

    let written = run_local_curation(
      dir.path().join("report_output.json"),
      dir.path().join("annotations.csv"),
      dir.path().join("kpi_mapping.csv"),
      &LegacySettings::default(),
      &output,
    )
    .unwrap();
    assert_eq!(written, output.join(CURATED_FILE));
    let content = std::fs::read_to_string(written).unwrap();
    assert!(content.starts_with("question,context,label,answer,annotation_file"));
    assert!(content.contains("\"[\"\"1\"\"]\""));

    assert!(matches!(
      run_local_curation(
        dir.path().join("missing"),
        dir.path().join("annotations.csv"),
        dir.path().join("kpi_mapping.csv"),
        &LegacySettings::default(),
        &output,
      ),
      Err(PrestepsError::InvalidInputPath(_))
    ));
  }
}
