//! Unanswerable examples from relevance-model output.
//!
//! A relevance model scores (question, paragraph) pairs of every document. The pairs it deems
//! relevant but that hold no annotated answer make good unanswerable examples: they look like
//! they should answer the question but do not.

use super::*;
use crate::{
  annotation::Annotation,
  normalize::{normalize, normalize_for_matching},
};

/// Columns a relevance judgment table must provide.
pub const RELEVANCE_COLUMNS: [&str; 8] = [
  "page",
  "pdf_name",
  "unique_paragraph_id",
  "paragraph",
  "kpi_id",
  "question",
  "paragraph_relevance_flag",
  "paragraph_relevance_score(for_label=1)",
];

/// One (question, paragraph) pair scored by the relevance model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceJudgment {
  /// Page of the paragraph.
  pub page:                String,
  /// PDF file name.
  pub pdf_name:            String,
  /// Paragraph identifier within the document.
  pub unique_paragraph_id: String,
  /// Paragraph text.
  pub paragraph:           String,
  /// KPI the question belongs to.
  pub kpi_id:              KpiId,
  /// KPI question.
  pub question:            String,
  /// Whether the model labeled the paragraph relevant.
  pub relevant:            bool,
  /// Relevance probability, when the model reported one.
  pub score:               Option<f64>,
}

impl RelevanceJudgment {
  /// Parses a row of a relevance judgment table.
  fn from_record(record: &table::Record<'_>) -> Result<Self> {
    let flag = record.get("paragraph_relevance_flag");
    Ok(Self {
      page:                record.get("page").to_string(),
      pdf_name:            record.get("pdf_name").to_string(),
      unique_paragraph_id: record.get("unique_paragraph_id").to_string(),
      paragraph:           record.get("paragraph").to_string(),
      kpi_id:              record.get("kpi_id").parse()?,
      question:            record.get("question").to_string(),
      relevant:            parse_relevance_flag(flag).ok_or_else(|| {
        PrestepsError::UnparseableField {
          field: "paragraph_relevance_flag",
          value: flag.to_string(),
        }
      })?,
      score:               record.get("paragraph_relevance_score(for_label=1)").parse().ok(),
    })
  }
}

/// Reads `1`/`0` flags, tolerating spreadsheet floats and booleans.
fn parse_relevance_flag(flag: &str) -> Option<bool> {
  match flag.trim().to_lowercase().as_str() {
    "true" => Some(true),
    "false" => Some(false),
    other => other.parse::<f64>().ok().map(|value| value == 1.0),
  }
}

/// Loads relevance judgments from an `.xlsx` or delimited file.
///
/// Fails with [`PrestepsError::MissingColumns`] when one of the [`RELEVANCE_COLUMNS`] is absent.
/// Rows whose KPI or flag cannot be parsed are logged and skipped.
pub fn load_relevance_judgments(path: impl AsRef<Path>) -> Result<Vec<RelevanceJudgment>> {
  let path = path.as_ref();
  let table = Table::read(path)?;
  table.require_columns(&path.display().to_string(), &RELEVANCE_COLUMNS)?;

  let judgments: Vec<RelevanceJudgment> = table
    .records()
    .filter_map(|record| match RelevanceJudgment::from_record(&record) {
      Ok(judgment) => Some(judgment),
      Err(e) => {
        warn!("Skipping relevance judgment row: {e}");
        None
      },
    })
    .collect();
  debug!("Loaded {} relevance judgments from {path:?}", judgments.len());
  Ok(judgments)
}

/// Builds unanswerable examples from relevance judgments.
///
/// Only judgments labeled relevant are used, and only those that pair up with an annotation of
/// the same KPI on the same paragraph (compared in the matching profile); every pairing is a
/// candidate carrying that annotation's answer. Documents with judgments but without
/// annotations are skipped. A candidate is a known positive, and therefore dropped, when an
/// annotation of its document asks the same question and the candidate's answer contains that
/// annotation's answer. Survivors get an empty answer and no offsets, their paragraph in the
/// storage profile, and are deduplicated on (answer, paragraph, question).
///
/// `annotations` should be the resolved annotations of [`AnswerableOutcome`], whose paragraphs
/// are the extracted paragraphs the relevance model also saw.
pub fn create_unanswerable(
  annotations: &[Annotation],
  judgments: &[RelevanceJudgment],
) -> Vec<Example> {
  debug!("Creating unanswerable examples from relevant and annotation data");
  let mut by_paragraph: HashMap<(&KpiId, String), Vec<&Annotation>> = HashMap::new();
  let mut by_document: HashMap<&str, Vec<&Annotation>> = HashMap::new();
  for annotation in annotations {
    by_paragraph
      .entry((&annotation.kpi_id, normalize_for_matching(&annotation.relevant_paragraph)))
      .or_default()
      .push(annotation);
    by_document.entry(annotation.source_file.as_str()).or_default().push(annotation);
  }

  let mut documents: Vec<&str> = Vec::new();
  for judgment in judgments {
    if !documents.contains(&judgment.pdf_name.as_str()) {
      documents.push(&judgment.pdf_name);
    }
  }

  let mut examples = Vec::new();
  for pdf_name in documents {
    let Some(known) = by_document.get(pdf_name) else {
      debug!("No annotations found for {pdf_name}. Skipping this PDF.");
      continue;
    };

    for judgment in judgments.iter().filter(|j| j.pdf_name == pdf_name && j.relevant) {
      let paragraph = normalize(&judgment.paragraph);
      let key = (&judgment.kpi_id, normalize_for_matching(&paragraph));
      let Some(paired) = by_paragraph.get(&key) else {
        trace!("No annotation pairs with KPI {} on this paragraph", judgment.kpi_id);
        continue;
      };

      for candidate in paired {
        let candidate_answer = normalize_for_matching(&candidate.answer);
        let is_known_positive = known.iter().any(|annotation| {
          annotation.question == judgment.question
            && candidate_answer.contains(normalize_for_matching(&annotation.answer).as_str())
        });
        if is_known_positive {
          trace!("Excluding known positive for KPI {} in {pdf_name}", judgment.kpi_id);
          continue;
        }
        examples.push(Example::unanswerable(
          pdf_name,
          paragraph.as_str(),
          judgment.question.as_str(),
        ));
      }
    }
  }

  let examples = dedupe(examples);
  info!("Created {} unanswerable examples", examples.len());
  examples
}
