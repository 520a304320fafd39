//! Question-answering examples and the dataset assembler.
//!
//! The curated dataset mixes two kinds of [`Example`]:
//!
//! - Answerable examples ([`create_answerable`]) pair a question with a paragraph that contains
//!   its answer and record where the answer starts.
//! - Unanswerable examples ([`create_unanswerable`]) pair a question with a paragraph that a
//!   relevance model judged relevant but that holds no known answer. Their `answer` is empty and
//!   `answer_start` has no offsets.
//!
//! [`curate`] ties the stages together and [`split`] divides the result into train and
//! validation sets.

use super::*;

pub mod answerable;
pub mod assemble;
pub mod unanswerable;

pub use self::{
  answerable::{create_answerable, find_extra_answerable, AnswerableOutcome},
  assemble::{curate, run_kpi_curation, split},
  unanswerable::{create_unanswerable, load_relevance_judgments, RelevanceJudgment},
};

/// Columns of a persisted split, in order.
pub const EXAMPLE_COLUMNS: [&str; 5] =
  ["source_file", "paragraph", "question", "answer", "answer_start"];

/// One question-answering training example.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Example {
  /// PDF file name the paragraph was taken from.
  pub source_file:  String,
  /// Context paragraph.
  pub paragraph:    String,
  /// KPI question.
  pub question:     String,
  /// Answer text, empty for unanswerable examples.
  pub answer:       String,
  /// Character offsets of `answer` in `paragraph`, empty for unanswerable examples.
  pub answer_start: Vec<usize>,
}

impl Example {
  /// Creates an unanswerable example.
  pub fn unanswerable(
    source_file: impl Into<String>,
    paragraph: impl Into<String>,
    question: impl Into<String>,
  ) -> Self {
    Self {
      source_file:  source_file.into(),
      paragraph:    paragraph.into(),
      question:     question.into(),
      answer:       String::new(),
      answer_start: Vec::new(),
    }
  }

  /// Whether the example carries an answer span.
  pub fn is_answerable(&self) -> bool { !self.answer_start.is_empty() }

  /// Cells in [`EXAMPLE_COLUMNS`] order.
  fn to_row(&self) -> Vec<String> {
    vec![
      self.source_file.clone(),
      self.paragraph.clone(),
      self.question.clone(),
      self.answer.clone(),
      format_offsets(&self.answer_start),
    ]
  }

  /// Parses a row of a persisted split.
  fn from_record(record: &table::Record<'_>) -> Result<Self> {
    Ok(Self {
      source_file:  record.get("source_file").to_string(),
      paragraph:    record.get_raw("paragraph").to_string(),
      question:     record.get("question").to_string(),
      answer:       record.get_raw("answer").to_string(),
      answer_start: parse_offsets(record.get("answer_start"))?,
    })
  }
}

/// Drops every example whose (answer, paragraph, question) triple was already seen, keeping the
/// first occurrence and the original order.
pub fn dedupe(examples: Vec<Example>) -> Vec<Example> {
  let before = examples.len();
  let mut seen = HashSet::new();
  let kept: Vec<Example> = examples
    .into_iter()
    .filter(|example| {
      seen.insert((example.answer.clone(), example.paragraph.clone(), example.question.clone()))
    })
    .collect();
  if kept.len() < before {
    debug!("Dropped {} duplicate examples", before - kept.len());
  }
  kept
}

/// Writes examples to an `.xlsx` or delimited file, `answer_start` rendered as `[a, b]`.
pub fn write_examples(path: impl AsRef<Path>, examples: &[Example]) -> Result<()> {
  let path = path.as_ref();
  let mut table = Table::new(EXAMPLE_COLUMNS);
  for example in examples {
    table.push_row(example.to_row());
  }
  table.write(path)?;
  info!("Wrote {} examples to {path:?}", examples.len());
  Ok(())
}

/// Reads examples written by [`write_examples`].
pub fn read_examples(path: impl AsRef<Path>) -> Result<Vec<Example>> {
  let path = path.as_ref();
  let table = Table::read(path)?;
  table.require_columns(&path.display().to_string(), &EXAMPLE_COLUMNS)?;
  table.records().map(|record| Example::from_record(&record)).collect()
}

/// Renders offsets as `[a, b]`.
fn format_offsets(offsets: &[usize]) -> String {
  let inner: Vec<String> = offsets.iter().map(usize::to_string).collect();
  format!("[{}]", inner.join(", "))
}

/// Parses offsets rendered by [`format_offsets`].
fn parse_offsets(value: &str) -> Result<Vec<usize>> {
  let unparseable =
    || PrestepsError::UnparseableField { field: "answer_start", value: value.to_string() };
  let inner = value
    .trim()
    .strip_prefix('[')
    .and_then(|rest| rest.strip_suffix(']'))
    .ok_or_else(unparseable)?;
  inner
    .split(',')
    .map(str::trim)
    .filter(|item| !item.is_empty())
    .map(|item| item.parse().map_err(|_| unparseable()))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn example(answer: &str, paragraph: &str, question: &str) -> Example {
    Example {
      source_file:  "a.pdf".into(),
      paragraph:    paragraph.into(),
      question:     question.into(),
      answer:       answer.into(),
      answer_start: if answer.is_empty() { vec![] } else { vec![1] },
    }
  }

  #[traced_test]
  #[test]
  fn test_dedupe_keeps_first_occurrence() {
    let mut second = example("5%", "p", "q");
    second.source_file = "b.pdf".into();
    let examples = vec![
      example("5%", "p", "q"),
      example("", "p", "q"),
      second,
      example("5%", "p", "other question"),
    ];

    let kept = dedupe(examples);
    assert_eq!(kept.len(), 3);
    assert_eq!(kept[0].source_file, "a.pdf");
    assert_eq!(kept[1].answer, "");
    assert_eq!(kept[2].question, "other question");
    assert!(logs_contain("Dropped 1 duplicate examples"));
  }

  #[test]
  fn test_offsets_format() {
    assert_eq!(format_offsets(&[3, 17]), "[3, 17]");
    assert_eq!(format_offsets(&[]), "[]");
    assert_eq!(parse_offsets(" [3, 17] ").unwrap(), vec![3, 17]);
    assert!(parse_offsets("[]").unwrap().is_empty());
    assert!(matches!(parse_offsets("3"), Err(PrestepsError::UnparseableField { .. })));
  }

  #[traced_test]
  #[test]
  fn test_write_examples_to_csv() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("train.csv");
    let examples =
      vec![example("5%", "up 5%, from 2015", "q"), Example::unanswerable("b.pdf", "Outlook", "q")];
    write_examples(&path, &examples).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("source_file,paragraph,question,answer,answer_start"));
    assert!(content.contains("q,5%,[1]"));
    assert_eq!(read_examples(&path).unwrap(), examples);
  }

  #[test]
  fn test_shifted_examples_read_back_unchanged() {
    let dir = tempdir().unwrap();
    let shifted = Example {
      source_file:  "a.pdf".into(),
      paragraph:    " 5% growth in 2016.".into(),
      question:     "What was the growth?".into(),
      answer:       "5%".into(),
      answer_start: vec![1],
    };

    for name in ["train.csv", "train.xlsx"] {
      let path = dir.path().join(name);
      write_examples(&path, std::slice::from_ref(&shifted)).unwrap();
      let read = read_examples(&path).unwrap();
      assert_eq!(read, vec![shifted.clone()]);
      assert_eq!(&read[0].paragraph[1..3], read[0].answer);
    }
  }
}
