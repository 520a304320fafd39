//! Answerable examples from cleaned annotations.
//!
//! Every annotation is resolved against the extracted text of its document: the annotated
//! snippet is replaced by the extracted paragraph it came from and the answer is located inside
//! that paragraph. Optionally, the same answer is then searched on every other page of the
//! document to produce additional examples.

use super::*;
use crate::{
  annotation::Annotation,
  document::DocumentSet,
  matcher::{find_answer_start, find_closest_paragraph},
  normalize::normalize,
};

/// KPIs about the company or the reporting year. Their answers appear on almost every page, so
/// they are never searched for beyond the annotated page.
pub const META_KPI_IDS: [u32; 4] = [0, 1, 9, 11];

/// An annotation whose paragraph was resolved, with the offsets of its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedAnnotation {
  /// The annotation, its `relevant_paragraph` and `answer` as found in the extracted text.
  pub annotation:   Annotation,
  /// Character offsets of the answer; empty when it could not be found.
  pub answer_start: Vec<usize>,
}

impl LocatedAnnotation {
  /// Projects onto the example columns.
  fn into_example(self) -> Example {
    Example {
      source_file:  self.annotation.source_file,
      paragraph:    self.annotation.relevant_paragraph,
      question:     self.annotation.question,
      answer:       self.annotation.answer,
      answer_start: self.answer_start,
    }
  }
}

/// Result of [`create_answerable`].
#[derive(Debug, Clone, Default)]
pub struct AnswerableOutcome {
  /// Deduplicated answerable examples.
  pub examples:    Vec<Example>,
  /// Every annotation with a non-empty answer, its paragraph resolved and its text normalized.
  pub annotations: Vec<Annotation>,
}

/// Builds answerable examples from cleaned annotations.
///
/// For each annotation the answer and snippet are normalized. When the document has extracted
/// paragraphs on the annotated page, the snippet is replaced by the closest of them. The answer
/// is then located ignoring ASCII case, and the persisted answer is the paragraph text at the
/// first offset, so `paragraph[start..start + answer.len()] == answer` holds for every example.
/// An answer at offset 0 makes the paragraph gain a leading space and every offset move by one.
///
/// Annotations with an empty answer are dropped. With `find_new_answerable` set,
/// [`find_extra_answerable`] adds examples from the other pages. The union is deduplicated on
/// (answer, paragraph, question) keeping the first occurrence, and examples without offsets are
/// dropped.
pub fn create_answerable(
  annotations: &[Annotation],
  documents: &DocumentSet,
  find_new_answerable: bool,
) -> AnswerableOutcome {
  let mut located = Vec::with_capacity(annotations.len());
  for annotation in annotations {
    let answer = normalize(&annotation.answer);
    if answer.is_empty() {
      debug!("Dropping annotation for {} without an answer", annotation.source_file);
      continue;
    }

    let snippet = normalize(&annotation.relevant_paragraph);
    let page = documents.page(&annotation.source_file, annotation.source_page);
    let paragraph = if page.is_empty() {
      trace!(
        "No extracted paragraphs for {} on page {}, keeping annotated text",
        annotation.source_file,
        annotation.source_page
      );
      snippet
    } else {
      find_closest_paragraph(page, &snippet, &answer)
    };

    // the matcher compares in the matching profile, offsets are searched in the storage one
    let (paragraph, answer, answer_start) = match locate(&answer, &paragraph) {
      Ok(span) => span,
      Err(e) => {
        debug!("{} page {}: {e}: {answer:?}", annotation.source_file, annotation.source_page);
        (paragraph, answer, Vec::new())
      },
    };
    located.push(LocatedAnnotation {
      annotation: Annotation { answer, relevant_paragraph: paragraph, ..annotation.clone() },
      answer_start,
    });
  }
  info!("Processed {} rows for answerable samples", located.len());

  let resolved: Vec<Annotation> = located.iter().map(|row| row.annotation.clone()).collect();
  if find_new_answerable {
    located.extend(find_extra_answerable(&resolved, documents));
  }

  let mut seen = HashSet::new();
  let mut examples = Vec::new();
  for row in located {
    let key = (
      row.annotation.answer.clone(),
      row.annotation.relevant_paragraph.clone(),
      row.annotation.question.clone(),
    );
    if !seen.insert(key) {
      continue;
    }
    if row.answer_start.is_empty() {
      debug!(
        "Dropping {} page {}: no answer offsets found",
        row.annotation.source_file,
        row.annotation.source_page
      );
      continue;
    }
    examples.push(row.into_example());
  }
  info!("Created {} final answerable samples", examples.len());

  AnswerableOutcome { examples, annotations: resolved }
}

/// Searches every page but the annotated one for paragraphs holding the annotated answer.
///
/// Each hit becomes a copy of the annotation that points at the new page and paragraph.
/// Annotations of [`META_KPI_IDS`] and of documents without extracted text are skipped.
/// `annotations` are expected to carry normalized answers, as produced by [`create_answerable`].
pub fn find_extra_answerable(
  annotations: &[Annotation],
  documents: &DocumentSet,
) -> Vec<LocatedAnnotation> {
  info!("Finding extra answerable samples in the dataset");
  let mut normalized: HashMap<&str, Vec<(u32, String)>> = HashMap::new();
  let mut extra = Vec::new();

  for annotation in annotations {
    if is_meta_kpi(&annotation.kpi_id) {
      continue;
    }
    let Some(document) = documents.get(&annotation.source_file) else {
      continue;
    };
    let paragraphs = normalized.entry(annotation.source_file.as_str()).or_insert_with(|| {
      document.paragraphs().map(|(page, text)| (page, normalize(text))).collect()
    });

    for (page, paragraph) in paragraphs.iter() {
      if *page == annotation.source_page {
        continue;
      }
      let Ok((paragraph, answer, answer_start)) = locate(&annotation.answer, paragraph) else {
        continue;
      };
      extra.push(LocatedAnnotation {
        annotation: Annotation {
          source_page: *page,
          answer,
          relevant_paragraph: paragraph,
          ..annotation.clone()
        },
        answer_start,
      });
    }
  }

  info!("Found {} extra answerable samples", extra.len());
  extra
}

/// Whether answers to `kpi_id` are exempt from the search on other pages.
fn is_meta_kpi(kpi_id: &KpiId) -> bool {
  META_KPI_IDS.iter().any(|id| kpi_id.as_f64() == f64::from(*id))
}

/// Locates `answer` in `paragraph` ignoring ASCII case.
///
/// Returns the paragraph, the answer as spelled at its first occurrence and every offset. An
/// occurrence at offset 0 prepends a space to the paragraph and shifts every offset by one.
/// Fails with [`PrestepsError::NoAnswerFound`] when the answer does not occur at all.
fn locate(answer: &str, paragraph: &str) -> Result<(String, String, Vec<usize>)> {
  let mut starts =
    find_answer_start(&answer.to_ascii_lowercase(), &paragraph.to_ascii_lowercase());
  let Some(&first) = starts.first() else {
    return Err(PrestepsError::NoAnswerFound);
  };
  let mut paragraph = paragraph.to_string();
  let answer = paragraph.chars().skip(first).take(answer.chars().count()).collect();
  if starts.contains(&0) {
    paragraph.insert(0, ' ');
    starts.iter_mut().for_each(|start| *start += 1);
    trace!("Shifted answer offsets past a leading space");
  }
  Ok((paragraph, answer, starts))
}
