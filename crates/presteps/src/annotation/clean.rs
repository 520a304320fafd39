//! Validation and normalization of aggregated annotation rows.
//!
//! Rows are checked in a fixed order and every rejection is counted and logged:
//!
//! 1. incomplete rows and excluded companies are dropped
//! 2. `source_file`, `data_type` and `source_page` are normalized
//! 3. the (`kpi_id`, `data_type`) pair must be permitted by the KPI mapping
//! 4. the question is derived from the KPI mapping
//! 5. `answer` and `relevant_paragraphs` are cleaned and parsed
//! 6. rows with several relevant paragraphs are split into one row per paragraph

use super::*;

lazy_static! {
  /// Separator between double-quoted snippets of a `relevant_paragraphs` list.
  static ref PARAGRAPH_SEPARATOR: Regex = Regex::new(r#"["“”],\s?["“”]"#).unwrap();
}

/// Quote characters that may open or close a snippet.
const QUOTES: [char; 4] = ['"', '\'', '“', '”'];

/// Options for [`clean`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOptions {
  /// Companies whose annotations are discarded.
  pub exclude_companies: BTreeSet<String>,
}

impl Default for CleanOptions {
  fn default() -> Self { Self { exclude_companies: BTreeSet::from(["CEZ".to_string()]) } }
}

/// Counts of rows dropped per cleaning step.
#[derive(Debug, Default)]
struct Drops {
  /// Rows missing one of the identifying fields.
  incomplete:         usize,
  /// Rows of excluded companies.
  excluded:           usize,
  /// Distinct `source_page` values that could not be parsed.
  invalid_pages:      BTreeSet<String>,
  /// Rows with an unparseable `source_page`.
  invalid_page_rows:  usize,
  /// Rows with a (kpi, data_type) pair the mapping does not permit.
  wrong_category:     usize,
  /// Rows without a question.
  unresolved:         usize,
  /// Rows without an answer or relevant paragraph.
  empty_answer:       usize,
  /// Rows whose relevant paragraphs could not be parsed.
  invalid_paragraphs: usize,
  /// Rows whose paragraphs and pages do not pair up.
  misaligned:         usize,
}

/// Cleans aggregated annotation rows into one [`Annotation`] per relevant paragraph.
///
/// Dropped rows never fail the batch; they are counted and logged instead.
pub fn clean(
  rows: &[RawAnnotation],
  mapping: &KpiMapping,
  options: &CleanOptions,
) -> Vec<Annotation> {
  let mut drops = Drops::default();
  let mut cleaned = Vec::new();

  for row in rows {
    if row.is_blank() {
      continue;
    }
    if [&row.company, &row.source_file, &row.source_page, &row.kpi_id, &row.year]
      .iter()
      .any(|field| field.trim().is_empty())
    {
      drops.incomplete += 1;
      continue;
    }
    let company = row.company.trim();
    if options.exclude_companies.contains(company) {
      drops.excluded += 1;
      continue;
    }

    let source_file = normalize_source_file(&row.source_file);
    let data_type = row.data_type.trim();

    let pages = match parse_source_page(&row.source_page) {
      Ok(pages) => pages,
      Err(_) => {
        drops.invalid_pages.insert(row.source_page.clone());
        drops.invalid_page_rows += 1;
        continue;
      },
    };

    let kpi_id = match row.kpi_id.parse::<KpiId>() {
      Ok(kpi_id) if mapping.permits(&kpi_id, data_type) => kpi_id,
      _ => {
        drops.wrong_category += 1;
        continue;
      },
    };

    let question = match mapping.question(&kpi_id, &row.year) {
      Ok(question) => question,
      Err(e) => {
        debug!("Dropping annotation of {source_file}: {e}");
        drops.unresolved += 1;
        continue;
      },
    };

    let answer = clean_answer(&row.answer);
    if answer.is_empty() || row.relevant_paragraphs.trim().is_empty() {
      drops.empty_answer += 1;
      continue;
    }

    let paragraphs = match parse_relevant_paragraphs(&row.relevant_paragraphs) {
      Ok(paragraphs) => paragraphs,
      Err(_) => {
        warn!("Input string is not a valid list format: {}", row.relevant_paragraphs.trim());
        drops.invalid_paragraphs += 1;
        continue;
      },
    };

    let paired = match pair_pages(paragraphs, &pages) {
      Ok(paired) => paired,
      Err(e) => {
        warn!("Dropping annotation of {source_file} for KPI {kpi_id}: {e}");
        drops.misaligned += 1;
        continue;
      },
    };

    cleaned.extend(paired.into_iter().map(|(relevant_paragraph, source_page)| Annotation {
      company: company.to_string(),
      source_file: source_file.clone(),
      source_page,
      kpi_id: kpi_id.clone(),
      year: row.year.trim().to_string(),
      answer: answer.clone(),
      data_type: data_type.to_string(),
      relevant_paragraph,
      annotator: row.annotator.trim().to_string(),
      sector: row.sector.trim().to_string(),
      question: question.clone(),
    }));
  }

  drops.log();
  debug!("Cleaned {} annotation rows into {} annotations", rows.len(), cleaned.len());
  cleaned
}

impl Drops {
  /// Reports every non-empty drop count.
  fn log(&self) {
    if self.incomplete > 0 {
      debug!("Dropped {} rows with missing identifying fields", self.incomplete);
    }
    if self.excluded > 0 {
      debug!("Dropped {} rows of excluded companies", self.excluded);
    }
    if !self.invalid_pages.is_empty() {
      warn!(
        "Has invalid source_page format: {:?} and {} such examples",
        self.invalid_pages, self.invalid_page_rows
      );
    }
    if self.wrong_category > 0 {
      debug!("Dropped {} examples due to incorrect kpi-data_type pair", self.wrong_category);
    }
    if self.unresolved > 0 {
      debug!("Dropped {} examples without a question", self.unresolved);
    }
    if self.empty_answer > 0 {
      debug!("Dropped {} examples without answer or relevant paragraph", self.empty_answer);
    }
    if self.invalid_paragraphs > 0 {
      warn!("Dropped {} examples with unparseable relevant paragraphs", self.invalid_paragraphs);
    }
    if self.misaligned > 0 {
      warn!("Dropped {} examples whose paragraphs and pages do not pair up", self.misaligned);
    }
  }
}

/// Forces a file name to end in exactly one `.pdf`.
///
/// ```
/// use presteps::annotation::clean::normalize_source_file;
///
/// assert_eq!(normalize_source_file("report.pdf"), "report.pdf");
/// assert_eq!(normalize_source_file("report ,pdf"), "report.pdf");
/// assert_eq!(normalize_source_file(" report "), "report.pdf");
/// ```
pub fn normalize_source_file(source_file: &str) -> String {
  let trimmed = source_file.trim();
  let lower = trimmed.to_ascii_lowercase();
  let stem = if let Some(idx) = lower.find(".pdf") {
    &trimmed[..idx]
  } else if lower.ends_with(",pdf") {
    &trimmed[..trimmed.len() - 4]
  } else {
    trimmed
  };
  format!("{}.pdf", stem.trim())
}

/// Parses a one-indexed page list such as `[12, 13]` into zero-indexed pages.
pub fn parse_source_page(source_page: &str) -> Result<Vec<u32>> {
  let unparseable =
    || PrestepsError::UnparseableField { field: "source_page", value: source_page.to_string() };
  let inner = source_page
    .trim()
    .strip_prefix('[')
    .and_then(|rest| rest.strip_suffix(']'))
    .ok_or_else(unparseable)?;
  inner
    .split(',')
    .map(|item| {
      let item = item.trim();
      let page = item
        .parse::<u32>()
        .ok()
        .or_else(|| {
          let page = item.parse::<f64>().ok()?;
          (page.fract() == 0.0 && page >= 0.0 && page <= f64::from(u32::MAX)).then_some(page as u32)
        })
        .ok_or_else(unparseable)?;
      page.checked_sub(1).ok_or_else(unparseable)
    })
    .collect()
}

/// Folds line breaks of an answer into spaces and trims it.
fn clean_answer(answer: &str) -> String {
  answer.lines().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// Parses the bracketed, quoted snippet list of `relevant_paragraphs`.
///
/// A stray `{` or `]` in place of the opening bracket and a stray `}` or `[` in place of the
/// closing bracket are tolerated.
///
/// ```
/// use presteps::annotation::clean::parse_relevant_paragraphs;
///
/// assert_eq!(
///   parse_relevant_paragraphs(r#"{"first one", "second one"}"#).unwrap(),
///   vec!["first one", "second one"]
/// );
/// assert!(parse_relevant_paragraphs("no brackets").is_err());
/// ```
pub fn parse_relevant_paragraphs(raw: &str) -> Result<Vec<String>> {
  let unparseable =
    || PrestepsError::UnparseableField { field: "relevant_paragraphs", value: raw.to_string() };
  let trimmed = raw.trim();
  let mut chars = trimmed.chars();
  let (first, last) = match (chars.next(), chars.next_back()) {
    (Some(first), Some(last)) => (first, last),
    _ => return Err(unparseable()),
  };
  let opens = matches!(first, '[' | '{' | ']');
  let closes = matches!(last, ']' | '}' | '[');
  if !opens || !closes {
    return Err(unparseable());
  }

  let inner = chars.as_str().trim();
  let inner = inner.strip_prefix(&QUOTES[..]).unwrap_or(inner);
  let inner = inner.strip_suffix(&QUOTES[..]).unwrap_or(inner);
  let paragraphs: Vec<String> = PARAGRAPH_SEPARATOR
    .split(inner)
    .map(str::trim)
    .filter(|paragraph| !paragraph.is_empty())
    .map(str::to_string)
    .collect();
  if paragraphs.is_empty() {
    return Err(unparseable());
  }
  Ok(paragraphs)
}

/// Pairs each paragraph with its page.
///
/// A single paragraph takes the first page. Several paragraphs need exactly one page each.
pub fn pair_pages(paragraphs: Vec<String>, pages: &[u32]) -> Result<Vec<(String, u32)>> {
  match (paragraphs.len(), pages.first()) {
    (1, Some(&page)) => Ok(paragraphs.into_iter().map(|paragraph| (paragraph, page)).collect()),
    (count, _) if count > 1 && count == pages.len() =>
      Ok(paragraphs.into_iter().zip(pages.iter().copied()).collect()),
    (count, _) => Err(PrestepsError::MisalignedPages { paragraphs: count, pages: pages.len() }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn mapping() -> KpiMapping {
    let mut mapping = KpiMapping::default();
    mapping.insert(KpiId::from(1), "In which year was the annual report published?", false, [
      "TEXT",
    ]);
    mapping.insert(KpiId::from(3), "What is the total revenue? Give a number.", true, [
      "TEXT", "TABLE",
    ]);
    mapping
  }

  fn raw() -> RawAnnotation {
    RawAnnotation {
      company:             "Acme".into(),
      source_file:         "acme".into(),
      source_page:         "[4]".into(),
      kpi_id:              "3.0".into(),
      year:                "2016.0".into(),
      answer:              "5%\n".into(),
      data_type:           " TEXT ".into(),
      relevant_paragraphs: r#"["Revenue grew by 5%"]"#.into(),
      annotator:           "annotations_a.xlsx".into(),
      sector:              "Energy".into(),
    }
  }

  #[traced_test]
  #[test]
  fn test_clean_single_paragraph_row() {
    let cleaned = clean(&[raw()], &mapping(), &CleanOptions::default());
    assert_eq!(cleaned.len(), 1);
    let annotation = &cleaned[0];
    assert_eq!(annotation.source_file, "acme.pdf");
    assert_eq!(annotation.source_page, 3);
    assert_eq!(annotation.kpi_id, KpiId::from(3));
    assert_eq!(annotation.data_type, "TEXT");
    assert_eq!(annotation.answer, "5%");
    assert_eq!(annotation.relevant_paragraph, "Revenue grew by 5%");
    assert_eq!(annotation.question, "What is the total revenue in year 2016?");
  }

  #[traced_test]
  #[test]
  fn test_clean_splits_paragraphs_index_wise() {
    let row = RawAnnotation {
      source_page: "[4, 9, 10]".into(),
      relevant_paragraphs: r#"["first", "second","third"]"#.into(),
      ..raw()
    };
    let cleaned = clean(&[row], &mapping(), &CleanOptions::default());
    let pairs: Vec<(&str, u32)> =
      cleaned.iter().map(|a| (a.relevant_paragraph.as_str(), a.source_page)).collect();
    assert_eq!(pairs, vec![("first", 3), ("second", 8), ("third", 9)]);
  }

  #[traced_test]
  #[test]
  fn test_clean_drops_and_logs() {
    let rows = vec![
      RawAnnotation { company: "CEZ".into(), ..raw() },
      RawAnnotation { year: String::new(), ..raw() },
      RawAnnotation { source_page: "4".into(), ..raw() },
      RawAnnotation { data_type: "TABLE".into(), kpi_id: "1".into(), ..raw() },
      RawAnnotation { kpi_id: "42".into(), ..raw() },
      RawAnnotation { answer: " \n ".into(), ..raw() },
      RawAnnotation { relevant_paragraphs: "just text".into(), ..raw() },
      RawAnnotation {
        source_page: "[4, 5, 6]".into(),
        relevant_paragraphs: r#"["a", "b"]"#.into(),
        ..raw()
      },
      RawAnnotation::default(),
    ];
    assert!(clean(&rows, &mapping(), &CleanOptions::default()).is_empty());
    assert!(logs_contain("Has invalid source_page format"));
    assert!(logs_contain("Dropped 2 examples due to incorrect kpi-data_type pair"));
    assert!(logs_contain("Input string is not a valid list format: just text"));
    assert!(logs_contain("2 relevant paragraphs cannot be paired with 3 source pages"));
  }

  #[test]
  fn test_parse_source_page() {
    assert_eq!(parse_source_page("[1]").unwrap(), vec![0]);
    assert_eq!(parse_source_page(" [12, 13.0] ").unwrap(), vec![11, 12]);
    assert!(parse_source_page("[0]").is_err());
    assert!(parse_source_page("[]").is_err());
    assert!(parse_source_page("[a]").is_err());
    assert!(parse_source_page("12").is_err());
  }

  #[test]
  fn test_parse_relevant_paragraphs_variants() {
    assert_eq!(parse_relevant_paragraphs(r#"["only"]"#).unwrap(), vec!["only"]);
    assert_eq!(parse_relevant_paragraphs(r#"]"a","b"["#).unwrap(), vec!["a", "b"]);
    assert_eq!(parse_relevant_paragraphs("['single']").unwrap(), vec!["single"]);
    assert_eq!(
      parse_relevant_paragraphs(r#"["targets 'net', 'zero' by 2050", "b"]"#).unwrap(),
      vec!["targets 'net', 'zero' by 2050", "b"]
    );
    assert_eq!(parse_relevant_paragraphs("[“a”, “b”]").unwrap(), vec!["a", "b"]);
    assert_eq!(
      parse_relevant_paragraphs(r#"["Revenue, as reported, grew"]"#).unwrap(),
      vec!["Revenue, as reported, grew"]
    );
    assert!(parse_relevant_paragraphs(r#"[""]"#).is_err());
    assert!(parse_relevant_paragraphs("[").is_err());
  }

  #[test]
  fn test_pair_pages() {
    assert_eq!(pair_pages(vec!["a".into()], &[3, 4]).unwrap(), vec![("a".to_string(), 3)]);
    assert!(matches!(
      pair_pages(vec!["a".into(), "b".into()], &[3]),
      Err(PrestepsError::MisalignedPages { paragraphs: 2, pages: 1 })
    ));
  }
}
