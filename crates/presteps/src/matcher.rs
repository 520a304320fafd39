//! Answer-span location and closest-paragraph matching.
//!
//! Annotators copy a snippet of the report into the spreadsheet, which rarely matches the
//! extracted paragraph character for character. [`find_closest_paragraph`] recovers the full
//! extracted paragraph behind such a snippet and [`find_answer_start`] locates the answer inside
//! it.

use super::*;
use crate::{
  normalize::{normalize, normalize_for_matching},
  similarity::partial_ratio,
};

/// Character offsets of every occurrence of `answer` in `paragraph`.
///
/// The answer is matched literally, so `.` and other regex metacharacters never act as
/// wildcards. An answer made only of digits must be delimited by a non-digit on at least one
/// side, which keeps `"2016"` from matching inside `"20165"`. Other answers yield every
/// non-overlapping occurrence in order. An empty answer has no occurrences.
///
/// ```
/// use presteps::matcher::find_answer_start;
///
/// assert_eq!(find_answer_start("2016", "in 2016, we grew"), vec![3]);
/// assert!(find_answer_start("2016", "revenue 20165 total").is_empty());
/// assert_eq!(find_answer_start("5.1", "5x1 or 5.1"), vec![7]);
/// ```
pub fn find_answer_start(answer: &str, paragraph: &str) -> Vec<usize> {
  if answer.is_empty() {
    return Vec::new();
  }

  let byte_starts: Vec<usize> = if answer.chars().all(|c| c.is_ascii_digit()) {
    numeric_starts(answer, paragraph)
  } else {
    paragraph.match_indices(answer).map(|(start, _)| start).collect()
  };

  let starts: Vec<usize> =
    byte_starts.into_iter().map(|byte| paragraph[..byte].chars().count()).collect();
  trace!("Found answer {answer:?} at {starts:?}");
  starts
}

/// Byte offsets of a digit-only answer that is bounded by a non-digit on either side.
fn numeric_starts(answer: &str, paragraph: &str) -> Vec<usize> {
  let escaped = regex::escape(answer);
  let (after_non_digit, before_non_digit) =
    match (Regex::new(&format!("[^0-9]{escaped}")), Regex::new(&format!("{escaped}[^0-9]"))) {
      (Ok(after), Ok(before)) => (after, before),
      (Err(e), _) | (_, Err(e)) => {
        error!("Could not build a search pattern for {answer:?}: {e}");
        return Vec::new();
      },
    };

  let starts: BTreeSet<usize> = after_non_digit
    .find_iter(paragraph)
    .map(|m| m.start() + first_char_len(m.as_str()))
    .chain(before_non_digit.find_iter(paragraph).map(|m| m.start()))
    .collect();
  starts.into_iter().collect()
}

/// Byte length of the first character of `s`.
fn first_char_len(s: &str) -> usize { s.chars().next().map_or(0, char::len_utf8) }

/// Finds the extracted paragraph that best corresponds to an annotated snippet.
///
/// All texts are compared in the matching profile:
///
/// 1. The first candidate that contains the annotated snippet wins.
/// 2. Otherwise the candidate with the highest [`partial_ratio`] against the snippet is chosen
///    (ties go to the earlier candidate), provided it contains the answer.
/// 3. Otherwise, and when there are no candidates, the annotated snippet itself is kept.
///
/// The returned text is in the storage profile.
///
/// ```
/// use presteps::matcher::find_closest_paragraph;
///
/// let page = ["Contents", "In 2016, revenue grew by 5%.", "Outlook for 2017"];
/// assert_eq!(
///   find_closest_paragraph(&page, "revenue grew by 5 %", "5%"),
///   "In 2016, revenue grew by 5%."
/// );
/// assert_eq!(find_closest_paragraph(&page, "nothing alike", "42"), "nothing alike");
/// ```
pub fn find_closest_paragraph<S: AsRef<str>>(
  candidates: &[S],
  annotated_paragraph: &str,
  answer: &str,
) -> String {
  let annotated_key = normalize_for_matching(annotated_paragraph);
  let answer_key = normalize_for_matching(answer);
  let candidate_keys: Vec<String> =
    candidates.iter().map(|candidate| normalize_for_matching(candidate.as_ref())).collect();

  if let Some(idx) =
    candidate_keys.iter().position(|key| !find_answer_start(&annotated_key, key).is_empty())
  {
    trace!("Exact match for relevant paragraph at candidate {idx}");
    return normalize(candidates[idx].as_ref());
  }

  let mut best: Option<(usize, u8)> = None;
  for (idx, key) in candidate_keys.iter().enumerate() {
    let score = partial_ratio(key, &annotated_key);
    if best.map_or(true, |(_, best_score)| score > best_score) {
      best = Some((idx, score));
    }
  }

  match best {
    Some((idx, score)) if !find_answer_start(&answer_key, &candidate_keys[idx]).is_empty() => {
      trace!("Fuzzy match for relevant paragraph at candidate {idx} with score {score}");
      normalize(candidates[idx].as_ref())
    },
    _ => {
      trace!("No extracted paragraph matches, keeping annotated text");
      normalize(annotated_paragraph)
    },
  }
}
