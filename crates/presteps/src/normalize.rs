//! Text normalization profiles.
//!
//! Annotated text comes out of spreadsheets and extracted text comes out of PDFs, and the two
//! disagree on quotes, whitespace and stray control bytes. Two profiles bring them onto common
//! ground:
//!
//! - [`normalize`] is the storage profile. It keeps case and punctuation and is what every
//!   persisted paragraph and answer looks like.
//! - [`normalize_for_matching`] is the matching profile. It additionally lowercases and strips
//!   regex metacharacters and dot runs, and is only ever used for comparisons.
//!
//! Both profiles emit printable ASCII only and are idempotent.
//!
//! # Examples
//!
//! ```
//! use presteps::normalize::{normalize, normalize_for_matching};
//!
//! assert_eq!(normalize("“Net   Zero”\n(2050)"), "Net Zero (2050)");
//! assert_eq!(normalize_for_matching("“Net   Zero”\n(2050)"), "net zero 2050");
//! ```

use super::*;

lazy_static! {
  /// Runs of two or more whitespace characters.
  static ref WHITESPACE_RUN: Regex = Regex::new(r"\s{2,}").unwrap();
  /// Runs of two or more literal dots, typically table-of-contents leaders.
  static ref DOT_RUN: Regex = Regex::new(r"\.{2,}").unwrap();
}

/// Characters with a special meaning in regular expressions, stripped by the matching profile.
pub const REGEX_METACHARACTERS: [char; 13] =
  ['(', ')', '^', '+', '*', '$', '|', '\\', '?', '[', ']', '{', '}'];

/// Normalizes text for storage: quotes folded, whitespace collapsed, printable ASCII only.
///
/// Curly double quotes directly after `[` or directly before `]` become straight quotes so that
/// list-like annotation strings keep their delimiters; all other curly double quotes are
/// removed. Newlines, carriage returns and tabs become spaces, anything outside printable ASCII
/// is dropped, whitespace runs collapse to a single space and the result is trimmed.
pub fn normalize(text: &str) -> String {
  let folded = fold_quotes(text);
  let printable: String = folded.chars().filter_map(printable_ascii).collect();
  collapse_whitespace(&printable)
}

/// Normalizes text for comparison.
///
/// Applies the storage profile, then removes [`REGEX_METACHARACTERS`], lowercases and removes
/// runs of two or more dots. The result can be embedded verbatim in a search pattern.
pub fn normalize_for_matching(text: &str) -> String {
  let folded = fold_quotes(text);
  let mut stripped: String = folded
    .chars()
    .filter_map(printable_ascii)
    .filter(|c| !REGEX_METACHARACTERS.contains(c))
    .collect();
  stripped.make_ascii_lowercase();
  let without_dots = DOT_RUN.replace_all(&stripped, "");
  collapse_whitespace(&without_dots)
}

/// Straightens curly quotes next to list brackets and drops the remaining ones.
fn fold_quotes(text: &str) -> String {
  text.replace("[“", "[\"").replace("”]", "\"]").replace(&['“', '”'][..], "")
}

/// Maps line breaks and tabs to spaces and rejects everything that is not printable ASCII.
fn printable_ascii(c: char) -> Option<char> {
  match c {
    '\n' | '\r' | '\t' => Some(' '),
    ' '..='~' => Some(c),
    _ => None,
  }
}

/// Collapses whitespace runs into a single space and trims both ends.
fn collapse_whitespace(text: &str) -> String {
  WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}
