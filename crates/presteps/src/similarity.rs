//! Fuzzy string similarity.
//!
//! Scores are integers in `0..=100` computed over characters:
//!
//! - [`ratio`] is the indel similarity `2·M / T`, where `M` is the length of the longest common
//!   subsequence and `T` the combined length.
//! - [`partial_ratio`] scores the shorter string against equally long windows of the longer one
//!   and keeps the best window, so a snippet scores 100 against any paragraph that contains it
//!   verbatim.
//!
//! # Examples
//!
//! ```
//! use presteps::similarity::{partial_ratio, ratio};
//!
//! assert_eq!(ratio("this is a test", "this is a test!"), 97);
//! assert_eq!(partial_ratio("this is a test", "this is a test!"), 100);
//! assert_eq!(partial_ratio("", "anything"), 0);
//! ```

use std::collections::HashMap;

/// Raw ratios above this threshold count as a perfect window.
const PERFECT_WINDOW: f64 = 0.995;

/// Indel similarity of two strings, rounded to `0..=100`.
///
/// Returns 0 when either string is empty.
pub fn ratio(a: &str, b: &str) -> u8 {
  let a: Vec<char> = a.chars().collect();
  let b: Vec<char> = b.chars().collect();
  to_score(raw_ratio(&a, &b))
}

/// Best [`ratio`] of the shorter string against windows of the longer one, in `0..=100`.
///
/// Windows start at `j - i` for every matching block `(i, j, n)` of the shorter string `s`
/// against the longer string `l`, plus the trailing window of `l`, and span `s.len()`
/// characters (clamped to the end of `l`). Returns 0 when either string is empty.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
  let a: Vec<char> = a.chars().collect();
  let b: Vec<char> = b.chars().collect();
  let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
  if shorter.is_empty() {
    return 0;
  }

  let mut best = 0.0_f64;
  for (i, j, _) in matching_blocks(&shorter, &longer) {
    let start = j.saturating_sub(i);
    let end = (start + shorter.len()).min(longer.len());
    let score = raw_ratio(&shorter, &longer[start..end]);
    if score > PERFECT_WINDOW {
      return 100;
    }
    best = best.max(score);
  }
  to_score(best)
}

/// Converts a raw ratio in `[0, 1]` to a rounded percentage.
fn to_score(raw: f64) -> u8 { (raw * 100.0).round().clamp(0.0, 100.0) as u8 }

/// Indel similarity in `[0, 1]`.
fn raw_ratio(a: &[char], b: &[char]) -> f64 {
  if a.is_empty() || b.is_empty() {
    return 0.0;
  }
  2.0 * lcs_len(a, b) as f64 / (a.len() + b.len()) as f64
}

/// Length of the longest common subsequence, in two rows of memory.
fn lcs_len(a: &[char], b: &[char]) -> usize {
  let mut previous = vec![0_usize; b.len() + 1];
  let mut current = vec![0_usize; b.len() + 1];
  for &ca in a {
    for (j, &cb) in b.iter().enumerate() {
      current[j + 1] = if ca == cb { previous[j] + 1 } else { previous[j + 1].max(current[j]) };
    }
    std::mem::swap(&mut previous, &mut current);
  }
  previous[b.len()]
}

/// Matching blocks `(i, j, n)` with `a[i..i + n] == b[j..j + n]`, ordered and with adjacent
/// blocks merged, followed by the terminating block `(a.len(), b.len(), 0)`.
///
/// The longest common run is taken first and the pieces on either side of it are searched the
/// same way, so memory stays linear in the input length.
fn matching_blocks(a: &[char], b: &[char]) -> Vec<(usize, usize, usize)> {
  let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
  for (j, &c) in b.iter().enumerate() {
    b2j.entry(c).or_default().push(j);
  }

  let mut found = Vec::new();
  let mut queue = vec![(0, a.len(), 0, b.len())];
  while let Some((alo, ahi, blo, bhi)) = queue.pop() {
    let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
    if k == 0 {
      continue;
    }
    found.push((i, j, k));
    if alo < i && blo < j {
      queue.push((alo, i, blo, j));
    }
    if i + k < ahi && j + k < bhi {
      queue.push((i + k, ahi, j + k, bhi));
    }
  }
  found.sort_unstable();

  let mut blocks: Vec<(usize, usize, usize)> = Vec::with_capacity(found.len() + 1);
  for (i, j, k) in found {
    match blocks.last_mut() {
      Some((bi, bj, len)) if *bi + *len == i && *bj + *len == j => *len += k,
      _ => blocks.push((i, j, k)),
    }
  }
  blocks.push((a.len(), b.len(), 0));
  blocks
}

/// Longest run `(i, j, k)` of `a[alo..ahi]` and `b[blo..bhi]`, the earliest one on ties.
fn longest_match(
  a: &[char],
  b2j: &HashMap<char, Vec<usize>>,
  alo: usize,
  ahi: usize,
  blo: usize,
  bhi: usize,
) -> (usize, usize, usize) {
  let mut best = (alo, blo, 0);
  // run length of the match ending at (i - 1, j), keyed by j
  let mut j2len: HashMap<usize, usize> = HashMap::new();
  for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
    let mut next: HashMap<usize, usize> = HashMap::new();
    for &j in b2j.get(c).into_iter().flatten() {
      if j < blo {
        continue;
      }
      if j >= bhi {
        break;
      }
      let k = j.checked_sub(1).and_then(|prev| j2len.get(&prev)).copied().unwrap_or(0) + 1;
      next.insert(j, k);
      if k > best.2 {
        best = (i + 1 - k, j + 1 - k, k);
      }
    }
    j2len = next;
  }
  best
}
