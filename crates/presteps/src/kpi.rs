//! KPI identifiers and the KPI mapping table.
//!
//! The KPI mapping file is a small CSV with one row per KPI:
//!
//! | column         | meaning                                                     |
//! |----------------|-------------------------------------------------------------|
//! | `kpi_id`       | numeric identifier (`1`, `2.1`, ...)                          |
//! | `question`     | natural-language question template                          |
//! | `add_year`     | whether the annotated year is appended to the question      |
//! | `kpi_category` | comma-separated data types an answer may originate from     |
//!
//! The mapping is loaded once with [`load_kpi_mapping`] and passed explicitly to every stage that
//! needs it.

use std::str::FromStr;

use super::*;

/// Columns a KPI mapping file must provide.
pub const KPI_MAPPING_COLUMNS: [&str; 4] = ["kpi_id", "question", "add_year", "kpi_category"];

/// A numeric KPI identifier in canonical decimal form.
///
/// Spreadsheets hand out identifiers as `1`, `1.0` or `"1"` depending on the cell type; all of
/// these parse to the same `KpiId`.
///
/// ```
/// use presteps::kpi::KpiId;
///
/// let a: KpiId = "1.0".parse().unwrap();
/// let b: KpiId = " 1 ".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "1");
/// assert_eq!("2.10".parse::<KpiId>().unwrap().to_string(), "2.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KpiId(String);

impl KpiId {
  /// Numeric value of the identifier.
  pub fn as_f64(&self) -> f64 { self.0.parse().unwrap_or(f64::NAN) }

  /// The canonical textual form.
  pub fn as_str(&self) -> &str { &self.0 }
}

impl FromStr for KpiId {
  type Err = PrestepsError;

  fn from_str(s: &str) -> Result<Self> {
    let trimmed = s.trim();
    let value: f64 = trimmed
      .parse()
      .ok()
      .filter(|value: &f64| value.is_finite())
      .ok_or_else(|| PrestepsError::UnparseableField { field: "kpi_id", value: s.to_string() })?;
    Ok(Self(format_number(value)))
  }
}

impl TryFrom<String> for KpiId {
  type Error = PrestepsError;

  fn try_from(value: String) -> Result<Self> { value.parse() }
}

impl From<KpiId> for String {
  fn from(value: KpiId) -> Self { value.0 }
}

impl From<u32> for KpiId {
  fn from(value: u32) -> Self { Self(value.to_string()) }
}

impl Display for KpiId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// Renders a number without a fractional part when it is integral.
pub(crate) fn format_number(value: f64) -> String {
  if value.fract() == 0.0 && value.abs() < 1e15 {
    format!("{}", value as i64)
  } else {
    value.to_string()
  }
}

/// Question templates and answer categories per KPI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KpiMapping {
  /// Question template per KPI.
  questions:  HashMap<KpiId, String>,
  /// KPIs whose question gets the annotated year appended.
  add_year:   HashSet<KpiId>,
  /// Data types an answer to the KPI may be annotated with.
  categories: HashMap<KpiId, BTreeSet<String>>,
}

impl KpiMapping {
  /// Registers a KPI.
  pub fn insert(
    &mut self,
    kpi_id: KpiId,
    question: impl Into<String>,
    add_year: bool,
    categories: impl IntoIterator<Item = impl Into<String>>,
  ) {
    if add_year {
      self.add_year.insert(kpi_id.clone());
    } else {
      self.add_year.remove(&kpi_id);
    }
    self.categories.insert(kpi_id.clone(), categories.into_iter().map(Into::into).collect());
    self.questions.insert(kpi_id, question.into());
  }

  /// The question template for `kpi_id`, as written in the mapping file.
  pub fn template(&self, kpi_id: &KpiId) -> Option<&str> {
    self.questions.get(kpi_id).map(String::as_str)
  }

  /// Builds the question for an annotated (`kpi_id`, `year`) pair.
  ///
  /// For KPIs flagged with `add_year` everything after the first `?` of the template is
  /// replaced by ` in year <year>?`. Integral years are printed without a fractional part.
  pub fn question(&self, kpi_id: &KpiId, year: &str) -> Result<String> {
    let template =
      self.template(kpi_id).ok_or_else(|| PrestepsError::UnresolvedQuestion(kpi_id.clone()))?;
    if !self.add_year.contains(kpi_id) {
      return Ok(template.to_string());
    }
    let year = year.trim();
    let year = year
      .parse::<f64>()
      .ok()
      .filter(|value| value.is_finite())
      .map_or_else(|| year.to_string(), |value| format_number(value.trunc()));
    let front = template.split('?').next().unwrap_or_default();
    Ok(format!("{front} in year {year}?"))
  }

  /// Whether answers to `kpi_id` may be annotated with `data_type`.
  ///
  /// KPIs without a category entry permit nothing.
  pub fn permits(&self, kpi_id: &KpiId, data_type: &str) -> bool {
    self.categories.get(kpi_id).is_some_and(|allowed| allowed.contains(data_type.trim()))
  }

  /// Number of KPIs in the mapping.
  pub fn len(&self) -> usize { self.questions.len() }

  /// Whether the mapping holds no KPIs.
  pub fn is_empty(&self) -> bool { self.questions.is_empty() }
}

/// Loads the KPI mapping from a CSV or spreadsheet file.
///
/// Rows with an unparseable `kpi_id` are skipped with a warning; a missing column fails the
/// whole load.
pub fn load_kpi_mapping(path: impl AsRef<Path>) -> Result<KpiMapping> {
  let path = path.as_ref();
  let table = Table::read(path)?;
  table.require_columns(&path.display().to_string(), &KPI_MAPPING_COLUMNS)?;

  let mut mapping = KpiMapping::default();
  for record in table.records() {
    let kpi_id = match record.get("kpi_id").parse::<KpiId>() {
      Ok(kpi_id) => kpi_id,
      Err(e) => {
        warn!("Skipping KPI mapping row: {e}");
        continue;
      },
    };
    let categories = record
      .get("kpi_category")
      .split(',')
      .map(str::trim)
      .filter(|category| !category.is_empty())
      .map(str::to_string)
      .collect::<Vec<_>>();
    mapping.insert(kpi_id, record.get("question"), parse_flag(record.get("add_year")), categories);
  }
  info!("KPI mapping loaded with {} entries from {path:?}", mapping.len());
  Ok(mapping)
}

/// Reads a boolean cell (`true`/`false`/`1`/`0`, any case); anything else is `false`.
fn parse_flag(value: &str) -> bool {
  matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "1.0" | "yes")
}
