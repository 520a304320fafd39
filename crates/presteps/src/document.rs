//! Extracted documents and their loading.
//!
//! The extraction stage stores every PDF as JSON keyed by zero-indexed page number, then by
//! paragraph id:
//!
//! ```json
//! {
//!   "0": { "0": { "paragraph": "Annual Report 2019" } },
//!   "1": { "0": { "paragraph": "In 2016, revenue grew by 5%." },
//!          "1": { "paragraph": "Outlook" } }
//! }
//! ```
//!
//! A page may also be given directly as an array of paragraph strings. Paragraph order is the
//! order of the file. Documents are named after their PDF: both `report.json` and
//! `report_output.json` describe `report.pdf`.

use serde_json::{Map, Value};

use super::*;

/// Suffix the extraction stage appends to output file stems.
pub const OUTPUT_SUFFIX: &str = "_output";

/// The paragraphs of one PDF, grouped by zero-indexed page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
  /// The PDF file name, e.g. `report.pdf`.
  pub name:  String,
  /// Paragraphs per zero-indexed page, in document order.
  pub pages: BTreeMap<u32, Vec<String>>,
}

impl ExtractedDocument {
  /// Creates an empty document for the PDF `name`.
  pub fn new(name: impl Into<String>) -> Self { Self { name: name.into(), pages: BTreeMap::new() } }

  /// Appends a paragraph to `page`.
  pub fn push(&mut self, page: u32, paragraph: impl Into<String>) {
    self.pages.entry(page).or_default().push(paragraph.into());
  }

  /// Loads a document from an extraction JSON file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let name = pdf_name_for(path).ok_or_else(|| PrestepsError::InvalidInputPath(path.into()))?;
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    Self::from_json(name, &value)
  }

  /// Builds a document from parsed extraction JSON.
  ///
  /// Pages whose key is not a page number are skipped with a warning, as are paragraph entries
  /// that carry no text.
  pub fn from_json(name: impl Into<String>, value: &Value) -> Result<Self> {
    let mut document = Self::new(name);
    let Value::Object(pages) = value else {
      return Err(PrestepsError::Config(format!(
        "Extracted text for {} must be a JSON object keyed by page",
        document.name
      )));
    };

    for (page_key, page) in pages {
      let Ok(page_number) = page_key.trim().parse::<u32>() else {
        warn!("Skipping page {page_key:?} of {}: not a page number", document.name);
        continue;
      };
      let entries: Vec<&Value> = match page {
        Value::Object(paragraphs) => paragraphs.values().collect(),
        Value::Array(paragraphs) => paragraphs.iter().collect(),
        other => {
          warn!("Skipping page {page_key} of {}: unexpected value {other}", document.name);
          continue;
        },
      };
      let paragraphs = document.pages.entry(page_number).or_default();
      paragraphs.extend(entries.into_iter().filter_map(paragraph_text));
    }
    trace!("Loaded {} pages for {}", document.pages.len(), document.name);
    Ok(document)
  }

  /// Renders the document in the extraction JSON layout.
  pub fn to_json(&self) -> Value {
    let pages: Map<String, Value> = self
      .pages
      .iter()
      .map(|(page, paragraphs)| {
        let records: Map<String, Value> = paragraphs
          .iter()
          .enumerate()
          .map(|(idx, text)| {
            let mut record = Map::new();
            record.insert("paragraph".to_string(), Value::String(text.clone()));
            (idx.to_string(), Value::Object(record))
          })
          .collect();
        (page.to_string(), Value::Object(records))
      })
      .collect();
    Value::Object(pages)
  }

  /// The paragraphs of a zero-indexed page; empty when the page does not exist.
  pub fn page(&self, page: u32) -> &[String] {
    self.pages.get(&page).map(Vec::as_slice).unwrap_or_default()
  }

  /// Every paragraph with its page, in document order.
  pub fn paragraphs(&self) -> impl Iterator<Item = (u32, &str)> {
    self.pages.iter().flat_map(|(page, paragraphs)| {
      paragraphs.iter().map(move |paragraph| (*page, paragraph.as_str()))
    })
  }

  /// Whether the document has no paragraphs at all.
  pub fn is_empty(&self) -> bool { self.pages.values().all(Vec::is_empty) }
}

/// Text of a paragraph entry: either a bare string or a record with a `paragraph` field.
fn paragraph_text(entry: &Value) -> Option<String> {
  match entry {
    Value::String(text) => Some(text.clone()),
    Value::Object(record) => record.get("paragraph").and_then(Value::as_str).map(str::to_string),
    _ => None,
  }
}

/// The PDF name an extraction JSON file describes, e.g. `a_output.json` → `a.pdf`.
pub fn pdf_name_for(json_path: impl AsRef<Path>) -> Option<String> {
  let stem = json_path.as_ref().file_stem()?.to_str()?;
  let stem = stem.strip_suffix(OUTPUT_SUFFIX).unwrap_or(stem);
  Some(format!("{stem}.pdf"))
}

/// All extracted documents of a folder, keyed by PDF name.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
  /// Documents by PDF file name.
  documents: HashMap<String, ExtractedDocument>,
}

impl DocumentSet {
  /// Loads every `*.json` file of `folder`.
  ///
  /// A file that cannot be read or parsed is logged and skipped.
  pub fn load_dir(folder: impl AsRef<Path>) -> Result<Self> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
      return Err(PrestepsError::InvalidInputPath(folder.to_path_buf()));
    }
    let pattern = folder.join("*.json");
    let mut paths: Vec<PathBuf> =
      glob::glob(&pattern.to_string_lossy())?.filter_map(|entry| entry.ok()).collect();
    paths.sort();

    info!("Loading extracted text JSONs from {folder:?}");
    let mut set = Self::default();
    for path in paths {
      match ExtractedDocument::load(&path) {
        Ok(document) => set.insert(document),
        Err(e) => error!("Could not load extracted text from {path:?}: {e}"),
      }
    }
    info!("Loaded {} JSON files", set.len());
    Ok(set)
  }

  /// Adds a document, replacing any previous document of the same name.
  pub fn insert(&mut self, document: ExtractedDocument) {
    if let Some(previous) = self.documents.insert(document.name.clone(), document) {
      warn!("Extracted text for {} was loaded more than once, keeping the last", previous.name);
    }
  }

  /// The document for the PDF `name`.
  pub fn get(&self, name: &str) -> Option<&ExtractedDocument> { self.documents.get(name) }

  /// The paragraphs of a zero-indexed page of the PDF `name`, if both exist.
  pub fn page(&self, name: &str, page: u32) -> &[String] {
    self.get(name).map(|document| document.page(page)).unwrap_or_default()
  }

  /// Number of documents.
  pub fn len(&self) -> usize { self.documents.len() }

  /// Whether no document was loaded.
  pub fn is_empty(&self) -> bool { self.documents.is_empty() }
}

impl FromIterator<ExtractedDocument> for DocumentSet {
  fn from_iter<I: IntoIterator<Item = ExtractedDocument>>(iter: I) -> Self {
    let mut set = Self::default();
    iter.into_iter().for_each(|document| set.insert(document));
    set
  }
}
