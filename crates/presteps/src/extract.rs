//! Paragraph extraction from PDF reports.
//!
//! Extraction turns a report into an [`ExtractedDocument`]: zero-indexed pages of paragraphs,
//! stored next to the other outputs as `<stem>_output.json`. Curation only ever reads those
//! JSON files, so any [`Extractor`] producing the same layout can stand in for [`PdfExtractor`].
//!
//! # Examples
//!
//! ```no_run
//! use presteps::{configuration::ExtractionSettings, extract::run_local_extraction};
//!
//! # fn main() -> presteps::error::Result<()> {
//! let written = run_local_extraction("reports/", "extracted/", &ExtractionSettings::default())?;
//! println!("{} documents extracted", written.len());
//! # Ok(())
//! # }
//! ```

use lopdf::Document;

use super::*;
use crate::{
  configuration::ExtractionSettings,
  document::{ExtractedDocument, OUTPUT_SUFFIX},
};

/// Turns a file into page-indexed paragraphs.
pub trait Extractor {
  /// Extracts the paragraphs of the file at `path`.
  fn extract(&self, path: &Path) -> Result<ExtractedDocument>;
}

/// Extracts paragraphs from the text layer of a PDF.
///
/// Page text is split into paragraphs at blank lines, the lines of a paragraph are joined with
/// spaces and paragraphs with fewer than `min_paragraph_length` alphabetic characters are
/// dropped. Pages are numbered from zero.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
  /// Paragraph filter settings.
  settings: ExtractionSettings,
}

impl PdfExtractor {
  /// Creates an extractor with the given settings.
  pub fn new(settings: ExtractionSettings) -> Self { Self { settings } }
}

impl Extractor for PdfExtractor {
  fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
    let name = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .ok_or_else(|| PrestepsError::InvalidInputPath(path.to_path_buf()))?;
    let pdf = Document::load(path)?;
    if pdf.is_encrypted() {
      warn!("{name} is encrypted, its text may not be extractable");
    }

    let mut document = ExtractedDocument::new(name);
    for page_number in pdf.get_pages().into_keys() {
      let text = match pdf.extract_text(&[page_number]) {
        Ok(text) => text,
        Err(e) => {
          warn!("Could not extract text from page {page_number} of {}: {e}", document.name);
          continue;
        },
      };
      for paragraph in split_paragraphs(&text, self.settings.min_paragraph_length) {
        document.push(page_number.saturating_sub(1), paragraph);
      }
    }
    debug!("Extracted {} pages with text from {}", document.pages.len(), document.name);
    Ok(document)
  }
}

/// Splits page text into paragraphs at blank lines, keeping those with at least
/// `min_alphabetic` alphabetic characters.
///
/// ```
/// use presteps::extract::split_paragraphs;
///
/// let text = "Annual Report\n\nRevenue grew\nby 5% in 2016.\n\n12\n";
/// assert_eq!(split_paragraphs(text, 5), vec!["Annual Report", "Revenue grew by 5% in 2016."]);
/// ```
pub fn split_paragraphs(text: &str, min_alphabetic: usize) -> Vec<String> {
  let mut paragraphs = Vec::new();
  let mut current: Vec<&str> = Vec::new();
  for line in text.lines().map(str::trim) {
    if line.is_empty() {
      flush(&mut current, &mut paragraphs, min_alphabetic);
    } else {
      current.push(line);
    }
  }
  flush(&mut current, &mut paragraphs, min_alphabetic);
  paragraphs
}

/// Moves the collected lines into `paragraphs` if they hold enough letters.
fn flush(current: &mut Vec<&str>, paragraphs: &mut Vec<String>, min_alphabetic: usize) {
  if current.is_empty() {
    return;
  }
  let paragraph = current.join(" ");
  current.clear();
  if paragraph.chars().filter(|c| c.is_alphabetic()).count() >= min_alphabetic {
    paragraphs.push(paragraph);
  }
}

/// Picks the extractor for a file by its extension.
pub fn extractor_for(path: &Path, settings: &ExtractionSettings) -> Result<Box<dyn Extractor>> {
  match path.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase).as_deref() {
    Some("pdf") => Ok(Box::new(PdfExtractor::new(settings.clone()))),
    _ => Err(PrestepsError::Config(format!("No extractor available for {path:?}"))),
  }
}

/// The output file for `file` in `output_folder`, e.g. `report.pdf` → `report_output.json`.
pub fn output_path_for(file: &Path, output_folder: &Path) -> PathBuf {
  let stem = file.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default();
  output_folder.join(format!("{stem}{OUTPUT_SUFFIX}.json"))
}

/// Extracts one file and stores the result in `output_folder`.
///
/// Returns `None` when `skip_extracted_files` is set and the output already exists. The
/// document is written only when `store_to_file` is set.
pub fn extract_one_file(
  extractor: &dyn Extractor,
  file: &Path,
  output_folder: &Path,
  settings: &ExtractionSettings,
) -> Result<Option<ExtractedDocument>> {
  let output = output_path_for(file, output_folder);
  if settings.skip_extracted_files && output.exists() {
    info!("The extracted JSON for {file:?} already exists. Skipping...");
    return Ok(None);
  }

  let document = extractor.extract(file)?;
  if settings.store_to_file {
    std::fs::create_dir_all(output_folder)?;
    std::fs::write(&output, serde_json::to_string_pretty(&document.to_json())?)?;
    debug!("Stored extraction of {file:?} at {output:?}");
  }
  Ok(Some(document))
}

/// Extracts a file, or every file of a folder, into `output_folder`.
///
/// In a folder, files that fail are logged and skipped. A path that is neither a file nor a
/// folder fails with [`PrestepsError::InvalidInputPath`]. Returns the extracted documents.
pub fn run_local_extraction(
  path: impl AsRef<Path>,
  output_folder: impl AsRef<Path>,
  settings: &ExtractionSettings,
) -> Result<Vec<ExtractedDocument>> {
  let path = path.as_ref();
  let output_folder = output_folder.as_ref();

  let extract = |file: &Path| -> Result<Option<ExtractedDocument>> {
    info!("Start extracting file {file:?}");
    let extractor = extractor_for(file, settings)?;
    let document = extract_one_file(extractor.as_ref(), file, output_folder, settings)?;
    info!("Done with extracting file {file:?}");
    Ok(document)
  };

  if path.is_file() {
    return Ok(extract(path)?.into_iter().collect());
  }
  if !path.is_dir() {
    return Err(PrestepsError::InvalidInputPath(path.to_path_buf()));
  }

  let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
    .filter_map(|entry| entry.ok().map(|entry| entry.path()))
    .filter(|file| file.is_file())
    .collect();
  files.sort();

  let mut documents = Vec::new();
  for file in &files {
    match extract(file) {
      Ok(document) => documents.extend(document),
      Err(e) => error!("There was an error for file {file:?}: {e}"),
    }
  }
  Ok(documents)
}

#[cfg(test)]
mod tests {
  use lopdf::{
    content::{Content, Operation},
    dictionary, Object, Stream,
  };

  use super::*;

  /// Writes a PDF with one text line per page.
  fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
      "Type" => "Font",
      "Subtype" => "Type1",
      "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
      "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
      let content = Content {
        operations: vec![
          Operation::new("BT", vec![]),
          Operation::new("Tf", vec!["F1".into(), 12.into()]),
          Operation::new("Td", vec![50.into(), 700.into()]),
          Operation::new("Tj", vec![Object::string_literal(*text)]),
          Operation::new("ET", vec![]),
        ],
      };
      let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
      let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
      });
      kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
      pages_id,
      Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
      }),
    );
    let catalog_id = doc.add_object(dictionary! {
      "Type" => "Catalog",
      "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
  }

  #[test]
  fn test_split_paragraphs() {
    let text = "  First line\nsecond line  \n\n\n ab \n\nThird paragraph here";
    assert_eq!(split_paragraphs(text, 3), vec!["First line second line", "Third paragraph here"]);
    assert!(split_paragraphs("", 0).is_empty());
  }

  #[test]
  fn test_output_path_for() {
    assert_eq!(
      output_path_for(Path::new("in/report.pdf"), Path::new("out")),
      PathBuf::from("out/report_output.json")
    );
  }

  #[traced_test]
  #[test]
  fn test_pdf_extraction_and_storage() {
    let dir = tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, &["Revenue grew by five percent in the reporting year", "42"]);
    let settings = ExtractionSettings::default();

    let document =
      extract_one_file(&PdfExtractor::new(settings.clone()), &pdf, dir.path(), &settings)
        .unwrap()
        .unwrap();
    assert_eq!(document.name, "report.pdf");
    assert!(document.page(0).iter().any(|paragraph| paragraph.contains("Revenue grew")));
    assert!(document.page(1).is_empty());

    let stored = ExtractedDocument::load(dir.path().join("report_output.json")).unwrap();
    assert_eq!(stored, document);
  }

  #[traced_test]
  #[test]
  fn test_skip_extracted_files() {
    let dir = tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    std::fs::write(&pdf, b"not a pdf").unwrap();
    std::fs::write(dir.path().join("report_output.json"), "{}").unwrap();

    let settings = ExtractionSettings { skip_extracted_files: true, ..Default::default() };
    let skipped =
      extract_one_file(&PdfExtractor::new(settings.clone()), &pdf, dir.path(), &settings).unwrap();
    assert!(skipped.is_none());
    assert!(logs_contain("already exists"));
  }

  #[traced_test]
  #[test]
  fn test_folder_run_logs_failures() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("reports");
    std::fs::create_dir(&input).unwrap();
    write_pdf(&input.join("good.pdf"), &["Emissions fell sharply across all of our sites"]);
    std::fs::write(input.join("broken.pdf"), b"not a pdf").unwrap();
    std::fs::write(input.join("notes.txt"), b"ignored").unwrap();

    let output = dir.path().join("extracted");
    let documents = run_local_extraction(&input, &output, &ExtractionSettings::default()).unwrap();
    assert_eq!(documents.len(), 1);
    assert!(output.join("good_output.json").exists());
    assert!(logs_contain("There was an error for file"));

    assert!(matches!(
      run_local_extraction(dir.path().join("missing"), &output, &ExtractionSettings::default()),
      Err(PrestepsError::InvalidInputPath(_))
    ));
  }
}
