//! Module for the "extract" stage of the pipeline.

use presteps::{configuration::DEFAULT_MIN_PARAGRAPH_LENGTH, extract::run_local_extraction};

use super::*;

#[derive(Args, Clone)]
pub struct ExtractOptions {
  /// PDF file or folder of files to extract
  pub path: PathBuf,

  /// Skip files whose extraction output already exists
  #[arg(long)]
  pub skip_extracted_files: bool,

  /// Extract without writing JSON files
  #[arg(long)]
  pub no_store_to_file: bool,

  /// Minimum number of alphabetic characters a paragraph needs to be kept
  #[arg(long, default_value_t = DEFAULT_MIN_PARAGRAPH_LENGTH)]
  pub min_paragraph_length: usize,

  /// Folder the `<stem>_output.json` files are written to
  #[arg(long, default_value = ".")]
  pub output_folder: PathBuf,
}

impl ExtractOptions {
  /// The extraction settings these options describe.
  pub fn settings(&self) -> ExtractionSettings {
    ExtractionSettings {
      min_paragraph_length: self.min_paragraph_length,
      skip_extracted_files: self.skip_extracted_files,
      store_to_file:        !self.no_store_to_file,
    }
  }
}

/// Function for the [`Commands::Extract`] in the CLI.
pub fn extract<I: UserInteraction>(interaction: &I, options: ExtractOptions) -> Result<()> {
  let settings = options.settings();
  trace!("Extracting {:?} with {settings:?}", options.path);
  let documents = run_local_extraction(&options.path, &options.output_folder, &settings)?;

  if documents.is_empty() {
    interaction.reply(ResponseContent::Warning(&format!(
      "No documents were extracted from {}",
      options.path.display()
    )))?;
    return Ok(());
  }
  interaction.reply(ResponseContent::Success(&format!(
    "Extracted {} documents",
    documents.len()
  )))?;
  if settings.store_to_file {
    interaction.reply(ResponseContent::Info(&format!(
      "Output written to {}",
      options.output_folder.display()
    )))?;
  }
  Ok(())
}
