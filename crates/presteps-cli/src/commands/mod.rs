use super::*;

pub mod curate;
pub mod extract;
pub mod kpi_curation;

pub use curate::{curate, CurateOptions};
pub use extract::{extract, ExtractOptions};
pub use kpi_curation::{kpi_curation, KpiCurationOptions};

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Extract paragraphs from a PDF file, or every file of a folder, into JSON
  Extract(ExtractOptions),

  /// Curate extracted text against one annotation file into (context, label) pairs
  Curate(CurateOptions),

  /// Build question-answering train and validation sets from an annotation folder
  KpiCuration(KpiCurationOptions),
}
