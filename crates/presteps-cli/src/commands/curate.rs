//! Module for the legacy "curate" stage of the pipeline.

use presteps::legacy::run_local_curation;

use super::*;

#[derive(Args, Clone)]
pub struct CurateOptions {
  /// Extracted JSON file or folder of files to curate
  pub path: PathBuf,

  /// Annotation workbook the contexts are taken from
  pub annotation_file: PathBuf,

  /// KPI mapping file with the question of every KPI
  pub kpi_mapping_file: PathBuf,

  /// Also sample negative contexts from the rest of the document
  #[arg(long)]
  pub create_neg_samples: bool,

  /// Negative contexts sampled per annotation row
  #[arg(long, default_value_t = 1)]
  pub neg_pos_ratio: usize,

  /// Seed for the negative sampling; unseeded when absent
  #[arg(long)]
  pub seed: Option<u64>,

  /// Folder the curated CSV is written to
  #[arg(long, default_value = ".")]
  pub output_folder: PathBuf,
}

impl CurateOptions {
  /// The legacy curation settings these options describe.
  pub fn settings(&self) -> LegacySettings {
    LegacySettings {
      neg_pos_ratio:      self.neg_pos_ratio,
      create_neg_samples: self.create_neg_samples,
      seed:               self.seed,
    }
  }
}

/// Function for the [`Commands::Curate`] in the CLI.
pub fn curate<I: UserInteraction>(interaction: &I, options: CurateOptions) -> Result<()> {
  let settings = options.settings();
  trace!("Curating {:?} with {settings:?}", options.path);
  let output = run_local_curation(
    &options.path,
    &options.annotation_file,
    &options.kpi_mapping_file,
    &settings,
    &options.output_folder,
  )?;
  interaction.reply(ResponseContent::Success("Curation finished"))?;
  interaction.reply(ResponseContent::Files(&[output]))
}
