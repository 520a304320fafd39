//! Module for the "kpi-curation" stage of the pipeline.
//!
//! Settings come from an optional TOML file first; every option passed on the command line
//! overrides the file.

use presteps::dataset::run_kpi_curation;

use super::*;

#[derive(Args, Clone, Default)]
pub struct KpiCurationOptions {
  /// TOML file with curation settings
  #[arg(long)]
  pub config: Option<PathBuf>,

  /// Folder of annotation spreadsheets
  #[arg(long)]
  pub annotation_folder: Option<PathBuf>,

  /// Folder of extracted text JSON files
  #[arg(long)]
  pub extracted_text_json_folder: Option<PathBuf>,

  /// Folder the train and validation files are written to
  #[arg(long)]
  pub output_folder: PathBuf,

  /// KPI mapping file with the question of every KPI
  #[arg(long)]
  pub kpi_mapping_file: Option<PathBuf>,

  /// Relevance judgments used for unanswerable examples
  #[arg(long)]
  pub relevance_file_path: Option<PathBuf>,

  /// Share of examples held out for validation
  #[arg(long)]
  pub val_ratio: Option<f64>,

  /// Aggregate annotation cache; reused when it exists
  #[arg(long)]
  pub agg_annotation: Option<PathBuf>,

  /// Do not search other pages for further answerable examples
  #[arg(long)]
  pub no_find_new_answerable: bool,

  /// Do not create unanswerable examples
  #[arg(long)]
  pub no_create_unanswerable: bool,

  /// Seed for the shuffle before the split; unseeded when absent
  #[arg(long)]
  pub shuffle_seed: Option<u64>,

  /// Seed for the train subsample
  #[arg(long)]
  pub split_seed: Option<u64>,
}

impl KpiCurationOptions {
  /// Merges the configuration file, if any, with the options passed on the command line.
  pub fn into_config(self) -> Result<CurationConfig> {
    let mut config = match &self.config {
      Some(path) => CurationConfig::from_toml_file(path)?,
      None => CurationConfig::default(),
    };

    if let Some(folder) = self.annotation_folder {
      config.annotation_folder = folder;
    }
    if let Some(folder) = self.extracted_text_json_folder {
      config.extracted_text_json_folder = folder;
    }
    if let Some(file) = self.kpi_mapping_file {
      config.kpi_mapping_file = file;
    }
    if let Some(file) = self.relevance_file_path {
      config.relevance_file = Some(file);
    }
    if let Some(file) = self.agg_annotation {
      config.agg_annotation = file;
    }
    if let Some(val_ratio) = self.val_ratio {
      config.val_ratio = val_ratio;
    }
    if self.no_find_new_answerable {
      config.find_new_answerable = false;
    }
    if self.no_create_unanswerable {
      config.create_unanswerable = false;
    }
    if self.shuffle_seed.is_some() {
      config.shuffle_seed = self.shuffle_seed;
    }
    if let Some(seed) = self.split_seed {
      config.split_seed = seed;
    }

    for (name, path) in [
      ("annotation-folder", &config.annotation_folder),
      ("extracted-text-json-folder", &config.extracted_text_json_folder),
      ("kpi-mapping-file", &config.kpi_mapping_file),
    ] {
      if path.as_os_str().is_empty() {
        return Err(PrestepsCliError::MissingOption(name));
      }
    }
    config.validate()?;
    Ok(config)
  }
}

/// Function for the [`Commands::KpiCuration`] in the CLI.
pub fn kpi_curation<I: UserInteraction>(
  interaction: &I,
  options: KpiCurationOptions,
) -> Result<()> {
  let output_folder = options.output_folder.clone();
  let config = options.into_config()?;
  debug!("Curating with {config:?}");

  if config.create_unanswerable && config.relevance_file.is_none() {
    interaction.reply(ResponseContent::Warning(
      "No relevance file given, only answerable examples will be created",
    ))?;
  }

  let (train, val) = run_kpi_curation(&config, &output_folder)?;
  interaction.reply(ResponseContent::Success("KPI curation finished"))?;
  interaction.reply(ResponseContent::Files(&[train, val]))
}
