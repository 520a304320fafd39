//! The dataset assembler: from annotation folder to train and validation sets.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::*;
use crate::{
  annotation::read_or_build, configuration::CurationConfig, document::DocumentSet,
  kpi::load_kpi_mapping,
};

/// `data_type` of the annotations the question-answering dataset is built from.
const TEXT_DATA_TYPE: &str = "TEXT";

/// Builds the curated train and validation sets.
///
/// The stages run in order:
///
/// 1. Read the aggregate annotation cache, or aggregate and clean the annotation folder
/// 2. Keep `TEXT` annotations only
/// 3. Load the extracted documents
/// 4. Build answerable examples, then unanswerable ones when enabled and a relevance file is set
/// 5. Deduplicate the union and [`split`] it
///
/// When no annotation survives, two empty sets are returned.
pub fn curate(config: &CurationConfig) -> Result<(Vec<Example>, Vec<Example>)> {
  config.validate()?;
  let mapping = load_kpi_mapping(&config.kpi_mapping_file)?;
  let annotations: Vec<_> = read_or_build(
    &config.agg_annotation,
    &config.annotation_folder,
    &mapping,
    &config.clean_options(),
  )?
  .into_iter()
  .filter(|annotation| annotation.data_type == TEXT_DATA_TYPE)
  .collect();
  debug!("Aggregated annotation data has been cleaned and filtered");

  if annotations.is_empty() {
    warn!("No usable annotations found, the curated dataset is empty");
    return Ok((Vec::new(), Vec::new()));
  }

  let documents = DocumentSet::load_dir(&config.extracted_text_json_folder)?;

  info!("Creating answerable examples");
  let outcome = create_answerable(&annotations, &documents, config.find_new_answerable);
  let mut examples = outcome.examples;

  if config.create_unanswerable {
    match &config.relevance_file {
      Some(relevance_file) => {
        info!("Creating unanswerable examples");
        let judgments = load_relevance_judgments(relevance_file)?;
        examples.extend(create_unanswerable(&outcome.annotations, &judgments));
        examples = dedupe(examples);
        info!("Combined {} answerable and unanswerable examples", examples.len());
      },
      None => warn!("No relevance file configured, skipping unanswerable examples"),
    }
  } else {
    info!("Using only answerable examples: {} examples", examples.len());
  }

  info!(
    "Splitting data into training and validation sets with validation ratio {}",
    config.val_ratio
  );
  let (train, val) = split(examples, config.val_ratio, config.shuffle_seed, config.split_seed)?;
  info!("Training set size: {}, Validation set size: {}", train.len(), val.len());
  Ok((train, val))
}

/// Shuffles `examples` and divides them into train and validation sets.
///
/// The shuffle uses `shuffle_seed`, or fresh entropy when it is `None`. The training set is then
/// a `split_seed`-seeded sample of `round((1 - val_ratio) * n)` examples in sampled order, and
/// the validation set holds the rest in shuffled order. With both seeds fixed the split is fully
/// reproducible; with an unseeded shuffle only the set sizes are.
///
/// ```
/// use presteps::dataset::{split, Example};
///
/// let examples: Vec<Example> = (0..10)
///   .map(|i| Example::unanswerable("a.pdf", format!("paragraph {i}"), "question?"))
///   .collect();
/// let (train, val) = split(examples, 0.2, Some(7), 42).unwrap();
/// assert_eq!((train.len(), val.len()), (8, 2));
/// ```
pub fn split(
  mut examples: Vec<Example>,
  val_ratio: f64,
  shuffle_seed: Option<u64>,
  split_seed: u64,
) -> Result<(Vec<Example>, Vec<Example>)> {
  if !(0.0..=1.0).contains(&val_ratio) {
    return Err(PrestepsError::InvalidRatio(val_ratio));
  }

  let mut shuffle_rng = match shuffle_seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_entropy(),
  };
  examples.shuffle(&mut shuffle_rng);

  let total = examples.len();
  let train_len = (((1.0 - val_ratio) * total as f64).round() as usize).min(total);
  let mut split_rng = StdRng::seed_from_u64(split_seed);
  let picked = rand::seq::index::sample(&mut split_rng, total, train_len);

  let mut slots: Vec<Option<Example>> = examples.into_iter().map(Some).collect();
  let train: Vec<Example> = picked.iter().filter_map(|idx| slots[idx].take()).collect();
  let val: Vec<Example> = slots.into_iter().flatten().collect();
  Ok((train, val))
}

/// Runs [`curate`] and writes both sets into `output_folder`.
///
/// The files are named `train_kpi_data_<dd-mm-YYYY>.xlsx` and `val_kpi_data_<dd-mm-YYYY>.xlsx`
/// after the current local date. Returns their paths.
pub fn run_kpi_curation(
  config: &CurationConfig,
  output_folder: impl AsRef<Path>,
) -> Result<(PathBuf, PathBuf)> {
  let output_folder = output_folder.as_ref();
  std::fs::create_dir_all(output_folder)?;

  let (train, val) = curate(config)?;
  let date = chrono::Local::now().format("%d-%m-%Y");
  let train_path = output_folder.join(format!("train_kpi_data_{date}.xlsx"));
  let val_path = output_folder.join(format!("val_kpi_data_{date}.xlsx"));
  write_examples(&train_path, &train)?;
  write_examples(&val_path, &val)?;
  Ok((train_path, val_path))
}
