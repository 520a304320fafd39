use super::*;

/// The annotated growth KPI on the first page of `a.pdf`.
const GROWTH_ROW: &str = r#"Acme,a.pdf,[1],3,2016,5%,TEXT,"[""grew by 5%""]""#;

/// The annotated emissions KPI on the second page of `a.pdf`.
const EMISSIONS_ROW: &str =
  r#"Acme,a.pdf,[2],7,2016.0,12 Mt,TEXT,"[""Total emissions were 12 Mt""]""#;

const TWO_PAGE_DOCUMENT: &str = r#"{
  "0": { "p1": { "paragraph": "In 2016, revenue grew by 5%." } },
  "1": {
    "p1": { "paragraph": "Total emissions were 12 Mt in 2016." },
    "p2": { "paragraph": "Outlook remains stable for the group." }
  }
}"#;

fn sorted_paragraphs(examples: &[Example]) -> Vec<String> {
  let mut paragraphs: Vec<String> = examples.iter().map(|e| e.paragraph.clone()).collect();
  paragraphs.sort();
  paragraphs
}

#[traced_test]
#[test]
fn test_single_annotation_end_to_end() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[GROWTH_ROW])?;
  workspace.extract("a.json", r#"{"0":{"p1":{"paragraph":"In 2016, revenue grew by 5%."}}}"#)?;

  let config = workspace.config().with_val_ratio(0.0).with_create_unanswerable(false);
  let (train, val) = curate(&config)?;
  assert_eq!(train, vec![Example {
    source_file:  "a.pdf".into(),
    paragraph:    "In 2016, revenue grew by 5%.".into(),
    question:     "What was the growth?".into(),
    answer:       "5%".into(),
    answer_start: vec![25],
  }]);
  assert!(val.is_empty());
  assert!(workspace.cache().exists());
  Ok(())
}

#[traced_test]
#[test]
fn test_answer_at_paragraph_start_is_shifted() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace
    .annotate("annotations_a.csv", &[r#"Acme,a.pdf,[1],3,2016,5%,TEXT,"[""5% of staff""]""#])?;
  workspace.extract("a.json", r#"{"0":{"p1":{"paragraph":"5% of staff work remotely."}}}"#)?;

  let config = workspace.config().with_val_ratio(0.0).with_create_unanswerable(false);
  let (train, _) = curate(&config)?;
  assert_eq!(train.len(), 1);
  assert_eq!(train[0].paragraph, " 5% of staff work remotely.");
  assert_eq!(train[0].answer_start, vec![1]);
  Ok(())
}

#[traced_test]
#[test]
fn test_multi_paragraph_annotation_pairs_pages() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[
    r#"Acme,a.pdf,"[1, 2]",3,2016,5%,TEXT,"[""grew by 5%"", ""5% of staff""]""#,
  ])?;
  workspace.extract(
    "a_output.json",
    r#"{
      "0": ["In 2016, revenue grew by 5%."],
      "1": ["Of our workforce, 5% of staff are remote."]
    }"#,
  )?;

  let config = workspace
    .config()
    .with_val_ratio(0.0)
    .with_find_new_answerable(false)
    .with_create_unanswerable(false);
  let (train, _) = curate(&config)?;
  assert_eq!(sorted_paragraphs(&train), [
    "In 2016, revenue grew by 5%.",
    "Of our workforce, 5% of staff are remote.",
  ]);
  Ok(())
}

#[traced_test]
#[test]
fn test_year_question_and_duplicates() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[GROWTH_ROW, EMISSIONS_ROW])?;
  workspace.annotate("annotations_b.csv", &[GROWTH_ROW])?;
  workspace.extract("a.json", TWO_PAGE_DOCUMENT)?;

  let config = workspace
    .config()
    .with_val_ratio(0.0)
    .with_find_new_answerable(false)
    .with_create_unanswerable(false);
  let (train, _) = curate(&config)?;
  assert_eq!(train.len(), 2);
  let emissions = train.iter().find(|example| example.answer == "12 Mt").ok_or("no emissions")?;
  assert_eq!(emissions.question, "What were the total emissions in year 2016?");
  assert_eq!(emissions.answer_start, vec![21]);
  Ok(())
}

#[traced_test]
#[test]
fn test_seeded_curation_is_reproducible_and_uses_the_cache() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[GROWTH_ROW, EMISSIONS_ROW])?;
  workspace.extract("a.json", TWO_PAGE_DOCUMENT)?;

  let config = workspace.config().with_val_ratio(0.5).with_shuffle_seed(Some(7));
  let first = curate(&config)?;
  assert!(workspace.cache().exists());

  // A second run must come from the cache alone.
  std::fs::remove_dir_all(&workspace.annotations)?;
  let second = curate(&config)?;
  assert_eq!(first, second);
  assert_eq!((first.0.len(), first.1.len()), (1, 1));
  Ok(())
}

#[traced_test]
#[test]
fn test_unanswerable_examples_skip_known_positives() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[GROWTH_ROW])?;
  workspace.extract("a.json", TWO_PAGE_DOCUMENT)?;
  let relevance = workspace.path().join("relevance.csv");
  std::fs::write(
    &relevance,
    "page,pdf_name,unique_paragraph_id,paragraph,kpi_id,question,paragraph_relevance_flag,\
     paragraph_relevance_score(for_label=1)\n\
     0,a.pdf,0_0,\"In 2016, revenue grew by 5%.\",3,What was the growth?,1,0.98\n\
     0,a.pdf,0_0,\"In 2016, revenue grew by 5%.\",3,What was the revenue growth?,1,0.64\n\
     1,a.pdf,1_1,Outlook remains stable for the group.,3,What was the growth?,1,0.71\n\
     1,a.pdf,1_0,Total emissions were 12 Mt in 2016.,3,What was the growth?,0,0.12\n\
     0,b.pdf,0_0,Unannotated document paragraph.,3,What was the growth?,1,0.88\n",
  )?;

  let config = workspace
    .config()
    .with_val_ratio(0.0)
    .with_find_new_answerable(false)
    .with_relevance_file(&relevance);
  let (train, _) = curate(&config)?;
  assert_eq!(sorted_paragraphs(&train), [
    "In 2016, revenue grew by 5%.",
    "In 2016, revenue grew by 5%.",
  ]);
  let unanswerable = train.iter().find(|example| !example.is_answerable()).ok_or("missing")?;
  assert_eq!(unanswerable.answer, "");
  assert_eq!(unanswerable.question, "What was the revenue growth?");
  Ok(())
}

#[traced_test]
#[test]
fn test_run_kpi_curation_writes_both_sets() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[GROWTH_ROW, EMISSIONS_ROW])?;
  workspace.extract("a.json", TWO_PAGE_DOCUMENT)?;

  let config = workspace
    .config()
    .with_val_ratio(0.5)
    .with_shuffle_seed(Some(1))
    .with_create_unanswerable(false);
  let output = workspace.path().join("curated");
  let (train_path, val_path) = run_kpi_curation(&config, &output)?;

  let file_name = |path: &Path| path.file_name().unwrap().to_string_lossy().into_owned();
  assert!(file_name(&train_path).starts_with("train_kpi_data_"));
  assert!(file_name(&val_path).starts_with("val_kpi_data_"));

  let mut examples = read_examples(&train_path)?;
  examples.extend(read_examples(&val_path)?);
  assert_eq!(sorted_paragraphs(&examples), [
    "In 2016, revenue grew by 5%.",
    "Total emissions were 12 Mt in 2016.",
  ]);
  assert!(examples.iter().all(Example::is_answerable));
  Ok(())
}

#[test]
fn test_missing_extraction_folder_is_fatal() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[GROWTH_ROW])?;
  std::fs::remove_dir(&workspace.extracted)?;

  let result = curate(&workspace.config());
  assert!(matches!(result, Err(PrestepsError::InvalidInputPath(_))));
  Ok(())
}

#[test]
fn test_invalid_ratio_is_rejected() -> TestResult<()> {
  let workspace = Workspace::new()?;
  let result = curate(&workspace.config().with_val_ratio(1.5));
  assert!(matches!(result, Err(PrestepsError::InvalidRatio(_))));
  Ok(())
}
