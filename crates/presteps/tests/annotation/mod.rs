use presteps::{
  annotation::{aggregate, clean, read_cache, read_or_build, CleanOptions},
  kpi::load_kpi_mapping,
};

use super::*;

#[traced_test]
#[test]
fn test_aggregate_empty_folder() -> TestResult<()> {
  let workspace = Workspace::new()?;
  assert!(aggregate(&workspace.annotations)?.is_empty());
  Ok(())
}

#[test]
fn test_aggregate_missing_folder() {
  let dir = tempdir().unwrap();
  assert!(matches!(
    aggregate(dir.path().join("missing")),
    Err(PrestepsError::InvalidInputPath(_))
  ));
}

#[traced_test]
#[test]
fn test_aggregate_skips_unusable_files() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[r#"Acme,a.pdf,[1],3,2016,5%,TEXT,"[""grew""]""#])?;
  std::fs::write(
    workspace.annotations.join("annotations_incomplete.csv"),
    "company,source_file\nAcme,a.pdf\n",
  )?;
  std::fs::write(workspace.annotations.join("notes.csv"), format!("{ANNOTATION_HEADER}\n"))?;

  let rows = aggregate(&workspace.annotations)?;
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].annotator, "annotations_a.csv");
  assert_eq!(rows[0].relevant_paragraphs, r#"["grew"]"#);
  Ok(())
}

#[traced_test]
#[test]
fn test_cleaning_keeps_only_valid_rows() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[
    r#"Acme,"a ,pdf",[3],3,2016,5%,TEXT,"[""grew by 5%""]""#,
    r#"CEZ,c.pdf,[1],3,2016,5%,TEXT,"[""grew by 5%""]""#,
    r#"Acme,a.pdf,[0],3,2016,5%,TEXT,"[""grew by 5%""]""#,
    r#"Acme,a.pdf,[1],3,2016,5%,TABLE,"[""grew by 5%""]""#,
    r#"Acme,a.pdf,[1],99,2016,5%,TEXT,"[""grew by 5%""]""#,
    r#"Acme,a.pdf,[1],3,2016,,TEXT,"[""grew by 5%""]""#,
    r#"Acme,a.pdf,[1],3,2016,5%,TEXT,grew by 5%"#,
    r#"Acme,a.pdf,[1],3,2016,5%,TEXT,"[""one"", ""two"", ""three""]""#,
    r#",a.pdf,[1],3,2016,5%,TEXT,"[""grew by 5%""]""#,
  ])?;

  let mapping = load_kpi_mapping(&workspace.mapping)?;
  let annotations = clean(&aggregate(&workspace.annotations)?, &mapping, &CleanOptions::default());
  assert_eq!(annotations.len(), 1);
  assert_eq!(annotations[0].source_file, "a.pdf");
  assert_eq!(annotations[0].source_page, 2);
  assert_eq!(annotations[0].question, "What was the growth?");
  Ok(())
}

#[traced_test]
#[test]
fn test_read_or_build_writes_a_readable_cache() -> TestResult<()> {
  let workspace = Workspace::new()?;
  workspace.annotate("annotations_a.csv", &[
    r#"Acme,a.pdf,"[4, 5]",7,2019,12 Mt,TEXT,"[""first snippet"", ""second snippet""]""#,
  ])?;
  let mapping = load_kpi_mapping(&workspace.mapping)?;

  let built =
    read_or_build(workspace.cache(), &workspace.annotations, &mapping, &CleanOptions::default())?;
  assert_eq!(built.len(), 2);
  assert_eq!(
    built.iter().map(|a| (a.source_page, a.relevant_paragraph.as_str())).collect::<Vec<_>>(),
    [(3, "first snippet"), (4, "second snippet")]
  );
  assert!(built.iter().all(|a| a.question == "What were the total emissions in year 2019?"));
  assert_eq!(read_cache(workspace.cache())?, built);
  Ok(())
}
