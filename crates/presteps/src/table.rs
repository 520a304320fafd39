//! Spreadsheet and delimited-text tables.
//!
//! Every tabular input of the pipeline (annotation spreadsheets, the KPI mapping, relevance
//! judgments, the aggregate cache) is read into a [`Table`] of text cells, and every tabular
//! output is written from one. Cells keep their surrounding whitespace; [`Record::get`] trims
//! it and [`Record::get_raw`] does not. The file extension decides the format:
//!
//! - `.xlsx`, `.xlsm`, `.xls`, `.xlsb` are read with calamine, `.xlsx` is written with
//!   rust_xlsxwriter
//! - anything else is treated as delimited text (comma, semicolon or tab, detected from the
//!   header line)
//!
//! # Examples
//!
//! ```no_run
//! use presteps::table::Table;
//!
//! # fn main() -> presteps::error::Result<()> {
//! let table = Table::read("kpi_mapping.csv")?;
//! table.require_columns("kpi_mapping.csv", &["kpi_id", "question"])?;
//! for record in table.records() {
//!   println!("{} -> {}", record.get("kpi_id"), record.get("question"));
//! }
//! # Ok(())
//! # }
//! ```

use std::{
  fs::File,
  io::{BufRead, BufReader},
};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;

use super::*;

/// Extensions that are opened as spreadsheets rather than delimited text.
const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "xlsb"];

/// A rectangular table of text cells with a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
  /// Column names in file order.
  pub headers: Vec<String>,
  /// Data rows, each exactly as wide as `headers`.
  pub rows:    Vec<Vec<String>>,
}

/// A borrowed view of one table row that resolves cells by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
  /// The table the row belongs to.
  table: &'a Table,
  /// The row cells.
  row:   &'a [String],
}

impl<'a> Record<'a> {
  /// Returns the trimmed cell under `column`, or `""` when the table has no such column.
  pub fn get(&self, column: &str) -> &'a str { self.get_raw(column).trim() }

  /// Returns the cell under `column` as stored, or `""` when the table has no such column.
  pub fn get_raw(&self, column: &str) -> &'a str { self.try_raw(column).unwrap_or("") }

  /// Returns the trimmed cell under `column` if the column exists.
  pub fn try_get(&self, column: &str) -> Option<&'a str> { self.try_raw(column).map(str::trim) }

  /// Whether every cell of the row is empty or whitespace.
  pub fn is_blank(&self) -> bool { self.row.iter().all(|cell| cell.trim().is_empty()) }

  fn try_raw(&self, column: &str) -> Option<&'a str> {
    self.table.column(column).and_then(|idx| self.row.get(idx)).map(String::as_str)
  }
}

impl Table {
  /// Creates an empty table with the given header row.
  pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
    Self { headers: headers.into_iter().map(Into::into).collect(), rows: Vec::new() }
  }

  /// Reads the first sheet of a spreadsheet or a delimited text file.
  pub fn read(path: impl AsRef<Path>) -> Result<Self> { Self::read_sheet(path, None) }

  /// Reads a table, preferring the sheet named `sheet` for spreadsheets.
  ///
  /// Falls back to the first sheet when the workbook has no sheet of that name. The sheet name
  /// is ignored for delimited text.
  pub fn read_sheet(path: impl AsRef<Path>, sheet: Option<&str>) -> Result<Self> {
    let path = path.as_ref();
    trace!("Reading table from {path:?}");
    let mut table =
      if is_spreadsheet(path) { read_spreadsheet(path, sheet)? } else { read_delimited(path)? };
    table.align_row_lengths();
    debug!("Read {} rows with columns {:?} from {path:?}", table.rows.len(), table.headers);
    Ok(table)
  }

  /// Writes the table as `.xlsx` or, for any other extension, as comma separated text.
  pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    if path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext == "xlsx") {
      self.write_xlsx(path)?;
    } else {
      self.write_csv(path)?;
    }
    debug!("Wrote {} rows to {path:?}", self.rows.len());
    Ok(())
  }

  /// Appends a row, padding or truncating it to the header width.
  pub fn push_row(&mut self, mut row: Vec<String>) {
    row.resize(self.headers.len(), String::new());
    self.rows.push(row);
  }

  /// Index of the column named `name`.
  pub fn column(&self, name: &str) -> Option<usize> { self.headers.iter().position(|h| h == name) }

  /// Fails with [`PrestepsError::MissingColumns`] unless every column in `columns` is present.
  pub fn require_columns(&self, file: &str, columns: &[&str]) -> Result<()> {
    let missing: Vec<String> = columns
      .iter()
      .filter(|column| self.column(column).is_none())
      .map(|column| (*column).to_string())
      .collect();
    if missing.is_empty() {
      Ok(())
    } else {
      Err(PrestepsError::MissingColumns { file: file.to_string(), columns: missing })
    }
  }

  /// Iterates over the data rows as [`Record`]s.
  pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
    self.rows.iter().map(move |row| Record { table: self, row })
  }

  /// Number of data rows.
  pub fn len(&self) -> usize { self.rows.len() }

  /// Whether the table has no data rows.
  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// Pads the header and every row to a common width.
  fn align_row_lengths(&mut self) {
    let width = self.rows.iter().map(Vec::len).chain([self.headers.len()]).max().unwrap_or(0);
    self.headers.resize(width, String::new());
    for row in &mut self.rows {
      row.resize(width, String::new());
    }
  }

  /// Writes the first worksheet of a new workbook.
  fn write_xlsx(&self, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in self.headers.iter().enumerate() {
      worksheet.write_string(0, col as u16, header)?;
    }
    for (row_idx, row) in self.rows.iter().enumerate() {
      for (col, cell) in row.iter().enumerate() {
        if !cell.is_empty() {
          worksheet.write_string(row_idx as u32 + 1, col as u16, cell)?;
        }
      }
    }
    workbook.save(path)?;
    Ok(())
  }

  /// Writes comma separated text with a header line.
  fn write_csv(&self, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&self.headers)?;
    for row in &self.rows {
      writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
  }
}

/// Renders a spreadsheet cell as text; integral floats lose their fractional part.
pub fn cell_to_string(cell: &Data) -> String {
  match cell {
    Data::Empty => String::new(),
    Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 =>
      format!("{}", *value as i64),
    _ => cell.to_string(),
  }
}

/// Whether `path` should be opened as a spreadsheet.
fn is_spreadsheet(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Reads one worksheet into a table, skipping blank rows.
fn read_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<Table> {
  let mut workbook = open_workbook_auto(path)?;
  let sheet_names = workbook.sheet_names();
  let sheet_name = match sheet.filter(|name| sheet_names.iter().any(|s| s == name)) {
    Some(name) => name.to_string(),
    None => match sheet_names.first() {
      Some(first) => first.clone(),
      None => return Ok(Table::default()),
    },
  };
  let range = workbook.worksheet_range(&sheet_name)?;

  let mut rows = range.rows();
  let Some(header_row) = rows.next() else {
    return Ok(Table::default());
  };
  let mut table =
    Table::new(header_row.iter().map(|cell| cell_to_string(cell).trim().to_string()));
  table.rows = rows
    .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
    .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
    .collect();
  Ok(table)
}

/// Reads delimited text into a table, skipping blank rows.
fn read_delimited(path: &Path) -> Result<Table> {
  let delimiter = detect_delimiter(path)?;
  let mut reader = csv::ReaderBuilder::new()
    .delimiter(delimiter)
    .has_headers(true)
    .flexible(true)
    .from_path(path)?;

  let mut table = Table::new(reader.headers()?.iter().map(|value| value.trim().to_string()));
  for record in reader.records() {
    let values: Vec<String> = record?.iter().map(str::to_string).collect();
    if values.iter().all(|value| value.trim().is_empty()) {
      continue;
    }
    table.rows.push(values);
  }
  Ok(table)
}

/// Picks the most frequent of tab, comma and semicolon on the first non-blank line.
fn detect_delimiter(path: &Path) -> Result<u8> {
  let reader = BufReader::new(File::open(path)?);
  for line in reader.lines().take(5) {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    let counts = [
      (b',', line.matches(',').count()),
      (b';', line.matches(';').count()),
      (b'\t', line.matches('\t').count()),
    ];
    if let Some((delimiter, count)) = counts.iter().max_by_key(|(_, count)| *count) {
      if *count > 0 {
        return Ok(*delimiter);
      }
    }
  }
  Ok(b',')
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Table {
    let mut table = Table::new(["kpi_id", "question", "add_year"]);
    table.push_row(vec!["1".into(), "What is the company name?".into(), "FALSE".into()]);
    table.push_row(vec!["2.1".into(), "What are the \"target\" years, if any?".into()]);
    table
  }

  #[traced_test]
  #[test]
  fn test_csv_write_then_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("mapping.csv");
    sample().write(&path).unwrap();

    let read = Table::read(&path).unwrap();
    assert_eq!(read, sample());
    let record = read.records().nth(1).unwrap();
    assert_eq!(record.get("question"), "What are the \"target\" years, if any?");
    assert_eq!(record.get("add_year"), "");
    assert_eq!(record.get("missing"), "");
    assert!(record.try_get("missing").is_none());
  }

  #[traced_test]
  #[test]
  fn test_xlsx_write_then_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mapping.xlsx");
    sample().write(&path).unwrap();

    let read = Table::read_sheet(&path, Some("no such sheet")).unwrap();
    assert_eq!(read.headers, sample().headers);
    assert_eq!(read.len(), 2);
    assert_eq!(read.rows[0][2], "FALSE");
    assert_eq!(read.rows[1][0], "2.1");
  }

  #[traced_test]
  #[test]
  fn test_semicolon_delimiter_and_blank_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("judgments.csv");
    std::fs::write(&path, "page;pdf_name\n 3 ;a.pdf\n;\n4;b.pdf\n").unwrap();

    let table = Table::read(&path).unwrap();
    assert_eq!(table.headers, vec!["page", "pdf_name"]);
    assert_eq!(table.rows, vec![vec![" 3 ", "a.pdf"], vec!["4", "b.pdf"]]);
    let record = table.records().next().unwrap();
    assert_eq!(record.get("page"), "3");
    assert_eq!(record.get_raw("page"), " 3 ");
  }

  #[test]
  fn test_require_columns_lists_every_missing_column() {
    let err =
      sample().require_columns("mapping.csv", &["kpi_id", "kpi_category", "x"]).unwrap_err();
    match err {
      PrestepsError::MissingColumns { file, columns } => {
        assert_eq!(file, "mapping.csv");
        assert_eq!(columns, vec!["kpi_category", "x"]);
      },
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn test_cell_to_string() {
    assert_eq!(cell_to_string(&Data::Float(2016.0)), "2016");
    assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
    assert_eq!(cell_to_string(&Data::String("  padded ".into())), "  padded ");
    assert_eq!(cell_to_string(&Data::Empty), "");
  }
}
