//! # Tables
//!
//! A minimal string table used for the feature matrix, the metrics
//! spreadsheet and their join. Cells are `Option<String>`: `None` is an empty
//! cell (a missing attribute, or a metric with no matching row).

use std::fmt::Write as _;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use crate::error::{InsightError, InsightResult};
use crate::extract::{FILENAME_KEY, FeatureAttribute, FeatureRecord};

pub type Cell = Option<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with empty cells, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell value at `row` in column `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column_index(name)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Tabular form of a list of records.
    ///
    /// `filename` comes first, then the recognized attributes in declaration
    /// order, then extra keys in first-seen order. An attribute column only
    /// exists if some record has a value for it.
    pub fn from_records(records: &[FeatureRecord]) -> Self {
        let mut columns = vec![FILENAME_KEY.to_string()];
        for attribute in FeatureAttribute::ALL {
            if records.iter().any(|r| r.get(attribute).is_some()) {
                columns.push(attribute.key().to_string());
            }
        }
        for record in records {
            for key in record.extras().keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = Table::new(columns);
        for record in records {
            let row = table
                .columns
                .iter()
                .map(|c| record.field(c).map(str::to_string))
                .collect();
            table.rows.push(row);
        }
        table
    }

    /// Read a comma-separated table with a mandatory header row.
    ///
    /// Header names are trimmed. Cell values are kept exactly as written, so a
    /// key of `" a.png"` does not match `a.png`; an empty field is an empty cell.
    pub fn from_csv_reader<R: Read>(reader: R, delimiter: u8) -> InsightResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = rdr
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
                h.trim().to_string()
            })
            .collect();
        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(InsightError::MetricsLoad("missing header row".to_string()));
        }

        let mut table = Table::new(columns);
        for (idx, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() > table.columns.len() {
                return Err(InsightError::MetricsLoad(format!(
                    "row {} has {} fields but the header has {}",
                    idx + 2,
                    record.len(),
                    table.columns.len()
                )));
            }
            let row = record
                .iter()
                .map(|v| (!v.is_empty()).then(|| v.to_string()))
                .collect();
            table.push_row(row);
        }
        Ok(table)
    }

    /// Serialize as CSV with a header row. Empty cells are written as empty fields.
    pub fn to_csv(&self) -> InsightResult<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| InsightError::io("flushing CSV", e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| {
            InsightError::io(
                "encoding CSV",
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Render a plain-text grid for the terminal.
    pub fn render(&self) -> String {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                self.rows
                    .iter()
                    .map(|r| display_width(r[i].as_deref().unwrap_or("")))
                    .chain(std::iter::once(display_width(name)))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        let line = |out: &mut String, cells: Vec<&str>| {
            let mut first = true;
            for (cell, width) in cells.iter().zip(&widths) {
                if !first {
                    out.push_str(" | ");
                }
                first = false;
                out.push_str(cell);
                out.push_str(&" ".repeat(width - display_width(cell)));
            }
            out.push('\n');
        };

        line(&mut out, self.columns.iter().map(String::as_str).collect());
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        line(&mut out, rule.iter().map(String::as_str).collect());
        for row in &self.rows {
            line(&mut out, row.iter().map(|c| c.as_deref().unwrap_or("")).collect());
        }
        let _ = write!(out, "({} rows × {} columns)", self.rows.len(), self.columns.len());
        out
    }
}

/// Terminal column width: wide CJK characters take two columns, combining marks none.
fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn sheet_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => None,
        other => {
            let text = other.to_string();
            (!text.is_empty()).then_some(text)
        }
    }
}

fn open(path: &Path) -> InsightResult<File> {
    File::open(path).map_err(|e| InsightError::io(format!("opening {}", path.display()), e))
}

/// Business metrics uploaded by the operator. Column names are untrusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsTable {
    table: Table,
}

impl MetricsTable {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    /// Load the first table of a metrics file: delimited text (`.csv`, `.txt`,
    /// `.tsv`) or the first sheet of a workbook (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`).
    pub fn load(path: &Path) -> InsightResult<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let metrics = match ext.as_str() {
            "csv" | "txt" => Self::from_reader(open(path)?, b',')?,
            "tsv" => Self::from_reader(open(path)?, b'\t')?,
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Self::from_workbook(path)?,
            other => {
                return Err(InsightError::MetricsLoad(format!(
                    "unsupported metrics file type '{}'",
                    other
                )));
            }
        };
        debug!(path = %path.display(), rows = metrics.len(), "loaded metrics");
        Ok(metrics)
    }

    /// Read the first sheet of a workbook. Its first row is the header.
    pub fn from_workbook(path: &Path) -> InsightResult<Self> {
        let load_err = |e: calamine::Error| {
            InsightError::MetricsLoad(format!("{}: {}", path.display(), e))
        };
        let mut workbook = open_workbook_auto(path).map_err(load_err)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| InsightError::MetricsLoad("workbook has no sheets".to_string()))?
            .map_err(load_err)?;

        let mut rows = range.rows();
        let columns: Vec<String> = rows
            .next()
            .map(|header| header.iter().map(|c| c.to_string().trim().to_string()).collect())
            .unwrap_or_default();
        if columns.iter().all(String::is_empty) {
            return Err(InsightError::MetricsLoad("missing header row".to_string()));
        }

        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row.iter().map(sheet_cell).collect());
        }
        Ok(Self::new(table))
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> InsightResult<Self> {
        Table::from_csv_reader(reader, delimiter).map(Self::new)
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        self.table.columns()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
