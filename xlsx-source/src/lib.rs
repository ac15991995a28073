//! FILENAME: xlsx-source/src/lib.rs
//! An XLSX-backed [`TabularSource`].
//!
//! One `XlsxSource` wraps one sheet of a workbook. The sheet is read
//! eagerly at construction: the engine's access pattern is many small
//! windows over the same tab within a cache interval, so holding the
//! snapshot in memory beats reopening the archive per call. The first
//! row is the header row; everything below it is data.
//!
//! XLSX cells carry no link metadata through this reader, so the
//! rich-cell methods keep their default `None` behavior and layers
//! served from files simply return display text for link columns.

mod error;

pub use error::XlsxSourceError;

use calamine::{open_workbook, Data, Reader, Xlsx};
use std::path::Path;
use tabular::{CellValue, Row, SourceError, TabularSource};

fn convert(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("{:?}", e)),
    }
}

/// In-memory snapshot of one workbook sheet.
#[derive(Debug)]
pub struct XlsxSource {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl XlsxSource {
    /// Opens `path` and snapshots the sheet named `tab`.
    pub fn open(path: &Path, tab: &str) -> Result<Self, XlsxSourceError> {
        let mut workbook: Xlsx<_> = open_workbook(path)?;
        if !workbook.sheet_names().iter().any(|name| name == tab) {
            return Err(XlsxSourceError::SheetNotFound(tab.to_string()));
        }
        let range = workbook
            .worksheet_range(tab)
            .map_err(|e| XlsxSourceError::InvalidFormat(e.to_string()))?;

        let mut iter = range.rows();
        let headers: Vec<String> = iter
            .next()
            .map(|row| row.iter().map(|c| convert(c).as_text()).collect())
            .unwrap_or_default();
        let rows: Vec<Row> = iter
            .map(|row| row.iter().map(convert).collect())
            .collect();

        Ok(XlsxSource { headers, rows })
    }
}

impl TabularSource for XlsxSource {
    fn headers(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.headers.clone())
    }

    fn row_count(&self) -> Result<usize, SourceError> {
        Ok(self.rows.len())
    }

    fn rows(&self, start: usize, count: usize) -> Result<Vec<Row>, SourceError> {
        if start >= self.rows.len() {
            return Ok(Vec::new());
        }
        let end = (start + count).min(self.rows.len());
        Ok(self.rows[start..end].to_vec())
    }

    fn find_rows(
        &self,
        column: Option<usize>,
        needle: &str,
        exact: bool,
    ) -> Result<Vec<usize>, SourceError> {
        let needle_lower = needle.trim().to_lowercase();
        if needle_lower.is_empty() {
            return Ok(Vec::new());
        }

        let mut positions = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let hit = match column {
                Some(c) => row
                    .get(c)
                    .map(|cell| cell.matches(&needle_lower, exact))
                    .unwrap_or(false),
                None => row.iter().any(|cell| cell.matches(&needle_lower, exact)),
            };
            if hit {
                positions.push(i);
            }
        }
        Ok(positions)
    }
}
