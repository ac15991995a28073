//! FILENAME: tabular/src/source.rs
//! The tabular-storage collaborator.
//!
//! The engine never talks to a spreadsheet backend directly; it consumes
//! this trait. Row positions are 0-based data rows — the header row is
//! not addressable through `rows`/`find_rows`. Link-bearing ("rich")
//! cells are exposed separately so callers can substitute the link
//! target for the display text, per row or batched per column range.

use crate::cell::CellValue;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// One data row: cells positionally aligned to the header sequence.
pub type Row = Vec<CellValue>;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source unreachable: {0}")]
    Unreachable(String),

    #[error("tab not found: {0}")]
    TabNotFound(String),

    #[error("malformed source data: {0}")]
    Malformed(String),
}

/// Read access to one backing tab of tabular data.
///
/// Implementations must be safe to share across concurrent requests.
pub trait TabularSource: Send + Sync {
    /// The header row. Values are returned raw; callers trim and
    /// normalize through [`crate::HeaderMap`].
    fn headers(&self) -> Result<Vec<String>, SourceError>;

    /// Total number of data rows (header excluded).
    fn row_count(&self) -> Result<usize, SourceError>;

    /// A window of data rows starting at `start`, at most `count` long.
    /// A window past the end is an empty vec, not an error.
    fn rows(&self, start: usize, count: usize) -> Result<Vec<Row>, SourceError>;

    /// Positions of rows matching `needle`, in row order.
    /// `column: Some(i)` restricts the search to that column; `None`
    /// searches the whole row. Matching is case-insensitive; `exact`
    /// matches the entire cell, otherwise substring.
    fn find_rows(
        &self,
        column: Option<usize>,
        needle: &str,
        exact: bool,
    ) -> Result<Vec<usize>, SourceError>;

    /// The link target of a rich cell, if any.
    fn cell_link(&self, _row: usize, _col: usize) -> Result<Option<String>, SourceError> {
        Ok(None)
    }

    /// Link targets for one column over a row window, positionally
    /// aligned with the window. Default implementation loops over
    /// [`cell_link`]; backends with batch access should override.
    ///
    /// [`cell_link`]: TabularSource::cell_link
    fn column_links(
        &self,
        column: usize,
        start: usize,
        count: usize,
    ) -> Result<Vec<Option<String>>, SourceError> {
        (start..start + count)
            .map(|row| self.cell_link(row, column))
            .collect()
    }
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// An in-memory [`TabularSource`], used by tests and small fixtures.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    headers: Vec<String>,
    rows: Vec<Row>,
    links: FxHashMap<(usize, usize), String>,
}

impl MemorySource {
    pub fn new<S: Into<String>>(headers: Vec<S>, rows: Vec<Row>) -> Self {
        MemorySource {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
            links: FxHashMap::default(),
        }
    }

    /// Attaches a link target to a cell, making it a rich cell.
    pub fn with_link(mut self, row: usize, col: usize, url: &str) -> Self {
        self.links.insert((row, col), url.to_string());
        self
    }
}

impl TabularSource for MemorySource {
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

    fn cell_link(&self, row: usize, col: usize) -> Result<Option<String>, SourceError> {
        Ok(self.links.get(&(row, col)).cloned())
    }
}
