//! FILENAME: aggregate-engine/src/snapshot.rs
//! Typed snapshot parsing for the dashboard layers.
//!
//! Each dashboard layer is parsed once per cache window into a vector of
//! typed records, independent of per-request filters. Column resolution
//! is fuzzy; an unresolvable column degrades to the field's default
//! (empty string / zero) and is logged once, never raised — a dashboard
//! must keep rendering even when a sheet column is renamed.

use crate::definition::{BacklogColumns, RankingColumns, RollupColumns};
use serde::{Deserialize, Serialize};
use tabular::{parse_fraction, parse_quantity, CellValue, HeaderMap, Row, SourceError, TabularSource};
use tracing::warn;

/// One row of the weekly maintenance-plan tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupRecord {
    pub branch: String,
    pub period: String,
    pub week: String,
    pub planned: f64,
    pub completed: f64,
    pub pending: f64,

    /// Completion rate as a 0–1 fraction.
    pub completion_rate: f64,
}

/// One row of the damage-report tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    pub asset: String,
    pub category: String,
    pub magnitude: f64,
}

/// One row of the open-tickets tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogRecord {
    pub ticket: String,
    pub origin: String,
    pub status: String,
    pub days_open: f64,
}

/// Resolves one expected column, logging the miss once per snapshot build.
fn resolve_logged(map: &HeaderMap, name: &str, layer: &str) -> Option<usize> {
    let idx = map.resolve(name);
    if idx.is_none() {
        warn!(column = name, layer, "dashboard column not found; defaulting");
    }
    idx
}

fn text_at(row: &Row, idx: Option<usize>) -> String {
    idx.and_then(|i| row.get(i)).map(CellValue::as_text).unwrap_or_default()
}

fn quantity_at(row: &Row, idx: Option<usize>) -> f64 {
    idx.and_then(|i| row.get(i)).map(parse_quantity).unwrap_or(0.0)
}

fn fraction_at(row: &Row, idx: Option<usize>) -> f64 {
    idx.and_then(|i| row.get(i)).map(parse_fraction).unwrap_or(0.0)
}

/// Reads the whole data extent of a dashboard tab.
fn read_all(source: &dyn TabularSource) -> Result<(HeaderMap, Vec<Row>), SourceError> {
    let map = HeaderMap::new(&source.headers()?);
    let total = source.row_count()?;
    let rows = source.rows(0, total)?;
    Ok((map, rows))
}

pub fn parse_rollup(
    source: &dyn TabularSource,
    cols: &RollupColumns,
) -> Result<Vec<RollupRecord>, SourceError> {
    let (map, rows) = read_all(source)?;
    let branch = resolve_logged(&map, &cols.branch, "rollup");
    let period = resolve_logged(&map, &cols.period, "rollup");
    let week = resolve_logged(&map, &cols.week, "rollup");
    let planned = resolve_logged(&map, &cols.planned, "rollup");
    let completed = resolve_logged(&map, &cols.completed, "rollup");
    let pending = resolve_logged(&map, &cols.pending, "rollup");
    let rate = resolve_logged(&map, &cols.completion_rate, "rollup");

    Ok(rows
        .iter()
        .map(|row| RollupRecord {
            branch: text_at(row, branch),
            period: text_at(row, period),
            week: text_at(row, week),
            planned: quantity_at(row, planned),
            completed: quantity_at(row, completed),
            pending: quantity_at(row, pending),
            completion_rate: fraction_at(row, rate),
        })
        .collect())
}

pub fn parse_ranking(
    source: &dyn TabularSource,
    cols: &RankingColumns,
) -> Result<Vec<RankedRecord>, SourceError> {
    let (map, rows) = read_all(source)?;
    let asset = resolve_logged(&map, &cols.asset, "ranking");
    let category = resolve_logged(&map, &cols.category, "ranking");
    let magnitude = resolve_logged(&map, &cols.magnitude, "ranking");

    Ok(rows
        .iter()
        .map(|row| RankedRecord {
            asset: text_at(row, asset),
            category: text_at(row, category),
            magnitude: quantity_at(row, magnitude),
        })
        .collect())
}

pub fn parse_backlog(
    source: &dyn TabularSource,
    cols: &BacklogColumns,
) -> Result<Vec<BacklogRecord>, SourceError> {
    let (map, rows) = read_all(source)?;
    let ticket = resolve_logged(&map, &cols.ticket, "backlog");
    let origin = resolve_logged(&map, &cols.origin, "backlog");
    let status = resolve_logged(&map, &cols.status, "backlog");
    let days_open = resolve_logged(&map, &cols.days_open, "backlog");

    Ok(rows
        .iter()
        .map(|row| BacklogRecord {
            ticket: text_at(row, ticket),
            origin: text_at(row, origin),
            status: text_at(row, status),
            days_open: quantity_at(row, days_open),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabular::MemorySource;

    #[test]
    fn test_parse_rollup_locale_numbers() {
        let source = MemorySource::new(
            vec!["Filial", "Mês", "Semana", "Programado", "Concluído", "Pendente", "% Conclusão"],
            vec![
                vec![
                    "Santos".into(),
                    "Julho".into(),
                    "2026-W30".into(),
                    CellValue::Number(40.0),
                    "35".into(),
                    "5".into(),
                    "87,5%".into(),
                ],
            ],
        );
        let records = parse_rollup(&source, &RollupColumns::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].branch, "Santos");
        assert_eq!(records[0].period, "Julho");
        assert_eq!(records[0].week, "2026-W30");
        assert_eq!(records[0].planned, 40.0);
        assert_eq!(records[0].completed, 35.0);
        assert_eq!(records[0].completion_rate, 0.875);
    }

    #[test]
    fn test_parse_with_missing_column_defaults() {
        // Neither "Mês" nor "% Conclusão" present: both default.
        let source = MemorySource::new(
            vec!["Filial", "Semana", "Programado", "Concluído", "Pendente"],
            vec![vec!["Santos".into(), "W1".into(), "1".into(), "1".into(), "0".into()]],
        );
        let records = parse_rollup(&source, &RollupColumns::default()).unwrap();
        assert_eq!(records[0].completion_rate, 0.0);
        assert_eq!(records[0].period, "");
        assert_eq!(records[0].week, "W1");
        assert_eq!(records[0].planned, 1.0);
    }

    #[test]
    fn test_parse_backlog_fuzzy_headers() {
        let source = MemorySource::new(
            vec!["CHAMADO", "origem ", "STATUS", "Dias em aberto"],
            vec![vec!["T-1".into(), "Call Center".into(), "Aberto".into(), "4".into()]],
        );
        let records = parse_backlog(&source, &BacklogColumns::default()).unwrap();
        assert_eq!(records[0].ticket, "T-1");
        assert_eq!(records[0].days_open, 4.0);
    }
}
