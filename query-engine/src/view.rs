//! FILENAME: query-engine/src/view.rs
//! Record projection and the query result envelope.

use aggregate_engine::{BacklogMetrics, CategoryTotal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabular::{normalize_header, CellValue, Row};

/// One projected record: column name to cell value. BTreeMap keeps the
/// serialized field order deterministic.
pub type Record = BTreeMap<String, CellValue>;

/// Projects raw rows into records.
///
/// Headers are trimmed; blank headers and excluded columns are dropped.
/// Exclusion compares normalized names, the allowlist compares trimmed
/// names exactly. Short rows read as empty cells.
pub fn rows_to_records(
    headers: &[String],
    rows: &[Row],
    exclude: &[String],
    allowlist: Option<&[String]>,
) -> Vec<Record> {
    let excluded: Vec<String> = exclude.iter().map(|c| normalize_header(c)).collect();

    let keep: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, header)| {
            let name = header.trim();
            if name.is_empty() {
                return None;
            }
            if excluded.iter().any(|e| *e == normalize_header(name)) {
                return None;
            }
            if let Some(allow) = allowlist {
                if !allow.iter().any(|a| a.trim() == name) {
                    return None;
                }
            }
            Some((i, name.to_string()))
        })
        .collect();

    rows.iter()
        .map(|row| {
            keep.iter()
                .map(|(i, name)| {
                    let cell = row.get(*i).cloned().unwrap_or(CellValue::Empty);
                    (name.clone(), cell)
                })
                .collect()
        })
        .collect()
}

/// Layer-specific payload returned next to the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerExtras {
    /// Ranked category totals of a ranking layer.
    Ranking { categories: Vec<CategoryTotal> },

    /// Derived backlog statistics of a backlog layer.
    Backlog { metrics: BacklogMetrics },
}

/// What a query returns: the page of records plus response metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub layer: String,
    pub records: Vec<serde_json::Value>,

    /// Strategy-specific total: match count for searches and scans, the
    /// full source extent for cursor and chunk fetches.
    pub total: usize,

    /// Whether the page came out of the result cache.
    pub cached: bool,

    /// When the backing cache entry lapses.
    pub cache_expires_at: DateTime<Utc>,

    pub extras: Option<LayerExtras>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_projection_trims_and_skips_blank_headers() {
        let records = rows_to_records(
            &headers(&[" Nº Eletro ", "", "Status"]),
            &[vec!["42".into(), "ignored".into(), "Ativo".into()]],
            &[],
            None,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("Nº Eletro"), Some(&CellValue::Text("42".into())));
        assert_eq!(records[0].get("Status"), Some(&CellValue::Text("Ativo".into())));
        assert_eq!(records[0].len(), 2);
    }

    #[test]
    fn test_excluded_column_matches_normalized() {
        let records = rows_to_records(
            &headers(&["Nº Eletro", "Nº PARADA NOVO"]),
            &[vec!["42".into(), "P-9".into()]],
            &["nº parada novo".to_string()],
            None,
        );
        assert!(!records[0].contains_key("Nº PARADA NOVO"));
    }

    #[test]
    fn test_allowlist_is_exact() {
        let records = rows_to_records(
            &headers(&["Nº Eletro", "Endereço", "Status"]),
            &[vec!["42".into(), "Av. X".into(), "Ativo".into()]],
            &[],
            Some(&["Status".to_string()]),
        );
        assert_eq!(records[0].len(), 1);
        assert!(records[0].contains_key("Status"));
    }

    #[test]
    fn test_short_rows_pad_with_empty() {
        let records = rows_to_records(
            &headers(&["A", "B"]),
            &[vec!["1".into()]],
            &[],
            None,
        );
        assert_eq!(records[0].get("B"), Some(&CellValue::Empty));
    }
}
