//! FILENAME: aggregate-engine/src/backlog.rs
//! Backlog metrics over the open-tickets snapshot.
//!
//! Records are partitioned by a terminal-status predicate; the metrics
//! are computed over the open partition only and are returned alongside
//! the record list, never instead of it.

use crate::definition::{constraint_matches, DashboardFilters};
use crate::snapshot::BacklogRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabular::normalize_header;

/// Derived statistics over currently-open tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogMetrics {
    /// Number of open (non-terminal-status) tickets.
    pub total_pending: usize,

    /// Mean days-open across the open partition; zero when it is empty.
    pub avg_days_open: f64,

    /// Open-ticket counts by origin. BTreeMap keeps the serialized
    /// breakdown deterministic.
    pub by_origin: BTreeMap<String, usize>,
}

/// Whether a status label marks a ticket closed. Compared on the
/// normalized form so casing and accents don't matter.
pub fn is_terminal_status(status: &str) -> bool {
    matches!(
        normalize_header(status).as_str(),
        "concluido" | "fechado" | "cancelado" | "encerrado" | "resolvido"
    )
}

fn matches(record: &BacklogRecord, filters: &DashboardFilters) -> bool {
    constraint_matches(&filters.status, &record.status)
        && constraint_matches(&filters.origin, &record.origin)
}

/// Filtered records in snapshot order, open and closed alike.
pub fn filter_backlog(records: &[BacklogRecord], filters: &DashboardFilters) -> Vec<BacklogRecord> {
    records.iter().filter(|r| matches(r, filters)).cloned().collect()
}

/// Computes backlog metrics over the filtered records. Closed tickets
/// are excluded from every figure.
pub fn backlog_metrics(records: &[BacklogRecord], filters: &DashboardFilters) -> BacklogMetrics {
    let open: Vec<&BacklogRecord> = records
        .iter()
        .filter(|r| matches(r, filters) && !is_terminal_status(&r.status))
        .collect();

    let total_pending = open.len();
    let avg_days_open = if open.is_empty() {
        0.0
    } else {
        open.iter().map(|r| r.days_open).sum::<f64>() / open.len() as f64
    };

    let mut by_origin = BTreeMap::new();
    for record in &open {
        let origin = if record.origin.is_empty() {
            "(unknown)".to_string()
        } else {
            record.origin.clone()
        };
        *by_origin.entry(origin).or_insert(0) += 1;
    }

    BacklogMetrics {
        total_pending,
        avg_days_open,
        by_origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ticket: &str, origin: &str, status: &str, days_open: f64) -> BacklogRecord {
        BacklogRecord {
            ticket: ticket.into(),
            origin: origin.into(),
            status: status.into(),
            days_open,
        }
    }

    #[test]
    fn test_metrics_exclude_closed() {
        // Open days {2, 4, 6} and two closed tickets: pending 3, mean 4.
        let records = vec![
            record("t1", "Call Center", "Aberto", 2.0),
            record("t2", "Campo", "Em Andamento", 4.0),
            record("t3", "Call Center", "Aberto", 6.0),
            record("t4", "Campo", "Concluído", 30.0),
            record("t5", "Campo", "Cancelado", 1.0),
        ];
        let metrics = backlog_metrics(&records, &DashboardFilters::default());
        assert_eq!(metrics.total_pending, 3);
        assert_eq!(metrics.avg_days_open, 4.0);
        assert_eq!(metrics.by_origin.get("Call Center"), Some(&2));
        assert_eq!(metrics.by_origin.get("Campo"), Some(&1));
    }

    #[test]
    fn test_empty_open_partition_means_zero_average() {
        let records = vec![record("t1", "Campo", "Fechado", 9.0)];
        let metrics = backlog_metrics(&records, &DashboardFilters::default());
        assert_eq!(metrics.total_pending, 0);
        assert_eq!(metrics.avg_days_open, 0.0);
        assert!(metrics.by_origin.is_empty());
    }

    #[test]
    fn test_terminal_status_is_normalized() {
        assert!(is_terminal_status("CONCLUÍDO"));
        assert!(is_terminal_status(" fechado "));
        assert!(!is_terminal_status("Aberto"));
    }

    #[test]
    fn test_origin_filter_applies_to_metrics_and_list() {
        let records = vec![
            record("t1", "Campo", "Aberto", 2.0),
            record("t2", "Call Center", "Aberto", 8.0),
        ];
        let filters = DashboardFilters {
            origin: Some("campo".into()),
            ..Default::default()
        };
        let metrics = backlog_metrics(&records, &filters);
        assert_eq!(metrics.total_pending, 1);
        assert_eq!(filter_backlog(&records, &filters).len(), 1);
    }
}
