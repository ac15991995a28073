//! FILENAME: aggregate-engine/src/rollup.rs
//! Periodic (branch, period) roll-ups over the maintenance snapshot.
//!
//! Groups keep first-encountered order so that the output follows the
//! sheet's own chronology rather than an arbitrary hash order.

use crate::definition::{constraint_matches, DashboardFilters};
use crate::snapshot::RollupRecord;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// One (branch, period) group: summed counts, averaged completion rate.
/// A group spans the weekly rows sharing its branch and period labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupGroup {
    pub branch: String,
    pub period: String,
    pub planned: f64,
    pub completed: f64,
    pub pending: f64,

    /// Mean of the member weeks' completion rates (0–1 fraction).
    pub completion_rate: f64,

    /// Number of weekly rows folded into this group.
    pub weeks: usize,
}

fn matches(record: &RollupRecord, filters: &DashboardFilters) -> bool {
    constraint_matches(&filters.branch, &record.branch)
        && constraint_matches(&filters.period, &record.period)
}

/// Filtered raw records, in snapshot order. Used when aggregation mode
/// is off.
pub fn filter_rollup(records: &[RollupRecord], filters: &DashboardFilters) -> Vec<RollupRecord> {
    records.iter().filter(|r| matches(r, filters)).cloned().collect()
}

/// Groups the filtered records by (branch, period), summing the planned,
/// completed and pending counts and averaging the completion rate across
/// the weeks in each group.
pub fn rollup(records: &[RollupRecord], filters: &DashboardFilters) -> Vec<RollupGroup> {
    let mut groups: Vec<RollupGroup> = Vec::new();
    let mut positions: FxHashMap<(String, String), usize> = FxHashMap::default();
    // Running rate sums, aligned with `groups`; averaged at the end.
    let mut rate_sums: Vec<f64> = Vec::new();

    for record in records.iter().filter(|r| matches(r, filters)) {
        let key = (record.branch.clone(), record.period.clone());
        let idx = match positions.get(&key) {
            Some(&i) => i,
            None => {
                positions.insert(key, groups.len());
                groups.push(RollupGroup {
                    branch: record.branch.clone(),
                    period: record.period.clone(),
                    planned: 0.0,
                    completed: 0.0,
                    pending: 0.0,
                    completion_rate: 0.0,
                    weeks: 0,
                });
                rate_sums.push(0.0);
                groups.len() - 1
            }
        };

        let group = &mut groups[idx];
        group.planned += record.planned;
        group.completed += record.completed;
        group.pending += record.pending;
        group.weeks += 1;
        rate_sums[idx] += record.completion_rate;
    }

    for (group, rate_sum) in groups.iter_mut().zip(rate_sums) {
        if group.weeks > 0 {
            group.completion_rate = rate_sum / group.weeks as f64;
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        branch: &str,
        period: &str,
        week: &str,
        planned: f64,
        completed: f64,
        rate: f64,
    ) -> RollupRecord {
        RollupRecord {
            branch: branch.into(),
            period: period.into(),
            week: week.into(),
            planned,
            completed,
            pending: planned - completed,
            completion_rate: rate,
        }
    }

    #[test]
    fn test_rollup_sums_and_averages_across_weeks() {
        let records = vec![
            record("Santos", "Julho", "W1", 10.0, 8.0, 0.8),
            record("Santos", "Julho", "W2", 20.0, 12.0, 0.6),
            record("Campinas", "Julho", "W1", 5.0, 5.0, 1.0),
        ];
        let groups = rollup(&records, &DashboardFilters::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].branch, "Santos");
        assert_eq!(groups[0].planned, 30.0);
        assert_eq!(groups[0].completed, 20.0);
        assert_eq!(groups[0].weeks, 2);
        assert!((groups[0].completion_rate - 0.7).abs() < 1e-9);
        assert_eq!(groups[1].completion_rate, 1.0);
    }

    #[test]
    fn test_rollup_splits_on_period_not_week() {
        let records = vec![
            record("Santos", "Julho", "W1", 1.0, 1.0, 1.0),
            record("Santos", "Agosto", "W1", 1.0, 1.0, 1.0),
        ];
        let groups = rollup(&records, &DashboardFilters::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].weeks, 1);
    }

    #[test]
    fn test_rollup_keeps_first_encounter_order() {
        let records = vec![
            record("B", "Julho", "W2", 1.0, 1.0, 1.0),
            record("A", "Julho", "W1", 1.0, 1.0, 1.0),
            record("B", "Julho", "W3", 1.0, 0.0, 0.0),
        ];
        let groups = rollup(&records, &DashboardFilters::default());
        assert_eq!(groups[0].branch, "B");
        assert_eq!(groups[0].weeks, 2);
        assert_eq!(groups[1].branch, "A");
    }

    #[test]
    fn test_branch_filter() {
        let records = vec![
            record("Santos", "Julho", "W1", 10.0, 8.0, 0.8),
            record("Campinas", "Julho", "W1", 5.0, 5.0, 1.0),
        ];
        let filters = DashboardFilters {
            branch: Some("santos".into()),
            ..Default::default()
        };
        assert_eq!(rollup(&records, &filters).len(), 1);
        assert_eq!(filter_rollup(&records, &filters).len(), 1);
    }
}
