//! FILENAME: aggregate-engine/src/ranking.rs
//! Top-N category ranking over the damage-report snapshot.

use crate::definition::{constraint_matches, DashboardFilters};
use crate::snapshot::RankedRecord;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// One ranked category with its summed magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub magnitude: f64,
}

/// The ranking plus every underlying record of the ranked categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    /// Top-N categories, descending by summed magnitude. Ties keep the
    /// category first encountered in the snapshot first.
    pub categories: Vec<CategoryTotal>,

    /// Every record whose category made the top N — not just the totals.
    pub records: Vec<RankedRecord>,
}

fn matches(record: &RankedRecord, filters: &DashboardFilters) -> bool {
    constraint_matches(&filters.category, &record.category)
}

/// Ranks categories by summed magnitude and keeps the top `n`.
///
/// Only records with a positive magnitude participate in the sums; the
/// returned record list, however, contains every record belonging to a
/// ranked category. Sorting is descending and stable, so categories tied
/// on magnitude stay in first-encountered order.
pub fn top_categories(
    records: &[RankedRecord],
    filters: &DashboardFilters,
    n: usize,
) -> RankingResult {
    let filtered: Vec<&RankedRecord> =
        records.iter().filter(|r| matches(r, filters)).collect();

    let mut totals: Vec<CategoryTotal> = Vec::new();
    let mut positions: FxHashMap<String, usize> = FxHashMap::default();

    for record in filtered.iter().filter(|r| r.magnitude > 0.0) {
        let idx = match positions.get(&record.category) {
            Some(&i) => i,
            None => {
                positions.insert(record.category.clone(), totals.len());
                totals.push(CategoryTotal {
                    category: record.category.clone(),
                    magnitude: 0.0,
                });
                totals.len() - 1
            }
        };
        totals[idx].magnitude += record.magnitude;
    }

    // Stable sort: equal sums keep first-encountered order.
    totals.sort_by(|a, b| {
        b.magnitude
            .partial_cmp(&a.magnitude)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    totals.truncate(n);

    let kept: FxHashMap<&str, ()> = totals
        .iter()
        .map(|t| (t.category.as_str(), ()))
        .collect();

    let records = filtered
        .into_iter()
        .filter(|r| kept.contains_key(r.category.as_str()))
        .cloned()
        .collect();

    RankingResult {
        categories: totals,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(asset: &str, category: &str, magnitude: f64) -> RankedRecord {
        RankedRecord {
            asset: asset.into(),
            category: category.into(),
            magnitude,
        }
    }

    #[test]
    fn test_top_n_sums_and_membership() {
        // A sums to 8, B to 10, C to 1. N=2 keeps {B, A} and every
        // underlying A/B record, excluding C.
        let records = vec![
            record("e1", "A", 5.0),
            record("e2", "A", 3.0),
            record("e3", "B", 10.0),
            record("e4", "C", 1.0),
        ];
        let result = top_categories(&records, &DashboardFilters::default(), 2);

        assert_eq!(result.categories.len(), 2);
        assert_eq!(result.categories[0].category, "B");
        assert_eq!(result.categories[0].magnitude, 10.0);
        assert_eq!(result.categories[1].category, "A");
        assert_eq!(result.categories[1].magnitude, 8.0);

        let assets: Vec<&str> = result.records.iter().map(|r| r.asset.as_str()).collect();
        assert_eq!(assets, vec!["e1", "e2", "e3"]);
    }

    #[test]
    fn test_ties_keep_first_encountered_order() {
        let records = vec![
            record("e1", "X", 4.0),
            record("e2", "Y", 4.0),
            record("e3", "Z", 9.0),
        ];
        let result = top_categories(&records, &DashboardFilters::default(), 3);
        let cats: Vec<&str> = result.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(cats, vec!["Z", "X", "Y"]);
    }

    #[test]
    fn test_non_positive_magnitudes_do_not_rank() {
        let records = vec![
            record("e1", "A", 0.0),
            record("e2", "A", -2.0),
            record("e3", "B", 1.0),
        ];
        let result = top_categories(&records, &DashboardFilters::default(), 5);
        assert_eq!(result.categories.len(), 1);
        assert_eq!(result.categories[0].category, "B");
        // A never ranked, so its records are excluded.
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_ranked_category_keeps_zero_magnitude_members() {
        let records = vec![
            record("e1", "A", 5.0),
            record("e2", "A", 0.0),
        ];
        let result = top_categories(&records, &DashboardFilters::default(), 1);
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn test_category_filter() {
        let records = vec![record("e1", "A", 5.0), record("e2", "B", 9.0)];
        let filters = DashboardFilters {
            category: Some("a".into()),
            ..Default::default()
        };
        let result = top_categories(&records, &filters, 5);
        assert_eq!(result.categories.len(), 1);
        assert_eq!(result.categories[0].category, "A");
    }
}
