//! FILENAME: aggregate-engine/src/definition.rs
//! Column bindings and request filters for the dashboard layers.
//!
//! Each dashboard layer binds expected column names to the typed fields
//! of its snapshot records. Names are resolved through the fuzzy
//! `HeaderMap`, so the defaults only need to be close to what the sheet
//! actually carries. Defaults follow the pt-BR sheets this engine was
//! built against.

use serde::{Deserialize, Serialize};

// ============================================================================
// COLUMN BINDINGS
// ============================================================================

/// Columns of the weekly maintenance-plan tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupColumns {
    /// Branch label, the first half of the roll-up group key.
    pub branch: String,

    /// Period label (month), the second half of the group key.
    pub period: String,

    /// Week label of an individual record. Weeks never key groups; a
    /// (branch, period) group folds its weekly rows together.
    pub week: String,

    pub planned: String,
    pub completed: String,
    pub pending: String,

    /// Completion-rate column. Parsed as a percentage into a 0–1 fraction.
    pub completion_rate: String,
}

impl Default for RollupColumns {
    fn default() -> Self {
        RollupColumns {
            branch: "Filial".to_string(),
            period: "Mês".to_string(),
            week: "Semana".to_string(),
            planned: "Programado".to_string(),
            completed: "Concluído".to_string(),
            pending: "Pendente".to_string(),
            completion_rate: "% Conclusão".to_string(),
        }
    }
}

/// Columns of the damage-report tab used for top-N ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingColumns {
    /// Asset identifier carried through to the underlying records.
    pub asset: String,

    /// Category label records are grouped by.
    pub category: String,

    /// Magnitude summed per category. Locale-parsed; only positive
    /// magnitudes participate in the ranking sums.
    pub magnitude: String,
}

impl Default for RankingColumns {
    fn default() -> Self {
        RankingColumns {
            asset: "Nº Eletro".to_string(),
            category: "Categoria".to_string(),
            magnitude: "Quantidade".to_string(),
        }
    }
}

/// Columns of the open-tickets tab used for backlog metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogColumns {
    /// Ticket identifier carried through to the underlying records.
    pub ticket: String,

    /// Where the ticket came from (call center, field team, ...).
    pub origin: String,

    /// Status column; terminal statuses mark the ticket closed.
    pub status: String,

    pub days_open: String,
}

impl Default for BacklogColumns {
    fn default() -> Self {
        BacklogColumns {
            ticket: "Chamado".to_string(),
            origin: "Origem".to_string(),
            status: "Status".to_string(),
            days_open: "Dias em Aberto".to_string(),
        }
    }
}

// ============================================================================
// REQUEST FILTERS
// ============================================================================

/// Per-request filters over dashboard records. Every field is optional;
/// an absent field is unconstrained, never "match nothing". Values
/// compare trimmed and case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardFilters {
    pub branch: Option<String>,
    pub period: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub origin: Option<String>,
}

impl DashboardFilters {
    pub fn is_empty(&self) -> bool {
        self.branch.is_none()
            && self.period.is_none()
            && self.category.is_none()
            && self.status.is_none()
            && self.origin.is_none()
    }
}

/// Trimmed, case-insensitive equality against an optional constraint.
/// `None` is unconstrained.
pub(crate) fn constraint_matches(constraint: &Option<String>, value: &str) -> bool {
    match constraint {
        None => true,
        Some(wanted) => wanted.trim().eq_ignore_ascii_case(value.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_constraint_is_unconstrained() {
        assert!(constraint_matches(&None, "anything"));
    }

    #[test]
    fn test_constraint_is_case_insensitive_and_trimmed() {
        assert!(constraint_matches(&Some("Santos".into()), "  SANTOS "));
        assert!(!constraint_matches(&Some("Santos".into()), "Campinas"));
    }

    #[test]
    fn test_filters_is_empty() {
        assert!(DashboardFilters::default().is_empty());
        let f = DashboardFilters {
            branch: Some("Santos".into()),
            ..Default::default()
        };
        assert!(!f.is_empty());
    }
}
