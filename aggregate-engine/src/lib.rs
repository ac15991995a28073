//! FILENAME: aggregate-engine/src/lib.rs
//! Dashboard aggregation subsystem for the layer-mesh engine.
//!
//! This crate turns dashboard-style tabs (weekly maintenance plans,
//! damage reports, open tickets) into typed snapshots and computes the
//! derived views the reporting API serves. It depends on `tabular` only
//! for shared types (CellValue, TabularSource, HeaderMap, numeric
//! parsing).
//!
//! Layers:
//! - `definition`: Column bindings and request filters (what to read)
//! - `snapshot`: Typed per-layer record parsing (rows parsed once,
//!   independent of per-request filters)
//! - `rollup`: Periodic (branch, period) roll-ups
//! - `ranking`: Top-N category ranking by summed magnitude
//! - `backlog`: Open-ticket backlog metrics

pub mod backlog;
pub mod definition;
pub mod ranking;
pub mod rollup;
pub mod snapshot;

pub use backlog::{backlog_metrics, filter_backlog, is_terminal_status, BacklogMetrics};
pub use definition::{BacklogColumns, DashboardFilters, RankingColumns, RollupColumns};
pub use ranking::{top_categories, CategoryTotal, RankingResult};
pub use rollup::{filter_rollup, rollup, RollupGroup};
pub use snapshot::{
    parse_backlog, parse_ranking, parse_rollup, BacklogRecord, RankedRecord, RollupRecord,
};
