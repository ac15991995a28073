//! FILENAME: query-engine/src/params.rs
//! Normalized request parameters.
//!
//! A `Params` value is the single input to planning, fetching and cache
//! keying. Boundary layers (HTTP handlers, scripts) are expected to parse
//! their raw inputs into this struct before touching the engine.

use aggregate_engine::DashboardFilters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hard ceiling on any single page of records.
pub const MAX_LIMIT: usize = 5000;

/// Page size when the caller does not ask for one.
pub const DEFAULT_LIMIT: usize = 1000;

/// Ceiling on identifier and free-text search result sets.
pub const SEARCH_LIMIT: usize = 100;

/// Radius applied when a geo filter omits one.
pub const DEFAULT_GEO_RADIUS_KM: f64 = 5.0;

/// Decimal places a geo coordinate keeps in cache keys.
pub const DEFAULT_GEO_PRECISION: u8 = 4;

/// Number of categories a ranking keeps when the caller does not say.
pub const DEFAULT_TOP: usize = 10;

/// Identifier lookups against the asset register's key columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityFilters {
    /// Matched against the layer's primary join column.
    pub primary_id: Option<String>,

    /// Matched against the layer's secondary join column.
    pub secondary_id: Option<String>,

    /// Matched against the layer's address column.
    pub address: Option<String>,
}

impl IdentityFilters {
    pub fn is_active(&self) -> bool {
        self.primary_id.is_some() || self.secondary_id.is_some() || self.address.is_some()
    }
}

/// Constraints on the merged panel inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelFilters {
    pub has_digital: Option<bool>,
    pub has_static: Option<bool>,
    pub shelter_model: Option<String>,
}

impl PanelFilters {
    pub fn is_active(&self) -> bool {
        self.has_digital.is_some() || self.has_static.is_some() || self.shelter_model.is_some()
    }
}

/// Constraints on the merged safety-hub program data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubFilters {
    pub has_hub: Option<bool>,
    pub sponsor: Option<String>,
}

impl HubFilters {
    pub fn is_active(&self) -> bool {
        self.has_hub.is_some() || self.sponsor.is_some()
    }
}

/// Great-circle radius filter around a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,

    /// Coordinate rounding used for cache keys, not for matching.
    pub precision: u8,
}

impl GeoFilter {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoFilter {
            lat,
            lon,
            radius_km: DEFAULT_GEO_RADIUS_KM,
            precision: DEFAULT_GEO_PRECISION,
        }
    }
}

/// Dashboard-layer controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardParams {
    pub filters: DashboardFilters,

    /// When set, a rollup layer returns grouped totals instead of the
    /// filtered raw records.
    pub aggregate: bool,

    /// Ranking depth; `DEFAULT_TOP` when absent.
    pub top: Option<usize>,
}

/// Everything a single query can ask for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Zero-based record offset.
    pub start: usize,

    /// Requested page size, clamped to `MAX_LIMIT` at use sites.
    pub limit: usize,

    /// Cursor: primary-key value of the last record already seen.
    pub after: Option<String>,

    /// Free-text needle searched across every column.
    pub query: Option<String>,

    pub identity: IdentityFilters,

    /// Exact per-column constraints, keyed by requested column name.
    /// BTreeMap keeps cache keys order-independent.
    pub field_filters: BTreeMap<String, String>,

    pub panel: PanelFilters,
    pub hub: HubFilters,
    pub dashboard: DashboardParams,
    pub geo: Option<GeoFilter>,

    /// Sparse fieldset: only these columns appear in the records.
    pub fields: Option<Vec<String>>,

    /// Skip the result cache for this request. Never part of the cache
    /// key, so the refreshed page overwrites the stale entry.
    pub no_cache: bool,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            start: 0,
            limit: DEFAULT_LIMIT,
            after: None,
            query: None,
            identity: IdentityFilters::default(),
            field_filters: BTreeMap::new(),
            panel: PanelFilters::default(),
            hub: HubFilters::default(),
            dashboard: DashboardParams::default(),
            geo: None,
            fields: None,
            no_cache: false,
        }
    }
}

impl Params {
    pub fn new() -> Self {
        Params::default()
    }

    /// Effective page size.
    pub fn clamped_limit(&self) -> usize {
        self.limit.min(MAX_LIMIT)
    }

    /// A free-text needle long enough to search on. Single characters
    /// are ignored rather than rejected.
    pub fn text_needle(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| q.chars().count() > 1)
    }

    /// Whether this request is a search (identifier or free-text) as
    /// opposed to a bulk or filtered fetch.
    pub fn is_search(&self) -> bool {
        self.identity.is_active() || self.text_needle().is_some()
    }

    /// Whether a full scan is needed to answer the request.
    pub fn needs_scan(&self) -> bool {
        !self.field_filters.is_empty() || self.geo.is_some()
    }
}
