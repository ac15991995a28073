//! FILENAME: query-engine/src/lib.rs
//! Multi-layer query engine over tabular sources.
//!
//! The engine serves read queries against a set of configured layers:
//! primary row-per-record tabs, cached enrichment indices joined onto
//! them (full and summary views), and typed dashboard layers (rollup,
//! ranking, backlog). Each primary request is answered by exactly one
//! of five fetch strategies chosen from the request parameters, and
//! every result page is cached under a deterministic key.
//!
//! Layering:
//! - [`layer`] / [`params`] describe what can be asked;
//! - [`plan`] / [`fetch`] answer primary requests;
//! - [`index`] / [`merge`] build and join the enrichment indices;
//! - [`cache`] keys and stores every cached artifact;
//! - [`engine`] dispatches, [`view`] / [`links`] shape the response.

pub mod cache;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod index;
pub mod layer;
pub mod links;
pub mod merge;
pub mod params;
pub mod plan;
pub mod view;

pub use cache::{index_key, result_key, snapshot_key, CacheManager, SCHEMA_TAG};
pub use engine::QueryEngine;
pub use error::QueryError;
pub use fetch::{haversine_km, FetchOutcome, PrimaryFetcher};
pub use index::{
    base_key, build_hub_index, build_panel_index, insert_with_base, HubEntry, PanelEntry,
    PanelGroup,
};
pub use layer::{
    GeoColumns, LayerConfig, LayerDescriptor, LayerKind, LayerRegistry, MergeComposition,
};
pub use links::{page_links, PageLinks, PageWindow};
pub use merge::{merge_full, merge_summary, MergeKeys, MergedRecord, SummaryRecord};
pub use params::{
    DashboardParams, GeoFilter, HubFilters, IdentityFilters, PanelFilters, Params, DEFAULT_LIMIT,
    DEFAULT_TOP, MAX_LIMIT, SEARCH_LIMIT,
};
pub use plan::{plan, Strategy};
pub use view::{rows_to_records, LayerExtras, QueryOutcome, Record};
