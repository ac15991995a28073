//! FILENAME: query-engine/src/engine.rs
//! The query engine: layer dispatch, caching, response assembly.

use crate::cache::{result_key, snapshot_key, ttl_for, CacheManager, CachedPage, CachedSnapshot};
use crate::error::QueryError;
use crate::fetch::PrimaryFetcher;
use crate::index::{build_hub_index, build_panel_index};
use crate::layer::{LayerConfig, LayerDescriptor, LayerKind, LayerRegistry, MergeComposition};
use crate::merge::{hub_matches, merge_full, merge_summary, panel_matches, MergeKeys};
use crate::params::{Params, DEFAULT_TOP};
use crate::view::{rows_to_records, LayerExtras, QueryOutcome, Record};
use aggregate_engine::{
    backlog_metrics, filter_backlog, filter_rollup, parse_backlog, parse_ranking, parse_rollup,
    rollup, top_categories, BacklogColumns, RankingColumns, RollupColumns,
};
use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tabular::{ByteCache, SourceError, TabularSource};
use tracing::debug;

fn to_values<T: Serialize>(items: &[T]) -> Result<Vec<serde_json::Value>, QueryError> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(QueryError::from))
        .collect()
}

fn page_of<T: Clone>(items: &[T], params: &Params) -> Vec<T> {
    items
        .iter()
        .skip(params.start)
        .take(params.clamped_limit())
        .cloned()
        .collect()
}

/// One engine instance serves every registered layer. Sources are
/// attached by id; a layer whose source was never attached fails
/// requests that need it primarily and degrades where it is only an
/// enrichment.
pub struct QueryEngine {
    registry: LayerRegistry,
    sources: FxHashMap<String, Arc<dyn TabularSource>>,
    cache: CacheManager,
}

impl QueryEngine {
    pub fn new(registry: LayerRegistry, cache: Arc<dyn ByteCache>) -> Self {
        QueryEngine {
            registry,
            sources: FxHashMap::default(),
            cache: CacheManager::new(cache),
        }
    }

    /// Attaches a source under the id layers reference in their config.
    pub fn with_source(mut self, id: &str, source: Arc<dyn TabularSource>) -> Self {
        self.sources.insert(id.to_string(), source);
        self
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Layer catalog for the meta operation.
    pub fn describe(&self) -> Vec<LayerDescriptor> {
        self.registry.describe()
    }

    /// Answers one query against one layer.
    pub fn query(&self, layer_id: &str, params: &Params) -> Result<QueryOutcome, QueryError> {
        let layer = self.layer(layer_id)?;
        match &layer.kind {
            LayerKind::Primary => self.query_primary(layer, params),
            LayerKind::Panels => self.query_panels(layer, params),
            LayerKind::SafetyHub => self.query_hub(layer, params),
            LayerKind::Full(comp) => self.query_full(layer, comp, params),
            LayerKind::Summary(comp) => self.query_summary(layer, comp, params),
            LayerKind::Rollup(cols) => self.query_rollup(layer, cols, params),
            LayerKind::Ranking(cols) => self.query_ranking(layer, cols, params),
            LayerKind::Backlog(cols) => self.query_backlog(layer, cols, params),
        }
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    fn layer(&self, id: &str) -> Result<&LayerConfig, QueryError> {
        self.registry
            .get(id)
            .ok_or_else(|| QueryError::UnknownLayer(id.to_string()))
    }

    fn source_required(&self, layer: &LayerConfig) -> Result<&dyn TabularSource, QueryError> {
        layer
            .source
            .as_deref()
            .and_then(|id| self.sources.get(id))
            .map(|s| s.as_ref())
            .ok_or_else(|| QueryError::MissingSource { layer: layer.id.clone() })
    }

    fn source_optional(&self, layer: &LayerConfig) -> Option<&dyn TabularSource> {
        layer
            .source
            .as_deref()
            .and_then(|id| self.sources.get(id))
            .map(|s| s.as_ref())
    }

    fn composition(
        &self,
        comp: &MergeComposition,
    ) -> Result<(&LayerConfig, &LayerConfig, &LayerConfig), QueryError> {
        Ok((
            self.layer(&comp.base)?,
            self.layer(&comp.panels)?,
            self.layer(&comp.safety_hub)?,
        ))
    }

    // ========================================================================
    // PRIMARY PAGES
    // ========================================================================

    /// Fetches (or recalls) one projected page of a primary layer.
    /// Returns the records, the strategy total, whether the cache served
    /// it, and when the entry lapses.
    fn fetch_primary_page(
        &self,
        layer: &LayerConfig,
        params: &Params,
    ) -> Result<(Vec<Record>, usize, bool, DateTime<Utc>), QueryError> {
        let key = result_key(&layer.id, params);
        if params.no_cache {
            debug!(layer = %layer.id, "cache bypass requested");
        } else if let Some(page) = self.cache.get_json::<CachedPage>(&key) {
            debug!(layer = %layer.id, "result cache hit");
            return Ok((page.records, page.total, true, page.expires_at));
        }

        let source = self.source_required(layer)?;
        let fetcher = PrimaryFetcher::new(source, layer)?;
        let outcome = fetcher.fetch(params)?;

        let headers = fetcher.header_map().headers().to_vec();
        let allowlist = params.fields.clone().or_else(|| layer.field_allowlist.clone());
        let records =
            rows_to_records(&headers, &outcome.rows, &layer.exclude_columns, allowlist.as_deref());

        let ttl = ttl_for(layer, params);
        let expires_at = Utc::now() + Duration::seconds(ttl as i64);
        let page = CachedPage { records, total: outcome.total, expires_at };
        self.cache.put_json(&key, &page, ttl);
        Ok((page.records, page.total, false, page.expires_at))
    }

    fn query_primary(
        &self,
        layer: &LayerConfig,
        params: &Params,
    ) -> Result<QueryOutcome, QueryError> {
        let (records, total, cached, expires_at) = self.fetch_primary_page(layer, params)?;
        Ok(QueryOutcome {
            layer: layer.id.clone(),
            records: to_values(&records)?,
            total,
            cached,
            cache_expires_at: expires_at,
            extras: None,
        })
    }

    // ========================================================================
    // MERGED VIEWS
    // ========================================================================

    fn query_full(
        &self,
        layer: &LayerConfig,
        comp: &MergeComposition,
        params: &Params,
    ) -> Result<QueryOutcome, QueryError> {
        let (base, panels_layer, hub_layer) = self.composition(comp)?;
        let (records, base_total, cached, expires_at) = self.fetch_primary_page(base, params)?;

        let panels = build_panel_index(self.source_optional(panels_layer), panels_layer, &self.cache);
        let hubs = build_hub_index(self.source_optional(hub_layer), hub_layer, &self.cache);
        let keys = MergeKeys {
            primary: base.join_key.as_deref(),
            secondary: base.secondary_join_key.as_deref(),
        };

        let merged = merge_full(&records, &keys, &panels, &hubs, params);
        // Enrichment filters narrow the page itself, so the base total no
        // longer describes the result set.
        let total = if params.panel.is_active() || params.hub.is_active() {
            merged.len()
        } else {
            base_total
        };
        Ok(QueryOutcome {
            layer: layer.id.clone(),
            records: to_values(&merged)?,
            total,
            cached,
            cache_expires_at: expires_at,
            extras: None,
        })
    }

    fn query_summary(
        &self,
        layer: &LayerConfig,
        comp: &MergeComposition,
        params: &Params,
    ) -> Result<QueryOutcome, QueryError> {
        let (base, panels_layer, hub_layer) = self.composition(comp)?;
        let (records, base_total, cached, expires_at) = self.fetch_primary_page(base, params)?;

        let panels = build_panel_index(self.source_optional(panels_layer), panels_layer, &self.cache);
        let hubs = build_hub_index(self.source_optional(hub_layer), hub_layer, &self.cache);
        let keys = MergeKeys {
            primary: base.join_key.as_deref(),
            secondary: base.secondary_join_key.as_deref(),
        };

        let merged = merge_summary(&records, &keys, &panels, &hubs, params);
        let total = if params.panel.is_active() || params.hub.is_active() {
            merged.len()
        } else {
            base_total
        };
        Ok(QueryOutcome {
            layer: layer.id.clone(),
            records: to_values(&merged)?,
            total,
            cached,
            cache_expires_at: expires_at,
            extras: None,
        })
    }

    // ========================================================================
    // STANDALONE INDEX LISTINGS
    // ========================================================================

    fn query_panels(
        &self,
        layer: &LayerConfig,
        params: &Params,
    ) -> Result<QueryOutcome, QueryError> {
        let index = build_panel_index(self.source_optional(layer), layer, &self.cache);
        let key_field = layer.join_key.clone().unwrap_or_else(|| "key".to_string());

        let mut entries: Vec<_> = index
            .iter()
            .filter(|&(_, entry)| panel_matches(entry, &params.panel))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let total = entries.len();

        let mut records = Vec::new();
        for (key, entry) in entries.into_iter().skip(params.start).take(params.clamped_limit()) {
            let mut value = serde_json::to_value(entry)?;
            if let serde_json::Value::Object(map) = &mut value {
                map.insert(key_field.clone(), serde_json::Value::String(key.clone()));
            }
            records.push(value);
        }

        Ok(QueryOutcome {
            layer: layer.id.clone(),
            records,
            total,
            cached: false,
            cache_expires_at: Utc::now() + Duration::seconds(layer.cache_seconds as i64),
            extras: None,
        })
    }

    fn query_hub(&self, layer: &LayerConfig, params: &Params) -> Result<QueryOutcome, QueryError> {
        let index = build_hub_index(self.source_optional(layer), layer, &self.cache);
        let key_field = layer.join_key.clone().unwrap_or_else(|| "key".to_string());

        let mut entries: Vec<_> = index
            .iter()
            .filter(|&(_, entry)| hub_matches(Some(entry), &params.hub))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let total = entries.len();

        let mut records = Vec::new();
        for (key, entry) in entries.into_iter().skip(params.start).take(params.clamped_limit()) {
            let mut value = serde_json::to_value(entry)?;
            if let serde_json::Value::Object(map) = &mut value {
                map.insert(key_field.clone(), serde_json::Value::String(key.clone()));
            }
            records.push(value);
        }

        Ok(QueryOutcome {
            layer: layer.id.clone(),
            records,
            total,
            cached: false,
            cache_expires_at: Utc::now() + Duration::seconds(layer.cache_seconds as i64),
            extras: None,
        })
    }

    // ========================================================================
    // DASHBOARD LAYERS
    // ========================================================================

    /// Recalls or builds a dashboard layer's typed snapshot.
    fn snapshot<T, F>(
        &self,
        layer: &LayerConfig,
        params: &Params,
        parse: F,
    ) -> Result<(Vec<T>, bool, DateTime<Utc>), QueryError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&dyn TabularSource) -> Result<Vec<T>, SourceError>,
    {
        let key = snapshot_key(&layer.id);
        if !params.no_cache {
            if let Some(snap) = self.cache.get_json::<CachedSnapshot<T>>(&key) {
                return Ok((snap.records, true, snap.expires_at));
            }
        }

        let source = self.source_required(layer)?;
        let records = parse(source)?;
        let expires_at = Utc::now() + Duration::seconds(layer.cache_seconds as i64);
        let snap = CachedSnapshot { records, expires_at };
        self.cache.put_json(&key, &snap, layer.cache_seconds);
        Ok((snap.records, false, snap.expires_at))
    }

    fn query_rollup(
        &self,
        layer: &LayerConfig,
        cols: &RollupColumns,
        params: &Params,
    ) -> Result<QueryOutcome, QueryError> {
        let (snapshot, cached, expires_at) =
            self.snapshot(layer, params, |s| parse_rollup(s, cols))?;
        let filters = &params.dashboard.filters;

        let (records, total) = if params.dashboard.aggregate {
            let groups = rollup(&snapshot, filters);
            (to_values(&page_of(&groups, params))?, groups.len())
        } else {
            let rows = filter_rollup(&snapshot, filters);
            (to_values(&page_of(&rows, params))?, rows.len())
        };

        Ok(QueryOutcome {
            layer: layer.id.clone(),
            records,
            total,
            cached,
            cache_expires_at: expires_at,
            extras: None,
        })
    }

    fn query_ranking(
        &self,
        layer: &LayerConfig,
        cols: &RankingColumns,
        params: &Params,
    ) -> Result<QueryOutcome, QueryError> {
        let (snapshot, cached, expires_at) =
            self.snapshot(layer, params, |s| parse_ranking(s, cols))?;
        let depth = params.dashboard.top.unwrap_or(DEFAULT_TOP);
        let result = top_categories(&snapshot, &params.dashboard.filters, depth);
        let total = result.records.len();

        Ok(QueryOutcome {
            layer: layer.id.clone(),
            records: to_values(&page_of(&result.records, params))?,
            total,
            cached,
            cache_expires_at: expires_at,
            extras: Some(LayerExtras::Ranking { categories: result.categories }),
        })
    }

    fn query_backlog(
        &self,
        layer: &LayerConfig,
        cols: &BacklogColumns,
        params: &Params,
    ) -> Result<QueryOutcome, QueryError> {
        let (snapshot, cached, expires_at) =
            self.snapshot(layer, params, |s| parse_backlog(s, cols))?;
        let filters = &params.dashboard.filters;
        let filtered = filter_backlog(&snapshot, filters);
        let metrics = backlog_metrics(&snapshot, filters);
        let total = filtered.len();

        Ok(QueryOutcome {
            layer: layer.id.clone(),
            records: to_values(&page_of(&filtered, params))?,
            total,
            cached,
            cache_expires_at: expires_at,
            extras: Some(LayerExtras::Backlog { metrics }),
        })
    }
}
