//! FILENAME: query-engine/src/fetch.rs
//! The five fetch strategies over a primary layer.
//!
//! Search strategies (identifier, free-text) work position-first: the
//! source finds matching row positions, the fetcher reads those rows and
//! overlays links per row. Window strategies (cursor, chunk) read a
//! contiguous block and overlay links batched per column. The filtered
//! scan reads the whole extent, so its `total` is the match count, not
//! the source extent.

use crate::layer::LayerConfig;
use crate::params::{GeoFilter, Params, SEARCH_LIMIT};
use crate::plan::{plan, Strategy};
use rustc_hash::FxHashSet;
use tabular::{CellValue, HeaderMap, Row, SourceError, TabularSource};
use tracing::debug;

/// Mean Earth radius, km.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in km.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Rows plus the strategy's notion of `total`.
pub struct FetchOutcome {
    pub rows: Vec<Row>,
    pub total: usize,
}

/// One field filter resolved against the layer's headers. Values compare
/// against the whole cell, trimmed and case-insensitive; a filter whose
/// column could not be resolved matches nothing.
struct ColumnFilter {
    column: Option<usize>,
    needle_lower: String,
}

/// Strategy executor bound to one source and layer.
pub struct PrimaryFetcher<'a> {
    source: &'a dyn TabularSource,
    layer: &'a LayerConfig,
    map: HeaderMap,
}

impl<'a> PrimaryFetcher<'a> {
    pub fn new(source: &'a dyn TabularSource, layer: &'a LayerConfig) -> Result<Self, SourceError> {
        let map = HeaderMap::new(&source.headers()?);
        Ok(PrimaryFetcher { source, layer, map })
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.map
    }

    pub fn fetch(&self, params: &Params) -> Result<FetchOutcome, SourceError> {
        let strategy = plan(params);
        debug!(layer = %self.layer.id, ?strategy, "executing fetch");
        match strategy {
            Strategy::KeyIdentifier => self.fetch_by_identity(params),
            Strategy::FreeText => self.fetch_by_text(params),
            Strategy::Cursor => self.fetch_after(params),
            Strategy::FilteredScan => self.fetch_filtered(params),
            Strategy::Chunk => self.fetch_chunk(params),
        }
    }

    // ========================================================================
    // SEARCH STRATEGIES
    // ========================================================================

    fn fetch_by_identity(&self, params: &Params) -> Result<FetchOutcome, SourceError> {
        let lookups = [
            (params.identity.primary_id.as_deref(), self.layer.join_key.as_deref()),
            (params.identity.secondary_id.as_deref(), self.layer.secondary_join_key.as_deref()),
            (params.identity.address.as_deref(), self.layer.address_column.as_deref()),
        ];

        let mut positions = Vec::new();
        let mut seen = FxHashSet::default();
        'lookups: for (needle, column) in lookups {
            let (Some(needle), Some(column)) = (needle, column) else { continue };
            let Some(col) = self.map.resolve(column) else {
                debug!(column, layer = %self.layer.id, "identifier column not found, lookup skipped");
                continue;
            };
            for pos in self.source.find_rows(Some(col), needle, false)? {
                if seen.insert(pos) {
                    positions.push(pos);
                    if positions.len() >= SEARCH_LIMIT {
                        break 'lookups;
                    }
                }
            }
        }

        self.finish_search(positions, params)
    }

    fn fetch_by_text(&self, params: &Params) -> Result<FetchOutcome, SourceError> {
        // plan() only routes here when a needle is present.
        let needle = params.text_needle().unwrap_or_default();
        let mut positions = self.source.find_rows(None, needle, false)?;
        positions.truncate(SEARCH_LIMIT);
        self.finish_search(positions, params)
    }

    /// Shared search tail: read the hit rows, post-filter, overlay links.
    /// `total` is the surviving match count.
    fn finish_search(
        &self,
        positions: Vec<usize>,
        params: &Params,
    ) -> Result<FetchOutcome, SourceError> {
        let mut pairs = self.rows_at(&positions)?;
        if !params.field_filters.is_empty() {
            let filters = self.resolve_filters(params);
            pairs.retain(|(_, row)| Self::row_matches(row, &filters));
        }
        self.overlay_links_scattered(&mut pairs)?;

        let rows: Vec<Row> = pairs.into_iter().map(|(_, row)| row).collect();
        let total = rows.len();
        Ok(FetchOutcome { rows, total })
    }

    // ========================================================================
    // WINDOW STRATEGIES
    // ========================================================================

    fn fetch_after(&self, params: &Params) -> Result<FetchOutcome, SourceError> {
        let after = params.after.as_deref().unwrap_or_default();
        let start = self.cursor_start(after)?;
        let mut rows = self.source.rows(start, params.clamped_limit())?;
        self.overlay_links_block(start, &mut rows)?;
        let total = self.source.row_count()?;
        Ok(FetchOutcome { rows, total })
    }

    fn fetch_chunk(&self, params: &Params) -> Result<FetchOutcome, SourceError> {
        let start = params.start;
        let mut rows = self.source.rows(start, params.clamped_limit())?;
        self.overlay_links_block(start, &mut rows)?;
        let total = self.source.row_count()?;
        Ok(FetchOutcome { rows, total })
    }

    /// First row position after the cursor value. An unresolvable key
    /// column or an unknown cursor value restarts from the top.
    fn cursor_start(&self, after: &str) -> Result<usize, SourceError> {
        let Some(col) = self.layer.join_key.as_deref().and_then(|k| self.map.resolve(k)) else {
            return Ok(0);
        };
        let hits = self.source.find_rows(Some(col), after, true)?;
        Ok(hits.first().map(|&pos| pos + 1).unwrap_or(0))
    }

    // ========================================================================
    // FILTERED SCAN
    // ========================================================================

    fn fetch_filtered(&self, params: &Params) -> Result<FetchOutcome, SourceError> {
        let extent = self.source.row_count()?;
        let all = self.source.rows(0, extent)?;

        let filters = self.resolve_filters(params);
        let geo_cols = self.geo_columns();

        let matched: Vec<(usize, Row)> = all
            .into_iter()
            .enumerate()
            .filter(|(_, row)| {
                Self::row_matches(row, &filters)
                    && Self::geo_matches(row, params.geo.as_ref(), geo_cols)
            })
            .collect();
        let total = matched.len();

        let mut page: Vec<(usize, Row)> = matched
            .into_iter()
            .skip(params.start)
            .take(params.clamped_limit())
            .collect();
        self.overlay_links_scattered(&mut page)?;

        let rows = page.into_iter().map(|(_, row)| row).collect();
        Ok(FetchOutcome { rows, total })
    }

    fn resolve_filters(&self, params: &Params) -> Vec<ColumnFilter> {
        params
            .field_filters
            .iter()
            .map(|(name, value)| {
                let column = self.map.resolve(name);
                if column.is_none() {
                    debug!(column = %name, "filter column not found, filter matches nothing");
                }
                ColumnFilter { column, needle_lower: value.trim().to_lowercase() }
            })
            .collect()
    }

    fn row_matches(row: &Row, filters: &[ColumnFilter]) -> bool {
        filters.iter().all(|f| match f.column {
            Some(c) => row
                .get(c)
                .map(|cell| cell.matches(&f.needle_lower, true))
                .unwrap_or(false),
            None => false,
        })
    }

    fn geo_columns(&self) -> Option<(usize, usize)> {
        let geo = self.layer.geo.as_ref()?;
        Some((self.map.resolve(&geo.lat)?, self.map.resolve(&geo.lon)?))
    }

    /// No geo filter passes everything; a geo filter over a layer without
    /// resolvable coordinate columns passes nothing.
    fn geo_matches(row: &Row, geo: Option<&GeoFilter>, cols: Option<(usize, usize)>) -> bool {
        let Some(geo) = geo else { return true };
        let Some((lat_col, lon_col)) = cols else { return false };
        let lat = row.get(lat_col).and_then(CellValue::as_f64);
        let lon = row.get(lon_col).and_then(CellValue::as_f64);
        match (lat, lon) {
            (Some(lat), Some(lon)) => haversine_km(geo.lat, geo.lon, lat, lon) <= geo.radius_km,
            _ => false,
        }
    }

    // ========================================================================
    // LINK OVERLAY
    // ========================================================================

    fn link_columns(&self) -> Vec<usize> {
        self.layer
            .link_columns
            .iter()
            .filter_map(|name| self.map.resolve(name))
            .collect()
    }

    /// Per-row overlay for non-contiguous result sets.
    fn overlay_links_scattered(&self, pairs: &mut [(usize, Row)]) -> Result<(), SourceError> {
        let cols = self.link_columns();
        for (pos, row) in pairs.iter_mut() {
            for &col in &cols {
                if let Some(url) = self.source.cell_link(*pos, col)? {
                    if let Some(cell) = row.get_mut(col) {
                        *cell = CellValue::Text(url);
                    }
                }
            }
        }
        Ok(())
    }

    /// Batched per-column overlay for contiguous windows.
    fn overlay_links_block(&self, start: usize, rows: &mut [Row]) -> Result<(), SourceError> {
        for col in self.link_columns() {
            let links = self.source.column_links(col, start, rows.len())?;
            for (row, link) in rows.iter_mut().zip(links) {
                if let Some(url) = link {
                    if let Some(cell) = row.get_mut(col) {
                        *cell = CellValue::Text(url);
                    }
                }
            }
        }
        Ok(())
    }

    fn rows_at(&self, positions: &[usize]) -> Result<Vec<(usize, Row)>, SourceError> {
        positions
            .iter()
            .map(|&pos| {
                let mut window = self.source.rows(pos, 1)?;
                Ok((pos, window.pop().unwrap_or_default()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerRegistry;
    use crate::params::IdentityFilters;
    use tabular::MemorySource;

    fn asset_source() -> MemorySource {
        MemorySource::new(
            vec!["Nº Eletro", "Nº Parada", "Endereço", "Status", "Latitude", "Longitude", "Foto Referência"],
            vec![
                vec!["100".into(), "P-1".into(), "Av. Ana Costa 10".into(), "Ativo".into(),
                     CellValue::Number(-23.96), CellValue::Number(-46.33), "foto".into()],
                vec!["101".into(), "P-2".into(), "R. XV de Novembro 5".into(), "Inativo".into(),
                     CellValue::Number(-23.97), CellValue::Number(-46.32), "foto".into()],
                vec!["200".into(), "P-3".into(), "Av. Paulista 1000".into(), "Ativo".into(),
                     CellValue::Number(-23.56), CellValue::Number(-46.65), "foto".into()],
                vec!["201".into(), "P-4".into(), "Av. Paulista 2000".into(), "Ativo".into(),
                     CellValue::Number(-23.56), CellValue::Number(-46.66), "foto".into()],
                vec!["300".into(), "P-5".into(), "Praça Mauá 1".into(), "Ativo".into(),
                     CellValue::Empty, CellValue::Empty, "foto".into()],
            ],
        )
        .with_link(0, 6, "https://photos.example/100")
    }

    fn fetcher<'a>(source: &'a MemorySource, registry: &'a LayerRegistry) -> PrimaryFetcher<'a> {
        PrimaryFetcher::new(source, registry.get("main").unwrap()).unwrap()
    }

    #[test]
    fn test_chunk_totals_and_windows() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        let out = fetcher.fetch(&Params { limit: 2, ..Default::default() }).unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.total, 5);

        let out = fetcher.fetch(&Params { start: 4, limit: 2, ..Default::default() }).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.total, 5);
    }

    #[test]
    fn test_cursor_resumes_after_key() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        let out = fetcher
            .fetch(&Params { after: Some("101".into()), limit: 2, ..Default::default() })
            .unwrap();
        assert_eq!(out.rows[0][0].as_text(), "200");
        assert_eq!(out.total, 5);

        // Unknown cursor restarts from the top.
        let out = fetcher
            .fetch(&Params { after: Some("999".into()), limit: 1, ..Default::default() })
            .unwrap();
        assert_eq!(out.rows[0][0].as_text(), "100");
    }

    #[test]
    fn test_identity_lookup_is_substring_and_capped() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        let params = Params {
            identity: IdentityFilters { primary_id: Some("10".into()), ..Default::default() },
            ..Default::default()
        };
        let out = fetcher.fetch(&params).unwrap();
        // "10" is a substring of keys 100 and 101 only.
        assert_eq!(out.total, 2);
    }

    #[test]
    fn test_identity_lookup_merges_columns_without_duplicates() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        let params = Params {
            identity: IdentityFilters {
                primary_id: Some("100".into()),
                address: Some("Ana Costa".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let out = fetcher.fetch(&params).unwrap();
        assert_eq!(out.total, 1);
    }

    #[test]
    fn test_search_post_filters_fields() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        let mut params = Params {
            query: Some("paulista".into()),
            ..Default::default()
        };
        params.field_filters.insert("Status".into(), "Ativo".into());
        let out = fetcher.fetch(&params).unwrap();
        assert_eq!(out.total, 2);
    }

    #[test]
    fn test_filtered_scan_total_is_match_count() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        let mut params = Params { limit: 1, ..Default::default() };
        params.field_filters.insert("Status".into(), "Ativo".into());
        let out = fetcher.fetch(&params).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.total, 4);
    }

    #[test]
    fn test_field_filter_is_whole_cell_equality() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        // "Ativo" is a substring of "Inativo"; whole-cell comparison must
        // not let the Inativo row through. Trim and case still fold.
        let mut params = Params::default();
        params.field_filters.insert("Status".into(), " ativo ".into());
        let out = fetcher.fetch(&params).unwrap();
        assert_eq!(out.total, 4);
        assert!(out.rows.iter().all(|row| row[3].as_text() != "Inativo"));
    }

    #[test]
    fn test_unresolved_filter_column_matches_nothing() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        let mut params = Params::default();
        params.field_filters.insert("No Such Column".into(), "x".into());
        let out = fetcher.fetch(&params).unwrap();
        assert_eq!(out.total, 0);
    }

    #[test]
    fn test_geo_filter_excludes_far_and_coordinate_less_rows() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        // Centered on Santos; the Paulista rows are ~60 km away and the
        // Mauá row has no coordinates.
        let params = Params {
            geo: Some(GeoFilter::new(-23.96, -46.33)),
            ..Default::default()
        };
        let out = fetcher.fetch(&params).unwrap();
        assert_eq!(out.total, 2);
    }

    #[test]
    fn test_link_overlay_substitutes_url() {
        let source = asset_source();
        let registry = LayerRegistry::builtin();
        let fetcher = fetcher(&source, &registry);

        let out = fetcher.fetch(&Params { limit: 1, ..Default::default() }).unwrap();
        assert_eq!(out.rows[0][6].as_text(), "https://photos.example/100");

        let params = Params {
            identity: IdentityFilters { primary_id: Some("100".into()), ..Default::default() },
            ..Default::default()
        };
        let out = fetcher.fetch(&params).unwrap();
        assert_eq!(out.rows[0][6].as_text(), "https://photos.example/100");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Santos to São Paulo center is roughly 55-60 km.
        let d = haversine_km(-23.96, -46.33, -23.55, -46.63);
        assert!(d > 50.0 && d < 65.0, "got {d}");
        assert!(haversine_km(1.0, 2.0, 1.0, 2.0) < 1e-9);
    }
}
