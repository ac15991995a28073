//! FILENAME: query-engine/src/cache.rs
//! Cache keys, payload envelopes and the JSON cache manager.
//!
//! Keys are deterministic functions of (layer, params): two requests
//! asking for the same thing hit the same entry regardless of how the
//! caller spelled them. `no_cache` never participates in the key, so a
//! bypassing request refreshes the entry everyone else reads.

use crate::layer::LayerConfig;
use crate::params::Params;
use crate::view::Record;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tabular::ByteCache;
use tracing::{debug, warn};

/// Bumped whenever the cached payload shape changes; old entries then
/// simply miss.
pub const SCHEMA_TAG: &str = "v1";

/// Backend key-length ceiling. Keys are truncated, not rejected.
pub const MAX_KEY_LEN: usize = 250;

/// Entries over this many serialized bytes are silently not cached.
pub const MAX_PAYLOAD_BYTES: usize = 100_000;

/// TTL for free-text search results; other requests use the layer TTL.
pub const SEARCH_TTL_SECS: u64 = 120;

fn truncate_key(mut key: String) -> String {
    if key.len() > MAX_KEY_LEN {
        let mut end = MAX_KEY_LEN;
        while !key.is_char_boundary(end) {
            end -= 1;
        }
        key.truncate(end);
    }
    key
}

/// Key for a cached result page.
pub fn result_key(layer_id: &str, params: &Params) -> String {
    let mut parts: Vec<String> = vec![
        SCHEMA_TAG.to_string(),
        layer_id.to_string(),
        format!("s:{}", params.start),
        format!("l:{}", params.clamped_limit()),
    ];

    if let Some(id) = &params.identity.primary_id {
        parts.push(format!("pid:{}", id.trim().to_lowercase()));
    }
    if let Some(id) = &params.identity.secondary_id {
        parts.push(format!("sid:{}", id.trim().to_lowercase()));
    }
    if let Some(addr) = &params.identity.address {
        parts.push(format!("addr:{}", addr.trim().to_lowercase()));
    }
    if let Some(needle) = params.text_needle() {
        parts.push(format!("q:{}", needle.to_lowercase()));
    }
    if let Some(after) = &params.after {
        parts.push(format!("a:{}", after.trim()));
    }
    // BTreeMap iteration keeps filter order canonical.
    for (column, value) in &params.field_filters {
        parts.push(format!("f:{column}={value}"));
    }
    if let Some(flag) = params.panel.has_digital {
        parts.push(format!("hd:{flag}"));
    }
    if let Some(flag) = params.panel.has_static {
        parts.push(format!("hs:{flag}"));
    }
    if let Some(model) = &params.panel.shelter_model {
        parts.push(format!("mod:{}", model.trim().to_lowercase()));
    }
    if let Some(flag) = params.hub.has_hub {
        parts.push(format!("hub:{flag}"));
    }
    if let Some(sponsor) = &params.hub.sponsor {
        parts.push(format!("sp:{}", sponsor.trim().to_lowercase()));
    }

    let dash = &params.dashboard;
    if let Some(branch) = &dash.filters.branch {
        parts.push(format!("br:{}", branch.trim().to_lowercase()));
    }
    if let Some(period) = &dash.filters.period {
        parts.push(format!("per:{}", period.trim().to_lowercase()));
    }
    if let Some(category) = &dash.filters.category {
        parts.push(format!("cat:{}", category.trim().to_lowercase()));
    }
    if let Some(status) = &dash.filters.status {
        parts.push(format!("st:{}", status.trim().to_lowercase()));
    }
    if let Some(origin) = &dash.filters.origin {
        parts.push(format!("or:{}", origin.trim().to_lowercase()));
    }
    if dash.aggregate {
        parts.push("agg".to_string());
    }
    if let Some(top) = dash.top {
        parts.push(format!("top:{top}"));
    }

    if let Some(geo) = &params.geo {
        let p = geo.precision as usize;
        parts.push(format!("g:{:.p$},{:.p$},{}", geo.lat, geo.lon, geo.radius_km));
    }
    if let Some(fields) = &params.fields {
        parts.push(format!("fl:{}", fields.join(",")));
    }

    truncate_key(parts.join("|"))
}

/// Key for a layer's enrichment index.
pub fn index_key(layer_id: &str) -> String {
    format!("idx|{SCHEMA_TAG}|{layer_id}")
}

/// Key for a dashboard layer's typed snapshot.
pub fn snapshot_key(layer_id: &str) -> String {
    format!("snap|{SCHEMA_TAG}|{layer_id}")
}

/// TTL for a result entry.
pub fn ttl_for(layer: &LayerConfig, params: &Params) -> u64 {
    if params.text_needle().is_some() {
        SEARCH_TTL_SECS
    } else {
        layer.cache_seconds
    }
}

/// Cached page of projected records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPage {
    pub records: Vec<Record>,
    pub total: usize,
    pub expires_at: DateTime<Utc>,
}

/// Cached typed snapshot of a dashboard tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSnapshot<T> {
    pub records: Vec<T>,
    pub expires_at: DateTime<Utc>,
}

/// JSON-speaking wrapper over the byte cache. Every failure mode is a
/// miss or a silent skip; callers never branch on cache errors.
#[derive(Clone)]
pub struct CacheManager {
    cache: Arc<dyn ByteCache>,
}

impl CacheManager {
    pub fn new(cache: Arc<dyn ByteCache>) -> Self {
        CacheManager { cache }
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.cache.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, %err, "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    pub fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key, %err, "cache entry failed to serialize");
                return;
            }
        };
        if bytes.len() > MAX_PAYLOAD_BYTES {
            debug!(key, size = bytes.len(), "payload over cache ceiling, skipped");
            return;
        }
        self.cache.put(key, &bytes, Duration::from_secs(ttl_secs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GeoFilter;
    use tabular::MemoryCache;

    #[test]
    fn test_identical_params_share_a_key() {
        let a = Params { query: Some("  Terminal ".into()), ..Default::default() };
        let b = Params { query: Some("terminal".into()), ..Default::default() };
        assert_eq!(result_key("main", &a), result_key("main", &b));
    }

    #[test]
    fn test_no_cache_is_not_part_of_the_key() {
        let a = Params::default();
        let b = Params { no_cache: true, ..Default::default() };
        assert_eq!(result_key("main", &a), result_key("main", &b));
    }

    #[test]
    fn test_differing_filters_differ() {
        let a = Params::default();
        let mut b = Params::default();
        b.field_filters.insert("Status".into(), "Ativo".into());
        assert_ne!(result_key("main", &a), result_key("main", &b));
        assert_ne!(result_key("main", &a), result_key("full", &a));
    }

    #[test]
    fn test_geo_coordinates_round_to_precision() {
        let a = Params { geo: Some(GeoFilter::new(-23.96001, -46.33)), ..Default::default() };
        let b = Params { geo: Some(GeoFilter::new(-23.960011, -46.33)), ..Default::default() };
        assert_eq!(result_key("main", &a), result_key("main", &b));
    }

    #[test]
    fn test_key_truncates_on_char_boundary() {
        let mut params = Params::default();
        params.identity.address = Some("Praça ".repeat(80));
        let key = result_key("main", &params);
        assert!(key.len() <= MAX_KEY_LEN);
        // Must still be valid UTF-8 up to the cut.
        assert!(key.is_char_boundary(key.len()));
    }

    #[test]
    fn test_manager_round_trip_and_corrupt_miss() {
        let cache: Arc<dyn ByteCache> = Arc::new(MemoryCache::new());
        let manager = CacheManager::new(Arc::clone(&cache));

        manager.put_json("k", &vec![1u32, 2, 3], 60);
        assert_eq!(manager.get_json::<Vec<u32>>("k"), Some(vec![1, 2, 3]));

        cache.put("bad", b"{not json", Duration::from_secs(60));
        assert_eq!(manager.get_json::<Vec<u32>>("bad"), None);
    }

    #[test]
    fn test_oversized_payload_is_skipped() {
        let manager = CacheManager::new(Arc::new(MemoryCache::new()));
        let big = vec!["x".repeat(1024); 200];
        manager.put_json("big", &big, 60);
        assert_eq!(manager.get_json::<Vec<String>>("big"), None);
    }
}
