//! FILENAME: query-engine/src/plan.rs
//! Strategy selection.
//!
//! Exactly one strategy answers a request. Priority is fixed: identifier
//! lookups beat free-text search, which beats cursor continuation, which
//! beats filtered scans; a plain chunk download is the fallback.

use crate::params::Params;

/// How a primary-layer request will be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Targeted lookup on the layer's key columns.
    KeyIdentifier,

    /// Substring search across all columns.
    FreeText,

    /// Keyset continuation after a known primary-key value.
    Cursor,

    /// Full scan with field and/or geo predicates.
    FilteredScan,

    /// Contiguous offset/limit window.
    Chunk,
}

pub fn plan(params: &Params) -> Strategy {
    if params.identity.is_active() {
        Strategy::KeyIdentifier
    } else if params.text_needle().is_some() {
        Strategy::FreeText
    } else if params.after.is_some() {
        Strategy::Cursor
    } else if params.needs_scan() {
        Strategy::FilteredScan
    } else {
        Strategy::Chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{GeoFilter, IdentityFilters};

    #[test]
    fn test_priority_order() {
        let mut params = Params::default();
        assert_eq!(plan(&params), Strategy::Chunk);

        params.geo = Some(GeoFilter::new(0.0, 0.0));
        assert_eq!(plan(&params), Strategy::FilteredScan);

        params.after = Some("100".into());
        assert_eq!(plan(&params), Strategy::Cursor);

        params.query = Some("terminal".into());
        assert_eq!(plan(&params), Strategy::FreeText);

        params.identity = IdentityFilters { primary_id: Some("42".into()), ..Default::default() };
        assert_eq!(plan(&params), Strategy::KeyIdentifier);
    }

    #[test]
    fn test_short_needle_falls_through() {
        let params = Params {
            query: Some("x".into()),
            after: Some("7".into()),
            ..Default::default()
        };
        assert_eq!(plan(&params), Strategy::Cursor);
    }

    #[test]
    fn test_field_filters_force_scan() {
        let mut params = Params::default();
        params.field_filters.insert("Status".into(), "Ativo".into());
        assert_eq!(plan(&params), Strategy::FilteredScan);
    }
}
