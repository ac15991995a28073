//! FILENAME: query-engine/src/merge.rs
//! Record enrichment: full and summary merged views.
//!
//! Merging never fails: a record whose key finds no index entry carries
//! explicit `null` enrichment fields. Panel and hub filters, however,
//! have inner-join semantics — when active they drop the records they
//! cannot positively match.

use crate::index::{base_key, HubEntry, PanelEntry};
use crate::params::{HubFilters, PanelFilters, Params};
use crate::view::Record;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tabular::{normalize_header, CellValue};

/// The column names records are joined on.
pub struct MergeKeys<'a> {
    /// Joins the panel index.
    pub primary: Option<&'a str>,

    /// Joins the safety-hub index, with base-key fallback.
    pub secondary: Option<&'a str>,
}

/// A primary record with full enrichment structures attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    #[serde(flatten)]
    pub fields: Record,

    /// `None` serializes as an explicit `null`: consumers can tell
    /// "no panels" apart from "field never merged".
    pub panels: Option<PanelEntry>,
    pub safety_hub: Option<HubEntry>,
}

/// A primary record with enrichment flattened to scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(flatten)]
    pub fields: Record,

    pub digital_panels: f64,
    pub static_panels: f64,
    pub total_panels: f64,
    pub has_digital: bool,
    pub has_static: bool,
    pub shelter_model: Option<String>,
    pub has_safety_hub: bool,
    pub safety_hub_sponsor: Option<String>,
}

/// A record field as non-empty text. Exact name first, then normalized
/// equality; projected records carry trimmed headers, so no substring
/// phase is needed here.
fn field_text(record: &Record, name: &str) -> Option<String> {
    let cell = match record.get(name.trim()) {
        Some(cell) => Some(cell),
        None => {
            let target = normalize_header(name);
            record
                .iter()
                .find(|(k, _)| normalize_header(k) == target)
                .map(|(_, cell)| cell)
        }
    };
    cell.map(CellValue::as_text).filter(|t| !t.is_empty())
}

/// Verbatim key first, base key second.
fn lookup<'i, T>(index: &'i FxHashMap<String, T>, key: &str) -> Option<&'i T> {
    index
        .get(key)
        .or_else(|| base_key(key).and_then(|base| index.get(base)))
}

pub(crate) fn panel_matches(entry: &PanelEntry, filters: &PanelFilters) -> bool {
    filters.has_digital.map_or(true, |want| entry.has_digital == want)
        && filters.has_static.map_or(true, |want| entry.has_static == want)
        && filters.shelter_model.as_deref().map_or(true, |want| {
            entry
                .shelter_model
                .as_deref()
                .map_or(false, |model| model.eq_ignore_ascii_case(want.trim()))
        })
}

pub(crate) fn hub_matches(entry: Option<&HubEntry>, filters: &HubFilters) -> bool {
    if let Some(want) = filters.has_hub {
        let has = entry.map_or(false, |e| e.enabled);
        if has != want {
            return false;
        }
    }
    if let Some(sponsor) = &filters.sponsor {
        let needle = sponsor.trim().to_lowercase();
        let hit = entry
            .and_then(|e| e.sponsor.as_deref())
            .map_or(false, |s| s.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    true
}

fn keep(panel: Option<&PanelEntry>, hub: Option<&HubEntry>, params: &Params) -> bool {
    if params.panel.is_active() {
        match panel {
            Some(entry) if panel_matches(entry, &params.panel) => {}
            _ => return false,
        }
    }
    if params.hub.is_active() && !hub_matches(hub, &params.hub) {
        return false;
    }
    true
}

/// Enriches records with full panel and hub structures.
pub fn merge_full(
    records: &[Record],
    keys: &MergeKeys,
    panels: &FxHashMap<String, PanelEntry>,
    hub: &FxHashMap<String, HubEntry>,
    params: &Params,
) -> Vec<MergedRecord> {
    records
        .iter()
        .filter_map(|record| {
            let panel_entry = keys
                .primary
                .and_then(|k| field_text(record, k))
                .and_then(|k| lookup(panels, &k));
            let hub_entry = keys
                .secondary
                .and_then(|k| field_text(record, k))
                .and_then(|k| lookup(hub, &k));

            if !keep(panel_entry, hub_entry, params) {
                return None;
            }
            Some(MergedRecord {
                fields: record.clone(),
                panels: panel_entry.cloned(),
                safety_hub: hub_entry.cloned(),
            })
        })
        .collect()
}

/// Enriches records with enrichment flattened to scalar fields.
pub fn merge_summary(
    records: &[Record],
    keys: &MergeKeys,
    panels: &FxHashMap<String, PanelEntry>,
    hub: &FxHashMap<String, HubEntry>,
    params: &Params,
) -> Vec<SummaryRecord> {
    records
        .iter()
        .filter_map(|record| {
            let panel_entry = keys
                .primary
                .and_then(|k| field_text(record, k))
                .and_then(|k| lookup(panels, &k));
            let hub_entry = keys
                .secondary
                .and_then(|k| field_text(record, k))
                .and_then(|k| lookup(hub, &k));

            if !keep(panel_entry, hub_entry, params) {
                return None;
            }
            Some(SummaryRecord {
                fields: record.clone(),
                digital_panels: panel_entry.map_or(0.0, |e| e.digital.boxes),
                static_panels: panel_entry.map_or(0.0, |e| e.static_.boxes),
                total_panels: panel_entry.map_or(0.0, |e| e.total_panels),
                has_digital: panel_entry.map_or(false, |e| e.has_digital),
                has_static: panel_entry.map_or(false, |e| e.has_static),
                shelter_model: panel_entry.and_then(|e| e.shelter_model.clone()),
                has_safety_hub: hub_entry.map_or(false, |e| e.enabled),
                safety_hub_sponsor: hub_entry.and_then(|e| e.sponsor.clone()),
            })
        })
        .collect()
}
