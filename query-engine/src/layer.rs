//! FILENAME: query-engine/src/layer.rs
//! Layer configuration and registry.
//!
//! A layer binds an id to a source tab, a fetch/merge behavior and the
//! column names the engine needs to know about. The registry is the
//! engine's only routing table; `builtin()` mirrors the production
//! deployment and is what tests and demos start from.

use aggregate_engine::{BacklogColumns, RankingColumns, RollupColumns};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The two coordinate columns a geo filter reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoColumns {
    pub lat: String,
    pub lon: String,
}

/// Which other layers a merged view is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeComposition {
    /// Primary layer whose records are enriched.
    pub base: String,
    /// Layer providing the panel index.
    pub panels: String,
    /// Layer providing the safety-hub index.
    pub safety_hub: String,
}

/// What a layer's records are and how they are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    /// Row-per-record tab served through the strategy planner.
    Primary,

    /// Standalone listing of the panel inventory index.
    Panels,

    /// Standalone listing of the safety-hub index.
    SafetyHub,

    /// Primary records enriched with full panel and hub structures.
    Full(MergeComposition),

    /// Primary records enriched with flattened scalar rollups.
    Summary(MergeComposition),

    /// Maintenance rollup dashboard.
    Rollup(RollupColumns),

    /// Damage-report ranking dashboard.
    Ranking(RankingColumns),

    /// Open-tickets backlog dashboard.
    Backlog(BacklogColumns),
}

impl LayerKind {
    fn label(&self) -> &'static str {
        match self {
            LayerKind::Primary => "primary",
            LayerKind::Panels => "panels",
            LayerKind::SafetyHub => "safety_hub",
            LayerKind::Full(_) => "full",
            LayerKind::Summary(_) => "summary",
            LayerKind::Rollup(_) => "rollup",
            LayerKind::Ranking(_) => "ranking",
            LayerKind::Backlog(_) => "backlog",
        }
    }

    fn filters(&self) -> Vec<&'static str> {
        match self {
            LayerKind::Primary => vec![
                "primary_id", "secondary_id", "address", "query", "after",
                "field_filters", "geo", "fields",
            ],
            LayerKind::Panels => vec!["has_digital", "has_static", "shelter_model"],
            LayerKind::SafetyHub => vec!["has_hub", "sponsor"],
            LayerKind::Full(_) | LayerKind::Summary(_) => vec![
                "primary_id", "secondary_id", "address", "query", "after",
                "field_filters", "geo", "fields", "has_digital", "has_static",
                "shelter_model", "has_hub", "sponsor",
            ],
            LayerKind::Rollup(_) => vec!["branch", "period", "aggregate"],
            LayerKind::Ranking(_) => vec!["category", "top"],
            LayerKind::Backlog(_) => vec!["status", "origin"],
        }
    }
}

/// Full configuration of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub id: String,
    pub kind: LayerKind,

    /// Source id the engine resolves a `TabularSource` with. Merged
    /// views have none of their own.
    pub source: Option<String>,

    pub display_name: String,

    /// Primary key column; also the cursor column.
    pub join_key: Option<String>,

    /// Secondary key column used for hub joins and identifier lookups.
    pub secondary_join_key: Option<String>,

    /// Column searched by the address identifier filter.
    pub address_column: Option<String>,

    /// Columns whose cells carry links to resolve into the records.
    pub link_columns: Vec<String>,

    pub geo: Option<GeoColumns>,

    /// Result and index TTL for this layer, in seconds.
    pub cache_seconds: u64,

    /// Columns dropped from every record of this layer.
    pub exclude_columns: Vec<String>,

    /// When set, records only ever contain these columns.
    pub field_allowlist: Option<Vec<String>>,
}

impl LayerConfig {
    pub fn new(id: &str, kind: LayerKind) -> Self {
        LayerConfig {
            id: id.to_string(),
            kind,
            source: None,
            display_name: id.to_string(),
            join_key: None,
            secondary_join_key: None,
            address_column: None,
            link_columns: Vec::new(),
            geo: None,
            cache_seconds: 600,
            exclude_columns: Vec::new(),
            field_allowlist: None,
        }
    }
}

/// Introspection record returned by the meta operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub id: String,
    pub kind: String,
    pub display_name: String,
    pub source: Option<String>,
    pub join_key: Option<String>,
    pub cache_seconds: u64,

    /// Layer ids a merged view composes; empty otherwise.
    pub composes: Vec<String>,

    /// Filter names this layer honors.
    pub filters: Vec<String>,
}

/// Ordered layer table. Registration order is the order `describe`
/// reports.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<LayerConfig>,
    positions: FxHashMap<String, usize>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        LayerRegistry::default()
    }

    /// Registers or replaces a layer under its id.
    pub fn register(&mut self, layer: LayerConfig) {
        match self.positions.get(&layer.id) {
            Some(&i) => self.layers[i] = layer,
            None => {
                self.positions.insert(layer.id.clone(), self.layers.len());
                self.layers.push(layer);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&LayerConfig> {
        self.positions.get(id).map(|&i| &self.layers[i])
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.id.as_str())
    }

    /// Catalog of every registered layer, for the meta endpoint.
    pub fn describe(&self) -> Vec<LayerDescriptor> {
        self.layers
            .iter()
            .map(|layer| {
                let composes = match &layer.kind {
                    LayerKind::Full(c) | LayerKind::Summary(c) => {
                        vec![c.base.clone(), c.panels.clone(), c.safety_hub.clone()]
                    }
                    _ => Vec::new(),
                };
                LayerDescriptor {
                    id: layer.id.clone(),
                    kind: layer.kind.label().to_string(),
                    display_name: layer.display_name.clone(),
                    source: layer.source.clone(),
                    join_key: layer.join_key.clone(),
                    cache_seconds: layer.cache_seconds,
                    composes,
                    filters: layer.kind.filters().iter().map(|f| f.to_string()).collect(),
                }
            })
            .collect()
    }

    /// The production layer set.
    pub fn builtin() -> Self {
        let mut registry = LayerRegistry::new();

        let mut main = LayerConfig::new("main", LayerKind::Primary);
        main.source = Some("assets".into());
        main.display_name = "Asset Register".into();
        main.join_key = Some("Nº Eletro".into());
        main.secondary_join_key = Some("Nº Parada".into());
        main.address_column = Some("Endereço".into());
        main.link_columns = vec!["Foto Referência".into(), "Link Operações".into()];
        main.geo = Some(GeoColumns { lat: "Latitude".into(), lon: "Longitude".into() });
        main.cache_seconds = 300;
        registry.register(main);

        let mut panels = LayerConfig::new("panels", LayerKind::Panels);
        panels.source = Some("panels".into());
        panels.display_name = "Panel Inventory".into();
        panels.join_key = Some("Nº Eletro".into());
        panels.exclude_columns = vec!["Nº PARADA NOVO".into()];
        registry.register(panels);

        let mut hub = LayerConfig::new("safetyhub", LayerKind::SafetyHub);
        hub.source = Some("safety-hub".into());
        hub.display_name = "Safety Hub Program".into();
        hub.join_key = Some("Nº PARADA".into());
        registry.register(hub);

        let composition = MergeComposition {
            base: "main".into(),
            panels: "panels".into(),
            safety_hub: "safetyhub".into(),
        };

        let mut full = LayerConfig::new("full", LayerKind::Full(composition.clone()));
        full.display_name = "Assets, Fully Enriched".into();
        full.cache_seconds = 300;
        registry.register(full);

        let mut summary = LayerConfig::new("summary", LayerKind::Summary(composition));
        summary.display_name = "Assets, Summary Rollup".into();
        summary.cache_seconds = 300;
        registry.register(summary);

        let mut maintenance =
            LayerConfig::new("maintenance", LayerKind::Rollup(RollupColumns::default()));
        maintenance.source = Some("maintenance".into());
        maintenance.display_name = "Weekly Maintenance Plan".into();
        registry.register(maintenance);

        let mut damages =
            LayerConfig::new("damages", LayerKind::Ranking(RankingColumns::default()));
        damages.source = Some("damages".into());
        damages.display_name = "Damage Reports".into();
        registry.register(damages);

        let mut tickets =
            LayerConfig::new("tickets", LayerKind::Backlog(BacklogColumns::default()));
        tickets.source = Some("tickets".into());
        tickets.display_name = "Open Tickets".into();
        registry.register(tickets);

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_layers_resolve() {
        let registry = LayerRegistry::builtin();
        for id in ["main", "panels", "safetyhub", "full", "summary", "maintenance", "damages", "tickets"] {
            assert!(registry.get(id).is_some(), "missing layer {id}");
        }
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = LayerRegistry::builtin();
        let before: Vec<String> = registry.ids().map(str::to_string).collect();

        let mut main = LayerConfig::new("main", LayerKind::Primary);
        main.cache_seconds = 7;
        registry.register(main);

        let after: Vec<String> = registry.ids().map(str::to_string).collect();
        assert_eq!(before, after);
        assert_eq!(registry.get("main").unwrap().cache_seconds, 7);
    }

    #[test]
    fn test_describe_reports_composition() {
        let registry = LayerRegistry::builtin();
        let catalog = registry.describe();
        let full = catalog.iter().find(|d| d.id == "full").unwrap();
        assert_eq!(full.kind, "full");
        assert_eq!(full.composes, vec!["main", "panels", "safetyhub"]);
        assert!(full.filters.iter().any(|f| f == "has_digital"));

        let main = catalog.iter().find(|d| d.id == "main").unwrap();
        assert!(main.composes.is_empty());
        assert_eq!(main.join_key.as_deref(), Some("Nº Eletro"));
    }
}
