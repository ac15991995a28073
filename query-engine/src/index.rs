//! FILENAME: query-engine/src/index.rs
//! Cached enrichment indices: panel inventory and safety-hub program.
//!
//! Index construction is deliberately non-fatal. A missing source, an
//! unreadable tab or an unresolvable key column degrades to an empty
//! index and a warning; the merged views then serve unenriched records
//! rather than failing the whole request.
//!
//! Keys are registered twice where they carry a suffix: "42-1" claims
//! both "42-1" and the base "42". The full key always wins its own slot;
//! the base slot belongs to whoever writes it last with the exact key,
//! otherwise to the first suffixed claimant.

use crate::cache::{index_key, CacheManager};
use crate::layer::LayerConfig;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tabular::{parse_quantity, CellValue, HeaderMap, Row, SourceError, TabularSource};
use tracing::warn;

// Expected column names of the panel inventory tab. Resolution is
// fuzzy, so renames that keep the words survive.
const COL_DIGITAL_BOXES: &str = "QTDE. CAIXA DIGITAL";
const COL_DIGITAL_FACES: &str = "FACE DIGITAL";
const COL_DIGITAL_POSITION: &str = "DIGITAL POSIÇÃO";
const COL_DIGITAL_MOUNT: &str = "DIGITAL TIPO";
const COL_DIGITAL_BRAND: &str = "TIPO DE PAINEL DIGITAL";
const COL_STATIC_BOXES: &str = "QTDE. CAIXA ESTATICA";
const COL_STATIC_FACES: &str = "FACE ESTATICA";
const COL_STATIC_POSITION: &str = "ESTATICO POSIÇÃO";
const COL_STATIC_MOUNT: &str = "ESTATICO TIPOS";
const COL_SHELTER_MODEL: &str = "Modelo de Abrigo";
const COL_OBSERVATION: &str = "OBSERVAÇÃO";

// Safety-hub tab columns.
const COL_HUB_STATUS: &str = "ATIVO";
const COL_HUB_SPONSOR: &str = "CLIENTE";

/// One panel family (digital or static) at an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelGroup {
    pub boxes: f64,
    pub faces: f64,
    pub position: Option<String>,
    pub mount: Option<String>,
    pub brand: Option<String>,
}

/// Panel inventory of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelEntry {
    pub digital: PanelGroup,
    #[serde(rename = "static")]
    pub static_: PanelGroup,
    pub shelter_model: Option<String>,
    pub observation: Option<String>,
    pub has_digital: bool,
    pub has_static: bool,
    pub total_panels: f64,
}

/// Safety-hub enrollment of one stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEntry {
    pub enabled: bool,
    pub sponsor: Option<String>,

    /// The key exactly as it appears in the tab, suffix included.
    pub original_key: String,
}

/// The base form of a suffixed key: everything before the first `-`.
/// `None` when there is no suffix to strip.
pub fn base_key(key: &str) -> Option<&str> {
    match key.split_once('-') {
        Some((base, _)) if !base.is_empty() => Some(base),
        _ => None,
    }
}

/// Registers `entry` under its full key unconditionally and under its
/// base key only if the base slot is still vacant.
pub fn insert_with_base<T: Clone>(index: &mut FxHashMap<String, T>, key: &str, entry: T) {
    if let Some(base) = base_key(key) {
        let base = base.to_string();
        index.entry(base).or_insert_with(|| entry.clone());
    }
    index.insert(key.to_string(), entry);
}

/// A key that cannot anchor an index entry: blank or a spreadsheet
/// error artifact.
fn is_placeholder(key: &str) -> bool {
    key.is_empty() || key.eq_ignore_ascii_case("undefined") || key.eq_ignore_ascii_case("#n/a")
}

fn text_opt(row: &Row, idx: Option<usize>) -> Option<String> {
    let text = idx.and_then(|i| row.get(i)).map(CellValue::as_text)?;
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn quantity(row: &Row, idx: Option<usize>) -> f64 {
    idx.and_then(|i| row.get(i)).map(parse_quantity).unwrap_or(0.0)
}

/// "BRT MOBILIDADE" -> "Brt mobilidade". Only the first character is
/// raised; later words stay lowercased.
fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.extend(chars.flat_map(char::to_lowercase));
            out
        }
    }
}

fn read_all(source: &dyn TabularSource) -> Result<(HeaderMap, Vec<Row>), SourceError> {
    let map = HeaderMap::new(&source.headers()?);
    let total = source.row_count()?;
    let rows = source.rows(0, total)?;
    Ok((map, rows))
}

// ============================================================================
// PANEL INDEX
// ============================================================================

fn panel_entries(
    source: &dyn TabularSource,
    layer: &LayerConfig,
) -> Result<FxHashMap<String, PanelEntry>, SourceError> {
    let (map, rows) = read_all(source)?;
    let Some(key_col) = layer.join_key.as_deref().and_then(|k| map.resolve(k)) else {
        warn!(layer = %layer.id, "panel key column not found, index empty");
        return Ok(FxHashMap::default());
    };

    let digital_boxes = map.resolve(COL_DIGITAL_BOXES);
    let digital_faces = map.resolve(COL_DIGITAL_FACES);
    let digital_position = map.resolve(COL_DIGITAL_POSITION);
    let digital_mount = map.resolve(COL_DIGITAL_MOUNT);
    let digital_brand = map.resolve(COL_DIGITAL_BRAND);
    let static_boxes = map.resolve(COL_STATIC_BOXES);
    let static_faces = map.resolve(COL_STATIC_FACES);
    let static_position = map.resolve(COL_STATIC_POSITION);
    let static_mount = map.resolve_any(&[COL_STATIC_MOUNT, "ESTATICO TIPO"]);
    let shelter_model = map.resolve(COL_SHELTER_MODEL);
    let observation = map.resolve(COL_OBSERVATION);

    let mut index = FxHashMap::default();
    for row in &rows {
        let key = row.get(key_col).map(CellValue::as_text).unwrap_or_default();
        if is_placeholder(&key) {
            continue;
        }

        let digital = PanelGroup {
            boxes: quantity(row, digital_boxes),
            faces: quantity(row, digital_faces),
            position: text_opt(row, digital_position),
            mount: text_opt(row, digital_mount),
            brand: text_opt(row, digital_brand),
        };
        let static_ = PanelGroup {
            boxes: quantity(row, static_boxes),
            faces: quantity(row, static_faces),
            position: text_opt(row, static_position),
            mount: text_opt(row, static_mount),
            brand: None,
        };

        // A family counts as present when either count is recorded; the
        // sheets often carry boxes with the faces cell left blank.
        let entry = PanelEntry {
            has_digital: digital.boxes > 0.0 || digital.faces > 0.0,
            has_static: static_.boxes > 0.0 || static_.faces > 0.0,
            total_panels: digital.boxes + static_.boxes,
            shelter_model: text_opt(row, shelter_model),
            observation: text_opt(row, observation),
            digital,
            static_,
        };
        insert_with_base(&mut index, &key, entry);
    }
    Ok(index)
}

/// The panel index for `layer`, from cache when fresh.
pub fn build_panel_index(
    source: Option<&dyn TabularSource>,
    layer: &LayerConfig,
    cache: &CacheManager,
) -> FxHashMap<String, PanelEntry> {
    let key = index_key(&layer.id);
    if let Some(index) = cache.get_json(&key) {
        return index;
    }

    let Some(source) = source else {
        warn!(layer = %layer.id, "panel source missing, serving unenriched");
        return FxHashMap::default();
    };
    match panel_entries(source, layer) {
        Ok(index) => {
            cache.put_json(&key, &index, layer.cache_seconds);
            index
        }
        Err(err) => {
            warn!(layer = %layer.id, %err, "panel index build failed, serving unenriched");
            FxHashMap::default()
        }
    }
}

// ============================================================================
// SAFETY-HUB INDEX
// ============================================================================

fn hub_entries(
    source: &dyn TabularSource,
    layer: &LayerConfig,
) -> Result<FxHashMap<String, HubEntry>, SourceError> {
    let (map, rows) = read_all(source)?;
    let Some(key_col) = layer.join_key.as_deref().and_then(|k| map.resolve(k)) else {
        warn!(layer = %layer.id, "hub key column not found, index empty");
        return Ok(FxHashMap::default());
    };

    let status = map.resolve(COL_HUB_STATUS);
    let sponsor = map.resolve(COL_HUB_SPONSOR);

    let mut index = FxHashMap::default();
    for row in &rows {
        let key = row.get(key_col).map(CellValue::as_text).unwrap_or_default();
        if is_placeholder(&key) {
            continue;
        }

        // Presence in the tab means enrolled; an explicit status column
        // can turn an entry off.
        let enabled = match status.and_then(|i| row.get(i)) {
            None => true,
            Some(cell) => matches!(
                cell.as_text().to_lowercase().as_str(),
                "" | "sim" | "true" | "ativo" | "x" | "1"
            ),
        };

        let entry = HubEntry {
            enabled,
            sponsor: text_opt(row, sponsor).map(|s| capitalize(&s)),
            original_key: key.clone(),
        };
        insert_with_base(&mut index, &key, entry);
    }
    Ok(index)
}

/// The safety-hub index for `layer`, from cache when fresh.
pub fn build_hub_index(
    source: Option<&dyn TabularSource>,
    layer: &LayerConfig,
    cache: &CacheManager,
) -> FxHashMap<String, HubEntry> {
    let key = index_key(&layer.id);
    if let Some(index) = cache.get_json(&key) {
        return index;
    }

    let Some(source) = source else {
        warn!(layer = %layer.id, "hub source missing, serving unenriched");
        return FxHashMap::default();
    };
    match hub_entries(source, layer) {
        Ok(index) => {
            cache.put_json(&key, &index, layer.cache_seconds);
            index
        }
        Err(err) => {
            warn!(layer = %layer.id, %err, "hub index build failed, serving unenriched");
            FxHashMap::default()
        }
    }
}
