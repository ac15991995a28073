//! FILENAME: tabular/src/lib.rs
//! Shared foundation for the layer-mesh reporting engine.
//!
//! This crate holds everything the query and aggregation engines have in
//! common but that belongs to neither of them:
//! - `cell`: the raw cell value type rows are made of
//! - `header`: fuzzy column-name resolution (the sources disagree on
//!   casing, diacritics and whitespace, so every column lookup goes
//!   through a normalized header map)
//! - `numeric`: locale-aware number and percentage parsing
//! - `source`: the tabular-storage collaborator trait plus an in-memory
//!   implementation used by tests
//! - `cache`: the byte-oriented, best-effort cache collaborator trait
//!   plus an in-memory TTL implementation

pub mod cache;
pub mod cell;
pub mod header;
pub mod numeric;
pub mod source;

pub use cache::{ByteCache, MemoryCache};
pub use cell::CellValue;
pub use header::{normalize_header, HeaderMap};
pub use numeric::{parse_fraction, parse_quantity};
pub use source::{MemorySource, Row, SourceError, TabularSource};
