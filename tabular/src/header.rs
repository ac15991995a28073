//! FILENAME: tabular/src/header.rs
//! Fuzzy column-name resolution.
//!
//! The backing sheets disagree on casing, accents, ordinal-indicator
//! glyphs and whitespace ("Nº Eletro" vs "No  ELETRO "). Every column
//! lookup therefore goes through a [`HeaderMap`] built once per header
//! read, which resolves an expected name in three phases:
//! 1. exact match against the trimmed header
//! 2. equality of normalized forms
//! 3. substring containment of normalized forms (either direction)
//! The first phase that succeeds wins. An unresolvable name is `None`,
//! never a sentinel index.

use rustc_hash::FxHashMap;

/// Normalizes a header string for comparison: lowercase, ordinal glyphs
/// folded to `o`/`a`, common Latin accents stripped, whitespace collapsed
/// to single spaces, trimmed.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = true;
    for ch in raw.chars() {
        let folded: &str = match ch {
            'º' | '°' => "o",
            'ª' => "a",
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => "a",
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => "e",
            'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => "i",
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => "o",
            'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => "u",
            'ç' | 'Ç' => "c",
            c if c.is_whitespace() => {
                if !last_was_space {
                    out.push(' ');
                    last_was_space = true;
                }
                continue;
            }
            c => {
                for lc in c.to_lowercase() {
                    out.push(lc);
                }
                last_was_space = false;
                continue;
            }
        };
        out.push_str(folded);
        last_was_space = false;
    }
    out.trim_end().to_string()
}

/// A two-phase lookup table over a header row.
///
/// Phase one happens at construction: headers are trimmed and a
/// normalized-name-to-position map is built. Phase two is [`resolve`],
/// which walks the documented fallback order.
///
/// [`resolve`]: HeaderMap::resolve
#[derive(Debug, Clone)]
pub struct HeaderMap {
    /// Trimmed header names, positionally aligned with source columns.
    headers: Vec<String>,

    /// Normalized header names, same alignment.
    normalized: Vec<String>,

    /// Exact trimmed name → first position carrying it.
    exact: FxHashMap<String, usize>,
}

impl HeaderMap {
    pub fn new<S: AsRef<str>>(raw_headers: &[S]) -> Self {
        let headers: Vec<String> = raw_headers
            .iter()
            .map(|h| h.as_ref().trim().to_string())
            .collect();
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

        let mut exact = FxHashMap::default();
        for (i, h) in headers.iter().enumerate() {
            // First column wins for duplicated header names.
            exact.entry(h.clone()).or_insert(i);
        }

        HeaderMap {
            headers,
            normalized,
            exact,
        }
    }

    /// The trimmed header names in source column order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Resolves an expected column name to its position.
    /// Fallback order: exact → normalized equality → normalized substring
    /// (either direction). Returns `None` when nothing matches.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        let trimmed = name.trim();
        if let Some(&idx) = self.exact.get(trimmed) {
            return Some(idx);
        }

        let target = normalize_header(trimmed);
        if target.is_empty() {
            return None;
        }

        for (i, n) in self.normalized.iter().enumerate() {
            if *n == target {
                return Some(i);
            }
        }

        for (i, n) in self.normalized.iter().enumerate() {
            if !n.is_empty() && (n.contains(&target) || target.contains(n.as_str())) {
                return Some(i);
            }
        }

        None
    }

    /// Resolves each of several candidate names, first success wins.
    pub fn resolve_any<'n>(&self, names: &[&'n str]) -> Option<usize> {
        names.iter().find_map(|n| self.resolve(n))
    }
}
