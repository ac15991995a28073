//! FILENAME: tabular/src/cell.rs
//! The raw cell value type.
//!
//! Rows coming out of a tabular source are ordered sequences of these.
//! The untagged serde representation keeps serialized records looking
//! like plain JSON (strings, numbers, booleans, null) rather than
//! enum-wrapped objects, which is what cached pages and API consumers
//! expect.

use serde::{Deserialize, Serialize};

/// A single cell value as read from a tabular source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl CellValue {
    /// Returns true for `Empty` and for all-whitespace text.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The cell rendered as display text, trimmed.
    /// Numbers drop a trailing `.0` so that identifier columns stored as
    /// numbers ("1234.0") compare equal to their text form ("1234").
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }

    /// The cell as a float, if it is numeric or numeric-looking text.
    /// Uses the plain (dot-decimal) representation; locale-aware parsing
    /// lives in [`crate::numeric`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Case-insensitive needle match, used by in-memory row searches.
    /// `exact` matches the entire cell, otherwise substring.
    pub fn matches(&self, needle_lower: &str, exact: bool) -> bool {
        let hay = self.as_text().to_lowercase();
        if exact {
            hay == needle_lower
        } else {
            hay.contains(needle_lower)
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_text_trims_and_normalizes_numbers() {
        assert_eq!(CellValue::Text("  1234 ".into()).as_text(), "1234");
        assert_eq!(CellValue::Number(1234.0).as_text(), "1234");
        assert_eq!(CellValue::Number(12.5).as_text(), "12.5");
        assert_eq!(CellValue::Empty.as_text(), "");
    }

    #[test]
    fn test_is_empty() {
        assert!(CellValue::Empty.is_empty());
        assert!(CellValue::Text("   ".into()).is_empty());
        assert!(!CellValue::Text("x".into()).is_empty());
        assert!(!CellValue::Number(0.0).is_empty());
    }

    #[test]
    fn test_matches_substring_and_exact() {
        let cell = CellValue::Text("Av. Paulista 1000".into());
        assert!(cell.matches("paulista", false));
        assert!(!cell.matches("paulista", true));
        assert!(cell.matches("av. paulista 1000", true));
    }

    #[test]
    fn test_untagged_serialization() {
        assert_eq!(
            serde_json::to_string(&CellValue::Number(3.0)).unwrap(),
            "3.0"
        );
        assert_eq!(
            serde_json::to_string(&CellValue::Text("a".into())).unwrap(),
            "\"a\""
        );
    }
}
