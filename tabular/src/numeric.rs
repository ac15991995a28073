//! FILENAME: tabular/src/numeric.rs
//! Locale-aware numeric parsing.
//!
//! The dashboard sheets are maintained in a pt-BR locale: thousands
//! separator is a period, decimal separator is a comma ("1.234,56").
//! Percentage cells arrive as text ("87,5%"). Parse failures default to
//! zero — a malformed cell must never fail a request.

use crate::cell::CellValue;

/// Parses a quantity cell with decimal-comma handling.
///
/// Numeric cells pass through unchanged. Text containing a comma is
/// treated as locale-formatted: periods are thousands separators and are
/// dropped, the comma becomes the decimal point. Text without a comma is
/// parsed as-is, so already-anglicized cells ("12.5") keep their value.
/// Anything unparseable is 0.0.
pub fn parse_quantity(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => parse_quantity_str(s),
        _ => 0.0,
    }
}

fn parse_quantity_str(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let candidate = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };

    candidate.parse::<f64>().unwrap_or(0.0)
}

/// Parses a percentage cell into a 0–1 fraction, never 0–100.
///
/// Text forms strip the `%` sign and go through decimal-comma handling,
/// then divide by 100 ("87,5%" → 0.875). Numeric cells already in the
/// 0–1 range pass through (spreadsheet percent formats store fractions);
/// larger numeric values are taken as percent points and divided by 100.
pub fn parse_fraction(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) => {
            if n.abs() <= 1.0 {
                *n
            } else {
                *n / 100.0
            }
        }
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return 0.0;
            }
            let had_percent = trimmed.contains('%');
            let stripped = trimmed.replace('%', "");
            let value = parse_quantity_str(&stripped);
            if had_percent || value.abs() > 1.0 {
                value / 100.0
            } else {
                value
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity_locale_formats() {
        assert_eq!(parse_quantity(&CellValue::Text("1.234,56".into())), 1234.56);
        assert_eq!(parse_quantity(&CellValue::Text("7,5".into())), 7.5);
        assert_eq!(parse_quantity(&CellValue::Text("12.5".into())), 12.5);
        assert_eq!(parse_quantity(&CellValue::Number(3.0)), 3.0);
    }

    #[test]
    fn test_parse_quantity_defaults_to_zero() {
        assert_eq!(parse_quantity(&CellValue::Text("n/a".into())), 0.0);
        assert_eq!(parse_quantity(&CellValue::Text("".into())), 0.0);
        assert_eq!(parse_quantity(&CellValue::Empty), 0.0);
        assert_eq!(parse_quantity(&CellValue::Boolean(true)), 0.0);
    }

    #[test]
    fn test_parse_fraction_text_percent() {
        assert_eq!(parse_fraction(&CellValue::Text("87,5%".into())), 0.875);
        assert_eq!(parse_fraction(&CellValue::Text("100%".into())), 1.0);
        assert_eq!(parse_fraction(&CellValue::Text("0%".into())), 0.0);
    }

    #[test]
    fn test_parse_fraction_numeric_forms() {
        // Spreadsheet percent format stores the fraction directly.
        assert_eq!(parse_fraction(&CellValue::Number(0.42)), 0.42);
        // Percent points stored as a plain number.
        assert_eq!(parse_fraction(&CellValue::Number(42.0)), 0.42);
    }

    #[test]
    fn test_parse_fraction_bare_points_text() {
        assert_eq!(parse_fraction(&CellValue::Text("87,5".into())), 0.875);
    }
}
