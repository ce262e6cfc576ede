//! Scalar cell values and their textual form.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One cell of a data row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Bool(bool),
    Text(String),
    /// Blank cell, or a column the row does not carry.
    #[default]
    Empty,
}

impl CellValue {
    /// Type a raw text cell the way a spreadsheet importer does: numeric text
    /// becomes a number, `TRUE`/`FALSE` a boolean, blank text [`CellValue::Empty`].
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Some(n) = parse_number(trimmed) {
            return CellValue::Number(n);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        CellValue::Text(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Textual form used when the value is placed on a page.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

/// Accepts plain decimal and exponent notation only; `inf`, `NaN` and the
/// like stay text.
fn parse_number(s: &str) -> Option<f64> {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    let first = digits.chars().next()?;
    if !(first.is_ascii_digit() || first == '.') {
        return None;
    }
    if !digits
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
    {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            // `-0` prints as `0`, integral values without a fraction.
            CellValue::Number(n) if *n == 0.0 => f.write_str("0"),
            // Very large and very small magnitudes switch to `1e+21` form.
            CellValue::Number(n) if n.abs() >= 1e21 || n.abs() < 1e-6 => {
                let s = format!("{n:e}");
                match s.split_once('e') {
                    Some((mantissa, exp)) if !exp.starts_with('-') => {
                        write!(f, "{mantissa}e+{exp}")
                    }
                    _ => f.write_str(&s),
                }
            }
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Empty => Ok(()),
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

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_like_a_spreadsheet() {
        assert_eq!(CellValue::Number(10.0).to_text(), "10");
        assert_eq!(CellValue::Number(10.5).to_text(), "10.5");
        assert_eq!(CellValue::Number(-0.0).to_text(), "0");
        assert_eq!(CellValue::Number(42.0).to_text(), "42");
    }

    #[test]
    fn extreme_numbers_use_exponent_form() {
        assert_eq!(CellValue::Number(1e21).to_text(), "1e+21");
        assert_eq!(CellValue::Number(-1.5e300).to_text(), "-1.5e+300");
        assert_eq!(CellValue::Number(1e-7).to_text(), "1e-7");
        assert_eq!(CellValue::Number(1e20).to_text(), "100000000000000000000");
        assert_eq!(CellValue::Number(0.000001).to_text(), "0.000001");
    }

    #[test]
    fn empty_prints_nothing() {
        assert_eq!(CellValue::Empty.to_text(), "");
        assert_eq!(CellValue::from(None::<&str>).to_text(), "");
    }

    #[test]
    fn infer_types_raw_cells() {
        assert_eq!(CellValue::infer("12"), CellValue::Number(12.0));
        assert_eq!(CellValue::infer(" -3.25 "), CellValue::Number(-3.25));
        assert_eq!(CellValue::infer("1e3"), CellValue::Number(1000.0));
        assert_eq!(CellValue::infer("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::infer("false"), CellValue::Bool(false));
        assert_eq!(CellValue::infer("  "), CellValue::Empty);
        assert_eq!(CellValue::infer("inf"), CellValue::Text("inf".into()));
        assert_eq!(CellValue::infer("NaN"), CellValue::Text("NaN".into()));
        assert_eq!(CellValue::infer("12 apples"), CellValue::Text("12 apples".into()));
    }

    #[test]
    fn json_values_map_to_cells() {
        let cells: Vec<CellValue> = serde_json::from_str(r#"[10, "x", true, null]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                CellValue::Number(10.0),
                CellValue::Text("x".into()),
                CellValue::Bool(true),
                CellValue::Empty,
            ]
        );
    }
}
