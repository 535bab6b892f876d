//! Cell value parsing.
//!
//! Values are kept as decimal strings and never pass through a float, so
//! the digits written in the document survive unchanged apart from the
//! decimal separator, which is always a comma on output.

use regex::Regex;
use std::sync::OnceLock;

/// Lower and upper bound parsed from one cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bounds {
    /// Lower bound
    pub min: Option<String>,
    /// Upper bound
    pub max: Option<String>,
}

impl Bounds {
    fn exact(value: String) -> Self {
        Self {
            min: Some(value.clone()),
            max: Some(value),
        }
    }
}

const NUMBER: &str = r"(?:\d+(?:[.,]\d+)*|[.,]\d+)";

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^({})$", NUMBER)).unwrap())
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^({})\s*[-–~]\s*({})$", NUMBER, NUMBER)).unwrap())
}

/// Rewrite a number with a comma decimal separator.
///
/// If both `.` and `,` occur, the one that occurs last is the decimal
/// separator and the other groups thousands. A single kind of separator
/// occurring once is the decimal separator; occurring several times it
/// groups thousands.
pub fn to_comma_decimal(number: &str) -> String {
    let last_dot = number.rfind('.');
    let last_comma = number.rfind(',');

    let decimal = match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
        (Some(_), None) if number.matches('.').count() == 1 => Some('.'),
        (None, Some(_)) if number.matches(',').count() == 1 => Some(','),
        _ => None,
    };

    let mut out = String::with_capacity(number.len() + 1);
    for ch in number.chars() {
        match ch {
            '.' | ',' if Some(ch) == decimal => out.push(','),
            '.' | ',' => {}
            _ => out.push(ch),
        }
    }
    if out.starts_with(',') {
        out.insert(0, '0');
    }
    out
}

/// Parse one cell into bounds.
///
/// - `<x`, `<=x`, `≤x` set only the upper bound
/// - `>x`, `>=x`, `≥x` set only the lower bound
/// - `x` sets both bounds
/// - `a-b` sets lower bound `a` and upper bound `b`
///
/// A trailing `%` or footnote `*` is ignored. Cells without a number
/// return `None`.
pub fn parse_cell_value(raw: &str) -> Option<Bounds> {
    let value = raw.trim().trim_end_matches(['%', '*']).trim();
    if value.is_empty() {
        return None;
    }

    let (comparison, rest) = split_comparison(value);
    let rest = rest.trim();

    match comparison {
        Some(Comparison::Below) => number_re().is_match(rest).then(|| Bounds {
            min: None,
            max: Some(to_comma_decimal(rest)),
        }),
        Some(Comparison::Above) => number_re().is_match(rest).then(|| Bounds {
            min: Some(to_comma_decimal(rest)),
            max: None,
        }),
        None => {
            if number_re().is_match(rest) {
                Some(Bounds::exact(to_comma_decimal(rest)))
            } else {
                range_re().captures(rest).map(|caps| Bounds {
                    min: Some(to_comma_decimal(&caps[1])),
                    max: Some(to_comma_decimal(&caps[2])),
                })
            }
        }
    }
}

enum Comparison {
    Below,
    Above,
}

fn split_comparison(value: &str) -> (Option<Comparison>, &str) {
    for (prefix, comparison) in [
        ("<=", Comparison::Below),
        ("≤", Comparison::Below),
        ("<", Comparison::Below),
        (">=", Comparison::Above),
        ("≥", Comparison::Above),
        (">", Comparison::Above),
    ] {
        if let Some(rest) = value.strip_prefix(prefix) {
            return (Some(comparison), rest);
        }
    }
    (None, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(min: Option<&str>, max: Option<&str>) -> Option<Bounds> {
        Some(Bounds {
            min: min.map(str::to_string),
            max: max.map(str::to_string),
        })
    }

    #[test]
    fn test_less_than_sets_max_only() {
        assert_eq!(parse_cell_value("<65.8"), bounds(None, Some("65,8")));
        assert_eq!(parse_cell_value("< 0,5"), bounds(None, Some("0,5")));
        assert_eq!(parse_cell_value("≤3"), bounds(None, Some("3")));
    }

    #[test]
    fn test_greater_than_sets_min_only() {
        assert_eq!(parse_cell_value(">19.9"), bounds(Some("19,9"), None));
        assert_eq!(parse_cell_value(">=1"), bounds(Some("1"), None));
    }

    #[test]
    fn test_plain_number_sets_both() {
        assert_eq!(parse_cell_value("3.5"), bounds(Some("3,5"), Some("3,5")));
        assert_eq!(parse_cell_value("3,5"), bounds(Some("3,5"), Some("3,5")));
        assert_eq!(parse_cell_value(" 12.50 % "), bounds(Some("12,50"), Some("12,50")));
        assert_eq!(parse_cell_value("7"), bounds(Some("7"), Some("7")));
    }

    #[test]
    fn test_range() {
        assert_eq!(parse_cell_value("1.0-2.5"), bounds(Some("1,0"), Some("2,5")));
        assert_eq!(parse_cell_value("0,1 – 0,4"), bounds(Some("0,1"), Some("0,4")));
    }

    #[test]
    fn test_non_numeric() {
        assert_eq!(parse_cell_value(""), None);
        assert_eq!(parse_cell_value("-"), None);
        assert_eq!(parse_cell_value("tr."), None);
        assert_eq!(parse_cell_value("<"), None);
        assert_eq!(parse_cell_value("n.d."), None);
    }

    #[test]
    fn test_comma_decimal() {
        assert_eq!(to_comma_decimal("65.8"), "65,8");
        assert_eq!(to_comma_decimal("1,234.5"), "1234,5");
        assert_eq!(to_comma_decimal("1.234,5"), "1234,5");
        assert_eq!(to_comma_decimal("1.234.567"), "1234567");
        assert_eq!(to_comma_decimal(".5"), "0,5");
        assert_eq!(to_comma_decimal("0.050"), "0,050");
    }
}
