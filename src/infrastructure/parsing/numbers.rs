//! Locale-aware numeric normalization
//!
//! Every source publishes numbers in one fixed locale style. The accepted
//! shape is: optional sign, digits with optional grouping separators in groups
//! of three, optional decimal part, optional trailing `%`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{AMOUNT_UNAVAILABLE, CHANGE_UNAVAILABLE};

/// Decimal and grouping separators of a source's number style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    pub decimal: char,
    pub grouping: char,
}

impl NumberFormat {
    /// `1,234.56`
    pub const EN: Self = Self {
        decimal: '.',
        grouping: ',',
    };

    /// `1.234,56`
    pub const DE: Self = Self {
        decimal: ',',
        grouping: '.',
    };
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::EN
    }
}

/// Cells some pages print instead of a zero change
const UNCHANGED_MARKERS: &[&str] = &["unch", "unch.", "unchanged"];

/// Compiled parser for one [`NumberFormat`]
#[derive(Debug, Clone)]
pub struct NumberParser {
    format: NumberFormat,
    pattern: Regex,
}

impl NumberParser {
    pub fn new(format: NumberFormat) -> Result<Self, regex::Error> {
        let group = regex::escape(&format.grouping.to_string());
        let decimal = regex::escape(&format.decimal.to_string());
        let pattern = Regex::new(&format!(
            r"^(?P<sign>[+\-\x{{2212}}])?\s*(?P<int>\d{{1,3}}(?:{group}\d{{3}})+|\d+)(?:{decimal}(?P<frac>\d+))?\s*(?P<pct>%)?$"
        ))?;
        Ok(Self { format, pattern })
    }

    pub fn format(&self) -> NumberFormat {
        self.format
    }

    /// Parse a plain number; `None` for anything outside the accepted shape
    /// (a trailing `%` is rejected here).
    pub fn parse_number(&self, raw: &str) -> Option<f64> {
        let (value, is_percent) = self.parse_parts(raw)?;
        if is_percent { None } else { Some(value) }
    }

    /// Parse a percentage into percent units: `"2.35%"` gives `2.35`.
    /// The `%` sign is optional since some tables put it in the header.
    pub fn parse_percent_value(&self, raw: &str) -> Option<f64> {
        self.parse_parts(raw).map(|(value, _)| value)
    }

    /// Change cell; logs and returns `CHANGE_UNAVAILABLE` when unreadable
    pub fn parse_change(&self, raw: &str) -> f64 {
        if is_unchanged(raw) {
            return 0.0;
        }
        self.parse_number(raw).unwrap_or_else(|| {
            warn!(raw = %raw, "Unparsable change value, using sentinel");
            CHANGE_UNAVAILABLE
        })
    }

    /// Percent-change cell; logs and returns `CHANGE_UNAVAILABLE` when unreadable
    pub fn parse_percent(&self, raw: &str) -> f64 {
        if is_unchanged(raw) {
            return 0.0;
        }
        self.parse_percent_value(raw).unwrap_or_else(|| {
            warn!(raw = %raw, "Unparsable percent value, using sentinel");
            CHANGE_UNAVAILABLE
        })
    }

    /// Price or amount cell; logs and returns `AMOUNT_UNAVAILABLE` when unreadable
    pub fn parse_amount(&self, raw: &str) -> f64 {
        self.parse_number(raw).unwrap_or_else(|| {
            warn!(raw = %raw, "Unparsable amount value, using sentinel");
            AMOUNT_UNAVAILABLE
        })
    }

    /// Amount with an optional magnitude suffix: `"1.25B"` gives `1.25e9`.
    /// Recognized suffixes are K, M, B (or Bn) and T, case-insensitive.
    pub fn parse_magnitude(&self, raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        let (number, factor) = [("bn", 1e9), ("k", 1e3), ("m", 1e6), ("b", 1e9), ("t", 1e12)]
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix))
            .map_or((trimmed, 1.0), |(suffix, factor)| {
                (trimmed[..trimmed.len() - suffix.len()].trim_end(), *factor)
            });
        self.parse_number(number).map(|value| value * factor)
    }

    fn parse_parts(&self, raw: &str) -> Option<(f64, bool)> {
        let caps = self.pattern.captures(raw.trim())?;
        let negative = caps
            .name("sign")
            .is_some_and(|sign| sign.as_str() != "+");
        let int: String = caps["int"]
            .chars()
            .filter(|c| *c != self.format.grouping)
            .collect();

        let mut canonical = String::with_capacity(raw.len() + 1);
        if negative {
            canonical.push('-');
        }
        canonical.push_str(&int);
        if let Some(frac) = caps.name("frac") {
            canonical.push('.');
            canonical.push_str(frac.as_str());
        }

        let value = canonical.parse::<f64>().ok()?;
        Some((value, caps.name("pct").is_some()))
    }
}

fn is_unchanged(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    UNCHANGED_MARKERS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn en() -> NumberParser {
        NumberParser::new(NumberFormat::EN).unwrap()
    }

    fn de() -> NumberParser {
        NumberParser::new(NumberFormat::DE).unwrap()
    }

    #[rstest]
    #[case("42,115.40", Some(42115.40))]
    #[case("-120.55", Some(-120.55))]
    #[case("+3.5", Some(3.5))]
    #[case("\u{2212}0.75", Some(-0.75))]
    #[case("1234", Some(1234.0))]
    #[case("1,234,567", Some(1_234_567.0))]
    #[case("12,34.5", None)]
    #[case("n/a", None)]
    #[case("", None)]
    #[case("2.35%", None)]
    fn test_parse_number_en(#[case] raw: &str, #[case] expected: Option<f64>) {
        assert_eq!(en().parse_number(raw), expected);
    }

    #[rstest]
    #[case("19.254,12", Some(19254.12))]
    #[case("-0,5", Some(-0.5))]
    #[case("1.000", Some(1000.0))]
    #[case("19,254.12", None)]
    fn test_parse_number_de(#[case] raw: &str, #[case] expected: Option<f64>) {
        assert_eq!(de().parse_number(raw), expected);
    }

    #[test]
    fn test_percent_is_in_percent_units() {
        assert_eq!(en().parse_percent("2.35%"), 2.35);
        assert_eq!(en().parse_percent("-0.29 %"), -0.29);
        assert_eq!(de().parse_percent("+0,25%"), 0.25);
        assert_eq!(en().parse_percent("unch"), 0.0);
    }

    #[test]
    fn test_sentinels_on_failure() {
        assert_eq!(en().parse_change("--"), CHANGE_UNAVAILABLE);
        assert_eq!(en().parse_percent("n/a"), CHANGE_UNAVAILABLE);
        assert_eq!(en().parse_amount("—"), AMOUNT_UNAVAILABLE);
        assert_eq!(en().parse_change("Unch"), 0.0);
    }

    #[rstest]
    #[case("1.25B", Some(1.25e9))]
    #[case("3.4 T", Some(3.4e12))]
    #[case("850K", Some(850_000.0))]
    #[case("15.2m", Some(15_200_000.0))]
    #[case("2.1Bn", Some(2.1e9))]
    #[case("1,200", Some(1200.0))]
    #[case("lots", None)]
    fn test_parse_magnitude(#[case] raw: &str, #[case] expected: Option<f64>) {
        let parsed = en().parse_magnitude(raw);
        match (parsed, expected) {
            (Some(a), Some(b)) => assert!((a - b).abs() < 1e-3, "{raw}: {a} != {b}"),
            (a, b) => assert_eq!(a, b),
        }
    }
}
