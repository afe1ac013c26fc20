//! World-index digest parser
//!
//! One digest page per region lists country headers, each followed by index
//! rows: name, last value, change, change %, YTD (ignored) and a time token.

#![allow(clippy::uninlined_format_args)]

use super::config::SourceMarkers;
use super::scan_loop::{RawRecord, RecordBuilder, RecordScope, SourceScanner};
use super::{ContextualParser, PageResult, ParseContext, ParsingResult, RecordDrop};
use crate::domain::{IndexQuote, SourceKind, CHANGE_UNAVAILABLE};

/// Field keys of [`SourceMarkers::world_index`]
pub mod fields {
    pub const NAME: &str = "name";
    pub const VALUE: &str = "value";
    pub const CHANGE: &str = "change";
    pub const CHANGE_PERCENT: &str = "change_percent";
    pub const TIME: &str = "time";
}

pub struct WorldIndexParser {
    scanner: SourceScanner,
}

impl WorldIndexParser {
    /// Parser with the built-in marker vocabulary
    pub fn new() -> ParsingResult<Self> {
        Self::with_markers(SourceMarkers::world_index())
    }

    pub fn with_markers(markers: SourceMarkers) -> ParsingResult<Self> {
        Ok(Self {
            scanner: SourceScanner::new(SourceKind::WorldIndex, markers)?,
        })
    }
}

impl ContextualParser for WorldIndexParser {
    type Output = IndexQuote;

    fn source(&self) -> SourceKind {
        self.scanner.source()
    }

    fn parse_with_context(
        &self,
        text: &str,
        context: &ParseContext,
    ) -> ParsingResult<PageResult<IndexQuote>> {
        self.scanner.scan(text, context, IndexRows)
    }
}

struct IndexRows;

impl RecordBuilder for IndexRows {
    type Record = IndexQuote;

    fn build(
        &mut self,
        raw: &RawRecord,
        scope: &mut RecordScope<'_>,
    ) -> Result<Option<IndexQuote>, RecordDrop> {
        let name = raw.require(fields::NAME)?;

        // The value is the quote itself: no sentinel, the row goes
        let value_raw = raw.require(fields::VALUE)?;
        let value = scope
            .numbers
            .parse_number(value_raw)
            .ok_or_else(|| RecordDrop::malformed(fields::VALUE, value_raw))?;

        let change = raw
            .get(fields::CHANGE)
            .map_or(CHANGE_UNAVAILABLE, |r| scope.numbers.parse_change(r));
        let change_percent = raw
            .get(fields::CHANGE_PERCENT)
            .map_or(CHANGE_UNAVAILABLE, |r| scope.numbers.parse_percent(r));

        let time = scope.resolve_time(raw.require(fields::TIME)?)?;

        Ok(Some(IndexQuote {
            source: SourceKind::WorldIndex,
            region: scope.context.region.clone(),
            country: raw.group.clone(),
            name: name.to_string(),
            value,
            change,
            change_percent,
            observed_at: time.observed_at,
            is_intraday: time.is_intraday,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::DiagnosticKind;
    use chrono::{Datelike, Timelike};

    const PAGE: &str = r#"
<div class="digest"><span class="timestamp">Updated 11/14/2025 4:05 PM ET</span></div>
<table>
<tr class="country-row"><th colspan="6">United States</th></tr>
<tr class="index-row"><td class="idx-name"><a href="/q/dji">Dow Jones Industrial Average</a></td><td class="idx-last">47,147.48</td><td class="idx-chg">-309.74</td><td class="idx-pct">-0.65%</td><td class="idx-ytd">+10.82%</td><td class="idx-time">11/13</td></tr>
<tr class="index-row"><td class="idx-name">S&amp;P 500</td><td class="idx-last">6,734.11</td><td class="idx-chg">unch</td><td class="idx-pct">n/a</td><td class="idx-ytd">+14.50%</td><td class="idx-time">14:52</td></tr>
<tr class='country-row'><th colspan='6'>Canada</th></tr>
<tr class='index-row'><td class='idx-name'>S&amp;P/TSX Composite</td><td class='idx-last'>30,326.35</td><td class='idx-chg'>+25.01</td><td class='idx-pct'>+0.08%</td><td class='idx-ytd'>+22.1%</td><td class='idx-time'>11/13</td></tr>
</table>"#;

    fn parse(text: &str) -> PageResult<IndexQuote> {
        let ctx = ParseContext::new(SourceKind::WorldIndex, "americas").with_region("Americas");
        WorldIndexParser::new().unwrap().parse_with_context(text, &ctx).unwrap()
    }

    #[test]
    fn test_parses_rows_under_country_headers() {
        let page = parse(PAGE);
        assert_eq!(page.len(), 3);
        assert!(page.diagnostics.is_empty());

        let dow = &page.records[0];
        assert_eq!(dow.name, "Dow Jones Industrial Average");
        assert_eq!(dow.country.as_deref(), Some("United States"));
        assert_eq!(dow.region.as_deref(), Some("Americas"));
        assert_eq!(dow.value, 47147.48);
        assert_eq!(dow.change, -309.74);
        assert_eq!(dow.change_percent, -0.65);
        assert!(!dow.is_intraday);
        assert_eq!((dow.observed_at.month(), dow.observed_at.day()), (11, 13));

        let tsx = &page.records[2];
        assert_eq!(tsx.name, "S&P/TSX Composite");
        assert_eq!(tsx.country.as_deref(), Some("Canada"));
    }

    #[test]
    fn test_unch_and_unreadable_changes() {
        let page = parse(PAGE);
        let spx = &page.records[1];
        assert_eq!(spx.change, 0.0);
        assert!(!spx.has_change_percent());
        assert!(spx.is_intraday);
        assert_eq!((spx.observed_at.hour(), spx.observed_at.minute()), (14, 52));
        assert_eq!(spx.observed_at.day(), 14);
    }

    #[test]
    fn test_unreadable_value_drops_row() {
        let page = parse(&PAGE.replace("6,734.11", "--"));
        assert_eq!(page.len(), 2);
        assert_eq!(
            page.diagnostics[0].kind,
            DiagnosticKind::RecordDropped(RecordDrop::malformed("value", "--"))
        );
    }
}
