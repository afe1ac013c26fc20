//! Exchange index board parser
//!
//! The board prints last price and previous close but no change columns;
//! change and change % are derived from those two.

#![allow(clippy::uninlined_format_args)]

use super::config::SourceMarkers;
use super::scan_loop::{RawRecord, RecordBuilder, RecordScope, SourceScanner};
use super::{ContextualParser, PageResult, ParseContext, ParsingResult, RecordDrop};
use crate::domain::{
    is_amount_available, percent_change, IndexTick, SourceKind, AMOUNT_UNAVAILABLE,
    CHANGE_UNAVAILABLE,
};

/// Field keys of [`SourceMarkers::index_board`]
pub mod fields {
    pub const CODE: &str = "code";
    pub const NAME: &str = "name";
    pub const LAST: &str = "last";
    pub const PREVIOUS_CLOSE: &str = "previous_close";
    pub const HIGH: &str = "high";
    pub const LOW: &str = "low";
    pub const TIME: &str = "time";
}

pub struct IndexBoardParser {
    scanner: SourceScanner,
}

impl IndexBoardParser {
    pub fn new() -> ParsingResult<Self> {
        Self::with_markers(SourceMarkers::index_board())
    }

    pub fn with_markers(markers: SourceMarkers) -> ParsingResult<Self> {
        Ok(Self {
            scanner: SourceScanner::new(SourceKind::IndexBoard, markers)?,
        })
    }
}

impl ContextualParser for IndexBoardParser {
    type Output = IndexTick;

    fn source(&self) -> SourceKind {
        self.scanner.source()
    }

    fn parse_with_context(
        &self,
        text: &str,
        context: &ParseContext,
    ) -> ParsingResult<PageResult<IndexTick>> {
        self.scanner.scan(text, context, BoardRows)
    }
}

struct BoardRows;

impl BoardRows {
    fn amount(raw: &RawRecord, scope: &RecordScope<'_>, key: &str) -> f64 {
        raw.get(key)
            .map_or(AMOUNT_UNAVAILABLE, |r| scope.numbers.parse_amount(r))
    }
}

impl RecordBuilder for BoardRows {
    type Record = IndexTick;

    fn build(
        &mut self,
        raw: &RawRecord,
        scope: &mut RecordScope<'_>,
    ) -> Result<Option<IndexTick>, RecordDrop> {
        let code = raw.require(fields::CODE)?;
        let name = raw.require(fields::NAME)?;

        let last_raw = raw.require(fields::LAST)?;
        let last = scope
            .numbers
            .parse_number(last_raw)
            .ok_or_else(|| RecordDrop::malformed(fields::LAST, last_raw))?;

        let previous_close = Self::amount(raw, scope, fields::PREVIOUS_CLOSE);
        let high = Self::amount(raw, scope, fields::HIGH);
        let low = Self::amount(raw, scope, fields::LOW);

        let change = if is_amount_available(previous_close) {
            last - previous_close
        } else {
            CHANGE_UNAVAILABLE
        };
        let change_percent = percent_change(last, previous_close);

        let time = scope.resolve_time(raw.require(fields::TIME)?)?;

        Ok(Some(IndexTick {
            source: SourceKind::IndexBoard,
            group: raw.group.clone(),
            code: code.to_string(),
            name: name.to_string(),
            last,
            previous_close,
            high,
            low,
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
    use chrono::{Datelike, Timelike};

    const PAGE: &str = r#"
<p class="board-status">Stand: 14.11.2025 17:35:12 Uhr</p>
<h3 class="board-section">Leitindizes</h3>
<table>
<tr class="board-row" data-id="846900"><td class="code">DAX</td><td class="name">DAX&reg; 40</td><td class="num">23.876,55</td><td class="num">24.041,62</td><td class="num">4,21 Mrd.</td><td class="num">24.112,09</td><td class="num">23.754,30</td><td class="time">17:35:12</td></tr>
<tr class="board-row"><td class="code">MDAX</td><td class="name">MDAX</td><td class="num">29.512,00</td><td class="num">0,00</td><td class="num">-</td><td class="num">29.600,10</td><td class="num">29.400,00</td><td class="time">13.11.</td></tr>
</table>"#;

    fn parse(text: &str) -> PageResult<IndexTick> {
        let ctx = ParseContext::new(SourceKind::IndexBoard, "board");
        IndexBoardParser::new().unwrap().parse_with_context(text, &ctx).unwrap()
    }

    #[test]
    fn test_change_is_derived_from_previous_close() {
        let page = parse(PAGE);
        assert_eq!(page.len(), 2);

        let dax = &page.records[0];
        assert_eq!(dax.code, "DAX");
        assert_eq!(dax.name, "DAX\u{ae} 40");
        assert_eq!(dax.group.as_deref(), Some("Leitindizes"));
        assert_eq!(dax.last, 23876.55);
        assert_eq!(dax.high, 24112.09);
        assert!((dax.change - (23876.55 - 24041.62)).abs() < 1e-9);
        assert!((dax.change_percent - (-0.6866)).abs() < 1e-3);
        assert!(dax.is_intraday);
        assert_eq!(dax.observed_at.hour(), 17);
        assert_eq!(dax.observed_at.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_zero_previous_close_gives_unavailable_change() {
        let page = parse(PAGE);
        let mdax = &page.records[1];
        assert_eq!(mdax.change, CHANGE_UNAVAILABLE);
        assert!(!mdax.has_change_percent());
        assert!(!mdax.is_intraday);
        assert_eq!((mdax.observed_at.day(), mdax.observed_at.month()), (13, 11));
    }

    #[test]
    fn test_missing_code_drops_row() {
        let page = parse(&PAGE.replace(r#"<td class="code">DAX</td>"#, ""));
        assert_eq!(page.len(), 1);
        assert_eq!(page.records[0].code, "MDAX");
        let reasons: Vec<_> = page.dropped().collect();
        assert_eq!(reasons, vec![&RecordDrop::field_missing("code")]);
    }
}
