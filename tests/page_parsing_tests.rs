//! Full-page parsing against captured fixtures

use chrono::{Datelike, Timelike};
use market_pulse_lib::domain::{CHANGE_UNAVAILABLE, SourceKind};
use market_pulse_lib::infrastructure::parsing::{
    ContextualParser, FieldMarkers, IndexBoardParser, MarkerSet, ParseContext, RecordDrop,
    SecuritySnapshotParser, SourceMarkers, WorldIndexParser,
};
use market_pulse_lib::infrastructure::ErrorClass;

const WORLD_EUROPE: &str = include_str!("fixtures/world_indices_europe.html");
const INDEX_BOARD: &str = include_str!("fixtures/index_board.html");
const SNAPSHOT_SAP: &str = include_str!("fixtures/snapshot_sap.html");

fn europe_context() -> ParseContext {
    ParseContext::new(SourceKind::WorldIndex, "europe")
        .with_url("https://markets.example-digest.com/world-indices/europe")
        .with_region("Europe")
}

#[test]
fn world_index_page_keeps_good_rows_around_bad_ones() {
    let parser = WorldIndexParser::new().unwrap();
    let page = parser.parse_with_context(WORLD_EUROPE, &europe_context()).unwrap();

    let names: Vec<_> = page.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["DAX", "TecDAX", "CAC 40"]);

    let drops: Vec<_> = page.dropped().cloned().collect();
    assert_eq!(
        drops,
        vec![
            RecordDrop::malformed("value", "--"),
            RecordDrop::TimeInconclusive {
                raw: "--:--".to_string()
            },
        ]
    );
    assert!(page.diagnostics.iter().all(|d| d.page == "europe"));
}

#[test]
fn world_index_time_tokens() {
    let parser = WorldIndexParser::new().unwrap();
    let page = parser.parse_with_context(WORLD_EUROPE, &europe_context()).unwrap();

    let published = page.published_at.unwrap();
    assert_eq!((published.hour(), published.minute()), (16, 5));
    assert_eq!(published.offset().local_minus_utc(), -5 * 3600);

    // "14:52" lands on the publish day
    let tecdax = &page.records[1];
    assert!(tecdax.is_intraday);
    assert_eq!(
        (tecdax.observed_at.month(), tecdax.observed_at.day()),
        (11, 14)
    );
    assert_eq!(
        (tecdax.observed_at.hour(), tecdax.observed_at.minute()),
        (14, 52)
    );

    // "11/07" is an end-of-day date in the publish year
    let cac = &page.records[2];
    assert!(!cac.is_intraday);
    assert_eq!(
        (
            cac.observed_at.year(),
            cac.observed_at.month(),
            cac.observed_at.day()
        ),
        (2025, 11, 7)
    );
    assert_eq!(cac.observed_at.hour(), 0);
}

#[test]
fn world_index_values_and_percentages() {
    let parser = WorldIndexParser::new().unwrap();
    let page = parser.parse_with_context(WORLD_EUROPE, &europe_context()).unwrap();

    let dax = &page.records[0];
    assert_eq!(dax.country.as_deref(), Some("Germany"));
    assert_eq!(dax.region.as_deref(), Some("Europe"));
    assert_eq!(dax.value, 23876.55);
    assert_eq!(dax.change, -165.07);

    let tecdax = &page.records[1];
    assert_eq!(tecdax.change_percent, 2.35);

    let cac = &page.records[2];
    assert_eq!(cac.country.as_deref(), Some("France"));
    assert_eq!(cac.change, 0.0);
    assert!(cac.has_change());
    assert_eq!(cac.change_percent, CHANGE_UNAVAILABLE);
}

#[test]
fn parsing_the_same_page_twice_is_identical() {
    let parser = WorldIndexParser::new().unwrap();
    let first = parser.parse_with_context(WORLD_EUROPE, &europe_context()).unwrap();
    let second = parser.parse_with_context(WORLD_EUROPE, &europe_context()).unwrap();
    assert_eq!(first.records, second.records);
    assert_eq!(first.diagnostics, second.diagnostics);

    let board = IndexBoardParser::new().unwrap();
    let ctx = ParseContext::new(SourceKind::IndexBoard, "live");
    assert_eq!(
        board.parse_with_context(INDEX_BOARD, &ctx).unwrap().records,
        board.parse_with_context(INDEX_BOARD, &ctx).unwrap().records
    );
}

#[test]
fn index_board_groups_and_derived_change() {
    let parser = IndexBoardParser::new().unwrap();
    let ctx = ParseContext::new(SourceKind::IndexBoard, "live");
    let page = parser.parse_with_context(INDEX_BOARD, &ctx).unwrap();

    let codes: Vec<_> = page.records.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["DAX", "MDAX", "DXAUTO"]);

    let mdax = &page.records[1];
    assert_eq!(mdax.group.as_deref(), Some("Leitindizes"));
    assert!((mdax.change - 13.23).abs() < 1e-9);
    assert!(mdax.is_intraday);

    let auto = &page.records[2];
    assert_eq!(auto.group.as_deref(), Some("Branchenindizes"));
    assert_eq!(auto.last, 1603.48);
    assert_eq!(auto.change, CHANGE_UNAVAILABLE);
    assert!(!auto.is_intraday);
    assert_eq!((auto.observed_at.day(), auto.observed_at.month()), (13, 11));
    assert_eq!(auto.observed_at.offset().local_minus_utc(), 3600);
}

#[test]
fn snapshot_page_folds_into_one_profile() {
    let parser = SecuritySnapshotParser::new().unwrap();
    let ctx = ParseContext::new(SourceKind::SecuritySnapshot, "SAP");
    let page = parser.parse_with_context(SNAPSHOT_SAP, &ctx).unwrap();

    assert_eq!(page.len(), 1);
    let sap = &page.records[0];
    assert_eq!(sap.name, "SAP SE");
    assert_eq!(sap.symbol.as_deref(), Some("SAP"));
    assert_eq!(sap.exchange.as_deref(), Some("NYSE"));
    assert_eq!(sap.last_price, Some(242.10));
    assert_eq!(sap.change, Some(2.35));
    assert_eq!(sap.change_percent, Some(0.98));
    assert_eq!(sap.open, Some(240.02));
    assert_eq!(sap.pe_ratio, Some(39.12));
    assert_eq!(sap.dividend_yield, None);
    assert!((sap.market_cap.unwrap() - 282.6e9).abs() < 1e3);
    assert_eq!(sap.as_of, page.published_at);

    assert_eq!(page.diagnostics.len(), 1);
    assert!(page.diagnostics[0].raw.contains("Headquarters"));
}

#[test]
fn page_without_structure_is_rejected() {
    let parser = WorldIndexParser::new().unwrap();
    let err = parser
        .parse_with_context("<html><body>Down for maintenance</body></html>", &europe_context())
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::PageStructure);

    let no_time = WORLD_EUROPE.replace("Updated 11/14/2025 4:05 PM ET", "Updated recently");
    let err = parser.parse_with_context(&no_time, &europe_context()).unwrap_err();
    assert_eq!(err.class(), ErrorClass::PageTime);
}

#[test]
fn custom_marker_vocabulary() {
    let mut markers = SourceMarkers::world_index();
    markers.record = FieldMarkers::new(
        MarkerSet::single("<li class=\"index-row\">"),
        MarkerSet::single("</li>"),
    );
    for field in &mut markers.fields {
        let class = field
            .start
            .alternatives()
            .first()
            .and_then(|m| m.split('"').nth(1))
            .unwrap()
            .to_string();
        field.start = MarkerSet::single(format!("<span class=\"{class}\">"));
        field.end = MarkerSet::single("</span>");
    }
    let parser = WorldIndexParser::with_markers(markers).unwrap();

    let page = r#"<span class="timestamp">Updated 11/14/2025 4:05 PM ET</span>
<ul>
<li class="index-row"><span class="idx-name">Nikkei 225</span><span class="idx-last">50,376.53</span><span class="idx-chg">-905.30</span><span class="idx-pct">-1.77%</span><span class="idx-time">11/14</span></li>
</ul>"#;
    let ctx = ParseContext::new(SourceKind::WorldIndex, "asia-pacific");
    let result = parser.parse_with_context(page, &ctx).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.records[0].name, "Nikkei 225");
    assert_eq!(result.records[0].change_percent, -1.77);
    assert_eq!(result.records[0].country, None);
}
