//! Full page scan throughput
//!
//! Scans a world index page with a few hundred rows and an index board page,
//! which covers marker search, field extraction and number/time
//! normalization end to end.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use market_pulse_lib::domain::SourceKind;
use market_pulse_lib::infrastructure::parsing::{
    ContextualParser, IndexBoardParser, ParseContext, WorldIndexParser,
};

fn world_index_page(rows: usize) -> String {
    let mut page = String::from(
        "<html><body><span class=\"timestamp\">Updated 11/14/2025 4:05 PM ET</span><table>\n",
    );
    for n in 0..rows {
        if n % 25 == 0 {
            page.push_str(&format!(
                "<tr class=\"country-row\"><th colspan=\"6\">Country {}</th></tr>\n",
                n / 25
            ));
        }
        let time = if n % 2 == 0 { "14:52" } else { "11/13" };
        page.push_str(&format!(
            "<tr class=\"index-row\"><td class=\"idx-name\"><a href=\"/q/{n}\">Index &amp; Co {n}</a></td>\
<td class=\"idx-last\">{},{:03}.{:02}</td><td class=\"idx-chg\">-{}.74</td><td class=\"idx-pct\">-0.{}%</td>\
<td class=\"idx-ytd\">+1.0%</td><td class=\"idx-time\">{time}</td></tr>\n",
            1 + n % 40,
            n % 1000,
            n % 100,
            n % 300,
            n % 10
        ));
    }
    page.push_str("</table></body></html>");
    page
}

fn board_page(rows: usize) -> String {
    let mut page = String::from(
        "<p class=\"board-status\">Stand: 14.11.2025 17:35:12 Uhr</p>\n<h3 class=\"board-section\">Alle</h3><table>\n",
    );
    for n in 0..rows {
        page.push_str(&format!(
            "<tr class=\"board-row\" data-id=\"{n}\"><td class=\"code\">IX{n}</td><td class=\"name\">Index {n}</td>\
<td class=\"num\">23.876,55</td><td class=\"num\">24.041,62</td><td class=\"num\">-</td>\
<td class=\"num\">24.112,09</td><td class=\"num\">23.754,30</td><td class=\"time\">17:35:12</td></tr>\n"
        ));
    }
    page.push_str("</table>");
    page
}

fn page_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_scan");

    let world = world_index_page(400);
    let world_parser = WorldIndexParser::new().expect("default world index markers");
    let world_ctx = ParseContext::new(SourceKind::WorldIndex, "bench");
    group.throughput(Throughput::Bytes(world.len() as u64));
    group.bench_function("world_index_400_rows", |b| {
        b.iter(|| {
            world_parser
                .parse_with_context(black_box(&world), &world_ctx)
                .map(|page| page.len())
        })
    });

    let board = board_page(400);
    let board_parser = IndexBoardParser::new().expect("default board markers");
    let board_ctx = ParseContext::new(SourceKind::IndexBoard, "bench");
    group.throughput(Throughput::Bytes(board.len() as u64));
    group.bench_function("index_board_400_rows", |b| {
        b.iter(|| {
            board_parser
                .parse_with_context(black_box(&board), &board_ctx)
                .map(|page| page.len())
        })
    });

    group.finish();
}

criterion_group!(benches, page_scan);
criterion_main!(benches);
