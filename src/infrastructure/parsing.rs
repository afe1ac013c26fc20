//! Marker-based page parsing
//!
//! Market pages are scanned as text, not as a DOM: a forward-only [`Cursor`]
//! looks for literal markers, slices the fields between them and hands them
//! to a per-source record builder. Each source is a [`SourceMarkers`]
//! vocabulary plus a [`RecordBuilder`]; the loop itself lives in
//! [`scan_loop`].

pub mod clock;
pub mod config;
pub mod context;
pub mod cursor;
pub mod extract;
pub mod index_board_parser;
pub mod markers;
pub mod numbers;
pub mod scan_loop;
pub mod security_snapshot_parser;
pub mod world_index_parser;

// Re-export public types
pub use crate::infrastructure::parsing_error::{ErrorClass, ParsingError, ParsingResult};
pub use clock::{PageClock, RecordTime, TimeToken, TimeTokenFormat};
pub use config::{FieldLayout, FieldMarkers, ParsingConfig, SourceMarkers};
pub use context::{Diagnostic, DiagnosticKind, PageResult, ParseContext, RecordDrop};
pub use cursor::Cursor;
pub use extract::RawField;
pub use index_board_parser::IndexBoardParser;
pub use markers::{MarkerLookahead, MarkerMatch, MarkerSet};
pub use numbers::{NumberFormat, NumberParser};
pub use scan_loop::{RawRecord, RecordBuilder, RecordScope, ScanState, SourceScanner};
pub use security_snapshot_parser::SecuritySnapshotParser;
pub use world_index_parser::WorldIndexParser;

use crate::domain::SourceKind;

/// A parser for one page family.
///
/// Implementations hold only immutable configuration, so one instance can be
/// shared by every concurrent page scan of its source.
pub trait ContextualParser: Send + Sync {
    type Output: Send;

    fn source(&self) -> SourceKind;

    /// Parse one page's text.
    ///
    /// Bad rows are dropped and reported in the result's diagnostics; an
    /// error means the page produced nothing usable.
    fn parse_with_context(
        &self,
        text: &str,
        context: &ParseContext,
    ) -> ParsingResult<PageResult<Self::Output>>;
}
