//! Generic page scan loop
//!
//! One state machine serves every source. The source supplies its marker
//! vocabulary ([`SourceMarkers`]) and a [`RecordBuilder`] that turns the raw
//! fields of one record into a domain record.
//!
//! ```text
//! publish time ──> classify ──┬─> ScanningHeader ──┐
//!                     ^       ├─> ScanningRecord ──┤
//!                     │       └─> Done             │
//!                     └────────────────────────────┘
//! ```

use chrono_tz::Tz;
use tracing::{debug, info_span, warn};

use super::clock::{PageClock, RecordTime, TimeTokenFormat};
use super::config::{FieldMarkers, SourceMarkers};
use super::context::{Diagnostic, DiagnosticKind, PageResult, ParseContext, RecordDrop};
use super::cursor::Cursor;
use super::extract::RawField;
use super::markers::{MarkerLookahead, MarkerMatch, classify_next, find_next};
use super::numbers::NumberParser;
use crate::domain::SourceKind;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

/// Scan loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// A group header starts at the match
    ScanningHeader(MarkerMatch),
    /// A record starts at the match
    ScanningRecord(MarkerMatch),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextToken {
    GroupHeader,
    Record,
}

/// Captured fields of one record, before interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Label of the last group header before the record
    pub group: Option<String>,
    /// Byte offset of the record start marker
    pub offset: usize,
    fields: Vec<(String, RawField)>,
}

impl RawRecord {
    pub fn new(group: Option<String>, offset: usize) -> Self {
        Self {
            group,
            offset,
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, key: &str, field: RawField) {
        self.fields.push((key.to_string(), field));
    }

    /// Non-blank text of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.field(key)
            .filter(|field| !field.is_blank())
            .map(RawField::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&RawField> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, field)| field)
    }

    /// Like [`get`](Self::get), but a missing or blank field drops the record
    pub fn require(&self, key: &str) -> Result<&str, RecordDrop> {
        self.get(key).ok_or_else(|| RecordDrop::field_missing(key))
    }
}

/// Everything a builder may consult while turning raw records into records
pub struct RecordScope<'a> {
    pub clock: PageClock,
    pub numbers: &'a NumberParser,
    pub time_token: TimeTokenFormat,
    pub context: &'a ParseContext,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> RecordScope<'a> {
    pub fn new(
        clock: PageClock,
        numbers: &'a NumberParser,
        time_token: TimeTokenFormat,
        context: &'a ParseContext,
    ) -> Self {
        Self {
            clock,
            numbers,
            time_token,
            context,
            diagnostics: Vec::new(),
        }
    }

    /// Classify a row time token against the page clock
    pub fn resolve_time(&self, raw: &str) -> Result<RecordTime, RecordDrop> {
        self.clock
            .resolve_raw(raw, &self.time_token)
            .ok_or_else(|| RecordDrop::TimeInconclusive {
                raw: raw.to_string(),
            })
    }

    /// Record a recoverable anomaly for the page result
    pub fn note(&mut self, kind: DiagnosticKind, offset: usize, raw: &str) {
        self.diagnostics
            .push(Diagnostic::new(self.context, kind, offset, raw));
    }

    fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Source-specific interpretation of raw records
pub trait RecordBuilder {
    type Record;

    /// Interpret one raw record.
    ///
    /// `Ok(None)` means the record was absorbed without producing output
    /// (the snapshot builder folds many pairs into one profile).
    fn build(
        &mut self,
        raw: &RawRecord,
        scope: &mut RecordScope<'_>,
    ) -> Result<Option<Self::Record>, RecordDrop>;

    /// Called once after the last record
    fn finish(
        self,
        _scope: &mut RecordScope<'_>,
        _records: &mut Vec<Self::Record>,
    ) -> ParsingResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Forward-only lookahead over the structural markers of one page
struct PageLookahead<'a> {
    /// Header family first, so it wins a tie with a record start
    tokens: Vec<(NextToken, MarkerLookahead<'a>)>,
    record_end: MarkerLookahead<'a>,
}

impl<'a> PageLookahead<'a> {
    fn new(text: &'a str, markers: &'a SourceMarkers) -> Self {
        let mut tokens = Vec::with_capacity(2);
        if let Some(header) = &markers.group_header {
            tokens.push((NextToken::GroupHeader, MarkerLookahead::new(text, &header.start)));
        }
        tokens.push((NextToken::Record, MarkerLookahead::new(text, &markers.record.start)));
        Self {
            tokens,
            record_end: MarkerLookahead::new(text, &markers.record.end),
        }
    }

    fn next_token(&mut self, from: usize) -> Option<(NextToken, MarkerMatch)> {
        classify_next(&mut self.tokens, from)
    }

    fn next_record(&mut self, from: usize) -> Option<MarkerMatch> {
        self.tokens
            .iter_mut()
            .find(|(kind, _)| *kind == NextToken::Record)
            .and_then(|(_, lookahead)| lookahead.find(from))
    }

    fn classify(&mut self, cursor: &Cursor<'_>) -> ScanState {
        match self.next_token(cursor.position()) {
            Some((NextToken::GroupHeader, found)) => ScanState::ScanningHeader(found),
            Some((NextToken::Record, found)) => ScanState::ScanningRecord(found),
            None => ScanState::Done,
        }
    }

    /// End of the record body and where scanning resumes.
    ///
    /// The body ends at the record end marker, or earlier when another header
    /// or record starts first (a row that lost its closing tag).
    fn record_span(&mut self, text_len: usize, body_start: usize) -> (usize, usize) {
        let end = self.record_end.find(body_start);
        let next = self.next_token(body_start).map(|(_, m)| m.offset);
        match (end, next) {
            (Some(end), Some(next)) if next < end.offset => (next, next),
            (Some(end), _) => (end.offset, end.end()),
            (None, Some(next)) => (next, next),
            (None, None) => (text_len, text_len),
        }
    }
}

/// Scan loop bound to one source's marker vocabulary.
///
/// Holds no per-page state: every [`scan`](Self::scan) call owns its cursor
/// and marker lookahead, so one scanner can serve concurrent pages.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    source: SourceKind,
    markers: SourceMarkers,
    zone: Tz,
    numbers: NumberParser,
}

impl SourceScanner {
    pub fn new(source: SourceKind, markers: SourceMarkers) -> ParsingResult<Self> {
        let prefix = format!("markers.{source}");
        markers.validate(&prefix)?;
        let zone = markers.time_zone.parse::<Tz>().map_err(|e| {
            ParsingError::configuration(&format!("{prefix}.time_zone"), e.to_string())
        })?;
        let numbers = NumberParser::new(markers.number_format).map_err(|e| {
            ParsingError::configuration(&format!("{prefix}.number_format"), e.to_string())
        })?;
        Ok(Self {
            source,
            markers,
            zone,
            numbers,
        })
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Scan one page and hand every record to `builder`.
    pub fn scan<B: RecordBuilder>(
        &self,
        text: &str,
        context: &ParseContext,
        mut builder: B,
    ) -> ParsingResult<PageResult<B::Record>> {
        let span = info_span!("scan_page", source = %context.source, page = %context.page_id);
        let _guard = span.enter();

        let clock = self.publish_clock(text, context)?;
        let mut scope = RecordScope::new(clock, &self.numbers, self.markers.time_token, context);
        let mut records = Vec::new();
        let mut group: Option<String> = None;
        let mut cursor = Cursor::new(text);
        let mut lookahead = PageLookahead::new(text, &self.markers);

        let mut state = lookahead.classify(&cursor);
        loop {
            match state {
                ScanState::ScanningHeader(found) => {
                    self.scan_header(&mut cursor, &mut lookahead, found, &mut group, &mut scope);
                }
                ScanState::ScanningRecord(found) => {
                    if let Some(record) = self.scan_record(
                        &mut cursor,
                        &mut lookahead,
                        found,
                        &group,
                        &mut builder,
                        &mut scope,
                    ) {
                        records.push(record);
                    }
                }
                ScanState::Done => break,
            }
            state = lookahead.classify(&cursor);
        }

        builder.finish(&mut scope, &mut records)?;

        let diagnostics = scope.into_diagnostics();
        debug!(
            "Scanned {} page '{}': {} records, {} diagnostics",
            context.source,
            context.page_id,
            records.len(),
            diagnostics.len()
        );

        Ok(PageResult {
            records,
            diagnostics,
            published_at: Some(clock.published_fixed()),
        })
    }

    /// Locate and parse the publish time on a separate cursor, leaving the
    /// record scan to start from the top of the page.
    fn publish_clock(&self, text: &str, context: &ParseContext) -> ParsingResult<PageClock> {
        let has_structure = self.has_structure(text);
        let mut head = Cursor::new(text);
        let publish = &self.markers.publish_time;

        let Some(raw) = head.extract_between(&publish.start, &publish.end) else {
            if !has_structure {
                warn!("No known markers in {} page '{}'", context.source, context.page_id);
                return Err(self.structure_unrecognized(text, context));
            }
            warn!(
                "Publish time not found in {} page '{}'",
                context.source, context.page_id
            );
            return Err(ParsingError::PublishTimeUnavailable {
                source_kind: context.source,
                page: context.page_id.clone(),
            });
        };

        let Some(clock) = PageClock::parse(raw.as_str(), &self.markers.publish_time_formats, self.zone)
        else {
            let raw_time = raw.as_str();
            warn!(raw = %raw_time, "Unparsable publish time, abandoning page");
            return Err(ParsingError::PublishTimeUnparsable {
                source_kind: context.source,
                page: context.page_id.clone(),
                raw: raw.text,
            });
        };

        if !has_structure {
            warn!(
                "Publish time found but no header or record markers in {} page '{}'",
                context.source, context.page_id
            );
            return Err(self.structure_unrecognized(text, context));
        }
        Ok(clock)
    }

    fn has_structure(&self, text: &str) -> bool {
        find_next(text, &self.markers.record.start, 0).is_some()
            || self
                .markers
                .group_header
                .as_ref()
                .is_some_and(|header| find_next(text, &header.start, 0).is_some())
    }

    fn structure_unrecognized(&self, text: &str, context: &ParseContext) -> ParsingError {
        ParsingError::StructureUnrecognized {
            source_kind: context.source,
            page: context.page_id.clone(),
            content_length: text.len(),
        }
    }

    fn scan_header(
        &self,
        cursor: &mut Cursor<'_>,
        lookahead: &mut PageLookahead<'_>,
        found: MarkerMatch,
        group: &mut Option<String>,
        scope: &mut RecordScope<'_>,
    ) {
        let Some(FieldMarkers { start, end }) = &self.markers.group_header else {
            cursor.advance_to(found.end());
            return;
        };
        let text = cursor.text();

        // A header never extends into the next record
        let limit = lookahead
            .next_record(found.end())
            .map_or(text.len(), |next| next.offset);
        let mut bounded = Cursor::bounded(text, found.offset, limit);

        match bounded.extract_between(start, end) {
            Some(label) => {
                *group = (!label.is_blank()).then(|| label.text.clone());
                cursor.advance_to(label.consumed_to);
            }
            None => {
                warn!(offset = found.offset, "Unterminated group header, skipping it");
                scope.note(
                    DiagnosticKind::HeaderUnterminated,
                    found.offset,
                    &text[found.offset..limit],
                );
                cursor.advance_to(found.end());
            }
        }
    }

    fn scan_record<B: RecordBuilder>(
        &self,
        cursor: &mut Cursor<'_>,
        lookahead: &mut PageLookahead<'_>,
        found: MarkerMatch,
        group: &Option<String>,
        builder: &mut B,
        scope: &mut RecordScope<'_>,
    ) -> Option<B::Record> {
        let text = cursor.text();
        let body_start = found.end();
        let (span_end, resume_at) = lookahead.record_span(text.len(), body_start);

        let mut fields = Cursor::bounded(text, body_start, span_end);
        let mut raw = RawRecord::new(group.clone(), found.offset);
        let mut outcome = Ok(None);
        for layout in &self.markers.fields {
            match fields.extract_between(&layout.start, &layout.end) {
                Some(field) if layout.capture => raw.push(&layout.key, field),
                Some(_) => {}
                None if layout.required => {
                    outcome = Err(RecordDrop::field_missing(&layout.key));
                    break;
                }
                None => {}
            }
        }
        if outcome.is_ok() {
            outcome = builder.build(&raw, scope);
        }

        cursor.advance_to(resume_at);

        match outcome {
            Ok(record) => record,
            Err(reason) => {
                let snippet = &text[found.offset..span_end];
                warn!(offset = found.offset, raw = %snippet, "Dropping record: {}", reason);
                scope.note(DiagnosticKind::RecordDropped(reason), found.offset, snippet);
                None
            }
        }
    }
}
