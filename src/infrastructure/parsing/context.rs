//! Parse context and per-page results
//!
//! A page scan never fails because of one bad row. What went wrong is
//! collected as [`Diagnostic`]s next to the records that did parse.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::SourceKind;

/// Context information for one page parse
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub source: SourceKind,
    /// Short page identifier used in logs and diagnostics (region, symbol, ...)
    pub page_id: String,
    pub url: Option<String>,
    /// Region label for digest pages that do not print it
    pub region: Option<String>,
}

impl ParseContext {
    pub fn new(source: SourceKind, page_id: impl Into<String>) -> Self {
        Self {
            source,
            page_id: page_id.into(),
            url: None,
            region: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Why a record was left out of a page result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RecordDrop {
    /// A required field's markers were not found inside the record
    FieldMissing { field: String },
    /// The field was present but its value could not be used
    Malformed { field: String, raw: String },
    /// The time token was neither a date nor a clock time
    TimeInconclusive { raw: String },
}

impl RecordDrop {
    pub fn field_missing(field: &str) -> Self {
        Self::FieldMissing {
            field: field.to_string(),
        }
    }

    pub fn malformed(field: &str, raw: &str) -> Self {
        Self::Malformed {
            field: field.to_string(),
            raw: raw.to_string(),
        }
    }
}

impl fmt::Display for RecordDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldMissing { field } => write!(f, "field '{field}' missing"),
            Self::Malformed { field, raw } => write!(f, "field '{field}' malformed: '{raw}'"),
            Self::TimeInconclusive { raw } => write!(f, "inconclusive time token '{raw}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticKind {
    RecordDropped(RecordDrop),
    /// A group header started but never ended
    HeaderUnterminated,
    /// A snapshot label this crate does not map
    UnknownLabel { label: String },
}

/// One recoverable anomaly found while scanning a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub source: SourceKind,
    pub page: String,
    pub kind: DiagnosticKind,
    /// Byte offset of the record or header in the page text
    pub offset: usize,
    /// Page text the diagnostic refers to, shortened
    pub raw: String,
}

impl Diagnostic {
    pub fn new(context: &ParseContext, kind: DiagnosticKind, offset: usize, raw: &str) -> Self {
        Self {
            source: context.source,
            page: context.page_id.clone(),
            kind,
            offset,
            raw: shorten(raw, 160),
        }
    }

    pub fn drop_reason(&self) -> Option<&RecordDrop> {
        match &self.kind {
            DiagnosticKind::RecordDropped(reason) => Some(reason),
            _ => None,
        }
    }
}

fn shorten(raw: &str, max_chars: usize) -> String {
    match raw.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &raw[..idx]),
        None => raw.to_string(),
    }
}

/// Records of one page in document order, plus what was skipped
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<R> {
    pub records: Vec<R>,
    pub diagnostics: Vec<Diagnostic>,
    pub published_at: Option<DateTime<FixedOffset>>,
}

impl<R> Default for PageResult<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            diagnostics: Vec::new(),
            published_at: None,
        }
    }
}

impl<R> PageResult<R> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Reasons for every dropped record, in document order
    pub fn dropped(&self) -> impl Iterator<Item = &RecordDrop> {
        self.diagnostics.iter().filter_map(Diagnostic::drop_reason)
    }
}
