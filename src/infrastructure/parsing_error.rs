//! Page-level parsing error types
//!
//! Field and record problems never surface as errors: they become sentinels or
//! diagnostics inside a [`PageResult`](super::parsing::PageResult). A
//! `ParsingError` means a whole page produced no usable output.

use thiserror::Error;

use crate::domain::SourceKind;

/// Coarse classification the caller can use to decide between retry, alert or ignore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    Network,
    PageTime,
    PageStructure,
    Cancelled,
    Configuration,
}

#[derive(Error, Debug, Clone)]
pub enum ParsingError {
    #[error("Failed to fetch {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("{source_kind} page '{page}': publish time marker not found")]
    PublishTimeUnavailable { source_kind: SourceKind, page: String },

    #[error("{source_kind} page '{page}': unparsable publish time '{raw}'")]
    PublishTimeUnparsable {
        source_kind: SourceKind,
        page: String,
        raw: String,
    },

    #[error("{source_kind} page '{page}': no known markers found ({content_length} chars)")]
    StructureUnrecognized {
        source_kind: SourceKind,
        page: String,
        content_length: usize,
    },

    #[error("{source_kind} page '{page}': required field '{field}' not found")]
    RequiredFieldMissing {
        source_kind: SourceKind,
        page: String,
        field: String,
    },

    #[error("Scrape cancelled before fetching {url}")]
    Cancelled { url: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigurationError { field: String, message: String },
}

impl ParsingError {
    pub fn fetch_failed(url: &str, error: &anyhow::Error) -> Self {
        Self::FetchFailed {
            url: url.to_string(),
            // {:#} keeps the anyhow context chain on one line
            message: format!("{error:#}"),
        }
    }

    pub fn required_field_missing(source_kind: SourceKind, page: &str, field: &str) -> Self {
        Self::RequiredFieldMissing {
            source_kind,
            page: page.to_string(),
            field: field.to_string(),
        }
    }

    pub fn configuration(field: &str, message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::FetchFailed { .. } => ErrorClass::Network,
            Self::PublishTimeUnavailable { .. } | Self::PublishTimeUnparsable { .. } => {
                ErrorClass::PageTime
            }
            Self::StructureUnrecognized { .. } | Self::RequiredFieldMissing { .. } => {
                ErrorClass::PageStructure
            }
            Self::Cancelled { .. } => ErrorClass::Cancelled,
            Self::ConfigurationError { .. } => ErrorClass::Configuration,
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
