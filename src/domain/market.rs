//! Market records produced by the page parsers
//!
//! Records are plain values: built once by a source parser and handed to the
//! caller for storage and event publication.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::{AMOUNT_UNAVAILABLE, CHANGE_UNAVAILABLE};

/// The external page families this crate knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    WorldIndex,
    IndexBoard,
    SecuritySnapshot,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorldIndex => "world_index",
            Self::IndexBoard => "index_board",
            Self::SecuritySnapshot => "security_snapshot",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a world-index digest page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexQuote {
    pub source: SourceKind,
    /// Region of the digest page (from the page context, not the markup)
    pub region: Option<String>,
    /// Country header the row was listed under
    pub country: Option<String>,
    pub name: String,
    pub value: f64,
    /// Absolute change; `CHANGE_UNAVAILABLE` when the page cell was unreadable
    pub change: f64,
    /// Change in percent units (2.35 means 2.35%)
    pub change_percent: f64,
    pub observed_at: DateTime<FixedOffset>,
    /// `true` for a live tick, `false` for an end-of-day close
    pub is_intraday: bool,
}

impl IndexQuote {
    pub fn has_change(&self) -> bool {
        is_change_available(self.change)
    }

    pub fn has_change_percent(&self) -> bool {
        is_change_available(self.change_percent)
    }
}

/// One row of an exchange's live index board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexTick {
    pub source: SourceKind,
    /// Board section the row was listed under
    pub group: Option<String>,
    pub code: String,
    pub name: String,
    pub last: f64,
    pub previous_close: f64,
    pub high: f64,
    pub low: f64,
    pub change: f64,
    pub change_percent: f64,
    pub observed_at: DateTime<FixedOffset>,
    pub is_intraday: bool,
}

impl IndexTick {
    pub fn has_change_percent(&self) -> bool {
        is_change_available(self.change_percent)
    }
}

/// Security metadata assembled from a brokerage snapshot page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfile {
    pub source: Option<SourceKind>,
    pub symbol: Option<String>,
    pub name: String,
    pub isin: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub currency: Option<String>,
    pub last_price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub week52_high: Option<f64>,
    pub week52_low: Option<f64>,
    pub as_of: Option<DateTime<FixedOffset>>,
}

/// `false` for the change sentinel (and anything non-finite)
pub fn is_change_available(value: f64) -> bool {
    value.is_finite() && value != CHANGE_UNAVAILABLE
}

/// `false` for the amount sentinel
pub fn is_amount_available(value: f64) -> bool {
    value.is_finite() && value != AMOUNT_UNAVAILABLE
}

/// Percent change of `current` against `base`.
///
/// A zero or unavailable base gives `CHANGE_UNAVAILABLE` instead of an
/// infinite or NaN ratio (newly listed instruments have no previous close).
pub fn percent_change(current: f64, base: f64) -> f64 {
    if !is_change_available(current) || !is_amount_available(base) {
        return CHANGE_UNAVAILABLE;
    }
    let ratio = (current - base) / base * 100.0;
    if ratio.is_finite() { ratio } else { CHANGE_UNAVAILABLE }
}
