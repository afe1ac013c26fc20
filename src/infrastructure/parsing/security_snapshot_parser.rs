//! Security snapshot parser
//!
//! A snapshot page is a list of label/value pairs grouped into sections
//! (Quote, Profile, Fundamentals). All pairs of one page are folded into a
//! single [`SecurityProfile`]. Labels vary between page revisions, so each
//! profile field accepts several spellings.

#![allow(clippy::uninlined_format_args)]

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

use super::config::SourceMarkers;
use super::scan_loop::{RawRecord, RecordBuilder, RecordScope, SourceScanner};
use super::{
    ContextualParser, DiagnosticKind, PageResult, ParseContext, ParsingError, ParsingResult,
    RecordDrop,
};
use crate::domain::{SecurityProfile, SourceKind};

/// Field keys of [`SourceMarkers::security_snapshot`]
pub mod fields {
    pub const LABEL: &str = "label";
    pub const VALUE: &str = "value";
}

/// Values printed when a figure is not available
const NOT_AVAILABLE: &[&str] = &["n/a", "na", "-", "--", "\u{2014}", "\u{2013}"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileField {
    Name,
    Symbol,
    Isin,
    Exchange,
    Sector,
    Industry,
    Currency,
    LastPrice,
    Change,
    ChangePercent,
    PreviousClose,
    Open,
    Volume,
    MarketCap,
    SharesOutstanding,
    PeRatio,
    DividendYield,
    Week52High,
    Week52Low,
    Week52Range,
}

/// Accepted label spellings per profile field, matched case-insensitively
const LABEL_TABLE: &[(ProfileField, &[&str])] = &[
    (ProfileField::Name, &["name", "company", "company name", "security name"]),
    (ProfileField::Symbol, &["symbol", "ticker", "ticker symbol"]),
    (ProfileField::Isin, &["isin"]),
    (ProfileField::Exchange, &["exchange", "primary exchange", "listing exchange"]),
    (ProfileField::Sector, &["sector"]),
    (ProfileField::Industry, &["industry"]),
    (ProfileField::Currency, &["currency", "trading currency"]),
    (ProfileField::LastPrice, &["last", "last price", "price"]),
    (ProfileField::Change, &["change", "net change", "chg"]),
    (ProfileField::ChangePercent, &["% change", "change %", "percent change", "chg %", "% chg"]),
    (ProfileField::PreviousClose, &["previous close", "prev close", "prev. close"]),
    (ProfileField::Open, &["open", "today's open"]),
    (ProfileField::Volume, &["volume", "vol"]),
    (ProfileField::MarketCap, &["market cap", "mkt cap", "market capitalization"]),
    (ProfileField::SharesOutstanding, &["shares outstanding", "shares out", "shares out."]),
    (ProfileField::PeRatio, &["p/e ratio", "p/e", "pe ratio", "p/e (ttm)"]),
    (ProfileField::DividendYield, &["dividend yield", "div yield", "yield"]),
    (ProfileField::Week52High, &["52 week high", "52-week high", "52 wk high"]),
    (ProfileField::Week52Low, &["52 week low", "52-week low", "52 wk low"]),
    (ProfileField::Week52Range, &["52 week range", "52-week range", "52 wk range"]),
];

static LABELS: Lazy<HashMap<&'static str, ProfileField>> = Lazy::new(|| {
    LABEL_TABLE
        .iter()
        .flat_map(|(field, labels)| labels.iter().map(move |label| (*label, *field)))
        .collect()
});

fn lookup_label(label: &str) -> Option<ProfileField> {
    let key = label.trim().trim_end_matches(':').trim().to_lowercase();
    LABELS.get(key.as_str()).copied()
}

pub struct SecuritySnapshotParser {
    scanner: SourceScanner,
}

impl SecuritySnapshotParser {
    pub fn new() -> ParsingResult<Self> {
        Self::with_markers(SourceMarkers::security_snapshot())
    }

    pub fn with_markers(markers: SourceMarkers) -> ParsingResult<Self> {
        Ok(Self {
            scanner: SourceScanner::new(SourceKind::SecuritySnapshot, markers)?,
        })
    }
}

impl ContextualParser for SecuritySnapshotParser {
    type Output = SecurityProfile;

    fn source(&self) -> SourceKind {
        self.scanner.source()
    }

    /// The result holds at most one profile; a page without a security name
    /// is `RequiredFieldMissing`.
    fn parse_with_context(
        &self,
        text: &str,
        context: &ParseContext,
    ) -> ParsingResult<PageResult<SecurityProfile>> {
        self.scanner.scan(text, context, ProfileFolder::default())
    }
}

#[derive(Default)]
struct ProfileFolder {
    profile: SecurityProfile,
}

/// Drop leading currency symbols and a trailing ISO currency code
fn strip_currency(raw: &str) -> &str {
    let raw = raw.trim_start_matches(['$', '\u{20ac}', '\u{a3}', '\u{a5}']).trim();
    match raw.rsplit_once(' ') {
        Some((number, code)) if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) => {
            number.trim_end()
        }
        _ => raw,
    }
}

impl ProfileFolder {
    fn number(scope: &RecordScope<'_>, label: &str, raw: &str) -> Result<f64, RecordDrop> {
        scope
            .numbers
            .parse_number(strip_currency(raw))
            .ok_or_else(|| RecordDrop::malformed(label, raw))
    }

    fn magnitude(scope: &RecordScope<'_>, label: &str, raw: &str) -> Result<f64, RecordDrop> {
        scope
            .numbers
            .parse_magnitude(strip_currency(raw))
            .ok_or_else(|| RecordDrop::malformed(label, raw))
    }

    fn percent(scope: &RecordScope<'_>, label: &str, raw: &str) -> Result<f64, RecordDrop> {
        let raw = raw.trim_start_matches('(').trim_end_matches(')');
        scope
            .numbers
            .parse_percent_value(raw)
            .ok_or_else(|| RecordDrop::malformed(label, raw))
    }

    fn text(slot: &mut Option<String>, value: &str) {
        slot.get_or_insert_with(|| value.to_string());
    }

    fn amount(slot: &mut Option<f64>, value: f64) {
        slot.get_or_insert(value);
    }

    fn apply(
        &mut self,
        field: ProfileField,
        label: &str,
        value: &str,
        scope: &RecordScope<'_>,
    ) -> Result<(), RecordDrop> {
        let p = &mut self.profile;
        match field {
            ProfileField::Name => {
                if p.name.is_empty() {
                    p.name = value.to_string();
                }
            }
            ProfileField::Symbol => Self::text(&mut p.symbol, value),
            ProfileField::Isin => Self::text(&mut p.isin, value),
            ProfileField::Exchange => Self::text(&mut p.exchange, value),
            ProfileField::Sector => Self::text(&mut p.sector, value),
            ProfileField::Industry => Self::text(&mut p.industry, value),
            ProfileField::Currency => Self::text(&mut p.currency, value),
            ProfileField::LastPrice => Self::amount(&mut p.last_price, Self::number(scope, label, value)?),
            ProfileField::Change => {
                // "+3.12 (+1.16%)" carries both figures; both must parse
                match value.split_once('(') {
                    Some((change, percent)) => {
                        let change = Self::number(scope, label, change)?;
                        let percent = Self::percent(scope, label, percent)?;
                        Self::amount(&mut p.change, change);
                        Self::amount(&mut p.change_percent, percent);
                    }
                    None => Self::amount(&mut p.change, Self::number(scope, label, value)?),
                }
            }
            ProfileField::ChangePercent => {
                Self::amount(&mut p.change_percent, Self::percent(scope, label, value)?)
            }
            ProfileField::PreviousClose => {
                Self::amount(&mut p.previous_close, Self::number(scope, label, value)?)
            }
            ProfileField::Open => Self::amount(&mut p.open, Self::number(scope, label, value)?),
            ProfileField::Volume => Self::amount(&mut p.volume, Self::magnitude(scope, label, value)?),
            ProfileField::MarketCap => {
                Self::amount(&mut p.market_cap, Self::magnitude(scope, label, value)?)
            }
            ProfileField::SharesOutstanding => {
                Self::amount(&mut p.shares_outstanding, Self::magnitude(scope, label, value)?)
            }
            ProfileField::PeRatio => Self::amount(&mut p.pe_ratio, Self::number(scope, label, value)?),
            ProfileField::DividendYield => {
                Self::amount(&mut p.dividend_yield, Self::percent(scope, label, value)?)
            }
            ProfileField::Week52High => {
                Self::amount(&mut p.week52_high, Self::number(scope, label, value)?)
            }
            ProfileField::Week52Low => {
                Self::amount(&mut p.week52_low, Self::number(scope, label, value)?)
            }
            ProfileField::Week52Range => {
                let (low, high) = value
                    .split_once(" - ")
                    .or_else(|| value.split_once('\u{2013}'))
                    .ok_or_else(|| RecordDrop::malformed(label, value))?;
                let low = Self::number(scope, label, low)?;
                let high = Self::number(scope, label, high)?;
                Self::amount(&mut p.week52_low, low);
                Self::amount(&mut p.week52_high, high);
            }
        }
        Ok(())
    }
}

impl RecordBuilder for ProfileFolder {
    type Record = SecurityProfile;

    fn build(
        &mut self,
        raw: &RawRecord,
        scope: &mut RecordScope<'_>,
    ) -> Result<Option<SecurityProfile>, RecordDrop> {
        let label = raw.require(fields::LABEL)?;
        let Some(field) = lookup_label(label) else {
            debug!("Unmapped snapshot label '{}' in section {:?}", label, raw.group);
            scope.note(
                DiagnosticKind::UnknownLabel {
                    label: label.to_string(),
                },
                raw.offset,
                label,
            );
            return Ok(None);
        };

        let value = raw.get(fields::VALUE).unwrap_or_default();
        if NOT_AVAILABLE.contains(&value.to_lowercase().as_str()) || value.is_empty() {
            return Ok(None);
        }

        self.apply(field, label, value, scope)?;
        Ok(None)
    }

    fn finish(
        self,
        scope: &mut RecordScope<'_>,
        records: &mut Vec<SecurityProfile>,
    ) -> ParsingResult<()> {
        let mut profile = self.profile;
        if profile.name.is_empty() {
            return Err(ParsingError::required_field_missing(
                scope.context.source,
                &scope.context.page_id,
                "name",
            ));
        }
        profile.source = Some(SourceKind::SecuritySnapshot);
        profile.as_of = Some(scope.clock.published_fixed());
        if profile.symbol.is_none() {
            profile.symbol = Some(scope.context.page_id.clone());
        }
        records.push(profile);
        Ok(())
    }
}
