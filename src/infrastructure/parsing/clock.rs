//! Page publish time and per-record time reconstruction
//!
//! Pages print one full publish timestamp near the top and only a partial
//! time on each row. A row token is either a date (`11/07`, `07.11.`) meaning
//! an end-of-day close, or a clock time (`14:52`) meaning a live tick on the
//! publish day. Both are completed from the page's [`PageClock`].

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, TimeZone,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// How a source writes the date branch of a row time token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTokenFormat {
    pub date_separator: char,
    /// `true` for `DD.MM`, `false` for `MM/DD`
    pub day_first: bool,
}

impl TimeTokenFormat {
    pub const MONTH_FIRST: Self = Self {
        date_separator: '/',
        day_first: false,
    };

    pub const DAY_FIRST: Self = Self {
        date_separator: '.',
        day_first: true,
    };
}

impl Default for TimeTokenFormat {
    fn default() -> Self {
        Self::MONTH_FIRST
    }
}

/// Shape of a row time token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeToken {
    /// End-of-day close; `year` is only set when the token spells it out
    Date { month: u32, day: u32, year: Option<i32> },
    /// Intraday tick on the publish day
    Clock { hour: u32, minute: u32, second: u32 },
}

impl TimeToken {
    /// Classify `raw`. `None` when the token is neither a date nor a clock time.
    pub fn classify(raw: &str, format: &TimeTokenFormat) -> Option<Self> {
        let raw = raw.trim();
        if raw.contains(':') {
            return parse_clock(raw);
        }
        if raw.contains(format.date_separator) {
            return parse_date(raw, format);
        }
        None
    }

    pub fn is_intraday(&self) -> bool {
        matches!(self, Self::Clock { .. })
    }
}

fn parse_clock(raw: &str) -> Option<TimeToken> {
    let mut parts = raw.split(':');
    let hour = parse_unit(parts.next()?, 2)?;
    let minute = parse_unit(parts.next()?, 2)?;
    let second = match parts.next() {
        Some(part) => parse_unit(part, 2)?,
        None => 0,
    };
    if parts.next().is_some() || hour > 23 || minute > 59 || second > 59 {
        return None;
    }
    Some(TimeToken::Clock {
        hour,
        minute,
        second,
    })
}

fn parse_date(raw: &str, format: &TimeTokenFormat) -> Option<TimeToken> {
    // `07.11.` and `07.11.2025` are both printed by day-first sources
    let raw = raw.trim_end_matches(format.date_separator);
    let parts: Vec<&str> = raw.split(format.date_separator).collect();
    if parts.len() != 2 && parts.len() != 3 {
        return None;
    }
    let first = parse_unit(parts[0], 2)?;
    let second = parse_unit(parts[1], 2)?;
    let (month, day) = if format.day_first {
        (second, first)
    } else {
        (first, second)
    };
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    let year = match parts.get(2) {
        Some(part) => {
            let value = parse_unit(part, 4)? as i32;
            Some(if part.len() == 2 { 2000 + value } else { value })
        }
        None => None,
    };
    Some(TimeToken::Date { month, day, year })
}

fn parse_unit(part: &str, max_len: usize) -> Option<u32> {
    let part = part.trim();
    if part.is_empty() || part.len() > max_len || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// A reconstructed record timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTime {
    pub observed_at: DateTime<FixedOffset>,
    pub is_intraday: bool,
}

/// Publish time of one page, in the source's zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageClock {
    published: DateTime<Tz>,
}

impl PageClock {
    /// Parse the page's publish time with the first matching format.
    ///
    /// Date-only formats give local midnight. A trailing zone abbreviation
    /// (`ET`, `CEST`) is ignored since the zone is fixed per source.
    pub fn parse(raw: &str, formats: &[String], zone: Tz) -> Option<Self> {
        let raw = raw.trim();
        let naive = parse_naive(raw, formats).or_else(|| {
            let stripped = strip_zone_abbreviation(raw)?;
            parse_naive(stripped, formats)
        })?;
        let published = localize(zone, naive)?;
        Some(Self { published })
    }

    pub fn published(&self) -> DateTime<Tz> {
        self.published
    }

    pub fn published_fixed(&self) -> DateTime<FixedOffset> {
        to_fixed(self.published)
    }

    pub fn year(&self) -> i32 {
        self.published.year()
    }

    /// Complete a row token into a full timestamp.
    ///
    /// A date token takes the publish year (unless it carries its own) at
    /// local midnight; a clock token lands on the publish day.
    pub fn resolve(&self, token: TimeToken) -> Option<RecordTime> {
        let naive = match token {
            TimeToken::Date { month, day, year } => {
                NaiveDate::from_ymd_opt(year.unwrap_or(self.year()), month, day)?
                    .and_time(NaiveTime::MIN)
            }
            TimeToken::Clock {
                hour,
                minute,
                second,
            } => self
                .published
                .date_naive()
                .and_time(NaiveTime::from_hms_opt(hour, minute, second)?),
        };
        let local = localize(self.published.timezone(), naive)?;
        Some(RecordTime {
            observed_at: to_fixed(local),
            is_intraday: token.is_intraday(),
        })
    }

    /// Classify and resolve `raw` in one step
    pub fn resolve_raw(&self, raw: &str, format: &TimeTokenFormat) -> Option<RecordTime> {
        self.resolve(TimeToken::classify(raw, format)?)
    }
}

fn parse_naive(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    formats.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format).ok().or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
    })
}

fn strip_zone_abbreviation(raw: &str) -> Option<&str> {
    let (head, tail) = raw.rsplit_once(' ')?;
    let is_abbreviation = (2..=4).contains(&tail.len()) && tail.bytes().all(|b| b.is_ascii_uppercase());
    is_abbreviation.then(|| head.trim_end())
}

/// Wall-clock time to an instant in `zone`.
///
/// A repeated time takes the earlier instant. A skipped time (DST gap) is
/// read with the offset in force before the gap, so `02:30` in a
/// `02:00 -> 03:00` gap becomes `03:30`, and a skipped midnight becomes the
/// first instant of the day.
fn localize(zone: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            let before = zone
                .from_local_datetime(&naive.checked_sub_signed(Duration::days(1))?)
                .earliest()?;
            let offset = before.offset().fix().local_minus_utc();
            let utc = naive.checked_sub_signed(Duration::seconds(i64::from(offset)))?;
            Some(zone.from_utc_datetime(&utc))
        }
    }
}

fn to_fixed(dt: DateTime<Tz>) -> DateTime<FixedOffset> {
    dt.with_timezone(&dt.offset().fix())
}
