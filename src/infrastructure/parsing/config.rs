//! Marker vocabulary for each page family
//!
//! Every source is described declaratively: where the publish time sits, how
//! group headers and records are delimited, and which fields a record carries
//! in positional order. Every boundary keeps a list of alternates because the
//! sites have shipped more than one spelling of the same markup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::clock::TimeTokenFormat;
use super::markers::MarkerSet;
use super::numbers::NumberFormat;
use crate::domain::constants::zones;
use crate::domain::SourceKind;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

/// Marker configuration for all supported sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub world_index: SourceMarkers,
    pub index_board: SourceMarkers,
    pub security_snapshot: SourceMarkers,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            world_index: SourceMarkers::world_index(),
            index_board: SourceMarkers::index_board(),
            security_snapshot: SourceMarkers::security_snapshot(),
        }
    }
}

impl ParsingConfig {
    pub fn for_source(&self, source: SourceKind) -> &SourceMarkers {
        match source {
            SourceKind::WorldIndex => &self.world_index,
            SourceKind::IndexBoard => &self.index_board,
            SourceKind::SecuritySnapshot => &self.security_snapshot,
        }
    }

    pub fn validate(&self) -> ParsingResult<()> {
        self.world_index.validate("markers.world_index")?;
        self.index_board.validate("markers.index_board")?;
        self.security_snapshot.validate("markers.security_snapshot")?;
        Ok(())
    }
}

/// A start/end marker pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMarkers {
    pub start: MarkerSet,
    pub end: MarkerSet,
}

impl FieldMarkers {
    pub fn new(start: MarkerSet, end: MarkerSet) -> Self {
        Self { start, end }
    }
}

/// One positional field inside a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub key: String,
    pub start: MarkerSet,
    pub end: MarkerSet,
    /// A missing required field drops the record
    #[serde(default = "default_true")]
    pub required: bool,
    /// Uncaptured fields are consumed and skipped
    #[serde(default = "default_true")]
    pub capture: bool,
}

fn default_true() -> bool {
    true
}

impl FieldLayout {
    pub fn required(key: &str, start: MarkerSet, end: MarkerSet) -> Self {
        Self {
            key: key.to_string(),
            start,
            end,
            required: true,
            capture: true,
        }
    }

    pub fn optional(key: &str, start: MarkerSet, end: MarkerSet) -> Self {
        Self {
            required: false,
            ..Self::required(key, start, end)
        }
    }

    pub fn skipped(key: &str, start: MarkerSet, end: MarkerSet) -> Self {
        Self {
            required: false,
            capture: false,
            ..Self::required(key, start, end)
        }
    }
}

/// Declarative description of one page family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMarkers {
    pub publish_time: FieldMarkers,
    /// `chrono` format strings, tried in order
    pub publish_time_formats: Vec<String>,
    /// IANA zone name the page's times are printed in
    pub time_zone: String,
    #[serde(default)]
    pub group_header: Option<FieldMarkers>,
    /// Record start markers; `end` may be empty when rows are only
    /// delimited by the next row
    pub record: FieldMarkers,
    pub fields: Vec<FieldLayout>,
    #[serde(default)]
    pub number_format: NumberFormat,
    #[serde(default)]
    pub time_token: TimeTokenFormat,
}

/// `<tag class="name">` in both quote styles
fn class_tag(tag: &str, class: &str) -> MarkerSet {
    MarkerSet::new([
        format!("<{tag} class=\"{class}\">"),
        format!("<{tag} class='{class}'>"),
    ])
}

/// Opening of `<tag class="name" ...>` where further attributes may follow
fn class_tag_open(tag: &str, class: &str) -> MarkerSet {
    MarkerSet::new([
        format!("<{tag} class=\"{class}\""),
        format!("<{tag} class='{class}'"),
    ])
}

fn closing(tag: &str) -> MarkerSet {
    MarkerSet::new([format!("</{tag}>"), format!("</{}>", tag.to_ascii_uppercase())])
}

fn formats(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl SourceMarkers {
    /// World-index digest: country rows followed by index rows
    pub fn world_index() -> Self {
        let cell = |class: &str| class_tag("td", class);
        Self {
            publish_time: FieldMarkers::new(
                MarkerSet::new([
                    "<span class=\"timestamp\">Updated ",
                    "<span class='timestamp'>Updated ",
                    "<span class=\"timestamp\">As of ",
                ]),
                MarkerSet::new([" ET</span>", "</span>"]),
            ),
            publish_time_formats: formats(&[
                "%m/%d/%Y %I:%M %p",
                "%b %d, %Y %I:%M %p",
                "%m/%d/%Y %H:%M",
                "%m/%d/%Y",
            ]),
            time_zone: zones::WORLD_INDEX.to_string(),
            group_header: Some(FieldMarkers::new(class_tag("tr", "country-row"), closing("tr"))),
            record: FieldMarkers::new(class_tag_open("tr", "index-row"), closing("tr")),
            fields: vec![
                FieldLayout::required("name", cell("idx-name"), closing("td")),
                FieldLayout::required("value", cell("idx-last"), closing("td")),
                FieldLayout::optional("change", cell("idx-chg"), closing("td")),
                FieldLayout::optional("change_percent", cell("idx-pct"), closing("td")),
                FieldLayout::skipped("ytd", cell("idx-ytd"), closing("td")),
                FieldLayout::required("time", cell("idx-time"), closing("td")),
            ],
            number_format: NumberFormat::EN,
            time_token: TimeTokenFormat::MONTH_FIRST,
        }
    }

    /// Exchange index board: section headings followed by board rows
    pub fn index_board() -> Self {
        let num = || class_tag("td", "num");
        Self {
            publish_time: FieldMarkers::new(
                MarkerSet::new([
                    "<p class=\"board-status\">Stand: ",
                    "<p class='board-status'>Stand: ",
                ]),
                MarkerSet::new([" Uhr</p>", "</p>"]),
            ),
            publish_time_formats: formats(&["%d.%m.%Y %H:%M:%S", "%d.%m.%Y %H:%M", "%d.%m.%Y"]),
            time_zone: zones::INDEX_BOARD.to_string(),
            group_header: Some(FieldMarkers::new(class_tag("h3", "board-section"), closing("h3"))),
            record: FieldMarkers::new(class_tag_open("tr", "board-row"), closing("tr")),
            fields: vec![
                FieldLayout::required("code", class_tag("td", "code"), closing("td")),
                FieldLayout::required("name", class_tag("td", "name"), closing("td")),
                FieldLayout::required("last", num(), closing("td")),
                FieldLayout::optional("previous_close", num(), closing("td")),
                FieldLayout::skipped("turnover", num(), closing("td")),
                FieldLayout::optional("high", num(), closing("td")),
                FieldLayout::optional("low", num(), closing("td")),
                FieldLayout::required("time", class_tag("td", "time"), closing("td")),
            ],
            number_format: NumberFormat::DE,
            time_token: TimeTokenFormat::DAY_FIRST,
        }
    }

    /// Security snapshot: sections of label/value pairs
    pub fn security_snapshot() -> Self {
        Self {
            publish_time: FieldMarkers::new(
                MarkerSet::new([
                    "<div class=\"quote-meta\">Quote as of ",
                    "<div class='quote-meta'>Quote as of ",
                    "<div class=\"quote-meta\">As of ",
                ]),
                MarkerSet::new([" ET</div>", "</div>"]),
            ),
            publish_time_formats: formats(&["%b %d, %Y %I:%M %p", "%m/%d/%Y %I:%M %p", "%m/%d/%Y"]),
            time_zone: zones::SECURITY_SNAPSHOT.to_string(),
            group_header: Some(FieldMarkers::new(
                class_tag("h2", "snapshot-section"),
                closing("h2"),
            )),
            record: FieldMarkers::new(class_tag("div", "kv"), closing("div")),
            fields: vec![
                FieldLayout::required(
                    "label",
                    MarkerSet::new(["class=\"kv-label\">", "class='kv-label'>"]),
                    closing("span"),
                ),
                FieldLayout::required(
                    "value",
                    MarkerSet::new(["class=\"kv-value\">", "class='kv-value'>"]),
                    closing("span"),
                ),
            ],
            number_format: NumberFormat::EN,
            time_token: TimeTokenFormat::MONTH_FIRST,
        }
    }

    /// Reject configurations the scan loop cannot run with.
    /// `prefix` names the config section in the error.
    pub fn validate(&self, prefix: &str) -> ParsingResult<()> {
        let require = |set: &MarkerSet, name: &str| {
            if set.is_empty() {
                Err(ParsingError::configuration(
                    &format!("{prefix}.{name}"),
                    "marker set has no non-empty alternative",
                ))
            } else {
                Ok(())
            }
        };

        require(&self.publish_time.start, "publish_time.start")?;
        require(&self.publish_time.end, "publish_time.end")?;
        require(&self.record.start, "record.start")?;
        if let Some(header) = &self.group_header {
            require(&header.start, "group_header.start")?;
            require(&header.end, "group_header.end")?;
        }

        if self.publish_time_formats.is_empty() {
            return Err(ParsingError::configuration(
                &format!("{prefix}.publish_time_formats"),
                "at least one format is required",
            ));
        }
        if self.time_zone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ParsingError::configuration(
                &format!("{prefix}.time_zone"),
                format!("unknown time zone '{}'", self.time_zone),
            ));
        }
        if self.number_format.decimal == self.number_format.grouping {
            return Err(ParsingError::configuration(
                &format!("{prefix}.number_format"),
                "decimal and grouping separators must differ",
            ));
        }

        if self.fields.is_empty() {
            return Err(ParsingError::configuration(
                &format!("{prefix}.fields"),
                "a record needs at least one field",
            ));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            require(&field.start, &format!("fields.{}.start", field.key))?;
            require(&field.end, &format!("fields.{}.end", field.key))?;
            if !seen.insert(field.key.as_str()) {
                return Err(ParsingError::configuration(
                    &format!("{prefix}.fields"),
                    format!("duplicate field key '{}'", field.key),
                ));
            }
        }
        Ok(())
    }
}
