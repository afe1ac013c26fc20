//! Marker sets and the marker locator
//!
//! A marker is a literal substring that delimits a field or a record. Page
//! revisions spell the same boundary differently (`class="x"` vs `class='x'`),
//! so every boundary is configured as a [`MarkerSet`] of equivalent
//! alternatives.

use serde::{Deserialize, Serialize};

/// Ordered list of literal alternatives for one logical boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerSet(Vec<String>);

impl MarkerSet {
    pub fn new<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(alternatives.into_iter().map(Into::into).collect())
    }

    pub fn single(marker: impl Into<String>) -> Self {
        Self(vec![marker.into()])
    }

    pub fn alternatives(&self) -> &[String] {
        &self.0
    }

    /// `true` when no usable (non-empty) alternative is configured
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }
}

impl From<&[&str]> for MarkerSet {
    fn from(alternatives: &[&str]) -> Self {
        Self::new(alternatives.iter().copied())
    }
}

/// One located marker occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerMatch {
    /// Byte offset of the first matched byte
    pub offset: usize,
    /// Length of the matched alternative in bytes
    pub len: usize,
    /// Index of the alternative that matched
    pub alternative: usize,
}

impl MarkerMatch {
    /// Offset just past the matched marker
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Smallest char boundary at or after `offset`, clamped to `text.len()`
pub(crate) fn ceil_char_boundary(text: &str, offset: usize) -> usize {
    if offset >= text.len() {
        return text.len();
    }
    let mut idx = offset;
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Locate the earliest occurrence of any alternative at or after `from`.
///
/// Empty alternatives are ignored. When two alternatives match at the same
/// offset the longer one wins, so the match always covers the full marker.
pub fn find_next(text: &str, markers: &MarkerSet, from: usize) -> Option<MarkerMatch> {
    let from = ceil_char_boundary(text, from);
    let haystack = &text[from..];

    let mut best: Option<MarkerMatch> = None;
    for (alternative, marker) in markers.alternatives().iter().enumerate() {
        if marker.is_empty() {
            continue;
        }
        let Some(rel) = haystack.find(marker.as_str()) else {
            continue;
        };
        best = prefer(
            best,
            MarkerMatch {
                offset: from + rel,
                len: marker.len(),
                alternative,
            },
        );
    }
    best
}

fn prefer(best: Option<MarkerMatch>, candidate: MarkerMatch) -> Option<MarkerMatch> {
    match best {
        Some(current)
            if current.offset < candidate.offset
                || (current.offset == candidate.offset && current.len >= candidate.len) =>
        {
            Some(current)
        }
        _ => Some(candidate),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seen {
    Unsearched,
    /// First occurrence at or after `from`
    At { from: usize, offset: usize },
    /// Nothing at or after `from`
    Absent { from: usize },
}

/// [`find_next`] over one page, remembering where each alternative next occurs.
///
/// While queries move forward every alternative reads each byte of the page
/// at most once, so a page scan stays linear even when an alternative never
/// occurs. A query behind the remembered position searches again.
#[derive(Debug, Clone)]
pub struct MarkerLookahead<'a> {
    text: &'a str,
    markers: &'a MarkerSet,
    seen: Vec<Seen>,
}

impl<'a> MarkerLookahead<'a> {
    pub fn new(text: &'a str, markers: &'a MarkerSet) -> Self {
        Self {
            text,
            markers,
            seen: vec![Seen::Unsearched; markers.alternatives().len()],
        }
    }

    pub fn find(&mut self, from: usize) -> Option<MarkerMatch> {
        let text = self.text;
        let from = ceil_char_boundary(text, from);

        let mut best: Option<MarkerMatch> = None;
        for (alternative, marker) in self.markers.alternatives().iter().enumerate() {
            if marker.is_empty() {
                continue;
            }
            let seen = &mut self.seen[alternative];
            let offset = match *seen {
                Seen::At { from: searched, offset } if searched <= from && from <= offset => {
                    Some(offset)
                }
                Seen::Absent { from: searched } if searched <= from => None,
                _ => {
                    let offset = text[from..].find(marker.as_str()).map(|rel| from + rel);
                    *seen = match offset {
                        Some(offset) => Seen::At { from, offset },
                        None => Seen::Absent { from },
                    };
                    offset
                }
            };
            if let Some(offset) = offset {
                best = prefer(
                    best,
                    MarkerMatch {
                        offset,
                        len: marker.len(),
                        alternative,
                    },
                );
            }
        }
        best
    }
}

/// Compare several marker families and report which one occurs first.
///
/// Families without any occurrence lose unconditionally; on an exact tie the
/// family listed first wins. `None` means none of them occurs again.
pub fn classify_next<K: Copy>(
    families: &mut [(K, MarkerLookahead<'_>)],
    from: usize,
) -> Option<(K, MarkerMatch)> {
    let mut winner: Option<(K, MarkerMatch)> = None;
    for (kind, lookahead) in families.iter_mut() {
        let Some(found) = lookahead.find(from) else {
            continue;
        };
        match winner {
            Some((_, current)) if current.offset <= found.offset => {}
            _ => winner = Some((*kind, found)),
        }
    }
    winner
}
