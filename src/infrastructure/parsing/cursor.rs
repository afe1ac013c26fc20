//! Forward-only scan position over one page's text
//!
//! A `Cursor` is created at the start of a page parse and dropped at the end.
//! It is never stored inside a parser, so concurrent page scans cannot share
//! state.

use super::extract::{self, RawField};
use super::markers::{self, ceil_char_boundary, MarkerMatch, MarkerSet};

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    position: usize,
    /// Exclusive upper bound for searches; `text.len()` unless bounded
    limit: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            position: 0,
            limit: text.len(),
        }
    }

    /// Cursor restricted to `start..end` of `text`, keeping absolute offsets.
    /// Used to confine field extraction to one record's span.
    pub fn bounded(text: &'a str, start: usize, end: usize) -> Self {
        let limit = ceil_char_boundary(text, end);
        let position = ceil_char_boundary(text, start).min(limit);
        Self {
            text,
            position,
            limit,
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Unscanned text inside the bound
    pub fn remaining(&self) -> &'a str {
        &self.text[self.position..self.limit]
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.limit
    }

    /// Move forward to `offset`. Offsets behind the current position are
    /// ignored: a cursor never moves backwards.
    pub fn advance_to(&mut self, offset: usize) {
        let target = ceil_char_boundary(self.text, offset.min(self.limit));
        if target > self.position {
            self.position = target;
        }
    }

    /// Next occurrence of `markers` inside the bound, without moving
    pub fn find_next(&self, markers: &MarkerSet) -> Option<MarkerMatch> {
        markers::find_next(&self.text[..self.limit], markers, self.position)
    }

    /// Slice the text between `start` and `end` and move past `end`.
    /// Leaves the cursor untouched when either marker is missing.
    pub fn extract_between(&mut self, start: &MarkerSet, end: &MarkerSet) -> Option<RawField> {
        let field = extract::extract_between(&self.text[..self.limit], start, end, self.position)?;
        self.advance_to(field.consumed_to);
        Some(field)
    }
}
