//! Field extraction between marker pairs and field text normalization

use scraper::{Html, Node};

use super::markers::{find_next, MarkerSet};

/// One slice of page text between two markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    /// Unescaped, whitespace-collapsed and trimmed field text
    pub text: String,
    /// Byte offset where the raw slice begins (just past the start marker)
    pub start: usize,
    /// Byte offset where the raw slice ends (the end marker's offset)
    pub end: usize,
    /// Byte offset just past the end marker
    pub consumed_to: usize,
}

impl RawField {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Slice `text` strictly between the end of the first `start` match at or
/// after `from` and the first `end` match after it.
pub fn extract_between(text: &str, start: &MarkerSet, end: &MarkerSet, from: usize) -> Option<RawField> {
    let open = find_next(text, start, from)?;
    let close = find_next(text, end, open.end())?;
    let raw = &text[open.end()..close.offset];
    Some(RawField {
        text: normalize_field(raw),
        start: open.end(),
        end: close.offset,
        consumed_to: close.end(),
    })
}

/// Tags that separate words when dropped
const BREAKING_TAGS: &[&str] = &["br", "p", "div", "li", "td", "th", "tr"];

/// Decode HTML entities, drop nested tags, collapse whitespace and trim.
///
/// Inline tags join their text as is (`DAX<sup>®</sup>`); line breaks and
/// block tags leave a space (`Dow<br>Jones`).
pub fn normalize_field(raw: &str) -> String {
    if !raw.contains('&') && !raw.contains('<') {
        return collapse_whitespace(raw);
    }

    let fragment = Html::parse_fragment(raw);
    let mut decoded = String::with_capacity(raw.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(text) => decoded.push_str(text),
            Node::Element(element) if BREAKING_TAGS.contains(&element.name()) => decoded.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&decoded)
}

/// Collapse runs of whitespace (no-break spaces included) into one space and trim
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_between_slices_exactly() {
        let text = "xx<b>  S&amp;P&nbsp;500 </b>yy";
        let field = extract_between(text, &MarkerSet::single("<b>"), &MarkerSet::single("</b>"), 0).unwrap();
        assert_eq!(field.text, "S&P 500");
        assert_eq!(&text[field.start..field.end], "  S&amp;P&nbsp;500 ");
        assert_eq!(field.consumed_to, text.len() - 2);
    }

    #[test]
    fn test_extract_between_absent_markers() {
        let start = MarkerSet::single("<b>");
        let end = MarkerSet::single("</b>");
        assert!(extract_between("no markers", &start, &end, 0).is_none());
        assert!(extract_between("<b>unterminated", &start, &end, 0).is_none());
        assert!(extract_between("</b> before <b>", &start, &end, 0).is_none());
    }

    #[test]
    fn test_normalize_field_strips_nested_tags() {
        assert_eq!(
            normalize_field("<a href=\"/q/dji\">Dow Jones\n   Industrial</a>"),
            "Dow Jones Industrial"
        );
        assert_eq!(normalize_field("&#8722;0.29%"), "\u{2212}0.29%");
        assert_eq!(normalize_field("  plain  "), "plain");
    }

    #[test]
    fn test_normalize_field_keeps_words_apart_across_breaks() {
        assert_eq!(normalize_field("Dow<br>Jones"), "Dow Jones");
        assert_eq!(normalize_field("Dow<br/>Jones"), "Dow Jones");
        assert_eq!(normalize_field("<div>Net</div><div>Change</div>"), "Net Change");
        assert_eq!(normalize_field("DAX<sup>&reg;</sup> 40"), "DAX\u{ae} 40");
        assert_eq!(normalize_field("S&amp;P<br> 500"), "S&P 500");
    }
}
