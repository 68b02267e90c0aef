//! Line classification for the markup input.
//!
//! Every line is matched against a small set of textual markers (leading `#`,
//! `-`, `*`, `[ ]`, `---`) and turned into a [`DocumentLine`] carrying the
//! text that will actually be inserted into the document. Lines that match no
//! rule are kept as plain text, so malformed markup never fails a run.

use std::sync::LazyLock;

use regex::Regex;

use super::markup_models::{DocumentLine, InlineSpan, InlineStyle, LineKind};

static TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#\s+(\S.*)$").unwrap());
static SECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s+(\S.*)$").unwrap());
static SUB_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^###\s+(\S.*)$").unwrap());
static CHECKBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)-\s+\[([ xX])\]\s+(\S.*)$").unwrap());
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)[-*]\s+(\S.*)$").unwrap());
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$").unwrap());
static EMPHASIS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\*([^*\s](?:[^*]*[^*\s])?)\*|_([^_\s](?:[^_]*[^_\s])?)_)\s*$").unwrap()
});
static STRONG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").unwrap());

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Every two spaces (or one tab) of indentation is one nesting level.
fn indent_depth(indent: &str) -> usize {
    let tabs = indent.chars().filter(|c| *c == '\t').count();
    let spaces = indent.chars().filter(|c| *c == ' ').count();
    tabs + spaces / 2
}

/// Strips `**strong**` markers and finds `@mentions`.
///
/// Returns the display text and its bold spans in UTF-16 offsets, sorted by start.
pub fn inline_spans(text: &str) -> (String, Vec<InlineSpan>) {
    let mut display = String::with_capacity(text.len());
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in STRONG.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        display.push_str(&text[last..whole.start()]);
        let start = utf16_len(&display);
        display.push_str(inner.as_str());
        spans.push(InlineSpan {
            start,
            end: utf16_len(&display),
            style: InlineStyle::Bold,
        });
        last = whole.end();
    }
    display.push_str(&text[last..]);

    for mention in MENTION.find_iter(&display) {
        let start = utf16_len(&display[..mention.start()]);
        spans.push(InlineSpan {
            start,
            end: start + utf16_len(mention.as_str()),
            style: InlineStyle::Bold,
        });
    }

    spans.sort_by_key(|span| (span.start, span.end));
    spans.dedup();
    (display, spans)
}

fn build_line(raw: &str, kind: LineKind, depth: usize, checked: bool, body: &str) -> DocumentLine {
    let (display, spans) = inline_spans(body.trim_end());
    let prefix = "\t".repeat(depth);
    let shift = utf16_len(&prefix);

    let kind = if kind == LineKind::Plain && MENTION.is_match(&display) {
        LineKind::Mention
    } else {
        kind
    };

    DocumentLine {
        raw: raw.to_string(),
        kind,
        depth,
        checked,
        in_footer: false,
        text: format!("{}{}", prefix, display),
        spans: spans
            .into_iter()
            .map(|span| InlineSpan {
                start: span.start + shift,
                end: span.end + shift,
                ..span
            })
            .collect(),
    }
}

/// Classifies a single line in isolation.
///
/// Footer membership depends on the lines around it, see [`classify_document`].
pub fn classify_line(raw: &str) -> DocumentLine {
    if let Some(caps) = TITLE.captures(raw) {
        return build_line(raw, LineKind::Title, 0, false, &caps[1]);
    }
    if let Some(caps) = SECTION_HEADER.captures(raw) {
        return build_line(raw, LineKind::SectionHeader, 0, false, &caps[1]);
    }
    if let Some(caps) = SUB_HEADER.captures(raw) {
        return build_line(raw, LineKind::SubHeader, 0, false, &caps[1]);
    }
    if let Some(caps) = CHECKBOX.captures(raw) {
        let depth = indent_depth(&caps[1]);
        let checked = caps[2].eq_ignore_ascii_case("x");
        return build_line(raw, LineKind::Checkbox, depth, checked, &caps[3]);
    }
    if SEPARATOR.is_match(raw) {
        return build_line(raw, LineKind::Separator, 0, false, "---");
    }
    if let Some(caps) = LIST_ITEM.captures(raw) {
        let depth = indent_depth(&caps[1]);
        return build_line(raw, LineKind::ListItem, depth, false, &caps[2]);
    }
    if let Some(caps) = EMPHASIS_LINE.captures(raw) {
        if let Some(inner) = caps.get(1).or_else(|| caps.get(2)) {
            return build_line(raw, LineKind::Footer, 0, false, inner.as_str());
        }
    }

    build_line(raw, LineKind::Plain, 0, false, raw)
}

/// Classifies a whole document and marks the footer region.
///
/// The footer region is every line after the last separator. Plain and mention
/// lines in it become [`LineKind::Footer`]; structured lines keep their kind but
/// are still flagged `in_footer` so they render italic.
pub fn classify_document(text: &str) -> Vec<DocumentLine> {
    let mut lines: Vec<DocumentLine> = text.lines().map(classify_line).collect();

    let footer_start = lines
        .iter()
        .rposition(|line| line.kind == LineKind::Separator)
        .map(|idx| idx + 1);

    if let Some(start) = footer_start {
        for line in lines.iter_mut().skip(start) {
            line.in_footer = true;
            if matches!(line.kind, LineKind::Plain | LineKind::Mention) {
                line.kind = LineKind::Footer;
            }
        }
    }

    lines
}
