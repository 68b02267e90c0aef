// Markup domain models - one classified line of the input document.
//
// These are pure data types with no Google Docs dependencies.
// The request builder in `core::docs` turns them into API requests.

use serde::Serialize;

/// What a single line of markup represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// `# Title`
    Title,
    /// `## Section`
    SectionHeader,
    /// `### Sub-section`
    SubHeader,
    /// `- item` or `* item`, nesting comes from indentation
    ListItem,
    /// `- [ ] task` or `- [x] task`
    Checkbox,
    /// Plain line that mentions someone with `@name`
    Mention,
    /// Italic line: `*text*`, or any plain line after the last separator
    Footer,
    /// `---` separator that starts the footer region
    Separator,
    /// Anything else, including empty lines
    Plain,
}

impl std::fmt::Display for LineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineKind::Title => write!(f, "title"),
            LineKind::SectionHeader => write!(f, "section header"),
            LineKind::SubHeader => write!(f, "sub-header"),
            LineKind::ListItem => write!(f, "list item"),
            LineKind::Checkbox => write!(f, "checkbox"),
            LineKind::Mention => write!(f, "mention"),
            LineKind::Footer => write!(f, "footer"),
            LineKind::Separator => write!(f, "separator"),
            LineKind::Plain => write!(f, "plain"),
        }
    }
}

/// Character style carried by an inline span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineStyle {
    Bold,
}

/// A styled run inside a line's display text.
///
/// `start` and `end` are UTF-16 offsets into `DocumentLine::text`, which is the
/// unit Google Docs indexes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InlineSpan {
    pub start: usize,
    pub end: usize,
    pub style: InlineStyle,
}

/// One line of input after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentLine {
    /// The line exactly as it appeared in the file (without line ending).
    pub raw: String,
    pub kind: LineKind,
    /// Nesting level for list items and checkboxes, 0 otherwise.
    pub depth: usize,
    /// Only meaningful for checkboxes.
    pub checked: bool,
    /// Set for every line after the last separator.
    pub in_footer: bool,
    /// Text to insert, markers stripped and nesting tabs prepended.
    pub text: String,
    pub spans: Vec<InlineSpan>,
}

impl DocumentLine {
    /// Whether the whole line should be rendered in italics.
    pub fn is_italic(&self) -> bool {
        self.kind == LineKind::Footer || self.in_footer
    }
}
