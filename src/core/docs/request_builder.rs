//! Turns classified lines into an ordered list of batch-update requests.
//!
//! Text is inserted front to back. An [`OffsetTracker`] holds the running
//! insertion index: every segment starts where the previous one ended, and all
//! style ranges for a line are computed from the range its text landed in.
//!
//! `createParagraphBullets` strips the leading tabs that encode nesting, which
//! shifts everything after the list. Bullet requests are therefore emitted last
//! and from the bottom of the document up, so no earlier range is invalidated.

use super::docs_requests::{BulletPreset, NamedStyleType, Range, Request, TextStyle};
use crate::core::markup::{utf16_len, DocumentLine, InlineStyle, LineKind};

/// First index of the body of a freshly created document.
pub const BODY_START_INDEX: usize = 1;

/// Running insertion offset, in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetTracker {
    cursor: usize,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::starting_at(BODY_START_INDEX)
    }

    pub fn starting_at(index: usize) -> Self {
        Self { cursor: index }
    }

    /// Index the next segment will be inserted at.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Reserves room for `segment` and returns the range it will occupy.
    pub fn advance(&mut self, segment: &str) -> Range {
        let start = self.cursor;
        self.cursor += utf16_len(segment);
        Range::new(start, self.cursor)
    }
}

impl Default for OffsetTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// The requests for one document plus the plain text they insert.
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    pub requests: Vec<Request>,
    pub plain_text: String,
}

impl BatchPlan {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct BulletGroup {
    range: Range,
    preset: BulletPreset,
}

fn named_style(kind: LineKind) -> NamedStyleType {
    match kind {
        LineKind::Title => NamedStyleType::Heading1,
        LineKind::SectionHeader => NamedStyleType::Heading2,
        LineKind::SubHeader => NamedStyleType::Heading3,
        _ => NamedStyleType::NormalText,
    }
}

fn bullet_preset(kind: LineKind) -> Option<BulletPreset> {
    match kind {
        LineKind::ListItem => Some(BulletPreset::BulletDiscCircleSquare),
        LineKind::Checkbox => Some(BulletPreset::BulletCheckbox),
        _ => None,
    }
}

fn push_text_style(requests: &mut Vec<Request>, range: Range, style: TextStyle) {
    if !range.is_empty() {
        requests.push(Request::text_style(range, style));
    }
}

/// Builds the batch plan for a document whose body starts at [`BODY_START_INDEX`].
pub fn build_plan(lines: &[DocumentLine]) -> BatchPlan {
    let mut tracker = OffsetTracker::new();
    let mut plan = BatchPlan::default();
    let mut groups: Vec<BulletGroup> = Vec::new();
    let mut open_group: Option<BulletGroup> = None;

    for line in lines {
        let segment = format!("{}\n", line.text);
        let paragraph = tracker.advance(&segment);
        plan.plain_text.push_str(&segment);

        plan.requests
            .push(Request::insert_text(paragraph.start_index, segment));
        // Paragraph style first so the character styles below win.
        plan.requests
            .push(Request::paragraph_style(paragraph, named_style(line.kind)));

        let content = Range::new(paragraph.start_index, paragraph.end_index - 1);

        for span in &line.spans {
            let range = Range::new(content.start_index + span.start, content.start_index + span.end);
            match span.style {
                InlineStyle::Bold => push_text_style(&mut plan.requests, range, TextStyle::bold()),
            }
        }

        if line.is_italic() {
            push_text_style(&mut plan.requests, content, TextStyle::italic());
        }

        if line.kind == LineKind::Checkbox && line.checked {
            let without_tabs = Range::new(content.start_index + line.depth, content.end_index);
            push_text_style(&mut plan.requests, without_tabs, TextStyle::strikethrough());
        }

        let preset = bullet_preset(line.kind);
        let extends_open =
            matches!((preset, &open_group), (Some(p), Some(group)) if group.preset == p);
        if extends_open {
            if let Some(group) = open_group.as_mut() {
                group.range.end_index = paragraph.end_index;
            }
        } else {
            groups.extend(open_group.take());
            open_group = preset.map(|preset| BulletGroup {
                range: paragraph,
                preset,
            });
        }
    }
    groups.extend(open_group.take());

    groups.sort_by(|a, b| b.range.start_index.cmp(&a.range.start_index));
    for group in groups {
        plan.requests.push(Request::bullets(group.range, group.preset));
    }

    tracing::debug!(
        "Built {} request(s) for {} line(s), body ends at index {}",
        plan.requests.len(),
        lines.len(),
        tracker.position()
    );

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::markup::classify_document;
    use proptest::prelude::*;

    fn range_of(request: &Request) -> Option<Range> {
        match request {
            Request::InsertText { .. } => None,
            Request::UpdateParagraphStyle { range, .. }
            | Request::UpdateTextStyle { range, .. }
            | Request::CreateParagraphBullets { range, .. } => Some(*range),
        }
    }

    /// Replays a plan against an in-memory body and checks every range.
    ///
    /// Returns the body text (without the trailing newline every document has).
    fn replay(plan: &BatchPlan) -> Result<String, String> {
        // Index 1 is the first body character; the buffer starts with the final newline.
        let mut body: Vec<u16> = vec![b'\n' as u16];
        for (i, request) in plan.requests.iter().enumerate() {
            match request {
                Request::InsertText { location, text } => {
                    let at = location.index.checked_sub(1).ok_or("insert before body")?;
                    if at > body.len() - 1 {
                        return Err(format!("request {} inserts past the end at {}", i, location.index));
                    }
                    let units: Vec<u16> = text.encode_utf16().collect();
                    body.splice(at..at, units);
                }
                other => {
                    let range = range_of(other).ok_or("styling request without range")?;
                    if range.start_index < 1 || range.end_index > body.len() + 1 {
                        return Err(format!("request {} range {:?} outside the body", i, range));
                    }
                    if range.is_empty() {
                        return Err(format!("request {} has an empty range", i));
                    }
                }
            }
        }
        body.pop();
        String::from_utf16(&body).map_err(|e| e.to_string())
    }

    #[test]
    fn test_offset_tracker_accumulates() {
        let mut tracker = OffsetTracker::new();
        assert_eq!(tracker.advance("Title\n"), Range::new(1, 7));
        assert_eq!(tracker.advance("Section\n"), Range::new(7, 15));
        assert_eq!(tracker.position(), 15);
    }

    #[test]
    fn test_offset_tracker_counts_utf16_units() {
        let mut tracker = OffsetTracker::starting_at(10);
        assert_eq!(tracker.advance("🎉\n"), Range::new(10, 13));
    }

    #[test]
    fn test_example_document_request_order() {
        let lines = classify_document("# Title\n## Section\n- [ ] todo item\n*footer text*");
        let plan = build_plan(&lines);

        assert_eq!(
            plan.requests,
            vec![
                Request::insert_text(1, "Title\n"),
                Request::paragraph_style(Range::new(1, 7), NamedStyleType::Heading1),
                Request::insert_text(7, "Section\n"),
                Request::paragraph_style(Range::new(7, 15), NamedStyleType::Heading2),
                Request::insert_text(15, "todo item\n"),
                Request::paragraph_style(Range::new(15, 25), NamedStyleType::NormalText),
                Request::insert_text(25, "footer text\n"),
                Request::paragraph_style(Range::new(25, 37), NamedStyleType::NormalText),
                Request::text_style(Range::new(25, 36), TextStyle::italic()),
                Request::bullets(Range::new(15, 25), BulletPreset::BulletCheckbox),
            ]
        );
        assert_eq!(plan.plain_text, "Title\nSection\ntodo item\nfooter text\n");
    }

    #[test]
    fn test_nested_list_is_one_bullet_group() {
        let lines = classify_document("* Pending Items\n  * Mobile fixes\n  * Beta feedback\nafter");
        let plan = build_plan(&lines);

        let bullets: Vec<&Request> = plan
            .requests
            .iter()
            .filter(|r| matches!(r, Request::CreateParagraphBullets { .. }))
            .collect();
        assert_eq!(bullets.len(), 1);
        // "Pending Items\n" + "\tMobile fixes\n" + "\tBeta feedback\n"
        assert_eq!(
            bullets[0],
            &Request::bullets(Range::new(1, 44), BulletPreset::BulletDiscCircleSquare)
        );
    }

    #[test]
    fn test_bullets_are_last_and_bottom_up() {
        let lines = classify_document("- a\n- b\ntext\n- [ ] c\n## Next\n* d");
        let plan = build_plan(&lines);

        let first_bullet = plan
            .requests
            .iter()
            .position(|r| matches!(r, Request::CreateParagraphBullets { .. }))
            .unwrap();
        assert!(plan.requests[first_bullet..]
            .iter()
            .all(|r| matches!(r, Request::CreateParagraphBullets { .. })));

        let starts: Vec<usize> = plan.requests[first_bullet..]
            .iter()
            .map(|r| range_of(r).unwrap().start_index)
            .collect();
        assert_eq!(starts.len(), 3);
        assert!(starts.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_mentions_are_bold_inside_the_line() {
        let lines = classify_document("## Action Items\n- [ ] @mike: Schedule review");
        let plan = build_plan(&lines);

        // "Action Items\n" occupies [1, 14), the checkbox text starts at 14.
        assert!(plan
            .requests
            .contains(&Request::text_style(Range::new(14, 19), TextStyle::bold())));
    }

    #[test]
    fn test_checked_item_gets_strikethrough_after_tabs() {
        let lines = classify_document("  - [x] shipped");
        let plan = build_plan(&lines);

        // "\tshipped\n" at [1, 10); the tab is skipped.
        assert!(plan
            .requests
            .contains(&Request::text_style(Range::new(2, 9), TextStyle::strikethrough())));
    }

    #[test]
    fn test_empty_lines_get_no_text_style() {
        let lines = classify_document("---\n\nfooter");
        let plan = build_plan(&lines);

        assert!(plan.requests.iter().all(|r| match r {
            Request::UpdateTextStyle { range, .. } => !range.is_empty(),
            _ => true,
        }));
        assert_eq!(replay(&plan).unwrap(), "---\n\nfooter\n");
    }

    #[test]
    fn test_empty_document_has_no_requests() {
        let plan = build_plan(&classify_document(""));
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    fn markup_line() -> impl Strategy<Value = String> {
        let prefix = prop_oneof![
            Just(""),
            Just("# "),
            Just("## "),
            Just("### "),
            Just("- "),
            Just("  * "),
            Just("    - "),
            Just("- [ ] "),
            Just("  - [x] "),
            Just("---"),
        ];
        (prefix, "[A-Za-z@*é🎉 ]{0,12}").prop_map(|(p, body)| format!("{}{}", p, body))
    }

    proptest! {
        #[test]
        fn prop_insertions_follow_cumulative_offsets(lines in prop::collection::vec(markup_line(), 0..40)) {
            let plan = build_plan(&classify_document(&lines.join("\n")));

            let mut expected = BODY_START_INDEX;
            for request in &plan.requests {
                if let Request::InsertText { location, text } = request {
                    prop_assert_eq!(location.index, expected);
                    expected += utf16_len(text);
                }
            }
            prop_assert_eq!(expected, BODY_START_INDEX + utf16_len(&plan.plain_text));
        }

        #[test]
        fn prop_replay_reproduces_inserted_text(lines in prop::collection::vec(markup_line(), 0..40)) {
            let plan = build_plan(&classify_document(&lines.join("\n")));
            let replayed = replay(&plan);
            prop_assert_eq!(replayed, Ok(plan.plain_text.clone()));
        }
    }
}
