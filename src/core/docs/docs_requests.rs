// Google Docs batch-update request shapes.
//
// These mirror the Docs REST v1 JSON exactly (one key per request, camelCase
// fields) so a `Vec<Request>` can be posted as-is. Only the request kinds the
// builder emits are modelled.

use serde::Serialize;

/// `[start_index, end_index)` in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub start_index: usize,
    pub end_index: usize,
}

impl Range {
    pub fn new(start_index: usize, end_index: usize) -> Self {
        Self {
            start_index,
            end_index,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end_index <= self.start_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NamedStyleType {
    #[serde(rename = "NORMAL_TEXT")]
    NormalText,
    #[serde(rename = "HEADING_1")]
    Heading1,
    #[serde(rename = "HEADING_2")]
    Heading2,
    #[serde(rename = "HEADING_3")]
    Heading3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphStyle {
    pub named_style_type: NamedStyleType,
}

/// Character formatting. Only the set flags are sent, and `fields` lists them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TextStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
}

impl TextStyle {
    pub fn bold() -> Self {
        Self {
            bold: Some(true),
            ..Default::default()
        }
    }

    pub fn italic() -> Self {
        Self {
            italic: Some(true),
            ..Default::default()
        }
    }

    pub fn strikethrough() -> Self {
        Self {
            strikethrough: Some(true),
            ..Default::default()
        }
    }

    /// Field mask naming every flag that is set, e.g. `bold,italic`.
    pub fn fields(&self) -> String {
        let mut fields = Vec::new();
        if self.bold.is_some() {
            fields.push("bold");
        }
        if self.italic.is_some() {
            fields.push("italic");
        }
        if self.strikethrough.is_some() {
            fields.push("strikethrough");
        }
        fields.join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulletPreset {
    BulletDiscCircleSquare,
    BulletCheckbox,
}

/// One entry of a `documents.batchUpdate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    InsertText {
        location: Location,
        text: String,
    },
    UpdateParagraphStyle {
        range: Range,
        paragraph_style: ParagraphStyle,
        fields: String,
    },
    UpdateTextStyle {
        range: Range,
        text_style: TextStyle,
        fields: String,
    },
    CreateParagraphBullets {
        range: Range,
        bullet_preset: BulletPreset,
    },
}

impl Request {
    pub fn insert_text(index: usize, text: impl Into<String>) -> Self {
        Request::InsertText {
            location: Location { index },
            text: text.into(),
        }
    }

    pub fn paragraph_style(range: Range, named_style_type: NamedStyleType) -> Self {
        Request::UpdateParagraphStyle {
            range,
            paragraph_style: ParagraphStyle { named_style_type },
            fields: "namedStyleType".to_string(),
        }
    }

    pub fn text_style(range: Range, text_style: TextStyle) -> Self {
        Request::UpdateTextStyle {
            range,
            fields: text_style.fields(),
            text_style,
        }
    }

    pub fn bullets(range: Range, bullet_preset: BulletPreset) -> Self {
        Request::CreateParagraphBullets {
            range,
            bullet_preset,
        }
    }
}

/// Body of `POST /v1/documents/{id}:batchUpdate`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchUpdateBody<'a> {
    pub requests: &'a [Request],
}
