pub mod line_classifier;
pub mod markup_models;

pub use line_classifier::{classify_document, utf16_len};
pub use markup_models::{DocumentLine, InlineStyle, LineKind};
