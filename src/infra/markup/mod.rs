pub mod markup_reader;

pub use markup_reader::MarkupReader;
