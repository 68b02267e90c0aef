use std::path::{Path, PathBuf};

use thiserror::Error;

/// Meeting notes used when no input file is given.
const SAMPLE_MARKUP: &str = include_str!("../../../demos/meeting_notes.md");

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Failed to read markup file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Markup file {} is not valid UTF-8", .path.display())]
    NotUtf8 { path: PathBuf },
}

/// Loads markup text from disk.
pub struct MarkupReader;

impl MarkupReader {
    pub async fn read(path: &Path) -> Result<String, ReadError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let text = String::from_utf8(bytes).map_err(|_| ReadError::NotUtf8 {
            path: path.to_path_buf(),
        })?;

        tracing::debug!("Read {} bytes of markup from {}", text.len(), path.display());
        Ok(match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        })
    }

    pub fn sample() -> &'static str {
        SAMPLE_MARKUP
    }
}
