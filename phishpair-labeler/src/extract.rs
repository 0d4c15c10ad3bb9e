//! PDF text extraction

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to load PDF {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Failed to extract text from {path}: {reason}")]
    Text { path: PathBuf, reason: String },
}

/// Source of plain text for a document
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Concatenates the text of every page, one page per line block
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        debug!("Extracting text from {}", path.display());

        let document = lopdf::Document::load(path).map_err(|e| ExtractError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut text = String::new();
        for page_number in document.get_pages().keys() {
            let page_text = document
                .extract_text(&[*page_number])
                .map_err(|e| ExtractError::Text {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            text.push_str(&page_text);
            text.push('\n');
        }

        if text.trim().is_empty() {
            warn!("No text extracted from {}", path.display());
        }

        Ok(text)
    }
}
