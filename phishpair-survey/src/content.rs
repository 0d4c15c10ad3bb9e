//! Content resolver
//!
//! Turns a corpus filename into something the presentation layer can
//! show. HTML is read and returned inline; PDF is handed out as the URL
//! the server exposes the raw file under.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// URL prefix the raw corpus files are served under
pub const EMAILS_ROUTE: &str = "/emails";

#[derive(Debug, Error)]
pub enum ContentError {
    /// Filename would escape the corpus directory
    #[error("Rejected filename: {0}")]
    UnsafeFilename(String),

    #[error("Email not found: {0}")]
    NotFound(String),

    #[error("Unsupported email format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How the content should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Inline markup
    Plain,
    /// URL to embed
    Embed,
}

/// One renderable email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailContent {
    pub filename: String,
    pub kind: ContentKind,
    pub content: String,
}

#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, filename: &str) -> Result<EmailContent, ContentError>;
}

/// Resolver over the corpus directory
#[derive(Debug, Clone)]
pub struct FsContentResolver {
    root: PathBuf,
}

impl FsContentResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// True for a single plain path component: no separators, no `.` or `..`
pub fn is_bare_filename(filename: &str) -> bool {
    if filename.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn check_filename(filename: &str) -> Result<(), ContentError> {
    if !is_bare_filename(filename) {
        return Err(ContentError::UnsafeFilename(filename.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ContentResolver for FsContentResolver {
    async fn resolve(&self, filename: &str) -> Result<EmailContent, ContentError> {
        check_filename(filename)?;

        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let path = self.root.join(filename);

        match extension.as_str() {
            "html" | "htm" => {
                let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        ContentError::NotFound(filename.to_string())
                    } else {
                        ContentError::Io {
                            path: path.clone(),
                            source: e,
                        }
                    }
                })?;
                Ok(EmailContent {
                    filename: filename.to_string(),
                    kind: ContentKind::Plain,
                    content,
                })
            }
            "pdf" => {
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(ContentError::NotFound(filename.to_string()));
                }
                Ok(EmailContent {
                    filename: filename.to_string(),
                    kind: ContentKind::Embed,
                    content: format!("{}/{}", EMAILS_ROUTE, filename),
                })
            }
            _ => Err(ContentError::UnsupportedFormat(filename.to_string())),
        }
    }
}
