//! Folder processing
//!
//! Extract, classify and rename every PDF directly inside a folder. A
//! failing file is logged and counted as unclassified; it never stops the
//! run.

use crate::classifier::{Classifier, ClassifierError};
use crate::extract::{ExtractError, TextExtractor};
use crate::naming::{labeled_filename, rename_labeled};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Folder not found: {0}")]
    FolderNotFound(PathBuf),

    #[error("Failed to list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Text extraction failed for one file
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Classification failed for one file
    #[error(transparent)]
    Classify(#[from] ClassifierError),
}

/// Tags found per processed file
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FolderSummary {
    /// Original path of each PDF and its tags (empty when unclassified or failed)
    pub results: BTreeMap<PathBuf, Vec<String>>,
}

impl FolderSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn classified(&self) -> usize {
        self.results.values().filter(|tags| !tags.is_empty()).count()
    }

    pub fn unclassified(&self) -> usize {
        self.total() - self.classified()
    }

    pub fn log(&self) {
        info!("=== Processing Summary ===");
        info!("Total files processed: {}", self.total());
        info!("Files classified: {}", self.classified());
        info!("Files with no classification: {}", self.unclassified());
    }
}

/// PDFs directly inside `folder` (extension compared case-insensitively), sorted
fn pdf_files(folder: &Path) -> Result<Vec<PathBuf>, LabelError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);

    for entry in walker {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                let is_pdf = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false);
                if is_pdf {
                    files.push(entry.into_path());
                }
            }
            Err(e) if e.depth() == 0 => {
                return Err(LabelError::ReadDir {
                    path: folder.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", folder.display(), e);
            }
        }
    }

    files.sort();
    Ok(files)
}

async fn label_file<E, C>(path: &Path, extractor: &E, classifier: &C) -> Result<Vec<String>, LabelError>
where
    E: TextExtractor + ?Sized,
    C: Classifier + ?Sized,
{
    let text = extractor.extract(path)?;
    let tags = classifier.classify(&text).await?;
    Ok(tags)
}

/// Label every PDF in `folder`; with `dry_run` nothing is renamed
pub async fn process_folder<E, C>(
    folder: &Path,
    extractor: &E,
    classifier: &C,
    dry_run: bool,
) -> Result<FolderSummary, LabelError>
where
    E: TextExtractor + ?Sized,
    C: Classifier + ?Sized,
{
    info!("Processing folder: {}", folder.display());

    if !folder.is_dir() {
        error!("Folder not found: {}", folder.display());
        return Err(LabelError::FolderNotFound(folder.to_path_buf()));
    }

    let files = pdf_files(folder)?;
    if files.is_empty() {
        warn!("No PDF files found in {}", folder.display());
        return Ok(FolderSummary::default());
    }
    info!("Found {} PDF files to process", files.len());

    let mut summary = FolderSummary::default();
    for path in files {
        let tags = match label_file(&path, extractor, classifier).await {
            Ok(tags) => tags,
            Err(e) => {
                error!("Error processing {}: {}", path.display(), e);
                summary.results.insert(path, Vec::new());
                continue;
            }
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = path.with_file_name(labeled_filename(&filename, &tags));

        if target != path {
            if dry_run {
                info!(
                    "Dry run: Would rename {} to {}",
                    path.display(),
                    target.display()
                );
            } else if let Err(e) = rename_labeled(&path, &target) {
                error!("Error renaming {}: {}", path.display(), e);
            }
        }

        summary.results.insert(path, tags);
    }

    Ok(summary)
}
