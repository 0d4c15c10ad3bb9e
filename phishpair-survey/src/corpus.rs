//! Corpus index
//!
//! Discovers stimulus emails in the corpus directory and decodes the
//! metadata carried in their filenames:
//!
//! ```text
//! <category>_[<tag1>_<tag2>_...]<basename>.<ext>
//! ```
//!
//! `category` is one of `phish`, `ai`, `regular`; `ext` is `html`, `htm` or
//! `pdf`. Parsing is pure; scanning reads the directory once and keeps no
//! cache, the filesystem stays the source of truth.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Segment delimiter inside corpus filenames
pub const DELIMITER: char = '_';

/// Prefixes a corpus filename must start with
pub const CATEGORY_PREFIXES: [&str; 3] = ["phish_", "ai_", "regular_"];

/// Extensions of servable stimulus documents (compared case-insensitively)
pub const CONTENT_EXTENSIONS: [&str; 3] = ["html", "htm", "pdf"];

/// Corpus scan errors
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Corpus directory does not exist
    #[error("Corpus directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Corpus path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Directory listing failed
    #[error("Corpus directory unreadable {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Stimulus category parsed from the leading filename token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Phish,
    Ai,
    Regular,
    /// Leading token outside the known set, kept verbatim
    Other(String),
    /// Filename without a delimiter
    Unknown,
}

impl Category {
    fn from_token(token: &str) -> Self {
        match token {
            "phish" => Category::Phish,
            "ai" => Category::Ai,
            "regular" => Category::Regular,
            other => Category::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Category::Phish => "phish",
            Category::Ai => "ai",
            Category::Regular => "regular",
            Category::Other(token) => token,
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type and tags decoded from a filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMetadata {
    pub category: Category,
    pub tags: Vec<String>,
}

impl ItemMetadata {
    /// Tags joined for storage
    pub fn tags_joined(&self) -> String {
        self.tags.join(",")
    }
}

/// Decode category and tags from a filename. Never fails.
///
/// Segment 0 is the category. When the last segment carries the extension,
/// tags are the segments strictly between the first and the last; otherwise
/// every segment after the first is a tag. Names with a single segment are
/// `unknown` with no tags.
pub fn parse(filename: &str) -> ItemMetadata {
    let segments: Vec<&str> = filename.split(DELIMITER).collect();

    if segments.len() < 2 {
        return ItemMetadata {
            category: Category::Unknown,
            tags: Vec::new(),
        };
    }

    let last = segments.len() - 1;
    let tag_segments = if segments[last].contains('.') {
        &segments[1..last]
    } else {
        &segments[1..]
    };

    ItemMetadata {
        category: Category::from_token(segments[0]),
        tags: tag_segments.iter().map(|s| s.to_string()).collect(),
    }
}

/// Whether a filename qualifies as a stimulus (known prefix AND content extension)
pub fn is_eligible(filename: &str) -> bool {
    let has_prefix = CATEGORY_PREFIXES.iter().any(|p| filename.starts_with(p));
    let has_extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            CONTENT_EXTENSIONS
                .iter()
                .any(|allowed| e.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false);

    has_prefix && has_extension
}

/// One eligible stimulus file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusItem {
    pub filename: String,
    pub metadata: ItemMetadata,
}

impl StimulusItem {
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let metadata = parse(&filename);
        Self { filename, metadata }
    }
}

/// Set of eligible stimuli, ordered by filename
#[derive(Debug, Clone, Default)]
pub struct CorpusIndex {
    items: Vec<StimulusItem>,
}

impl CorpusIndex {
    /// Scan a directory (non-recursive) for eligible stimuli
    pub fn scan(directory: &Path) -> Result<Self, CorpusError> {
        if !directory.exists() {
            return Err(CorpusError::DirectoryNotFound(directory.to_path_buf()));
        }

        if !directory.is_dir() {
            return Err(CorpusError::NotADirectory(directory.to_path_buf()));
        }

        let mut names = Vec::new();

        let walker = WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true);

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    match entry.file_name().to_str() {
                        Some(name) => names.push(name.to_string()),
                        None => tracing::warn!(
                            "Skipping non UTF-8 filename: {}",
                            entry.path().display()
                        ),
                    }
                }
                Err(e) if e.depth() == 0 => {
                    return Err(CorpusError::Unreadable {
                        path: directory.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!("Error accessing corpus entry: {}", e);
                }
            }
        }

        let index = Self::from_filenames(names);

        tracing::debug!(
            "Corpus scan of {}: {} eligible items",
            directory.display(),
            index.len()
        );

        Ok(index)
    }

    /// Build an index from bare filenames, applying the eligibility rule
    pub fn from_filenames<I, S>(filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<StimulusItem> = filenames
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| is_eligible(name))
            .map(StimulusItem::new)
            .collect();

        items.sort_by(|a, b| a.filename.cmp(&b.filename));
        items.dedup_by(|a, b| a.filename == b.filename);

        Self { items }
    }

    pub fn items(&self) -> &[StimulusItem] {
        &self.items
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.filename.as_str())
    }

    pub fn get(&self, filename: &str) -> Option<&StimulusItem> {
        self.items
            .binary_search_by(|item| item.filename.as_str().cmp(filename))
            .ok()
            .map(|idx| &self.items[idx])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_tags_between_category_and_basename() {
        let meta = parse("phish_urgency_authority_example.html");
        assert_eq!(meta.category, Category::Phish);
        assert_eq!(meta.tags, vec!["urgency", "authority"]);
        assert_eq!(meta.tags_joined(), "urgency,authority");
    }

    #[test]
    fn test_parse_without_tags() {
        let meta = parse("regular_invoice.html");
        assert_eq!(meta.category, Category::Regular);
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn test_parse_single_segment_is_unknown() {
        let meta = parse("weird.html");
        assert_eq!(meta.category, Category::Unknown);
        assert_eq!(meta.category.as_str(), "unknown");
        assert!(meta.tags.is_empty());

        assert_eq!(parse("").category, Category::Unknown);
    }

    #[test]
    fn test_parse_without_extension_keeps_last_segment_as_tag() {
        let meta = parse("ai_scarcity_liking");
        assert_eq!(meta.category, Category::Ai);
        assert_eq!(meta.tags, vec!["scarcity", "liking"]);
    }

    #[test]
    fn test_parse_keeps_unrecognized_category_token() {
        let meta = parse("spam_offer.pdf");
        assert_eq!(meta.category, Category::Other("spam".to_string()));
        assert_eq!(meta.category.to_string(), "spam");
    }

    #[test]
    fn test_eligibility_needs_prefix_and_extension() {
        assert!(is_eligible("phish_a.html"));
        assert!(is_eligible("ai_b.pdf"));
        assert!(is_eligible("regular_c.HTML"));
        assert!(is_eligible("regular_c.htm"));

        assert!(!is_eligible("phish_a.txt"), "extension without prefix rule");
        assert!(!is_eligible("newsletter.html"), "prefix rule without extension");
        assert!(!is_eligible("phishing_a.html"), "prefix needs the delimiter");
        assert!(!is_eligible("phish_a"), "no extension");
    }

    #[test]
    fn test_from_filenames_filters_sorts_and_dedups() {
        let index = CorpusIndex::from_filenames(vec![
            "regular_b.html",
            "notes.txt",
            "phish_a.html",
            "regular_b.html",
            "ai_c.pdf",
        ]);
        let names: Vec<&str> = index.filenames().collect();
        assert_eq!(names, vec!["ai_c.pdf", "phish_a.html", "regular_b.html"]);
        assert!(index.get("phish_a.html").is_some());
        assert!(index.get("notes.txt").is_none());
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "phish_urgency_bank.html",
            "ai_offer.pdf",
            "regular_invoice.html",
            "readme.html",
            "phish_draft.txt",
        ] {
            fs::write(dir.path().join(name), "<p>x</p>").unwrap();
        }
        // Subdirectories are not descended into
        fs::create_dir(dir.path().join("phish_nested.html")).unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();
        fs::write(dir.path().join("archive").join("phish_old.html"), "x").unwrap();

        let index = CorpusIndex::scan(dir.path()).unwrap();
        let names: Vec<&str> = index.filenames().collect();
        assert_eq!(
            names,
            vec!["ai_offer.pdf", "phish_urgency_bank.html", "regular_invoice.html"]
        );

        let bank = index.get("phish_urgency_bank.html").unwrap();
        assert_eq!(bank.metadata.tags, vec!["urgency"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            CorpusIndex::scan(&missing),
            Err(CorpusError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_scan_file_instead_of_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("phish_a.html");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            CorpusIndex::scan(&file),
            Err(CorpusError::NotADirectory(_))
        ));
    }
}
