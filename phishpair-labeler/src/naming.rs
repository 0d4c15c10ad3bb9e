//! Labeled filenames and renaming
//!
//! Tags are spliced in after the category prefix so the result follows
//! the corpus naming convention, `<category>_<tag>_..._<basename>.pdf`.
//! Underscores inside a tag become hyphens (`social_proof` is written
//! `social-proof`); the underscore stays the segment delimiter.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PDF_SUFFIX: &str = ".pdf";
const COPY_SUFFIX: &str = "_copy";

/// Tag as it appears inside a filename
pub fn filename_tag(tag: &str) -> String {
    tag.replace('_', "-")
}

/// Filename carrying `tags`; unchanged when there are none
///
/// `<prefix>_<base>.pdf` becomes `<prefix>_<tags>_<base>.pdf`. A name
/// without a prefix (or not ending in lowercase `.pdf`) becomes
/// `<tags>_<stem>.pdf`.
pub fn labeled_filename(filename: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        return filename.to_string();
    }

    let tags = tags
        .iter()
        .map(|t| filename_tag(t))
        .collect::<Vec<_>>()
        .join("_");

    let split = filename
        .strip_suffix(PDF_SUFFIX)
        .and_then(|stem| stem.split_once('_'))
        .filter(|(prefix, base)| !prefix.is_empty() && !base.is_empty());

    match split {
        Some((prefix, base)) => format!("{}_{}_{}{}", prefix, tags, base, PDF_SUFFIX),
        None => {
            let stem = Path::new(filename)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(filename);
            format!("{}_{}{}", tags, stem, PDF_SUFFIX)
        }
    }
}

/// Rename `original` to `target`, returning where the file ended up
///
/// Same path is a no-op. An existing `target` is never overwritten; the
/// file goes to `<target stem>_copy.<ext>` instead.
pub fn rename_labeled(original: &Path, target: &Path) -> io::Result<PathBuf> {
    if original == target {
        info!("No rename needed for {}", original.display());
        return Ok(original.to_path_buf());
    }

    let mut destination = target.to_path_buf();
    if destination.exists() {
        warn!("Destination file already exists: {}", destination.display());
        destination = copy_path(target);
        info!("Using alternative name: {}", destination.display());
    }

    std::fs::rename(original, &destination)?;
    info!("Renamed {} to {}", original.display(), destination.display());
    Ok(destination)
}

fn copy_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{}{}.{}", stem, COPY_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, COPY_SUFFIX),
    };
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tags_follow_prefix() {
        assert_eq!(
            labeled_filename("phish_bank_notice.pdf", &tags(&["authority", "scarcity"])),
            "phish_authority_scarcity_bank_notice.pdf"
        );
    }

    #[test]
    fn test_multi_word_tag_uses_hyphen() {
        assert_eq!(
            labeled_filename("ai_webinar.pdf", &tags(&["social_proof"])),
            "ai_social-proof_webinar.pdf"
        );
    }

    #[test]
    fn test_no_prefix() {
        assert_eq!(
            labeled_filename("newsletter.pdf", &tags(&["liking"])),
            "liking_newsletter.pdf"
        );
        assert_eq!(
            labeled_filename("phish_offer.PDF", &tags(&["liking"])),
            "liking_phish_offer.pdf"
        );
    }

    #[test]
    fn test_no_tags_keeps_name() {
        assert_eq!(labeled_filename("phish_offer.pdf", &[]), "phish_offer.pdf");
    }

    #[test]
    fn test_rename_same_path_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phish_a.pdf");
        fs::write(&path, "a").unwrap();
        assert_eq!(rename_labeled(&path, &path).unwrap(), path);
        assert!(path.exists());
    }

    #[test]
    fn test_rename_avoids_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("phish_a.pdf");
        let target = dir.path().join("phish_authority_a.pdf");
        fs::write(&original, "new").unwrap();
        fs::write(&target, "existing").unwrap();

        let landed = rename_labeled(&original, &target).unwrap();
        assert_eq!(landed, dir.path().join("phish_authority_a_copy.pdf"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "existing");
        assert_eq!(fs::read_to_string(&landed).unwrap(), "new");
        assert!(!original.exists());
    }
}
