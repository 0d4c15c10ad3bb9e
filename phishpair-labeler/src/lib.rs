//! phishpair-labeler library
//!
//! Offline tool that tags PDF stimuli with the persuasion principles they
//! use and renames them into the corpus naming convention.

pub mod categories;
pub mod classifier;
pub mod extract;
pub mod naming;
pub mod process;

pub use classifier::{parse_classification, Classifier, OpenAiClassifier};
pub use extract::{PdfTextExtractor, TextExtractor};
pub use naming::{labeled_filename, rename_labeled};
pub use process::{process_folder, FolderSummary, LabelError};
