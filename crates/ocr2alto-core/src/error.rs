//! Error types for the ocr2alto-core library.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// OCR capability error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Reconciliation found a folder whose documents and images disagree.
    #[error("reconciliation failed: {0}")]
    Mismatch(#[from] StructuralMismatch),

    /// ALTO generation or archiving error.
    #[error("ALTO error: {0}")]
    Alto(#[from] AltoError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while talking to the OCR capability.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The service could not be reached or reported a failure.
    #[error("service failure: {0}")]
    Service(String),

    /// The service answered with something that is not an OCR document.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The image could not be read before submission.
    #[error("failed to read image {path}: {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A folder unit whose documents and images cannot be paired.
///
/// Raising one of these aborts the current reconciliation batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralMismatch {
    /// The document side of a sub-folder holds no OCR documents.
    #[error("no OCR documents in {folder}")]
    MissingDocuments { folder: String },

    /// The image side of a sub-folder holds no matching images.
    #[error("no images in {folder}")]
    MissingImages { folder: String },

    /// Both sides hold files but their base names differ.
    #[error(
        "documents and images differ in {folder} (only documents: {only_documents:?}, only images: {only_images:?})"
    )]
    NameMismatch {
        folder: String,
        only_documents: Vec<String>,
        only_images: Vec<String>,
    },
}

impl StructuralMismatch {
    /// Name of the sub-folder that failed reconciliation.
    pub fn folder(&self) -> &str {
        match self {
            Self::MissingDocuments { folder }
            | Self::MissingImages { folder }
            | Self::NameMismatch { folder, .. } => folder,
        }
    }
}

/// Errors related to ALTO generation.
#[derive(Error, Debug)]
pub enum AltoError {
    /// No image with a recognized extension exists for a page.
    #[error("no image found for page {page} in {folder}")]
    MissingImage { folder: PathBuf, page: String },

    /// The folder handed over has no pages.
    #[error("folder {0} has no pages")]
    EmptyFolder(PathBuf),

    /// XML serialization failed.
    #[error("failed to write XML: {0}")]
    Xml(String),

    /// The archive already holds a folder at the destination.
    #[error("archive destination already exists: {0}")]
    ArchiveCollision(PathBuf),
}

/// Why the confidence gate rejected a page.
#[derive(Debug, Clone, PartialEq)]
pub enum QuarantineReason {
    /// The OCR call failed; the image went to the failed-OCR area.
    ServiceFailure { message: String },

    /// Mean line confidence fell below the threshold; the image went to the
    /// low-confidence area and the document was discarded.
    LowConfidence { mean: f64, threshold: f64 },
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceFailure { message } => write!(f, "OCR service failure: {}", message),
            Self::LowConfidence { mean, threshold } => {
                write!(f, "low confidence: {:.2} < {:.2}", mean, threshold)
            }
        }
    }
}

impl std::error::Error for QuarantineReason {}

/// Result type for the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
