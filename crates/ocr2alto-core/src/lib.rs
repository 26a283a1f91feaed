//! Core library for turning OCR output of scanned pages into ALTO-XML.
//!
//! This crate provides:
//! - An OCR capability seam and the block-based OCR document model
//! - A confidence gate that quarantines failed and low-confidence pages
//! - A sorter regrouping staged outputs into project folders
//! - A reconciler pairing OCR documents with their source images
//! - ALTO v3 generation and archiving of the consumed folders

pub mod alto;
pub mod error;
pub mod fs_util;
pub mod gate;
pub mod journal;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod reconcile;
pub mod sorter;

pub use alto::{AltoGenerator, PageSize, PixelBox};
pub use error::{AltoError, OcrError, PipelineError, QuarantineReason, Result, StructuralMismatch};
pub use gate::{ConfidenceGate, GateSummary, PageOutcome, PageSource, Recognition};
pub use journal::{FailureJournal, FailureKind};
pub use models::config::{
    ArchiveConfig, FolderConfig, MismatchPolicy, PageSizing, ParameterConfig, PipelineConfig,
    TopLevelNaming,
};
pub use ocr::{BoundingBox, CommandProvider, OcrDocument, OcrProvider};
pub use pipeline::{Pending, Pipeline, RunReport};
pub use reconcile::{BatchReport, ReadyFolder, Reconciler};
pub use sorter::{SortReport, Sorter};
