//! Configuration structures for the pipeline.
//!
//! Folders and core parameters have no defaults: a configuration file that
//! omits one of them fails to load. The remaining sections fall back to
//! their `Default` values.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Named folders for every stage.
    pub folders: FolderConfig,

    /// Named pipeline parameters.
    pub parameters: ParameterConfig,

    /// Archive layout and ALTO output settings.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Sorter settings.
    #[serde(default)]
    pub sorting: SortingConfig,

    /// Reconciler settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// OCR capability settings.
    #[serde(default)]
    pub ocr: OcrConfig,
}

/// Folders used by the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderConfig {
    /// Images waiting for OCR, one sub-folder per source directory.
    pub input: PathBuf,

    /// Staged OCR documents, flat per source directory.
    pub json_sorter: PathBuf,

    /// Staged images of accepted pages.
    pub images_sorter: PathBuf,

    /// Staged plain-text transcripts.
    pub text_sorter: PathBuf,

    /// Regrouped OCR documents (`<top>/<project>/<page>.json`).
    pub json: PathBuf,

    /// Regrouped images.
    pub images: PathBuf,

    /// Regrouped transcripts.
    pub text: PathBuf,

    /// Folders that failed reconciliation.
    pub failed: PathBuf,

    /// Images whose OCR call failed.
    pub failed_ocr: PathBuf,

    /// Images whose OCR result fell below the confidence threshold.
    pub low_confidence: PathBuf,

    /// Generated ALTO files with their consumed inputs.
    pub archive: PathBuf,

    /// Failure journal location.
    pub logs: PathBuf,
}

impl FolderConfig {
    /// All folders paired with their configuration key.
    pub fn named(&self) -> [(&'static str, &Path); 12] {
        [
            ("input", self.input.as_path()),
            ("json_sorter", self.json_sorter.as_path()),
            ("images_sorter", self.images_sorter.as_path()),
            ("text_sorter", self.text_sorter.as_path()),
            ("json", self.json.as_path()),
            ("images", self.images.as_path()),
            ("text", self.text.as_path()),
            ("failed", self.failed.as_path()),
            ("failed_ocr", self.failed_ocr.as_path()),
            ("low_confidence", self.low_confidence.as_path()),
            ("archive", self.archive.as_path()),
            ("logs", self.logs.as_path()),
        ]
    }
}

/// Pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    /// Minimum mean line confidence (0 - 100) for a page to be accepted.
    pub low_confidence_threshold: f64,

    /// Consecutive failed iterations tolerated by the poll loop.
    pub max_retries: u32,

    /// Seconds to sleep between poll loop iterations.
    pub retry_delay_secs: u64,

    /// Extensions recognized as page images, including the dot.
    pub image_extensions: Vec<String>,

    /// Extension of persisted OCR documents.
    pub document_extension: String,

    /// Extension of persisted transcripts.
    pub transcript_extension: String,

    /// Replace existing files when moving into the pipeline.
    pub overwrite_files: bool,
}

/// Archive layout and ALTO settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Folder name given to archived OCR documents.
    pub json_label: String,

    /// Folder name given to archived images.
    pub image_label: String,

    /// Folder name given to archived transcripts.
    pub text_label: String,

    /// Processing software written into the ALTO description.
    pub software_name: String,

    /// How page dimensions are obtained.
    pub page_sizing: PageSizing,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            json_label: "json".to_string(),
            image_label: "images".to_string(),
            text_label: "text".to_string(),
            software_name: "ocr2alto".to_string(),
            page_sizing: PageSizing::Representative,
        }
    }
}

/// Source of the pixel dimensions used to scale page geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSizing {
    /// Read the first image of a sub-folder and apply its size to every page.
    #[default]
    Representative,
    /// Read every page's own image.
    PerPage,
}

/// Sorter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingConfig {
    /// How the top-level folder name is derived from a staging sub-folder.
    pub top_level_naming: TopLevelNaming,
}

/// Naming rule for regrouped top-level folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopLevelNaming {
    /// The staging sub-folder name with spaces removed.
    #[default]
    Full,
    /// The staging sub-folder name up to its first hyphen, spaces removed.
    Prefix,
}

/// Reconciler settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// What happens to the rest of a batch after a mismatch.
    pub mismatch_policy: MismatchPolicy,
}

/// Reaction to a structural mismatch inside a top-level folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Quarantine and stop the batch with an error.
    #[default]
    Abort,
    /// Quarantine the offending sub-folder and continue with its siblings.
    Skip,
}

/// OCR capability settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Program and arguments of an external OCR command. The image is
    /// written to its stdin and an OCR document is read from its stdout.
    pub command: Vec<String>,
}

impl PipelineConfig {
    /// Load and validate configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content).map_err(|e| match e {
            PipelineError::Config(msg) => {
                PipelineError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse and validate configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// A complete configuration with every folder placed under `root`.
    pub fn template(root: &Path) -> Self {
        Self {
            folders: FolderConfig {
                input: root.join("input"),
                json_sorter: root.join("sorter/json"),
                images_sorter: root.join("sorter/images"),
                text_sorter: root.join("sorter/text"),
                json: root.join("sorted/json"),
                images: root.join("sorted/images"),
                text: root.join("sorted/text"),
                failed: root.join("failed/reconcile"),
                failed_ocr: root.join("failed/ocr"),
                low_confidence: root.join("failed/low_confidence"),
                archive: root.join("archive"),
                logs: root.join("logs"),
            },
            parameters: ParameterConfig {
                low_confidence_threshold: 60.0,
                max_retries: 3,
                retry_delay_secs: 5,
                image_extensions: [".TIF", ".tif", ".png", ".jpg", ".jpeg"]
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
                document_extension: ".json".to_string(),
                transcript_extension: ".txt".to_string(),
                overwrite_files: true,
            },
            archive: ArchiveConfig::default(),
            sorting: SortingConfig::default(),
            reconcile: ReconcileConfig::default(),
            ocr: OcrConfig::default(),
        }
    }

    /// Check every value that cannot be expressed through types alone.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (key, path) in self.folders.named() {
            if path.as_os_str().is_empty() {
                return Err(PipelineError::Config(format!("folder `{}` is empty", key)));
            }
            if !seen.insert(path) {
                return Err(PipelineError::Config(format!(
                    "folder `{}` ({}) is used by more than one stage",
                    key,
                    path.display()
                )));
            }
        }

        let params = &self.parameters;
        if !params.low_confidence_threshold.is_finite()
            || !(0.0..=100.0).contains(&params.low_confidence_threshold)
        {
            return Err(PipelineError::Config(format!(
                "low_confidence_threshold must be within 0..=100, got {}",
                params.low_confidence_threshold
            )));
        }
        if params.max_retries == 0 {
            return Err(PipelineError::Config("max_retries must be at least 1".to_string()));
        }
        if params.image_extensions.is_empty() {
            return Err(PipelineError::Config("image_extensions is empty".to_string()));
        }
        for ext in params
            .image_extensions
            .iter()
            .chain([&params.document_extension, &params.transcript_extension])
        {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(PipelineError::Config(format!(
                    "extension `{}` must start with a dot",
                    ext
                )));
            }
        }
        if params.document_extension.eq_ignore_ascii_case(&params.transcript_extension) {
            return Err(PipelineError::Config(
                "document and transcript extensions must differ".to_string(),
            ));
        }

        let archive = &self.archive;
        let labels = [&archive.json_label, &archive.image_label, &archive.text_label];
        for label in labels {
            if label.is_empty() || label.contains(['/', '\\']) {
                return Err(PipelineError::Config(format!(
                    "archive label `{}` must be a plain folder name",
                    label
                )));
            }
        }
        if labels.iter().collect::<HashSet<_>>().len() != labels.len() {
            return Err(PipelineError::Config("archive labels must be distinct".to_string()));
        }

        Ok(())
    }

    /// Create every configured folder that does not exist yet.
    pub fn ensure_folders(&self) -> Result<()> {
        for (_, path) in self.folders.named() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }
}
