//! Confidence gate: one OCR call per page image and the accept/quarantine
//! decision taken on its mean line confidence.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use tracing::{debug, error, info, warn};

use crate::error::{OcrError, PipelineError, QuarantineReason, Result};
use crate::fs_util;
use crate::journal::{FailureJournal, FailureKind};
use crate::models::config::PipelineConfig;
use crate::ocr::{OcrDocument, OcrProvider};

/// A page image found in the input area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    /// Path of the image.
    pub image: PathBuf,
    /// Folder of the image relative to the input area.
    pub relative_dir: PathBuf,
}

impl PageSource {
    /// Page identity: the image's base name.
    pub fn id(&self) -> String {
        fs_util::base_name(&self.image)
    }
}

/// An accepted page.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// Page identity (image base name).
    pub page: String,
    /// Folder of the page relative to the input area.
    pub relative_dir: PathBuf,
    /// Mean LINE confidence of the OCR result.
    pub mean_confidence: f64,
    /// Where the OCR document was written.
    pub document: PathBuf,
    /// Where the transcript was written.
    pub transcript: PathBuf,
    /// False when the document or transcript could not be written.
    pub persisted: bool,
}

/// What happened to one page during a gate pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Recognized and staged; `staged_image` is `None` when the image had to
    /// stay in the input area.
    Accepted {
        recognition: Recognition,
        staged_image: Option<PathBuf>,
    },
    /// Quarantined.
    Rejected(QuarantineReason),
}

/// Outcomes of a pass over the input area.
#[derive(Debug, Clone, Default)]
pub struct GateSummary {
    /// Every processed page with its outcome, in discovery order.
    pub outcomes: Vec<(PageSource, PageOutcome)>,
    /// Input folders removed because they became empty.
    pub folders_removed: usize,
}

impl GateSummary {
    /// Number of accepted pages.
    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, PageOutcome::Accepted { .. }))
            .count()
    }

    /// Number of quarantined pages.
    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }
}

/// Gate between the OCR capability and the staging areas.
pub struct ConfidenceGate<P: OcrProvider> {
    provider: P,
    input: PathBuf,
    json_sorter: PathBuf,
    text_sorter: PathBuf,
    images_sorter: PathBuf,
    failed_ocr: PathBuf,
    low_confidence: PathBuf,
    threshold: f64,
    image_extensions: Vec<String>,
    document_extension: String,
    transcript_extension: String,
    overwrite_files: bool,
    journal: FailureJournal,
}

impl<P: OcrProvider> ConfidenceGate<P> {
    /// Create a gate owning `provider` for its lifetime.
    pub fn new(provider: P, config: &PipelineConfig) -> Self {
        let folders = &config.folders;
        let params = &config.parameters;
        Self {
            provider,
            input: folders.input.clone(),
            json_sorter: folders.json_sorter.clone(),
            text_sorter: folders.text_sorter.clone(),
            images_sorter: folders.images_sorter.clone(),
            failed_ocr: folders.failed_ocr.clone(),
            low_confidence: folders.low_confidence.clone(),
            threshold: params.low_confidence_threshold,
            image_extensions: params.image_extensions.clone(),
            document_extension: params.document_extension.clone(),
            transcript_extension: params.transcript_extension.clone(),
            overwrite_files: params.overwrite_files,
            journal: FailureJournal::new(&folders.logs),
        }
    }

    /// Confidence threshold in use.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Every image below the input area, sorted by path.
    pub fn discover(&self) -> Result<Vec<PageSource>> {
        let root = Pattern::escape(&self.input.to_string_lossy());
        let pattern = format!("{}/**/*", root);
        let entries = glob(&pattern)
            .map_err(|e| PipelineError::Config(format!("bad input folder pattern: {}", e)))?;

        let mut pages = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable input entry: {}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let name = fs_util::file_name(&path);
            if fs_util::matching_extension(&name, &self.image_extensions).is_none() {
                debug!("Ignoring non-image file {}", path.display());
                continue;
            }
            let relative_dir = path
                .parent()
                .and_then(|p| p.strip_prefix(&self.input).ok())
                .map(Path::to_path_buf)
                .unwrap_or_default();
            pages.push(PageSource {
                image: path,
                relative_dir,
            });
        }
        pages.sort_by(|a, b| a.image.cmp(&b.image));
        Ok(pages)
    }

    /// Run OCR on one page and apply the confidence policy.
    ///
    /// Rejected images are moved to the failed-OCR or low-confidence area;
    /// accepted pages get their document and transcript persisted.
    pub fn recognize(&self, page: &PageSource) -> std::result::Result<Recognition, QuarantineReason> {
        info!("Processing file: {}", page.image.display());

        let document = match self.call_provider(page) {
            Ok(document) => document,
            Err(e) => {
                error!("Error processing OCR for file {}: {}", page.image.display(), e);
                self.quarantine(page, &self.failed_ocr, FailureKind::OcrProcessing);
                return Err(QuarantineReason::ServiceFailure {
                    message: e.to_string(),
                });
            }
        };

        let mean = document.mean_line_confidence();
        let has_lines = document.lines().next().is_some();
        if !has_lines || mean < self.threshold {
            warn!(
                "Low confidence {:.2} for {} (threshold {:.2}); the image may contain handwritten text",
                mean,
                page.image.display(),
                self.threshold
            );
            self.quarantine(page, &self.low_confidence, FailureKind::LowConfidence);
            return Err(QuarantineReason::LowConfidence {
                mean,
                threshold: self.threshold,
            });
        }

        info!(
            "Accepted {} with average confidence {:.2}",
            page.image.display(),
            mean
        );

        let id = page.id();
        let document_path = self
            .json_sorter
            .join(&page.relative_dir)
            .join(format!("{}{}", id, self.document_extension));
        let transcript_path = self
            .text_sorter
            .join(&page.relative_dir)
            .join(format!("{}{}", id, self.transcript_extension));

        let saved_document = self.persist(page, &document_path, document.to_json_pretty());
        let saved_transcript = self.persist(page, &transcript_path, Ok(document.transcript()));

        Ok(Recognition {
            page: id,
            relative_dir: page.relative_dir.clone(),
            mean_confidence: mean,
            document: document_path,
            transcript: transcript_path,
            persisted: saved_document && saved_transcript,
        })
    }

    /// Move an accepted page's image into the image staging area.
    ///
    /// Returns `None` when an image of the same name is already staged and
    /// overwriting is disabled; the image then stays where it is.
    pub fn stage(&self, page: &PageSource) -> Result<Option<PathBuf>> {
        let dir = self.images_sorter.join(&page.relative_dir);
        let target = dir.join(fs_util::file_name(&page.image));

        if target.exists() {
            if !self.overwrite_files {
                warn!(
                    "File {} already exists in {} (overwrite turned off)",
                    fs_util::file_name(&page.image),
                    dir.display()
                );
                return Ok(None);
            }
            fs::remove_file(&target).map_err(|e| fs_util::with_path(e, &target))?;
            info!("File {} was overwritten in {}", fs_util::file_name(&page.image), dir.display());
        }

        fs_util::move_path(&page.image, &target)?;
        debug!("Staged {} at {}", page.image.display(), target.display());
        Ok(Some(target))
    }

    /// Recognize one page and stage its image when accepted.
    pub fn process_page(&self, page: &PageSource) -> PageOutcome {
        match self.recognize(page) {
            Ok(recognition) => {
                let staged_image = match self.stage(page) {
                    Ok(staged) => staged,
                    Err(e) => {
                        error!("An error occurred while staging {}: {}", page.image.display(), e);
                        None
                    }
                };
                PageOutcome::Accepted {
                    recognition,
                    staged_image,
                }
            }
            Err(reason) => PageOutcome::Rejected(reason),
        }
    }

    /// Run the gate over every image in the input area.
    pub fn stage_input(&self) -> Result<GateSummary> {
        let pages = self.discover()?;
        info!("Found {} page images in {}", pages.len(), self.input.display());

        let mut summary = GateSummary::default();
        for page in pages {
            let outcome = self.process_page(&page);
            summary.outcomes.push((page, outcome));
        }
        summary.folders_removed = self.cleanup_input()?;
        Ok(summary)
    }

    /// Remove folders of the input area left empty by a pass.
    pub fn cleanup_input(&self) -> Result<usize> {
        fn prune(dir: &Path) -> Result<usize> {
            let mut removed = 0;
            for name in fs_util::subdirectories(dir)? {
                let child = dir.join(name);
                removed += prune(&child)?;
                if fs_util::remove_dir_if_empty(&child)? {
                    removed += 1;
                }
            }
            Ok(removed)
        }
        prune(&self.input)
    }

    fn call_provider(&self, page: &PageSource) -> std::result::Result<OcrDocument, OcrError> {
        let bytes = fs::read(&page.image).map_err(|source| OcrError::ReadImage {
            path: page.image.clone(),
            source,
        })?;
        self.provider.analyze(&bytes)
    }

    fn quarantine(&self, page: &PageSource, area: &Path, kind: FailureKind) {
        self.journal.record_logged(kind, &page.image);
        let dir = area.join(&page.relative_dir);
        match fs_util::move_into_unique(&page.image, &dir, &fs_util::file_name(&page.image)) {
            Ok(dest) => info!("Moved {} to {}", page.image.display(), dest.display()),
            Err(e) => error!(
                "Could not quarantine {} into {}: {}",
                page.image.display(),
                dir.display(),
                e
            ),
        }
    }

    fn persist(&self, page: &PageSource, path: &Path, content: Result<String>) -> bool {
        let written = content.and_then(|text| {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, text)?;
            Ok(())
        });
        match written {
            Ok(()) => {
                info!("Processed file saved to {}", path.display());
                true
            }
            Err(e) => {
                error!("Error saving file {}: {}", path.display(), e);
                self.journal.record_logged(FailureKind::Save, &page.image);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::fixtures::single_line;
    use pretty_assertions::assert_eq;

    struct StubOcr {
        result: std::result::Result<OcrDocument, String>,
    }

    impl OcrProvider for StubOcr {
        fn analyze(&self, _image: &[u8]) -> std::result::Result<OcrDocument, OcrError> {
            self.result.clone().map_err(OcrError::Service)
        }
    }

    fn setup(result: std::result::Result<OcrDocument, String>) -> (tempfile::TempDir, PipelineConfig, ConfidenceGate<StubOcr>) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::template(dir.path());
        config.parameters.low_confidence_threshold = 60.0;
        config.ensure_folders().unwrap();
        let gate = ConfidenceGate::new(StubOcr { result }, &config);
        (dir, config, gate)
    }

    fn add_input(config: &PipelineConfig, rel: &str, name: &str) -> PageSource {
        let dir = config.folders.input.join(rel);
        fs::create_dir_all(&dir).unwrap();
        let image = dir.join(name);
        fs::write(&image, b"not really a png").unwrap();
        PageSource {
            image,
            relative_dir: PathBuf::from(rel),
        }
    }

    #[test]
    fn test_low_confidence_is_quarantined() {
        let (_dir, config, gate) = setup(Ok(single_line("faint scrawl", 40.0)));
        let page = add_input(&config, "Box1-Letters", "ProjA-001.png");

        assert_eq!(gate.threshold(), 60.0);
        let result = gate.recognize(&page);

        assert!(matches!(result, Err(QuarantineReason::LowConfidence { mean, .. }) if mean == 40.0));
        assert!(!page.image.exists());
        assert!(config
            .folders
            .low_confidence
            .join("Box1-Letters/ProjA-001.png")
            .exists());
        assert!(!config
            .folders
            .json_sorter
            .join("Box1-Letters/ProjA-001.json")
            .exists());
    }

    #[test]
    fn test_service_failure_is_quarantined() {
        let (_dir, config, gate) = setup(Err("throttled".to_string()));
        let page = add_input(&config, "Box1", "ProjA-001.png");

        let result = gate.recognize(&page);

        match result {
            Err(QuarantineReason::ServiceFailure { message }) => assert!(message.contains("throttled")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(config.folders.failed_ocr.join("Box1/ProjA-001.png").exists());
        assert!(fs_util::subdirectories(&config.folders.json_sorter).unwrap().is_empty());
    }

    #[test]
    fn test_document_without_lines_is_low_confidence() {
        let (_dir, mut config, _) = setup(Ok(OcrDocument::default()));
        config.parameters.low_confidence_threshold = 0.0;
        let gate = ConfidenceGate::new(StubOcr { result: Ok(OcrDocument::default()) }, &config);
        let page = add_input(&config, "Box1", "blank.png");

        assert!(matches!(
            gate.recognize(&page),
            Err(QuarantineReason::LowConfidence { mean, .. }) if mean == 0.0
        ));
    }

    #[test]
    fn test_accepted_page_is_persisted_and_staged() {
        let (_dir, config, gate) = setup(Ok(single_line("Dear Sir", 92.0)));
        let page = add_input(&config, "Box1", "ProjA-001.png");

        let outcome = gate.process_page(&page);

        let PageOutcome::Accepted { recognition, staged_image } = outcome else {
            panic!("page was rejected");
        };
        assert_eq!(recognition.page, "ProjA-001");
        assert_eq!(recognition.mean_confidence, 92.0);
        assert!(recognition.persisted);

        let saved = OcrDocument::from_path(&recognition.document).unwrap();
        assert_eq!(saved, single_line("Dear Sir", 92.0));
        assert_eq!(fs::read_to_string(&recognition.transcript).unwrap(), "Dear Sir");
        assert_eq!(
            staged_image,
            Some(config.folders.images_sorter.join("Box1/ProjA-001.png"))
        );
        assert!(!page.image.exists());
    }

    #[test]
    fn test_write_failure_does_not_quarantine() {
        let (dir, mut config, _) = setup(Ok(single_line("Dear Sir", 92.0)));
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        config.folders.json_sorter = blocker;
        let gate = ConfidenceGate::new(StubOcr { result: Ok(single_line("Dear Sir", 92.0)) }, &config);
        let page = add_input(&config, "Box1", "ProjA-001.png");

        let outcome = gate.process_page(&page);

        let PageOutcome::Accepted { recognition, staged_image } = outcome else {
            panic!("page was rejected");
        };
        assert!(!recognition.persisted);
        assert!(staged_image.is_some());
        let journal = FailureJournal::new(&config.folders.logs).load().unwrap();
        assert!(journal.values().any(|kinds| kinds.contains_key("Save error")));
    }

    #[test]
    fn test_existing_staged_image_without_overwrite_stays() {
        let (_dir, mut config, _) = setup(Ok(single_line("Dear Sir", 92.0)));
        config.parameters.overwrite_files = false;
        let gate = ConfidenceGate::new(StubOcr { result: Ok(single_line("Dear Sir", 92.0)) }, &config);
        let staged = config.folders.images_sorter.join("Box1/ProjA-001.png");
        fs::create_dir_all(staged.parent().unwrap()).unwrap();
        fs::write(&staged, "older").unwrap();
        let page = add_input(&config, "Box1", "ProjA-001.png");

        assert_eq!(gate.stage(&page).unwrap(), None);
        assert!(page.image.exists());
        assert_eq!(fs::read_to_string(&staged).unwrap(), "older");
    }

    #[test]
    fn test_stage_input_walks_input_area() {
        let (_dir, config, gate) = setup(Ok(single_line("Dear Sir", 92.0)));
        add_input(&config, "Box1", "ProjA-001.png");
        add_input(&config, "Box1", "ProjA-002.jpg");
        add_input(&config, "Box2 (2)", "ProjB-001.TIF");
        fs::write(config.folders.input.join("Box1/notes.txt"), "ignored").unwrap();

        let summary = gate.stage_input().unwrap();

        assert_eq!(summary.accepted(), 3);
        assert_eq!(summary.rejected(), 0);
        assert_eq!(summary.folders_removed, 1);
        assert!(config.folders.input.join("Box1/notes.txt").exists());
        assert!(!config.folders.input.join("Box2 (2)").exists());
        assert!(config
            .folders
            .json_sorter
            .join("Box2 (2)/ProjB-001.json")
            .exists());
        assert!(config.folders.text_sorter.join("Box1/ProjA-002.txt").exists());
    }

    #[test]
    fn test_rejections_are_journaled() {
        let (_dir, config, gate) = setup(Err("down".to_string()));
        add_input(&config, "Box1", "ProjA-001.png");

        let summary = gate.stage_input().unwrap();
        assert_eq!(summary.rejected(), 1);

        let journal = FailureJournal::new(&config.folders.logs).load().unwrap();
        let kinds = journal.values().next().unwrap();
        assert_eq!(kinds["OCR processing error"].len(), 1);
    }
}
