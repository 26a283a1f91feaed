//! Pairs regrouped OCR documents with their source images.
//!
//! One call handles one top-level folder: the lexicographically last one
//! under the document root. Every sub-folder must hold the same page base
//! names on the document side and the image side; anything else is moved
//! into the failure area under `<failed>/<top>/`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result, StructuralMismatch};
use crate::fs_util;
use crate::journal::{FailureJournal, FailureKind};
use crate::models::config::{MismatchPolicy, PipelineConfig};

const IMAGE_SUFFIX: &str = "_image";
const TEXT_SUFFIX: &str = "_text";

/// A sub-folder whose documents and images pair up exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyFolder {
    /// Name of the enclosing top-level folder.
    pub top_level: String,
    /// Name of the sub-folder.
    pub name: String,
    /// Folder holding the OCR documents.
    pub json_dir: PathBuf,
    /// Folder holding the page images.
    pub image_dir: PathBuf,
    /// Folder holding the transcripts, when there is one.
    pub text_dir: Option<PathBuf>,
    /// Page base names in ascending order.
    pub pages: Vec<String>,
}

/// Outcome of one reconciliation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Top-level folder that was processed.
    pub top_level: String,
    /// Paths returned by the handler for every ready sub-folder.
    pub archived: Vec<PathBuf>,
    /// Folders moved into the failure area.
    pub quarantined: Vec<PathBuf>,
    /// Mismatches found while the batch carried on.
    pub mismatches: Vec<StructuralMismatch>,
}

/// The three sides of one top-level folder.
struct TopLevel {
    name: String,
    json: PathBuf,
    images: PathBuf,
    text: PathBuf,
    failed: PathBuf,
}

impl TopLevel {
    fn sides(&self) -> [&Path; 3] {
        [self.json.as_path(), self.images.as_path(), self.text.as_path()]
    }
}

/// Checks document/image pairing one top-level folder at a time.
#[derive(Debug, Clone)]
pub struct Reconciler {
    json_root: PathBuf,
    images_root: PathBuf,
    text_root: PathBuf,
    failed_root: PathBuf,
    document_extension: String,
    image_extensions: Vec<String>,
    policy: MismatchPolicy,
    journal: FailureJournal,
}

impl Reconciler {
    /// Create a reconciler over the regrouped roots of `config`.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            json_root: config.folders.json.clone(),
            images_root: config.folders.images.clone(),
            text_root: config.folders.text.clone(),
            failed_root: config.folders.failed.clone(),
            document_extension: config.parameters.document_extension.clone(),
            image_extensions: config.parameters.image_extensions.clone(),
            policy: config.reconcile.mismatch_policy,
            journal: FailureJournal::new(&config.folders.logs),
        }
    }

    /// Top-level folders waiting under the document root, ascending.
    pub fn pending(&self) -> Result<Vec<String>> {
        Ok(fs_util::subdirectories(&self.json_root)?)
    }

    /// Reconcile the next top-level folder, handing every ready sub-folder
    /// to `handler` before the next one is examined.
    ///
    /// Returns `Ok(None)` when the document root holds no folder. With
    /// [`MismatchPolicy::Abort`] the first mismatch ends the batch with
    /// [`PipelineError::Mismatch`] after the offending folders have been
    /// quarantined. A sub-folder whose handler fails is quarantined as well
    /// and the handler's error ends the batch.
    pub fn reconcile_next_batch<F>(&self, mut handler: F) -> Result<Option<BatchReport>>
    where
        F: FnMut(&ReadyFolder) -> Result<PathBuf>,
    {
        let Some(name) = self.pending()?.pop() else {
            debug!("No folders to reconcile in {}", self.json_root.display());
            return Ok(None);
        };
        info!("Reconciling {}", self.json_root.join(&name).display());

        let top = TopLevel {
            json: self.json_root.join(&name),
            images: self.images_root.join(&name),
            text: self.text_root.join(&name),
            failed: self.failed_root.join(&name),
            name,
        };
        let mut report = BatchReport {
            top_level: top.name.clone(),
            ..BatchReport::default()
        };

        let result = self.reconcile_top(&top, &mut report, &mut handler);

        for side in top.sides() {
            fs_util::remove_dir_if_empty(side)?;
        }

        result.map(|()| Some(report))
    }

    fn reconcile_top<F>(&self, top: &TopLevel, report: &mut BatchReport, handler: &mut F) -> Result<()>
    where
        F: FnMut(&ReadyFolder) -> Result<PathBuf>,
    {
        let documents: BTreeSet<String> = fs_util::subdirectories(&top.json)?.into_iter().collect();
        let images: BTreeSet<String> = fs_util::subdirectories(&top.images)?.into_iter().collect();
        let texts: BTreeSet<String> = fs_util::subdirectories(&top.text)?.into_iter().collect();

        for sub in documents.difference(&images) {
            warn!("{} has no image folder", top.json.join(sub).display());
            self.quarantine(top, sub, report)?;
            report.mismatches.push(StructuralMismatch::MissingImages {
                folder: sub.clone(),
            });
        }
        for sub in images.difference(&documents) {
            warn!("{} has no document folder", top.images.join(sub).display());
            self.quarantine(top, sub, report)?;
            report.mismatches.push(StructuralMismatch::MissingDocuments {
                folder: sub.clone(),
            });
        }
        for sub in texts.iter().filter(|s| !documents.contains(*s) && !images.contains(*s)) {
            warn!("{} has no pages", top.text.join(sub).display());
            self.quarantine(top, sub, report)?;
        }

        let mut paired: Vec<&String> = documents.intersection(&images).collect();
        paired.reverse();
        for (position, sub) in paired.iter().enumerate() {
            match self.check(top, sub) {
                Ok(ready) => {
                    info!(
                        "{} is ready with {} pages",
                        ready.json_dir.display(),
                        ready.pages.len()
                    );
                    match handler(&ready) {
                        Ok(archived) => report.archived.push(archived),
                        Err(e) => {
                            error!("Could not archive {}: {}", ready.json_dir.display(), e);
                            self.quarantine(top, sub, report)?;
                            return Err(e);
                        }
                    }
                }
                Err(mismatch) => {
                    error!("{}: {}", top.json.display(), mismatch);
                    self.quarantine(top, sub, report)?;

                    if self.policy == MismatchPolicy::Skip {
                        report.mismatches.push(mismatch);
                        continue;
                    }
                    if matches!(mismatch, StructuralMismatch::MissingDocuments { .. }) {
                        for rest in &paired[position + 1..] {
                            self.quarantine(top, rest, report)?;
                        }
                    }
                    return Err(PipelineError::Mismatch(mismatch));
                }
            }
        }

        Ok(())
    }

    /// Compare the page base names of one sub-folder.
    fn check(&self, top: &TopLevel, sub: &str) -> std::result::Result<ReadyFolder, StructuralMismatch> {
        let json_dir = top.json.join(sub);
        let image_dir = top.images.join(sub);

        let documents = base_names(&json_dir, std::slice::from_ref(&self.document_extension));
        if documents.is_empty() {
            return Err(StructuralMismatch::MissingDocuments {
                folder: sub.to_string(),
            });
        }
        let images = base_names(&image_dir, &self.image_extensions);
        if images.is_empty() {
            return Err(StructuralMismatch::MissingImages {
                folder: sub.to_string(),
            });
        }

        let document_set: BTreeSet<&String> = documents.iter().collect();
        let image_set: BTreeSet<&String> = images.iter().collect();
        if documents.len() != images.len() || document_set != image_set {
            return Err(StructuralMismatch::NameMismatch {
                folder: sub.to_string(),
                only_documents: document_set
                    .difference(&image_set)
                    .map(|s| s.to_string())
                    .collect(),
                only_images: image_set
                    .difference(&document_set)
                    .map(|s| s.to_string())
                    .collect(),
            });
        }

        let text_dir = top.text.join(sub);
        Ok(ReadyFolder {
            top_level: top.name.clone(),
            name: sub.to_string(),
            json_dir,
            image_dir,
            text_dir: text_dir.is_dir().then_some(text_dir),
            pages: document_set.into_iter().cloned().collect(),
        })
    }

    /// Move every side of a sub-folder into `<failed>/<top>/`.
    fn quarantine(&self, top: &TopLevel, sub: &str, report: &mut BatchReport) -> Result<()> {
        let moves = [
            (&top.json, sub.to_string()),
            (&top.images, format!("{}{}", sub, IMAGE_SUFFIX)),
            (&top.text, format!("{}{}", sub, TEXT_SUFFIX)),
        ];
        for (side, target_name) in moves {
            let source = side.join(sub);
            if !source.is_dir() {
                continue;
            }
            let dest = fs_util::move_into_unique(&source, &top.failed, &target_name)?;
            info!("Moved {} to {}", source.display(), dest.display());
            self.journal
                .record_logged(FailureKind::StructuralMismatch, &source);
            report.quarantined.push(dest);
        }
        Ok(())
    }
}

fn base_names(dir: &Path, extensions: &[String]) -> Vec<String> {
    match fs_util::files_with_extensions(dir, extensions) {
        Ok(files) => files.iter().map(|f| fs_util::base_name(f)).collect(),
        Err(e) => {
            error!("Cannot list {}: {}", dir.display(), e);
            Vec::new()
        }
    }
}
