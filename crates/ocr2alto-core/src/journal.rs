//! Per-day JSON journal of failed jobs.
//!
//! The journal lives at `<logs>/failed_jobs_log.json` and groups failed
//! paths by date and failure kind:
//!
//! ```json
//! { "2024-05-01": { "Low confidence": ["input/a/p1.png"] } }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::error;

use crate::error::Result;

/// File name of the journal inside the logs folder.
pub const JOURNAL_FILE: &str = "failed_jobs_log.json";

type Entries = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Kind of failure recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The OCR call failed.
    OcrProcessing,
    /// The page fell below the confidence threshold.
    LowConfidence,
    /// A result or transcript could not be written.
    Save,
    /// A folder failed reconciliation.
    StructuralMismatch,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::OcrProcessing => "OCR processing error",
            Self::LowConfidence => "Low confidence",
            Self::Save => "Save error",
            Self::StructuralMismatch => "Structural mismatch",
        };
        f.write_str(message)
    }
}

/// Appends failures to the journal file.
#[derive(Debug, Clone)]
pub struct FailureJournal {
    path: PathBuf,
}

impl FailureJournal {
    /// Create a journal stored in `logs_dir`.
    pub fn new(logs_dir: &Path) -> Self {
        Self {
            path: logs_dir.join(JOURNAL_FILE),
        }
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a failure under today's date.
    pub fn record(&self, kind: FailureKind, subject: &Path) -> Result<()> {
        self.record_on(Local::now().date_naive(), kind, subject)
    }

    /// Record a failure without propagating journal errors.
    ///
    /// Journal trouble must not change how the failing page is handled.
    pub fn record_logged(&self, kind: FailureKind, subject: &Path) {
        if let Err(e) = self.record(kind, subject) {
            error!(
                "Could not journal {} for {}: {}",
                kind,
                subject.display(),
                e
            );
        }
    }

    fn record_on(&self, date: NaiveDate, kind: FailureKind, subject: &Path) -> Result<()> {
        let mut entries = self.load()?;
        entries
            .entry(date.format("%Y-%m-%d").to_string())
            .or_default()
            .entry(kind.to_string())
            .or_default()
            .push(subject.display().to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }

    /// Read every recorded entry.
    pub fn load(&self) -> Result<Entries> {
        if !self.path.exists() {
            return Ok(Entries::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
