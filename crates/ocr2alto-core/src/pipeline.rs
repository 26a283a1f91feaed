//! Wires the pipeline stages from one configuration.

use tracing::{debug, info};

use crate::alto::AltoGenerator;
use crate::error::Result;
use crate::fs_util;
use crate::gate::{ConfidenceGate, GateSummary};
use crate::models::config::PipelineConfig;
use crate::ocr::OcrProvider;
use crate::reconcile::{BatchReport, Reconciler};
use crate::sorter::{SortReport, Sorter};

/// Work waiting in each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pending {
    /// Page images in the input area.
    pub input_pages: usize,
    /// Sub-folders across the staging roots.
    pub staged_folders: usize,
    /// Top-level folders waiting for reconciliation.
    pub sorted_folders: usize,
}

/// Outcome of one sort and reconcile iteration.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sorted: SortReport,
    pub batch: Option<BatchReport>,
}

/// The complete pipeline: gate, sorter, reconciler and ALTO generator.
pub struct Pipeline<P: OcrProvider> {
    config: PipelineConfig,
    gate: ConfidenceGate<P>,
    sorter: Sorter,
    reconciler: Reconciler,
    generator: AltoGenerator,
}

impl<P: OcrProvider> Pipeline<P> {
    /// Validate `config`, create missing folders and build every stage.
    pub fn new(config: PipelineConfig, provider: P) -> Result<Self> {
        config.validate()?;
        config.ensure_folders()?;
        debug!("Pipeline folders ready under {}", config.folders.input.display());

        Ok(Self {
            gate: ConfidenceGate::new(provider, &config),
            sorter: Sorter::new(&config),
            reconciler: Reconciler::new(&config),
            generator: AltoGenerator::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn gate(&self) -> &ConfidenceGate<P> {
        &self.gate
    }

    /// Recognize every page in the input area and stage the accepted ones.
    pub fn recognize_input(&self) -> Result<GateSummary> {
        self.gate.stage_input()
    }

    /// Regroup staged files into project folders.
    pub fn sort(&self) -> Result<SortReport> {
        self.sorter.start_sorting()
    }

    /// Reconcile the next top-level folder, generating ALTO for every ready
    /// sub-folder.
    pub fn reconcile_next(&self) -> Result<Option<BatchReport>> {
        self.reconciler
            .reconcile_next_batch(|folder| self.generator.generate(folder))
    }

    /// Sort whatever is staged, then reconcile one batch.
    pub fn run_once(&self) -> Result<RunReport> {
        let sorted = self.sort()?;
        let batch = self.reconcile_next()?;
        if let Some(batch) = &batch {
            info!(
                "Batch {} done: {} archived, {} quarantined",
                batch.top_level,
                batch.archived.len(),
                batch.quarantined.len()
            );
        }
        Ok(RunReport { sorted, batch })
    }

    /// Count the work waiting in each stage.
    pub fn pending(&self) -> Result<Pending> {
        let folders = &self.config.folders;
        let mut staged_folders = 0;
        for root in [&folders.json_sorter, &folders.images_sorter, &folders.text_sorter] {
            staged_folders += fs_util::subdirectories(root)?.len();
        }
        Ok(Pending {
            input_pages: self.gate.discover()?.len(),
            staged_folders,
            sorted_folders: self.reconciler.pending()?.len(),
        })
    }

    /// Whether nothing is left to sort or reconcile.
    pub fn is_idle(&self) -> Result<bool> {
        let pending = self.pending()?;
        Ok(pending.staged_folders == 0 && pending.sorted_folders == 0)
    }
}
