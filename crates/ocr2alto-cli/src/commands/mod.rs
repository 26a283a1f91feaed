//! Subcommands and the helpers they share.

pub mod config;
pub mod recognize;
pub mod reconcile;
pub mod run;
pub mod sort;
pub mod status;

use std::path::{Path, PathBuf};

use tracing::debug;

use ocr2alto_core::{
    CommandProvider, OcrDocument, OcrError, OcrProvider, Pipeline, PipelineConfig,
};

/// Provider used when `ocr.command` is empty. Commands that never call OCR
/// still need a pipeline.
struct NoOcr;

impl OcrProvider for NoOcr {
    fn analyze(&self, _image: &[u8]) -> Result<OcrDocument, OcrError> {
        Err(OcrError::Service("ocr.command is not configured".to_string()))
    }
}

pub type CliPipeline = Pipeline<Box<dyn OcrProvider>>;

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocr2alto")
        .join("config.json")
}

/// The file named by `--config`, or the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map(Path::to_path_buf).unwrap_or_else(default_config_path)
}

/// Load the configuration, pointing at `config init` when there is none.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let path = config_path(explicit);
    if !path.exists() {
        anyhow::bail!(
            "No configuration file at {}. Run 'ocr2alto config init' to create one.",
            path.display()
        );
    }
    debug!("Loading configuration from {}", path.display());
    Ok(PipelineConfig::from_file(&path)?)
}

/// Build the pipeline. With `needs_ocr` an empty `ocr.command` is an error.
pub fn build_pipeline(explicit: Option<&Path>, needs_ocr: bool) -> anyhow::Result<CliPipeline> {
    let config = load_config(explicit)?;

    let provider: Box<dyn OcrProvider> = if config.ocr.command.is_empty() {
        if needs_ocr {
            anyhow::bail!("ocr.command is empty; set it with 'ocr2alto config set ocr.command'");
        }
        Box::new(NoOcr)
    } else {
        Box::new(CommandProvider::new(&config.ocr.command)?)
    };

    Ok(Pipeline::new(config, provider)?)
}
