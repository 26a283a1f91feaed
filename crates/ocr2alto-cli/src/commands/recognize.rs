//! Recognize command - run the confidence gate over the input area.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use ocr2alto_core::{GateSummary, PageOutcome, QuarantineReason};

use super::{CliPipeline, build_pipeline};

/// Arguments for the recognize command.
#[derive(Args)]
pub struct RecognizeArgs {
    /// Write per-page outcomes to this CSV file
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

pub async fn run(args: RecognizeArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config_path, true)?;
    recognize_pass(&pipeline, args.summary.as_deref())?;
    Ok(())
}

/// Gate every input page with a progress bar, print the outcome and write
/// the optional CSV summary.
pub fn recognize_pass(pipeline: &CliPipeline, summary_path: Option<&Path>) -> anyhow::Result<GateSummary> {
    let start = Instant::now();
    let gate = pipeline.gate();
    let pages = gate.discover()?;

    if pages.is_empty() {
        println!(
            "{} No page images in {}",
            style("ℹ").blue(),
            pipeline.config().folders.input.display()
        );
        return Ok(GateSummary::default());
    }

    println!(
        "{} Found {} page images to recognize (confidence threshold {:.1})",
        style("ℹ").blue(),
        pages.len(),
        gate.threshold()
    );

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages {msg}")?
            .progress_chars("=>-"),
    );

    let mut summary = GateSummary::default();
    for page in pages {
        pb.set_message(page.id());
        let outcome = gate.process_page(&page);
        summary.outcomes.push((page, outcome));
        pb.inc(1);
    }
    pb.finish_with_message("Complete");

    summary.folders_removed = gate.cleanup_input()?;

    if let Some(path) = summary_path {
        write_summary(path, &summary)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            path.display()
        );
    }

    println!();
    println!(
        "{} Recognized {} pages in {:?}",
        style("✓").green(),
        summary.outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} accepted, {} quarantined",
        style(summary.accepted()).green(),
        style(summary.rejected()).red()
    );

    let rejected: Vec<_> = summary
        .outcomes
        .iter()
        .filter_map(|(page, outcome)| match outcome {
            PageOutcome::Rejected(reason) => Some((page, reason)),
            PageOutcome::Accepted { .. } => None,
        })
        .collect();
    if !rejected.is_empty() {
        println!();
        println!("{}", style("Quarantined pages:").red());
        for (page, reason) in rejected {
            println!("  - {}: {}", page.image.display(), reason);
        }
    }

    Ok(summary)
}

fn write_summary(path: &Path, summary: &GateSummary) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["image", "page", "status", "confidence", "persisted", "detail"])?;

    for (page, outcome) in &summary.outcomes {
        let image = page.image.display().to_string();
        let id = page.id();
        match outcome {
            PageOutcome::Accepted {
                recognition,
                staged_image,
            } => {
                let detail = staged_image
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "image left in input".to_string());
                wtr.write_record([
                    image.as_str(),
                    id.as_str(),
                    "accepted",
                    &format!("{:.2}", recognition.mean_confidence),
                    &recognition.persisted.to_string(),
                    &detail,
                ])?;
            }
            PageOutcome::Rejected(reason) => {
                let (status, confidence) = match reason {
                    QuarantineReason::ServiceFailure { .. } => ("ocr_failed", String::new()),
                    QuarantineReason::LowConfidence { mean, .. } => {
                        ("low_confidence", format!("{:.2}", mean))
                    }
                };
                wtr.write_record([
                    image.as_str(),
                    id.as_str(),
                    status,
                    &confidence,
                    "false",
                    &reason.to_string(),
                ])?;
            }
        }
    }

    wtr.flush()?;
    debug!("Wrote {} rows to {}", summary.outcomes.len(), path.display());
    Ok(())
}
