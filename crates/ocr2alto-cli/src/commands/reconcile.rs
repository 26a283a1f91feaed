//! Reconcile command - check one batch and generate its ALTO files.

use std::path::Path;

use console::style;

use ocr2alto_core::BatchReport;

use super::build_pipeline;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config_path, false)?;
    match pipeline.reconcile_next()? {
        Some(report) => print_report(&report),
        None => println!("{} Nothing to reconcile", style("ℹ").blue()),
    }
    Ok(())
}

pub fn print_report(report: &BatchReport) {
    println!(
        "{} Batch {}: {} ALTO files written, {} folders quarantined",
        style("✓").green(),
        style(&report.top_level).bold(),
        report.archived.len(),
        report.quarantined.len()
    );
    for path in &report.archived {
        println!("  + {}", path.display());
    }
    for mismatch in &report.mismatches {
        println!("  {} {}", style("-").red(), mismatch);
    }
}
