//! Sort command - regroup staged outputs into project folders.

use std::path::Path;

use console::style;

use ocr2alto_core::SortReport;

use super::build_pipeline;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config_path, false)?;
    let report = pipeline.sort()?;
    print_report(&report);
    Ok(())
}

pub fn print_report(report: &SortReport) {
    if report == &SortReport::default() {
        println!("{} Nothing staged to sort", style("ℹ").blue());
        return;
    }

    println!(
        "{} Sorted {} files, {} staging folders removed",
        style("✓").green(),
        report.moved.len(),
        report.folders_removed.len()
    );

    if !report.failed.is_empty() {
        println!("{}", style("Files that could not be moved:").red());
        for path in &report.failed {
            println!("  - {}", path.display());
        }
    }
    for path in &report.folders_kept {
        println!(
            "{} {} still holds files and was kept",
            style("!").yellow(),
            path.display()
        );
    }
}
