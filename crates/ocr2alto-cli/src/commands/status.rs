//! Status command - show the work waiting in each stage.

use std::path::Path;

use console::style;

use super::build_pipeline;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config_path, false)?;
    let pending = pipeline.pending()?;
    let folders = &pipeline.config().folders;

    println!("{}", style("Pipeline status").bold());
    println!(
        "  Input pages:     {:>5}  ({})",
        pending.input_pages,
        folders.input.display()
    );
    println!(
        "  Staged folders:  {:>5}  ({})",
        pending.staged_folders,
        folders.json_sorter.display()
    );
    println!(
        "  Sorted batches:  {:>5}  ({})",
        pending.sorted_folders,
        folders.json.display()
    );
    println!();

    if pipeline.is_idle()? && pending.input_pages == 0 {
        println!("Status: {}", style("idle").green());
    } else {
        println!("Status: {}", style("work pending").yellow());
    }

    Ok(())
}
