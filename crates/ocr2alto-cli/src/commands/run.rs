//! Run command - gate the input area, then sort and reconcile until idle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use console::style;
use tracing::{error, info, warn};

use super::recognize::recognize_pass;
use super::{build_pipeline, reconcile, sort};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Write per-page outcomes of the recognition pass to this CSV file
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

pub async fn run(args: RunArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config_path, true)?;
    let max_retries = pipeline.config().parameters.max_retries;
    let delay = Duration::from_secs(pipeline.config().parameters.retry_delay_secs);

    recognize_pass(&pipeline, args.summary.as_deref())?;

    let mut failures = 0;
    let mut batches = 0;
    while !pipeline.is_idle()? {
        match pipeline.run_once() {
            Ok(report) => {
                failures = 0;
                sort::print_report(&report.sorted);
                match &report.batch {
                    Some(batch) => {
                        batches += 1;
                        reconcile::print_report(batch);
                    }
                    None if report.sorted.moved.is_empty() => {
                        // Only staging folders with leftovers remain.
                        warn!("No progress in this iteration, stopping");
                        break;
                    }
                    None => {}
                }
            }
            Err(e) => {
                failures += 1;
                error!("Iteration failed ({}/{}): {}", failures, max_retries, e);
                println!("{} {}", style("✗").red(), e);
                if failures >= max_retries {
                    anyhow::bail!("Giving up after {} consecutive failures: {}", failures, e);
                }
            }
        }

        if !pipeline.is_idle()? {
            info!("Waiting {:?} before the next iteration", delay);
            tokio::time::sleep(delay).await;
        }
    }

    println!();
    println!(
        "{} Pipeline idle after {} batches",
        style("✓").green(),
        batches
    );
    Ok(())
}
