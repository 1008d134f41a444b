use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use depth_align::batch;
use depth_align::cli::Args;
use depth_align::CalibrationModel;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("failed to size the worker pool")?;
    }

    let document = std::fs::read_to_string(&args.calibration)
        .with_context(|| format!("failed to read {}", args.calibration.display()))?;
    let calibration = CalibrationModel::from_json_str(
        &document,
        args.depth_resolution,
        args.color_resolution,
    )
    .context("invalid calibration document")?;

    let report = batch::run(&args.input, &args.output, &calibration)
        .with_context(|| format!("failed to process {}", args.input.display()))?;

    if !report.all_succeeded() {
        bail!(
            "{} of {} frames failed; see the log for details",
            report.failures.len(),
            report.processed + report.failures.len()
        );
    }
    Ok(())
}
