//! Info, history and plot commands: summaries of a trace over time.

use super::models::{HistoryArgs, PlotArgs};
use super::utils::{emit, format_epoch, open_reader, require_digest};
use crate::output::{report_to_string, write_report};
use crate::utils::si_prefix::bytes_string;
use anyhow::{bail, Context, Result};
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

/// Print what is known about a trace: its time span, sampling and digest
///
/// **Public** - main entry point called from main.rs
pub fn execute_info(trace: &Path) -> Result<()> {
    let mut reader = open_reader(trace)?;

    println!("Trace:      {}", trace.display());
    println!("Started:    {}", format_epoch(reader.initial_time()));
    println!("Sampling:");
    for range in reader.sampling_config().ranges() {
        println!(
            "  < {:>10} bytes: p = {}",
            range.upper_bound, range.probability
        );
    }
    println!("  otherwise:        p = 1");

    if !reader.has_digest() {
        println!("Digest:     none (run `heapflow digest`)");
        return Ok(());
    }

    let count = reader.snapshot_count();
    println!("Digest:     {}", reader.digest_path().display());
    println!("Interval:   {}s", reader.snapshot_interval()?);
    println!("Snapshots:  {}", count);
    println!("Finished:   {}", format_epoch(reader.final_time()?));
    println!("Elapsed:    {:.1}s", reader.elapsed_time()?);

    if count > 0 {
        let last = reader.snapshot(count - 1)?;
        println!(
            "Live heap:  {} at the last snapshot ({} unattributed)",
            bytes_string(last.total_usage() as f64),
            bytes_string(last.unknown_usage() as f64)
        );
    }
    Ok(())
}

/// Replay the raw events into a top-N history and write it as JSON
pub fn execute_history(args: &HistoryArgs) -> Result<()> {
    let reader = open_reader(&args.trace)?;
    let history = reader
        .history(args.granularity, args.top_n)
        .context("Failed to build heap history")?;
    info!("History has {} slices", history.history.len());

    match &args.output {
        Some(path) => {
            write_report("history", &history, path).context("Failed to write history")?;
            info!("✓ History written to: {}", path.display());
        }
        None => println!("{}", report_to_string("history", &history)?),
    }
    Ok(())
}

/// Validate history arguments
pub fn validate_history_args(args: &HistoryArgs) -> Result<()> {
    if args.granularity.is_nan() || args.granularity <= 0.0 {
        bail!("Granularity must be positive");
    }
    if args.top_n == 0 {
        bail!("top_n must be greater than 0");
    }
    Ok(())
}

/// Usage over time at the requested lines, from the digest
pub fn execute_plot(args: &PlotArgs) -> Result<()> {
    let mut reader = open_reader(&args.trace)?;
    require_digest(&reader)?;

    let lines: BTreeMap<String, _> = args.lines.iter().cloned().collect();
    if lines.len() != args.lines.len() {
        bail!("Line labels must be unique");
    }
    let plot = reader.time_plot(&lines).context("Failed to build time plot")?;

    match &args.output {
        Some(path) => {
            write_report("plot", &plot, path).context("Failed to write time plot")?;
            info!("✓ Time plot written to: {}", path.display());
        }
        None => emit(&format!("{}\n", report_to_string("plot", &plot)?), None)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_history_args() {
        let args = HistoryArgs {
            trace: PathBuf::from("run"),
            granularity: 1.0,
            top_n: 5,
            output: None,
        };
        assert!(validate_history_args(&args).is_ok());
        assert!(validate_history_args(&HistoryArgs { top_n: 0, ..args.clone() }).is_err());
        assert!(validate_history_args(&HistoryArgs { granularity: 0.0, ..args.clone() }).is_err());
        assert!(validate_history_args(&HistoryArgs { granularity: f64::NAN, ..args }).is_err());
    }
}
