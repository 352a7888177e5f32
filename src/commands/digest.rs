//! Digest command implementation.
//!
//! The digest command:
//! 1. Opens the trace
//! 2. Replays the event stream into periodic snapshots
//! 3. Reopens the digest and reports what was committed
//!
//! An interrupt stops the build at the last committed snapshot, which still
//! leaves a usable digest behind.

use super::models::DigestArgs;
use super::utils::{format_epoch, open_reader};
use crate::digest::DigestSummary;
use crate::output::write_report;
use crate::utils::si_prefix::bytes_string;
use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Execute the digest command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Digest command arguments
/// * `cancel` - Flag raised by the interrupt handler
///
/// # Errors
/// * The trace cannot be opened
/// * The event stream is corrupt or the digest cannot be written
pub fn execute_digest(args: &DigestArgs, cancel: Option<&AtomicBool>) -> Result<DigestSummary> {
    let start_time = Instant::now();
    let mut reader = open_reader(&args.trace)?;

    info!(
        "Digesting {} (interval {}s, precision {})",
        reader.events_path().display(),
        args.options.interval,
        args.options.precision
    );
    let summary = reader
        .make_digest(&args.options, cancel)
        .context("Failed to build digest")?;

    if summary.interrupted {
        warn!(
            "Digest interrupted; kept {} snapshots up to {}",
            reader.snapshot_count(),
            reader
                .final_time()
                .map(format_epoch)
                .unwrap_or_else(|_| "the start".to_string())
        );
    }

    println!("Digest:     {}", reader.digest_path().display());
    println!("Events:     {}", summary.events);
    println!("Snapshots:  {} ({} records)", summary.snapshots, summary.records);
    println!("Size:       {}", bytes_string(summary.bytes_written as f64));

    if let Some(path) = &args.summary_json {
        write_report("digest", &summary, path).context("Failed to write digest summary")?;
        info!("✓ Summary written to: {}", path.display());
    }

    info!(
        "Digest completed in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Validate digest arguments
///
/// **Public** - can be called before execute_digest for early validation
pub fn validate_digest_args(args: &DigestArgs) -> Result<()> {
    if args.trace.as_os_str().is_empty() {
        anyhow::bail!("Trace path cannot be empty");
    }
    args.options.validate()?;
    Ok(())
}
