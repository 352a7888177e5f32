//! JSON report writer.
//!
//! Every report is wrapped in an envelope carrying the schema version, the
//! generation time and a `kind` tag, so downstream tools can tell a graph
//! from a history without sniffing fields.

use super::validate_output_path;
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::OutputError;
use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Envelope around any serializable report body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report<T> {
    pub version: String,
    pub generated_at: String,
    pub kind: String,
    pub data: T,
}

impl<T: Serialize> Report<T> {
    /// Stamp `data` with the current schema version and time
    pub fn new(kind: impl Into<String>, data: T) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            kind: kind.into(),
            data,
        }
    }
}

/// Write a report to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Arguments
/// * `kind` - Report tag, e.g. `"graph"` or `"history"`
/// * `data` - Report body
/// * `output_path` - Destination, parent directories are created
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path is empty or a directory
pub fn write_report<T: Serialize>(
    kind: &str,
    data: &T,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    info!("Writing {} report to: {}", kind, output_path.display());

    validate_output_path(output_path)?;

    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &Report::new(kind, data))?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!(
        "Report written successfully ({} bytes)",
        std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0)
    );
    Ok(())
}

/// Serialize a report to a pretty JSON string, for stdout
pub fn report_to_string<T: Serialize>(kind: &str, data: &T) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(&Report::new(kind, data))?)
}

/// Read back a report written by [`write_report`], with an untyped body
pub fn read_report(input_path: impl AsRef<Path>) -> Result<Report<serde_json::Value>, OutputError> {
    let input_path = input_path.as_ref();
    debug!("Reading report from: {}", input_path.display());

    let file = File::open(input_path)?;
    let report: Report<serde_json::Value> = serde_json::from_reader(BufReader::new(file))?;

    debug!("Report loaded: {} v{}", report.kind, report.version);
    Ok(report)
}
