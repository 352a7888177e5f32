//! Text-format output: SVG flame graphs, dot graphs and collapsed stacks.

use super::validate_output_path;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write rendered text content (SVG, dot, collapsed stacks) to a file
///
/// **Public** - main entry point for rendered output
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::InvalidPath` - Path is empty or a directory
pub fn write_text(content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    info!("Writing output to: {}", output_path.display());

    validate_output_path(output_path)?;
    write_with(output_path, |writer| writer.write_all(content.as_bytes()))?;

    info!(
        "Output written successfully ({} bytes, {:.2} KB)",
        content.len(),
        content.len() as f64 / 1024.0
    );
    Ok(())
}

/// Write an SVG document, noting when the extension looks wrong
pub fn write_svg(svg_content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    if output_path.extension().map_or(true, |ext| ext != "svg") {
        debug!("File does not have .svg extension: {}", output_path.display());
    }
    write_text(svg_content, output_path)
}

/// Open `path` and hand a buffered writer to `render`, for output produced
/// by a streaming writer such as the dot renderer
pub fn write_with<F>(path: &Path, render: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    validate_output_path(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    render(&mut writer)?;
    writer.flush()?;
    Ok(())
}
