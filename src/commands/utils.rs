use crate::output::write_text;
use crate::reader::ProfileReader;
use crate::trace::SourceLocation;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Open the trace at `base` with a readable error
pub fn open_reader(base: &Path) -> Result<ProfileReader> {
    ProfileReader::open(base).with_context(|| {
        format!(
            "Failed to open trace {} (expected {}.hpm and {}.hpd)",
            base.display(),
            base.display(),
            base.display()
        )
    })
}

/// Fail with a hint when the trace has no digest yet
pub fn require_digest(reader: &ProfileReader) -> Result<()> {
    if !reader.has_digest() {
        bail!(
            "No digest at {}; run `heapflow digest` first",
            reader.digest_path().display()
        );
    }
    Ok(())
}

/// Write `content` to `output`, or to stdout when no file is given
pub fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => write_text(content, path)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

/// Seconds since the epoch as RFC 3339, falling back to the raw number
pub fn format_epoch(seconds: f64) -> String {
    DateTime::<Utc>::from_timestamp_millis((seconds * 1000.0).round() as i64)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| format!("{:.3}s", seconds))
}

/// Parse `LABEL=FILE:LINE`, or plain `FILE:LINE` labelled by itself
pub fn parse_labelled_location(text: &str) -> Result<(String, SourceLocation)> {
    let (label, location) = match text.split_once('=') {
        Some((label, location)) => (label.to_string(), location),
        None => (text.to_string(), text),
    };
    if label.is_empty() || location.is_empty() {
        bail!("Expected LABEL=FILE:LINE, got {:?}", text);
    }
    let location: SourceLocation = location.parse().map_err(anyhow::Error::msg)?;
    Ok((label, location))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labelled_location() {
        let (label, location) = parse_labelled_location("cache=src/cache.py:42").unwrap();
        assert_eq!(label, "cache");
        assert_eq!(location, SourceLocation::new("src/cache.py", 42));

        let (label, _) = parse_labelled_location("main.py:7").unwrap();
        assert_eq!(label, "main.py:7");

        assert!(parse_labelled_location("=main.py:7").is_err());
    }

    #[test]
    fn test_format_epoch() {
        assert_eq!(format_epoch(0.0), "1970-01-01T00:00:00+00:00");
    }
}
