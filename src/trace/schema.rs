//! Core trace data types: source locations, call stacks and allocation events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a call stack in the metadata stream. Ids are 1-based and
/// assigned in the order stacks were first seen.
pub type TraceId = u64;

/// Reserved id for "unknown / attribution dropped"
pub const UNKNOWN_TRACE: TraceId = 0;

/// A single line of code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u64,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u64) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line != 0 {
            write!(f, "{}:{}", self.file, self.line)
        } else {
            write!(f, "{}", self.file)
        }
    }
}

impl FromStr for SourceLocation {
    type Err = String;

    /// Parse `file:line`, splitting on the last colon
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (file, line) = value
            .rsplit_once(':')
            .ok_or_else(|| format!("Expected file:line, got '{}'", value))?;
        let line = line
            .parse::<u64>()
            .map_err(|e| format!("Invalid line number in '{}': {}", value, e))?;
        Ok(Self::new(file, line))
    }
}

/// Call path at the moment of allocation, root first and allocation site last
pub type CallStack = Vec<SourceLocation>;

/// One decoded record of the event stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationEvent {
    /// Absolute time in milliseconds since the epoch
    pub timestamp_ms: u64,

    /// Stack at which the memory was allocated
    pub trace_id: TraceId,

    /// Positive for an allocation, negative for a free
    pub size: i64,

    /// Inverse sampling probability of the size class of `|size|`
    pub scale_factor: f64,
}

impl AllocationEvent {
    /// Absolute time in seconds since the epoch
    pub fn timestamp(&self) -> f64 {
        self.timestamp_ms as f64 / 1000.0
    }

    /// Unbiased estimate of the bytes this event stands for
    pub fn estimated_bytes(&self) -> i64 {
        (self.size as f64 * self.scale_factor).round() as i64
    }
}
