//! Error types for the entire library.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while decoding the metadata, event or digest streams
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The stream ended in the middle of a record. A clean end-of-stream at a
    /// record boundary is never reported through this variant.
    #[error("Stream ended in the middle of {context}")]
    TruncatedRead { context: &'static str },

    #[error("Varint longer than 10 bytes")]
    VarintOverflow,

    #[error("Sampled event of size {size} falls in a size class with probability 0")]
    UnsampledSize { size: i64 },

    #[error("Bad metadata header: {0}")]
    InvalidHeader(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building a sampling configuration
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid sampling configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised for numeric parameters outside their valid range
#[derive(Error, Debug, PartialEq)]
pub enum ArgumentError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors that can occur while building or reading a digest
#[derive(Error, Debug)]
pub enum DigestError {
    /// The digest is missing or does not parse. Callers may rebuild it.
    #[error("Digest unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error("Failed to decode trace: {0}")]
    Decode(#[from] DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while building or comparing usage graphs
#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error("Failed to resolve stack: {0}")]
    Decode(#[from] DecodeError),
}

/// Errors that can occur during flame graph rendering
#[derive(Error, Debug)]
pub enum FlamegraphError {
    #[error("Snapshot has no resolved stacks to draw")]
    EmptyStacks,
}

/// Errors from the profile reader's composite queries, which touch the
/// digest, the stack store and the graph code in one call
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error(transparent)]
    Digest(#[from] DigestError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Flamegraph(#[from] FlamegraphError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error("Failed to decode trace: {0}")]
    Decode(#[from] DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

impl ArgumentError {
    /// Shorthand used by the range checks scattered across the crate.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        ArgumentError::InvalidArgument(message.into())
    }
}

/// Check that `value` lies in `[0, 1]`
pub(crate) fn check_fraction(name: &str, value: f64) -> Result<(), ArgumentError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ArgumentError::new(format!(
            "{} must be in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
