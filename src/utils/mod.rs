//! Utility modules for configuration, error handling, and number formatting.

pub mod config;
pub mod error;
pub mod si_prefix;

// Re-export commonly used error types for convenience
pub use error::{
    ArgumentError, ConfigError, DecodeError, DigestError, FlamegraphError, GraphError, OutputError,
    ProfileError,
};
pub use si_prefix::bytes_string;
