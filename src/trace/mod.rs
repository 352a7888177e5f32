//! Decoding of the two trace streams written by the allocation sampler.
//!
//! This module handles:
//! - Trace data types (locations, stacks, events)
//! - The sampling model and scale factors
//! - The metadata stream and lazily-decoded stack store
//! - The event stream
//! - Encoders for both streams

pub mod events;
pub mod metadata;
pub mod sampling;
pub mod schema;
pub mod writer;

pub use events::EventReader;
pub use metadata::{MetadataHeader, StackResolver, TraceStore};
pub use sampling::{SamplingConfig, SamplingRange};
pub use schema::{AllocationEvent, CallStack, SourceLocation, TraceId, UNKNOWN_TRACE};
pub use writer::{EventWriter, MetadataWriter};
