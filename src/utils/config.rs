//! Configuration and constants for the library and CLI.

/// Sampling rate used when a caller does not supply one: allocations below
/// 128 bytes are sampled 1 in 10,000, those below 8 KiB 1 in 10, and
/// everything larger is always recorded.
pub const DEFAULT_SAMPLING_RATE: &[(u32, f64)] = &[(128, 1e-4), (8192, 0.1)];

/// Default spacing between digest snapshots, in seconds
pub const DEFAULT_DIGEST_INTERVAL_SECS: f64 = 60.0;

/// Default fraction of each snapshot that may be folded into bucket 0
pub const DEFAULT_DIGEST_PRECISION: f64 = 0.01;

/// Default graph thresholds
pub const DEFAULT_MIN_NODE_FRACTION: f64 = 0.01;
pub const DEFAULT_MIN_EDGE_FRACTION: f64 = 0.05;

/// Nodes whose local share of their cumulative usage stays under this in every
/// graph are candidates for chain collapsing
pub const COLLAPSE_LOCAL_FRACTION: f64 = 0.01;

// File extensions appended to a trace base path
pub const METADATA_EXTENSION: &str = "hpm";
pub const EVENTS_EXTENSION: &str = "hpd";
pub const DIGEST_EXTENSION: &str = "hpc";

/// Probabilities are stored as fixed64 values scaled by 2^32, so 1.0 is exact
pub const PROBABILITY_SCALE: f64 = 4_294_967_296.0;

/// A u64 never needs more than 10 varint bytes
pub const MAX_VARINT_LEN: usize = 10;

// Digest layout
pub const DIGEST_MAGIC: &[u8; 4] = b"HPDG";
pub const DIGEST_COUNT_POSITION: u64 = 20;
pub const DIGEST_FIRST_BLOCK_POSITION: u64 = 28;
pub const OFFSETS_PER_BLOCK: usize = 512;

/// How often long-running replays log progress and poll for cancellation
pub const PROGRESS_EVERY_EVENTS: usize = 10_000;

/// Current JSON report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";
