use crate::digest::DigestOptions;
use crate::flamegraph::FlamegraphConfig;
use crate::graph::CompareOptions;
use crate::trace::SourceLocation;
use std::path::PathBuf;

/// Arguments for the digest command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct DigestArgs {
    /// Trace base path (without extension)
    pub trace: PathBuf,

    /// Snapshot interval and pruning precision
    pub options: DigestOptions,

    /// Where to write the build summary as JSON (optional)
    pub summary_json: Option<PathBuf>,
}

/// Arguments for the flame command
#[derive(Debug, Clone)]
pub struct FlameArgs {
    pub trace: PathBuf,

    /// Relative time of the snapshot, in seconds
    pub at: f64,

    /// Output file; collapsed text goes to stdout when absent
    pub output: Option<PathBuf>,

    /// Render an SVG instead of collapsed stacks
    pub svg: bool,

    pub flamegraph_config: FlamegraphConfig,

    /// Print a table of the largest stacks
    pub print_summary: bool,
}

/// Output format for the graph command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Dot,
    Json,
}

/// Arguments for the graph command
#[derive(Debug, Clone)]
pub struct GraphArgs {
    pub trace: PathBuf,

    /// Relative times to compare, one graph each
    pub at: Vec<f64>,

    /// Output file; stdout when absent
    pub output: Option<PathBuf>,

    pub format: GraphFormat,

    pub options: CompareOptions,
}

/// Arguments for the history command
#[derive(Debug, Clone)]
pub struct HistoryArgs {
    pub trace: PathBuf,

    /// Seconds between slices
    pub granularity: f64,

    /// Consumers kept per slice
    pub top_n: usize,

    /// Output JSON file; stdout when absent
    pub output: Option<PathBuf>,
}

/// Arguments for the plot command
#[derive(Debug, Clone)]
pub struct PlotArgs {
    pub trace: PathBuf,

    /// Labelled source lines to follow over time
    pub lines: Vec<(String, SourceLocation)>,

    /// Output JSON file; stdout when absent
    pub output: Option<PathBuf>,
}
