//! heapflow CLI
//!
//! Digests sampled heap traces and renders what the heap looked like over
//! time: flame graphs, compared usage graphs, top-N histories and plots.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use heapflow::commands::{
    execute_digest, execute_flame, execute_graph, execute_history, execute_info, execute_plot,
    parse_labelled_location, validate_digest_args, validate_flame_args, validate_graph_args,
    validate_history_args, DigestArgs, FlameArgs, GraphArgs, GraphFormat, HistoryArgs, PlotArgs,
};
use heapflow::digest::DigestOptions;
use heapflow::flamegraph::FlamegraphConfig;
use heapflow::graph::CompareOptions;
use heapflow::utils::config::{
    DEFAULT_DIGEST_INTERVAL_SECS, DEFAULT_DIGEST_PRECISION, DEFAULT_MIN_EDGE_FRACTION,
    DEFAULT_MIN_NODE_FRACTION, SCHEMA_VERSION,
};

/// Raised by SIGINT; the digest builder stops at its next snapshot boundary
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// heapflow - heap allocation trace analysis
#[derive(Parser, Debug)]
#[command(name = "heapflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Dot,
    Json,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Build (or rebuild) the snapshot digest of a trace
    Digest {
        /// Trace base path, without the .hpm/.hpd extension
        trace: PathBuf,

        /// Seconds between snapshots
        #[arg(short, long, default_value_t = DEFAULT_DIGEST_INTERVAL_SECS)]
        interval: f64,

        /// Fraction of each snapshot that may be folded into the unknown bucket
        #[arg(short, long, default_value_t = DEFAULT_DIGEST_PRECISION)]
        precision: f64,

        /// Write the build summary as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Show the time span, sampling rate and digest of a trace
    Info {
        trace: PathBuf,
    },

    /// Flame graph of the snapshot at a given time
    Flame {
        trace: PathBuf,

        /// Relative time in seconds
        #[arg(long, default_value_t = 0.0)]
        at: f64,

        /// Output path; collapsed stacks go to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render an SVG instead of collapsed stacks
        #[arg(long)]
        svg: bool,

        /// SVG title
        #[arg(long)]
        title: Option<String>,

        /// SVG width in pixels
        #[arg(long, default_value = "1200")]
        width: usize,

        /// Print a table of the largest stacks to stderr
        #[arg(long)]
        summary: bool,
    },

    /// Compare usage graphs at one or more times
    Graph {
        trace: PathBuf,

        /// Relative times in seconds; repeat to compare
        #[arg(long = "at", required = true)]
        at: Vec<f64>,

        /// Output path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = FormatArg::Dot)]
        format: FormatArg,

        /// Minimum cumulative fraction for a node to be shown
        #[arg(long, default_value_t = DEFAULT_MIN_NODE_FRACTION)]
        min_node: f64,

        /// Minimum fraction of its source's usage for an edge to be shown
        #[arg(long, default_value_t = DEFAULT_MIN_EDGE_FRACTION)]
        min_edge: f64,

        /// Keep chains of pass-through nodes separate
        #[arg(long)]
        no_collapse: bool,

        /// Draw every node at the minimum font size
        #[arg(long)]
        uniform_size: bool,
    },

    /// Top consumers over time, replayed from the raw events
    History {
        trace: PathBuf,

        /// Seconds between slices
        #[arg(short, long, default_value_t = DEFAULT_DIGEST_INTERVAL_SECS)]
        granularity: f64,

        /// Consumers kept per slice
        #[arg(short = 'n', long, default_value = "10")]
        top_n: usize,

        /// Output JSON path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Total usage and usage at chosen lines for every snapshot
    Plot {
        trace: PathBuf,

        /// LABEL=FILE:LINE to follow; repeatable
        #[arg(long = "line")]
        lines: Vec<String>,

        /// Output JSON path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Digest {
            trace,
            interval,
            precision,
            summary_json,
        } => {
            let args = DigestArgs {
                trace,
                options: DigestOptions {
                    interval,
                    precision,
                },
                summary_json,
            };
            validate_digest_args(&args)?;

            install_interrupt_handler();
            execute_digest(&args, Some(&INTERRUPTED))?;
        }

        Commands::Info { trace } => execute_info(&trace)?,

        Commands::Flame {
            trace,
            at,
            output,
            svg,
            title,
            width,
            summary,
        } => {
            let mut config = FlamegraphConfig::new().with_width(width);
            if let Some(title) = title {
                config = config.with_title(title);
            }
            let args = FlameArgs {
                trace,
                at,
                output,
                svg,
                flamegraph_config: config,
                print_summary: summary,
            };
            validate_flame_args(&args)?;
            execute_flame(&args)?;
        }

        Commands::Graph {
            trace,
            at,
            output,
            format,
            min_node,
            min_edge,
            no_collapse,
            uniform_size,
        } => {
            let args = GraphArgs {
                trace,
                at,
                output,
                format: match format {
                    FormatArg::Dot => GraphFormat::Dot,
                    FormatArg::Json => GraphFormat::Json,
                },
                options: CompareOptions {
                    min_node_fraction: min_node,
                    min_edge_fraction: min_edge,
                    collapse: !no_collapse,
                    size_by_local_usage: !uniform_size,
                },
            };
            validate_graph_args(&args)?;
            execute_graph(&args)?;
        }

        Commands::History {
            trace,
            granularity,
            top_n,
            output,
        } => {
            let args = HistoryArgs {
                trace,
                granularity,
                top_n,
                output,
            };
            validate_history_args(&args)?;
            execute_history(&args)?;
        }

        Commands::Plot {
            trace,
            lines,
            output,
        } => {
            let lines = lines
                .iter()
                .map(|line| parse_labelled_location(line))
                .collect::<Result<Vec<_>>>()?;
            execute_plot(&PlotArgs {
                trace,
                lines,
                output,
            })?;
        }

        Commands::Version => display_version(),
    }

    Ok(())
}

/// Display version information
///
/// **Private** - internal command implementation
fn display_version() {
    println!("heapflow v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Digesting, graphing and comparing sampled heap allocation traces.");
}

#[cfg(unix)]
extern "C" fn on_interrupt(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT to the cancel flag so an interrupted digest stays readable
#[cfg(unix)]
fn install_interrupt_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = on_interrupt as extern "C" fn(libc::c_int) as usize;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut());
    }
}

#[cfg(not(unix))]
fn install_interrupt_handler() {
    // Without a handler, an interrupt kills the process; committed snapshots survive.
    let _ = INTERRUPTED.load(Ordering::SeqCst);
}
