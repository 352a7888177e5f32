//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod digest;
pub mod inspect;
pub mod models;
pub mod render;
pub mod utils;

// Re-export main command functions
pub use digest::{execute_digest, validate_digest_args};
pub use inspect::{execute_history, execute_info, execute_plot, validate_history_args};
pub use models::{DigestArgs, FlameArgs, GraphArgs, GraphFormat, HistoryArgs, PlotArgs};
pub use render::{execute_flame, execute_graph, validate_flame_args, validate_graph_args};
pub use utils::parse_labelled_location;
