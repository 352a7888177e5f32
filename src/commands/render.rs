//! Flame and graph commands: render snapshots of the digest.

use super::models::{FlameArgs, GraphArgs, GraphFormat};
use super::utils::{emit, open_reader, require_digest};
use crate::flamegraph::{build_collapsed_stacks, generate_text_summary};
use crate::graph::write_dot;
use crate::output::{report_to_string, write_report, write_svg, write_with};
use anyhow::{bail, Context, Result};
use log::{debug, info};

/// Execute the flame command
///
/// **Public** - main entry point called from main.rs
///
/// Writes collapsed stacks (stdout or file) or, with `svg`, an SVG file.
pub fn execute_flame(args: &FlameArgs) -> Result<()> {
    let mut reader = open_reader(&args.trace)?;
    require_digest(&reader)?;

    let snapshot = reader.snapshot_at(args.at)?;
    info!(
        "Flame graph of snapshot at {:.1}s ({} entries)",
        snapshot.relative_time,
        snapshot.usage.len()
    );

    if args.svg {
        let svg = reader
            .flame_graph_svg(&snapshot, &args.flamegraph_config)
            .context("Failed to generate flame graph")?;
        // validate_flame_args guarantees an output path for SVG
        if let Some(path) = &args.output {
            write_svg(&svg, path).context("Failed to write flame graph SVG")?;
            info!("✓ Flame graph written to: {}", path.display());
        }
    } else {
        let mut text = Vec::new();
        reader
            .flame_graph(&snapshot, &mut text)
            .context("Failed to collapse stacks")?;
        emit(&String::from_utf8_lossy(&text), args.output.as_deref())?;
    }

    if args.print_summary {
        let (stacks, other) = build_collapsed_stacks(&snapshot, reader.trace_store())?;
        eprintln!("\n{}", generate_text_summary(&stacks, other, 10));
    }
    Ok(())
}

/// Validate flame arguments
pub fn validate_flame_args(args: &FlameArgs) -> Result<()> {
    if args.at < 0.0 || !args.at.is_finite() {
        bail!("--at must be a non-negative time in seconds");
    }
    if args.svg && args.output.is_none() {
        bail!("--svg needs --output");
    }
    if args.flamegraph_config.width < 100 {
        bail!("Flame graph width must be at least 100 pixels");
    }
    Ok(())
}

/// Execute the graph command
///
/// **Public** - main entry point called from main.rs
///
/// Builds the usage graph at each requested time, compares them and writes
/// the simplified graph as dot or JSON.
pub fn execute_graph(args: &GraphArgs) -> Result<()> {
    let mut reader = open_reader(&args.trace)?;
    require_digest(&reader)?;

    reader.warm_cache().context("Failed to decode stack metadata")?;
    let graph = reader
        .compare_at(&args.at, &args.options)
        .context("Failed to compare usage graphs")?;
    debug!(
        "Simplified graph: {} nodes, {} edges, {} merges",
        graph.nodes.len(),
        graph.edges.len(),
        graph.merge_map.len()
    );

    match (args.format, &args.output) {
        (GraphFormat::Dot, Some(path)) => {
            write_with(path, |out| write_dot(&graph, out))
                .context("Failed to write dot graph")?;
            info!("✓ Graph written to: {}", path.display());
        }
        (GraphFormat::Dot, None) => {
            let mut text = Vec::new();
            write_dot(&graph, &mut text)?;
            emit(&String::from_utf8_lossy(&text), None)?;
        }
        (GraphFormat::Json, Some(path)) => {
            write_report("graph", &graph, path).context("Failed to write graph JSON")?;
            info!("✓ Graph written to: {}", path.display());
        }
        (GraphFormat::Json, None) => {
            println!("{}", report_to_string("graph", &graph)?);
        }
    }
    Ok(())
}

/// Validate graph arguments
pub fn validate_graph_args(args: &GraphArgs) -> Result<()> {
    if args.at.is_empty() {
        bail!("At least one --at time is required");
    }
    if args.at.iter().any(|t| *t < 0.0 || !t.is_finite()) {
        bail!("--at times must be non-negative seconds");
    }
    args.options.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flamegraph::FlamegraphConfig;
    use crate::graph::CompareOptions;
    use std::path::PathBuf;

    fn graph_args(at: Vec<f64>) -> GraphArgs {
        GraphArgs {
            trace: PathBuf::from("run"),
            at,
            output: None,
            format: GraphFormat::Dot,
            options: CompareOptions::default(),
        }
    }

    #[test]
    fn test_validate_graph_args() {
        assert!(validate_graph_args(&graph_args(vec![0.0, 60.0])).is_ok());
        assert!(validate_graph_args(&graph_args(vec![])).is_err());
        assert!(validate_graph_args(&graph_args(vec![-1.0])).is_err());

        let mut args = graph_args(vec![0.0]);
        args.options.min_edge_fraction = 1.5;
        assert!(validate_graph_args(&args).is_err());
    }

    #[test]
    fn test_validate_flame_svg_needs_output() {
        let args = FlameArgs {
            trace: PathBuf::from("run"),
            at: 0.0,
            output: None,
            svg: true,
            flamegraph_config: FlamegraphConfig::default(),
            print_summary: false,
        };
        assert!(validate_flame_args(&args).is_err());
        assert!(validate_flame_args(&FlameArgs { svg: false, ..args }).is_ok());
    }
}
