//! Graphviz dot rendering of a [`SimplifiedGraph`].
//!
//! Each node is an HTML-like table: one row per fused source line, then one
//! cell per compared graph reading `local / cumulative = pct%`, coloured by
//! cumulative fraction. Edges are labelled with their per-graph weights.

use super::compare::{GraphNode, SimplifiedGraph};
use crate::utils::si_prefix::bytes_string;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Write `graph` as a dot digraph
pub fn write_dot<W: Write>(graph: &SimplifiedGraph, out: &mut W) -> io::Result<()> {
    writeln!(out, "digraph {{")?;
    writeln!(out, "  node [shape=none margin=0]")?;

    for node in &graph.nodes {
        writeln!(
            out,
            "  n{} [fontsize={} label={}]",
            node.id,
            graph.font_size(node),
            node_label(graph, node)
        )?;
    }

    for edge in &graph.edges {
        let label: Vec<String> = edge
            .weights
            .iter()
            .map(|&weight| bytes_string(weight as f64))
            .collect();
        writeln!(
            out,
            "  n{} -> n{} [color=\"{}\" label=\"{}\"];",
            edge.source,
            edge.target,
            graph.edge_color(edge),
            label.join(" / ")
        )?;
    }

    writeln!(out, "}}")
}

/// Dot HTML label. Filenames are the only text not generated here, so they
/// are the only text escaped.
fn node_label(graph: &SimplifiedGraph, node: &GraphNode) -> String {
    let columns = node.sizes.len().max(1);
    let mut label = String::from("< <table border=\"1\" cellborder=\"0\" cellspacing=\"0\">");

    for location in &node.labels {
        let file = escape_html(&location.file);
        let text = if location.line != 0 {
            format!("{}:{}", file, location.line)
        } else {
            file
        };
        let _ = write!(
            label,
            "<tr><td colspan=\"{}\" bgcolor=\"white\">{}</td></tr>",
            columns, text
        );
    }

    label.push_str("<tr>");
    let fractions = graph.cumulative_fractions(node);
    for ((size, fraction), color) in node
        .sizes
        .iter()
        .zip(&fractions)
        .zip(graph.node_colors(node))
    {
        let _ = write!(
            label,
            "<td color=\"white\" bgcolor=\"{}\" cellspacing=\"4\">{} / {} = {:2}%</td>",
            color,
            bytes_string(size.local as f64),
            bytes_string(size.cumulative as f64),
            (100.0 * fraction) as u32
        );
    }
    label.push_str("</tr></table> >");
    label
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
