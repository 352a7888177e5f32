//! SVG flame graph of a single snapshot.
//!
//! Frames are stacked with the program root at the bottom. Each frame's width
//! is its share of live bytes and its fill runs along the same blue-to-red
//! hue scale the compared graph uses, so both views read alike.

use super::collapsed::{CollapsedStack, OTHER_LABEL};
use crate::graph::presentation::node_color;
use crate::utils::error::FlamegraphError;
use crate::utils::si_prefix::bytes_string;
use log::info;
use std::collections::HashMap;
use std::fmt::Write as _;

const FRAME_HEIGHT: usize = 20;
const TITLE_MARGIN: usize = 30;
const LEGEND_HEIGHT: usize = 80;
const CHAR_WIDTH: f64 = 7.0;

/// Flame graph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    pub width: usize,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "Live Heap".to_string(),
            width: 1200,
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

/// Frame tree built from the collapsed stacks
struct Frame {
    name: String,
    bytes: u64,
    children: HashMap<String, Frame>,
}

impl Frame {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes: 0,
            children: HashMap::new(),
        }
    }

    fn insert(&mut self, path: &[&str], bytes: u64) {
        self.bytes += bytes;
        if let Some((head, tail)) = path.split_first() {
            self.children
                .entry((*head).to_string())
                .or_insert_with(|| Frame::new(*head))
                .insert(tail, bytes);
        }
    }

    fn depth(&self) -> usize {
        self.children
            .values()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Children widest first, ties by name so output is stable
    fn sorted_children(&self) -> Vec<&Frame> {
        let mut children: Vec<&Frame> = self.children.values().collect();
        children.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.name.cmp(&b.name)));
        children
    }
}

/// Render collapsed stacks as an SVG flame graph
///
/// **Public** - main entry point for flame graph rendering
///
/// # Arguments
/// * `stacks` - Resolved stacks of one snapshot
/// * `other` - Bytes with no known stack, drawn as a single `OTHER` frame
/// * `config` - Title and width, defaults when `None`
///
/// # Errors
/// * `FlamegraphError::EmptyStacks` - Nothing to draw
pub fn generate_flamegraph(
    stacks: &[CollapsedStack],
    other: u64,
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    if stacks.is_empty() && other == 0 {
        return Err(FlamegraphError::EmptyStacks);
    }

    let config = config.cloned().unwrap_or_default();
    info!("Generating flame graph with {} stacks", stacks.len());

    let mut root = Frame::new("Program Root");
    for stack in stacks {
        let path: Vec<&str> = stack.stack.split(';').collect();
        root.insert(&path, stack.weight);
    }
    if other > 0 {
        root.insert(&[OTHER_LABEL], other);
    }

    let width = config.width;
    let graph_height = (root.depth() + 1) * FRAME_HEIGHT;
    let total_height = graph_height + TITLE_MARGIN + LEGEND_HEIGHT;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{0}" height="{1}" viewBox="0 0 {0} {1}">"#,
        width, total_height
    );
    svg.push_str(
        r#"<style>.frame { font: 12px sans-serif; } .frame:hover { stroke: black; stroke-width: 1; cursor: pointer; opacity: 0.9; }</style>"#,
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="20" font-size="16" text-anchor="middle" font-weight="bold">{}</text>"#,
        width / 2,
        escape_xml(&config.title)
    );

    let canvas = Canvas {
        total: root.bytes.max(1),
        graph_height,
    };
    canvas.render(&root, 0, 0.0, width as f64, &mut svg);
    render_legend(&mut svg, graph_height + TITLE_MARGIN, width);

    svg.push_str("</svg>");
    info!("Flame graph generated ({} bytes)", svg.len());
    Ok(svg)
}

struct Canvas {
    total: u64,
    graph_height: usize,
}

impl Canvas {
    fn render(&self, frame: &Frame, level: usize, x: f64, w: f64, out: &mut String) {
        if w < 0.5 {
            return;
        }

        let fraction = frame.bytes as f64 / self.total as f64;
        let y = self.graph_height - (level + 1) * FRAME_HEIGHT + TITLE_MARGIN;
        let name = escape_xml(&frame.name);
        let _ = write!(
            out,
            r#"<rect x="{:.2}" y="{}" width="{:.2}" height="{}" fill="{}" class="frame"><title>{} ({}, {:.1}%)</title></rect>"#,
            x,
            y,
            w,
            FRAME_HEIGHT,
            node_color(fraction),
            name,
            bytes_string(frame.bytes as f64),
            100.0 * fraction
        );

        if w > 35.0 {
            let label = fit_label(&frame.name, (w / CHAR_WIDTH) as usize);
            if !label.is_empty() {
                let _ = write!(
                    out,
                    r#"<text x="{:.2}" y="{}" dx="4" dy="14" font-size="12" fill="white" pointer-events="none">{}</text>"#,
                    x,
                    y,
                    escape_xml(&label)
                );
            }
        }

        let mut child_x = x;
        for child in frame.sorted_children() {
            let child_w = child.bytes as f64 / frame.bytes.max(1) as f64 * w;
            self.render(child, level + 1, child_x, child_w, out);
            child_x += child_w;
        }
    }
}

/// Shorten to `max_chars`, keeping the end of the name where the line number is
fn fit_label(name: &str, max_chars: usize) -> String {
    let len = name.chars().count();
    if len <= max_chars {
        return name.to_string();
    }
    if max_chars <= 3 {
        return String::new();
    }
    let keep: String = name.chars().skip(len - (max_chars - 3)).collect();
    format!("...{}", keep)
}

fn render_legend(out: &mut String, top: usize, width: usize) {
    let legend_y = top + 40;
    let _ = write!(
        out,
        r#"<text x="10" y="{}" font-size="14" font-weight="bold">Share of live heap:</text>"#,
        legend_y
    );

    let steps = 10;
    let step_width = ((width.saturating_sub(200)) / steps).max(10);
    for i in 0..=steps {
        let fraction = i as f64 / steps as f64;
        let x = 160 + i * step_width;
        let _ = write!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="15" fill="{}"/>"#,
            x,
            legend_y - 12,
            step_width,
            node_color(fraction)
        );
        if i % 5 == 0 {
            let _ = write!(
                out,
                r#"<text x="{}" y="{}" font-size="12">{}%</text>"#,
                x,
                legend_y + 18,
                i * 100 / steps
            );
        }
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Plain-text table of the heaviest stacks, by allocation site
pub fn generate_text_summary(stacks: &[CollapsedStack], other: u64, max_lines: usize) -> String {
    let total: u64 = stacks.iter().map(|s| s.weight).sum::<u64>() + other;
    let total = total.max(1);

    let mut sorted: Vec<&CollapsedStack> = stacks.iter().collect();
    sorted.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.stack.cmp(&b.stack)));

    let rule = format!("  +{}+{}+{}+", "-".repeat(44), "-".repeat(14), "-".repeat(9));
    let mut lines = vec![
        "  LIVE HEAP BY ALLOCATION SITE".to_string(),
        rule.clone(),
        format!("  | {:<42} | {:^12} | {:^7} |", "Stack (largest first)", "BYTES", "%"),
        rule.clone(),
    ];

    for stack in sorted.iter().take(max_lines) {
        let percentage = stack.weight as f64 / total as f64 * 100.0;
        lines.push(format!(
            "  | {:<42} | {:>12} | {:>6.1}% |",
            fit_label(&stack.stack, 42),
            bytes_string(stack.weight as f64),
            percentage
        ));
    }
    if other > 0 {
        lines.push(format!(
            "  | {:<42} | {:>12} | {:>6.1}% |",
            OTHER_LABEL,
            bytes_string(other as f64),
            other as f64 / total as f64 * 100.0
        ));
    }
    lines.push(rule);

    if stacks.len() > max_lines {
        lines.push(String::new());
        lines.push(format!(
            "   (Showing top {} of {} stacks)",
            max_lines,
            stacks.len()
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacks() -> Vec<CollapsedStack> {
        vec![
            CollapsedStack::new("main.py:1;load.py:7".into(), 300),
            CollapsedStack::new("main.py:1;parse.py:9".into(), 100),
        ]
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(matches!(
            generate_flamegraph(&[], 0, None),
            Err(FlamegraphError::EmptyStacks)
        ));
    }

    #[test]
    fn test_svg_contains_frames() {
        let config = FlamegraphConfig::new().with_title("heap <t=3>");
        let svg = generate_flamegraph(&stacks(), 100, Some(&config)).unwrap();

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("heap &lt;t=3&gt;"));
        assert!(svg.contains("Program Root (500.0B, 100.0%)"));
        assert!(svg.contains("load.py:7 (300.0B, 60.0%)"));
        assert!(svg.contains("OTHER (100.0B, 20.0%)"));
        // The root carries the whole heap and takes the hottest colour
        assert!(svg.contains(&node_color(1.0)));
    }

    #[test]
    fn test_only_unattributed_still_draws() {
        assert!(generate_flamegraph(&[], 10, None).is_ok());
    }

    #[test]
    fn test_fit_label_keeps_tail() {
        assert_eq!(fit_label("short", 10), "short");
        assert_eq!(fit_label("averyveryverylongname.py:42", 10), "...e.py:42");
        assert_eq!(fit_label("abcdef", 3), "");
    }

    #[test]
    fn test_text_summary_orders_by_bytes() {
        let text = generate_text_summary(&stacks(), 0, 1);
        let load = text.find("load.py:7").unwrap();
        assert!(!text.contains("parse.py:9"));
        assert!(text.contains("75.0%"));
        assert!(text.contains("Showing top 1 of 2 stacks"));
        assert!(load > 0);
    }
}
