//! Collapsed-stack text for flame graph viewers.
//!
//! Format: one `caller;callee;... bytes` line per stack, frames written as
//! `file:line`, followed by `OTHER bytes` for memory with no known stack.
//!
//! Example: "main.py:10;parser.py:88 4096"

use crate::digest::Snapshot;
use crate::trace::StackResolver;
use crate::utils::error::GraphError;
use log::debug;
use std::io::{self, Write};

/// Label used for bytes whose stack is unknown
pub const OTHER_LABEL: &str = "OTHER";

/// A single collapsed stack entry
///
/// **Public** - used by the flame graph generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedStack {
    /// Frames joined with `;`, root first
    pub stack: String,

    /// Live bytes under this stack
    pub weight: u64,
}

impl CollapsedStack {
    pub fn new(stack: String, weight: u64) -> Self {
        Self { stack, weight }
    }

    /// The allocation site (last frame)
    pub fn leaf(&self) -> &str {
        self.stack.rsplit(';').next().unwrap_or(&self.stack)
    }
}

/// Collapsed stacks of a snapshot, in trace id order
///
/// **Public** - main entry point for collapsed output
///
/// # Returns
/// The resolved stacks and the bytes that could not be attributed
pub fn build_collapsed_stacks<S>(
    snapshot: &Snapshot,
    resolver: &mut S,
) -> Result<(Vec<CollapsedStack>, u64), GraphError>
where
    S: StackResolver + ?Sized,
{
    let mut stacks = Vec::with_capacity(snapshot.usage.len());
    let mut other = 0u64;

    for (&trace_id, &bytes) in &snapshot.usage {
        match resolver.resolve(trace_id)? {
            Some(frames) if !frames.is_empty() => {
                let stack = frames
                    .iter()
                    .map(|frame| format!("{}:{}", frame.file, frame.line))
                    .collect::<Vec<_>>()
                    .join(";");
                stacks.push(CollapsedStack::new(stack, bytes));
            }
            _ => other += bytes,
        }
    }

    debug!(
        "Collapsed {} stacks, {} bytes unattributed",
        stacks.len(),
        other
    );
    Ok((stacks, other))
}

/// Write collapsed stacks followed by the `OTHER` line if anything is unattributed
pub fn write_collapsed<W: Write>(
    stacks: &[CollapsedStack],
    other: u64,
    out: &mut W,
) -> io::Result<()> {
    for stack in stacks {
        writeln!(out, "{} {}", stack.stack, stack.weight)?;
    }
    if other > 0 {
        writeln!(out, "{} {}", OTHER_LABEL, other)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{CallStack, SourceLocation, TraceId};
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_collapsed_text() {
        let mut stacks: HashMap<TraceId, CallStack> = HashMap::new();
        stacks.insert(
            1,
            vec![SourceLocation::new("main.py", 10), SourceLocation::new("parser.py", 88)],
        );
        stacks.insert(2, vec![SourceLocation::new("main.py", 12)]);
        let snapshot = Snapshot {
            relative_time: 0.0,
            usage: BTreeMap::from([(0, 7), (1, 4096), (2, 100), (5, 3)]),
        };

        let (collapsed, other) = build_collapsed_stacks(&snapshot, &mut stacks).unwrap();
        assert_eq!(other, 10);
        assert_eq!(collapsed[0].leaf(), "parser.py:88");

        let mut out = Vec::new();
        write_collapsed(&collapsed, other, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "main.py:10;parser.py:88 4096\nmain.py:12 100\nOTHER 10\n"
        );
    }

    #[test]
    fn test_no_other_line_when_fully_resolved() {
        let mut out = Vec::new();
        write_collapsed(&[CollapsedStack::new("a:1".into(), 5)], 0, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a:1 5\n");
    }
}
