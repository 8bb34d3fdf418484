//! CLI output formatting.
//!
//! `quire tree` shows the node tree, one node per line, indented by depth.
//! Each line leads with the node's identity (its virtual URL, or its slug
//! with `--slugs`) followed by the source file it was read from:
//!
//! ```text
//! @root/  (index.md)
//!     @root/about//  (about.md)
//!         @root/about/team//  (about/team.md)
//!     @root/blog//
//! ```
//!
//! Directory-only nodes have no source and show none. Requested metadata
//! attributes are appended as `  -- value`.
//!
//! `quire build` ends with a one-line summary:
//!
//! ```text
//! Rendered:    12  ·  Written:     3  ·  Time:  0.04 sec  ·  Avg: 0.0033 sec/page
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::build::BuildStats;
use crate::node::NodeRef;
use std::path::Path;

/// What `format_tree` shows per node.
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    /// Show slugs instead of URLs.
    pub slugs: bool,
    /// Metadata keys whose values are appended to each line.
    pub attrs: Vec<String>,
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Lines for the subtree at `node`. Siblings are listed by slug. Source
/// paths are shown relative to `src`.
pub fn format_tree(node: NodeRef<'_>, src: &Path, options: &TreeOptions) -> Vec<String> {
    let mut lines = Vec::new();
    tree_lines(node, src, options, 0, &mut lines);
    lines
}

fn tree_lines(
    node: NodeRef<'_>,
    src: &Path,
    options: &TreeOptions,
    depth: usize,
    lines: &mut Vec<String>,
) {
    let identity = match (options.slugs, node.is_root()) {
        (true, true) => "/",
        (true, false) => node.slug(),
        (false, _) => node.url(),
    };
    let mut line = format!("{}{identity}", indent(depth));
    if let Some(source) = node.source() {
        let shown = source.strip_prefix(src).unwrap_or(source);
        line.push_str(&format!("  ({})", shown.display()));
    }
    for attr in &options.attrs {
        let value = node.get(attr).map(|v| v.to_string()).unwrap_or_default();
        line.push_str(&format!("  -- {value}"));
    }
    lines.push(line);

    let mut children: Vec<_> = node.children().collect();
    children.sort_by_key(|c| c.slug());
    for child in children {
        tree_lines(child, src, options, depth + 1, lines);
    }
}

pub fn print_tree(node: NodeRef<'_>, src: &Path, options: &TreeOptions) {
    for line in format_tree(node, src, options) {
        println!("{line}");
    }
}

/// The end-of-build summary.
pub fn format_build_summary(stats: &BuildStats) -> Vec<String> {
    vec![format!(
        "Rendered: {:>5}  ·  Written: {:>5}  ·  Time: {:>5.2} sec  ·  Avg: {:.4} sec/page",
        stats.rendered,
        stats.written,
        stats.elapsed.as_secs_f64(),
        stats.avg_secs(),
    )]
}

pub fn print_build_summary(stats: &BuildStats) {
    for line in format_build_summary(stats) {
        println!("{line}");
    }
}
