//! Shared test utilities for the quire test suite.
//!
//! Provides fixture setup and node lookups that panic with a listing of
//! what is available, so a failing test says what it actually found.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = write_tree(&[("about.md", "About"), ("about/team.md", "Team")]);
//! let tree = SourceTree::new(&hooks, &renderers, &FsLoader).build(tmp.path())?;
//!
//! let about = find_node(&tree, "@root/about//");
//! assert_eq!(child_slugs(about), vec!["team"]);
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::node::{NodeRef, Tree};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `(relative path, contents)` pairs into a fresh temp directory.
pub fn write_tree(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (rel, contents) in files {
        let path = tmp.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
    }
    tmp
}

// =========================================================================
// Tree lookups (panic with a listing on miss)
// =========================================================================

/// Every node url in post-order.
pub fn node_urls(tree: &Tree) -> Vec<&str> {
    tree.post_order()
        .into_iter()
        .map(|id| tree.get(id).url())
        .collect()
}

/// Find a node by virtual url. Panics if not found.
pub fn find_node<'a>(tree: &'a Tree, url: &str) -> NodeRef<'a> {
    tree.node_by_url(url).unwrap_or_else(|| {
        let urls = node_urls(tree);
        panic!("node '{url}' not found. Available: {urls:?}")
    })
}

/// Child slugs of a node, in tree order.
pub fn child_slugs<'a>(node: NodeRef<'a>) -> Vec<&'a str> {
    node.children().map(|c| c.slug()).collect()
}

/// Read a file below `root` as text. Panics with the directory listing on miss.
pub fn read_output(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap_or_else(|e| {
        let files: Vec<String> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(root).unwrap().display().to_string())
            .collect();
        panic!("cannot read '{rel}': {e}. Available: {files:?}")
    })
}
