//! Breadcrumb trails.
//!
//! Once the tree is frozen, every node except the root gets a `crumbs`
//! metadata map with two parallel lists running from the top-level ancestor
//! down to the node itself:
//!
//! ```text
//! crumbs:
//!   names: [About, Team]
//!   links: ['<a href="@root/about//">About</a>', '<a href="@root/about/team//">Team</a>']
//! ```
//!
//! A crumb is named by the node's `title`, else its stem. Links use virtual
//! URLs, resolved when the page is written.

use crate::hooks::{HookBus, HookId};
use crate::node::{NodeId, NodeRef, Tree};
use crate::value::Value;
use std::collections::BTreeMap;

pub const KEY: &str = "crumbs";

pub fn register(hooks: &mut HookBus) -> HookId {
    hooks.on_init_tree(0, |tree| {
        add_crumbs(tree);
        Ok(())
    })
}

/// Set `crumbs` on every non-root node of `tree`.
pub fn add_crumbs(tree: &mut Tree) {
    let crumbs: Vec<(NodeId, Value)> = tree
        .ids()
        .map(|id| tree.get(id))
        .filter(|node| !node.is_root())
        .map(|node| (node.id(), trail(node)))
        .collect();
    for (id, value) in crumbs {
        tree.set(id, KEY, value);
    }
}

fn trail(node: NodeRef<'_>) -> Value {
    let mut names = Vec::new();
    let mut links = Vec::new();
    for crumb in node.ancestors_inclusive().filter(|n| !n.is_root()) {
        let name = crumb.get_str("title").unwrap_or(crumb.stem()).to_string();
        links.push(format!(r#"<a href="{}">{name}</a>"#, crumb.url()));
        names.push(name);
    }
    names.reverse();
    links.reverse();

    BTreeMap::from([
        ("names".to_string(), Value::from(names)),
        ("links".to_string(), Value::from(links)),
    ])
    .into()
}
