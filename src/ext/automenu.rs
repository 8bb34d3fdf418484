//! Site menu generated from the node tree.
//!
//! Exposes an `automenu` template variable holding a nested `<ul>` of every
//! node. The menu is rebuilt from each freshly scanned tree (`init_tree`) and
//! shared by every page of that build.
//!
//! - The first entry links to the homepage.
//! - Siblings are ordered by `menu_order` (default 0), ties keep tree order.
//! - An entry is labelled by `menu_title`, else `title`, else the stem.
//! - Nodes with no source file of their own are left out with their subtree.
//!
//! ```html
//! <ul>
//!   <li><a href="@root/">Home</a></li>
//!   <li><a href="@root/about//">About</a>
//!     <ul><li><a href="@root/about/team//">Team</a></li></ul>
//!   </li>
//! </ul>
//! ```

use crate::hooks::{HookBus, HookId};
use crate::node::NodeRef;
use crate::value::Value;
use maud::{Markup, html};
use std::cell::RefCell;
use std::rc::Rc;

pub const KEY: &str = "automenu";

/// Registers the menu builder (`init_tree`) and the page listener
/// (`render_page`), returning their ids in that order.
pub fn register(hooks: &mut HookBus) -> [HookId; 2] {
    let menu = Rc::new(RefCell::new(String::new()));
    let current = Rc::clone(&menu);
    let builder = hooks.on_init_tree(0, move |tree| {
        *current.borrow_mut() = build_menu(tree.root());
        Ok(())
    });
    let listener = hooks.on_render_page(0, move |page| {
        page.extra
            .insert(KEY.to_string(), Value::from(menu.borrow().as_str()));
        Ok(())
    });
    [builder, listener]
}

/// Render the menu for the tree rooted at `root`.
pub fn build_menu(root: NodeRef<'_>) -> String {
    let markup = html! {
        ul {
            li { a href="@root/" { (label(root, "Home")) } }
            @for child in menu_children(root) {
                (item(child))
            }
        }
    };
    markup.into_string()
}

fn item(node: NodeRef<'_>) -> Markup {
    let children = menu_children(node);
    html! {
        li {
            a href=(node.url()) { (label(node, node.stem())) }
            @if !children.is_empty() {
                ul {
                    @for child in children {
                        (item(child))
                    }
                }
            }
        }
    }
}

fn label<'a>(node: NodeRef<'a>, fallback: &'a str) -> &'a str {
    node.get_str("menu_title")
        .or_else(|| node.get_str("title"))
        .unwrap_or(fallback)
}

fn menu_children(node: NodeRef<'_>) -> Vec<NodeRef<'_>> {
    let mut children: Vec<_> = node.children().filter(|c| c.source().is_some()).collect();
    children.sort_by_key(|c| c.get("menu_order").and_then(Value::as_i64).unwrap_or(0));
    children
}
