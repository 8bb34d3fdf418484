//! The content node tree.
//!
//! Every page of the site is a node. A node is merged from a source file
//! (which supplies text and metadata) and/or a source directory (which
//! supplies children). Nodes live in an arena owned by [`Tree`] and are
//! addressed by [`NodeId`]; [`NodeRef`] is a cheap read-only view that can
//! walk to parents and children.
//!
//! ## Derived fields
//!
//! `slug`, `path` and `url` are computed once by the scanner after the whole
//! tree has been assembled and every node's metadata is final. A `slug`
//! metadata value overrides the slugified stem.
//!
//! The rendered content (`html`) is derived too, but lazily: the page
//! pipeline fills it the first time a node's text is rendered and every later
//! reader, such as a parent page listing its children, gets the cached copy.
//!
//! ```text
//! node                    slug     path             url
//! root                    ""       []               @root/
//! about.md                about    [about]          @root/about//
//! about/team.md           team     [about, team]    @root/about/team//
//! ```

use crate::value::{Metadata, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

/// Prefix of every virtual URL.
pub const ROOT_URL: &str = "@root/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Storage for a single node.
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub meta: Metadata,
    /// Raw text from the content file, after `file_text` filtering.
    pub text: String,
    /// Extension of the content file, selecting its renderer.
    pub ext: String,
    /// Source stem: the file or directory name the node was created from.
    pub stem: String,
    /// File that supplied text and metadata.
    pub source: Option<PathBuf>,
    /// Directory that supplied children.
    pub dir: Option<PathBuf>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) slug: String,
    pub(crate) path: Vec<String>,
    pub(crate) url: String,
    /// Rendered content, set at most once.
    pub(crate) html: OnceCell<String>,
}

/// Arena of nodes. Index 0 is always the root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// A tree holding only a bare root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                url: ROOT_URL.to_string(),
                ..NodeData::default()
            }],
        }
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.get(self.root_id())
    }

    pub fn get(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a bare child under `parent`. Children keep insertion order.
    pub fn add_child(&mut self, parent: NodeId, stem: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            stem: stem.to_string(),
            parent: Some(parent),
            ..NodeData::default()
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    /// Set one metadata value on a node.
    pub fn set(&mut self, id: NodeId, key: &str, value: impl Into<Value>) {
        self.nodes[id.0].meta.insert(key.to_string(), value.into());
    }

    /// Every node id in creation order. Parents always precede children.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Every node id in post-order: descendants before ancestors.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.collect_post_order(self.root_id(), &mut order);
        order
    }

    fn collect_post_order(&self, id: NodeId, order: &mut Vec<NodeId>) {
        for &child in &self.nodes[id.0].children {
            self.collect_post_order(child, order);
        }
        order.push(id);
    }

    /// Resolve a virtual URL such as `@root/about/team//` to its node.
    pub fn node_by_url(&self, url: &str) -> Option<NodeRef<'_>> {
        let rest = url.strip_prefix(ROOT_URL)?;
        rest.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self.root(), |node, slug| node.child(slug))
    }
}

/// Borrowed view of one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("url", &self.url())
            .finish()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    fn data(&self) -> &'a NodeData {
        &self.tree.nodes[self.id.0]
    }

    pub fn meta(&self) -> &'a Metadata {
        &self.data().meta
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.data().meta.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data().meta.contains_key(key)
    }

    /// First value for `key` found on this node or its nearest ancestor.
    pub fn inherit(&self, key: &str) -> Option<&'a Value> {
        self.ancestors_inclusive().find_map(|node| node.get(key))
    }

    pub fn text(&self) -> &'a str {
        &self.data().text
    }

    pub fn ext(&self) -> &'a str {
        &self.data().ext
    }

    pub fn stem(&self) -> &'a str {
        &self.data().stem
    }

    pub fn source(&self) -> Option<&'a Path> {
        self.data().source.as_deref()
    }

    pub fn slug(&self) -> &'a str {
        &self.data().slug
    }

    /// Ancestor slugs, root excluded, ending with this node's own slug.
    pub fn path(&self) -> &'a [String] {
        &self.data().path
    }

    /// Virtual URL, e.g. `@root/about/team//`.
    pub fn url(&self) -> &'a str {
        &self.data().url
    }

    /// Rendered content, if the page pipeline has rendered this node yet.
    pub fn html(&self) -> Option<&'a str> {
        self.data().html.get().map(String::as_str)
    }

    /// Store the rendered content. The first value stored wins and is
    /// returned.
    pub(crate) fn cache_html(&self, html: String) -> &'a str {
        self.data().html.get_or_init(|| html)
    }

    pub fn is_root(&self) -> bool {
        self.data().parent.is_none()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.data().parent.map(|id| self.tree.get(id))
    }

    pub fn children(&self) -> impl ExactSizeIterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.data().children.iter().map(move |&id| tree.get(id))
    }

    pub fn has_children(&self) -> bool {
        !self.data().children.is_empty()
    }

    /// The child with the given slug.
    pub fn child(&self, slug: &str) -> Option<NodeRef<'a>> {
        self.children().find(|c| c.slug() == slug)
    }

    /// This node, then its parent, up to the root.
    pub fn ancestors_inclusive(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        std::iter::successors(Some(*self), |node| node.parent())
    }

    /// Visit every node of this subtree in post-order: each descendant is
    /// visited before its ancestors, this node last.
    pub fn walk<E>(&self, visit: &mut impl FnMut(NodeRef<'a>) -> Result<(), E>) -> Result<(), E> {
        for child in self.children() {
            child.walk(visit)?;
        }
        visit(*self)
    }

    /// Serializable view without children, used for child listings.
    pub fn summary(&self) -> NodeSummary<'a> {
        NodeSummary(*self)
    }
}

const FIXED_KEYS: [&str; 9] = [
    "slug",
    "url",
    "path",
    "stem",
    "ext",
    "html",
    "is_root",
    "has_children",
    "children",
];

/// Writes metadata first (so templates see `node.title`) and then the fixed
/// fields, which take precedence over same-named metadata. `html` is only
/// written once the node has been rendered.
fn serialize_node<S: Serializer>(
    node: &NodeRef<'_>,
    with_children: bool,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(None)?;
    for (key, value) in node.meta() {
        if !FIXED_KEYS.contains(&key.as_str()) {
            map.serialize_entry(key, value)?;
        }
    }
    map.serialize_entry("slug", node.slug())?;
    map.serialize_entry("url", node.url())?;
    map.serialize_entry("path", node.path())?;
    map.serialize_entry("stem", node.stem())?;
    map.serialize_entry("is_root", &node.is_root())?;
    map.serialize_entry("has_children", &node.has_children())?;
    if with_children {
        let children: Vec<NodeSummary<'_>> = node.children().map(|c| c.summary()).collect();
        map.serialize_entry("children", &children)?;
    }
    map.end()
}

impl Serialize for NodeRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_node(self, true, serializer)
    }
}

/// A node serialized without its children.
#[derive(Debug, Clone, Copy)]
pub struct NodeSummary<'a>(NodeRef<'a>);

impl Serialize for NodeSummary<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_node(&self.0, false, serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root ─┬─ blog ─┬─ post-1
    ///       │        └─ post-2
    ///       └─ about
    fn sample() -> Tree {
        let mut tree = Tree::new();
        let root = tree.root_id();
        let blog = tree.add_child(root, "blog");
        let post1 = tree.add_child(blog, "post-1");
        let post2 = tree.add_child(blog, "post-2");
        let about = tree.add_child(root, "about");
        for (id, path) in [
            (blog, vec!["blog"]),
            (post1, vec!["blog", "post-1"]),
            (post2, vec!["blog", "post-2"]),
            (about, vec!["about"]),
        ] {
            let data = tree.data_mut(id);
            data.slug = path.last().unwrap().to_string();
            data.url = format!("{ROOT_URL}{}//", path.join("/"));
            data.path = path.into_iter().map(String::from).collect();
        }
        tree
    }

    fn url_of(tree: &Tree, id: NodeId) -> String {
        tree.get(id).url().to_string()
    }

    #[test]
    fn walk_is_post_order_and_visits_every_node_once() {
        let tree = sample();
        let mut seen = Vec::new();
        tree.root()
            .walk(&mut |node| {
                seen.push(node.url().to_string());
                Ok::<_, ()>(())
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![
                "@root/blog/post-1//",
                "@root/blog/post-2//",
                "@root/blog//",
                "@root/about//",
                "@root/",
            ]
        );
        assert_eq!(seen.len(), tree.len());
    }

    #[test]
    fn every_descendant_precedes_its_ancestors() {
        let tree = sample();
        let order = tree.post_order();
        let position = |id: NodeId| order.iter().position(|&x| x == id).unwrap();

        for id in tree.ids() {
            for ancestor in tree.get(id).ancestors_inclusive().skip(1) {
                assert!(position(id) < position(ancestor.id()));
            }
        }
    }

    #[test]
    fn walk_stops_at_first_error() {
        let tree = sample();
        let mut visits = 0;
        let result = tree.root().walk(&mut |node| {
            visits += 1;
            if node.slug() == "post-2" {
                Err("stop")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(visits, 2);
    }

    #[test]
    fn inherit_walks_up_ancestors() {
        let mut tree = sample();
        let root = tree.root_id();
        tree.set(root, "sort", "date");
        let post = tree.node_by_url("@root/blog/post-1//").unwrap().id();

        let node = tree.get(post);
        assert_eq!(node.inherit("sort"), Some(&Value::from("date")));
        assert_eq!(node.get("sort"), None);
        assert_eq!(node.inherit("missing"), None);
    }

    #[test]
    fn inherit_prefers_nearest_value() {
        let mut tree = sample();
        let root = tree.root_id();
        tree.set(root, "sort", "date");
        let blog = tree.root().child("blog").unwrap().id();
        tree.set(blog, "sort", "title");

        let post = tree.node_by_url("@root/blog/post-2//").unwrap();
        assert_eq!(post.inherit("sort").and_then(Value::as_str), Some("title"));
    }

    #[test]
    fn node_by_url_resolves_paths() {
        let tree = sample();
        assert!(tree.node_by_url("@root/").unwrap().is_root());
        assert_eq!(
            tree.node_by_url("@root/blog/post-2//").unwrap().stem(),
            "post-2"
        );
        assert_eq!(tree.node_by_url("@root/blog").unwrap().slug(), "blog");
        assert!(tree.node_by_url("@root/nope//").is_none());
        assert!(tree.node_by_url("blog//").is_none());
    }

    #[test]
    fn children_keep_insertion_order() {
        let tree = sample();
        let slugs: Vec<_> = tree.root().children().map(|c| c.slug()).collect();
        assert_eq!(slugs, vec!["blog", "about"]);
        assert!(tree.root().has_children());
        assert!(!tree.root().child("about").unwrap().has_children());
    }

    #[test]
    fn parent_links() {
        let tree = sample();
        let post = tree.node_by_url("@root/blog/post-1//").unwrap();
        assert_eq!(url_of(&tree, post.parent().unwrap().id()), "@root/blog//");
        assert!(tree.root().parent().is_none());
    }

    #[test]
    fn serializes_metadata_and_fixed_fields() {
        let mut tree = sample();
        let about = tree.root().child("about").unwrap().id();
        tree.set(about, "title", "About");
        tree.set(about, "url", "https://override.example");

        let json = serde_json::to_value(tree.get(about)).unwrap();
        assert_eq!(json["title"], "About");
        assert_eq!(json["url"], "@root/about//");
        assert_eq!(json["path"], serde_json::json!(["about"]));
        assert_eq!(json["children"], serde_json::json!([]));
    }

    #[test]
    fn html_is_cached_once_and_serialized() {
        let mut tree = sample();
        let about = tree.root().child("about").unwrap().id();
        tree.set(about, "html", "from metadata");

        let node = tree.get(about);
        assert_eq!(node.html(), None);
        assert!(serde_json::to_value(node).unwrap().get("html").is_none());

        assert_eq!(node.cache_html("<p>first</p>".into()), "<p>first</p>");
        assert_eq!(node.cache_html("<p>second</p>".into()), "<p>first</p>");
        assert_eq!(node.html(), Some("<p>first</p>"));

        let json = serde_json::to_value(tree.root()).unwrap();
        assert_eq!(json["children"][1]["html"], "<p>first</p>");
    }

    #[test]
    fn serialized_children_are_shallow() {
        let tree = sample();
        let json = serde_json::to_value(tree.root()).unwrap();
        let blog = &json["children"][0];
        assert_eq!(blog["slug"], "blog");
        assert_eq!(blog["has_children"], true);
        assert!(blog.get("children").is_none());
    }
}
