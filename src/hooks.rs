//! Ordered event and filter hooks.
//!
//! Extensions cooperate through a [`HookBus`]: they register callbacks on
//! named hooks and the build fires those hooks at fixed points. There are two
//! kinds of hook:
//!
//! - **Filters** thread a value through every callback. Each callback gets the
//!   current value plus hook-specific arguments and returns the value handed
//!   to the next callback. With no callbacks a filter is the identity.
//! - **Events** call every callback with the same (possibly mutable)
//!   arguments and collect nothing.
//!
//! ## Ordering
//!
//! Callbacks on one hook run sorted by ascending order key, then by
//! registration sequence. Extensions depend on this: front matter must be
//! stripped by a `file_text` callback before anything else reads the text.
//!
//! ## Hook catalogue
//!
//! | Hook | Kind | Signature |
//! |------|------|-----------|
//! | `file_text` | filter | `(String, &mut Metadata) -> String` |
//! | `node_text`, `node_html` | filter | `(String, NodeRef) -> String` |
//! | `page_html` | filter | `(String, &PageContext) -> String` |
//! | `slug_list`, `template_list`, `class_list` | filter | `(Vec<String>, NodeRef) -> Vec<String>` |
//! | `output_path` | filter | `(PathBuf, NodeRef) -> PathBuf` |
//! | `load_node_dir`, `load_node_file` | filter | `(bool, &Path) -> bool` |
//! | `slugify` | filter | `(String, &str) -> String` |
//! | `init_build` | event | `(&SiteConfig)` |
//! | `init_tree` | event | `(&mut Tree)` |
//! | `render_page` | event | `(&mut PageContext)` |
//! | `exit_build` | event | `(&BuildStats)` |
//! | custom | event | `(&mut Value)` |
//!
//! Hook names are a closed enum so a misspelt hook is a compile error.
//! [`Hook::Custom`] is the escape hatch for extension-to-extension events.
//!
//! ## Failures
//!
//! A callback error is never swallowed: it is wrapped in a [`HookError`]
//! naming the hook and returned to the caller, which aborts the build.

use crate::build::BuildStats;
use crate::config::SiteConfig;
use crate::generate::PageContext;
use crate::node::{NodeRef, Tree};
use crate::value::{Metadata, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type returned by hook callbacks and pluggable collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by hook callbacks.
pub type HookResult<T> = Result<T, BoxError>;

#[derive(Error, Debug)]
#[error("'{hook}' callback failed")]
pub struct HookError {
    pub hook: Hook,
    #[source]
    pub source: BoxError,
}

/// Identity of one registration, used for deregistration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Hook {
    FileText,
    NodeText,
    NodeHtml,
    PageHtml,
    SlugList,
    TemplateList,
    ClassList,
    OutputPath,
    LoadNodeDir,
    LoadNodeFile,
    Slugify,
    InitBuild,
    InitTree,
    RenderPage,
    ExitBuild,
    Custom(String),
}

impl Hook {
    pub fn name(&self) -> &str {
        match self {
            Hook::FileText => "file_text",
            Hook::NodeText => "node_text",
            Hook::NodeHtml => "node_html",
            Hook::PageHtml => "page_html",
            Hook::SlugList => "slug_list",
            Hook::TemplateList => "template_list",
            Hook::ClassList => "class_list",
            Hook::OutputPath => "output_path",
            Hook::LoadNodeDir => "load_node_dir",
            Hook::LoadNodeFile => "load_node_file",
            Hook::Slugify => "slugify",
            Hook::InitBuild => "init_build",
            Hook::InitTree => "init_tree",
            Hook::RenderPage => "render_page",
            Hook::ExitBuild => "exit_build",
            Hook::Custom(name) => name,
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filters over a node's text content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFilter {
    /// Raw text, before the renderer runs.
    NodeText,
    /// Rendered HTML, before the template runs.
    NodeHtml,
}

/// Filters over the per-node name lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    SlugList,
    TemplateList,
    ClassList,
}

/// Filters deciding whether a source entry is loaded at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    LoadNodeDir,
    LoadNodeFile,
}

impl From<TextFilter> for Hook {
    fn from(f: TextFilter) -> Self {
        match f {
            TextFilter::NodeText => Hook::NodeText,
            TextFilter::NodeHtml => Hook::NodeHtml,
        }
    }
}

impl From<ListFilter> for Hook {
    fn from(f: ListFilter) -> Self {
        match f {
            ListFilter::SlugList => Hook::SlugList,
            ListFilter::TemplateList => Hook::TemplateList,
            ListFilter::ClassList => Hook::ClassList,
        }
    }
}

impl From<EntryFilter> for Hook {
    fn from(f: EntryFilter) -> Self {
        match f {
            EntryFilter::LoadNodeDir => Hook::LoadNodeDir,
            EntryFilter::LoadNodeFile => Hook::LoadNodeFile,
        }
    }
}

pub type FileTextFn = dyn Fn(String, &mut Metadata) -> HookResult<String>;
pub type NodeFilterFn<T> = dyn Fn(T, NodeRef<'_>) -> HookResult<T>;
pub type PageHtmlFn = dyn Fn(String, &PageContext<'_>) -> HookResult<String>;
pub type EntryFn = dyn Fn(bool, &Path) -> HookResult<bool>;
pub type SlugifyFn = dyn Fn(String, &str) -> HookResult<String>;
pub type InitBuildFn = dyn Fn(&SiteConfig) -> HookResult<()>;
pub type InitTreeFn = dyn Fn(&mut Tree) -> HookResult<()>;
pub type RenderPageFn = dyn Fn(&mut PageContext<'_>) -> HookResult<()>;
pub type ExitBuildFn = dyn Fn(&BuildStats) -> HookResult<()>;
pub type CustomFn = dyn Fn(&mut Value) -> HookResult<()>;

struct Entry<F: ?Sized> {
    id: HookId,
    order: i32,
    callback: Box<F>,
}

/// Callbacks for a single hook, kept sorted by `(order, registration)`.
pub struct Registry<F: ?Sized> {
    entries: Vec<Entry<F>>,
}

impl<F: ?Sized> Default for Registry<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> Registry<F> {
    /// Insert after every entry with an order key `<= order`. Ids increase
    /// monotonically, so this keeps registration order within one key.
    fn insert(&mut self, id: HookId, order: i32, callback: Box<F>) {
        let pos = self.entries.partition_point(|e| e.order <= order);
        self.entries.insert(
            pos,
            Entry {
                id,
                order,
                callback,
            },
        );
    }

    fn remove(&mut self, id: HookId, order: Option<i32>) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.id == id && order.is_none_or(|o| o == e.order)));
        self.entries.len() != before
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn callbacks(&self) -> impl Iterator<Item = &F> {
        self.entries.iter().map(|e| &*e.callback)
    }
}

/// Thread `value` through every callback in `registry`.
fn thread<F: ?Sized, T>(
    hook: Hook,
    registry: &Registry<F>,
    value: T,
    mut call: impl FnMut(&F, T) -> HookResult<T>,
) -> Result<T, HookError> {
    registry
        .callbacks()
        .try_fold(value, |value, callback| call(callback, value))
        .map_err(|source| HookError { hook, source })
}

/// Call every callback in `registry`, stopping at the first failure.
fn fire<F: ?Sized>(
    hook: Hook,
    registry: &Registry<F>,
    mut call: impl FnMut(&F) -> HookResult<()>,
) -> Result<(), HookError> {
    registry
        .callbacks()
        .try_for_each(|callback| call(callback))
        .map_err(|source| HookError { hook, source })
}

/// The per-build registry of every hook callback.
#[derive(Default)]
pub struct HookBus {
    next_id: u64,
    file_text: Registry<FileTextFn>,
    node_text: Registry<NodeFilterFn<String>>,
    node_html: Registry<NodeFilterFn<String>>,
    page_html: Registry<PageHtmlFn>,
    slug_list: Registry<NodeFilterFn<Vec<String>>>,
    template_list: Registry<NodeFilterFn<Vec<String>>>,
    class_list: Registry<NodeFilterFn<Vec<String>>>,
    output_path: Registry<NodeFilterFn<PathBuf>>,
    load_node_dir: Registry<EntryFn>,
    load_node_file: Registry<EntryFn>,
    slugify: Registry<SlugifyFn>,
    init_build: Registry<InitBuildFn>,
    init_tree: Registry<InitTreeFn>,
    render_page: Registry<RenderPageFn>,
    exit_build: Registry<ExitBuildFn>,
    custom: BTreeMap<String, Registry<CustomFn>>,
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBus")
            .field("registered", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> HookId {
        self.next_id += 1;
        HookId(self.next_id)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub fn on_file_text(
        &mut self,
        order: i32,
        callback: impl Fn(String, &mut Metadata) -> HookResult<String> + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.file_text.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_text(
        &mut self,
        filter: TextFilter,
        order: i32,
        callback: impl Fn(String, NodeRef<'_>) -> HookResult<String> + 'static,
    ) -> HookId {
        let id = self.next_id();
        let registry = match filter {
            TextFilter::NodeText => &mut self.node_text,
            TextFilter::NodeHtml => &mut self.node_html,
        };
        registry.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_page_html(
        &mut self,
        order: i32,
        callback: impl Fn(String, &PageContext<'_>) -> HookResult<String> + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.page_html.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_list(
        &mut self,
        filter: ListFilter,
        order: i32,
        callback: impl Fn(Vec<String>, NodeRef<'_>) -> HookResult<Vec<String>> + 'static,
    ) -> HookId {
        let id = self.next_id();
        let registry = match filter {
            ListFilter::SlugList => &mut self.slug_list,
            ListFilter::TemplateList => &mut self.template_list,
            ListFilter::ClassList => &mut self.class_list,
        };
        registry.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_output_path(
        &mut self,
        order: i32,
        callback: impl Fn(PathBuf, NodeRef<'_>) -> HookResult<PathBuf> + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.output_path.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_entry(
        &mut self,
        filter: EntryFilter,
        order: i32,
        callback: impl Fn(bool, &Path) -> HookResult<bool> + 'static,
    ) -> HookId {
        let id = self.next_id();
        let registry = match filter {
            EntryFilter::LoadNodeDir => &mut self.load_node_dir,
            EntryFilter::LoadNodeFile => &mut self.load_node_file,
        };
        registry.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_slugify(
        &mut self,
        order: i32,
        callback: impl Fn(String, &str) -> HookResult<String> + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.slugify.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_init_build(
        &mut self,
        order: i32,
        callback: impl Fn(&SiteConfig) -> HookResult<()> + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.init_build.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_init_tree(
        &mut self,
        order: i32,
        callback: impl Fn(&mut Tree) -> HookResult<()> + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.init_tree.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_render_page(
        &mut self,
        order: i32,
        callback: impl Fn(&mut PageContext<'_>) -> HookResult<()> + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.render_page.insert(id, order, Box::new(callback));
        id
    }

    pub fn on_exit_build(
        &mut self,
        order: i32,
        callback: impl Fn(&BuildStats) -> HookResult<()> + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.exit_build.insert(id, order, Box::new(callback));
        id
    }

    /// Register a callback on an extension-defined event.
    pub fn on_custom(
        &mut self,
        name: &str,
        order: i32,
        callback: impl Fn(&mut Value) -> HookResult<()> + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.custom
            .entry(name.to_string())
            .or_default()
            .insert(id, order, Box::new(callback));
        id
    }

    /// Remove one registration. With `order` set, only a registration under
    /// that order key matches. Returns whether anything was removed.
    pub fn deregister(&mut self, hook: &Hook, id: HookId, order: Option<i32>) -> bool {
        match hook {
            Hook::FileText => self.file_text.remove(id, order),
            Hook::NodeText => self.node_text.remove(id, order),
            Hook::NodeHtml => self.node_html.remove(id, order),
            Hook::PageHtml => self.page_html.remove(id, order),
            Hook::SlugList => self.slug_list.remove(id, order),
            Hook::TemplateList => self.template_list.remove(id, order),
            Hook::ClassList => self.class_list.remove(id, order),
            Hook::OutputPath => self.output_path.remove(id, order),
            Hook::LoadNodeDir => self.load_node_dir.remove(id, order),
            Hook::LoadNodeFile => self.load_node_file.remove(id, order),
            Hook::Slugify => self.slugify.remove(id, order),
            Hook::InitBuild => self.init_build.remove(id, order),
            Hook::InitTree => self.init_tree.remove(id, order),
            Hook::RenderPage => self.render_page.remove(id, order),
            Hook::ExitBuild => self.exit_build.remove(id, order),
            Hook::Custom(name) => self
                .custom
                .get_mut(name)
                .is_some_and(|r| r.remove(id, order)),
        }
    }

    /// Remove every callback registered on `hook`.
    pub fn clear(&mut self, hook: &Hook) {
        match hook {
            Hook::FileText => self.file_text.clear(),
            Hook::NodeText => self.node_text.clear(),
            Hook::NodeHtml => self.node_html.clear(),
            Hook::PageHtml => self.page_html.clear(),
            Hook::SlugList => self.slug_list.clear(),
            Hook::TemplateList => self.template_list.clear(),
            Hook::ClassList => self.class_list.clear(),
            Hook::OutputPath => self.output_path.clear(),
            Hook::LoadNodeDir => self.load_node_dir.clear(),
            Hook::LoadNodeFile => self.load_node_file.clear(),
            Hook::Slugify => self.slugify.clear(),
            Hook::InitBuild => self.init_build.clear(),
            Hook::InitTree => self.init_tree.clear(),
            Hook::RenderPage => self.render_page.clear(),
            Hook::ExitBuild => self.exit_build.clear(),
            Hook::Custom(name) => {
                self.custom.remove(name);
            }
        }
    }

    /// Number of callbacks registered on `hook`.
    pub fn len(&self, hook: &Hook) -> usize {
        match hook {
            Hook::FileText => self.file_text.len(),
            Hook::NodeText => self.node_text.len(),
            Hook::NodeHtml => self.node_html.len(),
            Hook::PageHtml => self.page_html.len(),
            Hook::SlugList => self.slug_list.len(),
            Hook::TemplateList => self.template_list.len(),
            Hook::ClassList => self.class_list.len(),
            Hook::OutputPath => self.output_path.len(),
            Hook::LoadNodeDir => self.load_node_dir.len(),
            Hook::LoadNodeFile => self.load_node_file.len(),
            Hook::Slugify => self.slugify.len(),
            Hook::InitBuild => self.init_build.len(),
            Hook::InitTree => self.init_tree.len(),
            Hook::RenderPage => self.render_page.len(),
            Hook::ExitBuild => self.exit_build.len(),
            Hook::Custom(name) => self.custom.get(name).map_or(0, Registry::len),
        }
    }

    // =========================================================================
    // Filters
    // =========================================================================

    pub fn file_text(&self, text: String, meta: &mut Metadata) -> Result<String, HookError> {
        thread(Hook::FileText, &self.file_text, text, |f, text| f(text, meta))
    }

    pub fn text(
        &self,
        filter: TextFilter,
        text: String,
        node: NodeRef<'_>,
    ) -> Result<String, HookError> {
        let registry = match filter {
            TextFilter::NodeText => &self.node_text,
            TextFilter::NodeHtml => &self.node_html,
        };
        thread(filter.into(), registry, text, |f, text| f(text, node))
    }

    pub fn page_html(&self, html: String, page: &PageContext<'_>) -> Result<String, HookError> {
        thread(Hook::PageHtml, &self.page_html, html, |f, html| f(html, page))
    }

    pub fn list(
        &self,
        filter: ListFilter,
        list: Vec<String>,
        node: NodeRef<'_>,
    ) -> Result<Vec<String>, HookError> {
        let registry = match filter {
            ListFilter::SlugList => &self.slug_list,
            ListFilter::TemplateList => &self.template_list,
            ListFilter::ClassList => &self.class_list,
        };
        thread(filter.into(), registry, list, |f, list| f(list, node))
    }

    pub fn output_path(&self, path: PathBuf, node: NodeRef<'_>) -> Result<PathBuf, HookError> {
        thread(Hook::OutputPath, &self.output_path, path, |f, path| {
            f(path, node)
        })
    }

    pub fn entry(&self, filter: EntryFilter, load: bool, path: &Path) -> Result<bool, HookError> {
        let registry = match filter {
            EntryFilter::LoadNodeDir => &self.load_node_dir,
            EntryFilter::LoadNodeFile => &self.load_node_file,
        };
        thread(filter.into(), registry, load, |f, load| f(load, path))
    }

    pub fn slugify(&self, slug: String, original: &str) -> Result<String, HookError> {
        thread(Hook::Slugify, &self.slugify, slug, |f, slug| {
            f(slug, original)
        })
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn init_build(&self, config: &SiteConfig) -> Result<(), HookError> {
        fire(Hook::InitBuild, &self.init_build, |f| f(config))
    }

    pub fn init_tree(&self, tree: &mut Tree) -> Result<(), HookError> {
        fire(Hook::InitTree, &self.init_tree, |f| f(tree))
    }

    pub fn render_page(&self, page: &mut PageContext<'_>) -> Result<(), HookError> {
        fire(Hook::RenderPage, &self.render_page, |f| f(page))
    }

    pub fn exit_build(&self, stats: &BuildStats) -> Result<(), HookError> {
        fire(Hook::ExitBuild, &self.exit_build, |f| f(stats))
    }

    /// Fire an extension-defined event. Unknown names have no callbacks.
    pub fn fire_custom(&self, name: &str, payload: &mut Value) -> Result<(), HookError> {
        match self.custom.get(name) {
            Some(registry) => fire(Hook::Custom(name.to_string()), registry, |f| f(payload)),
            None => Ok(()),
        }
    }
}
