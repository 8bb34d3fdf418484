//! # Quire
//!
//! A static site builder. A directory of text files becomes a tree of
//! content nodes, each node runs through a pipeline of extension hooks, a
//! renderer and a theme template, and the result is written to an output
//! tree. Unchanged pages are not rewritten.
//!
//! # Architecture
//!
//! ```text
//! site.toml ─┐
//!            ├─ BuildContext ── scan ── Tree ── PagePipeline ── out/
//! src/ ──────┘        │                             │
//!                  HookBus ─────────────────────────┘
//! ```
//!
//! 1. **Scan**: [`scan::SourceTree`] merges files and directories into
//!    nodes, then freezes every node's slug, path and URL.
//! 2. **Render**: [`generate::PagePipeline`] takes each node through text
//!    filters, its renderer, `render_page` listeners and a template.
//! 3. **Write**: [`urls`] resolves `@root/` links and [`cache::BuildCache`]
//!    skips pages whose bytes did not change.
//!
//! Extensions cooperate through the [`hooks::HookBus`]: ordered callbacks on
//! a closed set of filters and events. The bundled ones live in [`ext`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`build`] | Per-build context, the build driver, resource copying |
//! | [`cache`] | Content-hash cache that skips unchanged writes |
//! | [`config`] | `site.toml` loading, merging and validation |
//! | [`ext`] | Bundled extensions: front matter, shortcodes, breadcrumbs, menu |
//! | [`generate`] | Per-node render pipeline and output paths |
//! | [`hooks`] | Ordered filter and event registries |
//! | [`includes`] | Snippets from `inc/` shared by every page |
//! | [`naming`] | File name parsing and slugs |
//! | [`node`] | Arena node tree and read-only node views |
//! | [`output`] | CLI output formatting |
//! | [`renderers`] | Text-to-HTML renderers by file extension |
//! | [`scan`] | Source directory to node tree |
//! | [`site`] | Site home, theme and directory lookup |
//! | [`templates`] | Theme template selection and engines |
//! | [`urls`] | `@root/` link rewriting |
//! | [`value`] | Typed metadata values |
//!
//! # Design Decisions
//!
//! ## No Global State
//!
//! Hook registries, renderers and template engines all hang off one
//! [`build::BuildContext`]. Two contexts in one process never see each
//! other's extensions, which keeps tests independent. Anything derived from
//! site files (includes, the menu, compiled templates, rendered content) is
//! recomputed by every [`build::build`] call on a context.
//!
//! ## Frozen Derived Fields
//!
//! Slugs, paths and URLs are computed in one pass after the whole tree has
//! been read, so a `slug` set in front matter is always honoured and no
//! field is ever derived from half-loaded metadata.
//!
//! ## Errors Stop the Build
//!
//! Every stage returns a typed error that names the node, file or template
//! involved. Nothing is retried; `main` prints the error chain and exits.

pub mod build;
pub mod cache;
pub mod config;
pub mod ext;
pub mod generate;
pub mod hooks;
pub mod includes;
pub mod naming;
pub mod node;
pub mod output;
pub mod renderers;
pub mod scan;
pub mod site;
pub mod templates;
pub mod urls;
pub mod value;

#[cfg(test)]
pub(crate) mod test_helpers;
