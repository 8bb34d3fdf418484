//! Source tree scanning.
//!
//! Walks the source directory and assembles the [`Tree`] of content nodes.
//!
//! ## Merge rules
//!
//! ```text
//! src/
//! ├── index.md          → content of the root node
//! ├── about.md          ┐
//! ├── about/            ┴ one node `about`: text from about.md, children from about/
//! │   └── team.md       → node `about/team`
//! ├── notes/            → node `notes` with no content of its own
//! │   └── index.md      → content of `notes`
//! ├── .drafts/          ✗ hidden
//! ├── todo.md~          ✗ editor backup
//! └── photo.png         ✗ no renderer for `png`
//! ```
//!
//! Within a directory, subdirectories are processed before files and both
//! are visited in file-name order. A file joins an existing sibling whose
//! stem slugifies to the same value, and a directory does the same, so the
//! outcome does not depend on which is seen first.
//!
//! Two sources that would supply the same node (`foo.md` and `foo.txt`, or
//! `index.md` and `index.html`) are rejected rather than letting one
//! silently win.
//!
//! ## Phases
//!
//! 1. Raw build: stems, parent/child links, text, metadata.
//! 2. Freeze: slug (`slug` metadata, else the `slugify` filter over the
//!    default slug), path and url for every node, parents first.
//! 3. The `init_tree` event, with every derived field in place.

use crate::hooks::{BoxError, EntryFilter, HookBus, HookError};
use crate::naming::{self, ParsedName};
use crate::node::{NodeId, ROOT_URL, Tree};
use crate::renderers::Renderers;
use crate::value::{Metadata, normalize_keys};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot load {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("filter failed for {}", path.display())]
    Filter {
        path: PathBuf,
        #[source]
        source: HookError,
    },
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("{} and {} both supply the same node", first.display(), second.display())]
    ConflictingSources { first: PathBuf, second: PathBuf },
    #[error("duplicate slug '{slug}' under {parent}")]
    DuplicateSlug { slug: String, parent: String },
    #[error("'{stem}' under {parent} has an empty slug")]
    EmptySlug { stem: String, parent: String },
}

/// Reads a source file into raw text and unnormalized metadata.
pub trait SourceLoader {
    fn load(&self, path: &Path) -> Result<(String, Metadata), BoxError>;
}

/// Reads files as UTF-8 text with no metadata of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> Result<(String, Metadata), BoxError> {
        Ok((fs::read_to_string(path)?, Metadata::new()))
    }
}

/// Load one source file: loader, then the `file_text` filter, then key
/// normalization.
pub fn load_source(
    path: &Path,
    loader: &dyn SourceLoader,
    hooks: &HookBus,
) -> Result<(String, Metadata), ScanError> {
    let (text, mut meta) = loader.load(path).map_err(|source| ScanError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    let text = hooks
        .file_text(text, &mut meta)
        .map_err(|source| ScanError::Filter {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((text, normalize_keys(meta)))
}

/// Builds a [`Tree`] from a source directory.
pub struct SourceTree<'a> {
    hooks: &'a HookBus,
    renderers: &'a Renderers,
    loader: &'a dyn SourceLoader,
}

impl<'a> SourceTree<'a> {
    pub fn new(hooks: &'a HookBus, renderers: &'a Renderers, loader: &'a dyn SourceLoader) -> Self {
        Self {
            hooks,
            renderers,
            loader,
        }
    }

    pub fn build(&self, src: &Path) -> Result<Tree, ScanError> {
        let mut tree = Tree::new();
        let root = tree.root_id();
        tree.data_mut(root).dir = Some(src.to_path_buf());

        self.scan_dir(&mut tree, root, src)?;
        self.freeze(&mut tree)?;
        self.hooks.init_tree(&mut tree)?;

        debug!(nodes = tree.len(), src = %src.display(), "source tree built");
        Ok(tree)
    }

    fn scan_dir(&self, tree: &mut Tree, node: NodeId, dir: &Path) -> Result<(), ScanError> {
        let (dirs, files) = list_dir(dir)?;

        for path in dirs {
            let name = file_name(&path);
            if naming::is_hidden(&name) || !self.accepts(EntryFilter::LoadNodeDir, &path)? {
                trace!(path = %path.display(), "skipping directory");
                continue;
            }
            let child = child_for(tree, node, &name);
            if let Some(first) = &tree.data(child).dir {
                return Err(ScanError::ConflictingSources {
                    first: first.clone(),
                    second: path,
                });
            }
            tree.data_mut(child).dir = Some(path.clone());
            self.scan_dir(tree, child, &path)?;
        }

        for path in files {
            let name = file_name(&path);
            let ParsedName { stem, ext } = naming::parse_file_name(&path);
            if naming::is_hidden(&name) || naming::is_backup(&name, &stem) {
                trace!(path = %path.display(), "skipping hidden or backup file");
                continue;
            }
            if !self.renderers.has(&ext) {
                debug!(path = %path.display(), ext = %ext, "no renderer, skipping");
                continue;
            }
            if !self.accepts(EntryFilter::LoadNodeFile, &path)? {
                trace!(path = %path.display(), "file excluded by filter");
                continue;
            }

            let target = if naming::is_index_stem(&stem) {
                node
            } else {
                child_for(tree, node, &stem)
            };
            if let Some(first) = &tree.data(target).source {
                return Err(ScanError::ConflictingSources {
                    first: first.clone(),
                    second: path,
                });
            }

            let (text, meta) = load_source(&path, self.loader, self.hooks)?;
            let data = tree.data_mut(target);
            data.text = text;
            data.ext = ext;
            data.meta.extend(meta);
            data.source = Some(path);
        }
        Ok(())
    }

    fn accepts(&self, filter: EntryFilter, path: &Path) -> Result<bool, ScanError> {
        self.hooks
            .entry(filter, true, path)
            .map_err(|source| ScanError::Filter {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Compute slug, path and url for every node. Ids are in creation
    /// order, so each parent is frozen before its children.
    fn freeze(&self, tree: &mut Tree) -> Result<(), ScanError> {
        let ids: Vec<NodeId> = tree.ids().skip(1).collect();
        for id in ids {
            let node = tree.get(id);
            let Some(parent) = node.parent() else {
                continue;
            };
            let slug = match node.get_str("slug") {
                Some(explicit) => explicit.to_string(),
                None => self
                    .hooks
                    .slugify(naming::slugify(node.stem()), node.stem())?,
            };
            if slug.is_empty() {
                return Err(ScanError::EmptySlug {
                    stem: node.stem().to_string(),
                    parent: parent.url().to_string(),
                });
            }
            if parent.children().any(|c| c.slug() == slug) {
                return Err(ScanError::DuplicateSlug {
                    slug,
                    parent: parent.url().to_string(),
                });
            }

            let mut path = parent.path().to_vec();
            path.push(slug.clone());
            let url = format!("{ROOT_URL}{}//", path.join("/"));

            let data = tree.data_mut(id);
            data.slug = slug;
            data.path = path;
            data.url = url;
        }
        Ok(())
    }
}

/// The existing child of `parent` whose stem has the same default slug as
/// `stem`, or a new one.
fn child_for(tree: &mut Tree, parent: NodeId, stem: &str) -> NodeId {
    let wanted = naming::slugify(stem);
    let existing = tree
        .get(parent)
        .children()
        .find(|c| naming::slugify(c.stem()) == wanted)
        .map(|c| c.id());
    existing.unwrap_or_else(|| tree.add_child(parent, stem))
}

/// Subdirectories and files of `dir`, each sorted by name.
fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), ScanError> {
    let io_err = |source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort();
    Ok(entries.into_iter().partition(|p| p.is_dir()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
