//! Include snippets.
//!
//! Files directly inside `inc/` are rendered once per build and handed to
//! every template under `includes`, keyed by their normalized stem:
//!
//! ```text
//! inc/footer.md       → includes.footer
//! inc/Side Bar.html   → includes.side_bar
//! ```
//!
//! Files without a registered renderer, hidden files and subdirectories are
//! ignored.

use crate::hooks::{BoxError, HookBus};
use crate::naming;
use crate::renderers::Renderers;
use crate::scan::{ScanError, SourceLoader, load_source};
use crate::value::normalize_key;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Rendered include HTML by normalized stem.
pub type Includes = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum IncludeError {
    #[error("cannot list includes in {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("rendering include {} failed", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

/// Load and render every include in `inc_dir`. A missing directory yields
/// no includes.
pub fn load_includes(
    inc_dir: &Path,
    loader: &dyn SourceLoader,
    hooks: &HookBus,
    renderers: &Renderers,
) -> Result<Includes, IncludeError> {
    let mut includes = Includes::new();
    if !inc_dir.is_dir() {
        return Ok(includes);
    }

    let io_err = |source| IncludeError::Io {
        path: inc_dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(inc_dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    for path in files {
        let name = naming::parse_file_name(&path);
        let hidden = path
            .file_name()
            .is_some_and(|n| naming::is_hidden(&n.to_string_lossy()));
        if hidden {
            continue;
        }
        let Some(render) = renderers.get(&name.ext) else {
            continue;
        };
        let (text, _meta) = load_source(&path, loader, hooks)?;
        let html = render(&text).map_err(|source| IncludeError::Render {
            path: path.clone(),
            source,
        })?;
        includes.insert(normalize_key(&name.stem), html);
    }

    debug!(count = includes.len(), dir = %inc_dir.display(), "loaded includes");
    Ok(includes)
}
