//! Build driver.
//!
//! A [`BuildContext`] holds everything one build needs: configuration,
//! resolved paths, the hook bus and the collaborator registries. Nothing is
//! global, so independent builds can run side by side in one process.
//!
//! [`build`] runs the stages in a fixed order:
//!
//! ```text
//! init_build → reset templates → clear? → load cache → copy resources
//!            → scan → load includes → render + write → save cache → exit_build
//! ```
//!
//! A context can run [`build`] any number of times. Each run starts from the
//! files on disk: nothing read or rendered by an earlier run is reused except
//! through the build cache.
//!
//! Any error aborts the build. Pages already written stay on disk; running
//! the build again brings the output tree back in line.

use crate::cache::{self, BuildCache};
use crate::config::{ConfigError, ConfigOverrides, SiteConfig, load_config};
use crate::ext;
use crate::generate::{PagePipeline, RenderError};
use crate::hooks::{HookBus, HookError};
use crate::includes::{IncludeError, Includes, load_includes};
use crate::node::Tree;
use crate::renderers::Renderers;
use crate::scan::{FsLoader, ScanError, SourceLoader, SourceTree};
use crate::site::SitePaths;
use crate::templates::{TemplateEngines, ThemeTemplates};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Include(#[from] IncludeError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("cannot copy resources from {}", src.display())]
    Resources {
        src: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot list templates in {}", path.display())]
    Templates {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot save build cache {}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Counts reported at the end of a build.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Pages rendered.
    pub rendered: usize,
    /// Pages written; the rest were unchanged.
    pub written: usize,
    pub elapsed: Duration,
}

impl BuildStats {
    /// Average seconds per rendered page.
    pub fn avg_secs(&self) -> f64 {
        if self.rendered == 0 {
            0.0
        } else {
            self.elapsed.as_secs_f64() / self.rendered as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Empty the output directory first.
    pub clear_output: bool,
    /// Start from the persisted cache. When off, every page is written.
    pub use_cache: bool,
    /// Where cache files live. Defaults to [`cache::default_cache_dir`].
    pub cache_dir: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            clear_output: false,
            use_cache: true,
            cache_dir: None,
        }
    }
}

/// Per-build state.
pub struct BuildContext {
    pub config: SiteConfig,
    pub paths: SitePaths,
    pub hooks: HookBus,
    pub renderers: Renderers,
    pub engines: TemplateEngines,
    pub loader: Box<dyn SourceLoader>,
}

impl BuildContext {
    /// A context with the bundled renderers, template engines and extensions.
    pub fn new(config: SiteConfig, paths: SitePaths) -> Self {
        let mut hooks = HookBus::new();
        ext::register_bundled(&mut hooks);
        Self {
            renderers: Renderers::with_defaults(&config.markdown),
            engines: TemplateEngines::with_defaults(&paths.templates()),
            loader: Box::new(FsLoader),
            hooks,
            config,
            paths,
        }
    }

    /// Load `site.toml` from `home`, apply overrides and resolve paths.
    pub fn open(home: &Path, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = load_config(home)?;
        config.apply_overrides(overrides);
        config.validate()?;
        let paths = SitePaths::resolve(home, &config)?;
        Ok(Self::new(config, paths))
    }

    /// Scan the source directory into a frozen node tree.
    pub fn scan(&self) -> Result<Tree, ScanError> {
        SourceTree::new(&self.hooks, &self.renderers, self.loader.as_ref()).build(&self.paths.src)
    }

    /// Read and render the include snippets. A build loads them once and
    /// shares them across every page.
    pub fn includes(&self) -> Result<Includes, IncludeError> {
        load_includes(
            &self.paths.inc,
            self.loader.as_ref(),
            &self.hooks,
            &self.renderers,
        )
    }

    /// The persisted cache file for this site.
    pub fn cache_file(&self, cache_dir: Option<&Path>) -> PathBuf {
        site_cache_file(&self.paths.home, cache_dir)
    }
}

/// The persisted cache file for the site at `home`, in `cache_dir` or the
/// default cache directory.
pub fn site_cache_file(home: &Path, cache_dir: Option<&Path>) -> PathBuf {
    let dir = cache_dir.map_or_else(cache::default_cache_dir, Path::to_path_buf);
    cache::cache_file_for(home, &dir)
}

/// Run a full build.
pub fn build(ctx: &BuildContext, options: &BuildOptions) -> Result<BuildStats, BuildError> {
    let start = Instant::now();
    let out = &ctx.paths.out;

    ctx.hooks.init_build(&ctx.config)?;
    ctx.engines.reset();

    if options.clear_output {
        clear_output(out)?;
    }
    fs::create_dir_all(out)?;

    let cache_file = ctx.cache_file(options.cache_dir.as_deref());
    let mut cache = if options.use_cache {
        BuildCache::load(cache_file, out)
    } else {
        BuildCache::empty(cache_file, out)
    };

    copy_resources(&ctx.paths.theme_resources(), out)?;
    copy_resources(&ctx.paths.res, out)?;

    let tree = ctx.scan()?;
    let includes = ctx.includes()?;
    let templates_dir = ctx.paths.templates();
    let templates = ThemeTemplates::load(&templates_dir).map_err(|source| BuildError::Templates {
        path: templates_dir.clone(),
        source,
    })?;
    let pipeline = PagePipeline {
        config: &ctx.config,
        hooks: &ctx.hooks,
        renderers: &ctx.renderers,
        engines: &ctx.engines,
        templates: &templates,
        includes: &includes,
        out_dir: out,
    };

    let mut stats = BuildStats::default();
    tree.root().walk(&mut |node| {
        if node.source().is_none() && !ctx.config.emit_directory_nodes {
            debug!(node = node.url(), "skipping directory node");
            return Ok(());
        }
        let page = pipeline.render(node)?;
        stats.rendered += 1;
        if pipeline.write(&page, &mut cache)? {
            stats.written += 1;
        }
        Ok::<_, RenderError>(())
    })?;

    cache.save().map_err(|source| BuildError::Cache {
        path: cache.file().to_path_buf(),
        source,
    })?;

    stats.elapsed = start.elapsed();
    ctx.hooks.exit_build(&stats)?;
    info!(
        rendered = stats.rendered,
        written = stats.written,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "build complete"
    );
    Ok(stats)
}

/// Copy everything below `src` into `dst`, skipping files whose copy has the
/// same size and modification time. A missing `src` copies nothing.
/// Returns the number of files copied.
pub fn copy_resources(src: &Path, dst: &Path) -> Result<usize, BuildError> {
    if !src.is_dir() {
        return Ok(0);
    }
    let err = |source| BuildError::Resources {
        src: src.to_path_buf(),
        source,
    };

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| err(e.into()))?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(err)?;
        } else if entry.file_type().is_file() {
            if up_to_date(entry.path(), &target).map_err(err)? {
                continue;
            }
            copy_file(entry.path(), &target).map_err(err)?;
            copied += 1;
        }
    }
    debug!(src = %src.display(), copied, "copied resources");
    Ok(copied)
}

fn up_to_date(src: &Path, target: &Path) -> io::Result<bool> {
    let Ok(existing) = fs::metadata(target) else {
        return Ok(false);
    };
    let source = fs::metadata(src)?;
    Ok(existing.len() == source.len() && existing.modified()? == source.modified()?)
}

/// Copy one file and carry its modification time over.
fn copy_file(src: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, target)?;
    let modified = fs::metadata(src)?.modified()?;
    fs::File::options()
        .write(true)
        .open(target)?
        .set_modified(modified)
}

/// Remove everything inside `out`, keeping the directory itself.
pub fn clear_output(out: &Path) -> io::Result<()> {
    if !out.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(out)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    debug!(out = %out.display(), "cleared output directory");
    Ok(())
}

/// Delete the persisted build cache of the site at `home`.
pub fn clear_cache(home: &Path, cache_dir: Option<&Path>) -> io::Result<()> {
    let file = site_cache_file(home, cache_dir);
    debug!(file = %file.display(), "clearing build cache");
    BuildCache::empty(file, home).clear()
}
