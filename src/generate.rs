//! Page rendering.
//!
//! Turns one node into one HTML file. For every node, in this order:
//!
//! 1. `node_text` filter over the raw text
//! 2. the renderer registered for the node's extension
//! 3. `node_html` filter
//! 4. page context assembly: node, site config, includes, class and
//!    template candidates, output path
//! 5. `render_page` event, where extensions add to the context
//! 6. template selection and the engine for the template's extension
//! 7. `page_html` filter
//! 8. `@root/` url rewriting
//! 9. write, unless the build cache says the bytes are unchanged
//!
//! ## Candidate names
//!
//! Class and template candidates come from joining `node` with the node's
//! path and dropping the last segment until only `node` is left, most
//! specific first:
//!
//! ```text
//! blog/post-1  →  node-blog-post-1, node-blog, node
//! ```
//!
//! A `template` metadata value is tried before all of them.
//!
//! ## Output paths
//!
//! | Node path | `.html` | `/` |
//! |-----------|---------|-----|
//! | `[]` (root) | `index.html` | `index.html` |
//! | `[about]` | `about.html` | `about/index.html` |
//! | `[about, team]` | `about/team.html` | `about/team/index.html` |

use crate::cache::BuildCache;
use crate::config::SiteConfig;
use crate::hooks::{BoxError, HookBus, HookError, ListFilter, TextFilter};
use crate::includes::Includes;
use crate::node::{NodeRef, NodeSummary};
use crate::renderers::Renderers;
use crate::templates::{TemplateEngines, ThemeTemplates};
use crate::urls::{UrlStyle, rewrite_urls};
use crate::value::{Metadata, Value};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no renderer for '.{ext}' files ({node})")]
    MissingRenderer { node: String, ext: String },
    #[error("rendering {node} failed")]
    Renderer {
        node: String,
        #[source]
        source: BoxError,
    },
    #[error("no template for {node}; tried {candidates:?}")]
    MissingTemplate {
        node: String,
        candidates: Vec<String>,
    },
    #[error("no template engine for '.{ext}' ({template})")]
    MissingTemplateEngine { template: String, ext: String },
    #[error("template {template} failed on {node}")]
    Template {
        node: String,
        template: String,
        #[source]
        source: BoxError,
    },
    #[error("extension failed on {node}")]
    Hook {
        node: String,
        #[source]
        source: HookError,
    },
    #[error("cannot write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a template sees, and what `render_page` listeners may change.
#[derive(Debug, Serialize)]
pub struct PageContext<'a> {
    pub node: NodeRef<'a>,
    pub site: &'a SiteConfig,
    /// Rendered include snippets by normalized stem.
    pub includes: &'a Includes,
    /// The node's rendered content.
    pub html: String,
    pub is_homepage: bool,
    /// Output path relative to the output root.
    pub filepath: PathBuf,
    pub classes: Vec<String>,
    pub templates: Vec<String>,
    pub children: Vec<NodeSummary<'a>>,
    /// Values added by extensions, exposed to templates as top-level names.
    #[serde(flatten)]
    pub extra: Metadata,
}

/// A rendered page waiting to be written.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Output path relative to the output root.
    pub rel_path: PathBuf,
    pub html: String,
}

/// The per-build collaborators needed to render pages.
pub struct PagePipeline<'a> {
    pub config: &'a SiteConfig,
    pub hooks: &'a HookBus,
    pub renderers: &'a Renderers,
    pub engines: &'a TemplateEngines,
    pub templates: &'a ThemeTemplates,
    pub includes: &'a Includes,
    pub out_dir: &'a Path,
}

impl<'a> PagePipeline<'a> {
    /// Steps 1 to 3: the node's rendered content. Computed once per node and
    /// cached on it, so a page that lists its children reuses their content.
    pub fn node_html(&self, node: NodeRef<'a>) -> Result<&'a str, RenderError> {
        if let Some(html) = node.html() {
            return Ok(html);
        }
        let url = node.url();
        let hook_err = |source| RenderError::Hook {
            node: url.to_string(),
            source,
        };

        let text = self
            .hooks
            .text(TextFilter::NodeText, node.text().to_string(), node)
            .map_err(hook_err)?;

        let render = self
            .renderers
            .get(node.ext())
            .ok_or_else(|| RenderError::MissingRenderer {
                node: url.to_string(),
                ext: node.ext().to_string(),
            })?;
        let html = render(&text).map_err(|source| RenderError::Renderer {
            node: url.to_string(),
            source,
        })?;
        let html = self
            .hooks
            .text(TextFilter::NodeHtml, html, node)
            .map_err(hook_err)?;
        Ok(node.cache_html(html))
    }

    /// Run steps 1 to 8 for `node`.
    pub fn render(&self, node: NodeRef<'a>) -> Result<RenderedPage, RenderError> {
        let url = node.url();
        let hook_err = |source| RenderError::Hook {
            node: url.to_string(),
            source,
        };

        let html = self.node_html(node)?.to_string();
        for child in node.children() {
            self.node_html(child)?;
        }

        let rel_path = output_path(node, self.config, self.hooks).map_err(hook_err)?;
        let mut page = self.context(node, html, rel_path).map_err(hook_err)?;
        self.hooks.render_page(&mut page).map_err(hook_err)?;

        let template = self
            .templates
            .select(&page.templates)
            .ok_or_else(|| RenderError::MissingTemplate {
                node: url.to_string(),
                candidates: page.templates.clone(),
            })?;
        let template_name = template
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = template
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let engine = self
            .engines
            .get(&ext)
            .ok_or_else(|| RenderError::MissingTemplateEngine {
                template: template_name.clone(),
                ext: ext.clone(),
            })?;
        trace!(node = url, template = %template_name, "applying template");
        let html = engine(&page, &template_name).map_err(|source| RenderError::Template {
            node: url.to_string(),
            template: template_name.clone(),
            source,
        })?;

        let html = self.hooks.page_html(html, &page).map_err(hook_err)?;
        let html = rewrite_urls(
            &html,
            &page.filepath,
            UrlStyle {
                root: &self.config.root,
                extension: &self.config.extension,
            },
        );

        Ok(RenderedPage {
            rel_path: page.filepath,
            html,
        })
    }

    /// Step 9: write `page` unless the cache already has its bytes.
    /// Returns whether the file was written.
    pub fn write(&self, page: &RenderedPage, cache: &mut BuildCache) -> Result<bool, RenderError> {
        let path = self.out_dir.join(&page.rel_path);
        if cache.matches(&path, page.html.as_bytes()) {
            trace!(path = %page.rel_path.display(), "unchanged");
            return Ok(false);
        }
        let write_err = |source| RenderError::Write {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&path, &page.html).map_err(write_err)?;
        debug!(path = %page.rel_path.display(), "written");
        Ok(true)
    }

    fn context(
        &self,
        node: NodeRef<'a>,
        html: String,
        filepath: PathBuf,
    ) -> Result<PageContext<'a>, HookError> {
        let slugs = self
            .hooks
            .list(ListFilter::SlugList, candidate_names(node), node)?;

        let mut classes = slugs.clone();
        if node.is_root() {
            classes.push("homepage".to_string());
        }
        if let Some(extra) = node.get_str("classes") {
            classes.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from),
            );
        }
        let classes = self.hooks.list(ListFilter::ClassList, classes, node)?;

        let mut templates = slugs;
        if let Some(Value::String(template)) = node.get("template") {
            templates.insert(0, template.clone());
        }
        let templates = self.hooks.list(ListFilter::TemplateList, templates, node)?;

        Ok(PageContext {
            node,
            site: self.config,
            includes: self.includes,
            html,
            is_homepage: node.is_root(),
            filepath,
            classes,
            templates,
            children: node.children().map(|c| c.summary()).collect(),
            extra: Metadata::new(),
        })
    }
}

/// `node` joined with the node's path, truncated one segment at a time.
pub fn candidate_names(node: NodeRef<'_>) -> Vec<String> {
    let mut segments: Vec<&str> = std::iter::once("node")
        .chain(node.path().iter().map(String::as_str))
        .collect();
    let mut names = Vec::with_capacity(segments.len());
    while !segments.is_empty() {
        names.push(segments.join("-"));
        segments.pop();
    }
    names
}

/// Output path of `node` relative to the output root, after the
/// `output_path` filter.
pub fn output_path(
    node: NodeRef<'_>,
    config: &SiteConfig,
    hooks: &HookBus,
) -> Result<PathBuf, HookError> {
    let mut segments: Vec<String> = node.path().to_vec();
    if segments.is_empty() {
        segments.push("index".to_string());
    }
    if config.directory_style() {
        if segments == ["index"] {
            segments[0].push_str(".html");
        } else {
            segments.push("index.html".to_string());
        }
    } else if let Some(last) = segments.last_mut() {
        last.push_str(&config.extension);
    }
    hooks.output_path(segments.iter().collect(), node)
}
