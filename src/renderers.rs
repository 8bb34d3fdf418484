//! Content renderers, keyed by source file extension.
//!
//! A renderer turns a node's text into HTML. Only files whose extension has
//! a renderer become nodes, so this registry also decides what the scanner
//! picks up.
//!
//! | Extension | Renderer |
//! |-----------|----------|
//! | `md`, `markdown` | pulldown-cmark |
//! | `html`, `css`, `js`, `txt`, `meta`, none | pass-through |
//!
//! Registering an extension again replaces its renderer.

use crate::config::MarkdownConfig;
use crate::hooks::{BoxError, HookResult};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::collections::BTreeMap;
use std::fmt;

pub type RenderFn = dyn Fn(&str) -> HookResult<String>;

/// Extensions rendered verbatim.
const PASS_THROUGH: [&str; 6] = ["css", "html", "js", "meta", "txt", ""];

#[derive(Default)]
pub struct Renderers {
    by_ext: BTreeMap<String, Box<RenderFn>>,
}

impl fmt::Debug for Renderers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_ext.keys()).finish()
    }
}

impl Renderers {
    /// An empty registry. No file extension is renderable.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled renderers.
    pub fn with_defaults(markdown: &MarkdownConfig) -> Self {
        let mut renderers = Self::new();
        for ext in PASS_THROUGH {
            renderers.register(ext, |text| Ok(text.to_string()));
        }
        let options = markdown_options(markdown);
        for ext in ["md", "markdown"] {
            renderers.register(ext, move |text| Ok(render_markdown(text, options)));
        }
        renderers
    }

    pub fn register(
        &mut self,
        ext: &str,
        render: impl Fn(&str) -> Result<String, BoxError> + 'static,
    ) {
        self.by_ext.insert(ext.to_string(), Box::new(render));
    }

    pub fn get(&self, ext: &str) -> Option<&RenderFn> {
        self.by_ext.get(ext).map(|r| &**r)
    }

    pub fn has(&self, ext: &str) -> bool {
        self.by_ext.contains_key(ext)
    }
}

pub fn markdown_options(config: &MarkdownConfig) -> Options {
    let mut options = Options::empty();
    options.set(Options::ENABLE_TABLES, config.tables);
    options.set(Options::ENABLE_FOOTNOTES, config.footnotes);
    options.set(Options::ENABLE_STRIKETHROUGH, config.strikethrough);
    options.set(Options::ENABLE_SMART_PUNCTUATION, config.smart_punctuation);
    options.set(Options::ENABLE_HEADING_ATTRIBUTES, config.heading_attributes);
    options
}

pub fn render_markdown(text: &str, options: Options) -> String {
    let parser = Parser::new_ext(text, options);
    let mut html = String::with_capacity(text.len() * 3 / 2);
    md_html::push_html(&mut html, parser);
    html
}
