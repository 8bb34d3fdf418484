//! Theme templates and the engines that render them.
//!
//! A theme keeps its templates in one flat `templates/` directory. A page
//! picks its template by name: the pipeline hands over an ordered list of
//! candidate names and the first one matching a template file's stem wins.
//! The file's extension then selects the engine.
//!
//! ```text
//! lib/debug/templates/
//! ├── node.jinja          ← fallback for every page
//! └── node-blog.jinja     ← pages under blog/
//! ```
//!
//! The bundled engine is minijinja, registered for `jinja` and `j2`. It
//! compiles each template once and keeps it until [`TemplateEngines::reset`],
//! which the build calls before rendering.

use crate::generate::PageContext;
use crate::hooks::{BoxError, HookResult};
use minijinja::{AutoEscape, Environment, path_loader};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Renders a page with the named template file.
pub type TemplateFn = dyn Fn(&PageContext<'_>, &str) -> HookResult<String>;

#[derive(Default)]
pub struct TemplateEngines {
    by_ext: BTreeMap<String, Box<TemplateFn>>,
    resets: Vec<Box<dyn Fn()>>,
}

impl fmt::Debug for TemplateEngines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_ext.keys()).finish()
    }
}

impl TemplateEngines {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled minijinja engine, loading from `templates_dir`.
    pub fn with_defaults(templates_dir: &Path) -> Self {
        let mut engines = Self::new();
        let env = Rc::new(RefCell::new(jinja_environment(templates_dir)));
        for ext in ["jinja", "j2"] {
            let env = Rc::clone(&env);
            engines.register(ext, move |page, name| {
                let env = env.borrow();
                let template = env.get_template(name)?;
                Ok(template.render(page)?)
            });
        }
        engines
            .resets
            .push(Box::new(move || env.borrow_mut().clear_templates()));
        engines
    }

    /// Forget compiled templates so edited theme files are read again.
    pub fn reset(&self) {
        for reset in &self.resets {
            reset();
        }
    }

    pub fn register(
        &mut self,
        ext: &str,
        render: impl Fn(&PageContext<'_>, &str) -> Result<String, BoxError> + 'static,
    ) {
        self.by_ext.insert(ext.to_string(), Box::new(render));
    }

    pub fn get(&self, ext: &str) -> Option<&TemplateFn> {
        self.by_ext.get(ext).map(|e| &**e)
    }

    pub fn has(&self, ext: &str) -> bool {
        self.by_ext.contains_key(ext)
    }
}

fn jinja_environment(templates_dir: &Path) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(path_loader(templates_dir));
    // Page content is already HTML.
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env
}

/// The flat list of template files in a theme, in name order.
#[derive(Debug, Clone, Default)]
pub struct ThemeTemplates {
    files: Vec<PathBuf>,
}

impl ThemeTemplates {
    /// List `dir`. A missing directory yields an empty list.
    pub fn load(dir: &Path) -> io::Result<Self> {
        if !dir.is_dir() {
            return Ok(Self::default());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'));
            if path.is_file() && !hidden {
                files.push(path);
            }
        }
        files.sort();
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// The template for the first candidate that names a template file.
    pub fn select(&self, candidates: &[String]) -> Option<&Path> {
        candidates.iter().find_map(|name| {
            self.files
                .iter()
                .find(|f| f.file_stem().is_some_and(|s| s == name.as_str()))
                .map(PathBuf::as_path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_tree;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn load_lists_files_in_name_order() {
        let tmp = write_tree(&[
            ("node.jinja", ""),
            ("blog.jinja", ""),
            (".swp", ""),
            ("partials/x.jinja", ""),
        ]);
        let templates = ThemeTemplates::load(tmp.path()).unwrap();
        let listed: Vec<_> = templates
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(listed, vec!["blog.jinja", "node.jinja"]);
    }

    #[test]
    fn missing_directory_is_empty() {
        let tmp = write_tree(&[]);
        let templates = ThemeTemplates::load(&tmp.path().join("templates")).unwrap();
        assert!(templates.files().is_empty());
    }

    #[test]
    fn select_prefers_earliest_candidate() {
        let tmp = write_tree(&[("node.jinja", ""), ("node-blog.jinja", "")]);
        let templates = ThemeTemplates::load(tmp.path()).unwrap();

        let chosen = templates
            .select(&names(&["node-blog-post", "node-blog", "node"]))
            .unwrap();
        assert_eq!(chosen.file_name().unwrap(), "node-blog.jinja");
    }

    #[test]
    fn select_matches_whole_stem_only() {
        let tmp = write_tree(&[("node-blog.jinja", "")]);
        let templates = ThemeTemplates::load(tmp.path()).unwrap();
        assert!(templates.select(&names(&["node"])).is_none());
    }

    #[test]
    fn unknown_engine_extension() {
        let tmp = write_tree(&[]);
        let engines = TemplateEngines::with_defaults(tmp.path());
        assert!(engines.has("jinja"));
        assert!(engines.has("j2"));
        assert!(!engines.has("ibis"));
    }
}
