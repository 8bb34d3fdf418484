//! Virtual root URL rewriting.
//!
//! Authors link to other pages and assets with `@root/` URLs, which do not
//! depend on where the linking page ends up:
//!
//! | Written | From `index.html` | From `blog/post.html` |
//! |---------|-------------------|-----------------------|
//! | `"@root/"` | `"index.html"` | `"../index.html"` |
//! | `"@root/blog//"` | `"blog.html"` | `"../blog.html"` |
//! | `"@root/css/site.css"` | `"css/site.css"` | `"../css/site.css"` |
//!
//! A trailing `//` marks a page reference: the slashes are replaced by the
//! output extension (or a single `/` for directory-style output). Anything
//! else is an asset path kept as written. With an absolute `root` URL set,
//! every link is prefixed by it instead of by `../` segments.
//!
//! Only occurrences inside quotes (`"@root/..."`, `'@root/...'`) or angle
//! brackets (`<@root/...>`) are rewritten, so prose that merely mentions the
//! token survives. Quotes are kept; angle brackets are consumed.

use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

static ROOT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    // One alternative per delimiter, since the regex crate has no
    // backreferences. Groups: (path, fragment) x3.
    Regex::new(
        r##""@root/([^"#]*?)(#[^"]*)?"|'@root/([^'#]*?)(#[^']*)?'|<@root/([^>#]*?)(#[^>]*)?>"##,
    )
    .expect("invalid root link regex")
});

/// How links are resolved.
#[derive(Debug, Clone, Copy)]
pub struct UrlStyle<'a> {
    /// Absolute root URL ending in `/`, or empty for relative links.
    pub root: &'a str,
    /// Output extension, or `/` for directory-style output.
    pub extension: &'a str,
}

impl UrlStyle<'_> {
    fn directory_style(&self) -> bool {
        self.extension == "/"
    }
}

/// Rewrite every delimited `@root/` link in `html` for a page written to
/// `rel_output` (relative to the output root, e.g. `blog/post.html`).
pub fn rewrite_urls(html: &str, rel_output: &Path, style: UrlStyle<'_>) -> String {
    let depth = rel_output.components().count();
    ROOT_LINK
        .replace_all(html, |caps: &Captures<'_>| {
            let (open, close, path, fragment) = if let Some(path) = caps.get(1) {
                ("\"", "\"", path, caps.get(2))
            } else if let Some(path) = caps.get(3) {
                ("'", "'", path, caps.get(4))
            } else if let Some(path) = caps.get(5) {
                ("", "", path, caps.get(6))
            } else {
                return caps[0].to_string();
            };
            let fragment = fragment.map_or("", |f| f.as_str());
            format!(
                "{open}{}{close}",
                resolve(path.as_str(), fragment, depth, style)
            )
        })
        .into_owned()
}

/// Resolve one `@root/` remainder plus fragment at the given output depth.
pub fn resolve(path: &str, fragment: &str, depth: usize, style: UrlStyle<'_>) -> String {
    let prefix = if style.root.is_empty() {
        "../".repeat(depth.saturating_sub(1))
    } else {
        style.root.to_string()
    };

    let path = path.trim_start_matches('/');
    let url = if path.is_empty() {
        if style.directory_style() {
            prefix
        } else {
            format!("{prefix}index{}", style.extension)
        }
    } else if let Some(page) = path.strip_suffix("//") {
        let page = page.trim_end_matches('/');
        if style.directory_style() {
            format!("{prefix}{page}/")
        } else {
            format!("{prefix}{page}{}", style.extension)
        }
    } else {
        format!("{prefix}{path}")
    };
    format!("{url}{fragment}")
}
