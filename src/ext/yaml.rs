//! YAML front matter.
//!
//! A source file may open with a YAML mapping fenced by `---` lines. The
//! block is removed from the text and its keys are merged into the node's
//! metadata, overriding anything the loader supplied.
//!
//! ```text
//! ---
//! title: About
//! menu_order: 2
//! ---
//! The page body starts here.
//! ```

use crate::hooks::{BoxError, HookBus, HookId};
use crate::value::Metadata;
use regex::Regex;
use std::sync::LazyLock;

/// Registration order. Runs before other `file_text` filters so they see
/// the body without its header.
pub const ORDER: i32 = 0;

static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)\A---[ \t]*\r?\n(.*?)^---[ \t]*(?:\r?\n|\z)")
        .expect("invalid front matter regex")
});

pub fn register(hooks: &mut HookBus) -> HookId {
    hooks.on_file_text(ORDER, |text, meta| strip_front_matter(text, meta))
}

/// Remove a leading front matter block from `text`, merging it into `meta`.
/// Text without one is returned unchanged.
pub fn strip_front_matter(text: String, meta: &mut Metadata) -> Result<String, BoxError> {
    let Some(caps) = FRONT_MATTER.captures(&text) else {
        return Ok(text);
    };
    let yaml = caps.get(1).map_or("", |m| m.as_str());
    if !yaml.trim().is_empty() {
        let parsed: Metadata = serde_yaml::from_str(yaml)?;
        meta.extend(parsed);
    }
    let body_start = caps.get(0).map_or(0, |m| m.end());
    Ok(text[body_start..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn strip(text: &str) -> (String, Metadata) {
        let mut meta = Metadata::new();
        let body = strip_front_matter(text.to_string(), &mut meta).unwrap();
        (body, meta)
    }

    #[test]
    fn parses_mapping_and_strips_block() {
        let (body, meta) = strip("---\ntitle: About\nmenu_order: 2\n---\nBody\n");
        assert_eq!(body, "Body\n");
        assert_eq!(meta["title"], Value::from("About"));
        assert_eq!(meta["menu_order"], Value::Int(2));
    }

    #[test]
    fn text_without_header_is_unchanged() {
        let (body, meta) = strip("# Title\n---\nnot: yaml\n---\n");
        assert_eq!(body, "# Title\n---\nnot: yaml\n---\n");
        assert!(meta.is_empty());
    }

    #[test]
    fn empty_block_is_stripped() {
        let (body, meta) = strip("---\n---\nBody");
        assert_eq!(body, "Body");
        assert!(meta.is_empty());
    }

    #[test]
    fn crlf_line_endings() {
        let (body, meta) = strip("---\r\ntitle: Win\r\n---\r\nBody");
        assert_eq!(body, "Body");
        assert_eq!(meta["title"], Value::from("Win"));
    }

    #[test]
    fn block_at_end_of_file() {
        let (body, meta) = strip("---\ndraft: true\n---");
        assert_eq!(body, "");
        assert_eq!(meta["draft"], Value::Bool(true));
    }

    #[test]
    fn header_overrides_existing_metadata() {
        let mut meta = Metadata::new();
        meta.insert("title".into(), Value::from("From loader"));
        strip_front_matter("---\ntitle: From header\n---\n".into(), &mut meta).unwrap();
        assert_eq!(meta["title"], Value::from("From header"));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let mut meta = Metadata::new();
        assert!(strip_front_matter("---\ntitle: [unclosed\n---\n".into(), &mut meta).is_err());
    }

    #[test]
    fn registered_as_file_text_filter() {
        let mut hooks = HookBus::new();
        register(&mut hooks);
        let mut meta = Metadata::new();
        let body = hooks.file_text("---\na: 1\n---\nx".into(), &mut meta).unwrap();
        assert_eq!(body, "x");
        assert_eq!(meta["a"], Value::Int(1));
    }
}
