//! Shortcodes in node text.
//!
//! Runs on `node_text`, before the renderer sees the text, replacing tags
//! with the output of a named handler:
//!
//! ```text
//! [% link about/team "Meet us" %]          atomic: one tag
//! [% note kind=warn %]Careful.[% endnote %] block: the handler gets the content
//! \[% link about %]                         escaped: written out without the `\`
//! ```
//!
//! Arguments are whitespace separated. Quote an argument to keep its spaces;
//! `key=value` arguments are keywords. Block content is expanded before its
//! handler runs, so blocks nest.
//!
//! Delimiters come from `[shortcodes]` in `site.toml`, read at `init_build`.
//! Any error (unknown name, unclosed block, handler failure) names the node.
//!
//! Bundled handlers:
//!
//! | Tag | Output |
//! |-----|--------|
//! | `[% meta key default=x %]` | the node's (or nearest ancestor's) metadata value |
//! | `[% link path "label" %]` | an `@root/` link to another node, labelled by its title |

use crate::config::ShortcodeConfig;
use crate::hooks::{BoxError, HookBus, HookId, HookResult, TextFilter};
use crate::node::{NodeRef, ROOT_URL};
use maud::html;
use regex::Regex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;
use thiserror::Error;

static ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:([\w-]+)=)?(?:"([^"]*)"|'([^']*)'|(\S+))"#)
        .expect("invalid shortcode argument regex")
});

#[derive(Error, Debug)]
pub enum ShortcodeError {
    #[error("unknown shortcode '{name}' in {node}")]
    Unknown { node: String, name: String },
    #[error("shortcode '{name}' in {node} is never closed")]
    Unclosed { node: String, name: String },
    #[error("'{tag}' in {node} closes no open shortcode")]
    UnexpectedEnd { node: String, tag: String },
    #[error("malformed shortcode '{tag}' in {node}")]
    Syntax { node: String, tag: String },
    #[error("shortcode '{name}' failed in {node}")]
    Handler {
        node: String,
        name: String,
        #[source]
        source: BoxError,
    },
}

/// One parsed tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Shortcode {
    pub name: String,
    /// Positional arguments after the name.
    pub args: Vec<String>,
    /// `key=value` arguments.
    pub kwargs: BTreeMap<String, String>,
}

impl Shortcode {
    /// Parse the text between the delimiters. `None` when there is no name
    /// or a quote is left open.
    pub fn parse(tag: &str) -> Option<Self> {
        let mut call = Shortcode::default();
        for caps in ARGUMENT.captures_iter(tag) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            if caps.get(4).is_some() && value.starts_with(['"', '\'']) {
                return None;
            }
            match caps.get(1) {
                Some(key) if !call.name.is_empty() => {
                    call.kwargs.insert(key.as_str().to_string(), value.to_string());
                }
                Some(_) => return None,
                None if call.name.is_empty() => call.name = value.to_string(),
                None => call.args.push(value.to_string()),
            }
        }
        (!call.name.is_empty()).then_some(call)
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn kwarg(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).map(String::as_str)
    }
}

pub type AtomicFn = dyn Fn(&Shortcode, NodeRef<'_>) -> HookResult<String>;
pub type BlockFn = dyn Fn(&Shortcode, &str, NodeRef<'_>) -> HookResult<String>;

enum Handler {
    Atomic(Box<AtomicFn>),
    Block(Box<BlockFn>),
}

/// Shortcode handlers by name.
#[derive(Default)]
pub struct Shortcodes {
    handlers: BTreeMap<String, Handler>,
}

impl fmt::Debug for Shortcodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

impl Shortcodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled `meta` and `link` handlers.
    pub fn with_builtins() -> Self {
        let mut shortcodes = Self::new();
        shortcodes.register("meta", meta);
        shortcodes.register("link", link);
        shortcodes
    }

    /// Register a single-tag handler, replacing any handler of that name.
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Fn(&Shortcode, NodeRef<'_>) -> HookResult<String> + 'static,
    ) {
        self.handlers
            .insert(name.to_string(), Handler::Atomic(Box::new(handler)));
    }

    /// Register a handler for `[% name %]...[% endname %]` blocks.
    pub fn register_block(
        &mut self,
        name: &str,
        handler: impl Fn(&Shortcode, &str, NodeRef<'_>) -> HookResult<String> + 'static,
    ) {
        self.handlers
            .insert(name.to_string(), Handler::Block(Box::new(handler)));
    }

    fn is_block(&self, name: &str) -> bool {
        matches!(self.handlers.get(name), Some(Handler::Block(_)))
    }
}

enum Token<'t> {
    Text(&'t str),
    Tag(&'t str),
}

/// Tag syntax for one build.
#[derive(Debug, Clone)]
pub struct Syntax {
    tag: Regex,
    start: String,
    ender: String,
}

impl Syntax {
    pub fn new(config: &ShortcodeConfig) -> Result<Self, regex::Error> {
        let escape = if config.escape.is_empty() {
            String::new()
        } else {
            format!("(?P<escape>{})?", regex::escape(&config.escape))
        };
        let tag = Regex::new(&format!(
            "(?s){escape}{}(?P<inner>.*?){}",
            regex::escape(&config.start),
            regex::escape(&config.end)
        ))?;
        Ok(Self {
            tag,
            start: config.start.clone(),
            ender: config.ender.clone(),
        })
    }

    /// Expand every tag in `text`.
    pub fn expand(
        &self,
        text: &str,
        node: NodeRef<'_>,
        shortcodes: &Shortcodes,
    ) -> Result<String, ShortcodeError> {
        if !text.contains(&self.start) {
            return Ok(text.to_string());
        }
        let tokens = self.tokenize(text);
        let mut pos = 0;
        Expansion {
            syntax: self,
            shortcodes,
            node,
            tokens: &tokens,
        }
        .run(&mut pos, None)
    }

    fn tokenize<'t>(&self, text: &'t str) -> Vec<Token<'t>> {
        let mut tokens = Vec::new();
        let mut last = 0;
        for caps in self.tag.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            tokens.push(Token::Text(&text[last..whole.start()]));
            match (caps.name("escape"), caps.name("inner")) {
                (Some(escape), _) => tokens.push(Token::Text(&text[escape.end()..whole.end()])),
                (None, Some(inner)) => tokens.push(Token::Tag(inner.as_str().trim())),
                (None, None) => {}
            }
            last = whole.end();
        }
        tokens.push(Token::Text(&text[last..]));
        tokens
    }
}

struct Expansion<'x, 't> {
    syntax: &'x Syntax,
    shortcodes: &'x Shortcodes,
    node: NodeRef<'x>,
    tokens: &'x [Token<'t>],
}

impl Expansion<'_, '_> {
    /// Expand tokens from `pos` until `closing` (the open block's name) is
    /// closed, or to the end of the text when no block is open.
    fn run(&self, pos: &mut usize, closing: Option<&str>) -> Result<String, ShortcodeError> {
        let url = self.node.url();
        let mut out = String::new();
        while let Some(token) = self.tokens.get(*pos) {
            *pos += 1;
            let tag = match token {
                Token::Text(text) => {
                    out.push_str(text);
                    continue;
                }
                Token::Tag(tag) => *tag,
            };
            let call = Shortcode::parse(tag).ok_or_else(|| ShortcodeError::Syntax {
                node: url.to_string(),
                tag: tag.to_string(),
            })?;

            if let Some(closed) = call.name.strip_prefix(&self.syntax.ender) {
                if closing == Some(closed) {
                    return Ok(out);
                }
                if self.shortcodes.is_block(closed) {
                    return Err(ShortcodeError::UnexpectedEnd {
                        node: url.to_string(),
                        tag: tag.to_string(),
                    });
                }
            }

            let handler_err = |source| ShortcodeError::Handler {
                node: url.to_string(),
                name: call.name.clone(),
                source,
            };
            match self.shortcodes.handlers.get(&call.name) {
                Some(Handler::Atomic(handler)) => {
                    out.push_str(&handler(&call, self.node).map_err(handler_err)?);
                }
                Some(Handler::Block(handler)) => {
                    let content = self.run(pos, Some(&call.name))?;
                    out.push_str(&handler(&call, &content, self.node).map_err(handler_err)?);
                }
                None => {
                    return Err(ShortcodeError::Unknown {
                        node: url.to_string(),
                        name: call.name.clone(),
                    });
                }
            }
        }
        match closing {
            Some(name) => Err(ShortcodeError::Unclosed {
                node: url.to_string(),
                name: name.to_string(),
            }),
            None => Ok(out),
        }
    }
}

/// Register the bundled handlers.
pub fn register(hooks: &mut HookBus) -> [HookId; 2] {
    register_with(hooks, Shortcodes::with_builtins())
}

/// Register `shortcodes` on `node_text`, with the tag syntax reloaded from
/// the site config at every `init_build`. Returns the `init_build` and
/// `node_text` ids.
pub fn register_with(hooks: &mut HookBus, shortcodes: Shortcodes) -> [HookId; 2] {
    let syntax: Rc<RefCell<Option<Syntax>>> = Rc::new(RefCell::new(None));
    let configured = Rc::clone(&syntax);
    let init = hooks.on_init_build(0, move |config| {
        *configured.borrow_mut() = Some(Syntax::new(&config.shortcodes)?);
        Ok(())
    });
    let expand = hooks.on_text(TextFilter::NodeText, 0, move |text, node| {
        if syntax.borrow().is_none() {
            let stock = Syntax::new(&ShortcodeConfig::default())?;
            *syntax.borrow_mut() = Some(stock);
        }
        let current = syntax.borrow();
        match current.as_ref() {
            Some(syntax) => Ok(syntax.expand(&text, node, &shortcodes)?),
            None => Ok(text),
        }
    });
    [init, expand]
}

// =============================================================================
// Bundled handlers
// =============================================================================

fn meta(call: &Shortcode, node: NodeRef<'_>) -> HookResult<String> {
    let key = call.arg(0).ok_or("usage: meta <key> [default=<text>]")?;
    match (node.inherit(key), call.kwarg("default")) {
        (Some(value), _) => Ok(value.to_string()),
        (None, Some(default)) => Ok(default.to_string()),
        (None, None) => Err(format!("no metadata value '{key}'").into()),
    }
}

fn link(call: &Shortcode, node: NodeRef<'_>) -> HookResult<String> {
    let target = call.arg(0).ok_or("usage: link <path> [label]")?;
    let url = if target.starts_with(ROOT_URL) {
        target.to_string()
    } else {
        format!("{ROOT_URL}{}//", target.trim_matches('/'))
    };
    let found = node
        .tree()
        .node_by_url(&url)
        .ok_or_else(|| format!("no node at '{target}'"))?;
    let label = call
        .arg(1)
        .or_else(|| found.get_str("title"))
        .unwrap_or(found.stem());
    Ok(html! { a href=(found.url()) { (label) } }.into_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkdownConfig;
    use crate::node::Tree;
    use crate::renderers::Renderers;
    use crate::scan::{FsLoader, SourceTree};
    use crate::test_helpers::*;

    fn tree(files: &[(&str, &str)]) -> Tree {
        let tmp = write_tree(files);
        let mut hooks = HookBus::new();
        crate::ext::yaml::register(&mut hooks);
        let renderers = Renderers::with_defaults(&MarkdownConfig::default());
        SourceTree::new(&hooks, &renderers, &FsLoader)
            .build(tmp.path())
            .unwrap()
    }

    fn shortcodes() -> Shortcodes {
        let mut shortcodes = Shortcodes::with_builtins();
        shortcodes.register("year", |_, _| Ok("2024".into()));
        shortcodes.register_block("note", |call, content, _| {
            let kind = call.kwarg("kind").unwrap_or("info");
            Ok(format!("<aside class=\"{kind}\">{content}</aside>"))
        });
        shortcodes.register("fail", |_, _| Err("broken".into()));
        shortcodes
    }

    fn expand(text: &str) -> Result<String, ShortcodeError> {
        let tree = tree(&[("a.md", "---\ntitle: Alpha\n---\n"), ("b/c.md", "")]);
        let syntax = Syntax::new(&ShortcodeConfig::default()).unwrap();
        syntax.expand(text, find_node(&tree, "@root/b/c//"), &shortcodes())
    }

    // =========================================================================
    // Tag parsing
    // =========================================================================

    #[test]
    fn parses_positional_and_keyword_arguments() {
        let call = Shortcode::parse(r#"note "two words" 'single' kind=warn title="A B" x"#).unwrap();
        assert_eq!(call.name, "note");
        assert_eq!(call.args, vec!["two words", "single", "x"]);
        assert_eq!(call.kwarg("kind"), Some("warn"));
        assert_eq!(call.kwarg("title"), Some("A B"));
    }

    #[test]
    fn malformed_tags_do_not_parse() {
        assert!(Shortcode::parse("").is_none());
        assert!(Shortcode::parse("key=value").is_none());
        assert!(Shortcode::parse(r#"note "open"#).is_none());
    }

    // =========================================================================
    // Expansion
    // =========================================================================

    #[test]
    fn text_without_tags_is_untouched() {
        assert_eq!(expand("plain [text] 100%").unwrap(), "plain [text] 100%");
    }

    #[test]
    fn atomic_and_block_shortcodes_expand() {
        assert_eq!(
            expand("(c) [% year %]. [% note kind=warn %]Since [%year%].[% endnote %]").unwrap(),
            r#"(c) 2024. <aside class="warn">Since 2024.</aside>"#
        );
    }

    #[test]
    fn blocks_nest() {
        assert_eq!(
            expand("[% note %]a[% note kind=x %]b[% endnote %]c[% endnote %]").unwrap(),
            r#"<aside class="info">a<aside class="x">b</aside>c</aside>"#
        );
    }

    #[test]
    fn escaped_tags_are_literal() {
        assert_eq!(
            expand(r"write \[% year %] to get [% year %]").unwrap(),
            "write [% year %] to get 2024"
        );
    }

    #[test]
    fn custom_delimiters() {
        let config = ShortcodeConfig {
            start: "{{<".into(),
            end: ">}}".into(),
            escape: String::new(),
            ender: "/".into(),
        };
        let tree = tree(&[("a.md", "")]);
        let syntax = Syntax::new(&config).unwrap();
        let out = syntax
            .expand(
                "{{< note >}}x{{< /note >}} [% year %]",
                tree.root(),
                &shortcodes(),
            )
            .unwrap();
        assert_eq!(out, r#"<aside class="info">x</aside> [% year %]"#);
    }

    #[test]
    fn builtin_meta_inherits_and_defaults() {
        let tree = tree(&[
            ("index.md", "---\nauthor: Ada\n---\n"),
            ("post.md", ""),
        ]);
        let syntax = Syntax::new(&ShortcodeConfig::default()).unwrap();
        let post = find_node(&tree, "@root/post//");
        let out = syntax
            .expand(
                "[% meta author %]/[% meta mood default=calm %]",
                post,
                &shortcodes(),
            )
            .unwrap();
        assert_eq!(out, "Ada/calm");
    }

    #[test]
    fn builtin_link_resolves_nodes() {
        assert_eq!(
            expand("[% link a %] [% link @root/b// 'The B' %]").unwrap(),
            r#"<a href="@root/a//">Alpha</a> <a href="@root/b//">The B</a>"#
        );
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn unknown_shortcode_names_the_node() {
        let err = expand("[% nope %]").unwrap_err();
        assert!(matches!(&err, ShortcodeError::Unknown { node, name } if node == "@root/b/c//" && name == "nope"));
        assert_eq!(err.to_string(), "unknown shortcode 'nope' in @root/b/c//");
    }

    #[test]
    fn unclosed_block_is_error() {
        let err = expand("[% note %]never closed").unwrap_err();
        assert!(matches!(err, ShortcodeError::Unclosed { name, .. } if name == "note"));
    }

    #[test]
    fn stray_end_tag_is_error() {
        let err = expand("text[% endnote %]").unwrap_err();
        assert!(matches!(err, ShortcodeError::UnexpectedEnd { tag, .. } if tag == "endnote"));
    }

    #[test]
    fn malformed_tag_is_error() {
        let err = expand(r#"[% note "open %]"#).unwrap_err();
        assert!(matches!(err, ShortcodeError::Syntax { .. }));
    }

    #[test]
    fn handler_failure_keeps_its_cause() {
        let err = expand("[% fail %]").unwrap_err();
        assert_eq!(err.to_string(), "shortcode 'fail' failed in @root/b/c//");
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "broken"
        );
    }

    #[test]
    fn link_to_missing_node_fails() {
        let err = expand("[% link nowhere %]").unwrap_err();
        assert!(matches!(err, ShortcodeError::Handler { name, .. } if name == "link"));
    }

    // =========================================================================
    // Hook registration
    // =========================================================================

    #[test]
    fn init_build_applies_configured_syntax() {
        let mut hooks = HookBus::new();
        let mut shortcodes = Shortcodes::new();
        shortcodes.register("year", |_, _| Ok("2024".into()));
        register_with(&mut hooks, shortcodes);
        let tree = tree(&[("a.md", "")]);
        let expand = |text: &str| {
            hooks
                .text(TextFilter::NodeText, text.to_string(), tree.root())
                .unwrap()
        };

        assert_eq!(expand("[% year %] <<year>>"), "2024 <<year>>");

        let mut config = crate::config::SiteConfig::default();
        config.shortcodes.start = "<<".into();
        config.shortcodes.end = ">>".into();
        hooks.init_build(&config).unwrap();
        assert_eq!(expand("[% year %] <<year>>"), "[% year %] 2024");
    }
}
