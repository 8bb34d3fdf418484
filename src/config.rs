//! Site configuration module.
//!
//! Handles loading, validating, and merging `site.toml`. Stock defaults are
//! serialized to a TOML table and the user file is deep-merged on top, so a
//! `site.toml` only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! root = ""              # Absolute root URL; empty means relative links
//! theme = "debug"        # Theme name, looked up under lib/ then $QUIRE_THEMES
//! extension = ".html"    # Output suffix, or "/" for directory-style pages
//! emit_directory_nodes = true  # Pages for directories without a content file
//!
//! [dirs]
//! src = "src"            # Source tree
//! out = "out"            # Output tree
//! lib = "lib"            # Theme library
//! inc = "inc"            # Include snippets
//! res = "res"            # Static resources copied verbatim
//!
//! [markdown]
//! tables = true
//! footnotes = true
//! strikethrough = true
//! smart_punctuation = false
//! heading_attributes = false
//!
//! [shortcodes]
//! start = "[%"           # Opening delimiter
//! end = "%]"             # Closing delimiter
//! escape = "\\"          # Prefix that keeps a tag literal
//! ender = "end"          # Closing tag prefix: [% note %]...[% endnote %]
//! ```
//!
//! Any other top-level key (`title = "My Site"`, `[author]`) is kept as
//! free-form site metadata and handed to templates as `site.<key>`. TOML
//! datetimes in it become strings in their TOML spelling.

use crate::value::Metadata;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file that marks a site's home directory.
pub const CONFIG_FILENAME: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("no site found: no {CONFIG_FILENAME} or src/ + out/ above {}", .0.display())]
    HomeNotFound(PathBuf),
    #[error("{kind} directory not found: {}", path.display())]
    MissingDir { kind: &'static str, path: PathBuf },
    #[error("theme '{0}' not found")]
    ThemeNotFound(String),
}

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Absolute root URL. Empty for relative links; otherwise ends in `/`.
    pub root: String,
    /// Theme name or path.
    pub theme: String,
    /// Output file suffix (`.html`), or `/` for `slug/index.html` output.
    pub extension: String,
    /// Write pages for nodes built from a directory with no content file.
    pub emit_directory_nodes: bool,
    pub dirs: DirsConfig,
    pub markdown: MarkdownConfig,
    pub shortcodes: ShortcodeConfig,
    /// Every other top-level key.
    #[serde(flatten)]
    pub meta: Metadata,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            theme: "debug".to_string(),
            extension: ".html".to_string(),
            emit_directory_nodes: true,
            dirs: DirsConfig::default(),
            markdown: MarkdownConfig::default(),
            shortcodes: ShortcodeConfig::default(),
            meta: Metadata::new(),
        }
    }
}

impl SiteConfig {
    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extension != "/" && !self.extension.starts_with('.') {
            return Err(ConfigError::Validation(format!(
                "extension must be \"/\" or start with \".\", got {:?}",
                self.extension
            )));
        }
        if self.extension.len() > 1 && self.extension.contains('/') {
            return Err(ConfigError::Validation(format!(
                "extension must not contain \"/\", got {:?}",
                self.extension
            )));
        }
        if self.theme.trim().is_empty() {
            return Err(ConfigError::Validation("theme must not be empty".into()));
        }
        let sc = &self.shortcodes;
        if sc.start.is_empty() || sc.end.is_empty() || sc.ender.is_empty() {
            return Err(ConfigError::Validation(
                "shortcode start, end and ender must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// True when pages are written as `slug/index.html`.
    pub fn directory_style(&self) -> bool {
        self.extension == "/"
    }

    /// Bring derived values into canonical form. Called after every load.
    fn normalize(&mut self) {
        if !self.root.is_empty() && !self.root.ends_with('/') {
            self.root.push('/');
        }
    }

    /// Apply command-line overrides on top of the loaded file.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        let dirs = [
            (&mut self.dirs.src, &overrides.src),
            (&mut self.dirs.out, &overrides.out),
            (&mut self.dirs.lib, &overrides.lib),
            (&mut self.dirs.inc, &overrides.inc),
            (&mut self.dirs.res, &overrides.res),
        ];
        for (slot, value) in dirs {
            if let Some(v) = value {
                *slot = v.to_string_lossy().into_owned();
            }
        }
        if let Some(theme) = &overrides.theme {
            self.theme = theme.clone();
        }
    }
}

/// Site directory layout, relative to the home directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirsConfig {
    pub src: String,
    pub out: String,
    pub lib: String,
    pub inc: String,
    pub res: String,
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            src: "src".to_string(),
            out: "out".to_string(),
            lib: "lib".to_string(),
            inc: "inc".to_string(),
            res: "res".to_string(),
        }
    }
}

/// Markdown extensions enabled for the bundled renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    pub tables: bool,
    pub footnotes: bool,
    pub strikethrough: bool,
    /// Curly quotes and dashes.
    pub smart_punctuation: bool,
    /// `# Heading {#id .class}` syntax.
    pub heading_attributes: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            smart_punctuation: false,
            heading_attributes: false,
        }
    }
}

/// Shortcode tag syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShortcodeConfig {
    pub start: String,
    pub end: String,
    /// A tag preceded by this is output literally, minus the prefix.
    pub escape: String,
    /// Prefix of the tag closing a block shortcode.
    pub ender: String,
}

impl Default for ShortcodeConfig {
    fn default() -> Self {
        Self {
            start: "[%".to_string(),
            end: "%]".to_string(),
            escape: "\\".to_string(),
            ender: "end".to_string(),
        }
    }
}

/// Values supplied on the command line that replace configured ones.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub src: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub lib: Option<PathBuf>,
    pub inc: Option<PathBuf>,
    pub res: Option<PathBuf>,
    pub theme: Option<String>,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `site.toml` from the home directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `site.toml` exists.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(home: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = home.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let mut config: SiteConfig = stringify_datetimes(merged).try_into()?;
    config.normalize();
    config.validate()?;
    Ok(config)
}

/// Replace every TOML datetime with its string form. Metadata values have no
/// datetime kind.
fn stringify_datetimes(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::Datetime(dt) => toml::Value::String(dt.to_string()),
        toml::Value::Array(items) => {
            toml::Value::Array(items.into_iter().map(stringify_datetimes).collect())
        }
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(key, value)| (key, stringify_datetimes(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Load config from `site.toml` in the given home directory.
pub fn load_config(home: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(home)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `site.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Quire Site Configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# A directory containing this file is recognised as a site's home.

# Absolute root URL. Leave empty to generate relative links
# (e.g. "../about.html"); set it to generate absolute links
# (e.g. "https://example.com/about.html").
root = ""

# Theme name. Looked up as <lib>/<theme>, then $QUIRE_THEMES/<theme>,
# then as a plain directory path.
theme = "debug"

# Output suffix for pages. Use "/" to write each page as <slug>/index.html.
extension = ".html"

# Write a page for a directory that has no content file of its own
# (e.g. src/blog/ without src/blog.md or src/blog/index.md).
emit_directory_nodes = true

# Any other top-level key is site metadata, available to templates as
# site.<key>. For example:
# title = "My Site"

# ---------------------------------------------------------------------------
# Directories, relative to the site's home directory
# ---------------------------------------------------------------------------
[dirs]
src = "src"   # Source files
out = "out"   # Generated site
lib = "lib"   # Themes
inc = "inc"   # Include snippets, available to templates as includes.<stem>
res = "res"   # Resources copied verbatim into the output root

# ---------------------------------------------------------------------------
# Markdown
# ---------------------------------------------------------------------------
[markdown]
tables = true
footnotes = true
strikethrough = true
smart_punctuation = false
heading_attributes = false

# ---------------------------------------------------------------------------
# Shortcodes: [% name arg key=value %] and [% name %]...[% endname %]
# ---------------------------------------------------------------------------
[shortcodes]
start = "[%"
end = "%]"
escape = "\\"   # \[% name %] is written out as [% name %]
ender = "end"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.root, "");
        assert_eq!(config.theme, "debug");
        assert_eq!(config.extension, ".html");
        assert_eq!(config.dirs.src, "src");
        assert_eq!(config.dirs.out, "out");
        assert!(config.markdown.tables);
        assert!(!config.markdown.smart_punctuation);
        assert!(!config.directory_style());
    }

    #[test]
    fn parse_partial_config() {
        let config: SiteConfig = toml::from_str("extension = \"/\"\n").unwrap();
        assert!(config.directory_style());
        assert_eq!(config.theme, "debug");
        assert_eq!(config.dirs.inc, "inc");
    }

    #[test]
    fn unknown_top_level_keys_become_site_metadata() {
        let config: SiteConfig = toml::from_str(
            r#"
title = "Notebook"
[author]
name = "Ada"
"#,
        )
        .unwrap();
        assert_eq!(config.meta["title"], Value::from("Notebook"));
        assert_eq!(
            config.meta["author"].as_map().unwrap()["name"],
            Value::from("Ada")
        );
    }

    #[test]
    fn unknown_keys_in_dirs_are_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[dirs]\nsource = \"x\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.theme, "debug");
        assert!(config.meta.is_empty());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
theme = "plain"
title = "Notes"

[dirs]
out = "public"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.theme, "plain");
        assert_eq!(config.dirs.out, "public");
        // Unspecified values keep their defaults
        assert_eq!(config.dirs.src, "src");
        assert_eq!(config.meta["title"].as_str(), Some("Notes"));
    }

    #[test]
    fn load_config_normalizes_root_url() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "root = \"https://example.com/docs\"\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.root, "https://example.com/docs/");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_keeps_datetimes_as_strings() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "date = 2024-01-01\n[event]\nat = 1979-05-27T07:32:00Z\ntimes = [07:32:00]\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.meta["date"], Value::from("2024-01-01"));
        let event = config.meta["event"].as_map().unwrap();
        assert_eq!(event["at"], Value::from("1979-05-27T07:32:00Z"));
        assert_eq!(event["times"], Value::from(vec!["07:32:00"]));
    }

    #[test]
    fn directory_nodes_are_emitted_by_default() {
        assert!(SiteConfig::default().emit_directory_nodes);
        let config: SiteConfig = toml::from_str("emit_directory_nodes = false\n").unwrap();
        assert!(!config.emit_directory_nodes);
        assert!(config.meta.is_empty());
    }

    #[test]
    fn shortcode_delimiters_must_not_be_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[shortcodes]\nstart = \"\"\n").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_rejects_bad_extension() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "extension = \"html\"\n").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.theme, defaults.theme);
        assert_eq!(config.extension, defaults.extension);
        assert_eq!(config.dirs.res, defaults.dirs.res);
        assert!(config.meta.is_empty());
    }

    #[test]
    fn overrides_replace_configured_values() {
        let mut config = SiteConfig::default();
        config.apply_overrides(&ConfigOverrides {
            out: Some(PathBuf::from("/tmp/site-out")),
            theme: Some("plain".into()),
            ..Default::default()
        });
        assert_eq!(config.dirs.out, "/tmp/site-out");
        assert_eq!(config.dirs.src, "src");
        assert_eq!(config.theme, "plain");
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"theme = "debug""#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"theme = "plain""#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("theme").unwrap().as_str(), Some("plain"));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[markdown]\ntables = false\n").unwrap();
        let merged = merge_toml(base, overlay);
        let markdown = merged.get("markdown").unwrap();
        assert_eq!(markdown.get("tables").unwrap().as_bool(), Some(false));
        // siblings preserved from base
        assert_eq!(markdown.get("footnotes").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("a = 10").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(10));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }
}
