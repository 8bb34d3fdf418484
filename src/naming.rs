//! Centralized filename parsing and slug generation.
//!
//! Every node in the tree takes its identity from a source file or directory
//! name. This module owns the rules that turn those names into stems,
//! extensions, and URL-safe slugs, so the scanner and the page pipeline agree
//! on them.
//!
//! ## Slugs
//!
//! - `"About Us"` → `"about-us"`
//! - `"Crème Brûlée"` → `"creme-brulee"` (transliterated)
//! - `"don't panic!"` → `"dont-panic"` (apostrophes dropped)
//! - `"--a  b--"` → `"a-b"` (runs collapsed, ends trimmed)
//!
//! ## Ignored entries
//!
//! Names starting with `.` (dotfiles) are never part of the tree. Files
//! whose stem ends in `~` are editor backups and are skipped too.

use std::path::Path;

/// Result of splitting a source file name like `About Us.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// File name minus its final extension (`"About Us"`).
    pub stem: String,
    /// Final extension without the leading dot (`"md"`). Empty when absent.
    pub ext: String,
}

/// Split a path's file name into stem and extension.
pub fn parse_file_name(path: &Path) -> ParsedName {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    ParsedName { stem, ext }
}

/// True for names the scanner must never turn into nodes.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// True for editor backup files (`notes.md~`, `notes~.md`).
pub fn is_backup(name: &str, stem: &str) -> bool {
    name.ends_with('~') || stem.ends_with('~')
}

/// True when a stem names the enclosing directory's own content file.
pub fn is_index_stem(stem: &str) -> bool {
    stem.eq_ignore_ascii_case("index")
}

/// Default slug preparation: transliterate to ASCII, lower-case, drop
/// apostrophes, and replace every run of other characters with one hyphen.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text).to_lowercase().replace('\'', "");

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;
    for c in ascii.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn slugify_spaces_and_case() {
        assert_eq!(slugify("About Us"), "about-us");
    }

    #[test]
    fn slugify_transliterates() {
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
    }

    #[test]
    fn slugify_drops_apostrophes() {
        assert_eq!(slugify("don't panic!"), "dont-panic");
    }

    #[test]
    fn slugify_collapses_and_trims_hyphens() {
        assert_eq!(slugify("--a  b--"), "a-b");
        assert_eq!(slugify("post--1"), "post-1");
    }

    #[test]
    fn slugify_keeps_digits() {
        assert_eq!(slugify("2024 Recap"), "2024-recap");
    }

    #[test]
    fn slugify_of_symbols_is_empty() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn parse_file_name_splits_last_extension() {
        let p = parse_file_name(&PathBuf::from("src/notes.draft.md"));
        assert_eq!(p.stem, "notes.draft");
        assert_eq!(p.ext, "md");
    }

    #[test]
    fn parse_file_name_without_extension() {
        let p = parse_file_name(&PathBuf::from("src/README"));
        assert_eq!(p.stem, "README");
        assert_eq!(p.ext, "");
    }

    #[test]
    fn hidden_and_backup_names() {
        assert!(is_hidden(".DS_Store"));
        assert!(!is_hidden("about.md"));
        assert!(is_backup("about.md~", "about.md~"));
        assert!(is_backup("about~.md", "about~"));
        assert!(!is_backup("about.md", "about"));
    }

    #[test]
    fn index_stem_is_case_insensitive() {
        assert!(is_index_stem("index"));
        assert!(is_index_stem("INDEX"));
        assert!(is_index_stem("Index"));
        assert!(!is_index_stem("indexes"));
    }
}
