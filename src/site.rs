//! Locating a site on disk.
//!
//! A site's *home* is the directory holding its `site.toml`, or failing that
//! a directory with both `src/` and `out/` subdirectories. Every other path
//! is resolved relative to home unless configured as absolute.
//!
//! Themes are looked up in order:
//!
//! 1. `<lib>/<theme>`
//! 2. `$QUIRE_THEMES/<theme>`
//! 3. `<theme>` as a directory path, relative to home

use crate::config::{CONFIG_FILENAME, ConfigError, SiteConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a shared directory of themes.
pub const THEMES_ENV: &str = "QUIRE_THEMES";

/// Walk up from `start` to the nearest site home.
pub fn find_home(start: &Path) -> Result<PathBuf, ConfigError> {
    let start = std::path::absolute(start)?;
    start
        .ancestors()
        .find(|dir| is_home(dir))
        .map(Path::to_path_buf)
        .ok_or(ConfigError::HomeNotFound(start))
}

fn is_home(dir: &Path) -> bool {
    dir.join(CONFIG_FILENAME).is_file() || (dir.join("src").is_dir() && dir.join("out").is_dir())
}

/// Resolve a theme name to its directory.
///
/// `themes_env` is the value of `$QUIRE_THEMES`, passed in so callers (and
/// tests) control the environment. A relative path is taken from `home`, not
/// the working directory.
pub fn find_theme(
    home: &Path,
    lib: &Path,
    theme: &str,
    themes_env: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    let candidates = [
        Some(lib.join(theme)),
        themes_env.map(|dir| dir.join(theme)),
        Some(home.join(theme)),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|dir| dir.is_dir())
        .ok_or_else(|| ConfigError::ThemeNotFound(theme.to_string()))
}

/// Absolute paths for one build.
#[derive(Debug, Clone)]
pub struct SitePaths {
    pub home: PathBuf,
    pub src: PathBuf,
    pub out: PathBuf,
    pub lib: PathBuf,
    pub inc: PathBuf,
    pub res: PathBuf,
    pub theme: PathBuf,
}

impl SitePaths {
    /// Resolve and check every directory named by `config`.
    ///
    /// The source directory and theme must exist. The output directory is
    /// created by the build when missing; `inc` and `res` are optional.
    pub fn resolve(home: &Path, config: &SiteConfig) -> Result<Self, ConfigError> {
        let themes_env = std::env::var_os(THEMES_ENV).map(PathBuf::from);
        Self::resolve_with(home, config, themes_env.as_deref())
    }

    pub fn resolve_with(
        home: &Path,
        config: &SiteConfig,
        themes_env: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let home = std::path::absolute(home)?;
        let src = home.join(&config.dirs.src);
        if !src.is_dir() {
            return Err(ConfigError::MissingDir {
                kind: "source",
                path: src,
            });
        }
        let lib = home.join(&config.dirs.lib);
        let theme = find_theme(&home, &lib, &config.theme, themes_env)?;
        let theme = std::path::absolute(theme)?;
        debug!(theme = %theme.display(), "resolved theme");

        Ok(Self {
            out: home.join(&config.dirs.out),
            inc: home.join(&config.dirs.inc),
            res: home.join(&config.dirs.res),
            src,
            lib,
            theme,
            home,
        })
    }

    /// The theme's flat template directory.
    pub fn templates(&self) -> PathBuf {
        self.theme.join("templates")
    }

    /// The theme's static resources.
    pub fn theme_resources(&self) -> PathBuf {
        self.theme.join("resources")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn find_home_by_config_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "").unwrap();
        let nested = tmp.path().join("src/deep/er");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_home(&nested).unwrap(), tmp.path());
    }

    #[test]
    fn find_home_by_src_and_out_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src/blog")).unwrap();
        fs::create_dir(tmp.path().join("out")).unwrap();

        assert_eq!(find_home(&tmp.path().join("src/blog")).unwrap(), tmp.path());
    }

    #[test]
    fn src_alone_is_not_a_home() {
        let tmp = TempDir::new().unwrap();
        let lone = tmp.path().join("lone");
        fs::create_dir_all(lone.join("src")).unwrap();

        // Walking up may find an unrelated home above the temp dir, never `lone`.
        if let Ok(home) = find_home(&lone) {
            assert_ne!(home, lone);
        }
    }

    #[test]
    fn theme_lookup_prefers_lib() {
        let tmp = TempDir::new().unwrap();
        let lib = tmp.path().join("lib");
        let shared = tmp.path().join("shared");
        fs::create_dir_all(lib.join("plain")).unwrap();
        fs::create_dir_all(shared.join("plain")).unwrap();

        let found = find_theme(tmp.path(), &lib, "plain", Some(&shared)).unwrap();
        assert_eq!(found, lib.join("plain"));
    }

    #[test]
    fn theme_lookup_falls_back_to_env_dir() {
        let tmp = TempDir::new().unwrap();
        let shared = tmp.path().join("shared");
        fs::create_dir_all(shared.join("plain")).unwrap();

        let found = find_theme(tmp.path(), &tmp.path().join("lib"), "plain", Some(&shared)).unwrap();
        assert_eq!(found, shared.join("plain"));
    }

    #[test]
    fn theme_lookup_accepts_raw_path() {
        let tmp = TempDir::new().unwrap();
        let raw = tmp.path().join("elsewhere/theme");
        fs::create_dir_all(&raw).unwrap();

        let found = find_theme(tmp.path(), &tmp.path().join("lib"), raw.to_str().unwrap(), None).unwrap();
        assert_eq!(found, raw);
    }

    #[test]
    fn relative_theme_path_is_taken_from_home() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("themes/mine")).unwrap();

        let found = find_theme(tmp.path(), &tmp.path().join("lib"), "themes/mine", None).unwrap();
        assert_eq!(found, tmp.path().join("themes/mine"));
    }

    #[test]
    fn resolve_finds_relative_theme_from_any_working_dir() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::create_dir_all(tmp.path().join("design/templates")).unwrap();
        let config = SiteConfig {
            theme: "design".to_string(),
            ..SiteConfig::default()
        };

        let paths = SitePaths::resolve_with(tmp.path(), &config, None).unwrap();
        assert_eq!(paths.theme, tmp.path().join("design"));
    }

    #[test]
    fn missing_theme_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let err = find_theme(tmp.path(), &tmp.path().join("lib"), "no-such-theme", None).unwrap_err();
        assert!(matches!(err, ConfigError::ThemeNotFound(name) if name == "no-such-theme"));
    }

    #[test]
    fn resolve_requires_source_dir() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("lib/debug")).unwrap();

        let err = SitePaths::resolve_with(tmp.path(), &SiteConfig::default(), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDir { kind: "source", .. }));
    }

    #[test]
    fn resolve_builds_absolute_paths() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::create_dir_all(tmp.path().join("lib/debug/templates")).unwrap();

        let paths = SitePaths::resolve_with(tmp.path(), &SiteConfig::default(), None).unwrap();
        assert_eq!(paths.src, tmp.path().join("src"));
        assert_eq!(paths.out, tmp.path().join("out"));
        assert_eq!(paths.templates(), tmp.path().join("lib/debug/templates"));
    }
}
