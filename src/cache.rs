//! Content-hash build cache for incremental builds.
//!
//! Most pages do not change between builds. Rewriting them anyway bumps
//! their modification times, which defeats rsync-style deploys and file
//! watchers. This module lets the pipeline skip a write when the bytes it
//! would write are identical to what the previous build wrote.
//!
//! # Design
//!
//! The cache maps each output path (relative to the output root, `/`
//! separated) to the SHA-256 of the bytes last written or confirmed there.
//! A page is skipped when:
//! 1. the stored hash equals the hash of the new bytes, and
//! 2. the output file still exists on disk.
//!
//! The new hash is recorded either way, so the next build compares against
//! what this build produced. Entries for pages that are no longer generated
//! stay in the map; they are harmless and only ever cause one extra write.
//!
//! ## Storage
//!
//! The cache is a versioned JSON file in a per-user cache directory, named by
//! the SHA-256 of the site's home path so unrelated sites never collide:
//!
//! ```text
//! ~/.cache/quire/3f2a…9c.json
//! ```
//!
//! The file is only rewritten when some hash changed. Two builds of one site
//! running at the same time do not coordinate; the last to save wins.
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to `build` to start from an empty map. Every page is
//! written, and the fresh hashes are saved for the next build.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Version of the cache file format. Bump this to invalidate all existing
/// caches when the format or hashing changes.
const CACHE_VERSION: u32 = 1;

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "QUIRE_CACHE_DIR";

/// On-disk form of the cache.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    hashes: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct BuildCache {
    file: PathBuf,
    out_dir: PathBuf,
    hashes: BTreeMap<String, String>,
    dirty: bool,
}

impl BuildCache {
    /// An empty cache that will persist to `file`.
    pub fn empty(file: PathBuf, out_dir: &Path) -> Self {
        Self {
            file,
            out_dir: out_dir.to_path_buf(),
            hashes: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load from `file`. Returns an empty cache if the file doesn't exist or
    /// can't be parsed (version mismatch, corruption).
    pub fn load(file: PathBuf, out_dir: &Path) -> Self {
        let mut cache = Self::empty(file, out_dir);
        let content = match fs::read_to_string(&cache.file) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return cache,
            Err(e) => {
                warn!(file = %cache.file.display(), error = %e, "cannot read build cache, starting empty");
                return cache;
            }
        };
        match serde_json::from_str::<CacheFile>(&content) {
            Ok(stored) if stored.version == CACHE_VERSION => {
                debug!(entries = stored.hashes.len(), "loaded build cache");
                cache.hashes = stored.hashes;
            }
            Ok(stored) => {
                debug!(version = stored.version, "build cache version changed, starting empty");
            }
            Err(e) => {
                warn!(file = %cache.file.display(), error = %e, "corrupt build cache, starting empty");
            }
        }
        cache
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// True when `content` is what was last recorded for `output` and the
    /// file is still there. Records the new hash either way.
    pub fn matches(&mut self, output: &Path, content: &[u8]) -> bool {
        let key = self.key(output);
        let hash = hash_bytes(content);
        let unchanged = self.hashes.get(&key) == Some(&hash);
        if !unchanged {
            self.hashes.insert(key, hash);
            self.dirty = true;
        }
        unchanged && output.exists()
    }

    /// Persist if anything changed since loading. Returns whether it wrote.
    pub fn save(&mut self) -> io::Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = CacheFile {
            version: CACHE_VERSION,
            hashes: self.hashes.clone(),
        };
        fs::write(&self.file, serde_json::to_string_pretty(&stored)?)?;
        debug!(file = %self.file.display(), entries = stored.hashes.len(), "saved build cache");
        self.dirty = false;
        Ok(true)
    }

    /// Forget every hash and delete the persisted file.
    pub fn clear(&mut self) -> io::Result<()> {
        self.hashes.clear();
        self.dirty = false;
        match fs::remove_file(&self.file) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Output path relative to the output root, with `/` separators.
    fn key(&self, output: &Path) -> String {
        let rel = output.strip_prefix(&self.out_dir).unwrap_or(output);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// SHA-256 of a byte slice, as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Cache file for the site at `home` inside `cache_dir`.
pub fn cache_file_for(home: &Path, cache_dir: &Path) -> PathBuf {
    let key = hash_bytes(home.to_string_lossy().as_bytes());
    cache_dir.join(format!("{key}.json"))
}

/// Per-user cache directory: `$QUIRE_CACHE_DIR`, else
/// `$XDG_CACHE_HOME/quire`, else `%LOCALAPPDATA%\Quire` on Windows, else
/// `~/.cache/quire`.
pub fn default_cache_dir() -> PathBuf {
    let env_dir = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);

    if let Some(dir) = env_dir(CACHE_DIR_ENV) {
        return dir;
    }
    if let Some(dir) = env_dir("XDG_CACHE_HOME") {
        return dir.join("quire");
    }
    if cfg!(windows)
        && let Some(dir) = env_dir("LOCALAPPDATA")
    {
        return dir.join("Quire");
    }
    PathBuf::from(shellexpand::tilde("~/.cache/quire").into_owned())
}
