//! Build cache
//!
//! Records, per module, the content fingerprint of every source file that
//! compiled successfully together with the artifact it produced. The cache
//! file carries a format version; a file written by an incompatible version
//! is treated as absent rather than misread.
//!
//! Several module tasks may share one cache file. Writes are serialized with
//! an advisory lock on a sidecar `.lock` file, and a flush only replaces the
//! flushing module's own section.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::config::defaults::BUILD_CACHE_FORMAT_VERSION;
use crate::error::CacheError;
use crate::infra::filesystem::{self, create_dir_all};

/// Last known state of one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// SHA-256 of the source contents at the last successful compile
    pub fingerprint: String,

    /// When the output was produced, in milliseconds since the Unix epoch
    pub output_timestamp: u64,

    /// Artifact produced for this source, if one could be identified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// One module's view of the build cache
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildCache {
    module: String,
    entries: BTreeMap<PathBuf, CacheEntry>,
}

impl BuildCache {
    /// Create an empty cache for a module
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Module identity this cache belongs to
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Entry for a source file
    pub fn get(&self, source: &Path) -> Option<&CacheEntry> {
        self.entries.get(source)
    }

    /// Record a successfully compiled source file
    pub fn record(&mut self, source: PathBuf, entry: CacheEntry) {
        self.entries.insert(source, entry);
    }

    /// Forget a source file
    pub fn remove(&mut self, source: &Path) -> Option<CacheEntry> {
        self.entries.remove(source)
    }

    /// Iterate over all entries
    pub fn entries(&self) -> impl Iterator<Item = (&PathBuf, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of loading a module's cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLoad {
    /// Cache read successfully (possibly with no entries for this module)
    Loaded(BuildCache),
    /// No cache file yet
    Missing,
    /// Written by a different format version
    Incompatible { found: u32 },
    /// Unreadable or unparseable
    Corrupted { reason: String },
}

impl CacheLoad {
    /// The usable cache, or `None` when a full rebuild is required
    ///
    /// Incompatible and corrupted caches are logged as warnings here.
    pub fn into_cache(self) -> Option<BuildCache> {
        match self {
            CacheLoad::Loaded(cache) => Some(cache),
            CacheLoad::Missing => None,
            CacheLoad::Incompatible { found } => {
                tracing::warn!(
                    "Build cache format version {found} is not supported (expected {BUILD_CACHE_FORMAT_VERSION}), rebuilding everything"
                );
                None
            }
            CacheLoad::Corrupted { reason } => {
                tracing::warn!("Build cache is corrupted ({reason}), rebuilding everything");
                None
            }
        }
    }
}

/// On-disk layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    format_version: u32,
    #[serde(default)]
    modules: BTreeMap<String, ModuleSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ModuleSection {
    #[serde(default)]
    entries: BTreeMap<PathBuf, CacheEntry>,
}

/// Persisted cache file shared by all modules of a build
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Cache store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn open_lock(&self) -> Result<File, CacheError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            create_dir_all(parent).map_err(|e| CacheError::Lock {
                path: lock_path.clone(),
                error: e.to_string(),
            })?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| CacheError::Lock {
                path: lock_path,
                error: e.to_string(),
            })
    }

    /// Load the section for `module`
    pub fn load(&self, module: &str) -> CacheLoad {
        if !self.path.exists() {
            return CacheLoad::Missing;
        }

        let lock = match self.open_lock() {
            Ok(lock) => match FileExt::lock_shared(&lock) {
                Ok(()) => Some(lock),
                Err(e) => {
                    tracing::debug!("Reading build cache without lock: {e}");
                    None
                }
            },
            Err(e) => {
                tracing::debug!("Reading build cache without lock: {e}");
                None
            }
        };

        let result = match self.read_file() {
            Ok(mut file) => {
                let mut cache = BuildCache::new(module);
                if let Some(section) = file.modules.remove(module) {
                    cache.entries = section.entries;
                }
                CacheLoad::Loaded(cache)
            }
            Err(load) => load,
        };

        if let Some(lock) = lock {
            let _ = FileExt::unlock(&lock);
        }
        result
    }

    /// Write `cache` back as its module's section
    ///
    /// Sections of other modules are preserved. An unreadable or
    /// incompatible existing file is replaced.
    pub fn flush(&self, cache: &BuildCache) -> Result<(), CacheError> {
        self.update(|file| {
            file.modules.insert(
                cache.module.clone(),
                ModuleSection {
                    entries: cache.entries.clone(),
                },
            );
        })?;
        tracing::debug!(
            "Flushed {} build cache entries for {}",
            cache.len(),
            cache.module
        );
        Ok(())
    }

    /// Drop the section for `module`; returns whether one existed
    pub fn clear_module(&self, module: &str) -> Result<bool, CacheError> {
        if !self.path.exists() {
            return Ok(false);
        }
        let mut existed = false;
        self.update(|file| {
            existed = file.modules.remove(module).is_some();
        })?;
        Ok(existed)
    }

    /// Module identities with a section in the cache file
    pub fn modules(&self) -> Vec<String> {
        self.read_file()
            .map(|file| file.modules.into_keys().collect())
            .unwrap_or_default()
    }

    fn update(&self, apply: impl FnOnce(&mut CacheFile)) -> Result<(), CacheError> {
        let lock = self.open_lock()?;
        FileExt::lock_exclusive(&lock).map_err(|e| CacheError::Lock {
            path: self.lock_path(),
            error: e.to_string(),
        })?;

        let result = self.update_locked(apply);

        let _ = FileExt::unlock(&lock);
        result
    }

    fn update_locked(&self, apply: impl FnOnce(&mut CacheFile)) -> Result<(), CacheError> {
        let mut file = if self.path.exists() {
            self.read_file().unwrap_or_else(|load| {
                tracing::warn!("Replacing unusable build cache: {load:?}");
                CacheFile::default()
            })
        } else {
            CacheFile::default()
        };
        file.format_version = BUILD_CACHE_FORMAT_VERSION;
        apply(&mut file);

        let content =
            serde_json::to_string_pretty(&file).map_err(|e| CacheError::Serialize(e.to_string()))?;
        filesystem::write_file_atomic(&self.path, &content).map_err(|e| CacheError::Write {
            path: self.path.clone(),
            error: e.to_string(),
        })
    }

    fn read_file(&self) -> Result<CacheFile, CacheLoad> {
        let content = filesystem::read_file(&self.path).map_err(|e| CacheLoad::Corrupted {
            reason: e.to_string(),
        })?;

        // Check the version before the full shape so newer layouts are
        // reported as incompatible rather than corrupted.
        let header: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| CacheLoad::Corrupted {
                reason: e.to_string(),
            })?;
        let found = header
            .get("format_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| CacheLoad::Corrupted {
                reason: "missing format_version".to_string(),
            })?;
        if found != u64::from(BUILD_CACHE_FORMAT_VERSION) {
            return Err(CacheLoad::Incompatible {
                found: u32::try_from(found).unwrap_or(u32::MAX),
            });
        }

        serde_json::from_value(header).map_err(|e| CacheLoad::Corrupted {
            reason: e.to_string(),
        })
    }
}
