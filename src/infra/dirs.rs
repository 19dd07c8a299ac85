//! Platform-specific directory management
//!
//! Provides platform-specific paths for cache and config directories.
//! Follows XDG Base Directory Specification on Linux and standard locations on macOS.
//!
//! Environment variables can override default directories:
//! - `KOMPILE_CACHE_DIR` - Override cache directory
//! - `KOMPILE_CONFIG_DIR` - Override config directory

use std::env;
use std::path::{Path, PathBuf};

use crate::config::defaults::{BUILD_CACHE_FILE, GLOBAL_CONFIG_FILE, STATE_DIR};

/// Environment variable names for directory overrides
pub const ENV_CACHE_DIR: &str = "KOMPILE_CACHE_DIR";
pub const ENV_CONFIG_DIR: &str = "KOMPILE_CONFIG_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "kompile";

/// Platform-specific directory provider for kompile
#[derive(Debug, Clone)]
pub struct KompileDirs {
    cache_dir: Option<PathBuf>,
    config_dir: PathBuf,
}

impl KompileDirs {
    /// Create a new `KompileDirs` instance
    ///
    /// Checks environment variables first, then falls back to platform defaults.
    /// The cache directory has no platform default: build caches live with
    /// the project unless `KOMPILE_CACHE_DIR` is set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache_dir: env::var_os(ENV_CACHE_DIR).map(PathBuf::from),
            config_dir: Self::resolve_config_dir(),
        }
    }

    /// Use explicit directories, ignoring the environment
    #[must_use]
    pub fn with_dirs(cache_dir: Option<PathBuf>, config_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            config_dir,
        }
    }

    /// Get the cache directory override, if any
    #[must_use]
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Get the config directory path
    ///
    /// - Linux: `$XDG_CONFIG_HOME/kompile` or `~/.config/kompile`
    /// - macOS: `~/Library/Application Support/kompile`
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the global config file path
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join(GLOBAL_CONFIG_FILE)
    }

    /// Build cache file for a project
    ///
    /// `<project>/.kompile/build-cache.json`, or a per-project file under the
    /// cache directory override when one is set. `configured` (from the
    /// global config) takes precedence over the platform lookup but not over
    /// the environment.
    #[must_use]
    pub fn build_cache_path(&self, project_dir: &Path, configured: Option<&Path>) -> PathBuf {
        match self.cache_dir.as_deref().or(configured) {
            Some(dir) => dir.join(project_key(project_dir)).join(BUILD_CACHE_FILE),
            None => project_dir.join(STATE_DIR).join(BUILD_CACHE_FILE),
        }
    }

    /// Resolve config directory from environment or platform default
    fn resolve_config_dir() -> PathBuf {
        if let Some(path) = env::var_os(ENV_CONFIG_DIR) {
            return PathBuf::from(path);
        }

        Self::platform_config_dir()
    }

    /// Get platform-specific config directory
    fn platform_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                // Fallback to home directory
                dirs::home_dir()
                    .map(|h| h.join(".config").join(APP_NAME))
                    .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
            })
    }
}

impl Default for KompileDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// Default Maven local repository, `~/.m2/repository`
pub fn default_local_repository() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".m2").join("repository"))
}

/// Stable directory name for a project inside a shared cache directory
fn project_key(project_dir: &Path) -> String {
    use sha2::{Digest, Sha256};

    let name = project_dir
        .file_name()
        .map_or_else(|| "project".to_string(), |n| n.to_string_lossy().into_owned());
    let digest = Sha256::digest(project_dir.to_string_lossy().as_bytes());
    format!("{name}-{}", &hex::encode(digest)[..12])
}
