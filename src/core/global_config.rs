//! Global configuration management
//!
//! Reads and manages global settings from `config.toml` in the config directory.
//! Global settings include the default toolchain, default compiler options,
//! the local artifact repository and the cache location.

use crate::core::options::CompilerOptions;
use crate::infra::dirs::{default_local_repository, KompileDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Global configuration error types
#[derive(Error, Debug)]
pub enum GlobalConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },
}

/// Global configuration for kompile
///
/// Contains all global settings that apply across projects. Module
/// manifests override these values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// Toolchain settings
    #[serde(default)]
    pub toolchain: ToolchainDefaults,

    /// Default compiler options
    #[serde(default)]
    pub compiler: CompilerOptions,

    /// Local repository settings
    #[serde(default)]
    pub repository: RepositoryDefaults,

    /// Cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Pipeline settings
    #[serde(default)]
    pub build: BuildConfig,
}

/// Toolchain settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolchainDefaults {
    /// Toolchain executable used when a module does not configure one
    pub executable: Option<PathBuf>,
}

/// Local repository settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryDefaults {
    /// Maven-layout repository used when a module does not configure one
    pub local: Option<PathBuf>,
}

/// Cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Directory for build caches instead of `<project>/.kompile`
    pub dir: Option<PathBuf>,
}

/// Pipeline settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Maximum number of modules compiled at once
    pub jobs: Option<usize>,
}

impl GlobalConfig {
    /// Load global configuration from the config directory
    pub fn load(dirs: &KompileDirs) -> Result<Self, GlobalConfigError> {
        Self::load_from_path(&dirs.global_config_path())
    }

    /// Load global configuration from a specific path
    ///
    /// A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, GlobalConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No global config at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(GlobalConfigError::ReadError {
                    path: path.display().to_string(),
                    error: e.to_string(),
                })
            }
        };

        let config: Self = toml::from_str(&content).map_err(|e| GlobalConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        tracing::debug!("Loaded global config from {}", path.display());
        Ok(config)
    }

    /// Get the effective local repository
    ///
    /// Returns the configured repository if set, otherwise `~/.m2/repository`
    /// when it exists.
    #[must_use]
    pub fn local_repository(&self) -> Option<PathBuf> {
        self.repository
            .local
            .clone()
            .or_else(|| default_local_repository().filter(|p| p.is_dir()))
    }

    /// Get the effective number of concurrent module compiles
    #[must_use]
    pub fn build_jobs(&self) -> usize {
        self.build.jobs.filter(|j| *j > 0).unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert!(config.toolchain.executable.is_none());
        assert!(config.repository.local.is_none());
        assert!(config.cache.dir.is_none());
        assert!(config.build_jobs() >= 1);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = GlobalConfig::load_from_path(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn test_load_valid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let content = r#"
[toolchain]
executable = "/opt/elide/bin/elide"

[compiler]
jvm-target = "17"
max-memory = "2g"

[repository]
local = "/srv/m2"

[build]
jobs = 2
"#;
        fs::write(&config_path, content).unwrap();

        let config = GlobalConfig::load_from_path(&config_path).unwrap();
        assert_eq!(
            config.toolchain.executable,
            Some(PathBuf::from("/opt/elide/bin/elide"))
        );
        assert_eq!(config.compiler.jvm_target.as_deref(), Some("17"));
        assert_eq!(config.local_repository(), Some(PathBuf::from("/srv/m2")));
        assert_eq!(config.build_jobs(), 2);
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "invalid toml [[[").unwrap();

        let result = GlobalConfig::load_from_path(&config_path);
        assert!(matches!(result, Err(GlobalConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_all_sections() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            "[toolchain]\nexecutable = \"elide\"\n[cache]\ndir = \"/tmp/kompile-cache\"\n[build]\njobs = 4\n",
        )
        .unwrap();

        let expected = GlobalConfig {
            toolchain: ToolchainDefaults {
                executable: Some(PathBuf::from("elide")),
            },
            cache: CacheConfig {
                dir: Some(PathBuf::from("/tmp/kompile-cache")),
            },
            build: BuildConfig { jobs: Some(4) },
            ..GlobalConfig::default()
        };
        let loaded = GlobalConfig::load_from_path(&config_path).unwrap();
        assert_eq!(loaded, expected);
    }
}
