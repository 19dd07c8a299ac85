//! Manifest (kompile.toml) parsing and validation
//!
//! The manifest describes one module: its sources, output directories,
//! dependencies and compiler options. A manifest with a `[workspace]` table
//! additionally lists member directories, each with its own manifest.
//! String values support environment variable substitution using `${VAR}`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::defaults::{
    DEFAULT_CLASSES_DIR, DEFAULT_JAVA_SOURCES, DEFAULT_JS_TEST_DIR, DEFAULT_MAIN_SOURCES,
    DEFAULT_TEST_CLASSES_DIR, DEFAULT_TEST_SOURCES, MANIFEST_FILE,
};
use crate::core::options::CompilerOptions;
use crate::core::resolver::DependencyRef;
use crate::error::ManifestError;

/// The module manifest (kompile.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Module identity; optional for a workspace-only root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleConfig>,

    /// Compiler toolchain selection
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Compiler options shared by every phase of this module
    #[serde(default)]
    pub compiler: CompilerOptions,

    /// Source roots
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Output directories
    #[serde(default)]
    pub output: OutputDirs,

    /// Declared dependencies, in classpath order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyRef>,

    /// Local artifact repository
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Member modules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceConfig>,
}

/// Module identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleConfig {
    /// Module name, unique within a workspace
    pub name: String,
}

/// Toolchain selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolchainConfig {
    /// Toolchain executable; a bare name is looked up on `PATH`
    pub executable: Option<PathBuf>,
}

/// Source roots, relative to the module directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    /// Main Kotlin sources
    pub main: Vec<PathBuf>,
    /// Main Java sources
    pub java: Vec<PathBuf>,
    /// Test sources
    pub test: Vec<PathBuf>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            main: vec![PathBuf::from(DEFAULT_MAIN_SOURCES)],
            java: vec![PathBuf::from(DEFAULT_JAVA_SOURCES)],
            test: vec![PathBuf::from(DEFAULT_TEST_SOURCES)],
        }
    }
}

/// Output directories, relative to the module directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputDirs {
    pub classes: PathBuf,
    pub test_classes: PathBuf,
    pub js: PathBuf,
}

impl Default for OutputDirs {
    fn default() -> Self {
        Self {
            classes: PathBuf::from(DEFAULT_CLASSES_DIR),
            test_classes: PathBuf::from(DEFAULT_TEST_CLASSES_DIR),
            js: PathBuf::from(DEFAULT_JS_TEST_DIR),
        }
    }
}

/// Local artifact repository settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfig {
    /// Root of a Maven-layout repository
    pub local: Option<PathBuf>,
}

/// Workspace member list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    /// Member directories, relative to the workspace root
    #[serde(default)]
    pub members: Vec<PathBuf>,
}

/// A module manifest together with the directory it was loaded from
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModule {
    pub dir: PathBuf,
    pub manifest: Manifest,
}

impl LoadedModule {
    /// Module name
    pub fn name(&self) -> &str {
        self.manifest.module_name().unwrap_or_default()
    }
}

/// Substitute environment variables in a string using `${VAR}` syntax
///
/// Unset variables expand to the empty string.
///
/// # Examples
/// ```
/// use kompile::core::manifest::substitute_env_vars;
///
/// std::env::set_var("KOMPILE_DOC_VAR", "17");
/// assert_eq!(substitute_env_vars("jvm-${KOMPILE_DOC_VAR}").unwrap(), "jvm-17");
/// std::env::remove_var("KOMPILE_DOC_VAR");
/// ```
pub fn substitute_env_vars(input: &str) -> Result<String, String> {
    let re =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| format!("Invalid regex: {e}"))?;

    Ok(re
        .replace_all(input, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned())
}

/// Recursively substitute environment variables in all string values
fn substitute_in_value(value: &mut toml::Value) -> Result<(), String> {
    match value {
        toml::Value::String(s) => *s = substitute_env_vars(s)?,
        toml::Value::Array(items) => {
            for item in items.iter_mut() {
                substitute_in_value(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                substitute_in_value(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

impl Manifest {
    /// Load, substitute and validate the manifest at `path`
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.is_file() {
            return Err(ManifestError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let parse_error = |e: toml::de::Error| ManifestError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        };
        let mut value: toml::Value = toml::from_str(&content).map_err(parse_error)?;
        substitute_in_value(&mut value).map_err(|error| ManifestError::Parse {
            path: path.to_path_buf(),
            error,
        })?;
        let manifest: Manifest = value.try_into().map_err(parse_error)?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Load manifest from TOML string
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Module name, if this manifest describes a module
    pub fn module_name(&self) -> Option<&str> {
        self.module.as_ref().map(|m| m.name.as_str())
    }

    /// Check the manifest describes something buildable
    pub fn validate(&self) -> Result<(), ManifestError> {
        let invalid = |message: String| Err(ManifestError::Invalid { message });

        match &self.module {
            None if self.workspace.is_none() => {
                return invalid(
                    "manifest needs a [module] or a [workspace] section".to_string(),
                );
            }
            Some(module) if module.name.trim().is_empty() => {
                return invalid("module.name cannot be empty".to_string());
            }
            Some(module) if module.name.contains(['/', '\\', ':']) => {
                return invalid(format!(
                    "module.name '{}' cannot contain '/', '\\' or ':'",
                    module.name
                ));
            }
            _ => {}
        }

        if let Some(dep) = self.dependencies.iter().find(|d| d.id.trim().is_empty()) {
            return invalid(format!(
                "dependency with scope '{}' has an empty id",
                dep.scope
            ));
        }

        if let Some(workspace) = &self.workspace {
            if let Some(member) = workspace.members.iter().find(|m| m.is_absolute()) {
                return invalid(format!(
                    "workspace member '{}' must be a relative path",
                    member.display()
                ));
            }
        }
        Ok(())
    }
}

/// Load the module at `root` and every workspace member it lists
///
/// The root module, if any, comes first; members follow in declaration
/// order. Members cannot declare workspaces of their own.
pub fn load_workspace(root: &Path) -> Result<Vec<LoadedModule>, ManifestError> {
    let manifest = Manifest::load(&root.join(MANIFEST_FILE))?;
    let members = manifest
        .workspace
        .as_ref()
        .map(|w| w.members.clone())
        .unwrap_or_default();

    let mut modules = Vec::with_capacity(members.len() + 1);
    if manifest.module.is_some() {
        modules.push(LoadedModule {
            dir: root.to_path_buf(),
            manifest,
        });
    }

    for member in members {
        let dir = root.join(&member);
        let manifest = Manifest::load(&dir.join(MANIFEST_FILE))?;
        if manifest.workspace.is_some() {
            return Err(ManifestError::Invalid {
                message: format!(
                    "workspace member '{}' cannot declare its own [workspace]",
                    member.display()
                ),
            });
        }
        if manifest.module.is_none() {
            return Err(ManifestError::Invalid {
                message: format!("workspace member '{}' has no [module]", member.display()),
            });
        }
        modules.push(LoadedModule { dir, manifest });
    }

    let mut names = HashSet::new();
    for module in &modules {
        if !names.insert(module.name()) {
            return Err(ManifestError::Invalid {
                message: format!("module name '{}' is used more than once", module.name()),
            });
        }
    }

    tracing::debug!("Loaded {} module(s) from {}", modules.len(), root.display());
    Ok(modules)
}
