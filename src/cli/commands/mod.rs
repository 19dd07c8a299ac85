//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod clean;
pub mod doctor;
pub mod phases;
pub mod plan;
pub mod run;

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};

use crate::core::build_cache::CacheStore;
use crate::core::global_config::GlobalConfig;
use crate::core::manifest::{load_workspace, LoadedModule};
use crate::infra::dirs::KompileDirs;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a lifecycle phase and every phase before it
    Run {
        /// Phase to reach (e.g. compile, test-compile)
        #[arg(default_value = "compile")]
        phase: String,

        /// Maximum number of modules compiled at once
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Toolchain executable to use
        #[arg(long, value_name = "PATH", env = "KOMPILE_TOOLCHAIN")]
        toolchain: Option<PathBuf>,
    },

    /// Show which files a phase would recompile
    Plan {
        /// Phase to plan
        #[arg(default_value = "compile")]
        phase: String,
    },

    /// Remove compiled output and the build cache
    Clean {
        /// Only forget the build cache, keep compiled output
        #[arg(long)]
        cache_only: bool,
    },

    /// List registered phases in lifecycle order
    Phases,

    /// Check that the compiler toolchain can be found
    Doctor {
        /// Toolchain executable to check
        #[arg(long, value_name = "PATH", env = "KOMPILE_TOOLCHAIN")]
        toolchain: Option<PathBuf>,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self, project_dir: &Path) -> Result<()> {
        match self {
            Self::Run {
                phase,
                jobs,
                toolchain,
            } => run::execute(project_dir, &phase, jobs, toolchain).await,
            Self::Plan { phase } => plan::execute(project_dir, &phase).await,
            Self::Clean { cache_only } => clean::execute(project_dir, cache_only).await,
            Self::Phases => phases::execute().await,
            Self::Doctor { toolchain } => doctor::execute(project_dir, toolchain).await,
        }
    }
}

/// A loaded workspace plus the user's global settings
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub modules: Vec<LoadedModule>,
    pub global: GlobalConfig,
    pub cache: CacheStore,
}

impl Project {
    /// Load the workspace rooted at `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let root = dir
            .canonicalize()
            .with_context(|| format!("Project directory {} does not exist", dir.display()))?;
        let dirs = KompileDirs::new();
        let global = GlobalConfig::load(&dirs).context("Failed to load global configuration")?;
        let modules = load_workspace(&root)?;
        let cache = CacheStore::new(dirs.build_cache_path(&root, global.cache.dir.as_deref()));
        tracing::debug!("Using build cache {}", cache.path().display());

        Ok(Self {
            root,
            modules,
            global,
            cache,
        })
    }

    /// Toolchain executable to use, if any is configured
    ///
    /// Priority: command line > first module configuring one > global config.
    pub fn toolchain_executable(&self, cli: Option<PathBuf>) -> Option<PathBuf> {
        if cli.is_some() {
            return cli;
        }
        self.modules
            .iter()
            .find_map(|m| {
                let exe = m.manifest.toolchain.executable.as_ref()?;
                // Bare names are looked up on PATH
                Some(if exe.components().count() > 1 {
                    m.dir.join(exe)
                } else {
                    exe.clone()
                })
            })
            .or_else(|| self.global.toolchain.executable.clone())
    }
}
