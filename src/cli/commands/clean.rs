//! CLI implementation for `kompile clean`
//!
//! Removes the output directories of every module and forgets their build
//! cache sections, so the next run recompiles everything.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::Project;
use crate::cli::output::{is_json, print_detail, print_json, print_success};
use crate::core::phase::PhaseRegistry;
use crate::infra::filesystem::remove_dir_all;

/// Execute the clean command
pub async fn execute(project_dir: &Path, cache_only: bool) -> Result<()> {
    let project = Project::load(project_dir)?;
    let registry = PhaseRegistry::with_defaults();

    let mut removed_dirs: Vec<PathBuf> = Vec::new();
    let mut cleared = Vec::new();

    for module in &project.modules {
        for phase in registry.names() {
            let key = format!("{}/{phase}", module.name());
            if project
                .cache
                .clear_module(&key)
                .with_context(|| format!("Failed to clear build cache for {key}"))?
            {
                cleared.push(key);
            }
        }

        if cache_only {
            continue;
        }
        let output = &module.manifest.output;
        for dir in [&output.classes, &output.test_classes, &output.js] {
            let dir = module.dir.join(dir);
            if dir.exists() && !removed_dirs.contains(&dir) {
                remove_dir_all(&dir)?;
                removed_dirs.push(dir);
            }
        }
    }

    if is_json() {
        return print_json(&serde_json::json!({
            "status": "success",
            "removed": removed_dirs,
            "cleared": cleared,
        }));
    }

    if removed_dirs.is_empty() && cleared.is_empty() {
        print_success("Nothing to clean");
        return Ok(());
    }
    print_success("Cleaned build state:");
    for dir in &removed_dirs {
        let shown = dir.strip_prefix(&project.root).unwrap_or(dir);
        print_detail(&format!("Removed {}/", shown.display()));
    }
    for key in &cleared {
        print_detail(&format!("Forgot cached fingerprints for {key}"));
    }
    Ok(())
}
