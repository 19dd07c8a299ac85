//! CLI command for `kompile doctor`
//!
//! Checks that the compiler toolchain can be found and that the project and
//! global configuration load.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use super::Project;
use crate::cli::output::{is_json, print_detail, print_info, print_json, status};
use crate::core::global_config::GlobalConfig;
use crate::infra::dirs::KompileDirs;
use crate::infra::toolchain::ProcessToolchain;

/// Execute the doctor command
pub async fn execute(project_dir: &Path, toolchain: Option<PathBuf>) -> Result<()> {
    let dirs = KompileDirs::new();
    let global = GlobalConfig::load(&dirs).map_err(|e| e.to_string());
    let project = Project::load(project_dir).map_err(|e| format!("{e:#}"));

    let configured = match &project {
        Ok(project) => project.toolchain_executable(toolchain),
        Err(_) => toolchain.or_else(|| {
            global
                .as_ref()
                .ok()
                .and_then(|g| g.toolchain.executable.clone())
        }),
    };
    let located = ProcessToolchain::locate(configured.as_deref());
    let version = match &located {
        Ok(toolchain) => toolchain.version().await,
        Err(_) => None,
    };

    if is_json() {
        print_json(&serde_json::json!({
            "toolchain": {
                "found": located.is_ok(),
                "executable": located.as_ref().ok().map(|t| t.executable().to_path_buf()),
                "version": version,
                "error": located.as_ref().err().map(ToString::to_string),
            },
            "global_config": {
                "path": dirs.global_config_path(),
                "error": global.as_ref().err(),
            },
            "project": {
                "modules": project.as_ref().ok().map(|p| p.modules.len()),
                "error": project.as_ref().err(),
            },
        }))?;
    } else {
        print_info("Checking kompile setup...");
        match &located {
            Ok(toolchain) => println!(
                "  {} toolchain {}{}",
                status::SUCCESS,
                toolchain.executable().display(),
                version.as_deref().map(|v| format!(" ({v})")).unwrap_or_default()
            ),
            Err(e) => {
                println!("  {} toolchain", status::ERROR);
                print_detail(&e.to_string());
            }
        }
        match &global {
            Ok(_) => println!(
                "  {} global config {}",
                status::SUCCESS,
                dirs.global_config_path().display()
            ),
            Err(e) => {
                println!("  {} global config", status::ERROR);
                print_detail(e);
            }
        }
        match &project {
            Ok(project) => println!(
                "  {} project with {} module(s)",
                status::SUCCESS,
                project.modules.len()
            ),
            Err(e) => {
                println!("  {} project", status::WARNING);
                print_detail(e);
            }
        }
    }

    if let Err(e) = located {
        bail!(e);
    }
    Ok(())
}
