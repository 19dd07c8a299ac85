//! CLI implementation for `kompile run`
//!
//! Runs a lifecycle phase over every module of the workspace and reports
//! per-task outcomes. Ctrl-C cancels the running compile.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::Project;
use crate::cli::output::{create_spinner, is_json, print_json, print_outcome, print_success};
use crate::config::defaults::DEFAULT_TOOLCHAIN_BINARY;
use crate::core::pipeline::Pipeline;
use crate::infra::toolchain::ProcessToolchain;

/// Execute the run command
pub async fn execute(
    project_dir: &Path,
    phase: &str,
    jobs: Option<usize>,
    toolchain: Option<PathBuf>,
) -> Result<()> {
    let project = Project::load(project_dir)?;

    // A missing toolchain only matters once something has to be compiled,
    // where the task reports it.
    let configured = project.toolchain_executable(toolchain);
    let toolchain = match ProcessToolchain::locate(configured.as_deref()) {
        Ok(toolchain) => toolchain,
        Err(e) => {
            tracing::warn!("{e}");
            ProcessToolchain::new(
                configured.unwrap_or_else(|| PathBuf::from(DEFAULT_TOOLCHAIN_BINARY)),
            )
        }
    };
    tracing::info!("Using toolchain {}", toolchain.executable().display());

    let pipeline = Pipeline::new(toolchain)
        .with_jobs(jobs.unwrap_or_else(|| project.global.build_jobs()));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let spinner = create_spinner(&format!("Running {phase}..."));
    let result = pipeline
        .run(
            phase,
            &project.modules,
            &project.global,
            &project.cache,
            &cancel,
        )
        .await;
    spinner.finish_and_clear();
    ctrl_c.abort();
    let report = result?;

    if is_json() {
        print_json(&report)?;
    } else {
        for outcome in &report.outcomes {
            print_outcome(outcome);
        }
    }

    if report.cancelled {
        bail!("{phase} cancelled");
    }
    if let Some(failed) = &report.halted_at {
        bail!("{failed} failed");
    }
    if !report.is_success() {
        bail!("{phase} failed");
    }

    let compiled: usize = report.outcomes.iter().map(|o| o.compiled.len()).sum();
    if compiled == 0 {
        print_success(&format!("{phase}: everything up to date"));
    } else {
        print_success(&format!(
            "{phase}: compiled {compiled} file(s) across {} task(s)",
            report.outcomes.len()
        ));
    }
    Ok(())
}
