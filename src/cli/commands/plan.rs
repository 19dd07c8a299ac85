//! CLI implementation for `kompile plan`
//!
//! Shows which files a phase would recompile and why, without running the
//! compiler or touching the build cache.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use super::Project;
use crate::cli::output::{is_json, print_detail, print_info, print_json, status};
use crate::core::phase::PhaseRegistry;
use crate::core::pipeline::definitions;
use crate::core::planner::CompilationPlan;
use crate::core::task::PhaseTask;

#[derive(Debug, Serialize)]
struct PlanEntry {
    module: String,
    phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<CompilationPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Execute the plan command
pub async fn execute(project_dir: &Path, phase: &str) -> Result<()> {
    let project = Project::load(project_dir)?;
    let registry = PhaseRegistry::with_defaults();

    let entries: Vec<PlanEntry> = definitions(&registry, phase, &project.modules, &project.global)?
        .into_iter()
        .map(|definition| {
            let task = PhaseTask::new(definition);
            let (plan, error) = match task.dry_run(&project.cache) {
                Ok(plan) => (Some(plan), None),
                Err(e) => (None, Some(e.to_string())),
            };
            PlanEntry {
                module: task.definition().module.clone(),
                phase: task.definition().phase.clone(),
                plan,
                error,
            }
        })
        .collect();

    if is_json() {
        return print_json(&entries);
    }

    for entry in &entries {
        let label = format!("{}:{}", entry.module, entry.phase);
        match (&entry.plan, &entry.error) {
            (_, Some(error)) => eprintln!("{} {label} {error}", status::ERROR),
            (Some(plan), None) if plan.is_empty() => {
                print_info(&format!("{label} up to date ({} file(s))", plan.up_to_date.len()));
            }
            (Some(plan), None) => {
                print_info(&format!(
                    "{label} would compile {} file(s), {} up to date",
                    plan.stale.len(),
                    plan.up_to_date.len()
                ));
                for stale in &plan.stale {
                    let shown = stale
                        .path
                        .strip_prefix(&project.root)
                        .unwrap_or(&stale.path);
                    print_detail(&format!("{} ({})", shown.display(), stale.reason));
                }
                for removed in &plan.removed {
                    print_detail(&format!("{} (removed)", removed.display()));
                }
            }
            (None, None) => {}
        }
    }
    Ok(())
}
