//! Build pipeline
//!
//! Runs a lifecycle phase (and every phase before it) over all modules of a
//! workspace. Phases run one after another. Within a phase, modules run in
//! dependency waves: a module starts only after the sibling modules it
//! depends on, and the modules of one wave compile concurrently.
//!
//! The pipeline halts after the first phase or wave in which any task does
//! not finish `Done`.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;

use crate::core::build_cache::CacheStore;
use crate::core::global_config::GlobalConfig;
use crate::core::manifest::LoadedModule;
use crate::core::phase::{ModuleContext, PhaseRegistry};
use crate::core::task::{ModuleLocks, PhaseTask, TaskDefinition, TaskEnv, TaskOutcome};
use crate::error::PipelineError;
use crate::infra::toolchain::Toolchain;

/// Result of a pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    /// Requested phase
    pub phase: String,
    /// Lifecycle phases scheduled to reach it
    pub phases: Vec<String>,
    /// Outcome of every task that ran, in scheduling order
    pub outcomes: Vec<TaskOutcome>,
    /// Phase in which a task failed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<String>,
    pub cancelled: bool,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.halted_at.is_none()
            && !self.cancelled
            && self.outcomes.iter().all(TaskOutcome::is_success)
    }
}

/// Group modules into waves so every module comes after the sibling
/// modules it depends on
///
/// Returns indices into `modules`; each wave keeps workspace order.
pub fn module_waves(modules: &[LoadedModule]) -> Result<Vec<Vec<usize>>, PipelineError> {
    let index: HashMap<&str, usize> = modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.name(), i))
        .collect();

    let edges: Vec<Vec<usize>> = modules
        .iter()
        .enumerate()
        .map(|(i, m)| {
            m.manifest
                .dependencies
                .iter()
                .filter(|d| d.path.is_none())
                .filter_map(|d| index.get(d.id.as_str()).copied())
                .filter(|&j| j != i)
                .collect()
        })
        .collect();

    let mut levels: Vec<Option<usize>> = vec![None; modules.len()];
    let mut visiting = HashSet::new();
    let mut path = Vec::new();
    for node in 0..modules.len() {
        level_of(node, &edges, modules, &mut levels, &mut visiting, &mut path)?;
    }

    let depth = levels.iter().flatten().max().map_or(0, |d| d + 1);
    let mut waves = vec![Vec::new(); depth];
    for (node, level) in levels.into_iter().enumerate() {
        if let Some(level) = level {
            waves[level].push(node);
        }
    }
    Ok(waves)
}

fn level_of(
    node: usize,
    edges: &[Vec<usize>],
    modules: &[LoadedModule],
    levels: &mut [Option<usize>],
    visiting: &mut HashSet<usize>,
    path: &mut Vec<usize>,
) -> Result<usize, PipelineError> {
    if let Some(level) = levels[node] {
        return Ok(level);
    }
    if visiting.contains(&node) {
        path.push(node);
        let start = path.iter().position(|&n| n == node).unwrap_or(0);
        return Err(PipelineError::CircularModules {
            cycle: path[start..]
                .iter()
                .map(|&n| modules[n].name().to_string())
                .collect(),
        });
    }

    visiting.insert(node);
    path.push(node);
    let mut level = 0;
    for &dep in &edges[node] {
        level = level.max(level_of(dep, edges, modules, levels, visiting, path)? + 1);
    }
    path.pop();
    visiting.remove(&node);

    levels[node] = Some(level);
    Ok(level)
}

/// Task definitions of a single phase for every module, in wave order
pub fn definitions(
    registry: &PhaseRegistry,
    phase: &str,
    modules: &[LoadedModule],
    global: &GlobalConfig,
) -> Result<Vec<TaskDefinition>, PipelineError> {
    let mut definitions = Vec::with_capacity(modules.len());
    for wave in module_waves(modules)? {
        for i in wave {
            let ctx = ModuleContext::new(&modules[i], global).with_workspace(modules);
            definitions.push(registry.definition(phase, &ctx)?);
        }
    }
    Ok(definitions)
}

/// Runs phase tasks against a toolchain
pub struct Pipeline<T: Toolchain> {
    toolchain: T,
    registry: PhaseRegistry,
    locks: ModuleLocks,
    jobs: usize,
}

impl<T: Toolchain> Pipeline<T> {
    /// Create a pipeline with the built-in phases
    pub fn new(toolchain: T) -> Self {
        Self {
            toolchain,
            registry: PhaseRegistry::with_defaults(),
            locks: ModuleLocks::new(),
            jobs: num_cpus::get(),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: PhaseRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Maximum number of modules compiled at once
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Run every lifecycle phase up to and including `phase`
    pub async fn run(
        &self,
        phase: &str,
        modules: &[LoadedModule],
        global: &GlobalConfig,
        cache: &CacheStore,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport, PipelineError> {
        let phases = self.registry.lifecycle_to(phase)?;
        let waves = module_waves(modules)?;
        tracing::info!(
            "Running {} for {} module(s): {}",
            phase,
            modules.len(),
            phases.join(" -> ")
        );

        let env = TaskEnv {
            toolchain: &self.toolchain,
            cache,
            locks: &self.locks,
            cancel: cancel.clone(),
        };
        let mut report = PipelineReport {
            phase: phase.to_string(),
            phases: phases.iter().map(ToString::to_string).collect(),
            outcomes: Vec::new(),
            halted_at: None,
            cancelled: false,
        };

        'phases: for name in &phases {
            for wave in &waves {
                let definitions = wave
                    .iter()
                    .map(|&i| {
                        let ctx = ModuleContext::new(&modules[i], global).with_workspace(modules);
                        self.registry.definition(name, &ctx)
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let outcomes: Vec<TaskOutcome> = stream::iter(definitions)
                    .map(|definition| PhaseTask::new(definition).run(&env))
                    .buffered(self.jobs)
                    .collect()
                    .await;

                let failed = outcomes.iter().any(|o| !o.is_success());
                report.outcomes.extend(outcomes);

                if cancel.is_cancelled() {
                    tracing::warn!("Pipeline cancelled during {name}");
                    report.cancelled = true;
                    break 'phases;
                }
                if failed {
                    tracing::warn!("Halting pipeline: {name} failed");
                    report.halted_at = Some((*name).to_string());
                    break 'phases;
                }
            }
        }

        Ok(report)
    }
}
