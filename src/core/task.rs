//! Phase tasks
//!
//! A [`PhaseTask`] compiles one module for one lifecycle phase. It walks a
//! fixed state machine:
//!
//! ```text
//! Idle -> ResolvingClasspath -> Planning -> Compiling -> Reporting -> Done | Failed
//! ```
//!
//! An empty plan short-circuits from `Planning` straight to `Done` without
//! starting the compiler. Cancellation before the compiler starts moves to
//! `Cancelled` without spawning anything; cancellation while compiling kills
//! the compiler and leaves the build cache untouched. A task never retries.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

use crate::core::build_cache::{BuildCache, CacheEntry, CacheStore};
use crate::core::options::CompilerOptions;
use crate::core::planner::{CompilationPlan, IncrementalPlanner};
use crate::core::request::{CompileRequest, Frontend};
use crate::core::resolver::{ClasspathEntry, ClasspathResolver, DependencyRef};
use crate::core::result::CompileResult;
use crate::core::scope::DependencyScope;
use crate::core::sources::SourceSet;
use crate::error::{TaskError, ToolchainError};
use crate::infra::filesystem::{create_dir_all, fingerprint_file, normalize_path, now_millis};
use crate::infra::toolchain::Toolchain;

/// Where a task is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Idle,
    ResolvingClasspath,
    Planning,
    Compiling,
    Reporting,
    Done,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Done, Failed and Cancelled are terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed | TaskState::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TaskState::Idle => "idle",
            TaskState::ResolvingClasspath => "resolving-classpath",
            TaskState::Planning => "planning",
            TaskState::Compiling => "compiling",
            TaskState::Reporting => "reporting",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// Everything a task needs to know about what to compile
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    /// Lifecycle phase this task is bound to
    pub phase: String,
    /// Module identity
    pub module: String,
    /// Resolution scope, fixed for the task's lifetime
    pub scope: DependencyScope,
    pub frontend: Frontend,
    /// Module base directory; the compiler runs here
    pub project_dir: PathBuf,
    pub source_roots: Vec<PathBuf>,
    pub output_dir: PathBuf,
    /// Dependencies already filtered for `scope`
    pub dependencies: Vec<DependencyRef>,
    /// Entries placed ahead of the dependencies
    pub leading_classpath: Vec<ClasspathEntry>,
    pub options: CompilerOptions,
    /// Local artifact repository for coordinate lookups
    pub repository: Option<PathBuf>,
}

impl TaskDefinition {
    /// Key of this task's section in the build cache
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.module, self.phase)
    }

    /// Key for the at-most-one-compile-per-module lock
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.module, self.scope)
    }

    fn source_set(&self) -> Result<SourceSet, TaskError> {
        Ok(SourceSet::new(&self.source_roots)?)
    }

    fn resolve_classpath(&self) -> Result<Vec<ClasspathEntry>, TaskError> {
        let mut resolver = ClasspathResolver::new(&self.project_dir);
        if let Some(repository) = &self.repository {
            resolver = resolver.with_repository(repository);
        }
        Ok(resolver.resolve_with_leading(
            self.scope,
            self.leading_classpath.clone(),
            &self.dependencies,
        )?)
    }

    fn plan(&self, sources: &SourceSet, cache: Option<&BuildCache>) -> CompilationPlan {
        let files = sources.discover(self.frontend.source_extensions());
        IncrementalPlanner::new(&self.output_dir).plan(&files, cache)
    }
}

/// Per-module compile locks shared by every task of a pipeline
///
/// Holding the guard for a module key means no other task compiles that
/// module and scope at the same time.
#[derive(Debug, Clone, Default)]
pub struct ModuleLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ModuleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Shared collaborators handed to each task run
pub struct TaskEnv<'a, T: Toolchain> {
    pub toolchain: &'a T,
    pub cache: &'a CacheStore,
    pub locks: &'a ModuleLocks,
    pub cancel: CancellationToken,
}

/// Final report of a task run
#[derive(Debug, Serialize)]
pub struct TaskOutcome {
    pub phase: String,
    pub module: String,
    /// Terminal state
    pub state: TaskState,
    /// Every state entered, starting with `Idle`
    pub transitions: Vec<TaskState>,
    /// Files handed to the compiler
    pub compiled: Vec<PathBuf>,
    /// Files skipped as up to date
    pub up_to_date: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CompileResult>,
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<TaskError>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.state == TaskState::Done
    }
}

fn serialize_error<S: Serializer>(error: &Option<TaskError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_str(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// One module compiled for one phase
#[derive(Debug)]
pub struct PhaseTask {
    definition: TaskDefinition,
    state: TaskState,
    transitions: Vec<TaskState>,
    compiled: Vec<PathBuf>,
    up_to_date: usize,
}

impl PhaseTask {
    pub fn new(definition: TaskDefinition) -> Self {
        Self {
            definition,
            state: TaskState::Idle,
            transitions: vec![TaskState::Idle],
            compiled: Vec::new(),
            up_to_date: 0,
        }
    }

    pub fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn transition(&mut self, next: TaskState) {
        tracing::debug!(
            "[{}:{}] {} -> {next}",
            self.definition.module,
            self.definition.phase,
            self.state
        );
        self.state = next;
        self.transitions.push(next);
    }

    /// Resolve and plan without compiling or touching any state
    pub fn dry_run(&self, cache: &CacheStore) -> Result<CompilationPlan, TaskError> {
        let sources = self.definition.source_set()?;
        self.definition.resolve_classpath()?;
        let cache = cache.load(&self.definition.cache_key()).into_cache();
        Ok(self.definition.plan(&sources, cache.as_ref()))
    }

    /// Run the task to a terminal state
    pub async fn run<T: Toolchain>(mut self, env: &TaskEnv<'_, T>) -> TaskOutcome {
        if env.cancel.is_cancelled() {
            self.transition(TaskState::Cancelled);
            return self.finish(None, None);
        }

        self.transition(TaskState::ResolvingClasspath);
        let prepared = self
            .definition
            .source_set()
            .and_then(|sources| Ok((sources, self.definition.resolve_classpath()?)));
        let (sources, classpath) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return self.fail(e, None),
        };

        self.transition(TaskState::Planning);
        let cache_key = self.definition.cache_key();
        let previous = env.cache.load(&cache_key).into_cache();
        let plan = self.definition.plan(&sources, previous.as_ref());
        self.up_to_date = plan.up_to_date.len();

        if plan.is_empty() {
            tracing::info!(
                "[{}:{}] Nothing to compile, {} file(s) up to date",
                self.definition.module,
                self.definition.phase,
                self.up_to_date
            );
            self.transition(TaskState::Done);
            return self.finish(None, None);
        }
        if env.cancel.is_cancelled() {
            self.transition(TaskState::Cancelled);
            return self.finish(None, None);
        }

        let lock_key = self.definition.lock_key();
        let guard = tokio::select! {
            guard = env.locks.acquire(&lock_key) => Some(guard),
            () = env.cancel.cancelled() => None,
        };
        let Some(_guard) = guard else {
            self.transition(TaskState::Cancelled);
            return self.finish(None, None);
        };

        self.transition(TaskState::Compiling);
        if let Err(e) = create_dir_all(&self.definition.output_dir) {
            return self.fail(e.into(), None);
        }

        let request = self.build_request(sources, classpath, &plan);
        self.compiled = request.files().to_vec();

        let result = match env.toolchain.invoke(&request, &env.cancel).await {
            Ok(result) => result,
            Err(ToolchainError::Cancelled) => {
                self.transition(TaskState::Cancelled);
                return self.finish(None, None);
            }
            Err(e) => return self.fail(e.into(), None),
        };

        self.transition(TaskState::Reporting);
        if !result.is_success() {
            tracing::warn!(
                "[{}:{}] Compilation failed",
                self.definition.module,
                self.definition.phase
            );
            self.transition(TaskState::Failed);
            return self.finish(Some(result), None);
        }

        let mut cache = previous.unwrap_or_else(|| BuildCache::new(cache_key));
        self.record_success(&mut cache, &plan, request.sources());
        if let Err(e) = env.cache.flush(&cache) {
            return self.fail(e.into(), Some(result));
        }

        self.transition(TaskState::Done);
        self.finish(Some(result), None)
    }

    fn build_request(
        &self,
        sources: SourceSet,
        classpath: Vec<ClasspathEntry>,
        plan: &CompilationPlan,
    ) -> CompileRequest {
        let def = &self.definition;

        // Only part of the module is recompiled, so the classes of the
        // unchanged files must be visible to the compiler.
        let classpath = if plan.up_to_date.is_empty() || def.frontend == Frontend::KotlinJs {
            classpath
        } else {
            let output = normalize_path(&def.output_dir);
            let leading = ClasspathEntry::new(output.clone(), def.scope);
            std::iter::once(leading)
                .chain(classpath.into_iter().filter(|e| e.path != output))
                .collect()
        };

        CompileRequest::new(def.frontend, &def.output_dir)
            .with_sources(sources)
            .with_files(plan.stale_paths())
            .with_classpath(classpath)
            .with_options(def.options.clone())
            .with_working_dir(&def.project_dir)
    }

    fn record_success(&self, cache: &mut BuildCache, plan: &CompilationPlan, sources: &SourceSet) {
        let timestamp = now_millis();
        for stale in &plan.stale {
            let fingerprint = match &stale.fingerprint {
                Some(fingerprint) => fingerprint.clone(),
                None => match fingerprint_file(&stale.path) {
                    Ok(fingerprint) => fingerprint,
                    Err(e) => {
                        tracing::debug!("Not caching {}: {e}", stale.path.display());
                        continue;
                    }
                },
            };
            cache.record(
                stale.path.clone(),
                CacheEntry {
                    fingerprint,
                    output_timestamp: timestamp,
                    artifact: self.find_artifact(&stale.path, sources),
                },
            );
        }
        for removed in &plan.removed {
            cache.remove(removed);
        }
    }

    /// First existing output file that corresponds to `source`
    fn find_artifact(&self, source: &Path, sources: &SourceSet) -> Option<PathBuf> {
        let def = &self.definition;
        let root = sources.roots().iter().find(|root| source.starts_with(root))?;
        let relative = source.strip_prefix(root).ok()?;
        let stem = relative.file_stem()?.to_str()?;
        let dir = def
            .output_dir
            .join(relative.parent().unwrap_or_else(|| Path::new("")));
        def.frontend
            .artifact_names(stem)
            .into_iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    fn fail(mut self, error: TaskError, result: Option<CompileResult>) -> TaskOutcome {
        tracing::error!(
            "[{}:{}] {error}",
            self.definition.module,
            self.definition.phase
        );
        self.transition(TaskState::Failed);
        self.finish(result, Some(error))
    }

    fn finish(self, result: Option<CompileResult>, error: Option<TaskError>) -> TaskOutcome {
        debug_assert!(self.state.is_terminal());
        TaskOutcome {
            phase: self.definition.phase,
            module: self.definition.module,
            state: self.state,
            transitions: self.transitions,
            compiled: self.compiled,
            up_to_date: self.up_to_date,
            result,
            error,
        }
    }
}
