//! Incremental build planning
//!
//! Decides which source files need recompilation by comparing content
//! fingerprints against the build cache and checking that recorded outputs
//! are still present and up to date. Planning only reads; it never updates
//! the cache.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::build_cache::BuildCache;
use crate::infra::filesystem::{fingerprint_file, modified_millis};

/// Why a source file was selected for compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleReason {
    /// No usable cache, everything is rebuilt
    FullRebuild,
    /// File has never compiled successfully
    NotCached,
    /// Contents differ from the last successful compile
    Changed,
    /// Recorded output artifact is gone
    OutputMissing,
    /// Output artifact is older than the source
    OutputOutdated,
    /// File could not be fingerprinted
    Unreadable,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StaleReason::FullRebuild => "full rebuild",
            StaleReason::NotCached => "new",
            StaleReason::Changed => "changed",
            StaleReason::OutputMissing => "output missing",
            StaleReason::OutputOutdated => "output outdated",
            StaleReason::Unreadable => "unreadable",
        };
        f.write_str(text)
    }
}

/// A source file selected for compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleSource {
    pub path: PathBuf,
    /// Fingerprint taken while planning; `None` if the file was unreadable
    pub fingerprint: Option<String>,
    pub reason: StaleReason,
}

/// Result of planning one task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompilationPlan {
    /// Files that must be compiled, in discovery order
    pub stale: Vec<StaleSource>,
    /// Files whose cache entry is still valid
    pub up_to_date: Vec<PathBuf>,
    /// Cache entries whose source file no longer exists
    pub removed: Vec<PathBuf>,
}

impl CompilationPlan {
    /// Nothing to compile
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty()
    }

    /// Paths of the files to compile
    pub fn stale_paths(&self) -> Vec<PathBuf> {
        self.stale.iter().map(|s| s.path.clone()).collect()
    }
}

/// Compares sources against a build cache snapshot
#[derive(Debug, Clone)]
pub struct IncrementalPlanner {
    output_dir: PathBuf,
}

impl IncrementalPlanner {
    /// Planner for a task writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Select the files in `sources` that need compilation
    ///
    /// With no cache every file is selected. With a cache a file is skipped
    /// only if its fingerprint matches and its output is present and not
    /// older than the source.
    pub fn plan(&self, sources: &[PathBuf], cache: Option<&BuildCache>) -> CompilationPlan {
        let mut plan = CompilationPlan::default();

        let Some(cache) = cache else {
            plan.stale = sources
                .iter()
                .map(|path| StaleSource {
                    path: path.clone(),
                    fingerprint: fingerprint_file(path).ok(),
                    reason: StaleReason::FullRebuild,
                })
                .collect();
            return plan;
        };

        for path in sources {
            let fingerprint = match fingerprint_file(path) {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    tracing::debug!("{e}");
                    plan.stale.push(StaleSource {
                        path: path.clone(),
                        fingerprint: None,
                        reason: StaleReason::Unreadable,
                    });
                    continue;
                }
            };

            match self.check(path, &fingerprint, cache) {
                Some(reason) => plan.stale.push(StaleSource {
                    path: path.clone(),
                    fingerprint: Some(fingerprint),
                    reason,
                }),
                None => plan.up_to_date.push(path.clone()),
            }
        }

        let present: HashSet<&PathBuf> = sources.iter().collect();
        plan.removed = cache
            .entries()
            .map(|(path, _)| path)
            .filter(|path| !present.contains(path))
            .cloned()
            .collect();

        plan
    }

    fn check(&self, path: &Path, fingerprint: &str, cache: &BuildCache) -> Option<StaleReason> {
        let Some(entry) = cache.get(path) else {
            return Some(StaleReason::NotCached);
        };
        if entry.fingerprint != fingerprint {
            return Some(StaleReason::Changed);
        }

        let output = entry.artifact.as_deref().unwrap_or(&self.output_dir);
        let Some(output_time) = modified_millis(output) else {
            return Some(StaleReason::OutputMissing);
        };
        let source_time = modified_millis(path).unwrap_or(0);
        if entry.artifact.is_some() && output_time < source_time {
            return Some(StaleReason::OutputOutdated);
        }
        None
    }
}
