//! Source sets
//!
//! An ordered set of source root directories plus discovery of the source
//! files beneath them.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::SourceSetError;
use crate::infra::filesystem::normalize_path;

/// Ordered set of source roots; no root is nested inside another
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSet {
    roots: Vec<PathBuf>,
}

impl SourceSet {
    /// Build a source set, collapsing exact duplicates
    ///
    /// Fails if one root is a subdirectory of another, since its files would
    /// otherwise be discovered twice.
    pub fn new<I, P>(roots: I) -> Result<Self, SourceSetError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut kept: Vec<PathBuf> = Vec::new();
        for root in roots {
            let root = normalize_path(root.as_ref());
            if kept.contains(&root) {
                continue;
            }
            for existing in &kept {
                if root.starts_with(existing) {
                    return Err(SourceSetError::NestedRoot {
                        root,
                        parent: existing.clone(),
                    });
                }
                if existing.starts_with(&root) {
                    return Err(SourceSetError::NestedRoot {
                        root: existing.clone(),
                        parent: root,
                    });
                }
            }
            kept.push(root);
        }
        Ok(Self { roots: kept })
    }

    /// An empty source set
    pub fn empty() -> Self {
        Self { roots: Vec::new() }
    }

    /// Source roots in declaration order
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// All files under the roots whose extension is in `extensions`
    ///
    /// Roots that do not exist are skipped. Files come back grouped by root in
    /// root order, sorted within each root.
    pub fn discover(&self, extensions: &[&str]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                tracing::debug!("Skipping missing source root {}", root.display());
                continue;
            }
            let found: BTreeSet<PathBuf> = walkdir::WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable entry under {}: {e}", root.display());
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(walkdir::DirEntry::into_path)
                .filter(|path| has_extension(path, extensions))
                .collect();
            files.extend(found);
        }
        files
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}
