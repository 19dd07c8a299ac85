//! Classpath resolution
//!
//! Turns an already scope-filtered list of declared dependencies into the
//! ordered classpath handed to the compiler. Walking the dependency graph is
//! the caller's job; this module only maps each reference to a path on disk.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::scope::DependencyScope;
use crate::error::ResolverError;
use crate::infra::filesystem::normalize_path;

/// Maven-style artifact coordinates (`group:artifact:version[:classifier]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinates {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
}

impl Coordinates {
    /// Path of the jar relative to a local repository root
    pub fn repository_path(&self) -> PathBuf {
        let mut path: PathBuf = self.group.split('.').collect();
        path.push(&self.artifact);
        path.push(&self.version);
        let file = match &self.classifier {
            Some(classifier) => format!("{}-{}-{classifier}.jar", self.artifact, self.version),
            None => format!("{}-{}.jar", self.artifact, self.version),
        };
        path.push(file);
        path
    }
}

impl FromStr for Coordinates {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let invalid = || ResolverError::InvalidCoordinates { id: s.to_string() };
        if !(3..=4).contains(&parts.len()) || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid());
        }
        Ok(Self {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).map(|c| (*c).to_string()),
        })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}

/// A dependency as declared by the build, before resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    /// Coordinates or a free-form label when `path` is given
    pub id: String,

    /// Declared scope
    #[serde(default = "default_scope")]
    pub scope: DependencyScope,

    /// Explicit jar or directory, bypassing repository lookup
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_scope() -> DependencyScope {
    DependencyScope::Compile
}

impl DependencyRef {
    /// Create a repository dependency from coordinates
    pub fn new(id: impl Into<String>, scope: DependencyScope) -> Self {
        Self {
            id: id.into(),
            scope,
            path: None,
        }
    }

    /// Create a dependency pinned to an explicit path
    pub fn at_path(id: impl Into<String>, scope: DependencyScope, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            scope,
            path: Some(path.into()),
        }
    }
}

/// A resolved classpath element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClasspathEntry {
    /// Resolved filesystem path
    pub path: PathBuf,
    /// Scope the entry came from
    pub scope: DependencyScope,
}

impl ClasspathEntry {
    pub fn new(path: impl Into<PathBuf>, scope: DependencyScope) -> Self {
        Self {
            path: path.into(),
            scope,
        }
    }
}

/// Keep only the dependencies visible on `scope`'s classpath, in order
pub fn filter_for_scope(scope: DependencyScope, declared: &[DependencyRef]) -> Vec<DependencyRef> {
    declared
        .iter()
        .filter(|dep| scope.includes(dep.scope))
        .cloned()
        .collect()
}

/// Maps declared dependencies to classpath entries
#[derive(Debug, Clone)]
pub struct ClasspathResolver {
    /// Directory relative explicit paths are resolved against
    base_dir: PathBuf,
    /// Local artifact repository root
    repository: Option<PathBuf>,
}

impl ClasspathResolver {
    /// Create a resolver rooted at the project directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            repository: None,
        }
    }

    /// Look up coordinate dependencies in a local repository
    #[must_use]
    pub fn with_repository(mut self, repository: impl Into<PathBuf>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Resolve `declared` into an ordered, duplicate-free classpath
    ///
    /// Order is preserved and the first occurrence of a path wins, so earlier
    /// declarations shadow later ones.
    pub fn resolve(
        &self,
        scope: DependencyScope,
        declared: &[DependencyRef],
    ) -> Result<Vec<ClasspathEntry>, ResolverError> {
        self.resolve_with_leading(scope, Vec::new(), declared)
    }

    /// Resolve with caller-provided entries placed ahead of the dependencies
    ///
    /// Leading entries (e.g. the main classes directory of a test compile)
    /// are not required to exist yet.
    pub fn resolve_with_leading(
        &self,
        scope: DependencyScope,
        leading: Vec<ClasspathEntry>,
        declared: &[DependencyRef],
    ) -> Result<Vec<ClasspathEntry>, ResolverError> {
        tracing::debug!(
            "Resolving {} dependencies for scope {scope}",
            declared.len()
        );

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(leading.len() + declared.len());

        for entry in leading {
            let path = normalize_path(&entry.path);
            if seen.insert(path.clone()) {
                entries.push(ClasspathEntry::new(path, entry.scope));
            }
        }

        for dep in declared {
            let path = normalize_path(&self.locate(dep)?);
            if seen.insert(path.clone()) {
                entries.push(ClasspathEntry::new(path, dep.scope));
            } else {
                tracing::debug!("Dropping duplicate classpath entry {}", path.display());
            }
        }

        Ok(entries)
    }

    fn locate(&self, dep: &DependencyRef) -> Result<PathBuf, ResolverError> {
        if let Some(path) = &dep.path {
            let path = self.absolute(path);
            return if path.exists() {
                Ok(path)
            } else {
                Err(ResolverError::UnresolvedDependency {
                    dependency: dep.id.clone(),
                    reason: format!("path '{}' does not exist", path.display()),
                })
            };
        }

        let coordinates: Coordinates =
            dep.id
                .parse()
                .map_err(|e: ResolverError| ResolverError::UnresolvedDependency {
                    dependency: dep.id.clone(),
                    reason: e.to_string(),
                })?;
        let Some(repository) = &self.repository else {
            return Err(ResolverError::UnresolvedDependency {
                dependency: dep.id.clone(),
                reason: "no path given and no local repository configured".to_string(),
            });
        };

        let path = repository.join(coordinates.repository_path());
        if path.is_file() {
            Ok(path)
        } else {
            Err(ResolverError::UnresolvedDependency {
                dependency: dep.id.clone(),
                reason: format!("not found in local repository at '{}'", path.display()),
            })
        }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::generators::{declared_jars, scope};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"jar").unwrap();
        path
    }

    #[test]
    fn test_coordinates_repository_layout() {
        let coords: Coordinates = "org.jetbrains.kotlin:kotlin-stdlib:2.1.0".parse().unwrap();
        assert_eq!(
            coords.repository_path(),
            PathBuf::from("org/jetbrains/kotlin/kotlin-stdlib/2.1.0/kotlin-stdlib-2.1.0.jar")
        );

        let classified: Coordinates = "a.b:c:1:sources".parse().unwrap();
        assert!(classified
            .repository_path()
            .ends_with("c/1/c-1-sources.jar"));
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        assert!("just-a-name".parse::<Coordinates>().is_err());
        assert!("a::1".parse::<Coordinates>().is_err());
        assert!("a:b:c:d:e".parse::<Coordinates>().is_err());
    }

    #[test]
    fn test_resolve_preserves_order_and_drops_duplicates() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "libs/a.jar");
        touch(temp.path(), "libs/b.jar");

        let resolver = ClasspathResolver::new(temp.path());
        let declared = vec![
            DependencyRef::at_path("b", DependencyScope::Compile, "libs/b.jar"),
            DependencyRef::at_path("a", DependencyScope::Compile, "libs/a.jar"),
            DependencyRef::at_path("b-again", DependencyScope::Test, "libs/./b.jar"),
        ];

        let entries = resolver.resolve(DependencyScope::Test, &declared).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].path.ends_with("b.jar"));
        assert_eq!(entries[0].scope, DependencyScope::Compile);
        assert!(entries[1].path.ends_with("a.jar"));
    }

    #[test]
    fn test_missing_path_is_unresolved() {
        let temp = TempDir::new().unwrap();
        let resolver = ClasspathResolver::new(temp.path());
        let declared = vec![DependencyRef::at_path("gone", DependencyScope::Compile, "nope.jar")];

        let err = resolver.resolve(DependencyScope::Compile, &declared).unwrap_err();
        assert!(matches!(err, ResolverError::UnresolvedDependency { ref dependency, .. } if dependency == "gone"));
    }

    #[test]
    fn test_repository_lookup() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        touch(&repo, "com/acme/util/1.0/util-1.0.jar");

        let resolver = ClasspathResolver::new(temp.path()).with_repository(&repo);
        let entries = resolver
            .resolve(
                DependencyScope::Compile,
                &[DependencyRef::new("com.acme:util:1.0", DependencyScope::Compile)],
            )
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].path.ends_with("util-1.0.jar"));

        let err = resolver
            .resolve(
                DependencyScope::Compile,
                &[DependencyRef::new("com.acme:util:2.0", DependencyScope::Compile)],
            )
            .unwrap_err();
        assert!(matches!(err, ResolverError::UnresolvedDependency { .. }));
    }

    #[test]
    fn test_malformed_id_without_path_is_unresolved() {
        let temp = TempDir::new().unwrap();
        let resolver = ClasspathResolver::new(temp.path()).with_repository(temp.path());
        let err = resolver
            .resolve(
                DependencyScope::Compile,
                &[DependencyRef::new("just-a-name", DependencyScope::Compile)],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ResolverError::UnresolvedDependency { ref dependency, ref reason }
                if dependency == "just-a-name" && reason.contains("group:artifact:version")
        ));
    }

    #[test]
    fn test_coordinates_without_repository_fail() {
        let resolver = ClasspathResolver::new("/tmp");
        let err = resolver
            .resolve(
                DependencyScope::Compile,
                &[DependencyRef::new("com.acme:util:1.0", DependencyScope::Compile)],
            )
            .unwrap_err();
        assert!(matches!(err, ResolverError::UnresolvedDependency { .. }));
    }

    #[test]
    fn test_leading_entries_come_first_and_win() {
        let temp = TempDir::new().unwrap();
        let classes = temp.path().join("target/classes");
        std::fs::create_dir_all(&classes).unwrap();

        let resolver = ClasspathResolver::new(temp.path());
        let entries = resolver
            .resolve_with_leading(
                DependencyScope::Test,
                vec![ClasspathEntry::new(&classes, DependencyScope::Compile)],
                &[DependencyRef::at_path(
                    "classes",
                    DependencyScope::Test,
                    "target/classes",
                )],
            )
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].scope, DependencyScope::Compile);
    }

    #[test]
    fn test_filter_for_scope() {
        let declared = vec![
            DependencyRef::new("a:a:1", DependencyScope::Compile),
            DependencyRef::new("t:t:1", DependencyScope::Test),
            DependencyRef::new("p:p:1", DependencyScope::Provided),
        ];
        let compile = filter_for_scope(DependencyScope::Compile, &declared);
        assert_eq!(
            compile.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["a:a:1", "p:p:1"]
        );
        assert_eq!(filter_for_scope(DependencyScope::Test, &declared).len(), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_resolved_classpath_has_no_duplicates(
            requested in scope(),
            declared in declared_jars(),
        ) {
            let temp = TempDir::new().unwrap();
            for jar in 0..6 {
                touch(temp.path(), &format!("libs/jar{jar}.jar"));
            }
            let visible = filter_for_scope(requested, &declared);
            let entries = ClasspathResolver::new(temp.path())
                .resolve(requested, &visible)
                .unwrap();

            let mut seen = HashSet::new();
            prop_assert!(entries.iter().all(|e| seen.insert(e.path.clone())));

            // First occurrence order of the visible declarations
            let mut expected = Vec::new();
            for dep in &visible {
                if !expected.contains(&dep.id) {
                    expected.push(dep.id.clone());
                }
            }
            let actual: Vec<String> = entries
                .iter()
                .map(|e| e.path.file_stem().unwrap().to_string_lossy().into_owned())
                .collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
