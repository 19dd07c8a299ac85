//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    use crate::core::resolver::DependencyRef;
    use crate::core::scope::DependencyScope;

    /// Generate a valid module name (lowercase alphanumeric with hyphens)
    pub fn module_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,20}[a-z0-9]?".prop_filter("Name must not be empty", |s| !s.is_empty())
    }

    /// Generate a dependency scope
    pub fn scope() -> impl Strategy<Value = DependencyScope> {
        prop::sample::select(DependencyScope::ALL.to_vec())
    }

    /// Generate `group:artifact:version` coordinates
    pub fn coordinates() -> impl Strategy<Value = String> {
        ("[a-z]{2,6}(\\.[a-z]{2,6}){0,2}", "[a-z][a-z0-9-]{1,12}", 0u32..10, 0u32..20)
            .prop_map(|(group, artifact, major, minor)| format!("{group}:{artifact}:{major}.{minor}"))
    }

    /// Generate a relative Kotlin source path
    pub fn kotlin_source() -> impl Strategy<Value = String> {
        ("[a-z]{1,8}(/[a-z]{1,8}){0,2}", "[A-Z][A-Za-z]{0,10}")
            .prop_map(|(package, class)| format!("{package}/{class}.kt"))
    }

    /// Generate declared dependencies pointing at a small pool of jar names,
    /// so duplicates are likely
    pub fn declared_jars() -> impl Strategy<Value = Vec<DependencyRef>> {
        prop::collection::vec((0usize..6, scope()), 0..16).prop_map(|picks| {
            picks
                .into_iter()
                .map(|(jar, scope)| {
                    DependencyRef::at_path(format!("jar{jar}"), scope, format!("libs/jar{jar}.jar"))
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use crate::config::defaults::MIN_PROPTEST_ITERATIONS;
    use crate::core::resolver::Coordinates;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(MIN_PROPTEST_ITERATIONS))]

        #[test]
        fn test_module_name_generator(name in module_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }

        #[test]
        fn test_coordinates_generator_parses(id in coordinates()) {
            let parsed: Coordinates = id.parse().unwrap();
            prop_assert!(parsed.classifier.is_none());
        }

        #[test]
        fn test_kotlin_source_generator(path in kotlin_source()) {
            prop_assert!(path.ends_with(".kt"));
            prop_assert!(!path.starts_with('/'));
        }
    }
}
