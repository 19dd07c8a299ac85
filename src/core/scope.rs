//! Dependency scopes
//!
//! A scope classifies a dependency by when it is needed. A task is bound to
//! exactly one scope for its whole lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a dependency by when it is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    /// Needed to compile and run main sources
    Compile,
    /// Needed only by tests
    Test,
    /// Needed at runtime but not to compile
    Runtime,
    /// Supplied by the runtime environment, compile-time only
    Provided,
}

impl DependencyScope {
    /// All scopes, in declaration order
    pub const ALL: [DependencyScope; 4] = [
        DependencyScope::Compile,
        DependencyScope::Test,
        DependencyScope::Runtime,
        DependencyScope::Provided,
    ];

    /// Scope name as written in manifests
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyScope::Compile => "compile",
            DependencyScope::Test => "test",
            DependencyScope::Runtime => "runtime",
            DependencyScope::Provided => "provided",
        }
    }

    /// Whether a dependency declared with `other` belongs on this scope's classpath
    ///
    /// Follows Maven's classpath rules: the test classpath sees everything,
    /// compile sees compile + provided, runtime sees compile + runtime.
    pub fn includes(self, other: DependencyScope) -> bool {
        match self {
            DependencyScope::Test => true,
            DependencyScope::Compile => {
                matches!(other, DependencyScope::Compile | DependencyScope::Provided)
            }
            DependencyScope::Runtime => {
                matches!(other, DependencyScope::Compile | DependencyScope::Runtime)
            }
            DependencyScope::Provided => other == DependencyScope::Provided,
        }
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compile" => Ok(DependencyScope::Compile),
            "test" => Ok(DependencyScope::Test),
            "runtime" => Ok(DependencyScope::Runtime),
            "provided" => Ok(DependencyScope::Provided),
            other => Err(format!(
                "unknown dependency scope '{other}' (expected compile, test, runtime or provided)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_round_trips_through_str() {
        for scope in DependencyScope::ALL {
            assert_eq!(scope.as_str().parse::<DependencyScope>().unwrap(), scope);
        }
        assert!("system".parse::<DependencyScope>().is_err());
    }

    #[test]
    fn test_test_scope_includes_everything() {
        for scope in DependencyScope::ALL {
            assert!(DependencyScope::Test.includes(scope));
        }
    }

    #[test]
    fn test_compile_scope_excludes_test_and_runtime() {
        assert!(DependencyScope::Compile.includes(DependencyScope::Provided));
        assert!(!DependencyScope::Compile.includes(DependencyScope::Test));
        assert!(!DependencyScope::Compile.includes(DependencyScope::Runtime));
    }

    #[test]
    fn test_runtime_scope_excludes_provided() {
        assert!(DependencyScope::Runtime.includes(DependencyScope::Compile));
        assert!(!DependencyScope::Runtime.includes(DependencyScope::Provided));
    }
}
