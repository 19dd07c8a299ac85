//! Phase registration
//!
//! Lifecycle phases are registered explicitly by name. Each registration is
//! a factory turning a module's configuration into a [`TaskDefinition`].
//! Registration order is lifecycle order: asking for a phase runs every
//! phase registered before it, then the phase itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::global_config::GlobalConfig;
use crate::core::manifest::LoadedModule;
use crate::core::options::CompilerOptions;
use crate::core::request::Frontend;
use crate::core::resolver::{filter_for_scope, ClasspathEntry, DependencyRef};
use crate::core::scope::DependencyScope;
use crate::core::task::TaskDefinition;
use crate::error::PhaseError;

/// Main Kotlin compile
pub const COMPILE: &str = "compile";
/// Main Java compile
pub const JAVA_COMPILE: &str = "java-compile";
/// Kotlin test compile
pub const TEST_COMPILE: &str = "test-compile";
/// Kotlin/JS test compile
pub const JS_TEST_COMPILE: &str = "js-test-compile";

/// A module's configuration as seen by task factories
#[derive(Debug, Clone, Copy)]
pub struct ModuleContext<'a> {
    pub module: &'a LoadedModule,
    pub global: &'a GlobalConfig,
    /// Every module of the workspace, including `module`
    pub workspace: &'a [LoadedModule],
}

impl<'a> ModuleContext<'a> {
    pub fn new(module: &'a LoadedModule, global: &'a GlobalConfig) -> Self {
        Self {
            module,
            global,
            workspace: &[],
        }
    }

    /// Resolve dependencies on sibling modules against `workspace`
    #[must_use]
    pub fn with_workspace(mut self, workspace: &'a [LoadedModule]) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn name(&self) -> &'a str {
        self.module.name()
    }

    /// Resolve a manifest path against the module directory
    pub fn path(&self, relative: &Path) -> PathBuf {
        self.module.dir.join(relative)
    }

    fn paths(&self, relative: &[PathBuf]) -> Vec<PathBuf> {
        relative.iter().map(|p| self.path(p)).collect()
    }

    /// Module compiler options layered over the global defaults
    pub fn options(&self) -> CompilerOptions {
        self.module
            .manifest
            .compiler
            .merged_over(&self.global.compiler)
    }

    /// Module repository, else the global one
    pub fn repository(&self) -> Option<PathBuf> {
        match &self.module.manifest.repository.local {
            Some(local) => Some(self.path(local)),
            None => self.global.local_repository(),
        }
    }

    /// Sibling module a dependency without a path refers to
    fn sibling(&self, dependency: &DependencyRef) -> Option<&'a LoadedModule> {
        if dependency.path.is_some() {
            return None;
        }
        self.workspace
            .iter()
            .find(|m| m.name() == dependency.id && m.name() != self.name())
    }

    /// Task definition skeleton shared by every built-in phase
    ///
    /// Dependencies naming a sibling module are replaced by that module's
    /// classes directory, which need not exist yet.
    pub fn definition(
        &self,
        phase: &str,
        frontend: Frontend,
        scope: DependencyScope,
        source_roots: &[PathBuf],
        output_dir: &Path,
    ) -> TaskDefinition {
        let mut dependencies = Vec::new();
        let mut siblings = Vec::new();
        for dep in filter_for_scope(scope, &self.module.manifest.dependencies) {
            match self.sibling(&dep) {
                Some(module) => siblings.push(ClasspathEntry::new(
                    module.dir.join(&module.manifest.output.classes),
                    dep.scope,
                )),
                None => dependencies.push(dep),
            }
        }

        TaskDefinition {
            phase: phase.to_string(),
            module: self.name().to_string(),
            scope,
            frontend,
            project_dir: self.module.dir.clone(),
            source_roots: self.paths(source_roots),
            output_dir: self.path(output_dir),
            dependencies,
            leading_classpath: siblings,
            options: self.options(),
            repository: self.repository(),
        }
    }
}

/// Builds the task for one module
pub type TaskFactory = Arc<dyn Fn(&ModuleContext<'_>) -> TaskDefinition + Send + Sync>;

/// Ordered table of phase name to task factory
#[derive(Clone, Default)]
pub struct PhaseRegistry {
    phases: Vec<(String, TaskFactory)>,
}

impl std::fmt::Debug for PhaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseRegistry")
            .field("phases", &self.names())
            .finish()
    }
}

impl PhaseRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in phases in lifecycle order
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, factory) in builtin_phases() {
            // Names are distinct constants
            let _ = registry.register(name, factory);
        }
        registry
    }

    /// Append a phase at the end of the lifecycle
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: TaskFactory,
    ) -> Result<(), PhaseError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(PhaseError::DuplicatePhase { name });
        }
        tracing::debug!("Registered phase {name}");
        self.phases.push((name, factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.phases.iter().any(|(n, _)| n == name)
    }

    /// Phase names in lifecycle order
    pub fn names(&self) -> Vec<&str> {
        self.phases.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Factory registered under `name`
    pub fn get(&self, name: &str) -> Result<&TaskFactory, PhaseError> {
        self.phases
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
            .ok_or_else(|| self.unknown(name))
    }

    /// Phases to run to reach `name`, in lifecycle order, ending with `name`
    pub fn lifecycle_to(&self, name: &str) -> Result<Vec<&str>, PhaseError> {
        let end = self
            .phases
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| self.unknown(name))?;
        Ok(self.phases[..=end].iter().map(|(n, _)| n.as_str()).collect())
    }

    /// Build the task definition for one phase and module
    pub fn definition(
        &self,
        phase: &str,
        context: &ModuleContext<'_>,
    ) -> Result<TaskDefinition, PhaseError> {
        let factory = self.get(phase)?;
        Ok(factory(context))
    }

    fn unknown(&self, name: &str) -> PhaseError {
        PhaseError::UnknownPhase {
            name: name.to_string(),
            known: self.names().iter().map(ToString::to_string).collect(),
        }
    }
}

fn factory(build: fn(&ModuleContext<'_>) -> TaskDefinition) -> TaskFactory {
    Arc::new(build)
}

fn builtin_phases() -> Vec<(&'static str, TaskFactory)> {
    vec![
        (COMPILE, factory(compile_task)),
        (JAVA_COMPILE, factory(java_compile_task)),
        (TEST_COMPILE, factory(test_compile_task)),
        (JS_TEST_COMPILE, factory(js_test_compile_task)),
    ]
}

fn compile_task(ctx: &ModuleContext<'_>) -> TaskDefinition {
    let manifest = &ctx.module.manifest;
    ctx.definition(
        COMPILE,
        Frontend::KotlinJvm,
        DependencyScope::Compile,
        &manifest.sources.main,
        &manifest.output.classes,
    )
}

fn java_compile_task(ctx: &ModuleContext<'_>) -> TaskDefinition {
    let manifest = &ctx.module.manifest;
    let mut definition = ctx.definition(
        JAVA_COMPILE,
        Frontend::Javac,
        DependencyScope::Compile,
        &manifest.sources.java,
        &manifest.output.classes,
    );
    // Kotlin classes of the same module
    definition.leading_classpath.insert(
        0,
        ClasspathEntry::new(ctx.path(&manifest.output.classes), DependencyScope::Compile),
    );
    definition
}

fn test_compile_task(ctx: &ModuleContext<'_>) -> TaskDefinition {
    let manifest = &ctx.module.manifest;
    let mut definition = ctx.definition(
        TEST_COMPILE,
        Frontend::KotlinJvm,
        DependencyScope::Test,
        &manifest.sources.test,
        &manifest.output.test_classes,
    );
    definition.leading_classpath.insert(
        0,
        ClasspathEntry::new(ctx.path(&manifest.output.classes), DependencyScope::Compile),
    );
    definition
}

fn js_test_compile_task(ctx: &ModuleContext<'_>) -> TaskDefinition {
    let manifest = &ctx.module.manifest;
    ctx.definition(
        JS_TEST_COMPILE,
        Frontend::KotlinJs,
        DependencyScope::Test,
        &manifest.sources.test,
        &manifest.output.js,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::Manifest;

    fn module(content: &str) -> LoadedModule {
        LoadedModule {
            dir: PathBuf::from("/work/app"),
            manifest: Manifest::from_toml(content).unwrap(),
        }
    }

    #[test]
    fn test_default_lifecycle_order() {
        let registry = PhaseRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["compile", "java-compile", "test-compile", "js-test-compile"]
        );
        assert_eq!(
            registry.lifecycle_to("test-compile").unwrap(),
            vec!["compile", "java-compile", "test-compile"]
        );
        assert_eq!(registry.lifecycle_to("compile").unwrap(), vec!["compile"]);
    }

    #[test]
    fn test_unknown_phase_lists_known_ones() {
        let registry = PhaseRegistry::with_defaults();
        let err = registry.lifecycle_to("package").unwrap_err();
        assert!(matches!(err, PhaseError::UnknownPhase { .. }));
        assert!(err.to_string().contains("test-compile"));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = PhaseRegistry::with_defaults();
        let err = registry
            .register(COMPILE, factory(compile_task))
            .unwrap_err();
        assert_eq!(
            err,
            PhaseError::DuplicatePhase {
                name: "compile".to_string()
            }
        );
    }

    #[test]
    fn test_custom_phase_runs_after_builtins() {
        let mut registry = PhaseRegistry::with_defaults();
        registry
            .register(
                "generated-compile",
                Arc::new(|ctx: &ModuleContext<'_>| {
                    ctx.definition(
                        "generated-compile",
                        Frontend::KotlinJvm,
                        DependencyScope::Compile,
                        &[PathBuf::from("build/generated")],
                        Path::new("target/generated-classes"),
                    )
                }),
            )
            .unwrap();
        assert_eq!(registry.lifecycle_to("generated-compile").unwrap().len(), 5);
    }

    #[test]
    fn test_compile_definition() {
        let module = module(
            r#"
[module]
name = "app"

[[dependencies]]
id = "lib"
path = "libs/lib.jar"

[[dependencies]]
id = "junit"
scope = "test"
path = "libs/junit.jar"
"#,
        );
        let global = GlobalConfig::default();
        let ctx = ModuleContext::new(&module, &global);
        let registry = PhaseRegistry::with_defaults();

        let def = registry.definition(COMPILE, &ctx).unwrap();
        assert_eq!(def.cache_key(), "app/compile");
        assert_eq!(def.frontend, Frontend::KotlinJvm);
        assert_eq!(def.source_roots, vec![PathBuf::from("/work/app/src/main/kotlin")]);
        assert_eq!(def.output_dir, PathBuf::from("/work/app/target/classes"));
        assert_eq!(
            def.dependencies,
            vec![DependencyRef::at_path("lib", DependencyScope::Compile, "libs/lib.jar")]
        );
        assert!(def.leading_classpath.is_empty());
    }

    #[test]
    fn test_test_compile_puts_main_classes_first() {
        let module = module(
            r#"
[module]
name = "app"

[[dependencies]]
id = "junit"
scope = "test"
path = "libs/junit.jar"
"#,
        );
        let global = GlobalConfig::default();
        let ctx = ModuleContext::new(&module, &global);

        let def = PhaseRegistry::with_defaults()
            .definition(TEST_COMPILE, &ctx)
            .unwrap();
        assert_eq!(def.scope, DependencyScope::Test);
        assert_eq!(def.output_dir, PathBuf::from("/work/app/target/test-classes"));
        assert_eq!(
            def.leading_classpath[0].path,
            PathBuf::from("/work/app/target/classes")
        );
        assert_eq!(def.dependencies.len(), 1);
    }

    #[test]
    fn test_module_options_override_global() {
        let module = module("[module]\nname = \"app\"\n[compiler]\njvm-target = \"21\"\n");
        let global: GlobalConfig =
            toml::from_str("[compiler]\njvm-target = \"11\"\nverbose = true\n").unwrap();
        let ctx = ModuleContext::new(&module, &global);

        let options = ctx.options();
        assert_eq!(options.jvm_target.as_deref(), Some("21"));
        assert_eq!(options.verbose, Some(true));
    }

    #[test]
    fn test_sibling_module_dependency_uses_its_classes() {
        let lib = LoadedModule {
            dir: PathBuf::from("/work/lib"),
            manifest: Manifest::from_toml("[module]\nname = \"lib\"\n").unwrap(),
        };
        let app = LoadedModule {
            dir: PathBuf::from("/work/app"),
            manifest: Manifest::from_toml(
                "[module]\nname = \"app\"\n[[dependencies]]\nid = \"lib\"\n",
            )
            .unwrap(),
        };
        let workspace = vec![lib, app];
        let global = GlobalConfig::default();
        let ctx = ModuleContext::new(&workspace[1], &global).with_workspace(&workspace);

        let def = PhaseRegistry::with_defaults()
            .definition(TEST_COMPILE, &ctx)
            .unwrap();
        assert!(def.dependencies.is_empty());
        let leading: Vec<_> = def.leading_classpath.iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            leading,
            vec![
                PathBuf::from("/work/app/target/classes"),
                PathBuf::from("/work/lib/target/classes"),
            ]
        );
    }
}
