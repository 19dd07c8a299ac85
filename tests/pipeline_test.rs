//! Integration tests for the build pipeline
//!
//! - Requesting a phase runs every phase before it, in lifecycle order
//! - A failing phase halts the pipeline
//! - Workspace modules compile after the sibling modules they depend on
//! - Unknown phases and module cycles are rejected up front
//! - Custom phases registered after the built-ins run last

mod common;

use common::{FakeToolchain, TestProject, SAMPLE_KOTLIN};
use kompile::core::global_config::GlobalConfig;
use kompile::core::manifest::load_workspace;
use kompile::core::phase::{ModuleContext, PhaseRegistry};
use kompile::core::pipeline::Pipeline;
use kompile::core::request::Frontend;
use kompile::core::scope::DependencyScope;
use kompile::core::task::TaskState;
use kompile::error::{PhaseError, PipelineError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const MODULE_WITH_TESTS: &str = r#"
[module]
name = "app"

[[dependencies]]
id = "junit"
scope = "test"
path = "libs/junit.jar"
"#;

fn project_with_tests() -> TestProject {
    let project = TestProject::with_manifest(MODULE_WITH_TESTS);
    project.create_file("src/main/kotlin/Main.kt", SAMPLE_KOTLIN);
    project.create_file("src/test/kotlin/MainTest.kt", "fun testGreet() = greet()\n");
    project.create_file("libs/junit.jar", "jar");
    project
}

fn workspace_project() -> TestProject {
    let project = TestProject::with_manifest(
        r#"
[workspace]
members = ["app", "lib"]
"#,
    );
    project.create_file(
        "app/kompile.toml",
        r#"
[module]
name = "app"

[[dependencies]]
id = "lib"
"#,
    );
    project.create_file("app/src/main/kotlin/App.kt", "fun main() = lib()\n");
    project.create_file("lib/kompile.toml", "[module]\nname = \"lib\"\n");
    project.create_file("lib/src/main/kotlin/Lib.kt", "fun lib() = 1\n");
    project
}

#[tokio::test]
async fn test_phase_runs_its_lifecycle_in_order() {
    let project = project_with_tests();
    let modules = load_workspace(&project.path()).unwrap();
    let pipeline = Pipeline::new(FakeToolchain::succeeding()).with_jobs(2);

    let report = pipeline
        .run(
            "test-compile",
            &modules,
            &GlobalConfig::default(),
            &project.cache(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.phases, vec!["compile", "java-compile", "test-compile"]);
    let phases: Vec<&str> = report.outcomes.iter().map(|o| o.phase.as_str()).collect();
    assert_eq!(phases, vec!["compile", "java-compile", "test-compile"]);

    // java-compile has no sources and never reaches the compiler
    let requests = pipeline.toolchain().requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.frontend() == Frontend::KotlinJvm));

    let test_classpath = requests[1].classpath();
    assert!(test_classpath[0].path.ends_with("target/classes"));
    assert!(test_classpath[1].path.ends_with("libs/junit.jar"));
}

#[tokio::test]
async fn test_main_compile_does_not_see_test_dependencies() {
    let project = project_with_tests();
    let modules = load_workspace(&project.path()).unwrap();
    let pipeline = Pipeline::new(FakeToolchain::succeeding());

    pipeline
        .run(
            "compile",
            &modules,
            &GlobalConfig::default(),
            &project.cache(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let requests = pipeline.toolchain().requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].classpath().is_empty());
}

#[tokio::test]
async fn test_failed_phase_halts_pipeline() {
    let project = project_with_tests();
    let modules = load_workspace(&project.path()).unwrap();
    let pipeline = Pipeline::new(FakeToolchain::with_output(1, "e: broken"));

    let report = pipeline
        .run(
            "test-compile",
            &modules,
            &GlobalConfig::default(),
            &project.cache(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.halted_at.as_deref(), Some("compile"));
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].state, TaskState::Failed);
    assert_eq!(pipeline.toolchain().calls(), 1);
}

#[tokio::test]
async fn test_workspace_modules_compile_after_their_dependencies() {
    let project = workspace_project();
    let modules = load_workspace(&project.path()).unwrap();
    let pipeline = Pipeline::new(FakeToolchain::succeeding()).with_jobs(4);

    let report = pipeline
        .run(
            "compile",
            &modules,
            &GlobalConfig::default(),
            &project.cache(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    let order: Vec<&str> = report.outcomes.iter().map(|o| o.module.as_str()).collect();
    assert_eq!(order, vec!["lib", "app"]);

    let requests = pipeline.toolchain().requests();
    let app_classpath = requests[1].classpath();
    assert_eq!(app_classpath.len(), 1);
    assert!(app_classpath[0].path.ends_with("lib/target/classes"));
}

#[tokio::test]
async fn test_workspace_modules_share_one_cache_file() {
    let project = workspace_project();
    let modules = load_workspace(&project.path()).unwrap();
    let cache = project.cache();
    let pipeline = Pipeline::new(FakeToolchain::succeeding());

    pipeline
        .run("compile", &modules, &GlobalConfig::default(), &cache, &CancellationToken::new())
        .await
        .unwrap();

    let mut sections = cache.modules();
    sections.sort();
    assert_eq!(sections, vec!["app/compile", "lib/compile"]);
}

#[tokio::test]
async fn test_unknown_phase_is_rejected() {
    let project = project_with_tests();
    let modules = load_workspace(&project.path()).unwrap();
    let pipeline = Pipeline::new(FakeToolchain::succeeding());

    let err = pipeline
        .run(
            "package",
            &modules,
            &GlobalConfig::default(),
            &project.cache(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Phase(PhaseError::UnknownPhase { .. })
    ));
    assert_eq!(pipeline.toolchain().calls(), 0);
}

#[tokio::test]
async fn test_module_cycle_is_rejected() {
    let project = TestProject::with_manifest("[workspace]\nmembers = [\"a\", \"b\"]\n");
    project.create_file("a/kompile.toml", "[module]\nname = \"a\"\n[[dependencies]]\nid = \"b\"\n");
    project.create_file("b/kompile.toml", "[module]\nname = \"b\"\n[[dependencies]]\nid = \"a\"\n");
    let modules = load_workspace(&project.path()).unwrap();
    let pipeline = Pipeline::new(FakeToolchain::succeeding());

    let err = pipeline
        .run(
            "compile",
            &modules,
            &GlobalConfig::default(),
            &project.cache(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::CircularModules { .. }));
    assert!(err.to_string().contains("a -> b -> a"));
}

#[tokio::test]
async fn test_cancelled_pipeline_stops_after_current_wave() {
    let project = project_with_tests();
    let modules = load_workspace(&project.path()).unwrap();
    let pipeline = Pipeline::new(FakeToolchain::succeeding());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = pipeline
        .run(
            "test-compile",
            &modules,
            &GlobalConfig::default(),
            &project.cache(),
            &cancel,
        )
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].state, TaskState::Cancelled);
    assert_eq!(pipeline.toolchain().calls(), 0);
}

#[tokio::test]
async fn test_custom_phase_runs_after_builtins() {
    let project = TestProject::with_manifest("[module]\nname = \"app\"\n");
    project.create_file("build/generated/Gen.kt", "fun generated() = 1\n");
    let modules = load_workspace(&project.path()).unwrap();

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
    let pipeline = Pipeline::new(FakeToolchain::succeeding()).with_registry(registry);
    assert!(pipeline.registry().contains("generated-compile"));

    let report = pipeline
        .run(
            "generated-compile",
            &modules,
            &GlobalConfig::default(),
            &project.cache(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(pipeline.toolchain().calls(), 1);
    assert!(project.file_exists("target/generated-classes/GenKt.class"));
}
