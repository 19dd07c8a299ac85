//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: temporary
//! projects, in-process fake toolchains and a fake compiler script.

#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Mutex;
use std::time::Duration;

use kompile::core::build_cache::CacheStore;
use kompile::core::manifest::{LoadedModule, Manifest};
use kompile::core::request::CompileRequest;
use kompile::core::result::{CompileResult, Timing};
use kompile::error::ToolchainError;
use kompile::infra::toolchain::Toolchain;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Test project context
///
/// Creates a temporary directory for test projects and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a project with a `kompile.toml`
    pub fn with_manifest(manifest: &str) -> Self {
        let project = Self::new();
        project.create_file("kompile.toml", manifest);
        project
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Load the manifest at `dir` (relative to the project) as a module
    pub fn module(&self, dir: &str) -> LoadedModule {
        let dir = match dir {
            "." => self.path(),
            member => self.dir.path().join(member),
        };
        let manifest =
            Manifest::load(&dir.join("kompile.toml")).expect("Failed to load manifest");
        LoadedModule { dir, manifest }
    }

    /// Build cache stored inside the project
    pub fn cache(&self) -> CacheStore {
        CacheStore::new(self.dir.path().join(".kompile").join("build-cache.json"))
    }

    /// Run the kompile binary against this project
    ///
    /// The global config directory points into the project so the user's
    /// own settings never leak into a test.
    pub fn kompile(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_kompile"))
            .arg("-C")
            .arg(self.path())
            .args(args)
            .env("KOMPILE_CONFIG_DIR", self.path().join(".config"))
            .env_remove("KOMPILE_CACHE_DIR")
            .env_remove("KOMPILE_TOOLCHAIN")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute kompile")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Single module with the default source layout
pub const SAMPLE_MODULE: &str = r#"
[module]
name = "app"
"#;

/// Kotlin source with a top-level function
pub const SAMPLE_KOTLIN: &str = "fun greet() = \"hello\"\n";

/// A toolchain that never starts a process
///
/// Records every request it receives. On success it writes a class file per
/// compiled source into the output directory, the way kotlinc would.
pub struct FakeToolchain {
    requests: Mutex<Vec<CompileRequest>>,
    exit_code: i32,
    output: String,
}

impl FakeToolchain {
    /// A compiler that accepts everything
    pub fn succeeding() -> Self {
        Self::with_output(0, "")
    }

    /// A compiler exiting with `exit_code` and printing `output`
    pub fn with_output(exit_code: i32, output: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            exit_code,
            output: output.to_string(),
        }
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of compiler invocations so far
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    async fn compile(&self, request: &CompileRequest) -> Result<CompileResult, ToolchainError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.exit_code == 0 {
            for file in request.files() {
                let stem = file.file_stem().unwrap().to_string_lossy();
                if let Some(name) = request.frontend().artifact_names(&stem).pop() {
                    std::fs::write(request.output_dir().join(name), b"class").unwrap();
                }
            }
        }
        Ok(CompileResult::from_output(
            Some(self.exit_code),
            &self.output,
            Timing::new(0, Duration::from_millis(1)),
        ))
    }
}

impl Toolchain for FakeToolchain {
    fn invoke(
        &self,
        request: &CompileRequest,
        _cancel: &CancellationToken,
    ) -> impl Future<Output = Result<CompileResult, ToolchainError>> + Send {
        self.compile(request)
    }
}

/// A toolchain that runs until cancelled
pub struct HangingToolchain;

impl Toolchain for HangingToolchain {
    fn invoke(
        &self,
        _request: &CompileRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<CompileResult, ToolchainError>> + Send {
        let cancel = cancel.clone();
        async move {
            cancel.cancelled().await;
            Err(ToolchainError::Cancelled)
        }
    }
}

/// Write an executable stand-in for the elide binary
///
/// It logs its arguments to `args.txt` in the working directory, creates
/// `<Name>Kt.class` for each `.kt` argument in the `-d` directory and exits
/// with `exit_code`.
#[cfg(unix)]
pub fn fake_compiler_script(dir: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        r#"#!/bin/sh
echo "$@" >> args.txt
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-d" ]; then out="$arg"; fi
  prev="$arg"
done
if [ {exit_code} -eq 0 ] && [ -n "$out" ]; then
  mkdir -p "$out"
  for arg in "$@"; do
    case "$arg" in
      *.kt) touch "$out/$(basename "$arg" .kt)Kt.class" ;;
    esac
  done
else
  echo "e: file:///src/A.kt:1:5 unresolved reference: nope"
fi
exit {exit_code}
"#
    );
    let path = dir.join("fake-elide");
    std::fs::write(&path, script).expect("Failed to write fake compiler");
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

/// Write a stand-in for elide that records its pid in `pid.txt` and sleeps
#[cfg(unix)]
pub fn sleeping_compiler_script(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("slow-elide");
    std::fs::write(&path, "#!/bin/sh\necho $$ > pid.txt\nexec sleep 30\n")
        .expect("Failed to write slow compiler");
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}
