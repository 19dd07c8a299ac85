//! Compiler toolchain invocation
//!
//! Locates the `elide` toolchain binary and runs one of its compiler
//! frontends (`kotlinc`, `kotlinc-js`, `javac`) as a child process. The
//! argument list is derived only from the [`CompileRequest`], so the same
//! request always produces the same command line.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::defaults::DEFAULT_TOOLCHAIN_BINARY;
use crate::core::request::{CompileRequest, Frontend};
use crate::core::result::{CompileResult, Timing};
use crate::error::ToolchainError;
use crate::infra::filesystem::now_millis;

/// A compiler toolchain the pipeline can hand compile requests to
///
/// A compiler that runs and rejects the sources returns `Ok` with a failed
/// [`CompileResult`]; `Err` is reserved for not being able to run at all, or
/// for cancellation.
pub trait Toolchain: Send + Sync {
    fn invoke(
        &self,
        request: &CompileRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<CompileResult, ToolchainError>> + Send;
}

/// Find the toolchain executable
///
/// A configured value containing a path separator must point at an existing
/// file; a bare name is looked up on `PATH`. Without configuration the
/// default `elide` binary is looked up on `PATH`.
pub fn locate_executable(configured: Option<&Path>) -> Result<PathBuf, ToolchainError> {
    let wanted = configured.unwrap_or_else(|| Path::new(DEFAULT_TOOLCHAIN_BINARY));

    if wanted.components().count() > 1 || wanted.is_absolute() {
        return if wanted.is_file() {
            Ok(wanted.to_path_buf())
        } else {
            Err(ToolchainError::NotFound {
                executable: wanted.display().to_string(),
            })
        };
    }

    which::which(wanted).map_err(|e| {
        tracing::debug!("PATH lookup for {} failed: {e}", wanted.display());
        ToolchainError::NotFound {
            executable: wanted.display().to_string(),
        }
    })
}

/// Build the toolchain argument list for a request
///
/// Layout:
/// - `kotlinc`: `[-J..] kotlinc -- <options> -d <out> [-classpath <cp>] -- <files>`
/// - `kotlinc-js`: `[-J..] kotlinc-js -- <options> -ir-output-dir <out> [-libraries <cp>] -- <files>`
/// - `javac`: `[-J..] javac -- -d <out> [-classpath <cp>] [-sourcepath <roots>] <files> <options>`
///
/// Fails when a classpath entry or source root contains the platform path
/// separator.
pub fn command_line(request: &CompileRequest) -> Result<Vec<String>, ToolchainError> {
    let invalid = |e: std::env::JoinPathsError| ToolchainError::InvalidArgument {
        error: e.to_string(),
    };
    let frontend = request.frontend();
    let options = request.options();
    let out = request.output_dir().to_string_lossy().into_owned();
    let classpath = request.classpath_string().map_err(invalid)?;
    let files = request
        .files()
        .iter()
        .map(|f| f.to_string_lossy().into_owned());

    let mut args = options.launcher_args();
    args.push(frontend.subcommand().to_string());
    args.push("--".to_string());

    match frontend {
        Frontend::KotlinJvm | Frontend::KotlinJs => {
            args.extend(options.compiler_args(frontend));
            let (out_flag, cp_flag) = if frontend == Frontend::KotlinJvm {
                ("-d", "-classpath")
            } else {
                ("-ir-output-dir", "-libraries")
            };
            args.push(out_flag.to_string());
            args.push(out);
            if !classpath.is_empty() {
                args.push(cp_flag.to_string());
                args.push(classpath);
            }
            args.push("--".to_string());
            args.extend(files);
        }
        Frontend::Javac => {
            args.push("-d".to_string());
            args.push(out);
            if !classpath.is_empty() {
                args.push("-classpath".to_string());
                args.push(classpath);
            }
            if !request.sources().is_empty() {
                args.push("-sourcepath".to_string());
                args.push(request.sourcepath_string().map_err(invalid)?);
            }
            args.extend(files);
            args.extend(options.compiler_args(frontend));
        }
    }
    Ok(args)
}

/// Runs the toolchain binary as a child process
#[derive(Debug, Clone)]
pub struct ProcessToolchain {
    executable: PathBuf,
}

impl ProcessToolchain {
    /// Use a specific executable without checking it exists
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Locate the executable (see [`locate_executable`])
    pub fn locate(configured: Option<&Path>) -> Result<Self, ToolchainError> {
        locate_executable(configured).map(Self::new)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// First line of `<executable> --version`, if it runs
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.executable)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.lines()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string())
    }

    async fn run(
        &self,
        request: &CompileRequest,
        cancel: &CancellationToken,
    ) -> Result<CompileResult, ToolchainError> {
        let args = command_line(request)?;
        tracing::info!(
            "Compiling {} file(s) with {} {}",
            request.files().len(),
            self.executable.display(),
            request.frontend()
        );
        tracing::debug!("Command line: {} {}", self.executable.display(), args.join(" "));

        let started_at = now_millis();
        let start = Instant::now();

        let mut child = Command::new(&self.executable)
            .args(&args)
            .current_dir(request.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound && !self.executable.exists() {
                    ToolchainError::NotFound {
                        executable: self.executable.display().to_string(),
                    }
                } else {
                    ToolchainError::Launch {
                        executable: self.executable.clone(),
                        error: e.to_string(),
                    }
                }
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_line_reader(child.stdout.take(), tx.clone());
        spawn_line_reader(child.stderr.take(), tx);

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            () = cancel.cancelled() => None,
        };

        let Some(status) = waited else {
            tracing::warn!("Cancelling compiler process {}", self.executable.display());
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to terminate compiler process: {e}");
            }
            return Err(ToolchainError::Cancelled);
        };
        let status = status.map_err(|e| ToolchainError::Io {
            executable: self.executable.clone(),
            error: e.to_string(),
        })?;

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }

        let result = CompileResult::from_output(
            status.code(),
            &lines.join("\n"),
            Timing::new(started_at, start.elapsed()),
        );
        tracing::info!(
            "Compiler exited with {:?} after {} ms",
            status.code(),
            result.timing.duration_ms
        );
        Ok(result)
    }
}

impl Toolchain for ProcessToolchain {
    fn invoke(
        &self,
        request: &CompileRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<CompileResult, ToolchainError>> + Send {
        self.run(request, cancel)
    }
}

fn spawn_line_reader<R>(stream: Option<R>, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(stream) = stream else {
        return;
    };
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    tracing::debug!(target: "kompile::compiler", "{line}");
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read compiler output: {e}");
                    break;
                }
            }
        }
    });
}
