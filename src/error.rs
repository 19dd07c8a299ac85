//! Error types for kompile
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Classpath resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// A declared dependency has no resolvable filesystem path
    #[error("Unresolved dependency '{dependency}': {reason}")]
    UnresolvedDependency { dependency: String, reason: String },

    /// Dependency identifier is not valid `group:artifact:version` coordinates
    #[error("Invalid dependency coordinates '{id}': expected group:artifact:version[:classifier]")]
    InvalidCoordinates { id: String },
}

/// Source set construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceSetError {
    /// One source root lives inside another
    #[error("Source root '{root}' is nested inside source root '{parent}'")]
    NestedRoot { root: PathBuf, parent: PathBuf },
}

/// Compiler toolchain errors
///
/// A compiler that runs and reports errors is not a `ToolchainError`; that is
/// a failed [`crate::core::result::CompileResult`].
#[derive(Error, Debug)]
pub enum ToolchainError {
    /// Executable could not be located
    #[error("Compiler executable '{executable}' not found. Install elide or set [toolchain] executable")]
    NotFound { executable: String },

    /// Executable was located but could not be started
    #[error("Failed to launch compiler '{executable}': {error}")]
    Launch { executable: PathBuf, error: String },

    /// Reading compiler output failed
    #[error("IO error while running compiler '{executable}': {error}")]
    Io { executable: PathBuf, error: String },

    /// A path cannot be passed in a separator-joined argument
    #[error("Cannot build compiler arguments: {error}")]
    InvalidArgument { error: String },

    /// The run was cancelled and the child process terminated
    #[error("Compilation cancelled")]
    Cancelled,
}

/// Build cache persistence errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Could not acquire the cache file lock
    #[error("Failed to lock build cache '{path}': {error}")]
    Lock { path: PathBuf, error: String },

    /// Could not write the cache file
    #[error("Failed to write build cache '{path}': {error}")]
    Write { path: PathBuf, error: String },

    /// Could not serialize the cache contents
    #[error("Failed to serialize build cache: {0}")]
    Serialize(String),
}

/// Manifest (kompile.toml) errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file does not exist
    #[error("Manifest not found at '{path}'. Create a kompile.toml to describe the module.")]
    NotFound { path: PathBuf },

    /// Manifest could not be read
    #[error("Failed to read manifest '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Manifest is not valid TOML or has the wrong shape
    #[error("Failed to parse manifest '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Manifest parsed but describes an invalid module
    #[error("Invalid manifest: {message}")]
    Invalid { message: String },
}

/// Phase registration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    /// No task factory registered under this name
    #[error("Unknown phase '{name}'. Registered phases: {}", known.join(", "))]
    UnknownPhase { name: String, known: Vec<String> },

    /// A factory is already registered under this name
    #[error("Phase '{name}' is already registered")]
    DuplicatePhase { name: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Fatal errors that move a phase task into its `Failed` state
#[derive(Error, Debug)]
pub enum TaskError {
    /// Classpath could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolverError),

    /// Source roots are invalid
    #[error(transparent)]
    Sources(#[from] SourceSetError),

    /// Compiler could not be launched
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    /// Successful build could not be recorded
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Output directory could not be prepared
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Pipeline setup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Requested or registered phase is invalid
    #[error(transparent)]
    Phase(#[from] PhaseError),

    /// Workspace modules depend on each other in a cycle
    #[error("Circular module dependency: {}", cycle.join(" -> "))]
    CircularModules { cycle: Vec<String> },
}
