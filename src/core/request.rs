//! Compile requests
//!
//! A [`CompileRequest`] is everything one compiler invocation needs. It is
//! assembled once per task run and not modified afterwards.

use serde::{Deserialize, Serialize};
use std::env::{self, JoinPathsError};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::options::CompilerOptions;
use crate::core::resolver::ClasspathEntry;
use crate::core::sources::SourceSet;

/// Compiler frontend exposed by the toolchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frontend {
    /// Kotlin to JVM bytecode
    KotlinJvm,
    /// Kotlin to JavaScript
    KotlinJs,
    /// Java to JVM bytecode
    Javac,
}

impl Frontend {
    /// Toolchain sub-command for this frontend
    pub fn subcommand(self) -> &'static str {
        match self {
            Frontend::KotlinJvm => "kotlinc",
            Frontend::KotlinJs => "kotlinc-js",
            Frontend::Javac => "javac",
        }
    }

    /// Source file extensions compiled by this frontend
    pub fn source_extensions(self) -> &'static [&'static str] {
        match self {
            Frontend::KotlinJvm | Frontend::KotlinJs => &["kt"],
            Frontend::Javac => &["java"],
        }
    }

    /// Candidate artifact file names for a source file name
    ///
    /// Kotlin files with top-level declarations compile to `<Name>Kt.class`.
    /// Kotlin/JS produces one bundle for the whole module, so no per-file
    /// artifact exists.
    pub fn artifact_names(self, stem: &str) -> Vec<String> {
        match self {
            Frontend::KotlinJvm => vec![format!("{stem}.class"), format!("{stem}Kt.class")],
            Frontend::Javac => vec![format!("{stem}.class")],
            Frontend::KotlinJs => Vec::new(),
        }
    }
}

impl fmt::Display for Frontend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subcommand())
    }
}

/// One compiler invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CompileRequest {
    frontend: Frontend,
    sources: SourceSet,
    files: Vec<PathBuf>,
    classpath: Vec<ClasspathEntry>,
    output_dir: PathBuf,
    options: CompilerOptions,
    working_dir: PathBuf,
}

impl CompileRequest {
    /// Create a request writing into `output_dir`
    pub fn new(frontend: Frontend, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            frontend,
            sources: SourceSet::empty(),
            files: Vec::new(),
            classpath: Vec::new(),
            output_dir: output_dir.into(),
            options: CompilerOptions::default(),
            working_dir: PathBuf::from("."),
        }
    }

    #[must_use]
    pub fn with_sources(mut self, sources: SourceSet) -> Self {
        self.sources = sources;
        self
    }

    /// Files to compile (the planned subset)
    #[must_use]
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    #[must_use]
    pub fn with_classpath(mut self, classpath: Vec<ClasspathEntry>) -> Self {
        self.classpath = classpath;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn frontend(&self) -> Frontend {
        self.frontend
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn classpath(&self) -> &[ClasspathEntry] {
        &self.classpath
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Classpath joined with the platform separator, in entry order
    pub fn classpath_string(&self) -> Result<String, JoinPathsError> {
        join_paths(self.classpath.iter().map(|e| e.path.as_path()))
    }

    /// Source roots joined with the platform separator
    pub fn sourcepath_string(&self) -> Result<String, JoinPathsError> {
        join_paths(self.sources.roots().iter().map(PathBuf::as_path))
    }
}

fn join_paths<'a>(paths: impl Iterator<Item = &'a Path>) -> Result<String, JoinPathsError> {
    env::join_paths(paths).map(|joined| joined.to_string_lossy().into_owned())
}
