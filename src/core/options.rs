//! Compiler options
//!
//! Maps the recognized `[compiler]` options onto command-line arguments for
//! each compiler frontend. Keys that are not recognized are passed through to
//! the compiler verbatim, so the option set stays open to flags this crate
//! does not know about.
//!
//! Values are layered with priority: module manifest > global config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::request::Frontend;

/// Compiler configuration for one task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompilerOptions {
    /// Target JVM bytecode version (e.g. "17")
    pub jvm_target: Option<String>,

    /// Treat warnings as errors
    pub warnings_as_errors: Option<bool>,

    /// Module name recorded in compiled output
    pub module_name: Option<String>,

    /// Suppress warnings
    pub no_warn: Option<bool>,

    /// Verbose compiler output
    pub verbose: Option<bool>,

    /// Source file encoding (javac only)
    pub encoding: Option<String>,

    /// Maximum compiler heap (`-J-Xmx`)
    pub max_memory: Option<String>,

    /// Initial compiler heap (`-J-Xms`)
    pub initial_memory: Option<String>,

    /// Extra JVM launcher options for the compiler process
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jvm_args: Vec<String>,

    /// Raw arguments appended after the recognized options
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Unrecognized keys, passed through verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl CompilerOptions {
    /// Layer `self` over `base`: values set here win, lists are concatenated
    #[must_use]
    pub fn merged_over(&self, base: &CompilerOptions) -> CompilerOptions {
        let mut extra = base.extra.clone();
        extra.extend(self.extra.clone());
        CompilerOptions {
            jvm_target: self.jvm_target.clone().or_else(|| base.jvm_target.clone()),
            warnings_as_errors: self.warnings_as_errors.or(base.warnings_as_errors),
            module_name: self.module_name.clone().or_else(|| base.module_name.clone()),
            no_warn: self.no_warn.or(base.no_warn),
            verbose: self.verbose.or(base.verbose),
            encoding: self.encoding.clone().or_else(|| base.encoding.clone()),
            max_memory: self.max_memory.clone().or_else(|| base.max_memory.clone()),
            initial_memory: self
                .initial_memory
                .clone()
                .or_else(|| base.initial_memory.clone()),
            jvm_args: base.jvm_args.iter().chain(&self.jvm_args).cloned().collect(),
            args: base.args.iter().chain(&self.args).cloned().collect(),
            extra,
        }
    }

    /// Options for the JVM that runs the compiler, as `-J` arguments
    pub fn launcher_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(mem) = self.max_memory.as_deref().filter(|m| !m.is_empty()) {
            args.push(format!("-J-Xmx{mem}"));
        }
        if let Some(mem) = self.initial_memory.as_deref().filter(|m| !m.is_empty()) {
            args.push(format!("-J-Xms{mem}"));
        }
        for arg in &self.jvm_args {
            if arg.starts_with("-J") {
                args.push(arg.clone());
            } else {
                args.push(format!("-J{arg}"));
            }
        }
        args
    }

    /// Compiler arguments for `frontend`
    ///
    /// Recognized options come first in a fixed order, then `args`, then
    /// unrecognized keys sorted by name.
    pub fn compiler_args(&self, frontend: Frontend) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(target) = &self.jvm_target {
            match frontend {
                Frontend::KotlinJvm => push_pair(&mut args, "-jvm-target", target),
                Frontend::Javac => push_pair(&mut args, "--release", target),
                Frontend::KotlinJs => {
                    tracing::debug!("Ignoring jvm-target {target} for {frontend}");
                }
            }
        }
        if let Some(name) = &self.module_name {
            match frontend {
                Frontend::KotlinJvm => push_pair(&mut args, "-module-name", name),
                Frontend::KotlinJs => push_pair(&mut args, "-ir-output-name", name),
                Frontend::Javac => tracing::debug!("Ignoring module-name {name} for {frontend}"),
            }
        }
        if self.no_warn == Some(true) {
            args.push("-nowarn".to_string());
        }
        if self.warnings_as_errors == Some(true) {
            args.push("-Werror".to_string());
        }
        if self.verbose == Some(true) {
            args.push("-verbose".to_string());
        }
        if let Some(encoding) = &self.encoding {
            if frontend == Frontend::Javac {
                push_pair(&mut args, "-encoding", encoding);
            }
        }

        args.extend(self.args.iter().cloned());

        for (key, value) in &self.extra {
            push_passthrough(&mut args, key, value);
        }
        args
    }
}

fn push_pair(args: &mut Vec<String>, flag: &str, value: &str) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

fn push_passthrough(args: &mut Vec<String>, key: &str, value: &toml::Value) {
    match value {
        toml::Value::Boolean(true) => args.push(key.to_string()),
        toml::Value::Boolean(false) => {}
        toml::Value::String(s) => {
            args.push(key.to_string());
            if !s.is_empty() {
                args.push(s.clone());
            }
        }
        toml::Value::Array(items) => {
            for item in items {
                push_passthrough(args, key, item);
            }
        }
        other => {
            args.push(key.to_string());
            args.push(other.to_string());
        }
    }
}
