//! Kompile - Build-phase compile orchestrator
//!
//! This library resolves the inputs of a compilation task (source roots,
//! classpath, dependency scope), plans an incremental compile, runs the
//! `elide` compiler toolchain and reports a structured outcome.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Orchestration logic (tasks, planning, resolution)
//! - [`infra`] - Infrastructure layer (filesystem, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
