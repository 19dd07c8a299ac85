//! Core business logic module
//!
//! This module contains the orchestration logic for kompile.
//! Process spawning and file I/O helpers belong in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`manifest`] - Manifest (kompile.toml) parsing and validation
//! - [`global_config`] - Global configuration management
//! - [`scope`] - Dependency scopes
//! - [`resolver`] - Classpath resolution
//! - [`sources`] - Source roots and source discovery
//! - [`options`] - Compiler option mapping
//! - [`request`] - Compile requests
//! - [`result`] - Compile results and diagnostics
//! - [`build_cache`] - Persisted fingerprint store
//! - [`planner`] - Incremental compilation planning
//! - [`task`] - Phase task state machine
//! - [`phase`] - Phase registration and lifecycle order
//! - [`pipeline`] - Multi-module pipeline execution

pub mod build_cache;
pub mod global_config;
pub mod manifest;
pub mod options;
pub mod phase;
pub mod pipeline;
pub mod planner;
pub mod request;
pub mod resolver;
pub mod result;
pub mod scope;
pub mod sources;
pub mod task;
