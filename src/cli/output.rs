//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying spinners, status messages,
//! compiler diagnostics and errors to the user. Output mode (quiet, JSON,
//! verbose) is set once at startup and read from anywhere.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::core::result::{Diagnostic, Severity};
use crate::core::task::{TaskOutcome, TaskState};

static QUIET: AtomicBool = AtomicBool::new(false);
static JSON: AtomicBool = AtomicBool::new(false);
static VERBOSITY: AtomicU8 = AtomicU8::new(0);

/// Output mode selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputConfig {
    pub quiet: bool,
    pub json: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make this the process-wide output mode
    pub fn apply_global(self) {
        QUIET.store(self.quiet, Ordering::Relaxed);
        JSON.store(self.json, Ordering::Relaxed);
        VERBOSITY.store(self.verbose, Ordering::Relaxed);
    }

    /// Log filter directive for this verbosity
    pub fn log_level(self) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, _) => tracing::Level::DEBUG,
        }
    }
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

pub fn verbosity() -> u8 {
    VERBOSITY.load(Ordering::Relaxed)
}

/// Create a spinner for operations with unknown duration
///
/// Hidden in quiet and JSON modes.
pub fn create_spinner(message: &str) -> ProgressBar {
    if is_quiet() || is_json() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";

    /// Skipped prefix
    pub const SKIPPED: &str = "○";
}

pub fn print_success(message: &str) {
    if !is_quiet() && !is_json() {
        println!("{} {message}", status::SUCCESS);
    }
}

pub fn print_info(message: &str) {
    if !is_quiet() && !is_json() {
        println!("{} {message}", status::INFO);
    }
}

pub fn print_warning(message: &str) {
    if !is_json() {
        eprintln!("{} {message}", status::WARNING);
    }
}

/// Indented detail line under a status message
pub fn print_detail(message: &str) {
    if !is_quiet() && !is_json() {
        println!("    {message}");
    }
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render a diagnostic the way the compiler printed it
pub fn print_diagnostic(diagnostic: &Diagnostic) {
    match diagnostic.severity {
        Severity::Error => eprintln!("{diagnostic}"),
        Severity::Warning if !is_quiet() => eprintln!("{diagnostic}"),
        Severity::Info if verbosity() > 0 => println!("{diagnostic}"),
        _ => {}
    }
}

/// One summary line per task plus its diagnostics
pub fn print_outcome(outcome: &TaskOutcome) {
    let label = format!("{}:{}", outcome.module, outcome.phase);
    match outcome.state {
        TaskState::Done if outcome.compiled.is_empty() => {
            if verbosity() > 0 {
                println!(
                    "{} {label} up to date ({} file(s))",
                    status::SKIPPED,
                    outcome.up_to_date
                );
            }
        }
        TaskState::Done => {
            let millis = outcome.result.as_ref().map_or(0, |r| r.timing.duration_ms);
            print_success(&format!(
                "{label} compiled {} file(s) in {millis} ms",
                outcome.compiled.len()
            ));
        }
        TaskState::Cancelled => print_warning(&format!("{label} cancelled")),
        _ => {
            let reason = match (&outcome.error, &outcome.result) {
                (Some(error), _) => error.to_string(),
                (None, Some(result)) => format!(
                    "compilation failed with {} error(s)",
                    result.count(Severity::Error)
                ),
                (None, None) => "failed".to_string(),
            };
            eprintln!("{} {label} {reason}", status::ERROR);
        }
    }

    if let Some(result) = &outcome.result {
        for diagnostic in &result.diagnostics {
            print_diagnostic(diagnostic);
        }
    }
}

/// Print an error and its causes
pub fn display_error(error: &anyhow::Error) {
    if is_json() {
        let chain: Vec<String> = error.chain().map(ToString::to_string).collect();
        let value = serde_json::json!({ "status": "error", "error": chain });
        println!("{value}");
        return;
    }
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("    Caused by: {cause}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_follows_flags() {
        assert_eq!(OutputConfig::new(false, false, 0).log_level(), tracing::Level::WARN);
        assert_eq!(OutputConfig::new(false, false, 1).log_level(), tracing::Level::INFO);
        assert_eq!(OutputConfig::new(false, false, 3).log_level(), tracing::Level::DEBUG);
        assert_eq!(OutputConfig::new(true, false, 2).log_level(), tracing::Level::ERROR);
    }
}
