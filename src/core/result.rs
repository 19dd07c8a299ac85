//! Compile results and diagnostics
//!
//! A [`CompileResult`] is built once from the compiler's exit status and
//! output and then only read. Diagnostics keep the line exactly as the
//! compiler printed it so they can be rendered unchanged: lines that follow
//! a diagnostic without matching a format (source echo, caret markers,
//! summaries) stay attached to it in order.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    fn parse(token: &str) -> Self {
        match token {
            "e" | "error" | "exception" => Severity::Error,
            "w" | "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One compiler message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub message: String,
    /// Text as the compiler printed it
    pub raw: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Whether the compiler accepted the sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileStatus {
    Success,
    Failure,
}

/// Timing metadata for one compiler run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timing {
    /// Start time in milliseconds since the Unix epoch
    pub started_at: u64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl Timing {
    pub fn new(started_at: u64, duration: Duration) -> Self {
        Self {
            started_at,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Outcome of one compiler invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileResult {
    pub status: CompileStatus,
    /// Process exit code; `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    pub diagnostics: Vec<Diagnostic>,
    pub timing: Timing,
}

impl CompileResult {
    /// Build a result from a finished compiler process
    pub fn from_output(exit_code: Option<i32>, output: &str, timing: Timing) -> Self {
        let status = if exit_code == Some(0) {
            CompileStatus::Success
        } else {
            CompileStatus::Failure
        };
        Self {
            status,
            exit_code,
            diagnostics: parse_diagnostics(output, status),
            timing,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CompileStatus::Success
    }

    /// Number of diagnostics with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

struct Patterns {
    located: Regex,
    legacy_paren: Regex,
    legacy_colon: Regex,
    bare: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // path/File.kt:12:5: error: message  /  path/File.java:12: error: message
            located: Regex::new(
                r"^(?P<file>\S.*?):(?P<line>\d+)(?::(?P<col>\d+))?: (?P<sev>error|warning|info|note|exception): (?P<msg>.*)$",
            )?,
            // e: /path/File.kt: (12, 5): message
            legacy_paren: Regex::new(
                r"^(?P<sev>[ewiv]): (?:file://)?(?P<file>.+?): \((?P<line>\d+), (?P<col>\d+)\): (?P<msg>.*)$",
            )?,
            // w: file:///path/File.kt:12:5 message
            legacy_colon: Regex::new(
                r"^(?P<sev>[ewiv]): (?:file://)?(?P<file>.+?):(?P<line>\d+):(?P<col>\d+):? (?P<msg>.*)$",
            )?,
            // e: message
            bare: Regex::new(r"^(?P<sev>[ewiv]): (?P<msg>.+)$")?,
        })
    }

    fn parse(&self, line: &str) -> Option<Diagnostic> {
        let caps = [
            &self.located,
            &self.legacy_paren,
            &self.legacy_colon,
            &self.bare,
        ]
        .into_iter()
        .find_map(|re| re.captures(line))?;

        Some(Diagnostic {
            severity: Severity::parse(&caps["sev"]),
            file: caps.name("file").map(|m| PathBuf::from(m.as_str())),
            line: caps.name("line").and_then(|m| m.as_str().parse().ok()),
            column: caps.name("col").and_then(|m| m.as_str().parse().ok()),
            message: caps["msg"].to_string(),
            raw: line.to_string(),
        })
    }
}

/// Diagnostic for text that matches no known format
fn generic(text: &str, status: CompileStatus) -> Diagnostic {
    Diagnostic {
        severity: match status {
            CompileStatus::Success => Severity::Info,
            CompileStatus::Failure => Severity::Error,
        },
        file: None,
        line: None,
        column: None,
        message: text.to_string(),
        raw: text.to_string(),
    }
}

/// Parse compiler output into diagnostics
///
/// A line that matches no known format continues the diagnostic before it.
/// Unmatched lines before the first diagnostic form a generic entry whose
/// severity follows the exit status. Joining every `raw` with newlines gives
/// back the non-blank output lines in their original order.
pub fn parse_diagnostics(output: &str, status: CompileStatus) -> Vec<Diagnostic> {
    let patterns = match Patterns::new() {
        Ok(patterns) => patterns,
        Err(e) => {
            tracing::warn!("Failed to build diagnostic patterns: {e}");
            let text: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
            if text.is_empty() {
                return Vec::new();
            }
            return vec![generic(&text.join("\n"), status)];
        }
    };

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    // Whether the last entry is a generic one whose message grows with its text
    let mut last_generic = false;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(diagnostic) = patterns.parse(line) {
            diagnostics.push(diagnostic);
            last_generic = false;
            continue;
        }
        match diagnostics.last_mut() {
            Some(last) => {
                last.raw.push('\n');
                last.raw.push_str(line);
                if last_generic {
                    last.message = last.raw.clone();
                }
            }
            None => {
                diagnostics.push(generic(line, status));
                last_generic = true;
            }
        }
    }

    diagnostics
}
