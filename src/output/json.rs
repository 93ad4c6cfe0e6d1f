//! JSON output formatter

use super::OutputFormatter;
use crate::diagnostic::Diagnostic;
use crate::engine::LintResult;
use serde::Serialize;
use std::path::Path;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    diagnostics: Vec<JsonDiagnostic<'a>>,
    failures: Vec<JsonFailure<'a>>,
    summary: JsonSummary,
}

/// A diagnostic with its file; `line` and `column` stay `null` when unknown
#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    file: String,
    #[serde(flatten)]
    diagnostic: &'a Diagnostic,
}

#[derive(Serialize)]
struct JsonFailure<'a> {
    file: String,
    rule_id: &'a str,
    node_kind: &'static str,
    line: Option<usize>,
    message: &'a str,
}

#[derive(Serialize)]
struct JsonSummary {
    files_processed: usize,
    files_with_errors: usize,
    files_with_warnings: usize,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
    failure_count: usize,
    duration_ms: u128,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, result: &LintResult) -> String {
        let diagnostics = result
            .diagnostics()
            .map(|(path, d)| JsonDiagnostic {
                file: path.display().to_string(),
                diagnostic: d,
            })
            .collect();

        let failures = result
            .files
            .iter()
            .flat_map(|file| {
                file.failures.iter().map(move |f| JsonFailure {
                    file: file.path.display().to_string(),
                    rule_id: &f.rule_id,
                    node_kind: f.node_kind.as_str(),
                    line: f.line,
                    message: &f.message,
                })
            })
            .collect();

        let output = JsonOutput {
            diagnostics,
            failures,
            summary: JsonSummary {
                files_processed: result.files_processed,
                files_with_errors: result.files_with_errors,
                files_with_warnings: result.files_with_warnings,
                error_count: result.error_count,
                warning_count: result.warning_count,
                info_count: result.info_count,
                failure_count: result.failure_count,
                duration_ms: result.duration.as_millis(),
            },
        };

        self.to_json(&output)
    }

    fn format_diagnostic(&self, path: &Path, diagnostic: &Diagnostic) -> String {
        self.to_json(&JsonDiagnostic {
            file: path.display().to_string(),
            diagnostic,
        })
    }
}
