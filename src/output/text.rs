//! Human-readable text output formatter

use super::OutputFormatter;
use crate::diagnostic::{Diagnostic, Severity};
use crate::engine::LintResult;
use colored::*;
use std::path::Path;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show the offending source under each diagnostic
    pub show_source: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_source: true,
            show_stats: true,
        }
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
            Severity::Info => s.blue(),
        }
    }

    fn format_location(&self, path: &Path, diag: &Diagnostic) -> String {
        match (diag.line, diag.column) {
            (Some(line), Some(column)) => format!("{}:{}:{}", path.display(), line, column),
            (Some(line), None) => format!("{}:{}", path.display(), line),
            _ => path.display().to_string(),
        }
    }

    fn paint(&self, s: String, color: Color) -> String {
        if self.colored {
            s.color(color).to_string()
        } else {
            s
        }
    }

    fn summary(&self, result: &LintResult) -> String {
        let mut counts = Vec::new();
        if result.error_count > 0 {
            counts.push(self.paint(plural(result.error_count, "error", "errors"), Color::Red));
        }
        if result.warning_count > 0 {
            counts.push(self.paint(
                plural(result.warning_count, "warning", "warnings"),
                Color::Yellow,
            ));
        }
        if result.info_count > 0 {
            counts.push(self.paint(plural(result.info_count, "info", "info"), Color::Blue));
        }
        if result.failure_count > 0 {
            counts.push(self.paint(
                plural(result.failure_count, "rule failure", "rule failures"),
                Color::Magenta,
            ));
        }

        let files = plural(result.files_processed, "file", "files");
        if counts.is_empty() {
            format!("{} processed, no problems found\n", files)
        } else {
            format!("{} processed: {}\n", files, counts.join(", "))
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, result: &LintResult) -> String {
        let mut output = String::new();

        for file in &result.files {
            if file.diagnostics.is_empty() && file.failures.is_empty() {
                continue;
            }

            let name = file.path.display().to_string();
            if self.colored {
                output.push_str(&format!("{}\n", name.underline()));
            } else {
                output.push_str(&format!("{}\n", name));
            }

            for diag in &file.diagnostics {
                output.push_str(&self.format_diagnostic(&file.path, diag));
                output.push('\n');
            }
            for failure in &file.failures {
                let line = failure
                    .line
                    .map(|l| format!(":{}", l))
                    .unwrap_or_default();
                output.push_str(&format!(
                    "{}{} rule {} failed on {}: {}\n",
                    file.path.display(),
                    line,
                    failure.rule_id,
                    failure.node_kind,
                    failure.message
                ));
            }
            output.push('\n');
        }

        if self.show_stats {
            output.push_str(&self.summary(result));
        }

        output
    }

    fn format_diagnostic(&self, path: &Path, diag: &Diagnostic) -> String {
        let rule = if self.colored {
            diag.rule_id.dimmed().to_string()
        } else {
            diag.rule_id.clone()
        };
        let mut line = format!(
            "{} {} {} [{}]",
            self.format_location(path, diag),
            self.severity_str(diag.severity),
            diag.message,
            rule
        );

        if self.show_source && !diag.source.is_empty() {
            for source_line in diag.source.lines() {
                line.push_str("\n    | ");
                line.push_str(source_line);
            }
        }

        line
    }
}
