//! Output formatters for lint results

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::config::OutputFormat;
use crate::diagnostic::Diagnostic;
use crate::engine::LintResult;
use std::path::Path;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the entire lint result
    fn format(&self, result: &LintResult) -> String;

    /// Format a single diagnostic of the file at `path`
    fn format_diagnostic(&self, path: &Path, diagnostic: &Diagnostic) -> String;
}

/// Formatter for a configured output format
pub fn formatter(format: OutputFormat, colored: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => {
            let text = TextFormatter::new();
            Box::new(if colored { text } else { text.without_color() })
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
    }
}
