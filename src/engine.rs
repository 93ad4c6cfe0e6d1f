//! Linter facade: files in, reports out

use crate::config::{Config, ConfigError};
use crate::diagnostic::{Diagnostic, Severity};
use crate::disable::InlineDisables;
use crate::parser;
use crate::rule::{ActiveRule, Rule};
use crate::traverse::{self, RuleFailure};
use globset::GlobSet;
use log::{debug, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rule id of the diagnostic reported for unparseable templates
pub const PARSE_ERROR: &str = "parse-error";

/// Rule id of the diagnostic reported for unreadable files
pub const FILE_READ_ERROR: &str = "file-read-error";

/// Findings for one file
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
    /// Handler invocations that panicked
    pub failures: Vec<RuleFailure>,
    /// Diagnostics dropped by inline disable comments
    pub suppressed: usize,
}

impl FileReport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ..Self::default()
        }
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count(Severity::Info)
    }
}

/// Result of linting operation
#[derive(Debug, Default)]
pub struct LintResult {
    /// One report per linted file, in input order
    pub files: Vec<FileReport>,

    pub files_processed: usize,

    pub files_with_errors: usize,

    pub files_with_warnings: usize,

    pub error_count: usize,

    pub warning_count: usize,

    pub info_count: usize,

    /// Handler invocations that panicked, over all files
    pub failure_count: usize,

    /// Processing duration
    pub duration: Duration,
}

impl LintResult {
    /// Result holding a single file's report
    pub fn from_report(report: FileReport) -> Self {
        let errors = report.error_count();
        let warnings = report.warning_count();
        Self {
            files_processed: 1,
            files_with_errors: usize::from(errors > 0),
            files_with_warnings: usize::from(warnings > 0),
            error_count: errors,
            warning_count: warnings,
            info_count: report.info_count(),
            failure_count: report.failures.len(),
            files: vec![report],
            duration: Duration::ZERO,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    /// No errors or warnings
    pub fn is_clean(&self) -> bool {
        self.error_count == 0 && self.warning_count == 0
    }

    /// Get exit code (0 = success, 1 = warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.error_count > 0 {
            2
        } else if self.warning_count > 0 {
            1
        } else {
            0
        }
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: LintResult) {
        self.files.extend(other.files);
        self.files_processed += other.files_processed;
        self.files_with_errors += other.files_with_errors;
        self.files_with_warnings += other.files_with_warnings;
        self.error_count += other.error_count;
        self.warning_count += other.warning_count;
        self.info_count += other.info_count;
        self.failure_count += other.failure_count;
        self.duration += other.duration;
    }

    /// Every diagnostic with the file it belongs to
    pub fn diagnostics(&self) -> impl Iterator<Item = (&Path, &Diagnostic)> {
        self.files
            .iter()
            .flat_map(|f| f.diagnostics.iter().map(move |d| (f.path.as_path(), d)))
    }
}

/// Lints templates with the rules a [`Config`] selects
pub struct Linter {
    config: Config,
    active: Vec<ActiveRule>,
    ignore: GlobSet,
}

impl Linter {
    /// Linter over the built-in rules
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::with_rules(config, &crate::rules::builtin_rules())
    }

    /// Linter over an explicit rule registry
    pub fn with_rules(config: Config, registry: &[Arc<dyn Rule>]) -> Result<Self, ConfigError> {
        for id in config.unknown_rules(registry) {
            warn!("Unknown rule in configuration: {}", id);
        }
        let ignore = config.ignore_set()?;
        let active = config.active_rules(registry);
        debug!(
            "Active rules: {:?}",
            active.iter().map(|r| r.id()).collect::<Vec<_>>()
        );

        Ok(Self {
            config,
            active,
            ignore,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn active_rules(&self) -> &[ActiveRule] {
        &self.active
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.is_match(path)
    }

    /// Lint template source already in memory
    pub fn lint_source(&self, path: &Path, source: &str) -> FileReport {
        let mut report = FileReport::new(path);

        let template = match parser::parse(source) {
            Ok(t) => t,
            Err(e) => {
                let excerpt = source.lines().nth(e.line().saturating_sub(1)).unwrap_or("");
                report.diagnostics.push(
                    Diagnostic::new(PARSE_ERROR, Severity::Error, &format!("Parse error: {}", e))
                        .at(e.line(), e.column())
                        .with_source(excerpt),
                );
                return report;
            }
        };

        let run = traverse::run(&template, source, &self.active);
        report.failures = run.failures;
        report.diagnostics = run.diagnostics;

        let disables = InlineDisables::parse(source);
        if !disables.is_empty() {
            let before = report.diagnostics.len();
            report
                .diagnostics
                .retain(|d| !disables.is_disabled(&d.rule_id, d.line));
            report.suppressed = before - report.diagnostics.len();
        }

        debug!(
            "{}: {} diagnostics, {} suppressed, {} nodes",
            path.display(),
            report.diagnostics.len(),
            report.suppressed,
            run.nodes_visited
        );
        report
    }

    /// Read and lint one file
    pub fn lint_file(&self, path: &Path) -> FileReport {
        match std::fs::read_to_string(path) {
            Ok(source) => self.lint_source(path, &source),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                let mut report = FileReport::new(path);
                report.diagnostics.push(Diagnostic::new(
                    FILE_READ_ERROR,
                    Severity::Error,
                    &format!("Failed to read file: {}", e),
                ));
                report
            }
        }
    }

    /// Lint multiple files. Reports come back in input order; ignored paths
    /// are skipped.
    pub fn lint(&self, paths: &[PathBuf]) -> LintResult {
        let start = Instant::now();
        let paths: Vec<&PathBuf> = paths
            .iter()
            .filter(|p| {
                let ignored = self.is_ignored(p);
                if ignored {
                    debug!("Skipping ignored file {}", p.display());
                }
                !ignored
            })
            .collect();

        let reports: Vec<FileReport> = if self.config.engine.is_parallel() && paths.len() > 1 {
            let threads = if self.config.engine.jobs > 0 {
                self.config.engine.jobs
            } else {
                num_cpus::get()
            };
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(|| paths.par_iter().map(|p| self.lint_file(p)).collect()),
                Err(e) => {
                    warn!("Falling back to sequential linting: {}", e);
                    paths.iter().map(|p| self.lint_file(p)).collect()
                }
            }
        } else {
            paths.iter().map(|p| self.lint_file(p)).collect()
        };

        let mut combined = LintResult::default();
        for report in reports {
            combined.merge(LintResult::from_report(report));
        }
        combined.duration = start.elapsed();
        combined
    }
}
