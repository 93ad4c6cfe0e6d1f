//! templint - template accessibility linter
//!
//! Lints HTML and Handlebars templates. The core is a single-pass rule
//! engine: rules register handlers per node kind, and one pre-order walk
//! over the template tree dispatches every node to the interested handlers.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Linter -> parser -> Template
//!                   -> traverse(Template, active rules) -> Diagnostics
//! ```
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use templint::{Config, Linter};
//!
//! let linter = Linter::new(Config::default()).unwrap();
//! let report = linter.lint_source(Path::new("photo.hbs"), "<img src=\"cat.png\">");
//! assert_eq!(report.diagnostics[0].message, "img tags must have an alt attribute");
//! ```

pub mod config;
pub mod diagnostic;
pub mod disable;
pub mod engine;
pub mod inspect;
pub mod node;
pub mod output;
pub mod parser;
pub mod rule;
pub mod rules;
pub mod traverse;

// Re-export main types
pub use config::{Config, ConfigError, RuleLevel};
pub use diagnostic::{Diagnostic, Severity};
pub use engine::{FileReport, LintResult, Linter};
pub use node::{NodeKind, NodeRef, Template};
pub use parser::{parse, ParseError};
pub use rule::{ActiveRule, Rule, RuleContext, RuleMeta, Visitor};
pub use traverse::{run, RuleFailure, RunReport};
