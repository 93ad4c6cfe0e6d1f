//! Rule contract
//!
//! A rule is metadata plus a [`Visitor`]: a table from [`NodeKind`] to the
//! handlers the rule wants called for nodes of that kind. The traversal asks
//! each active rule for a fresh visitor at the start of every run, so any
//! state a handler captures lives for exactly one run.
//!
//! Handlers report findings through [`RuleContext::report`]. The context is
//! write-only: a rule can never see what it or any other rule reported.

use crate::diagnostic::{Collector, Diagnostic, Severity};
use crate::node::{NodeKind, NodeRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Rule category for grouping related rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Barriers for assistive technology users
    Accessibility,
    /// Markup that is definitely wrong
    Correctness,
    /// Idiomatic and consistent style rules
    #[default]
    Style,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Accessibility => write!(f, "accessibility"),
            RuleCategory::Correctness => write!(f, "correctness"),
            RuleCategory::Style => write!(f, "style"),
        }
    }
}

impl std::str::FromStr for RuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accessibility" | "a11y" => Ok(RuleCategory::Accessibility),
            "correctness" => Ok(RuleCategory::Correctness),
            "style" => Ok(RuleCategory::Style),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Static description of a rule
#[derive(Debug, Clone)]
pub struct RuleMeta {
    /// Unique rule identifier (e.g., "require-valid-alt-text")
    pub id: &'static str,
    /// One-line description
    pub description: &'static str,
    pub category: RuleCategory,
    /// Part of the `recommended` preset
    pub recommended: bool,
    /// Severity used when configuration does not override it
    pub default_severity: Severity,
}

/// A handler invoked with each node of the kind it was registered for
pub type Handler<'r> = Box<dyn FnMut(NodeRef<'_>, &mut RuleContext<'_>) + 'r>;

/// Registration table from node kind to handlers, in registration order
#[derive(Default)]
pub struct Visitor<'r> {
    handlers: Vec<(NodeKind, Handler<'r>)>,
}

impl<'r> Visitor<'r> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`. A rule may register several handlers
    /// for the same kind; they run in the order registered.
    pub fn on<F>(mut self, kind: NodeKind, handler: F) -> Self
    where
        F: FnMut(NodeRef<'_>, &mut RuleContext<'_>) + 'r,
    {
        self.handlers.push((kind, Box::new(handler)));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Kinds of the registered handlers, by handler index
    pub fn kinds(&self) -> impl Iterator<Item = NodeKind> + '_ {
        self.handlers.iter().map(|(kind, _)| *kind)
    }

    pub(crate) fn handler_mut(&mut self, index: usize) -> &mut Handler<'r> {
        &mut self.handlers[index].1
    }
}

impl fmt::Debug for Visitor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

/// A lint rule
pub trait Rule: Send + Sync {
    fn meta(&self) -> &RuleMeta;

    /// Build the handler table for one run
    fn visitor(&self) -> Visitor<'_>;

    fn id(&self) -> &str {
        self.meta().id
    }
}

/// A rule selected for a run, with its effective severity
#[derive(Clone)]
pub struct ActiveRule {
    pub rule: Arc<dyn Rule>,
    pub severity: Severity,
}

impl ActiveRule {
    /// Activate a rule at its default severity
    pub fn new(rule: Arc<dyn Rule>) -> Self {
        let severity = rule.meta().default_severity;
        Self { rule, severity }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn id(&self) -> &str {
        self.rule.id()
    }
}

impl fmt::Debug for ActiveRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveRule")
            .field("id", &self.id())
            .field("severity", &self.severity)
            .finish()
    }
}

/// Emission side of a run, bound to one rule and the current source
pub struct RuleContext<'a> {
    rule_id: &'a str,
    severity: Severity,
    source: &'a str,
    collector: &'a mut Collector,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        rule_id: &'a str,
        severity: Severity,
        source: &'a str,
        collector: &'a mut Collector,
    ) -> Self {
        Self {
            rule_id,
            severity,
            source,
            collector,
        }
    }

    pub fn rule_id(&self) -> &str {
        self.rule_id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Verbatim source text of a node, or "" when it has no usable span
    pub fn source_for<'n>(&self, node: impl Into<NodeRef<'n>>) -> &'a str {
        node.into()
            .span()
            .and_then(|span| span.excerpt(self.source))
            .unwrap_or("")
    }

    /// Record a finding against `node`
    pub fn report<'n>(&mut self, node: impl Into<NodeRef<'n>>, message: &str) {
        let node = node.into();
        let mut diagnostic = Diagnostic::new(self.rule_id, self.severity, message)
            .with_source(self.source_for(node));
        if let Some(span) = node.span() {
            diagnostic = diagnostic.at(span.start.line, span.start.column);
        }
        self.collector.push(diagnostic);
    }
}
