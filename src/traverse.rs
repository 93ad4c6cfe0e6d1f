//! Single-pass rule dispatch
//!
//! One depth-first, pre-order walk per run. Every node is visited once; for
//! each node the handlers registered for its kind are called in rule order,
//! then in registration order within a rule. An element's attributes are
//! visited after the element and before its children.
//!
//! A handler that panics is recorded as a [`RuleFailure`]; whatever it
//! reported during that invocation is discarded.

use crate::diagnostic::{Collector, Diagnostic};
use crate::node::{NodeKind, NodeRef, Template};
use crate::rule::{ActiveRule, RuleContext, Visitor};
use log::{debug, error, trace};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// A handler that panicked during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule_id: String,
    /// Kind of the node being handled
    pub node_kind: NodeKind,
    /// Line of that node, if known
    pub line: Option<usize>,
    pub message: String,
}

/// Outcome of one run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Diagnostics in traversal order
    pub diagnostics: Vec<Diagnostic>,
    /// Handler failures; the run carried on past each of them
    pub failures: Vec<RuleFailure>,
    /// Number of nodes visited, attributes and root included
    pub nodes_visited: usize,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.failures.is_empty()
    }
}

/// Run `rules` over a template
pub fn run(template: &Template, source: &str, rules: &[ActiveRule]) -> RunReport {
    run_from(template.as_node(), source, rules)
}

/// Run `rules` over the subtree rooted at `root`
pub fn run_from(root: NodeRef<'_>, source: &str, rules: &[ActiveRule]) -> RunReport {
    let mut traversal = Traversal::new(rules, source);
    traversal.walk(root);
    traversal.finish()
}

struct Traversal<'t> {
    rules: &'t [ActiveRule],
    source: &'t str,
    visitors: Vec<Visitor<'t>>,
    /// (rule index, handler index) per node kind
    by_kind: Vec<Vec<(usize, usize)>>,
    collector: Collector,
    failures: Vec<RuleFailure>,
    visited: usize,
}

impl<'t> Traversal<'t> {
    fn new(rules: &'t [ActiveRule], source: &'t str) -> Self {
        let visitors: Vec<Visitor<'t>> = rules.iter().map(|r| r.rule.visitor()).collect();

        let mut by_kind = vec![Vec::new(); NodeKind::COUNT];
        for (rule_idx, visitor) in visitors.iter().enumerate() {
            for (handler_idx, kind) in visitor.kinds().enumerate() {
                by_kind[kind.index()].push((rule_idx, handler_idx));
            }
        }

        Self {
            rules,
            source,
            visitors,
            by_kind,
            collector: Collector::new(),
            failures: Vec::new(),
            visited: 0,
        }
    }

    fn walk(&mut self, root: NodeRef<'_>) {
        // Explicit stack so deeply nested markup cannot overflow the call stack
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            self.visited += 1;
            self.dispatch(node);

            stack.extend(node.children().iter().rev().map(NodeRef::from));
            stack.extend(node.attributes().iter().rev().map(NodeRef::Attribute));
        }
    }

    fn dispatch(&mut self, node: NodeRef<'_>) {
        let kind = node.kind();

        for &(rule_idx, handler_idx) in &self.by_kind[kind.index()] {
            let active = &self.rules[rule_idx];
            let handler = self.visitors[rule_idx].handler_mut(handler_idx);
            let reported = self.collector.len();
            let mut ctx =
                RuleContext::new(active.id(), active.severity, self.source, &mut self.collector);

            trace!("dispatch {} -> {}", kind, active.id());
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(node, &mut ctx)));

            if let Err(payload) = outcome {
                self.collector.truncate(reported);
                let failure = RuleFailure {
                    rule_id: active.id().to_string(),
                    node_kind: kind,
                    line: node.span().map(|s| s.start.line),
                    message: panic_message(payload.as_ref()),
                };
                error!(
                    "rule '{}' failed on {} node: {}",
                    failure.rule_id, failure.node_kind, failure.message
                );
                self.failures.push(failure);
            }
        }
    }

    fn finish(self) -> RunReport {
        debug!(
            "visited {} nodes with {} rules: {} diagnostics, {} failures",
            self.visited,
            self.rules.len(),
            self.collector.len(),
            self.failures.len()
        );

        RunReport {
            diagnostics: self.collector.into_diagnostics(),
            failures: self.failures,
            nodes_visited: self.visited,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "rule panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::node::{Block, Comment, Element, Mustache, Node, Position, Span, Text};
    use crate::rule::{Rule, RuleCategory, RuleMeta};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn meta(id: &'static str) -> RuleMeta {
        RuleMeta {
            id,
            description: "test rule",
            category: RuleCategory::Style,
            recommended: false,
            default_severity: Severity::Warning,
        }
    }

    /// Reports every node of the given kinds with a label describing it
    struct Recorder {
        meta: RuleMeta,
        kinds: Vec<NodeKind>,
    }

    impl Recorder {
        fn new(id: &'static str, kinds: &[NodeKind]) -> Self {
            Self {
                meta: meta(id),
                kinds: kinds.to_vec(),
            }
        }
    }

    fn label(node: NodeRef<'_>) -> String {
        match node {
            NodeRef::Template(_) => "template".to_string(),
            NodeRef::Element(e) => format!("<{}>", e.tag),
            NodeRef::Attribute(a) => format!("@{}", a.name),
            NodeRef::Text(t) => format!("text:{}", t.chars),
            NodeRef::Comment(c) => format!("comment:{}", c.value),
            NodeRef::Mustache(m) => format!("{{{{{}}}}}", m.expression),
            NodeRef::Block(b) => format!("#{}", b.name),
        }
    }

    impl Rule for Recorder {
        fn meta(&self) -> &RuleMeta {
            &self.meta
        }

        fn visitor(&self) -> Visitor<'_> {
            self.kinds.iter().fold(Visitor::new(), |v, kind| {
                v.on(*kind, |node, ctx| {
                    let message = label(node);
                    ctx.report(node, &message);
                })
            })
        }
    }

    /// Publishes how many elements its handler saw in the latest run
    struct Counter {
        meta: RuleMeta,
        calls: Mutex<usize>,
    }

    impl Rule for Counter {
        fn meta(&self) -> &RuleMeta {
            &self.meta
        }

        fn visitor(&self) -> Visitor<'_> {
            let mut seen = 0;
            Visitor::new().on(NodeKind::Element, move |_, _| {
                seen += 1;
                *self.calls.lock().unwrap() = seen;
            })
        }
    }

    /// Panics on every element named `boom`
    struct Exploder {
        meta: RuleMeta,
    }

    impl Rule for Exploder {
        fn meta(&self) -> &RuleMeta {
            &self.meta
        }

        fn visitor(&self) -> Visitor<'_> {
            Visitor::new().on(NodeKind::Element, |node, ctx| {
                let el = node.as_element().unwrap();
                if el.tag == "boom" {
                    panic!("cannot handle <boom>");
                }
                ctx.report(node, "ok");
            })
        }
    }

    /// Reports every element, then panics
    struct ReportsThenPanics {
        meta: RuleMeta,
    }

    impl Rule for ReportsThenPanics {
        fn meta(&self) -> &RuleMeta {
            &self.meta
        }

        fn visitor(&self) -> Visitor<'_> {
            Visitor::new().on(NodeKind::Element, |node, ctx| {
                ctx.report(node, "half done");
                panic!("gave up");
            })
        }
    }

    fn active(rule: impl Rule + 'static) -> ActiveRule {
        ActiveRule::new(Arc::new(rule))
    }

    fn sample_tree() -> Template {
        Template::new()
            .with_child(
                Element::new("div")
                    .with_attr("class", "card")
                    .with_child(Element::new("img").with_attr("alt", ""))
                    .with_child(Text::new("caption"))
                    .with_child(
                        Block::new("if", "this.show")
                            .with_child(Mustache::new("this.name"))
                            .with_child(Comment::new("note")),
                    ),
            )
            .with_child(Element::new("hr"))
    }

    fn messages(report: &RunReport) -> Vec<&str> {
        report
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect()
    }

    /// Independent recursive pre-order count
    fn reference_count(node: NodeRef<'_>) -> usize {
        1 + node.attributes().len()
            + node
                .children()
                .iter()
                .map(|c| reference_count(NodeRef::from(c)))
                .sum::<usize>()
    }

    #[test]
    fn test_pre_order_document_order() {
        let tree = sample_tree();
        let rules = vec![active(Recorder::new("all", &NodeKind::ALL))];
        let report = run(&tree, "", &rules);

        assert_eq!(
            messages(&report),
            vec![
                "template",
                "<div>",
                "@class",
                "<img>",
                "@alt",
                "text:caption",
                "#if",
                "{{this.name}}",
                "comment:note",
                "<hr>",
            ]
        );
    }

    #[test]
    fn test_visits_every_node_exactly_once() {
        let tree = sample_tree();
        let rules = vec![
            active(Recorder::new("a", &NodeKind::ALL)),
            active(Recorder::new("b", &NodeKind::ALL)),
        ];
        let report = run(&tree, "", &rules);

        let expected = reference_count(tree.as_node());
        assert_eq!(report.nodes_visited, expected);
        assert_eq!(report.diagnostics.len(), expected * 2);
    }

    #[test]
    fn test_node_visited_once_per_rule_handler() {
        let tree = sample_tree();
        let counter = Arc::new(Counter {
            meta: meta("counter"),
            calls: Mutex::new(0),
        });
        let rules = vec![ActiveRule::new(counter.clone())];
        run(&tree, "", &rules);

        // div, img, hr
        assert_eq!(*counter.calls.lock().unwrap(), 3);
    }

    #[test]
    fn test_rule_order_within_a_node() {
        let tree = Template::new().with_child(Element::new("img"));
        let rules = vec![
            active(Recorder::new("first", &[NodeKind::Element])),
            active(Recorder::new("second", &[NodeKind::Element])),
        ];
        let report = run(&tree, "", &rules);

        let ids: Vec<_> = report.diagnostics.iter().map(|d| d.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_only_interested_kinds_are_dispatched() {
        let tree = sample_tree();
        let rules = vec![active(Recorder::new("text", &[NodeKind::Text]))];
        let report = run(&tree, "", &rules);

        assert_eq!(messages(&report), vec!["text:caption"]);
        // Children under uninteresting nodes were still walked
        assert_eq!(report.nodes_visited, reference_count(tree.as_node()));
    }

    #[test]
    fn test_deterministic_runs() {
        let tree = sample_tree();
        let rules = vec![
            active(Recorder::new("a", &[NodeKind::Element, NodeKind::Attribute])),
            active(Recorder::new("b", &[NodeKind::Mustache])),
        ];
        let first = run(&tree, "", &rules);
        let second = run(&tree, "", &rules);
        assert_eq!(first.diagnostics, second.diagnostics);
    }

    #[test]
    fn test_subset_of_rules_does_not_change_findings() {
        let tree = sample_tree();
        let a = || active(Recorder::new("a", &[NodeKind::Element]));
        let b = || active(Recorder::new("b", &NodeKind::ALL));

        let alone = run(&tree, "", &[a()]);
        let together = run(&tree, "", &[a(), b()]);

        let from_a: Vec<_> = together
            .diagnostics
            .into_iter()
            .filter(|d| d.rule_id == "a")
            .collect();
        assert_eq!(alone.diagnostics, from_a);
    }

    #[test]
    fn test_missing_spans_degrade_to_null_position() {
        let tree = Template::new().with_child(Element::new("img"));
        let rules = vec![active(Recorder::new("r", &[NodeKind::Element]))];
        let report = run(&tree, "<img>", &rules);

        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].line, None);
        assert_eq!(report.diagnostics[0].column, None);
        assert_eq!(report.diagnostics[0].source, "");
    }

    #[test]
    fn test_positions_and_excerpt_come_from_span() {
        let source = "<p>\n <img>\n</p>";
        let img = Element::new("img").with_span(Span::new(
            Position::new(2, 1),
            Position::new(2, 6),
            5..10,
        ));
        let tree = Template::new().with_child(Element::new("p").with_child(img));
        let rules = vec![active(Recorder::new("r", &[NodeKind::Element]))];
        let report = run(&tree, source, &rules);

        let diag = &report.diagnostics[1];
        assert_eq!(diag.message, "<img>");
        assert_eq!(diag.line, Some(2));
        assert_eq!(diag.column, Some(1));
        assert_eq!(diag.source, "<img>");
    }

    #[test]
    fn test_failing_handler_is_isolated() {
        let tree = Template::new()
            .with_child(Element::new("boom"))
            .with_child(Element::new("img"));
        let rules = vec![
            active(Exploder {
                meta: meta("exploder"),
            }),
            active(Recorder::new("recorder", &[NodeKind::Element])),
        ];
        let report = run(&tree, "", &rules);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].rule_id, "exploder");
        assert_eq!(report.failures[0].node_kind, NodeKind::Element);
        assert!(report.failures[0].message.contains("cannot handle <boom>"));

        // The recorder saw both elements and the exploder handled the second
        let ids: Vec<_> = report
            .diagnostics
            .iter()
            .map(|d| (d.rule_id.as_str(), d.message.as_str()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("recorder", "<boom>"),
                ("exploder", "ok"),
                ("recorder", "<img>"),
            ]
        );
    }

    #[test]
    fn test_failed_invocation_reports_nothing() {
        let tree = Template::new()
            .with_child(Element::new("p"))
            .with_child(Element::new("img"));
        let rules = vec![
            active(Recorder::new("before", &[NodeKind::Element])),
            active(ReportsThenPanics {
                meta: meta("quitter"),
            }),
            active(Recorder::new("after", &[NodeKind::Element])),
        ];
        let report = run(&tree, "", &rules);

        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| f.rule_id == "quitter"));
        let ids: Vec<_> = report
            .diagnostics
            .iter()
            .map(|d| (d.rule_id.as_str(), d.message.as_str()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("before", "<p>"),
                ("after", "<p>"),
                ("before", "<img>"),
                ("after", "<img>"),
            ]
        );
    }

    #[test]
    fn test_run_from_subtree() {
        let tree = sample_tree();
        let div = match &tree.children[0] {
            Node::Element(e) => e,
            _ => unreachable!(),
        };
        let rules = vec![active(Recorder::new("r", &[NodeKind::Element]))];
        let report = run_from(NodeRef::Element(div), "", &rules);
        assert_eq!(messages(&report), vec!["<div>", "<img>"]);
    }

    #[test]
    fn test_no_rules() {
        let tree = sample_tree();
        let report = run(&tree, "", &[]);
        assert!(report.is_clean());
        assert_eq!(report.nodes_visited, reference_count(tree.as_node()));
    }
}
