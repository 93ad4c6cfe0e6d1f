//! Inline disable comments
//!
//! Supported forms, in either `<!-- -->` or `{{! }}` comments:
//!
//! ```text
//! <!-- templint-disable rule-id -->              this line
//! {{! templint-disable-next-line rule-id }}      the following line
//! {{!-- templint-disable-file rule-a, rule-b --}} the whole file
//! <!-- templint-disable rule-id: reason -->
//! <!-- templint-disable rule-id -- reason -->
//! ```
//!
//! A directive without rule ids, or with the id `all`, matches every rule.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Rule id that matches every rule
pub const ALL_RULES: &str = "all";

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:<!--|\{\{~?!(?:--)?)\s*templint-(disable-next-line|disable-file|disable)\b(?:\s+(\w[\w-]*(?:\s*,\s*\w[\w-]*)*))?(?:\s*:\s*(.+?)|\s+--\s+(.+?))?\s*(?:-->|--~?\}\}|~?\}\})",
    )
    .expect("disable directive pattern is valid")
});

/// What a directive covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisableScope {
    /// The line the comment is on
    Line,
    NextLine,
    File,
}

/// One rule disabled by one comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableDirective {
    pub scope: DisableScope,
    /// Line the comment is written on (1-based)
    pub line: usize,
    pub rule_id: String,
    pub reason: Option<String>,
}

impl DisableDirective {
    /// Line the directive applies to, or `None` for the whole file
    pub fn target_line(&self) -> Option<usize> {
        match self.scope {
            DisableScope::Line => Some(self.line),
            DisableScope::NextLine => Some(self.line + 1),
            DisableScope::File => None,
        }
    }
}

/// Disable directives collected from one template
#[derive(Debug, Clone, Default)]
pub struct InlineDisables {
    directives: Vec<DisableDirective>,
    lines: HashMap<String, HashSet<usize>>,
    file: HashSet<String>,
}

impl InlineDisables {
    pub fn parse(source: &str) -> Self {
        let mut disables = Self::default();

        for (i, line) in source.lines().enumerate() {
            let line_num = i + 1;
            for cap in DIRECTIVE.captures_iter(line) {
                let scope = match &cap[1] {
                    "disable-file" => DisableScope::File,
                    "disable-next-line" => DisableScope::NextLine,
                    _ => DisableScope::Line,
                };
                let reason = cap
                    .get(3)
                    .or_else(|| cap.get(4))
                    .map(|m| m.as_str().trim().to_string());
                let rule_ids: Vec<&str> = match cap.get(2) {
                    Some(list) => list.as_str().split(',').map(str::trim).collect(),
                    None => vec![ALL_RULES],
                };

                for rule_id in rule_ids {
                    disables.add(DisableDirective {
                        scope,
                        line: line_num,
                        rule_id: rule_id.to_string(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        disables
    }

    fn add(&mut self, directive: DisableDirective) {
        match directive.target_line() {
            Some(line) => {
                self.lines
                    .entry(directive.rule_id.clone())
                    .or_default()
                    .insert(line);
            }
            None => {
                self.file.insert(directive.rule_id.clone());
            }
        }
        self.directives.push(directive);
    }

    /// True if `rule_id` is disabled for the whole file
    pub fn is_disabled_for_file(&self, rule_id: &str) -> bool {
        self.file.contains(ALL_RULES) || self.file.contains(rule_id)
    }

    /// True if a finding of `rule_id` at `line` should be dropped. Findings
    /// without a line are only affected by file-level directives.
    pub fn is_disabled(&self, rule_id: &str, line: Option<usize>) -> bool {
        if self.is_disabled_for_file(rule_id) {
            return true;
        }
        let Some(line) = line else {
            return false;
        };
        [ALL_RULES, rule_id]
            .iter()
            .any(|id| self.lines.get(*id).is_some_and(|lines| lines.contains(&line)))
    }

    /// Reason given by the directive that disables `rule_id` at `line`
    pub fn reason(&self, rule_id: &str, line: Option<usize>) -> Option<&str> {
        self.directives
            .iter()
            .filter(|d| d.rule_id == rule_id || d.rule_id == ALL_RULES)
            .filter(|d| d.target_line().is_none() || d.target_line() == line)
            .find_map(|d| d.reason.as_deref())
    }

    pub fn directives(&self) -> &[DisableDirective] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}
