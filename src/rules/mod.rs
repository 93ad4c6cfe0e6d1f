//! Built-in rules

pub mod require_valid_alt_text;

pub use require_valid_alt_text::RequireValidAltText;

use crate::rule::Rule;
use std::sync::Arc;

/// All built-in rules, in a stable order
pub fn builtin_rules() -> Vec<Arc<dyn Rule>> {
    vec![Arc::new(RequireValidAltText::new())]
}

/// Look up a built-in rule by id
pub fn find(id: &str) -> Option<Arc<dyn Rule>> {
    builtin_rules().into_iter().find(|r| r.id() == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_rule_ids_are_unique() {
        let rules = builtin_rules();
        let ids: HashSet<_> = rules.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn test_find() {
        assert!(find("require-valid-alt-text").is_some());
        assert!(find("no-such-rule").is_none());
    }
}
