//! Read-only queries over nodes
//!
//! Rules use these instead of matching on the tree directly. Every query
//! accepts anything convertible to a [`NodeRef`]; nodes other than elements
//! simply have no attributes and are never classified as an element kind.
//!
//! Tag names and attribute names are compared case-sensitively, exactly as
//! written in the source.

use crate::node::{AttrValue, Attribute, Node, NodeRef};

/// Result of looking up an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrLookup<'a> {
    /// No attribute with that name
    Missing,
    /// Present with a literal value (possibly empty)
    Literal(&'a str),
    /// Present, but computed at render time
    Dynamic,
}

impl<'a> AttrLookup<'a> {
    pub fn is_present(&self) -> bool {
        !matches!(self, AttrLookup::Missing)
    }

    pub fn as_literal(&self) -> Option<&'a str> {
        match *self {
            AttrLookup::Literal(s) => Some(s),
            _ => None,
        }
    }
}

fn find_attribute<'a>(node: NodeRef<'a>, name: &str) -> Option<&'a Attribute> {
    node.attributes().iter().find(|a| a.name == name)
}

/// True if an attribute with exactly this name exists, whatever its value
pub fn has_attribute<'a>(node: impl Into<NodeRef<'a>>, name: &str) -> bool {
    find_attribute(node.into(), name).is_some()
}

/// Three-state lookup of an attribute value
pub fn attribute_value<'a>(node: impl Into<NodeRef<'a>>, name: &str) -> AttrLookup<'a> {
    match find_attribute(node.into(), name) {
        None => AttrLookup::Missing,
        Some(attr) => match &attr.value {
            AttrValue::Text(s) => AttrLookup::Literal(s.as_str()),
            AttrValue::Dynamic(_) => AttrLookup::Dynamic,
        },
    }
}

/// True if the attribute is present with a literal value equal to `expected`
pub fn has_attribute_value<'a>(node: impl Into<NodeRef<'a>>, name: &str, expected: &str) -> bool {
    attribute_value(node, name) == AttrLookup::Literal(expected)
}

/// True if at least one of `names` is present
pub fn has_any_attribute<'a>(node: impl Into<NodeRef<'a>>, names: &[&str]) -> bool {
    let node = node.into();
    names.iter().any(|name| has_attribute(node, name))
}

/// True if the node has content a screen reader could announce: any child
/// that is neither whitespace-only text nor a comment
pub fn has_children<'a>(node: impl Into<NodeRef<'a>>) -> bool {
    node.into().children().iter().any(|child| match child {
        Node::Text(t) => !t.is_whitespace(),
        Node::Comment(_) => false,
        Node::Element(_) | Node::Mustache(_) | Node::Block(_) => true,
    })
}

fn is_element_named<'a>(node: impl Into<NodeRef<'a>>, tag: &str) -> bool {
    node.into().as_element().is_some_and(|e| e.tag == tag)
}

pub fn is_img_element<'a>(node: impl Into<NodeRef<'a>>) -> bool {
    is_element_named(node, "img")
}

pub fn is_object_element<'a>(node: impl Into<NodeRef<'a>>) -> bool {
    is_element_named(node, "object")
}

pub fn is_input_element<'a>(node: impl Into<NodeRef<'a>>) -> bool {
    is_element_named(node, "input")
}

pub fn is_area_element<'a>(node: impl Into<NodeRef<'a>>) -> bool {
    is_element_named(node, "area")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Comment, Element, Mustache, Text};

    #[test]
    fn test_attribute_value_three_states() {
        let missing = Element::new("img");
        let empty = Element::new("img").with_attr("alt", "");
        let dynamic = Element::new("img").with_dynamic_attr("alt", "{{this.alt}}");

        let states = [
            attribute_value(&missing, "alt"),
            attribute_value(&empty, "alt"),
            attribute_value(&dynamic, "alt"),
        ];
        assert_eq!(
            states,
            [AttrLookup::Missing, AttrLookup::Literal(""), AttrLookup::Dynamic]
        );
        assert!(!states[0].is_present());
        assert!(states[1].is_present());
        assert!(states[2].is_present());
        assert_eq!(states[1].as_literal(), Some(""));
        assert_eq!(states[2].as_literal(), None);
    }

    #[test]
    fn test_has_attribute_ignores_value() {
        let el = Element::new("img")
            .with_attr("alt", "")
            .with_dynamic_attr("title", "{{t}}");
        assert!(has_attribute(&el, "alt"));
        assert!(has_attribute(&el, "title"));
        assert!(!has_attribute(&el, "role"));
    }

    #[test]
    fn test_attribute_names_are_case_sensitive() {
        let el = Element::new("img").with_attr("ALT", "x");
        assert!(!has_attribute(&el, "alt"));
        assert!(has_attribute(&el, "ALT"));
    }

    #[test]
    fn test_has_attribute_value_is_literal_only() {
        let literal = Element::new("div").with_attr("aria-hidden", "true");
        let dynamic = Element::new("div").with_dynamic_attr("aria-hidden", "true");
        let other = Element::new("div").with_attr("aria-hidden", "false");

        assert!(has_attribute_value(&literal, "aria-hidden", "true"));
        assert!(!has_attribute_value(&dynamic, "aria-hidden", "true"));
        assert!(!has_attribute_value(&other, "aria-hidden", "true"));
        assert!(!has_attribute_value(&Element::new("div"), "aria-hidden", "true"));
    }

    #[test]
    fn test_has_any_attribute() {
        let el = Element::new("area").with_attr("aria-labelledby", "map-label");
        assert!(has_any_attribute(&el, &["aria-label", "aria-labelledby", "alt"]));
        assert!(!has_any_attribute(&el, &["alt", "title"]));
        assert!(!has_any_attribute(&el, &[]));
    }

    #[test]
    fn test_has_children() {
        let empty = Element::new("object");
        let whitespace = Element::new("object").with_child(Text::new("  \n  "));
        let comment = Element::new("object")
            .with_child(Comment::new("no fallback yet"))
            .with_child(Text::new(" "));
        let text = Element::new("object").with_child(Text::new("fallback text"));
        let nested = Element::new("object").with_child(Element::new("span"));
        let mustache = Element::new("object").with_child(Mustache::new("this.label"));

        assert!(!has_children(&empty));
        assert!(!has_children(&whitespace));
        assert!(!has_children(&comment));
        assert!(has_children(&text));
        assert!(has_children(&nested));
        assert!(has_children(&mustache));
    }

    #[test]
    fn test_element_classifiers() {
        assert!(is_img_element(&Element::new("img")));
        assert!(is_object_element(&Element::new("object")));
        assert!(is_input_element(&Element::new("input")));
        assert!(is_area_element(&Element::new("area")));

        assert!(!is_img_element(&Element::new("IMG")));
        assert!(!is_img_element(&Element::new("image")));
        assert!(!is_area_element(&Element::new("img")));
    }

    #[test]
    fn test_non_elements_have_no_attributes() {
        let attr = crate::node::Attribute::text("alt", "x");
        let view = NodeRef::Attribute(&attr);
        assert!(!has_attribute(view, "alt"));
        assert_eq!(attribute_value(view, "alt"), AttrLookup::Missing);
        assert!(!is_img_element(view));
        assert!(!has_children(view));
    }
}
