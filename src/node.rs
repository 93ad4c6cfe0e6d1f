//! Template node model
//!
//! The tree is produced by [`crate::parser`] (or built by hand) and is only
//! ever borrowed by the traversal and by rules. [`NodeRef`] is the borrowed
//! view handed to rule handlers; it also covers the template root and
//! attributes, which are visited but are not children of anything.

use std::fmt;
use std::ops::Range;

/// Kinds of node a rule can register handlers for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    /// The template root
    Template,
    /// An element such as `<img>`
    Element,
    /// An attribute of an element
    Attribute,
    /// Literal text between markup
    Text,
    /// `<!-- -->` or `{{! }}` comment
    Comment,
    /// A `{{ ... }}` expression in content
    Mustache,
    /// A `{{#name}} ... {{/name}}` block
    Block,
}

impl NodeKind {
    /// Number of node kinds
    pub const COUNT: usize = 7;

    /// All node kinds, in declaration order
    pub const ALL: [NodeKind; Self::COUNT] = [
        NodeKind::Template,
        NodeKind::Element,
        NodeKind::Attribute,
        NodeKind::Text,
        NodeKind::Comment,
        NodeKind::Mustache,
        NodeKind::Block,
    ];

    /// Dense index, used for dispatch tables
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Template => "template",
            NodeKind::Element => "element",
            NodeKind::Attribute => "attribute",
            NodeKind::Text => "text",
            NodeKind::Comment => "comment",
            NodeKind::Mustache => "mustache",
            NodeKind::Block => "block",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A position in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (0-based, in characters)
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Source span of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    /// Byte range into the source text
    pub range: Range<usize>,
}

impl Span {
    pub fn new(start: Position, end: Position, range: Range<usize>) -> Self {
        Self { start, end, range }
    }

    /// Verbatim text covered by this span, if it lies inside `source`
    pub fn excerpt<'s>(&self, source: &'s str) -> Option<&'s str> {
        source.get(self.range.clone())
    }
}

/// Value of an attribute as written in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// A literal string; empty for `alt=""` and for valueless `alt`
    Text(String),
    /// A value computed at render time; holds the raw source of the value
    Dynamic(String),
}

/// An attribute of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub span: Option<Span>,
}

impl Attribute {
    /// Attribute with a literal value
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: AttrValue::Text(value.to_string()),
            span: None,
        }
    }

    /// Attribute whose value is an expression
    pub fn dynamic(name: &str, expression: &str) -> Self {
        Self {
            name: name.to_string(),
            value: AttrValue::Dynamic(expression.to_string()),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// An element node. The tag name is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Written as `<tag/>` or a void element such as `<img>`
    pub self_closing: bool,
    pub span: Option<Span>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        debug_assert!(!tag.is_empty(), "element tag must not be empty");
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: false,
            span: None,
        }
    }

    /// Add a literal attribute
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push(Attribute::text(name, value));
        self
    }

    /// Add a dynamic attribute
    pub fn with_dynamic_attr(mut self, name: &str, expression: &str) -> Self {
        self.attributes.push(Attribute::dynamic(name, expression));
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// First attribute with exactly this name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub chars: String,
    pub span: Option<Span>,
}

impl Text {
    pub fn new(chars: &str) -> Self {
        Self {
            chars: chars.to_string(),
            span: None,
        }
    }

    /// Whitespace-only text carries nothing a screen reader could announce
    pub fn is_whitespace(&self) -> bool {
        self.chars.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub value: String,
    pub span: Option<Span>,
}

impl Comment {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            span: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mustache {
    /// Expression between the braces, trimmed
    pub expression: String,
    pub span: Option<Span>,
}

impl Mustache {
    pub fn new(expression: &str) -> Self {
        Self {
            expression: expression.to_string(),
            span: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Helper name, e.g. `if` or `each`
    pub name: String,
    /// Everything after the name in the opening mustache
    pub params: String,
    pub children: Vec<Node>,
    pub span: Option<Span>,
}

impl Block {
    pub fn new(name: &str, params: &str) -> Self {
        Self {
            name: name.to_string(),
            params: params.to_string(),
            children: Vec::new(),
            span: None,
        }
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }
}

/// A parsed template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub children: Vec<Node>,
    pub span: Option<Span>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Borrowed view of the root
    pub fn as_node(&self) -> NodeRef<'_> {
        NodeRef::Template(self)
    }
}

/// A child node in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Comment),
    Mustache(Mustache),
    Block(Block),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        NodeRef::from(self).kind()
    }

    pub fn span(&self) -> Option<&Span> {
        NodeRef::from(self).span()
    }

    pub fn children(&self) -> &[Node] {
        NodeRef::from(self).children()
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

impl From<Text> for Node {
    fn from(t: Text) -> Self {
        Node::Text(t)
    }
}

impl From<Comment> for Node {
    fn from(c: Comment) -> Self {
        Node::Comment(c)
    }
}

impl From<Mustache> for Node {
    fn from(m: Mustache) -> Self {
        Node::Mustache(m)
    }
}

impl From<Block> for Node {
    fn from(b: Block) -> Self {
        Node::Block(b)
    }
}

/// Borrowed view of any visitable node
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Template(&'a Template),
    Element(&'a Element),
    Attribute(&'a Attribute),
    Text(&'a Text),
    Comment(&'a Comment),
    Mustache(&'a Mustache),
    Block(&'a Block),
}

impl<'a> NodeRef<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Template(_) => NodeKind::Template,
            NodeRef::Element(_) => NodeKind::Element,
            NodeRef::Attribute(_) => NodeKind::Attribute,
            NodeRef::Text(_) => NodeKind::Text,
            NodeRef::Comment(_) => NodeKind::Comment,
            NodeRef::Mustache(_) => NodeKind::Mustache,
            NodeRef::Block(_) => NodeKind::Block,
        }
    }

    pub fn span(&self) -> Option<&'a Span> {
        match *self {
            NodeRef::Template(t) => t.span.as_ref(),
            NodeRef::Element(e) => e.span.as_ref(),
            NodeRef::Attribute(a) => a.span.as_ref(),
            NodeRef::Text(t) => t.span.as_ref(),
            NodeRef::Comment(c) => c.span.as_ref(),
            NodeRef::Mustache(m) => m.span.as_ref(),
            NodeRef::Block(b) => b.span.as_ref(),
        }
    }

    /// Child nodes; empty for leaves and attributes
    pub fn children(&self) -> &'a [Node] {
        match *self {
            NodeRef::Template(t) => &t.children,
            NodeRef::Element(e) => &e.children,
            NodeRef::Block(b) => &b.children,
            _ => &[],
        }
    }

    /// Attributes; empty for anything but elements
    pub fn attributes(&self) -> &'a [Attribute] {
        match *self {
            NodeRef::Element(e) => &e.attributes,
            _ => &[],
        }
    }

    pub fn as_element(&self) -> Option<&'a Element> {
        match *self {
            NodeRef::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl<'a> From<&'a Node> for NodeRef<'a> {
    fn from(node: &'a Node) -> Self {
        match node {
            Node::Element(e) => NodeRef::Element(e),
            Node::Text(t) => NodeRef::Text(t),
            Node::Comment(c) => NodeRef::Comment(c),
            Node::Mustache(m) => NodeRef::Mustache(m),
            Node::Block(b) => NodeRef::Block(b),
        }
    }
}

impl<'a> From<&'a Template> for NodeRef<'a> {
    fn from(t: &'a Template) -> Self {
        NodeRef::Template(t)
    }
}

impl<'a> From<&'a Element> for NodeRef<'a> {
    fn from(e: &'a Element) -> Self {
        NodeRef::Element(e)
    }
}

impl<'a> From<&'a Attribute> for NodeRef<'a> {
    fn from(a: &'a Attribute) -> Self {
        NodeRef::Attribute(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_index_is_dense() {
        for (i, kind) in NodeKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_node_kind_display() {
        assert_eq!(NodeKind::Element.to_string(), "element");
        assert_eq!(NodeKind::Mustache.to_string(), "mustache");
    }

    #[test]
    fn test_element_builder() {
        let img = Element::new("img")
            .with_attr("alt", "")
            .with_dynamic_attr("src", "{{this.url}}");

        assert_eq!(img.tag, "img");
        assert_eq!(img.attributes.len(), 2);
        assert_eq!(
            img.attribute("src").map(|a| &a.value),
            Some(&AttrValue::Dynamic("{{this.url}}".to_string()))
        );
        assert!(img.attribute("ALT").is_none());
    }

    #[test]
    fn test_node_ref_children_and_attributes() {
        let object = Element::new("object")
            .with_attr("data", "movie.swf")
            .with_child(Text::new("fallback"));
        let node = Node::from(object);
        let view = NodeRef::from(&node);

        assert_eq!(view.kind(), NodeKind::Element);
        assert_eq!(view.children().len(), 1);
        assert_eq!(view.attributes().len(), 1);

        let text = NodeRef::from(&view.children()[0]);
        assert_eq!(text.kind(), NodeKind::Text);
        assert!(text.children().is_empty());
        assert!(text.attributes().is_empty());
    }

    #[test]
    fn test_span_excerpt() {
        let source = "<p><img alt=\"\"></p>";
        let span = Span::new(Position::new(1, 3), Position::new(1, 15), 3..15);
        assert_eq!(span.excerpt(source), Some("<img alt=\"\">"));

        let out_of_range = Span::new(Position::new(1, 0), Position::new(1, 99), 0..99);
        assert_eq!(out_of_range.excerpt(source), None);
    }

    #[test]
    fn test_whitespace_text() {
        assert!(Text::new("  \n\t").is_whitespace());
        assert!(!Text::new(" hi ").is_whitespace());
    }
}
