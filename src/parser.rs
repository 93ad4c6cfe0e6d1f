//! Template reader
//!
//! Markup structure comes from `quick-xml` running in a lenient mode; the
//! mustache layer is lexed here. Mustache regions are blanked out of the copy
//! handed to `quick-xml`, so `<`, `>` and quotes inside an expression never
//! confuse the markup reader. Every string kept in the tree is sliced from the
//! original source at the same byte offsets.

use crate::node::{
    AttrValue, Attribute, Block, Comment, Element, Mustache, Node, Position, Span, Template, Text,
};
use log::{debug, trace};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::ops::Range;
use thiserror::Error;

const BOM: char = '\u{feff}';

/// Elements that never have children or an end tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Errors from reading a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Template parse error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            ParseError::Syntax { column, .. } => *column,
        }
    }
}

/// True for HTML void elements, compared case-insensitively
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

/// Parse template source into a tree
///
/// A leading byte order mark is not part of the template: it is blanked out
/// of the markup reader's input and columns on the first line start after it.
pub fn parse(source: &str) -> Result<Template, ParseError> {
    let bom = if source.starts_with(BOM) { BOM.len_utf8() } else { 0 };
    let lines = LineIndex::new(source, bom);
    let mustaches = scan_mustaches(source, &lines)?;
    let mut masked = mask(source, &mustaches);
    // quick-xml skips a BOM on its own, which would shift every position
    masked.replace_range(..bom, &" ".repeat(bom));
    let mut builder = TreeBuilder::new(source, &masked, lines, mustaches);

    let mut reader = Reader::from_str(&masked);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut cursor = bom;
    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                let offset = (reader.error_position() as usize).min(source.len());
                return Err(builder.lines.error(offset, &err.to_string()));
            }
        };

        match event {
            Event::Eof => break,
            Event::Text(_) => {
                let end = masked[cursor..]
                    .find('<')
                    .map_or(source.len(), |i| cursor + i);
                builder.text(cursor..end);
                cursor = end;
            }
            markup => {
                let start = masked[cursor..].find('<').map_or(cursor, |i| cursor + i);
                let end = (reader.buffer_position() as usize)
                    .min(source.len())
                    .max(start);
                let range = start..end;
                match markup {
                    Event::Start(_) => builder.open_tag(range, false),
                    Event::Empty(_) => builder.open_tag(range, true),
                    Event::End(_) => builder.end_tag(range),
                    Event::Comment(_) => builder.html_comment(range),
                    Event::CData(_) => builder.append_text(range),
                    _ => trace!("Skipping markup at byte {}", range.start),
                }
                cursor = end;
            }
        }
    }

    Ok(builder.finish())
}

/// Maps byte offsets to line/column positions
struct LineIndex<'s> {
    source: &'s str,
    starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    /// `first` is where the first line's text begins
    fn new(source: &'s str, first: usize) -> Self {
        let starts = std::iter::once(first)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, starts }
    }

    fn position(&self, offset: usize) -> Position {
        let offset = offset.max(self.starts[0]);
        let line = self.starts.partition_point(|&start| start <= offset);
        let line_start = self.starts[line - 1];
        let column = self
            .source
            .get(line_start..offset)
            .map_or(offset - line_start, |s| s.chars().count());
        Position::new(line, column)
    }

    fn span(&self, range: Range<usize>) -> Span {
        Span::new(self.position(range.start), self.position(range.end), range)
    }

    fn error(&self, offset: usize, message: &str) -> ParseError {
        let Position { line, column } = self.position(offset);
        ParseError::Syntax {
            line,
            column,
            message: message.to_string(),
        }
    }
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// Byte ranges of every `{{ ... }}` region outside HTML comments
fn scan_mustaches(source: &str, lines: &LineIndex<'_>) -> Result<Vec<Range<usize>>, ParseError> {
    let bytes = source.as_bytes();
    let mut regions = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let rest = &bytes[i..];
        if rest.starts_with(b"<!--") {
            match find_from(bytes, b"-->", i + 4) {
                Some(end) => i = end + 3,
                None => return Err(lines.error(i, "unclosed comment")),
            }
        } else if rest.starts_with(b"{{") {
            let (open_len, close): (usize, &[u8]) = if rest.starts_with(b"{{!--") {
                (5, b"--}}")
            } else if rest.starts_with(b"{{{") {
                (3, b"}}}")
            } else {
                (2, b"}}")
            };
            match find_from(bytes, close, i + open_len) {
                Some(end) => {
                    regions.push(i..end + close.len());
                    i = end + close.len();
                }
                None => return Err(lines.error(i, "unclosed mustache")),
            }
        } else {
            i += 1;
        }
    }

    Ok(regions)
}

/// Copy of `source` with every region replaced by spaces of equal byte length
fn mask(source: &str, regions: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for region in regions {
        out.push_str(&source[last..region.start]);
        out.extend(std::iter::repeat(' ').take(region.len()));
        last = region.end;
    }
    out.push_str(&source[last..]);
    out
}

fn tag_name(raw: &str, from: usize) -> (&str, usize) {
    let bytes = raw.as_bytes();
    let mut end = from.min(bytes.len());
    while end < bytes.len() && !matches!(bytes[end], b'>' | b'/') && !bytes[end].is_ascii_whitespace()
    {
        end += 1;
    }
    (&raw[from.min(end)..end], end)
}

/// An element or block that has not seen its closer yet
enum Frame {
    Element { element: Element, start: usize },
    Block { block: Block, start: usize },
}

impl Frame {
    fn start(&self) -> usize {
        match self {
            Frame::Element { start, .. } | Frame::Block { start, .. } => *start,
        }
    }

    fn children_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::Element { element, .. } => &mut element.children,
            Frame::Block { block, .. } => &mut block.children,
        }
    }

    fn is_element(&self, tag: &str) -> bool {
        matches!(self, Frame::Element { element, .. } if element.tag.eq_ignore_ascii_case(tag))
    }

    fn is_block(&self, name: &str) -> bool {
        matches!(self, Frame::Block { block, .. } if block.name == name)
    }

    fn into_node(self, span: Span) -> Node {
        match self {
            Frame::Element { element, .. } => Node::Element(element.with_span(span)),
            Frame::Block { mut block, .. } => {
                block.span = Some(span);
                Node::Block(block)
            }
        }
    }
}

struct TreeBuilder<'s> {
    source: &'s str,
    masked: &'s str,
    lines: LineIndex<'s>,
    mustaches: Vec<Range<usize>>,
    root: Vec<Node>,
    stack: Vec<Frame>,
}

impl<'s> TreeBuilder<'s> {
    fn new(
        source: &'s str,
        masked: &'s str,
        lines: LineIndex<'s>,
        mustaches: Vec<Range<usize>>,
    ) -> Self {
        Self {
            source,
            masked,
            lines,
            mustaches,
            root: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn append(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(frame) => frame.children_mut().push(node),
            None => self.root.push(node),
        }
    }

    fn append_text(&mut self, range: Range<usize>) {
        let mut text = Text::new(&self.source[range.clone()]);
        text.span = Some(self.lines.span(range));
        self.append(Node::Text(text));
    }

    fn close_top(&mut self, end: usize) {
        if let Some(frame) = self.stack.pop() {
            let span = self.lines.span(frame.start()..end.max(frame.start()));
            let node = frame.into_node(span);
            self.append(node);
        }
    }

    /// Close the frame at `idx` at `closer`, closing anything opened inside it
    /// where the closer begins
    fn close_through(&mut self, idx: usize, closer: Range<usize>) {
        while self.stack.len() > idx + 1 {
            self.close_top(closer.start);
        }
        self.close_top(closer.end);
    }

    fn open_tag(&mut self, range: Range<usize>, self_closing: bool) {
        let source = self.source;
        let raw = &source[range.clone()];
        let (tag, attrs_from) = tag_name(raw, 1);
        if tag.is_empty() {
            trace!("Treating nameless tag at byte {} as text", range.start);
            self.append_text(range);
            return;
        }

        let mut element = Element::new(tag);
        element.attributes = self.lex_attributes(range.start + attrs_from, range.end);

        if self_closing || is_void_element(tag) {
            element.self_closing = true;
            let span = self.lines.span(range);
            self.append(Node::Element(element.with_span(span)));
        } else {
            self.stack.push(Frame::Element {
                element,
                start: range.start,
            });
        }
    }

    fn end_tag(&mut self, range: Range<usize>) {
        let source = self.source;
        let raw = &source[range.clone()];
        let (tag, _) = tag_name(raw, 2);
        if is_void_element(tag) {
            return;
        }
        match self.stack.iter().rposition(|f| f.is_element(tag)) {
            Some(idx) => self.close_through(idx, range),
            None => debug!(
                "Ignoring unmatched </{}> at line {}",
                tag,
                self.lines.position(range.start).line
            ),
        }
    }

    fn html_comment(&mut self, range: Range<usize>) {
        let source = self.source;
        let raw = &source[range.clone()];
        let value = raw
            .strip_prefix("<!--")
            .and_then(|s| s.strip_suffix("-->"))
            .unwrap_or(raw);
        let mut comment = Comment::new(value);
        comment.span = Some(self.lines.span(range));
        self.append(Node::Comment(comment));
    }

    /// Split a run of text into literal text and mustache nodes
    fn text(&mut self, range: Range<usize>) {
        let first = self.mustaches.partition_point(|r| r.start < range.start);
        let regions: Vec<Range<usize>> = self.mustaches[first..]
            .iter()
            .take_while(|r| r.end <= range.end)
            .cloned()
            .collect();

        let mut pos = range.start;
        for region in regions {
            if region.start > pos {
                self.append_text(pos..region.start);
            }
            pos = region.end;
            self.mustache(region);
        }
        if pos < range.end {
            self.append_text(pos..range.end);
        }
    }

    fn mustache(&mut self, region: Range<usize>) {
        let source = self.source;
        let raw = &source[region.clone()];
        let span = self.lines.span(region.clone());

        if let Some(body) = raw.strip_prefix("{{!--") {
            let mut comment = Comment::new(body.strip_suffix("--}}").unwrap_or(body));
            comment.span = Some(span);
            self.append(Node::Comment(comment));
            return;
        }
        if let Some(body) = raw.strip_prefix("{{!") {
            let mut comment = Comment::new(body.strip_suffix("}}").unwrap_or(body));
            comment.span = Some(span);
            self.append(Node::Comment(comment));
            return;
        }
        if let Some(body) = raw.strip_prefix("{{{") {
            let mut mustache = Mustache::new(body.strip_suffix("}}}").unwrap_or(body).trim());
            mustache.span = Some(span);
            self.append(Node::Mustache(mustache));
            return;
        }

        let inner = raw
            .strip_prefix("{{")
            .and_then(|s| s.strip_suffix("}}"))
            .unwrap_or(raw)
            .trim_matches('~')
            .trim();

        if let Some(open) = inner.strip_prefix('#') {
            let open = open.trim();
            let (name, params) = match open.find(char::is_whitespace) {
                Some(i) => (&open[..i], open[i..].trim()),
                None => (open, ""),
            };
            self.stack.push(Frame::Block {
                block: Block::new(name, params),
                start: region.start,
            });
        } else if let Some(close) = inner.strip_prefix('/') {
            let name = close.trim();
            match self.stack.iter().rposition(|f| f.is_block(name)) {
                Some(idx) => self.close_through(idx, region),
                None => debug!(
                    "Ignoring unmatched {{{{/{}}}}} at line {}",
                    name, span.start.line
                ),
            }
        } else {
            let mut mustache = Mustache::new(inner);
            mustache.span = Some(span);
            self.append(Node::Mustache(mustache));
        }
    }

    fn mustache_end(&self, start: usize) -> Option<usize> {
        self.mustaches
            .binary_search_by_key(&start, |r| r.start)
            .ok()
            .map(|k| self.mustaches[k].end)
    }

    /// Read HTML-style attributes from `from` up to the end of the tag
    fn lex_attributes(&self, from: usize, end: usize) -> Vec<Attribute> {
        let bytes = self.source.as_bytes();
        let mut attributes = Vec::new();
        let mut i = from;

        while i < end {
            let b = bytes[i];
            if b == b'>' {
                break;
            }
            if b.is_ascii_whitespace() || b == b'/' {
                i += 1;
                continue;
            }
            if bytes[i..end].starts_with(b"{{") {
                // element modifier
                i = self.mustache_end(i).unwrap_or(end);
                continue;
            }

            let name_start = i;
            while i < end
                && !matches!(bytes[i], b'=' | b'>' | b'/')
                && !bytes[i].is_ascii_whitespace()
            {
                i += 1;
            }
            if i == name_start {
                i += 1;
                continue;
            }
            let name = &self.source[name_start..i];

            let mut j = i;
            while j < end && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let value = if j < end && bytes[j] == b'=' {
                j += 1;
                while j < end && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let (value, value_end) = self.attribute_value(j, end);
                i = value_end;
                value
            } else {
                AttrValue::Text(String::new())
            };

            attributes.push(Attribute {
                name: name.to_string(),
                value,
                span: Some(self.lines.span(name_start..i)),
            });
        }

        attributes
    }

    fn attribute_value(&self, start: usize, end: usize) -> (AttrValue, usize) {
        let bytes = self.source.as_bytes();
        if start >= end || bytes[start] == b'>' {
            return (AttrValue::Text(String::new()), start);
        }

        let (raw, value_end) = match bytes[start] {
            quote @ (b'"' | b'\'') => {
                // search the masked copy so quotes inside expressions are skipped
                let close = self.masked.as_bytes()[start + 1..end]
                    .iter()
                    .position(|&c| c == quote)
                    .map(|i| start + 1 + i);
                match close {
                    Some(close) => (&self.source[start + 1..close], close + 1),
                    None => {
                        let stop = end.saturating_sub(1).max(start + 1);
                        (&self.source[start + 1..stop], end)
                    }
                }
            }
            _ => {
                let mut k = start;
                while k < end {
                    if bytes[k..end].starts_with(b"{{") {
                        k = self.mustache_end(k).unwrap_or(end);
                        continue;
                    }
                    if bytes[k].is_ascii_whitespace() || bytes[k] == b'>' {
                        break;
                    }
                    k += 1;
                }
                (&self.source[start..k], k)
            }
        };

        let value = if raw.contains("{{") {
            AttrValue::Dynamic(raw.to_string())
        } else {
            AttrValue::Text(raw.to_string())
        };
        (value, value_end)
    }

    fn finish(mut self) -> Template {
        let len = self.source.len();
        while !self.stack.is_empty() {
            self.close_top(len);
        }
        Template {
            children: self.root,
            span: Some(self.lines.span(0..len)),
        }
    }
}
