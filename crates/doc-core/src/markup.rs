//! The HTML-subset wire format as a plain element tree.
//!
//! Reading is tolerant: HTML void tags need no end tag, stray end tags are
//! ignored, unclosed elements are closed at the end of input, and named HTML
//! entities are resolved. A syntax error stops reading but keeps everything
//! parsed up to that point.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{escape, partial_escape, resolve_html5_entity};
use quick_xml::events::{BytesStart, Event};
use tracing::warn;

use crate::error::Diagnostic;

/// Tags that never have content or an end tag.
pub const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "hr", "img", "input", "link", "meta", "param", "source", "track",
    "wbr",
];

/// Tags whose content is kept verbatim.
const RAW_TAGS: &[&str] = &["math"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element(MarkupElement),
    Text(String),
    /// Pre-rendered markup, written as is.
    Raw(String),
}

impl MarkupNode {
    pub fn text(text: impl Into<String>) -> Self {
        MarkupNode::Text(text.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
}

impl MarkupElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_children(mut self, children: Vec<MarkupNode>) -> Self {
        self.children = children;
        self
    }

    /// Concatenated text and raw content below this element.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                MarkupNode::Text(text) | MarkupNode::Raw(text) => out.push_str(text),
                MarkupNode::Element(el) => out.push_str(&el.text_content()),
            }
        }
        out
    }

    pub fn into_node(self) -> MarkupNode {
        MarkupNode::Element(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMarkup {
    pub nodes: Vec<MarkupNode>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse_markup(input: &str) -> ParsedMarkup {
    let input = escape_stray_angles(input);
    let mut reader = Reader::from_str(&input);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut tree = TreeBuilder::default();
    let mut diagnostics = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let mut el = element_from_start(&e);
                if el.tag.is_empty() {
                    tree.push(MarkupNode::Text(format!("<{}>", String::from_utf8_lossy(&e))));
                } else if VOID_TAGS.contains(&el.tag.as_str()) {
                    tree.push(el.into_node());
                } else if RAW_TAGS.contains(&el.tag.as_str()) {
                    match reader.read_text(e.name()) {
                        Ok(inner) => {
                            el.children.push(MarkupNode::Raw(inner.into_owned()));
                            tree.push(el.into_node());
                        }
                        Err(err) => {
                            diagnostics.push(malformed(reader.error_position(), &err));
                            tree.push(el.into_node());
                            break;
                        }
                    }
                } else {
                    tree.open(el);
                }
            }
            Ok(Event::Empty(e)) => {
                let el = element_from_start(&e);
                if el.tag.is_empty() {
                    tree.push(MarkupNode::Text(format!("<{}/>", String::from_utf8_lossy(&e))));
                } else {
                    tree.push(el.into_node());
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                tree.close(&tag);
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape_with(resolve_html5_entity)
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                tree.push(MarkupNode::Text(text));
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                tree.push(MarkupNode::Text(text));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                diagnostics.push(malformed(reader.error_position(), &err));
                break;
            }
        }
    }

    for diagnostic in &diagnostics {
        warn!(%diagnostic, "markup recovered");
    }

    ParsedMarkup {
        nodes: tree.finish(),
        diagnostics,
    }
}

/// A `<` that cannot open a tag, comment or declaration is text, as in
/// HTML. Escaping it up front keeps the tokenizer from reading a tag out
/// of it. Diagnostic positions refer to the escaped input.
fn escape_stray_angles(input: &str) -> Cow<'_, str> {
    let opens_markup = |next: Option<char>| {
        next.is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
    };
    let mut chars = input.char_indices().peekable();
    let mut out: Option<String> = None;
    let mut copied = 0;
    while let Some((ix, c)) = chars.next() {
        if c != '<' || opens_markup(chars.peek().map(|&(_, next)| next)) {
            continue;
        }
        let buf = out.get_or_insert_with(|| String::with_capacity(input.len() + 8));
        buf.push_str(&input[copied..ix]);
        buf.push_str("&lt;");
        copied = ix + 1;
    }
    match out {
        Some(mut buf) => {
            buf.push_str(&input[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(input),
    }
}

fn malformed(position: u64, err: &quick_xml::Error) -> Diagnostic {
    Diagnostic::MalformedMarkup {
        position,
        message: err.to_string(),
    }
}

fn element_from_start(e: &BytesStart<'_>) -> MarkupElement {
    let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let mut el = MarkupElement::new(tag);
    for attr in e.html_attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                warn!(tag = %el.tag, error = %err, "skipped malformed attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let value = attr
            .unescape_value_with(resolve_html5_entity)
            .map(Cow::into_owned)
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        el.attrs.push((key, value));
    }
    el
}

#[derive(Default)]
struct TreeBuilder {
    roots: Vec<MarkupNode>,
    open: Vec<MarkupElement>,
}

impl TreeBuilder {
    fn push(&mut self, node: MarkupNode) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn open(&mut self, el: MarkupElement) {
        self.open.push(el);
    }

    /// Closes `tag` and anything left open inside it. Unknown end tags are dropped.
    fn close(&mut self, tag: &str) {
        let Some(pos) = self.open.iter().rposition(|el| el.tag == tag) else {
            return;
        };
        while self.open.len() > pos {
            if let Some(el) = self.open.pop() {
                self.push(el.into_node());
            }
        }
    }

    fn finish(mut self) -> Vec<MarkupNode> {
        while let Some(el) = self.open.pop() {
            self.push(el.into_node());
        }
        self.roots
    }
}

pub fn render_markup(nodes: &[MarkupNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_into(node, &mut out);
    }
    out
}

fn render_into(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text(text) => out.push_str(&partial_escape(text)),
        MarkupNode::Raw(raw) => out.push_str(raw),
        MarkupNode::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (key, value) in &el.attrs {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(&escape(value));
                out.push('"');
            }
            out.push('>');
            if VOID_TAGS.contains(&el.tag.as_str()) {
                return;
            }
            for child in &el.children {
                render_into(child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(parsed: &ParsedMarkup) -> &MarkupElement {
        match &parsed.nodes[0] {
            MarkupNode::Element(el) => el,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn stray_angle_bracket_is_read_as_text() {
        let parsed = parse_markup("<p>a < b <3</p><p>c</p>");
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(first_element(&parsed).children, vec![MarkupNode::text("a < b <3")]);
    }

    #[test]
    fn html_void_tags_need_no_end_tag() {
        let parsed = parse_markup("<p>a<br>b</p>");
        let p = first_element(&parsed);
        assert_eq!(p.children.len(), 3);
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn named_entities_and_valueless_attributes() {
        let parsed = parse_markup("<p data-flag title=\"a&nbsp;b\">x&ndash;y</p>");
        let p = first_element(&parsed);
        assert_eq!(p.attr("data-flag"), Some(""));
        assert_eq!(p.attr("title"), Some("a\u{a0}b"));
        assert_eq!(p.children, vec![MarkupNode::text("x\u{2013}y")]);
    }

    #[test]
    fn stray_end_tags_are_ignored_and_open_ones_closed() {
        let parsed = parse_markup("<section><p>a</span></p><p>b</section>");
        let section = first_element(&parsed);
        assert_eq!(section.children.len(), 2);
    }

    #[test]
    fn math_content_is_kept_verbatim() {
        let parsed = parse_markup("<math display=\"block\"><mi>x</mi></math>");
        let math = first_element(&parsed);
        assert_eq!(math.children, vec![MarkupNode::Raw("<mi>x</mi>".into())]);
    }

    #[test]
    fn render_escapes_text_and_attributes() {
        let node = MarkupElement::new("a")
            .with_attr("href", "x?a=1&b=\"2\"")
            .with_children(vec![MarkupNode::text("<b>")])
            .into_node();
        assert_eq!(
            render_markup(&[node]),
            "<a href=\"x?a=1&amp;b=&quot;2&quot;\">&lt;b&gt;</a>"
        );
    }
}
