use serde_json::Value;

use crate::core::{Editor, element_ref};
use crate::error::CommandError;
use crate::markup::{MarkupElement, MarkupNode};
use crate::node::{Document, ElementKind, ElementNode, LinkData, Mark, Marks, Node, TextNode};
use crate::normalize::{unwrap_ops, wrap_ops};
use crate::ops::{NodePatch, Op, Path, Transaction};
use crate::path;
use crate::plugin::{CommandSpec, DocPlugin, NodeSpec, NormalizePass, PluginRegistry, SerializeOutcome};
use crate::plugins::ancestor_path;

pub struct LinkPlugin;

impl DocPlugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::inline("link")]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeLinks)]
    }

    fn serialize(&self, el: &ElementNode, children: &[MarkupNode]) -> SerializeOutcome {
        let ElementKind::Link(link) = &el.kind else {
            return SerializeOutcome::Pass;
        };
        let mut a = MarkupElement::new("a").with_attr("href", link.href.clone());
        if let Some(target) = &link.target {
            a = a.with_attr("target", target.clone());
        }
        if let Some(rel) = &link.rel {
            a = a.with_attr("rel", rel.clone());
        }
        SerializeOutcome::Emit(vec![a.with_children(children.to_vec()).into_node()])
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        if el.tag != "a" {
            return None;
        }
        let link = LinkData {
            href: el.attr("href").unwrap_or_default().to_string(),
            target: el.attr("target").map(str::to_string),
            rel: el.attr("rel").map(str::to_string),
        };
        Some(vec![Node::element(ElementKind::Link(link), children.to_vec())])
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("link.wrap", "Insert link", |editor, args| {
                let href = args
                    .as_ref()
                    .and_then(|v| v.get("href"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| CommandError::new("link.wrap needs an href"))?
                    .to_string();
                let tx = wrap_selection_in_link(editor, href)?;
                editor.apply(tx).map_err(CommandError::from)
            })
            .description("Turn the selected text into a link.")
            .keywords(["link", "url", "href"])
            .args_example(serde_json::json!({ "href": "https://example.org" })),
        ]
    }
}

/// Removes links without text and unwraps links nested in links.
struct NormalizeLinks;

impl NormalizePass for NormalizeLinks {
    fn id(&self) -> &'static str {
        "link.normalize"
    }

    fn normalize(
        &self,
        doc: &Document,
        el: &ElementNode,
        path: &[usize],
        registry: &PluginRegistry,
    ) -> Option<Vec<Op>> {
        if el.type_name() != "link" {
            return None;
        }
        if ancestor_path(doc, path::parent(path), "link").is_some() {
            return Some(unwrap_ops(path, el.children.len()));
        }
        let has_void = el.children.iter().any(|child| {
            child
                .as_element()
                .is_some_and(|inner| registry.is_void(inner.type_name()))
        });
        let node = Node::Element(el.clone());
        (node.text_content().is_empty() && !has_void).then(|| {
            vec![Op::RemoveNode {
                path: path.to_vec(),
            }]
        })
    }
}

/// Splits the selected part of a single text leaf off and wraps it in a link.
fn wrap_selection_in_link(editor: &Editor, href: String) -> Result<Transaction, CommandError> {
    let (start, end) = editor.selection().ordered();
    if start.path != end.path || start.offset == end.offset {
        return Err(CommandError::new("Select text within one text node"));
    }
    let leaf = start.path.clone();
    let (ix, parent) = leaf
        .split_last()
        .ok_or_else(|| CommandError::new("Selection is not in a text node"))?;
    let link = Node::element(
        ElementKind::Link(LinkData {
            href,
            target: None,
            rel: None,
        }),
        Vec::new(),
    );
    let mut ops = vec![
        Op::SplitNode {
            path: leaf.clone(),
            position: end.offset,
        },
        Op::SplitNode {
            path: leaf.clone(),
            position: start.offset,
        },
    ];
    ops.extend(wrap_ops(parent, ix + 1, 1, link));
    Ok(Transaction::new(ops).source("link.wrap"))
}

pub struct SpanPlugin;

impl DocPlugin for SpanPlugin {
    fn id(&self) -> &'static str {
        "span"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::inline("span").not_addressable()]
    }

    fn serialize(&self, el: &ElementNode, children: &[MarkupNode]) -> SerializeOutcome {
        let ElementKind::Span { lang } = &el.kind else {
            return SerializeOutcome::Pass;
        };
        SerializeOutcome::Emit(vec![
            MarkupElement::new("span")
                .with_attr("lang", lang.clone())
                .with_children(children.to_vec())
                .into_node(),
        ])
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        if el.tag != "span" {
            return None;
        }
        let lang = el.attr("lang")?.trim();
        if lang.is_empty() {
            return None;
        }
        Some(vec![Node::element(
            ElementKind::Span {
                lang: lang.to_string(),
            },
            children.to_vec(),
        )])
    }
}

pub struct MarksPlugin;

const MARK_TAGS: &[(Mark, &str)] = &[
    (Mark::Bold, "strong"),
    (Mark::Italic, "em"),
    (Mark::Underline, "u"),
    (Mark::Code, "code"),
    (Mark::Sub, "sub"),
    (Mark::Sup, "sup"),
];

fn mark_for_tag(tag: &str) -> Option<Mark> {
    match tag {
        "strong" | "b" => Some(Mark::Bold),
        "em" | "i" => Some(Mark::Italic),
        "u" => Some(Mark::Underline),
        "code" => Some(Mark::Code),
        "sub" => Some(Mark::Sub),
        "sup" => Some(Mark::Sup),
        _ => None,
    }
}

fn mark_from_name(name: &str) -> Option<Mark> {
    match name {
        "bold" => Some(Mark::Bold),
        "italic" => Some(Mark::Italic),
        "underline" => Some(Mark::Underline),
        "code" => Some(Mark::Code),
        "sub" => Some(Mark::Sub),
        "sup" => Some(Mark::Sup),
        _ => None,
    }
}

fn with_mark(node: &Node, mark: Mark) -> Node {
    match node {
        Node::Text(text) => {
            let mut text = text.clone();
            text.marks.set(mark, true);
            Node::Text(text)
        }
        Node::Element(el) => {
            let mut el = el.clone();
            el.children = el.children.iter().map(|c| with_mark(c, mark)).collect();
            Node::Element(el)
        }
    }
}

impl DocPlugin for MarksPlugin {
    fn id(&self) -> &'static str {
        "marks"
    }

    fn serialize_text(&self, text: &TextNode, markup: MarkupNode) -> MarkupNode {
        MARK_TAGS
            .iter()
            .rev()
            .filter(|(mark, _)| text.marks.has(*mark))
            .fold(markup, |inner, (_, tag)| {
                MarkupElement::new(*tag)
                    .with_children(vec![inner])
                    .into_node()
            })
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        let mark = mark_for_tag(&el.tag)?;
        Some(children.iter().map(|c| with_mark(c, mark)).collect())
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("marks.toggle", "Toggle mark", |editor, args| {
                let name = args
                    .as_ref()
                    .and_then(|v| v.get("mark"))
                    .and_then(Value::as_str)
                    .unwrap_or("bold");
                let mark = mark_from_name(name)
                    .ok_or_else(|| CommandError::new(format!("Unknown mark: {name}")))?;
                let Some(tx) = toggle_mark(editor, mark) else {
                    return Ok(());
                };
                editor.apply(tx).map_err(CommandError::from)
            })
            .description("Toggle a text mark on the selection.")
            .keywords(["bold", "italic", "underline", "code", "sub", "sup"])
            .args_example(serde_json::json!({ "mark": "bold" })),
        ]
    }
}

/// Sets or clears `mark` on the selected text leaves. Both selection ends must
/// sit in text leaves of the same parent.
fn toggle_mark(editor: &Editor, mark: Mark) -> Option<Transaction> {
    let (start, end) = editor.selection().ordered();
    if start == end {
        return None;
    }
    let parent: Path = path::parent(&start.path).to_vec();
    if path::parent(&end.path) != parent.as_slice() {
        return None;
    }
    let siblings = &element_ref(editor.doc(), &parent)?.children;
    let first = *start.path.last()?;
    let last = *end.path.last()?;

    let leaves: Vec<(usize, &TextNode)> = (first..=last)
        .filter_map(|ix| siblings.get(ix)?.as_text().map(|t| (ix, t)))
        .collect();
    let on = !leaves.iter().all(|(_, t)| t.marks.has(mark));
    let marked = |t: &TextNode| {
        let mut marks: Marks = t.marks.clone();
        marks.set(mark, on);
        NodePatch::marks(marks)
    };

    let mut ops = Vec::new();
    for (ix, text) in leaves.iter().rev() {
        let leaf = path::child(&parent, *ix);
        let from = if *ix == first { start.offset } else { 0 };
        let to = if *ix == last { end.offset } else { text.text.len() };
        if from == to {
            continue;
        }
        if to < text.text.len() {
            ops.push(Op::SplitNode {
                path: leaf.clone(),
                position: to,
            });
        }
        if from > 0 {
            ops.push(Op::SplitNode {
                path: leaf.clone(),
                position: from,
            });
            ops.push(Op::SetNodeProperties {
                path: path::child(&parent, ix + 1),
                patch: marked(*text),
            });
        } else {
            ops.push(Op::SetNodeProperties {
                path: leaf,
                patch: marked(*text),
            });
        }
    }
    (!ops.is_empty()).then(|| Transaction::new(ops).source("marks.toggle"))
}
