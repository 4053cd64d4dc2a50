use crate::core::Editor;
use crate::markup::{MarkupElement, MarkupNode};
use crate::node::{Document, ElementKind, ElementNode, Node};
use crate::ops::{NodePatch, Op, Transaction};
use crate::plugin::{
    Allowed, DOCUMENT, DocPlugin, NodeRules, NodeSpec, NormalizePass, ParentRepair, ParentRule,
    PluginRegistry, SerializeOutcome, SlotRule, TEXT_BLOCKS, TransactionTransform,
};
use crate::plugins::{consume_marker, marker_before_space};

fn paragraph() -> Node {
    Node::paragraph("")
}

fn wrap(tag: &str, children: &[MarkupNode]) -> SerializeOutcome {
    SerializeOutcome::Emit(vec![
        MarkupElement::new(tag)
            .with_children(children.to_vec())
            .into_node(),
    ])
}

pub struct SectionPlugin;

impl DocPlugin for SectionPlugin {
    fn id(&self) -> &'static str {
        "section"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block("section").rules(NodeRules {
            first_child: Some(SlotRule::new(Allowed::Only(TEXT_BLOCKS), paragraph)),
            last_child: Some(SlotRule::new(Allowed::Only(TEXT_BLOCKS), paragraph)),
            parent: Some(ParentRule {
                allowed: Allowed::Only(&[DOCUMENT]),
                repair: ParentRepair::Unwrap,
            }),
            ..NodeRules::default()
        })]
    }

    fn serialize(&self, el: &ElementNode, children: &[MarkupNode]) -> SerializeOutcome {
        match el.kind {
            ElementKind::Section => wrap("section", children),
            _ => SerializeOutcome::Pass,
        }
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        (el.tag == "section").then(|| vec![Node::section(children.to_vec())])
    }
}

pub struct ParagraphPlugin;

/// Splits `"\n"` inside text into `<br>` elements, descending into inline wrappers.
fn line_breaks(children: &[MarkupNode]) -> Vec<MarkupNode> {
    let mut out = Vec::new();
    for child in children {
        match child {
            MarkupNode::Text(text) if text.contains('\n') => {
                for (ix, part) in text.split('\n').enumerate() {
                    if ix > 0 {
                        out.push(MarkupElement::new("br").into_node());
                    }
                    if !part.is_empty() {
                        out.push(MarkupNode::text(part));
                    }
                }
            }
            MarkupNode::Element(el) => {
                let mut el = el.clone();
                el.children = line_breaks(&el.children);
                out.push(el.into_node());
            }
            other => out.push(other.clone()),
        }
    }
    out
}

impl DocPlugin for ParagraphPlugin {
    fn id(&self) -> &'static str {
        "paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("paragraph")]
    }

    fn serialize(&self, el: &ElementNode, children: &[MarkupNode]) -> SerializeOutcome {
        match el.kind {
            ElementKind::Paragraph => wrap("p", &line_breaks(children)),
            _ => SerializeOutcome::Pass,
        }
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        match el.tag.as_str() {
            "p" => Some(vec![Node::element(
                ElementKind::Paragraph,
                children.to_vec(),
            )]),
            "br" => Some(vec![Node::text("\n")]),
            _ => None,
        }
    }
}

pub struct HeadingPlugin;

impl DocPlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("heading")]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(ClampHeadingLevel)]
    }

    fn transaction_transforms(&self) -> Vec<Box<dyn TransactionTransform>> {
        vec![Box::new(HeadingAutoformat)]
    }

    fn serialize(&self, el: &ElementNode, children: &[MarkupNode]) -> SerializeOutcome {
        match el.kind {
            ElementKind::Heading { level } => wrap(&format!("h{}", level.clamp(1, 6)), children),
            _ => SerializeOutcome::Pass,
        }
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        let level = match el.tag.as_str() {
            "h1" => 1,
            "h2" => 2,
            "h3" => 3,
            "h4" => 4,
            "h5" => 5,
            "h6" => 6,
            _ => return None,
        };
        Some(vec![Node::element(
            ElementKind::Heading { level },
            children.to_vec(),
        )])
    }
}

struct ClampHeadingLevel;

impl NormalizePass for ClampHeadingLevel {
    fn id(&self) -> &'static str {
        "heading.clamp_level"
    }

    fn normalize(
        &self,
        _doc: &Document,
        el: &ElementNode,
        path: &[usize],
        _registry: &PluginRegistry,
    ) -> Option<Vec<Op>> {
        let ElementKind::Heading { level } = el.kind else {
            return None;
        };
        let clamped = level.clamp(1, 6);
        (clamped != level).then(|| {
            vec![Op::SetNodeProperties {
                path: path.to_vec(),
                patch: NodePatch::kind(ElementKind::Heading { level: clamped }),
            }]
        })
    }
}

/// `"## "` at the start of a paragraph turns it into a level-2 heading.
struct HeadingAutoformat;

impl TransactionTransform for HeadingAutoformat {
    fn id(&self) -> &'static str {
        "heading.autoformat"
    }

    fn transform(&self, editor: &Editor, tx: &Transaction) -> Option<Transaction> {
        let site = marker_before_space(editor, tx)?;
        let level = site.marker.len();
        if !(1..=6).contains(&level) || !site.marker.chars().all(|ch| ch == '#') {
            return None;
        }
        let set = Op::set_kind(
            site.block.clone(),
            ElementKind::Heading { level: level as u8 },
        );
        Some(consume_marker(tx, &site, vec![set]))
    }
}

pub struct BlockquotePlugin;

impl DocPlugin for BlockquotePlugin {
    fn id(&self) -> &'static str {
        "blockquote"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block("blockquote")]
    }

    fn serialize(&self, el: &ElementNode, children: &[MarkupNode]) -> SerializeOutcome {
        match el.kind {
            ElementKind::Blockquote => wrap("blockquote", children),
            _ => SerializeOutcome::Pass,
        }
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        (el.tag == "blockquote")
            .then(|| vec![Node::element(ElementKind::Blockquote, children.to_vec())])
    }
}
