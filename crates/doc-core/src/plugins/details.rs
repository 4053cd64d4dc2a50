use crate::core::{Editor, Point, Selection, element_ref};
use crate::error::CommandError;
use crate::markup::{MarkupElement, MarkupNode};
use crate::node::{Document, ElementKind, ElementNode, Node};
use crate::normalize::unwrap_ops;
use crate::ops::{Op, Transaction};
use crate::path;
use crate::plugin::{
    Allowed, CommandSpec, DocPlugin, Key, NodeRules, NodeSpec, NormalizePass, ParentRepair,
    ParentRule, PluginRegistry, SerializeOutcome, ShortcutHandler, SlotRule, TEXT_BLOCKS,
};
use crate::plugins::{ancestor_path, insertion_point_after_focus};

fn paragraph() -> Node {
    Node::paragraph("")
}

fn summary() -> Node {
    Node::summary(vec![Node::paragraph("")])
}

fn paragraph_kind() -> ElementKind {
    ElementKind::Paragraph
}

/// Collapsible sections: `details` with a leading `summary`.
pub struct DetailsPlugin;

impl DocPlugin for DetailsPlugin {
    fn id(&self) -> &'static str {
        "details"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block("details").rules(NodeRules {
                first_child: Some(SlotRule::new(Allowed::Only(&["summary"]), summary)),
                last_child: Some(SlotRule::new(Allowed::Except(&["summary"]), paragraph)),
                previous_sibling: Some(SlotRule::new(Allowed::Only(TEXT_BLOCKS), paragraph)),
                next_sibling: Some(SlotRule::new(Allowed::Only(TEXT_BLOCKS), paragraph)),
                ..NodeRules::default()
            }),
            NodeSpec::block("summary").rules(NodeRules {
                first_child: Some(
                    SlotRule::new(Allowed::Only(TEXT_BLOCKS), paragraph).coerce(paragraph_kind),
                ),
                parent: Some(ParentRule {
                    allowed: Allowed::Only(&["details"]),
                    repair: ParentRepair::Unwrap,
                }),
                ..NodeRules::default()
            }),
        ]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(SingleSummary)]
    }

    fn shortcuts(&self) -> Vec<Box<dyn ShortcutHandler>> {
        vec![Box::new(RemoveEmptyDetails)]
    }

    fn serialize(&self, el: &ElementNode, children: &[MarkupNode]) -> SerializeOutcome {
        let tag = match el.kind {
            ElementKind::Details => "details",
            ElementKind::Summary => "summary",
            _ => return SerializeOutcome::Pass,
        };
        SerializeOutcome::Emit(vec![
            MarkupElement::new(tag)
                .with_children(children.to_vec())
                .into_node(),
        ])
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        match el.tag.as_str() {
            "details" => Some(vec![Node::details(children.to_vec())]),
            "summary" => Some(vec![Node::summary(children.to_vec())]),
            _ => None,
        }
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("details.insert", "Insert details", |editor, _args| {
                let at = insertion_point_after_focus(editor)
                    .ok_or_else(|| CommandError::new("No block to insert after"))?;
                let node = Node::details(vec![summary(), paragraph()]);
                // details > summary > paragraph > text
                let mut caret = at.clone();
                caret.extend([0, 0, 0]);
                let caret = Point::new(caret, 0);
                let tx = Transaction::new(vec![Op::InsertNode {
                    path: at,
                    node,
                }])
                .selection_after(Selection::collapsed(caret))
                .source("details.insert");
                editor.apply(tx).map_err(CommandError::from)
            })
            .description("Insert a collapsible section after the current block.")
            .keywords(["details", "summary", "collapse", "expand"]),
        ]
    }
}

/// Only the first child of a `details` may be a summary; later ones are
/// dissolved into their paragraphs.
struct SingleSummary;

impl NormalizePass for SingleSummary {
    fn id(&self) -> &'static str {
        "details.single_summary"
    }

    fn normalize(
        &self,
        _doc: &Document,
        el: &ElementNode,
        path: &[usize],
        _registry: &PluginRegistry,
    ) -> Option<Vec<Op>> {
        if el.type_name() != "details" {
            return None;
        }
        let (ix, extra) = el
            .children
            .iter()
            .enumerate()
            .skip(1)
            .find_map(|(ix, node)| match node {
                Node::Element(inner) if inner.type_name() == "summary" => Some((ix, inner)),
                _ => None,
            })?;
        Some(unwrap_ops(&path::child(path, ix), extra.children.len()))
    }
}

/// Backspace at the start of a `details` without any text or void content
/// removes the whole element.
struct RemoveEmptyDetails;

impl ShortcutHandler for RemoveEmptyDetails {
    fn id(&self) -> &'static str {
        "details.remove_empty"
    }

    fn key(&self) -> Key {
        Key::Backspace
    }

    fn handle(&self, editor: &Editor) -> Option<Transaction> {
        let selection = editor.selection();
        if !selection.is_collapsed() || selection.focus.offset != 0 {
            return None;
        }
        let doc = editor.doc();
        let details = ancestor_path(doc, &selection.focus.path, "details")?;
        let el = element_ref(doc, &details)?;
        if has_text_or_void(&el.children, editor.registry()) {
            return None;
        }
        Some(Transaction::new(vec![Op::RemoveNode { path: details }]).source("details.remove_empty"))
    }
}

fn has_text_or_void(children: &[Node], registry: &PluginRegistry) -> bool {
    children.iter().any(|node| match node {
        Node::Text(t) => !t.text.is_empty(),
        Node::Element(el) => {
            registry.is_void(el.type_name()) || has_text_or_void(&el.children, registry)
        }
    })
}
