use serde_json::Value;

use crate::core::{Editor, element_ref};
use crate::error::CommandError;
use crate::markup::{MarkupElement, MarkupNode};
use crate::node::{Document, ElementKind, ElementNode, ListData, Node};
use crate::ops::{Op, Path, Transaction};
use crate::path;
use crate::plugin::{
    Allowed, ChildrenRule, CommandSpec, DocPlugin, Key, NodeRules, NodeSpec, NormalizePass,
    ParentRepair, ParentRule, PluginRegistry, SerializeOutcome, ShortcutHandler,
    TransactionTransform,
};
use crate::plugins::{ancestor_path, consume_marker, marker_before_space, text_block_path};

fn list(data: ListData) -> Node {
    Node::element(ElementKind::List(data), Vec::new())
}

fn bulleted_list() -> Node {
    list(ListData::default())
}

fn list_item() -> Node {
    Node::element(ElementKind::ListItem, Vec::new())
}

/// Wraps the block at `block` in a new list with a single item.
fn wrap_in_list_ops(block: &[usize], data: ListData) -> Option<Vec<Op>> {
    let moved = path::next_sibling(block)?;
    let mut target = block.to_vec();
    target.extend([0, 0]);
    Some(vec![
        Op::InsertNode {
            path: block.to_vec(),
            node: list(data),
        },
        Op::InsertNode {
            path: path::child(block, 0),
            node: list_item(),
        },
        Op::MoveNode {
            path: moved,
            new_path: target,
        },
    ])
}

pub struct ListPlugin;

impl DocPlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block("list").no_fill().rules(NodeRules {
                children: Some(ChildrenRule {
                    allowed: Allowed::Only(&["list_item"]),
                    wrap: Some(list_item),
                }),
                ..NodeRules::default()
            }),
            NodeSpec::block("list_item").rules(NodeRules {
                parent: Some(ParentRule {
                    allowed: Allowed::Only(&["list"]),
                    repair: ParentRepair::Wrap(bulleted_list),
                }),
                ..NodeRules::default()
            }),
        ]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(RemoveEmptyLists)]
    }

    fn transaction_transforms(&self) -> Vec<Box<dyn TransactionTransform>> {
        vec![Box::new(ListAutoformat)]
    }

    fn shortcuts(&self) -> Vec<Box<dyn ShortcutHandler>> {
        vec![Box::new(ExitEmptyItem)]
    }

    fn serialize(&self, el: &ElementNode, children: &[MarkupNode]) -> SerializeOutcome {
        let out = match &el.kind {
            ElementKind::List(data) if data.ordered => {
                let ol = MarkupElement::new("ol");
                match data.start {
                    Some(start) if start != 1 => ol.with_attr("start", start.to_string()),
                    _ => ol,
                }
            }
            ElementKind::List(_) => MarkupElement::new("ul"),
            ElementKind::ListItem => MarkupElement::new("li"),
            _ => return SerializeOutcome::Pass,
        };
        SerializeOutcome::Emit(vec![out.with_children(children.to_vec()).into_node()])
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        let kind = match el.tag.as_str() {
            "ul" => ElementKind::List(ListData::default()),
            "ol" => ElementKind::List(ListData {
                ordered: true,
                start: el.attr("start").and_then(|s| s.trim().parse().ok()),
            }),
            "li" => ElementKind::ListItem,
            _ => return None,
        };
        Some(vec![Node::element(kind, children.to_vec())])
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("list.wrap", "Turn into list", |editor, args| {
                let ordered = args
                    .as_ref()
                    .and_then(|v| v.get("ordered"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let focus = &editor.selection().focus.path;
                let block = text_block_path(editor.doc(), editor.registry(), focus)
                    .ok_or_else(|| CommandError::new("Selection is not in a text block"))?;
                let data = ListData {
                    ordered,
                    start: None,
                };
                let ops = wrap_in_list_ops(&block, data)
                    .ok_or_else(|| CommandError::new("Cannot wrap the document root"))?;
                editor
                    .apply(Transaction::new(ops).source("list.wrap"))
                    .map_err(CommandError::from)
            })
            .description("Wrap the current block in a bulleted or numbered list.")
            .keywords(["list", "bullet", "numbered", "ordered"])
            .args_example(serde_json::json!({ "ordered": true })),
        ]
    }
}

struct RemoveEmptyLists;

impl NormalizePass for RemoveEmptyLists {
    fn id(&self) -> &'static str {
        "list.remove_empty"
    }

    fn normalize(
        &self,
        _doc: &Document,
        el: &ElementNode,
        path: &[usize],
        _registry: &PluginRegistry,
    ) -> Option<Vec<Op>> {
        (el.type_name() == "list" && el.children.is_empty()).then(|| {
            vec![Op::RemoveNode {
                path: path.to_vec(),
            }]
        })
    }
}

/// `"- "` or `"* "` starts a bulleted list, `"1. "` a numbered one.
struct ListAutoformat;

impl ListAutoformat {
    fn list_for(marker: &str) -> Option<ListData> {
        if marker == "-" || marker == "*" {
            return Some(ListData::default());
        }
        let digits = marker.strip_suffix('.')?;
        let start: u32 = digits.parse().ok()?;
        Some(ListData {
            ordered: true,
            start: (start != 1).then_some(start),
        })
    }
}

impl TransactionTransform for ListAutoformat {
    fn id(&self) -> &'static str {
        "list.autoformat"
    }

    fn transform(&self, editor: &Editor, tx: &Transaction) -> Option<Transaction> {
        let site = marker_before_space(editor, tx)?;
        let data = Self::list_for(&site.marker)?;
        if ancestor_path(editor.doc(), &site.block, "list_item").is_some() {
            return None;
        }
        let ops = wrap_in_list_ops(&site.block, data)?;
        Some(consume_marker(tx, &site, ops))
    }
}

/// Enter in an empty list item leaves the list, splitting it when the item
/// is not the last one.
struct ExitEmptyItem;

impl ShortcutHandler for ExitEmptyItem {
    fn id(&self) -> &'static str {
        "list.exit_empty_item"
    }

    fn key(&self) -> Key {
        Key::Enter
    }

    fn handle(&self, editor: &Editor) -> Option<Transaction> {
        let selection = editor.selection();
        if !selection.is_collapsed() {
            return None;
        }
        let doc = editor.doc();
        let item: Path = ancestor_path(doc, &selection.focus.path, "list_item")?;
        let item_el = element_ref(doc, &item)?;
        let [Node::Element(block)] = item_el.children.as_slice() else {
            return None;
        };
        let empty = block.children.iter().all(|c| c.text_content().is_empty());
        if block.type_name() != "paragraph" || !empty {
            return None;
        }

        let list_path = path::parent(&item).to_vec();
        let list_len = element_ref(doc, &list_path)?.children.len();
        let ix = *item.last()?;
        let mut ops = Vec::new();
        if ix + 1 < list_len {
            ops.push(Op::SplitNode {
                path: list_path.clone(),
                position: ix + 1,
            });
        }
        ops.push(Op::MoveNode {
            path: path::child(&item, 0),
            new_path: path::next_sibling(&list_path)?,
        });
        ops.push(Op::RemoveNode { path: item });
        Some(Transaction::new(ops).source("list.exit_empty_item"))
    }
}
