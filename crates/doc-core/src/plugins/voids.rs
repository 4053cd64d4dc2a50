use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::error::CommandError;
use crate::markup::{MarkupElement, MarkupNode};
use crate::node::{ElementKind, ElementNode, EmbedData, MathData, Node, SymbolData};
use crate::ops::{Op, Transaction};
use crate::plugin::{CommandSpec, DocPlugin, NodeSpec, SerializeOutcome};
use crate::plugins::{insertion_point_after_focus, split_data_attrs};

const SYMBOL_RESOURCE: &str = "symbol";

fn embed_markup(
    resource: &str,
    fields: &BTreeMap<String, String>,
    attributes: &BTreeMap<String, String>,
) -> MarkupElement {
    let mut el = MarkupElement::new("embed").with_attr("data-resource", resource);
    for (key, value) in fields {
        el = el.with_attr(format!("data-{key}"), value.clone());
    }
    for (key, value) in attributes {
        el = el.with_attr(key.clone(), value.clone());
    }
    el
}

/// `<embed>` is void in HTML, so stored content may leave it unclosed and
/// the reader then nests the following siblings inside it. Those nodes are
/// handed back to the parent in their original order.
fn spilled(children: &[Node]) -> Vec<Node> {
    if !children.is_empty() {
        warn!(count = children.len(), "content inside an embed moved after it");
    }
    children.to_vec()
}

pub struct SymbolPlugin;

impl DocPlugin for SymbolPlugin {
    fn id(&self) -> &'static str {
        "symbol"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::inline("symbol").void()]
    }

    fn serialize(&self, el: &ElementNode, _children: &[MarkupNode]) -> SerializeOutcome {
        let ElementKind::Symbol(symbol) = &el.kind else {
            return SerializeOutcome::Pass;
        };
        let embed = embed_markup(SYMBOL_RESOURCE, &symbol.fields, &symbol.attributes)
            .with_children(vec![MarkupNode::text(symbol.glyph.clone())]);
        SerializeOutcome::Emit(vec![embed.into_node()])
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        if el.tag != "embed" || el.attr("data-resource") != Some(SYMBOL_RESOURCE) {
            return None;
        }
        let (mut fields, attributes) = split_data_attrs(el);
        fields.remove("resource");
        let glyph_len = children
            .iter()
            .position(|node| matches!(node, Node::Element(_)))
            .unwrap_or(children.len());
        let symbol = SymbolData {
            glyph: children[..glyph_len].iter().map(Node::text_content).collect(),
            fields,
            attributes,
        };
        let mut nodes = vec![Node::element(
            ElementKind::Symbol(symbol),
            vec![Node::text("")],
        )];
        nodes.extend(spilled(&children[glyph_len..]));
        Some(nodes)
    }
}

pub struct MathPlugin;

impl DocPlugin for MathPlugin {
    fn id(&self) -> &'static str {
        "math"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::inline("math").void()]
    }

    fn serialize(&self, el: &ElementNode, _children: &[MarkupNode]) -> SerializeOutcome {
        let ElementKind::Math(math) = &el.kind else {
            return SerializeOutcome::Pass;
        };
        let mut out = MarkupElement::new("math");
        for (key, value) in &math.attributes {
            out = out.with_attr(key.clone(), value.clone());
        }
        let out = out.with_children(vec![MarkupNode::Raw(math.inner.clone())]);
        SerializeOutcome::Emit(vec![out.into_node()])
    }

    fn deserialize(&self, el: &MarkupElement, _children: &[Node]) -> Option<Vec<Node>> {
        if el.tag != "math" {
            return None;
        }
        let math = MathData {
            inner: el.text_content(),
            attributes: el.attrs.iter().cloned().collect(),
        };
        Some(vec![Node::element(ElementKind::Math(math), vec![Node::text("")])])
    }
}

pub struct EmbedPlugin;

impl EmbedPlugin {
    /// An embed is only written when it points at something.
    fn resolvable(embed: &EmbedData) -> bool {
        ["resource_id", "url"]
            .iter()
            .any(|key| embed.field(key).is_some_and(|v| !v.trim().is_empty()))
    }
}

impl DocPlugin for EmbedPlugin {
    fn id(&self) -> &'static str {
        "embed"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block("embed").void()]
    }

    fn serialize(&self, el: &ElementNode, _children: &[MarkupNode]) -> SerializeOutcome {
        let ElementKind::Embed(embed) = &el.kind else {
            return SerializeOutcome::Pass;
        };
        if !Self::resolvable(embed) {
            return SerializeOutcome::Omit;
        }
        let out = embed_markup(&embed.resource, &embed.fields, &embed.attributes);
        SerializeOutcome::Emit(vec![out.into_node()])
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        if el.tag != "embed" {
            return None;
        }
        let (mut fields, attributes) = split_data_attrs(el);
        let resource = fields.remove("resource").unwrap_or_default();
        let embed = EmbedData {
            resource,
            fields,
            attributes,
        };
        let mut nodes = vec![Node::element(
            ElementKind::Embed(embed),
            vec![Node::text("")],
        )];
        nodes.extend(spilled(children));
        Some(nodes)
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("embed.insert", "Insert embed", |editor, args| {
                let args = args.unwrap_or(Value::Null);
                let resource = args
                    .get("resource")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CommandError::new("embed.insert needs a resource"))?;
                let fields: BTreeMap<String, String> = args
                    .get("fields")
                    .and_then(Value::as_object)
                    .map(|map| {
                        map.iter()
                            .map(|(k, v)| {
                                let value = match v {
                                    Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                };
                                (k.clone(), value)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let at = insertion_point_after_focus(editor)
                    .ok_or_else(|| CommandError::new("No block to insert after"))?;
                let tx = Transaction::new(vec![Op::InsertNode {
                    path: at,
                    node: Node::embed(resource, fields),
                }])
                .source("embed.insert");
                editor.apply(tx).map_err(CommandError::from)
            })
            .description("Insert an embedded resource after the current block.")
            .keywords(["embed", "image", "video", "audio", "h5p"])
            .args_example(serde_json::json!({
                "resource": "image",
                "fields": { "resource_id": "123", "size": "full" }
            })),
        ]
    }
}
