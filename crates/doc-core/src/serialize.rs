use tracing::{debug, warn};

use crate::error::Diagnostic;
use crate::markup::{MarkupElement, MarkupNode, parse_markup, render_markup};
use crate::node::Node;
use crate::plugin::{PluginRegistry, SerializeOutcome};

/// Tags whose whitespace-only text children are formatting, not content.
const BLOCK_CONTAINER_TAGS: &[&str] = &[
    "section", "blockquote", "details", "ul", "ol", "li", "table", "thead", "tbody", "tfoot", "tr",
    "td", "th", "summary",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeserializeReport {
    pub nodes: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn markup_to_nodes(markup: &str, registry: &PluginRegistry) -> Vec<Node> {
    markup_to_nodes_with_report(markup, registry).nodes
}

pub fn markup_to_nodes_with_report(markup: &str, registry: &PluginRegistry) -> DeserializeReport {
    let parsed = parse_markup(markup);
    let mut diagnostics = parsed.diagnostics;
    let nodes = convert_children(&parsed.nodes, true, registry, &mut diagnostics);
    DeserializeReport { nodes, diagnostics }
}

fn convert_children(
    markup: &[MarkupNode],
    block_context: bool,
    registry: &PluginRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Node> {
    let mut out = Vec::new();
    for node in markup {
        match node {
            MarkupNode::Text(text) | MarkupNode::Raw(text) => {
                if block_context && text.trim().is_empty() {
                    continue;
                }
                out.push(Node::text(text.clone()));
            }
            MarkupNode::Element(el) => out.extend(convert_element(el, registry, diagnostics)),
        }
    }
    out
}

fn convert_element(
    el: &MarkupElement,
    registry: &PluginRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Node> {
    let block_context = BLOCK_CONTAINER_TAGS.contains(&el.tag.as_str());
    let children = convert_children(&el.children, block_context, registry, diagnostics);

    for plugin in registry.plugins() {
        if let Some(nodes) = plugin.deserialize(el, &children) {
            return nodes;
        }
    }

    warn!(tag = %el.tag, "no plugin claims markup element");
    diagnostics.push(Diagnostic::UnclaimedMarkup {
        tag: el.tag.clone(),
    });
    children
}

pub fn document_to_markup(nodes: &[Node], registry: &PluginRegistry) -> String {
    render_markup(&nodes_to_markup(nodes, registry))
}

pub fn nodes_to_markup(nodes: &[Node], registry: &PluginRegistry) -> Vec<MarkupNode> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::Text(text) => {
                if text.text.is_empty() {
                    continue;
                }
                let mut markup = MarkupNode::text(text.text.clone());
                for plugin in registry.plugins() {
                    markup = plugin.serialize_text(text, markup);
                }
                out.push(markup);
            }
            Node::Element(el) => {
                let children = nodes_to_markup(&el.children, registry);
                let mut emitted = None;
                for plugin in registry.plugins() {
                    match plugin.serialize(el, &children) {
                        SerializeOutcome::Pass => continue,
                        SerializeOutcome::Omit => {
                            debug!(kind = el.type_name(), id = ?el.id, "element omitted from markup");
                            emitted = Some(Vec::new());
                        }
                        SerializeOutcome::Emit(markup) => emitted = Some(markup),
                    }
                    break;
                }
                out.extend(emitted.unwrap_or(children));
            }
        }
    }
    out
}
