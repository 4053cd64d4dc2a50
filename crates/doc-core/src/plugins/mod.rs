//! Built-in content types, one plugin per node family.

mod blocks;
mod details;
mod inline;
mod list;
mod table;
mod voids;

use std::collections::BTreeMap;

pub use blocks::{BlockquotePlugin, HeadingPlugin, ParagraphPlugin, SectionPlugin};
pub use details::DetailsPlugin;
pub use inline::{LinkPlugin, MarksPlugin, SpanPlugin};
pub use list::ListPlugin;
pub use table::TablePlugin;
pub use voids::{EmbedPlugin, MathPlugin, SymbolPlugin};

use crate::core::{Editor, element_ref};
use crate::markup::MarkupElement;
use crate::node::{Document, Node};
use crate::ops::{Op, Path, Transaction};
use crate::plugin::{ChildConstraint, DocPlugin, PluginRegistry};

pub fn core_plugins() -> Vec<Box<dyn DocPlugin>> {
    vec![
        Box::new(SectionPlugin),
        Box::new(ParagraphPlugin),
        Box::new(HeadingPlugin),
        Box::new(BlockquotePlugin),
        Box::new(ListPlugin),
        Box::new(LinkPlugin),
        Box::new(SpanPlugin),
        Box::new(MarksPlugin),
    ]
}

pub fn learning_resource_plugins() -> Vec<Box<dyn DocPlugin>> {
    let mut plugins = core_plugins();
    plugins.extend([
        Box::new(DetailsPlugin) as Box<dyn DocPlugin>,
        Box::new(TablePlugin),
        // Symbols are embeds too; they must be asked first.
        Box::new(SymbolPlugin),
        Box::new(MathPlugin),
        Box::new(EmbedPlugin),
    ]);
    plugins
}

pub fn concept_plugins() -> Vec<Box<dyn DocPlugin>> {
    vec![
        Box::new(SectionPlugin),
        Box::new(ParagraphPlugin),
        Box::new(HeadingPlugin),
        Box::new(LinkPlugin),
        Box::new(SpanPlugin),
        Box::new(MarksPlugin),
        Box::new(SymbolPlugin),
        Box::new(MathPlugin),
        Box::new(EmbedPlugin),
    ]
}

/// Nearest ancestor-or-self of `path` with type `kind`.
pub(crate) fn ancestor_path(doc: &Document, path: &[usize], kind: &str) -> Option<Path> {
    (1..=path.len())
        .rev()
        .map(|len| &path[..len])
        .find(|candidate| element_ref(doc, candidate).is_some_and(|el| el.type_name() == kind))
        .map(<[usize]>::to_vec)
}

/// Nearest ancestor-or-self of `path` whose content is inline text.
pub(crate) fn text_block_path(
    doc: &Document,
    registry: &PluginRegistry,
    path: &[usize],
) -> Option<Path> {
    (1..=path.len())
        .rev()
        .map(|len| &path[..len])
        .find(|candidate| {
            element_ref(doc, candidate).is_some_and(|el| {
                registry.node_spec(el.type_name()).is_some_and(|spec| {
                    spec.children == ChildConstraint::InlineOnly && !registry.is_inline(spec.kind)
                })
            })
        })
        .map(<[usize]>::to_vec)
}

/// `data-*` attributes keyed without the prefix, and everything else.
pub(crate) fn split_data_attrs(
    el: &MarkupElement,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut fields = BTreeMap::new();
    let mut other = BTreeMap::new();
    for (key, value) in &el.attrs {
        match key.strip_prefix("data-") {
            Some(field) => fields.insert(field.to_string(), value.clone()),
            None => other.insert(key.clone(), value.clone()),
        };
    }
    (fields, other)
}

/// A typed block marker such as `"##"` followed by a space at the very start
/// of a text block holding a single text leaf.
pub(crate) struct MarkerSite {
    pub block: Path,
    pub text: Path,
    pub marker: String,
}

pub(crate) fn marker_before_space(editor: &Editor, tx: &Transaction) -> Option<MarkerSite> {
    let [Op::InsertText { path, offset, text }] = tx.ops.as_slice() else {
        return None;
    };
    if text != " " {
        return None;
    }
    let block = crate::path::parent(path).to_vec();
    let el = element_ref(editor.doc(), &block)?;
    if el.children.len() != 1 || el.type_name() != "paragraph" {
        return None;
    }
    let Node::Text(leaf) = &el.children[0] else {
        return None;
    };
    if *offset != leaf.text.len() {
        return None;
    }
    Some(MarkerSite {
        block,
        text: path.clone(),
        marker: leaf.text.clone(),
    })
}

/// Appends the ops that consume the marker and its space to `tx`.
pub(crate) fn consume_marker(tx: &Transaction, site: &MarkerSite, extra: Vec<Op>) -> Transaction {
    let mut ops = tx.ops.clone();
    ops.push(Op::RemoveText {
        path: site.text.clone(),
        range: 0..site.marker.len() + 1,
    });
    ops.extend(extra);
    let mut out = Transaction::new(ops);
    out.meta = tx.meta.clone();
    out
}

/// Where the editor inserts new blocks: after the text block holding the focus.
pub(crate) fn insertion_point_after_focus(editor: &Editor) -> Option<Path> {
    let block = text_block_path(editor.doc(), editor.registry(), &editor.selection().focus.path)?;
    crate::path::next_sibling(&block)
}
