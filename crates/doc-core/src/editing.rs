//! Typing, Enter, Backspace, range deletion and paste, expressed as
//! transactions against the current version.

use tracing::debug;

use crate::core::{Editor, Point, Selection, children_ref, element_ref, node_ref};
use crate::error::EditError;
use crate::node::{Document, ElementKind, Node};
use crate::ops::{Op, Path, Transaction};
use crate::path::{self, PathChange, transform_path};
use crate::plugin::{Key, PluginRegistry};
use crate::plugins::text_block_path;

impl Editor {
    /// Replaces the selection with `text`.
    pub fn insert_text(&mut self, text: &str) -> Result<(), EditError> {
        if text.is_empty() {
            return Ok(());
        }
        let (mut ops, caret) = self.deletion();
        let after = Point::new(caret.path.clone(), caret.offset + text.len());
        ops.push(Op::InsertText {
            path: caret.path,
            offset: caret.offset,
            text: text.to_string(),
        });
        self.apply(
            Transaction::new(ops)
                .selection_after(Selection::collapsed(after))
                .source("insert_text"),
        )
    }

    /// Splits the text block at the caret. Inline ancestors are split along
    /// with it; the caret lands at the start of the new block.
    pub fn split_block(&mut self) -> Result<(), EditError> {
        let (mut ops, caret) = self.deletion();
        let caret = caret_outside_void(self.doc(), self.registry(), caret);
        let Some(block) = text_block_path(self.doc(), self.registry(), &caret.path) else {
            return Ok(());
        };
        if !path::is_ancestor(&block, &caret.path) {
            return Ok(());
        }
        let heading_at_end = element_ref(self.doc(), &block).is_some_and(|el| {
            matches!(el.kind, ElementKind::Heading { .. })
                && !has_text_after(&el.children, &caret.path[block.len()..], caret.offset)
        });

        ops.push(Op::SplitNode {
            path: caret.path.clone(),
            position: caret.offset,
        });
        for depth in (block.len()..caret.path.len()).rev() {
            ops.push(Op::SplitNode {
                path: caret.path[..depth].to_vec(),
                position: caret.path[depth] + 1,
            });
        }
        let new_block = path::next_sibling(&block)
            .ok_or_else(|| EditError::violation("Cannot split the document root"))?;
        if heading_at_end {
            ops.push(Op::set_kind(new_block.clone(), ElementKind::Paragraph));
        }

        let mut target = new_block;
        target.resize(caret.path.len(), 0);
        self.apply(
            Transaction::new(ops)
                .selection_after(Selection::collapsed(Point::new(target, 0)))
                .source("split_block"),
        )
    }

    /// Backspace without plugin handling: removes the character before the
    /// caret, a void before it, or merges the block into the previous one.
    pub fn delete_backward(&mut self) -> Result<(), EditError> {
        if !self.selection().is_collapsed() {
            return self.delete_selection();
        }
        let caret = self.selection().focus.clone();
        let Some(Node::Text(leaf)) = node_ref(self.doc(), &caret.path) else {
            return Ok(());
        };
        if caret.offset > 0 {
            let Some(before) = leaf.text.get(..caret.offset) else {
                return Ok(());
            };
            let start = before.char_indices().next_back().map_or(0, |(ix, _)| ix);
            let tx = Transaction::new(vec![Op::RemoveText {
                path: caret.path,
                range: start..caret.offset,
            }])
            .source("delete_backward");
            return self.apply(tx);
        }
        let Some(ops) = backspace_at_start(self.doc(), self.registry(), &caret.path) else {
            return Ok(());
        };
        self.apply(Transaction::new(ops).source("delete_backward"))
    }

    /// Removes the selected content, merging the blocks at both ends.
    pub fn delete_selection(&mut self) -> Result<(), EditError> {
        if self.selection().is_collapsed() {
            return Ok(());
        }
        let (ops, caret) = self.deletion();
        self.apply(
            Transaction::new(ops)
                .selection_after(Selection::collapsed(caret))
                .source("delete_selection"),
        )
    }

    /// Pastes `nodes` at the selection. Inline content goes into the text at
    /// the caret; blocks land after the caret's block.
    pub fn insert_fragment(&mut self, nodes: Vec<Node>) -> Result<(), EditError> {
        if nodes.is_empty() {
            return Ok(());
        }
        let (mut ops, caret) = self.deletion();
        let caret = caret_outside_void(self.doc(), self.registry(), caret);
        let inline = nodes.iter().all(|node| self.registry().is_inline_node(node));
        let count = nodes.len();

        if inline {
            let (&ix, parent) = caret
                .path
                .split_last()
                .ok_or_else(|| EditError::violation("Caret is not in a text node"))?;
            ops.push(Op::SplitNode {
                path: caret.path.clone(),
                position: caret.offset,
            });
            ops.extend(nodes.into_iter().enumerate().map(|(k, node)| Op::InsertNode {
                path: path::child(parent, ix + 1 + k),
                node,
            }));
        } else {
            let block = text_block_path(self.doc(), self.registry(), &caret.path)
                .ok_or_else(|| EditError::violation("Caret is not in a text block"))?;
            let (&ix, parent) = block
                .split_last()
                .ok_or_else(|| EditError::violation("Caret is not in a text block"))?;
            ops.extend(nodes.into_iter().enumerate().map(|(k, node)| Op::InsertNode {
                path: path::child(parent, ix + 1 + k),
                node,
            }));
        }

        debug!(count, inline, "pasting fragment");
        self.apply(Transaction::new(ops).source("insert_fragment"))
    }

    /// Runs the first plugin shortcut claiming `key`, falling back to the
    /// default Enter and Backspace behaviour. Returns whether a plugin
    /// handled the key.
    pub fn handle_key(&mut self, key: Key) -> Result<bool, EditError> {
        let editor: &Editor = self;
        let claimed = editor
            .registry()
            .shortcuts(key)
            .find_map(|handler| handler.handle(editor).map(|tx| (handler.id(), tx)));

        if let Some((shortcut, tx)) = claimed {
            debug!(shortcut, ?key, "key handled by plugin");
            self.apply(tx)?;
            return Ok(true);
        }
        match key {
            Key::Enter => self.split_block()?,
            Key::Backspace => self.delete_backward()?,
        }
        Ok(false)
    }

    /// Ops removing the selected range, and the caret they leave behind.
    fn deletion(&self) -> (Vec<Op>, Point) {
        let (start, end) = self.selection().ordered();
        if start == end {
            return (Vec::new(), start.clone());
        }
        let ops = range_removal(self.doc(), self.registry(), start, end);
        (ops, start.clone())
    }
}

/// A caret in the placeholder text of an inline void moves just after it.
fn caret_outside_void(doc: &Document, registry: &PluginRegistry, caret: Point) -> Point {
    let host = path::parent(&caret.path);
    let in_void = !host.is_empty()
        && element_ref(doc, host).is_some_and(|el| registry.is_void(el.type_name()));
    if !in_void {
        return caret;
    }
    match path::next_sibling(host) {
        Some(next) if matches!(node_ref(doc, &next), Some(Node::Text(_))) => Point::new(next, 0),
        _ => caret,
    }
}

fn has_text_after(children: &[Node], rel: &[usize], offset: usize) -> bool {
    let Some((&ix, rest)) = rel.split_first() else {
        return false;
    };
    let later = children.get(ix + 1..).unwrap_or_default();
    if later.iter().any(|node| !node.text_content().is_empty()) {
        return true;
    }
    match children.get(ix) {
        Some(Node::Text(t)) => t.text.get(offset..).is_some_and(|tail| !tail.is_empty()),
        Some(Node::Element(el)) => has_text_after(&el.children, rest, offset),
        None => false,
    }
}

fn backspace_at_start(doc: &Document, registry: &PluginRegistry, leaf: &[usize]) -> Option<Vec<Op>> {
    let host = path::parent(leaf);
    if element_ref(doc, host).is_some_and(|el| registry.is_void(el.type_name())) {
        return Some(vec![Op::RemoveNode {
            path: host.to_vec(),
        }]);
    }

    let block = text_block_path(doc, registry, leaf)?;
    let mut at: Path = leaf.to_vec();
    while at.len() > block.len() + 1 && at.last() == Some(&0) {
        at.pop();
    }

    if at.last().is_some_and(|ix| *ix > 0) {
        // Something inline sits before the caret inside the block.
        let previous = path::previous_sibling(&at)?;
        return match node_ref(doc, &previous)? {
            Node::Element(el) if registry.is_void(el.type_name()) => {
                Some(vec![Op::RemoveNode { path: previous }])
            }
            Node::Element(el) => {
                let last = el.children.len().checked_sub(1)?;
                let Node::Text(t) = &el.children[last] else {
                    return None;
                };
                let (start, _) = t.text.char_indices().next_back()?;
                Some(vec![Op::RemoveText {
                    path: path::child(&previous, last),
                    range: start..t.text.len(),
                }])
            }
            Node::Text(t) => {
                let (start, _) = t.text.char_indices().next_back()?;
                Some(vec![Op::RemoveText {
                    path: previous,
                    range: start..t.text.len(),
                }])
            }
        };
    }

    // A block opening a list item joins the item before it.
    let mut opener = block.clone();
    while opener.len() > 2 && opener.last() == Some(&0) {
        let parent = path::parent(&opener);
        let in_list = element_ref(doc, parent)
            .is_some_and(|el| matches!(el.type_name(), "list" | "list_item"));
        if !in_list {
            break;
        }
        opener.pop();
    }

    let previous = path::previous_sibling(&opener)?;
    let prev = element_ref(doc, &previous)?;
    if registry.is_void(prev.type_name()) {
        return Some(vec![Op::RemoveNode { path: previous }]);
    }
    let into = last_text_block(doc, registry, &previous)?;
    let emptied = sole_content_ancestor(doc, &block, opener.len());
    move_and_merge(&block, &into, emptied)
}

/// Deepest text block at the end of `root`, `root` included.
fn last_text_block(doc: &Document, registry: &PluginRegistry, root: &[usize]) -> Option<Path> {
    let mut at = root.to_vec();
    loop {
        if text_block_path(doc, registry, &at).as_deref() == Some(at.as_slice()) {
            return Some(at);
        }
        let el = element_ref(doc, &at)?;
        if registry.is_void(el.type_name()) {
            return None;
        }
        at.push(el.children.len().checked_sub(1)?);
    }
}

/// Highest ancestor of `block`, no shallower than `floor`, that holds
/// nothing but `block`.
fn sole_content_ancestor(doc: &Document, block: &[usize], floor: usize) -> Option<Path> {
    let mut top = None;
    let mut at = block;
    while at.len() > floor {
        let parent = path::parent(at);
        if children_ref(doc, parent)?.len() != 1 {
            break;
        }
        top = Some(parent.to_vec());
        at = parent;
    }
    top
}

/// Moves `block` right after the text block `into`, drops `emptied` (given
/// before the move) and merges the two.
fn move_and_merge(block: &[usize], into: &[usize], emptied: Option<Path>) -> Option<Vec<Op>> {
    let target = path::next_sibling(into)?;
    let mut ops = Vec::new();
    if block != target.as_slice() {
        ops.push(Op::MoveNode {
            path: block.to_vec(),
            new_path: target.clone(),
        });
        let moved = PathChange::Moved {
            from: block,
            to: &target,
        };
        if let Some(emptied) = emptied.and_then(|at| transform_path(&at, moved)) {
            ops.push(Op::RemoveNode { path: emptied });
        }
    }
    ops.push(Op::MergeNode { path: target });
    Some(ops)
}

/// Removes everything between `start` and `end` (document order) and merges
/// the end's text block into the start's.
fn range_removal(doc: &Document, registry: &PluginRegistry, start: &Point, end: &Point) -> Vec<Op> {
    if start.path == end.path {
        return vec![Op::RemoveText {
            path: start.path.clone(),
            range: start.offset..end.offset,
        }];
    }

    let mut ops = Vec::new();
    if let Some(Node::Text(t)) = node_ref(doc, &start.path) {
        if start.offset < t.text.len() {
            ops.push(Op::RemoveText {
                path: start.path.clone(),
                range: start.offset..t.text.len(),
            });
        }
    }
    if end.offset > 0 && matches!(node_ref(doc, &end.path), Some(Node::Text(_))) {
        ops.push(Op::RemoveText {
            path: end.path.clone(),
            range: 0..end.offset,
        });
    }

    let common = path::common_ancestor(&start.path, &end.path);
    let depth = common.len();
    if depth >= start.path.len() || depth >= end.path.len() {
        return ops;
    }

    let mut doomed: Vec<Path> = Vec::new();
    for d in (depth + 2..=start.path.len()).rev() {
        let (at, parent) = (start.path[d - 1], &start.path[..d - 1]);
        let len = children_ref(doc, parent).map_or(0, <[Node]>::len);
        doomed.extend((at + 1..len).map(|ix| path::child(parent, ix)));
    }
    for d in (depth + 2..=end.path.len()).rev() {
        let (at, parent) = (end.path[d - 1], &end.path[..d - 1]);
        doomed.extend((0..at).map(|ix| path::child(parent, ix)));
    }
    doomed.extend((start.path[depth] + 1..end.path[depth]).map(|ix| path::child(&common, ix)));
    doomed.sort();
    ops.extend(
        doomed
            .iter()
            .rev()
            .map(|path| Op::RemoveNode { path: path.clone() }),
    );

    if let Some(merge) = merge_blocks(doc, registry, start, end, depth, &doomed) {
        ops.extend(merge);
    }
    ops
}

/// Moves the end's text block next to the start's and merges the two. Any
/// ancestor left empty by the move goes with it.
fn merge_blocks(
    doc: &Document,
    registry: &PluginRegistry,
    start: &Point,
    end: &Point,
    depth: usize,
    removed: &[Path],
) -> Option<Vec<Op>> {
    let start_block = text_block_path(doc, registry, &start.path)?;
    let original = text_block_path(doc, registry, &end.path)?;
    if start_block == original {
        return None;
    }
    let emptied = emptied_ancestor(doc, &original, depth);

    let through_removals = |mut at: Path| {
        for path in removed.iter().rev() {
            at = transform_path(&at, PathChange::Removed(path))?;
        }
        Some(at)
    };
    let end_block = through_removals(original)?;
    let emptied = emptied.and_then(through_removals);
    move_and_merge(&end_block, &start_block, emptied)
}

/// Highest ancestor of `block` below depth `floor` whose only remaining
/// content is `block`. Earlier siblings along the way are already doomed.
fn emptied_ancestor(doc: &Document, block: &[usize], floor: usize) -> Option<Path> {
    let mut top = None;
    for len in (floor + 2..=block.len()).rev() {
        let parent = &block[..len - 1];
        let siblings = children_ref(doc, parent)?.len();
        if block[len - 1] + 1 != siblings {
            break;
        }
        top = Some(parent.to_vec());
    }
    top
}
