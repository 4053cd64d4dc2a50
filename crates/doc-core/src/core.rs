use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CommandError, EditError, PathError};
use crate::identity::{IdGenerator, assign_ids, clear_colliding_ids, collect_ids};
use crate::node::{Document, ElementNode, Node, TextNode};
use crate::normalize::normalize;
use crate::ops::{NodePatch, Op, Path, Transaction};
use crate::path::{self, PathChange, transform_path};
use crate::plugin::PluginRegistry;
use crate::serialize::{document_to_markup, markup_to_nodes};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Anchor and focus in document order.
    pub fn ordered(&self) -> (&Point, &Point) {
        let a = (&self.anchor.path, self.anchor.offset);
        let f = (&self.focus.path, self.focus.offset);
        if a <= f {
            (&self.anchor, &self.focus)
        } else {
            (&self.focus, &self.anchor)
        }
    }
}

fn default_max_undo() -> usize {
    200
}

fn default_max_normalize_iterations() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_max_undo")]
    pub max_undo: usize,
    /// Base repair budget for one normalization run; each element in the
    /// region adds a few more.
    #[serde(default = "default_max_normalize_iterations")]
    pub max_normalize_iterations: usize,
    /// Prefix for minted element ids. A per-process session seed when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_seed: Option<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: default_max_undo(),
            max_normalize_iterations: default_max_normalize_iterations(),
            id_seed: None,
        }
    }
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = default_max_undo();
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = default_max_normalize_iterations();
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }
}

/// A committed document version together with its selection.
#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub doc: Arc<Document>,
    pub selection: Selection,
    pub version: u64,
}

/// Everything the pipeline needs besides the document itself.
pub struct ApplyContext<'a> {
    pub registry: &'a PluginRegistry,
    pub ids: &'a mut IdGenerator,
    pub config: &'a EditorConfig,
}

#[derive(Debug, Clone)]
pub struct Applied {
    pub doc: Document,
    pub selection: Selection,
    pub repairs: usize,
}

/// Applies `tx` to a copy of `doc`, then normalizes and assigns identity.
/// `doc` itself is never touched, so a failed transaction leaves no trace.
pub fn apply(
    doc: &Document,
    selection: &Selection,
    tx: &Transaction,
    ctx: &mut ApplyContext<'_>,
) -> Result<Applied, EditError> {
    let mut next = doc.clone();
    let mut selection = selection.clone();
    let mut region: Option<Path> = None;

    for op in tx.ops.iter().cloned() {
        for touched in op_regions(&op) {
            widen_region(&mut region, &touched);
        }
        apply_op_to(&mut next, &mut selection, op, ctx.registry)?;
    }

    if let Some(sel) = &tx.selection_after {
        selection = sel.clone();
    }

    let region = region.unwrap_or_default();
    let repairs = normalize(&mut next, &mut selection, region, ctx.registry, ctx.config)?;

    assign_ids(&mut next, ctx.ids, ctx.registry);
    let selection = normalize_selection(&next, &selection);

    Ok(Applied {
        doc: next,
        selection,
        repairs,
    })
}

pub(crate) fn op_regions(op: &Op) -> Vec<Path> {
    match op {
        Op::MoveNode { path, new_path } => {
            vec![path::parent(path).to_vec(), path::parent(new_path).to_vec()]
        }
        other => vec![path::parent(other.path()).to_vec()],
    }
}

pub(crate) fn widen_region(region: &mut Option<Path>, touched: &[usize]) {
    *region = Some(match region.take() {
        None => touched.to_vec(),
        Some(current) => path::common_ancestor(&current, touched),
    });
}

pub struct Editor {
    doc: Arc<Document>,
    selection: Selection,
    version: u64,
    registry: PluginRegistry,
    config: EditorConfig,
    ids: IdGenerator,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let config = config.with_defaults();
        let ids = match &config.id_seed {
            Some(seed) => IdGenerator::from_seed(seed.clone()),
            None => IdGenerator::for_session(),
        };
        let mut editor = Self {
            doc: Arc::new(Document::default()),
            selection,
            version: 0,
            registry,
            config,
            ids,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.load_in_place(doc);
        editor
    }

    pub fn with_core_plugins() -> Self {
        let selection = Selection::collapsed(Point::new(vec![0, 0, 0], 0));
        Self::new(Document::empty(), selection, PluginRegistry::core())
    }

    pub fn with_learning_resource_plugins() -> Self {
        let selection = Selection::collapsed(Point::new(vec![0, 0, 0], 0));
        Self::new(Document::empty(), selection, PluginRegistry::learning_resource())
    }

    /// Deserializes `markup` and normalizes the result into a fresh editor.
    pub fn from_markup(markup: &str, registry: PluginRegistry) -> Self {
        Self::from_markup_with_config(markup, registry, EditorConfig::default())
    }

    pub fn from_markup_with_config(
        markup: &str,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let children = markup_to_nodes(markup, &registry);
        let selection = Selection::collapsed(Point::new(Vec::new(), 0));
        Self::with_config(Document { children }, selection, registry, config)
    }

    pub fn to_markup(&self) -> String {
        document_to_markup(&self.doc.children, &self.registry)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// The current version, shareable without copying.
    pub fn snapshot(&self) -> Arc<Document> {
        Arc::clone(&self.doc)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = normalize_selection(&self.doc, &selection);
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        let current = self.current_record();
        self.restore(record);
        self.redo_stack.push(current);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        let current = self.current_record();
        self.restore(record);
        self.undo_stack.push(current);
        true
    }

    fn current_record(&self) -> UndoRecord {
        UndoRecord {
            doc: Arc::clone(&self.doc),
            selection: self.selection.clone(),
            version: self.version,
        }
    }

    fn restore(&mut self, record: UndoRecord) {
        self.doc = record.doc;
        self.selection = record.selection;
        self.version = record.version;
    }

    /// The single mutation entry point. On error the editor is unchanged.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), EditError> {
        let tx = self.transform_transaction(tx);
        let mut ctx = ApplyContext {
            registry: &self.registry,
            ids: &mut self.ids,
            config: &self.config,
        };
        let applied = match apply(&self.doc, &self.selection, &tx, &mut ctx) {
            Ok(applied) => applied,
            Err(err) => {
                debug!(error = %err, source = ?tx.meta.source, "transaction rejected");
                return Err(err);
            }
        };

        let previous = self.current_record();
        self.undo_stack.push(previous);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }

        self.doc = Arc::new(applied.doc);
        self.selection = applied.selection;
        self.version += 1;
        debug!(
            version = self.version,
            ops = tx.ops.len(),
            repairs = applied.repairs,
            source = ?tx.meta.source,
            "transaction committed"
        );
        Ok(())
    }

    fn transform_transaction(&self, mut tx: Transaction) -> Transaction {
        for transform in self.registry.transaction_transforms() {
            if let Some(next) = transform.transform(self, &tx) {
                debug!(transform = transform.id(), "transaction rewritten");
                tx = next;
            }
        }
        tx
    }

    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    /// Writes `patch` to the element with `id` if it still exists. Returns
    /// `false` when the element is gone, which makes late async results harmless.
    pub fn update_node_by_id(&mut self, id: &str, patch: NodePatch) -> Result<bool, EditError> {
        let Some(path) = find_path_by_id(&self.doc, id) else {
            debug!(id, "late update for a node that no longer exists");
            return Ok(false);
        };
        self.apply(
            Transaction::new(vec![Op::SetNodeProperties { path, patch }]).source("late_update"),
        )?;
        Ok(true)
    }

    fn load_in_place(&mut self, doc: Document) {
        let mut doc = doc;
        let mut selection = self.selection.clone();
        match normalize(
            &mut doc,
            &mut selection,
            Vec::new(),
            &self.registry,
            &self.config,
        ) {
            Ok(repairs) => {
                debug!(repairs, "loaded document normalized");
            }
            Err(err) => {
                warn!(error = %err, "loaded document left partly unrepaired");
            }
        }
        assign_ids(&mut doc, &mut self.ids, &self.registry);
        self.selection = normalize_selection(&doc, &selection);
        self.doc = Arc::new(doc);
    }
}

pub(crate) fn apply_op_to(
    doc: &mut Document,
    selection: &mut Selection,
    op: Op,
    registry: &PluginRegistry,
) -> Result<(), EditError> {
    match op {
        Op::InsertText { path, offset, text } => {
            if !text.is_empty() && inside_void(doc, &path, registry) {
                return Err(EditError::violation("Cannot insert text into a void element"));
            }
            let text_node = node_text_mut(doc, &path)?;
            check_offset(&text_node.text, offset)?;
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            if range.start > range.end {
                return Err(EditError::violation(format!("Inverted text range {range:?}")));
            }
            check_offset(&text_node.text, range.start)?;
            check_offset(&text_node.text, range.end)?;
            text_node.text.replace_range(range.clone(), "");
            transform_selection_remove_text(selection, &path, range);
        }
        Op::InsertNode { path, mut node } => {
            let (ix, parent_path) = split_path(&path)?;
            if !parent_path.is_empty() {
                let accepts = match node_ref(doc, parent_path) {
                    Some(Node::Element(parent)) => {
                        !registry.is_void(parent.type_name())
                            || matches!(&node, Node::Text(t) if t.text.is_empty())
                    }
                    _ => true,
                };
                if !accepts {
                    return Err(EditError::violation("Void elements only hold an empty text"));
                }
            }
            let live = collect_ids(&doc.children);
            clear_colliding_ids(&mut node, &live);
            let children = children_mut(doc, parent_path)?;
            if ix > children.len() {
                return Err(EditError::violation(format!(
                    "Insert index out of bounds: {ix} > {}",
                    children.len()
                )));
            }
            children.insert(ix, node);
            transform_selection(selection, PathChange::Inserted(&path));
        }
        Op::RemoveNode { path } => {
            remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path);
        }
        Op::SetNodeProperties { path, patch } => match node_mut(doc, &path)? {
            Node::Element(el) => {
                if patch.marks.is_some() {
                    return Err(EditError::violation("Elements carry no marks"));
                }
                if let Some(kind) = patch.kind {
                    el.kind = kind;
                }
            }
            Node::Text(t) => {
                if patch.kind.is_some() {
                    return Err(EditError::violation("Text nodes have no element kind"));
                }
                if let Some(marks) = patch.marks {
                    t.marks = marks;
                }
            }
        },
        Op::SplitNode { path, position } => {
            let (ix, parent_path) = split_path(&path)?;
            let children = children_mut(doc, parent_path)?;
            let len = children.len();
            let node = children.get_mut(ix).ok_or_else(|| {
                EditError::violation(format!("Split index out of bounds: {ix} >= {len}"))
            })?;
            let tail = match node {
                Node::Text(t) => {
                    check_offset(&t.text, position)?;
                    let rest = t.text.split_off(position);
                    Node::Text(TextNode {
                        text: rest,
                        marks: t.marks.clone(),
                    })
                }
                Node::Element(el) => {
                    if position > el.children.len() {
                        return Err(EditError::violation(format!(
                            "Split position out of bounds: {position} > {}",
                            el.children.len()
                        )));
                    }
                    el.id = None;
                    let rest = el.children.split_off(position);
                    Node::Element(ElementNode::new(el.kind.clone(), rest))
                }
            };
            children.insert(ix + 1, tail);
            transform_selection_split(selection, &path, position);
        }
        Op::MergeNode { path } => {
            let (ix, parent_path) = split_path(&path)?;
            if ix == 0 {
                return Err(EditError::violation("Nothing to merge into"));
            }
            let children = children_mut(doc, parent_path)?;
            if ix >= children.len() {
                return Err(EditError::violation(format!(
                    "Merge index out of bounds: {ix} >= {}",
                    children.len()
                )));
            }
            let position = match (&children[ix - 1], &children[ix]) {
                (Node::Text(prev), Node::Text(_)) => prev.text.len(),
                (Node::Element(prev), Node::Element(_)) => prev.children.len(),
                _ => return Err(EditError::violation("Cannot merge a text and an element")),
            };
            let node = children.remove(ix);
            match (&mut children[ix - 1], node) {
                (Node::Text(prev), Node::Text(t)) => prev.text.push_str(&t.text),
                (Node::Element(prev), Node::Element(el)) => prev.children.extend(el.children),
                _ => {}
            }
            transform_selection_merge(selection, &path, position);
        }
        Op::MoveNode { path, new_path } => {
            if path.is_empty() || new_path.is_empty() {
                return Err(EditError::violation("Cannot move the document root"));
            }
            if path::is_ancestor(&path, &new_path) {
                return Err(EditError::violation("Cannot move a node into itself"));
            }
            let node = remove_node(doc, &path)?;
            if let Err(err) = insert_node(doc, &new_path, node.clone()) {
                insert_node(doc, &path, node)?;
                return Err(err.into());
            }
            transform_selection(
                selection,
                PathChange::Moved {
                    from: &path,
                    to: &new_path,
                },
            );
        }
    }
    Ok(())
}

fn inside_void(doc: &Document, text_path: &[usize], registry: &PluginRegistry) -> bool {
    match node_ref(doc, path::parent(text_path)) {
        Some(Node::Element(el)) => registry.is_void(el.type_name()),
        _ => false,
    }
}

fn check_offset(text: &str, offset: usize) -> Result<(), EditError> {
    if offset > text.len() || !text.is_char_boundary(offset) {
        return Err(EditError::violation(format!(
            "Offset {offset} is outside text of length {}",
            text.len()
        )));
    }
    Ok(())
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn split_path(path: &[usize]) -> Result<(usize, &[usize]), PathError> {
    match path.split_last() {
        Some((ix, parent)) => Ok((*ix, parent)),
        None => Err(PathError("Empty path".into())),
    }
}

fn transform_point(point: &mut Point, change: PathChange<'_>) -> bool {
    match transform_path(&point.path, change) {
        Some(path) => {
            point.path = path;
            true
        }
        None => false,
    }
}

fn transform_selection(selection: &mut Selection, change: PathChange<'_>) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        transform_point(point, change);
    }
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(selection: &mut Selection, path: &[usize], range: Range<usize>) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path {
            continue;
        }
        if point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_remove_node(selection: &mut Selection, path: &[usize]) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if transform_point(point, PathChange::Removed(path)) {
            continue;
        }
        // The point was inside the removed subtree: move it to the end of the
        // previous sibling, or to whatever now occupies the removed slot.
        match path::previous_sibling(path) {
            Some(previous) => {
                point.path = previous;
                point.offset = usize::MAX;
            }
            None => {
                point.path = path.to_vec();
                point.offset = 0;
            }
        }
    }
}

fn transform_selection_split(selection: &mut Selection, path: &[usize], position: usize) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path {
            if point.offset >= position {
                if let Some(next) = path::next_sibling(path) {
                    point.path = next;
                    point.offset -= position;
                }
            }
            continue;
        }
        transform_point(point, PathChange::Split { path, position });
    }
}

fn transform_selection_merge(selection: &mut Selection, path: &[usize], position: usize) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        let merged_text = point.path == path;
        transform_point(point, PathChange::Merged { path, position });
        if merged_text {
            point.offset = point.offset.saturating_add(position);
        }
    }
}

/// Snaps both ends of `selection` onto existing text leaves.
pub fn normalize_selection(doc: &Document, selection: &Selection) -> Selection {
    let fallback = first_text_point(doc).unwrap_or(Point {
        path: vec![0],
        offset: 0,
    });

    let anchor = resolve_point(doc, &selection.anchor).unwrap_or_else(|| {
        resolve_point(doc, &selection.focus).unwrap_or_else(|| fallback.clone())
    });
    let focus = resolve_point(doc, &selection.focus).unwrap_or_else(|| anchor.clone());

    Selection { anchor, focus }
}

pub fn first_text_point(doc: &Document) -> Option<Point> {
    text_descendant(&doc.children, &mut Vec::new(), false)
}

fn text_descendant(children: &[Node], path: &mut Vec<usize>, last: bool) -> Option<Point> {
    let order: Box<dyn Iterator<Item = (usize, &Node)>> = if last {
        Box::new(children.iter().enumerate().rev())
    } else {
        Box::new(children.iter().enumerate())
    };
    for (ix, node) in order {
        path.push(ix);
        match node {
            Node::Text(t) => {
                let point = Point {
                    path: path.clone(),
                    offset: if last { t.text.len() } else { 0 },
                };
                path.pop();
                return Some(point);
            }
            Node::Element(el) => {
                if let Some(point) = text_descendant(&el.children, path, last) {
                    path.pop();
                    return Some(point);
                }
            }
        }
        path.pop();
    }
    None
}

fn resolve_point(doc: &Document, point: &Point) -> Option<Point> {
    if doc.children.is_empty() {
        return None;
    }

    let mut resolved: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved,
                    offset: clamp_to_char_boundary(&t.text, point.offset),
                });
            }
            Node::Element(el) => children = &el.children,
        }
    }

    let prefer_end = point.offset > 0;
    text_descendant(children, &mut resolved, prefer_end)
}

pub fn node_ref<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = doc.children.get(*first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Text(_) => return None,
        };
    }
    Some(node)
}

pub fn element_ref<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a ElementNode> {
    node_ref(doc, path)?.as_element()
}

/// Children of the element at `path`; the document's roots for an empty path.
pub fn children_ref<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a [Node]> {
    if path.is_empty() {
        return Some(&doc.children);
    }
    Some(&element_ref(doc, path)?.children)
}

pub fn find_path_by_id(doc: &Document, id: &str) -> Option<Path> {
    fn walk(children: &[Node], id: &str, path: &mut Vec<usize>) -> Option<Path> {
        for (ix, node) in children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if el.id.as_deref() == Some(id) {
                return Some(path.clone());
            }
            if let Some(found) = walk(&el.children, id, path) {
                return Some(found);
            }
            path.pop();
        }
        None
    }
    walk(&doc.children, id, &mut Vec::new())
}

/// Ids of every element, in document order.
pub fn element_ids(doc: &Document) -> Vec<String> {
    let mut out = Vec::new();
    fn walk(children: &[Node], out: &mut Vec<String>) {
        for node in children {
            if let Node::Element(el) = node {
                if let Some(id) = &el.id {
                    out.push(id.clone());
                }
                walk(&el.children, out);
            }
        }
    }
    walk(&doc.children, &mut out);
    out
}

/// True when no element id appears twice.
pub fn ids_are_unique(doc: &Document) -> bool {
    let ids = element_ids(doc);
    let unique: HashSet<&String> = ids.iter().collect();
    unique.len() == ids.len()
}

fn children_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Vec<Node>, PathError> {
    let mut children = &mut doc.children;
    for (depth, &ix) in path.iter().enumerate() {
        let len = children.len();
        children = match children.get_mut(ix) {
            Some(Node::Element(el)) => &mut el.children,
            Some(Node::Text(_)) => {
                return Err(PathError(format!("Text node at depth {depth} has no children")));
            }
            None => {
                return Err(PathError(format!(
                    "Path out of bounds at depth {depth}: {ix} >= {len}"
                )));
            }
        };
    }
    Ok(children)
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let (ix, parent_path) = split_path(path)?;
    let children = children_mut(doc, parent_path)?;
    let len = children.len();
    children
        .get_mut(ix)
        .ok_or_else(|| PathError(format!("Path out of bounds: {ix} >= {len}")))
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        Node::Element(_) => Err(PathError("Expected Text node".into())),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let (ix, parent_path) = split_path(path)?;
    let children = children_mut(doc, parent_path)?;
    if ix > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {ix} > {}",
            children.len()
        )));
    }
    children.insert(ix, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let (ix, parent_path) = split_path(path)?;
    let children = children_mut(doc, parent_path)?;
    if ix >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {ix} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(ix))
}
