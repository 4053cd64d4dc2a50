//! Fixpoint repair of the document tree.
//!
//! Each scan walks the changed region children-first, then the region's
//! ancestors, then the document root, and stops at the first element that
//! needs a repair. The repair is applied and the scan restarts until a full
//! scan comes back clean.

use tracing::{debug, error, warn};

use crate::core::{EditorConfig, Selection, apply_op_to, children_ref, element_ref, op_regions};
use crate::error::EditError;
use crate::node::{Document, ElementKind, ElementNode, Node};
use crate::ops::{NodePatch, Op, Path};
use crate::path::{self, child};
use crate::plugin::{ChildConstraint, DOCUMENT, NodeSpec, ParentRepair, PluginRegistry, SlotRule};

/// Extra repairs granted per element on top of `max_normalize_iterations`.
const PER_ELEMENT_BUDGET: usize = 8;

struct Repair {
    rule: &'static str,
    at: Path,
    ops: Vec<Op>,
}

/// Repairs `doc` until no rule fires. Returns the number of repairs applied.
pub fn normalize(
    doc: &mut Document,
    selection: &mut Selection,
    region: Path,
    registry: &PluginRegistry,
    config: &EditorConfig,
) -> Result<usize, EditError> {
    let budget =
        config.max_normalize_iterations + PER_ELEMENT_BUDGET * count_elements(&doc.children);
    let mut region = region;
    let mut repairs = 0usize;

    loop {
        if !region.is_empty() && element_ref(doc, &region).is_none() {
            region = Vec::new();
        }
        let Some(repair) = find_repair(doc, &region, registry) else {
            return Ok(repairs);
        };
        if repairs >= budget {
            warn!(?region, repairs, rule = repair.rule, "normalization did not settle");
            return Err(EditError::NormalizationDeadlock {
                region,
                iterations: repairs,
            });
        }

        debug!(rule = repair.rule, path = ?repair.at, ops = repair.ops.len(), "normalization repair");
        for op in repair.ops {
            for touched in op_regions(&op) {
                if !path::is_within(&region, &touched) {
                    region = path::common_ancestor(&region, &touched);
                }
            }
            apply_op_to(doc, selection, op, registry)?;
        }
        repairs += 1;
    }
}

/// True when no rule would fire anywhere in `doc`.
pub fn is_normalized(doc: &Document, registry: &PluginRegistry) -> bool {
    find_repair(doc, &[], registry).is_none()
}

fn count_elements(children: &[Node]) -> usize {
    children
        .iter()
        .map(|node| match node {
            Node::Element(el) => 1 + count_elements(&el.children),
            Node::Text(_) => 0,
        })
        .sum()
}

fn find_repair(doc: &Document, region: &[usize], registry: &PluginRegistry) -> Option<Repair> {
    if region.is_empty() {
        if let Some(repair) = scan(doc, &doc.children, &mut Vec::new(), DOCUMENT, registry) {
            return Some(repair);
        }
    } else {
        if let Some(repair) = check_subtree(doc, region, registry) {
            return Some(repair);
        }
        for depth in (1..region.len()).rev() {
            if let Some(repair) = check_at(doc, &region[..depth], registry) {
                return Some(repair);
            }
        }
    }
    check_document(doc, registry)
}

fn check_subtree(doc: &Document, at: &[usize], registry: &PluginRegistry) -> Option<Repair> {
    let el = element_ref(doc, at)?;
    let mut path = at.to_vec();
    if let Some(repair) = scan(doc, &el.children, &mut path, el.type_name(), registry) {
        return Some(repair);
    }
    check_at(doc, at, registry)
}

fn check_at(doc: &Document, at: &[usize], registry: &PluginRegistry) -> Option<Repair> {
    let el = element_ref(doc, at)?;
    let parent_path = path::parent(at);
    let parent = if parent_path.is_empty() {
        DOCUMENT
    } else {
        element_ref(doc, parent_path)?.type_name()
    };
    let siblings = children_ref(doc, parent_path)?;
    let site = Site {
        doc,
        el,
        path: at,
        parent,
        siblings,
        index: *at.last()?,
    };
    check_element(&site, registry).map(|(rule, ops)| Repair {
        rule,
        at: at.to_vec(),
        ops,
    })
}

fn scan(
    doc: &Document,
    children: &[Node],
    path: &mut Vec<usize>,
    parent: &'static str,
    registry: &PluginRegistry,
) -> Option<Repair> {
    for (ix, node) in children.iter().enumerate() {
        let Node::Element(el) = node else {
            continue;
        };
        path.push(ix);
        if let Some(repair) = scan(doc, &el.children, path, el.type_name(), registry) {
            return Some(repair);
        }
        let site = Site {
            doc,
            el,
            path: path.as_slice(),
            parent,
            siblings: children,
            index: ix,
        };
        if let Some((rule, ops)) = check_element(&site, registry) {
            return Some(Repair {
                rule,
                at: path.clone(),
                ops,
            });
        }
        path.pop();
    }
    None
}

struct Site<'a> {
    doc: &'a Document,
    el: &'a ElementNode,
    path: &'a [usize],
    parent: &'a str,
    siblings: &'a [Node],
    index: usize,
}

fn check_element(site: &Site<'_>, registry: &PluginRegistry) -> Option<(&'static str, Vec<Op>)> {
    let el = site.el;
    let Some(spec) = registry.node_spec(el.type_name()) else {
        return Some(("unwrap_unknown", unwrap_ops(site.path, el.children.len())));
    };

    if spec.is_void {
        return check_void(site).map(|ops| ("void_reset", ops));
    }

    if let Some(ops) = check_parent(site, spec) {
        return Some(("parent", ops));
    }

    for pass in registry.normalize_passes() {
        let Some(ops) = pass.normalize(site.doc, el, site.path, registry) else {
            continue;
        };
        debug_assert!(
            !ops.is_empty(),
            "normalize pass {} claimed a repair without operations",
            pass.id()
        );
        if ops.is_empty() {
            error!(pass = pass.id(), path = ?site.path, "empty repair skipped");
            continue;
        }
        return Some((pass.id(), ops));
    }

    if let Some(ops) = check_children(site, spec, registry) {
        return Some(("children", ops));
    }

    let content = match spec.children {
        ChildConstraint::BlockOnly => check_block_content(site, spec, registry),
        ChildConstraint::InlineOnly => check_inline_content(site, registry),
        ChildConstraint::None => None,
    };
    if let Some(ops) = content {
        return Some(("content", ops));
    }

    if let Some(rule) = &spec.rules.first_child {
        let first = el.children.first().map(|node| (0, node));
        if let Some(ops) = check_slot(site, rule, first, 0, registry) {
            return Some(("first_child", ops));
        }
    }
    if let Some(rule) = &spec.rules.last_child {
        let len = el.children.len();
        let last = el.children.last().map(|node| (len - 1, node));
        if let Some(ops) = check_slot(site, rule, last, len, registry) {
            return Some(("last_child", ops));
        }
    }

    if let Some(rule) = &spec.rules.previous_sibling {
        if site.index > 0 {
            let previous = &site.siblings[site.index - 1];
            if !rule.allowed.permits(previous.type_name()) {
                return Some((
                    "previous_sibling",
                    vec![Op::InsertNode {
                        path: site.path.to_vec(),
                        node: (rule.default)(),
                    }],
                ));
            }
        }
    }
    if let Some(rule) = &spec.rules.next_sibling {
        if let Some(next) = site.siblings.get(site.index + 1) {
            if !rule.allowed.permits(next.type_name()) {
                let at = path::next_sibling(site.path)?;
                return Some((
                    "next_sibling",
                    vec![Op::InsertNode {
                        path: at,
                        node: (rule.default)(),
                    }],
                ));
            }
        }
    }

    None
}

fn check_void(site: &Site<'_>) -> Option<Vec<Op>> {
    let children = &site.el.children;
    let valid = children.len() == 1
        && matches!(&children[0], Node::Text(t) if t.text.is_empty() && t.marks.is_empty());
    if valid {
        return None;
    }
    let mut ops: Vec<Op> = (0..children.len())
        .rev()
        .map(|ix| Op::RemoveNode {
            path: child(site.path, ix),
        })
        .collect();
    ops.push(Op::InsertNode {
        path: child(site.path, 0),
        node: Node::text(""),
    });
    Some(ops)
}

fn check_parent(site: &Site<'_>, spec: &NodeSpec) -> Option<Vec<Op>> {
    let rule = spec.rules.parent.as_ref()?;
    if rule.allowed.permits(site.parent) {
        return None;
    }
    let ops = match rule.repair {
        ParentRepair::Unwrap => unwrap_ops(site.path, site.el.children.len()),
        ParentRepair::Coerce(kind) => vec![Op::SetNodeProperties {
            path: site.path.to_vec(),
            patch: NodePatch::kind(kind()),
        }],
        ParentRepair::Wrap(wrapper) => {
            let name = site.el.type_name();
            let run = site.siblings[site.index..]
                .iter()
                .take_while(|node| node.type_name() == name)
                .count();
            wrap_ops(path::parent(site.path), site.index, run, wrapper())
        }
    };
    Some(ops)
}

fn check_children(site: &Site<'_>, spec: &NodeSpec, registry: &PluginRegistry) -> Option<Vec<Op>> {
    let rule = spec.rules.children.as_ref()?;
    let children = &site.el.children;
    for (ix, node) in children.iter().enumerate() {
        if rule.allowed.permits(node.type_name()) {
            continue;
        }
        if matches!(node, Node::Text(t) if t.text.trim().is_empty()) {
            return Some(vec![Op::RemoveNode {
                path: child(site.path, ix),
            }]);
        }
        if let Node::Element(inner) = node {
            let liftable = !registry.is_void(inner.type_name())
                && !inner.children.is_empty()
                && inner
                    .children
                    .iter()
                    .all(|c| rule.allowed.permits(c.type_name()));
            if liftable {
                return Some(unwrap_ops(&child(site.path, ix), inner.children.len()));
            }
        }
        if let Some(wrapper) = rule.wrap {
            let run = children[ix..]
                .iter()
                .take_while(|node| !rule.allowed.permits(node.type_name()))
                .count();
            return Some(wrap_ops(site.path, ix, run, wrapper()));
        }
    }
    None
}

fn check_block_content(
    site: &Site<'_>,
    spec: &NodeSpec,
    registry: &PluginRegistry,
) -> Option<Vec<Op>> {
    let children = &site.el.children;
    if children.is_empty() {
        let fill = spec.fill?;
        return Some(vec![Op::InsertNode {
            path: child(site.path, 0),
            node: fill(),
        }]);
    }

    let start = children.iter().position(|node| registry.is_inline_node(node))?;
    let run = &children[start..];
    let len = run
        .iter()
        .take_while(|node| registry.is_inline_node(node))
        .count();
    let all_empty = run[..len]
        .iter()
        .all(|node| matches!(node, Node::Text(t) if t.text.is_empty()));
    if all_empty {
        return Some(
            (start..start + len)
                .rev()
                .map(|ix| Op::RemoveNode {
                    path: child(site.path, ix),
                })
                .collect(),
        );
    }
    Some(wrap_ops(
        site.path,
        start,
        len,
        Node::element(ElementKind::Paragraph, Vec::new()),
    ))
}

fn check_inline_content(site: &Site<'_>, registry: &PluginRegistry) -> Option<Vec<Op>> {
    let children = &site.el.children;
    if children.is_empty() {
        return Some(vec![Op::InsertNode {
            path: child(site.path, 0),
            node: Node::text(""),
        }]);
    }

    let last = children.len() - 1;
    for (ix, node) in children.iter().enumerate() {
        let Node::Element(el) = node else {
            continue;
        };
        if registry.is_inline(el.type_name()) {
            continue;
        }
        // Blocks inside inline content move out next to their host.
        let op = if ix == 0 {
            Op::MoveNode {
                path: child(site.path, 0),
                new_path: site.path.to_vec(),
            }
        } else if ix == last {
            Op::MoveNode {
                path: child(site.path, ix),
                new_path: path::next_sibling(site.path)?,
            }
        } else {
            Op::SplitNode {
                path: site.path.to_vec(),
                position: ix,
            }
        };
        return Some(vec![op]);
    }

    for (ix, node) in children.iter().enumerate() {
        if node.as_element().is_none() {
            continue;
        }
        let text_before = ix > 0 && children[ix - 1].as_text().is_some();
        if !text_before {
            return Some(vec![Op::InsertNode {
                path: child(site.path, ix),
                node: Node::text(""),
            }]);
        }
        let text_after = children.get(ix + 1).is_some_and(|n| n.as_text().is_some());
        if !text_after {
            return Some(vec![Op::InsertNode {
                path: child(site.path, ix + 1),
                node: Node::text(""),
            }]);
        }
    }

    for ix in 1..children.len() {
        if let (Node::Text(a), Node::Text(b)) = (&children[ix - 1], &children[ix]) {
            if a.marks == b.marks {
                return Some(vec![Op::MergeNode {
                    path: child(site.path, ix),
                }]);
            }
        }
    }

    if children.len() > 1 {
        for (ix, node) in children.iter().enumerate() {
            let Node::Text(t) = node else {
                continue;
            };
            if !t.text.is_empty() {
                continue;
            }
            let element_before = ix > 0 && children[ix - 1].as_element().is_some();
            let element_after = children.get(ix + 1).is_some_and(|n| n.as_element().is_some());
            if !element_before && !element_after {
                return Some(vec![Op::RemoveNode {
                    path: child(site.path, ix),
                }]);
            }
        }
    }

    None
}

fn check_slot(
    site: &Site<'_>,
    rule: &SlotRule,
    current: Option<(usize, &Node)>,
    insert_at: usize,
    registry: &PluginRegistry,
) -> Option<Vec<Op>> {
    let insert = || {
        vec![Op::InsertNode {
            path: child(site.path, insert_at),
            node: (rule.default)(),
        }]
    };
    let Some((current_ix, current)) = current else {
        return Some(insert());
    };
    if rule.allowed.permits(current.type_name()) {
        return None;
    }
    if let (Some(coerce), Node::Element(el)) = (rule.coerce, current) {
        let retypable = registry
            .node_spec(el.type_name())
            .is_some_and(|spec| spec.children == ChildConstraint::InlineOnly && !spec.is_void);
        if retypable {
            return Some(vec![Op::SetNodeProperties {
                path: child(site.path, current_ix),
                patch: NodePatch::kind(coerce()),
            }]);
        }
    }
    Some(insert())
}

fn check_document(doc: &Document, registry: &PluginRegistry) -> Option<Repair> {
    let root = |ops: Vec<Op>, rule: &'static str| {
        Some(Repair {
            rule,
            at: Vec::new(),
            ops,
        })
    };
    if !registry.is_known_kind("section") {
        return None;
    }
    if doc.children.is_empty() {
        return root(
            vec![Op::InsertNode {
                path: vec![0],
                node: Node::section(vec![Node::paragraph("")]),
            }],
            "document_not_empty",
        );
    }
    let start = doc
        .children
        .iter()
        .position(|node| node.type_name() != "section")?;
    if matches!(&doc.children[start], Node::Text(t) if t.text.trim().is_empty()) {
        return root(vec![Op::RemoveNode { path: vec![start] }], "document_drop_text");
    }
    let len = doc.children[start..]
        .iter()
        .take_while(|node| node.type_name() != "section")
        .count();
    root(
        wrap_ops(&[], start, len, Node::section(Vec::new())),
        "document_sections",
    )
}

/// Replaces the element at `at` with its `child_count` children.
pub(crate) fn unwrap_ops(at: &[usize], child_count: usize) -> Vec<Op> {
    let parent = path::parent(at);
    let Some(&ix) = at.last() else {
        return Vec::new();
    };
    let mut ops: Vec<Op> = (0..child_count)
        .map(|k| Op::MoveNode {
            path: child(&child(parent, ix + k), 0),
            new_path: child(parent, ix + k),
        })
        .collect();
    ops.push(Op::RemoveNode {
        path: child(parent, ix + child_count),
    });
    ops
}

/// Moves `len` children of `parent` starting at `start` into `wrapper`.
pub(crate) fn wrap_ops(parent: &[usize], start: usize, len: usize, wrapper: Node) -> Vec<Op> {
    let mut wrapper = wrapper;
    if let Node::Element(el) = &mut wrapper {
        el.children.clear();
    }
    let wrapper_path = child(parent, start);
    let mut ops = vec![Op::InsertNode {
        path: wrapper_path.clone(),
        node: wrapper,
    }];
    ops.extend((0..len).map(|k| Op::MoveNode {
        path: child(parent, start + 1),
        new_path: child(&wrapper_path, k),
    }));
    ops
}
