//! Path algebra: comparisons and how paths shift when the tree changes.

use crate::ops::Path;

pub fn parent(path: &[usize]) -> &[usize] {
    match path.split_last() {
        Some((_, parent)) => parent,
        None => path,
    }
}

pub fn child(path: &[usize], ix: usize) -> Path {
    let mut out = Vec::with_capacity(path.len() + 1);
    out.extend_from_slice(path);
    out.push(ix);
    out
}

pub fn next_sibling(path: &[usize]) -> Option<Path> {
    let (last, parent) = path.split_last()?;
    Some(child(parent, last + 1))
}

pub fn previous_sibling(path: &[usize]) -> Option<Path> {
    let (last, parent) = path.split_last()?;
    Some(child(parent, last.checked_sub(1)?))
}

/// `ancestor` is a strict prefix of `path`.
pub fn is_ancestor(ancestor: &[usize], path: &[usize]) -> bool {
    ancestor.len() < path.len() && path.starts_with(ancestor)
}

pub fn common_ancestor(a: &[usize], b: &[usize]) -> Path {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect()
}

/// `path` lies in the subtree rooted at `root` (or is `root`).
pub fn is_within(root: &[usize], path: &[usize]) -> bool {
    path.starts_with(root)
}

/// `path` shares `op`'s parent and sits at or after `op`'s index (or below such a sibling).
fn at_or_after(op: &[usize], path: &[usize]) -> bool {
    let Some((op_ix, op_parent)) = op.split_last() else {
        return false;
    };
    path.len() >= op.len() && path.starts_with(op_parent) && path[op_parent.len()] >= *op_ix
}

fn after(op: &[usize], path: &[usize]) -> bool {
    let Some((op_ix, op_parent)) = op.split_last() else {
        return false;
    };
    path.len() >= op.len() && path.starts_with(op_parent) && path[op_parent.len()] > *op_ix
}

/// A structural change to the tree, as seen by path transforms.
#[derive(Debug, Clone, Copy)]
pub enum PathChange<'a> {
    Inserted(&'a [usize]),
    Removed(&'a [usize]),
    Split { path: &'a [usize], position: usize },
    Merged { path: &'a [usize], position: usize },
    Moved { from: &'a [usize], to: &'a [usize] },
}

/// Maps `path` through `change`. `None` when the addressed node no longer exists.
pub fn transform_path(path: &[usize], change: PathChange<'_>) -> Option<Path> {
    let mut p = path.to_vec();
    match change {
        PathChange::Inserted(op) => {
            if !op.is_empty() && at_or_after(op, &p) {
                p[op.len() - 1] += 1;
            }
        }
        PathChange::Removed(op) => {
            if op.is_empty() || p.starts_with(op) {
                return None;
            }
            if after(op, &p) {
                p[op.len() - 1] -= 1;
            }
        }
        PathChange::Split { path: op, position } => {
            if op.is_empty() || p == op {
                return Some(p);
            }
            let depth = op.len() - 1;
            if is_ancestor(op, &p) {
                if p[op.len()] >= position {
                    p[depth] += 1;
                    p[op.len()] -= position;
                }
            } else if after(op, &p) {
                p[depth] += 1;
            }
        }
        PathChange::Merged { path: op, position } => {
            if op.is_empty() {
                return Some(p);
            }
            let depth = op.len() - 1;
            if p.starts_with(op) {
                p[depth] = p[depth].saturating_sub(1);
                if p.len() > op.len() {
                    p[op.len()] += position;
                }
            } else if after(op, &p) {
                p[depth] -= 1;
            }
        }
        PathChange::Moved { from, to } => {
            if p.starts_with(from) {
                let mut out = to.to_vec();
                out.extend_from_slice(&p[from.len()..]);
                return Some(out);
            }
            let removed = transform_path(&p, PathChange::Removed(from))?;
            return transform_path(&removed, PathChange::Inserted(to));
        }
    }
    Some(p)
}
