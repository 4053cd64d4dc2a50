use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::Selection;
use crate::node::{ElementKind, Marks, Node};

pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        #[serde(default)]
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        #[serde(default)]
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        #[serde(default)]
        path: Path,
        node: Node,
    },
    RemoveNode {
        #[serde(default)]
        path: Path,
    },
    SetNodeProperties {
        #[serde(default)]
        path: Path,
        patch: NodePatch,
    },
    /// Splits a text node at a byte offset, or an element at a child index.
    SplitNode {
        #[serde(default)]
        path: Path,
        position: usize,
    },
    /// Merges the node at `path` into its previous sibling.
    MergeNode {
        #[serde(default)]
        path: Path,
    },
    /// `new_path` is where the node sits once the move is done.
    MoveNode {
        #[serde(default)]
        path: Path,
        new_path: Path,
    },
}

impl Op {
    pub fn path(&self) -> &[usize] {
        match self {
            Op::InsertText { path, .. }
            | Op::RemoveText { path, .. }
            | Op::InsertNode { path, .. }
            | Op::RemoveNode { path }
            | Op::SetNodeProperties { path, .. }
            | Op::SplitNode { path, .. }
            | Op::MergeNode { path }
            | Op::MoveNode { path, .. } => path,
        }
    }

    pub fn set_kind(path: Path, kind: ElementKind) -> Self {
        Op::SetNodeProperties {
            path,
            patch: NodePatch::kind(kind),
        }
    }
}

/// Property changes for `Op::SetNodeProperties`. `kind` applies to elements,
/// `marks` to text nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ElementKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Marks>,
}

impl NodePatch {
    pub fn kind(kind: ElementKind) -> Self {
        Self {
            kind: Some(kind),
            marks: None,
        }
    }

    pub fn marks(marks: Marks) -> Self {
        Self {
            kind: None,
            marks: Some(marks),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.marks.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
