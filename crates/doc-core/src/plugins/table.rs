use serde_json::Value;

use crate::core::{Editor, Point, Selection, element_ref};
use crate::error::CommandError;
use crate::markup::{MarkupElement, MarkupNode};
use crate::node::{CellData, CellScope, Document, ElementKind, ElementNode, Node};
use crate::normalize::unwrap_ops;
use crate::ops::{NodePatch, Op, Path, Transaction};
use crate::path;
use crate::plugin::{
    Allowed, ChildrenRule, CommandSpec, DocPlugin, NodeRules, NodeSpec, NormalizePass,
    ParentRepair, ParentRule, PluginRegistry, SerializeOutcome, SlotRule, TEXT_BLOCKS,
};
use crate::plugins::{ancestor_path, insertion_point_after_focus};
use crate::table_headers::{
    GroupKind, MAX_COLSPAN, MAX_ROWSPAN, TableLayout, layout, solve_headers,
};

const GROUPS: &[&str] = &["table_caption", "table_head", "table_body"];

fn paragraph() -> Node {
    Node::paragraph("")
}

fn paragraph_kind() -> ElementKind {
    ElementKind::Paragraph
}

fn table() -> Node {
    Node::element(ElementKind::Table, Vec::new())
}

fn table_body() -> Node {
    Node::element(ElementKind::TableBody, Vec::new())
}

fn table_row() -> Node {
    Node::element(ElementKind::TableRow, Vec::new())
}

fn table_cell() -> Node {
    Node::table_cell(CellData::default(), Vec::new())
}

fn cell_for(group: GroupKind) -> Node {
    let data = match group {
        GroupKind::Head => CellData::header(),
        GroupKind::Body => CellData::default(),
    };
    Node::table_cell(data, vec![Node::paragraph("")])
}

fn group_rules(allowed_parent: &'static [&'static str], wrap: fn() -> Node) -> ParentRule {
    ParentRule {
        allowed: Allowed::Only(allowed_parent),
        repair: ParentRepair::Wrap(wrap),
    }
}

pub struct TablePlugin;

impl DocPlugin for TablePlugin {
    fn id(&self) -> &'static str {
        "table"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        let rows_only = Some(ChildrenRule {
            allowed: Allowed::Only(&["table_row"]),
            wrap: Some(table_row),
        });
        vec![
            NodeSpec::block("table").no_fill().rules(NodeRules {
                children: Some(ChildrenRule {
                    allowed: Allowed::Only(GROUPS),
                    wrap: Some(table_body),
                }),
                previous_sibling: Some(SlotRule::new(Allowed::Only(TEXT_BLOCKS), paragraph)),
                next_sibling: Some(SlotRule::new(Allowed::Only(TEXT_BLOCKS), paragraph)),
                ..NodeRules::default()
            }),
            NodeSpec::text_block("table_caption").rules(NodeRules {
                parent: Some(ParentRule {
                    allowed: Allowed::Only(&["table"]),
                    repair: ParentRepair::Coerce(paragraph_kind),
                }),
                ..NodeRules::default()
            }),
            NodeSpec::block("table_head").no_fill().rules(NodeRules {
                parent: Some(group_rules(&["table"], table)),
                children: rows_only,
                ..NodeRules::default()
            }),
            NodeSpec::block("table_body").no_fill().rules(NodeRules {
                parent: Some(group_rules(&["table"], table)),
                children: rows_only,
                ..NodeRules::default()
            }),
            NodeSpec::block("table_row").no_fill().rules(NodeRules {
                parent: Some(group_rules(&["table_head", "table_body"], table_body)),
                children: Some(ChildrenRule {
                    allowed: Allowed::Only(&["table_cell"]),
                    wrap: Some(table_cell),
                }),
                ..NodeRules::default()
            }),
            NodeSpec::block("table_cell").rules(NodeRules {
                parent: Some(group_rules(&["table_row"], table_row)),
                ..NodeRules::default()
            }),
        ]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(TableStructure), Box::new(TableHeaders)]
    }

    fn serialize(&self, el: &ElementNode, children: &[MarkupNode]) -> SerializeOutcome {
        let out = match &el.kind {
            ElementKind::Table => MarkupElement::new("table"),
            ElementKind::TableCaption => MarkupElement::new("caption"),
            ElementKind::TableHead => MarkupElement::new("thead"),
            ElementKind::TableBody => MarkupElement::new("tbody"),
            ElementKind::TableRow => MarkupElement::new("tr"),
            ElementKind::TableCell(data) => cell_markup(data),
            _ => return SerializeOutcome::Pass,
        };
        SerializeOutcome::Emit(vec![out.with_children(children.to_vec()).into_node()])
    }

    fn deserialize(&self, el: &MarkupElement, children: &[Node]) -> Option<Vec<Node>> {
        let kind = match el.tag.as_str() {
            "table" => ElementKind::Table,
            "caption" => ElementKind::TableCaption,
            "thead" => ElementKind::TableHead,
            "tbody" | "tfoot" => ElementKind::TableBody,
            "tr" => ElementKind::TableRow,
            "th" | "td" => ElementKind::TableCell(cell_data(el)),
            _ => return None,
        };
        Some(vec![Node::element(kind, children.to_vec())])
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("table.insert", "Insert table", |editor, args| {
                let arg = |key: &str, default: u64| {
                    args.as_ref()
                        .and_then(|v| v.get(key))
                        .and_then(Value::as_u64)
                        .unwrap_or(default)
                        .max(1) as usize
                };
                let rows = arg("rows", 2);
                let cols = arg("cols", 2);
                let header = args
                    .as_ref()
                    .and_then(|v| v.get("header"))
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let at = insertion_point_after_focus(editor)
                    .ok_or_else(|| CommandError::new("No block to insert after"))?;
                // table > group > row > cell > paragraph > text
                let mut caret = at.clone();
                caret.extend([0, 0, 0, 0, 0]);
                let tx = Transaction::new(vec![Op::InsertNode {
                    path: at,
                    node: new_table(rows, cols, header),
                }])
                .selection_after(Selection::collapsed(Point::new(caret, 0)))
                .source("table.insert");
                editor.apply(tx).map_err(CommandError::from)
            })
            .description("Insert a table after the current block.")
            .keywords(["table", "grid", "rows", "columns"])
            .args_example(serde_json::json!({ "rows": 3, "cols": 2, "header": true })),
            CommandSpec::new("table.insert_row_below", "Insert row below", |editor, _| {
                let at = CellAt::focus(editor)?;
                let group = at.placement_group();
                let mut row = table_row();
                if let Node::Element(el) = &mut row {
                    el.children.push(cell_for(group));
                }
                let path = path::next_sibling(&at.row_path())
                    .ok_or_else(|| CommandError::new("Row has no parent"))?;
                let tx = Transaction::new(vec![Op::InsertNode { path, node: row }])
                    .source("table.insert_row_below");
                editor.apply(tx).map_err(CommandError::from)
            })
            .description("Insert an empty row below the current one.")
            .keywords(["table", "row"]),
            CommandSpec::new("table.insert_col_right", "Insert column right", |editor, _| {
                let at = CellAt::focus(editor)?;
                let ops = at.insert_column_ops();
                editor
                    .apply(Transaction::new(ops).source("table.insert_col_right"))
                    .map_err(CommandError::from)
            })
            .description("Insert an empty column right of the current one.")
            .keywords(["table", "column"]),
            CommandSpec::new("table.delete_row", "Delete row", |editor, _| {
                let at = CellAt::focus(editor)?;
                let tx = Transaction::new(vec![Op::RemoveNode {
                    path: at.row_path(),
                }])
                .source("table.delete_row");
                editor.apply(tx).map_err(CommandError::from)
            })
            .description("Delete the current row.")
            .keywords(["table", "row", "remove"]),
            CommandSpec::new("table.delete_col", "Delete column", |editor, _| {
                let at = CellAt::focus(editor)?;
                let ops = at.delete_column_ops();
                editor
                    .apply(Transaction::new(ops).source("table.delete_col"))
                    .map_err(CommandError::from)
            })
            .description("Delete the current column.")
            .keywords(["table", "column", "remove"]),
        ]
    }
}

fn cell_markup(data: &CellData) -> MarkupElement {
    let mut out = MarkupElement::new(if data.header { "th" } else { "td" });
    if let Some(id) = &data.header_id {
        out = out.with_attr("id", id.clone());
    }
    if let Some(scope) = data.scope {
        out = out.with_attr("scope", scope.as_str());
    }
    if let Some(headers) = &data.headers {
        out = out.with_attr("headers", headers.clone());
    }
    if data.colspan != 1 {
        out = out.with_attr("colspan", data.colspan.to_string());
    }
    if data.rowspan != 1 {
        out = out.with_attr("rowspan", data.rowspan.to_string());
    }
    if let Some(align) = &data.align {
        out = out.with_attr("align", align.clone());
    }
    out
}

fn cell_data(el: &MarkupElement) -> CellData {
    let span = |key: &str, max: u32| {
        el.attr(key)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(1)
            .clamp(1, max)
    };
    let non_empty = |key: &str| {
        el.attr(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    CellData {
        header: el.tag == "th",
        scope: el.attr("scope").and_then(CellScope::parse),
        colspan: span("colspan", MAX_COLSPAN),
        rowspan: span("rowspan", MAX_ROWSPAN),
        header_id: non_empty("id"),
        headers: non_empty("headers"),
        align: non_empty("align"),
    }
}

fn new_table(rows: usize, cols: usize, header: bool) -> Node {
    let row = |group: GroupKind| {
        Node::element(
            ElementKind::TableRow,
            (0..cols).map(|_| cell_for(group)).collect(),
        )
    };
    let mut groups = Vec::new();
    if header {
        groups.push(Node::element(
            ElementKind::TableHead,
            vec![row(GroupKind::Head)],
        ));
    }
    groups.push(Node::element(
        ElementKind::TableBody,
        (0..rows).map(|_| row(GroupKind::Body)).collect(),
    ));
    Node::element(ElementKind::Table, groups)
}

/// Keeps tables in shape: caption first, head before body, no empty rows or
/// groups, rows padded to the grid width. A table without rows is unwrapped.
struct TableStructure;

impl NormalizePass for TableStructure {
    fn id(&self) -> &'static str {
        "table.structure"
    }

    fn normalize(
        &self,
        _doc: &Document,
        el: &ElementNode,
        path: &[usize],
        _registry: &PluginRegistry,
    ) -> Option<Vec<Op>> {
        if el.type_name() != "table" {
            return None;
        }
        // Stray children are wrapped by the table's children rule first.
        if !el.children.iter().all(|c| GROUPS.contains(&c.type_name())) {
            return None;
        }
        let at = |ix: usize| path::child(path, ix);
        let kinds: Vec<&str> = el.children.iter().map(Node::type_name).collect();

        let row_count: usize = el
            .children
            .iter()
            .filter(|c| c.type_name() != "table_caption")
            .filter_map(Node::as_element)
            .map(|group| group.children.len())
            .sum();
        if row_count == 0 {
            if let Some(ix) = kinds.iter().position(|k| *k != "table_caption") {
                return Some(vec![Op::RemoveNode { path: at(ix) }]);
            }
            return Some(unwrap_ops(path, el.children.len()));
        }

        let captions: Vec<usize> = positions(&kinds, "table_caption");
        if let Some(&first) = captions.first() {
            if first != 0 {
                return Some(vec![Op::MoveNode {
                    path: at(first),
                    new_path: at(0),
                }]);
            }
        }
        if let Some(&extra) = captions.get(1) {
            return Some(vec![Op::MoveNode {
                path: at(extra),
                new_path: path::next_sibling(path)?,
            }]);
        }

        let first_body = kinds.iter().position(|k| *k == "table_body");
        let late_head = kinds.iter().rposition(|k| *k == "table_head");
        if let (Some(body), Some(head)) = (first_body, late_head) {
            if head > body {
                return Some(vec![Op::MoveNode {
                    path: at(head),
                    new_path: at(body),
                }]);
            }
        }

        for (group_ix, group) in el.children.iter().enumerate() {
            let Node::Element(group) = group else {
                continue;
            };
            if group.type_name() == "table_caption" {
                continue;
            }
            if group.children.is_empty() {
                return Some(vec![Op::RemoveNode { path: at(group_ix) }]);
            }
            for (row_ix, row) in group.children.iter().enumerate() {
                let empty = row.as_element().is_some_and(|r| r.children.is_empty());
                if empty {
                    return Some(vec![Op::RemoveNode {
                        path: path::child(&at(group_ix), row_ix),
                    }]);
                }
            }
        }

        pad_rows(el, path, &layout(el))
    }
}

fn positions(kinds: &[&str], kind: &str) -> Vec<usize> {
    kinds
        .iter()
        .enumerate()
        .filter(|(_, k)| **k == kind)
        .map(|(ix, _)| ix)
        .collect()
}

fn pad_rows(el: &ElementNode, table_path: &[usize], grid: &TableLayout) -> Option<Vec<Op>> {
    let mut ops = Vec::new();
    for row in &grid.rows {
        if row.filled >= grid.width {
            continue;
        }
        let mut row_path = table_path.to_vec();
        row_path.extend_from_slice(&row.path);
        let len = row_cells(el, &row.path).map_or(0, <[Node]>::len);
        for k in 0..grid.width - row.filled {
            ops.push(Op::InsertNode {
                path: path::child(&row_path, len + k),
                node: cell_for(row.group),
            });
        }
    }
    (!ops.is_empty()).then_some(ops)
}

fn row_cells<'a>(table: &'a ElementNode, rel: &[usize]) -> Option<&'a [Node]> {
    let [group, row] = rel else {
        return None;
    };
    let group = table.children.get(*group)?.as_element()?;
    Some(&group.children.get(*row)?.as_element()?.children)
}

/// Rewrites header ids, scopes and `headers` lists from the table's grid.
struct TableHeaders;

impl NormalizePass for TableHeaders {
    fn id(&self) -> &'static str {
        "table.headers"
    }

    fn normalize(
        &self,
        _doc: &Document,
        el: &ElementNode,
        path: &[usize],
        _registry: &PluginRegistry,
    ) -> Option<Vec<Op>> {
        if el.type_name() != "table" {
            return None;
        }
        let ops: Vec<Op> = solve_headers(el)
            .into_iter()
            .map(|(rel, data)| {
                let mut cell = path.to_vec();
                cell.extend(rel);
                Op::SetNodeProperties {
                    path: cell,
                    patch: NodePatch::kind(ElementKind::TableCell(data)),
                }
            })
            .collect();
        (!ops.is_empty()).then_some(ops)
    }
}

/// The table cell holding the editor's focus.
struct CellAt {
    table: Path,
    el: ElementNode,
    grid: TableLayout,
    /// Table-relative: group, row, cell.
    rel: Path,
}

impl CellAt {
    fn focus(editor: &Editor) -> Result<Self, CommandError> {
        let doc = editor.doc();
        let focus = &editor.selection().focus.path;
        let missing = || CommandError::new("Selection is not in a table cell");
        let cell = ancestor_path(doc, focus, "table_cell").ok_or_else(missing)?;
        let table = ancestor_path(doc, &cell, "table").ok_or_else(missing)?;
        let el = element_ref(doc, &table).ok_or_else(missing)?;
        Ok(Self {
            rel: cell[table.len()..].to_vec(),
            grid: layout(el),
            el: el.clone(),
            table,
        })
    }

    fn absolute(&self, rel: &[usize]) -> Path {
        let mut out = self.table.clone();
        out.extend_from_slice(rel);
        out
    }

    fn row_path(&self) -> Path {
        self.absolute(&self.rel[..2])
    }

    fn placement_group(&self) -> GroupKind {
        self.grid
            .cell_at(&self.rel)
            .map_or(GroupKind::Body, |cell| cell.group)
    }

    /// Last grid column covered by the focused cell.
    fn last_col(&self) -> usize {
        self.grid
            .cell_at(&self.rel)
            .map_or(0, |cell| cell.col + cell.colspan - 1)
    }

    fn insert_column_ops(&self) -> Vec<Op> {
        let col = self.last_col();
        self.grid
            .rows
            .iter()
            .map(|row| {
                let after = self
                    .grid
                    .cells
                    .iter()
                    .filter(|cell| cell.path[..2] == row.path[..] && cell.col <= col)
                    .map(|cell| cell.path[2] + 1)
                    .max()
                    .unwrap_or(0);
                Op::InsertNode {
                    path: self.absolute(&path::child(&row.path, after)),
                    node: cell_for(row.group),
                }
            })
            .collect()
    }

    fn delete_column_ops(&self) -> Vec<Op> {
        let col = self.last_col();
        let mut ops = Vec::new();
        // Cells are listed in row order; reverse keeps earlier paths valid.
        for cell in self.grid.cells.iter().rev() {
            if cell.col > col || col >= cell.col + cell.colspan {
                continue;
            }
            let path = self.absolute(&cell.path);
            if cell.colspan > 1 {
                let Some(mut data) = self.cell_data(&cell.path) else {
                    continue;
                };
                data.colspan = cell.colspan as u32 - 1;
                ops.push(Op::SetNodeProperties {
                    path,
                    patch: NodePatch::kind(ElementKind::TableCell(data)),
                });
            } else {
                ops.push(Op::RemoveNode { path });
            }
        }
        ops
    }

    fn cell_data(&self, rel: &[usize]) -> Option<CellData> {
        let (cell, row) = rel.split_last()?;
        let cells = row_cells(&self.el, row)?;
        cells.get(*cell)?.as_element()?.kind.cell().cloned()
    }
}
