//! Grid layout of a table and the header cross-references derived from it.
//!
//! Column headers are the cells of `thead` rows and get ids `"{row:02}{col:02}"`.
//! A header cell opening a body row is a row header with id `"r{n}"`, `n`
//! counting body rows from one. Every data cell lists the headers whose
//! columns or rows it shares.

use std::collections::BTreeSet;

use tracing::warn;

use crate::node::{CellData, CellScope, ElementNode, Node};
use crate::ops::Path;

/// Largest `colspan` a cell may claim, as in HTML.
pub const MAX_COLSPAN: u32 = 1000;
/// Largest `rowspan` a cell may claim, as in HTML.
pub const MAX_ROWSPAN: u32 = 65534;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Head,
    Body,
}

impl GroupKind {
    fn of(el: &ElementNode) -> Option<Self> {
        match el.type_name() {
            "table_head" => Some(GroupKind::Head),
            "table_body" => Some(GroupKind::Body),
            _ => None,
        }
    }
}

/// Where one cell lands in the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPlacement {
    /// Path relative to the table: group, row, cell.
    pub path: Path,
    pub group: GroupKind,
    pub row: usize,
    pub col: usize,
    pub colspan: usize,
    /// Clamped to the rows left in the cell's group.
    pub rowspan: usize,
    /// 1-based index among body rows.
    pub body_row: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    /// Path relative to the table: group, row.
    pub path: Path,
    pub group: GroupKind,
    /// Grid slots of this row covered by some cell.
    pub filled: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLayout {
    pub cells: Vec<CellPlacement>,
    pub rows: Vec<RowLayout>,
    pub width: usize,
}

impl TableLayout {
    pub fn cell_at(&self, path: &[usize]) -> Option<&CellPlacement> {
        self.cells.iter().find(|cell| cell.path == path)
    }
}

fn cell_data(node: &Node) -> Option<&CellData> {
    node.as_element()?.kind.cell()
}

/// Lays out the rows of `table`'s head and body groups on a grid.
pub fn layout(table: &ElementNode) -> TableLayout {
    let mut out = TableLayout::default();
    let mut occupied: Vec<Vec<bool>> = Vec::new();
    let mut grid_row = 0usize;
    let mut body_rows = 0usize;

    for (group_ix, group_node) in table.children.iter().enumerate() {
        let Some(group_el) = group_node.as_element() else {
            continue;
        };
        let Some(group) = GroupKind::of(group_el) else {
            continue;
        };
        let group_len = group_el.children.len();

        for (row_ix, row_node) in group_el.children.iter().enumerate() {
            if occupied.len() <= grid_row {
                occupied.resize_with(grid_row + 1, Vec::new);
            }
            let body_row = match group {
                GroupKind::Body => {
                    body_rows += 1;
                    Some(body_rows)
                }
                GroupKind::Head => None,
            };

            let cells = row_node
                .as_element()
                .map(|row| row.children.as_slice())
                .unwrap_or_default();
            let mut col = 0usize;
            for (cell_ix, cell_node) in cells.iter().enumerate() {
                let Some(data) = cell_data(cell_node) else {
                    continue;
                };
                while occupied[grid_row].get(col).copied().unwrap_or(false) {
                    col += 1;
                }
                let colspan = data.colspan.clamp(1, MAX_COLSPAN) as usize;
                let rowspan = (data.rowspan.clamp(1, MAX_ROWSPAN) as usize).min(group_len - row_ix);

                for r in grid_row..grid_row + rowspan {
                    if occupied.len() <= r {
                        occupied.resize_with(r + 1, Vec::new);
                    }
                    let line = &mut occupied[r];
                    if line.len() < col + colspan {
                        line.resize(col + colspan, false);
                    }
                    for slot in &mut line[col..col + colspan] {
                        *slot = true;
                    }
                }

                out.cells.push(CellPlacement {
                    path: vec![group_ix, row_ix, cell_ix],
                    group,
                    row: grid_row,
                    col,
                    colspan,
                    rowspan,
                    body_row,
                });
                col += colspan;
            }

            out.rows.push(RowLayout {
                path: vec![group_ix, row_ix],
                group,
                filled: 0,
            });
            grid_row += 1;
        }
    }

    for (ix, row) in out.rows.iter_mut().enumerate() {
        let line = occupied.get(ix).map(Vec::as_slice).unwrap_or_default();
        row.filled = line.iter().filter(|slot| **slot).count();
        out.width = out.width.max(line.len());
    }
    out
}

/// The cell data every cell of `table` should carry. Only cells whose data
/// differs from the current one are returned, keyed by table-relative path.
pub fn solve_headers(table: &ElementNode) -> Vec<(Path, CellData)> {
    let grid = layout(table);

    struct Header {
        id: String,
        scope: CellScope,
        first: usize,
        last: usize,
    }

    let mut headers: Vec<Header> = Vec::new();
    let mut head_rows: Vec<usize> = Vec::new();
    for cell in &grid.cells {
        if cell.group == GroupKind::Head && !head_rows.contains(&cell.row) {
            head_rows.push(cell.row);
        }
    }

    let mut wanted: Vec<(Path, CellData, bool)> = Vec::new();
    for cell in &grid.cells {
        let Some(current) = cell_at(table, &cell.path) else {
            continue;
        };
        let mut next = current.clone();
        next.rowspan = cell.rowspan as u32;
        next.colspan = cell.colspan as u32;

        let is_header = match cell.group {
            GroupKind::Head => {
                let header_row = head_rows.iter().position(|r| *r == cell.row).unwrap_or(0);
                let id = format!("{header_row:02}{:02}", cell.col);
                headers.push(Header {
                    id: id.clone(),
                    scope: CellScope::Col,
                    first: cell.col,
                    last: cell.col + cell.colspan - 1,
                });
                next.header = true;
                next.scope = Some(CellScope::Col);
                next.header_id = Some(id);
                true
            }
            GroupKind::Body if current.header && cell.path[2] == 0 => {
                let id = format!("r{}", cell.body_row.unwrap_or(0));
                headers.push(Header {
                    id: id.clone(),
                    scope: CellScope::Row,
                    first: cell.row,
                    last: cell.row + cell.rowspan - 1,
                });
                next.header = true;
                next.scope = Some(CellScope::Row);
                next.header_id = Some(id);
                true
            }
            GroupKind::Body => {
                next.header = false;
                next.scope = None;
                next.header_id = None;
                false
            }
        };
        if is_header {
            next.headers = None;
        }
        wanted.push((cell.path.clone(), next, is_header));
    }

    let known: BTreeSet<&str> = headers.iter().map(|h| h.id.as_str()).collect();
    for ((path, next, is_header), cell) in wanted.iter_mut().zip(&grid.cells) {
        if *is_header {
            continue;
        }
        let mut ids: BTreeSet<&str> = BTreeSet::new();
        for header in &headers {
            let (first, last) = match header.scope {
                CellScope::Col => (cell.col, cell.col + cell.colspan - 1),
                CellScope::Row => (cell.row, cell.row + cell.rowspan - 1),
            };
            if header.first <= last && first <= header.last {
                ids.insert(header.id.as_str());
            }
        }

        if let Some(previous) = cell_at(table, path).and_then(|data| data.headers.as_deref()) {
            let dangling: Vec<&str> = previous
                .split_whitespace()
                .filter(|id| !known.contains(id))
                .collect();
            if !dangling.is_empty() {
                warn!(?path, ?dangling, "dropped dangling header references");
            }
        }

        next.headers = if ids.is_empty() {
            None
        } else {
            Some(ids.into_iter().collect::<Vec<_>>().join(" "))
        };
    }

    wanted
        .into_iter()
        .filter(|(path, next, _)| cell_at(table, path) != Some(next))
        .map(|(path, next, _)| (path, next))
        .collect()
}

fn cell_at<'a>(table: &'a ElementNode, path: &[usize]) -> Option<&'a CellData> {
    let mut node = table.children.get(*path.first()?)?;
    for &ix in &path[1..] {
        node = node.as_element()?.children.get(ix)?;
    }
    cell_data(node)
}
