use manos_doc_core::{
    CellData, CellScope, Editor, ElementKind, ElementNode, Node, PluginRegistry, Point, Selection,
    element_ref,
};
use serde_json::json;

fn load(markup: &str) -> Editor {
    Editor::from_markup(markup, PluginRegistry::learning_resource())
}

fn kinds(nodes: &[Node]) -> Vec<&'static str> {
    nodes.iter().map(Node::type_name).collect()
}

fn cell(editor: &Editor, path: &[usize]) -> CellData {
    let el = element_ref(editor.doc(), path).unwrap();
    let ElementKind::TableCell(data) = &el.kind else {
        panic!("expected a table cell at {path:?}, got {:?}", el.kind);
    };
    data.clone()
}

fn row_texts(editor: &Editor, row: &[usize]) -> Vec<String> {
    let row: &ElementNode = element_ref(editor.doc(), row).unwrap();
    row.children.iter().map(Node::text_content).collect()
}

fn caret_in(editor: &mut Editor, cell: &[usize]) {
    let mut path = cell.to_vec();
    path.extend([0, 0]);
    editor.set_selection(Selection::collapsed(Point::new(path, 0)));
}

const HEADED: &str = concat!(
    "<section><p>før</p><table>",
    "<thead><tr><th>A</th><th>B</th></tr></thead>",
    r#"<tbody><tr><th rowspan="2">x</th><td>1</td></tr><tr><td>2</td></tr></tbody>"#,
    "</table><p>etter</p></section>",
);

#[test]
fn headers_are_solved_for_column_and_row_headers() {
    let editor = load(HEADED);

    let a = cell(&editor, &[0, 1, 0, 0, 0]);
    assert_eq!(a.header_id.as_deref(), Some("0000"));
    assert_eq!(a.scope, Some(CellScope::Col));

    let x = cell(&editor, &[0, 1, 1, 0, 0]);
    assert!(x.header);
    assert_eq!(x.header_id.as_deref(), Some("r1"));
    assert_eq!(x.scope, Some(CellScope::Row));
    assert_eq!(x.rowspan, 2);

    let one = cell(&editor, &[0, 1, 1, 0, 1]);
    assert_eq!(one.headers.as_deref(), Some("0001 r1"));
    let two = cell(&editor, &[0, 1, 1, 1, 0]);
    assert_eq!(two.headers.as_deref(), Some("0001 r1"));
}

#[test]
fn solved_headers_are_written_to_markup() {
    let markup = load(HEADED).to_markup();
    assert!(markup.contains(r#"<th id="0000" scope="col"><p>A</p></th>"#), "{markup}");
    assert!(markup.contains(r#"<th id="0001" scope="col"><p>B</p></th>"#), "{markup}");
    assert!(
        markup.contains(r#"<th id="r1" scope="row" rowspan="2"><p>x</p></th>"#),
        "{markup}"
    );
    assert!(markup.contains(r#"<td headers="0001 r1"><p>1</p></td>"#), "{markup}");
    assert!(markup.contains(r#"<td headers="0001 r1"><p>2</p></td>"#), "{markup}");
}

#[test]
fn short_rows_are_padded_to_the_grid_width() {
    let editor = load(concat!(
        "<section><p>a</p><table><tbody>",
        "<tr><td>1</td><td>2</td></tr><tr><td>3</td></tr>",
        "</tbody></table><p>b</p></section>",
    ));
    assert_eq!(row_texts(&editor, &[0, 1, 0, 1]), vec!["3", ""]);
    assert!(!cell(&editor, &[0, 1, 0, 1, 1]).header);
}

#[test]
fn header_cells_inside_body_rows_are_demoted() {
    let markup = load(concat!(
        "<section><p>a</p><table><tbody>",
        "<tr><td>1</td><th>2</th></tr>",
        "</tbody></table><p>b</p></section>",
    ))
    .to_markup();
    assert!(markup.contains("<tr><td><p>1</p></td><td><p>2</p></td></tr>"), "{markup}");
    assert!(!markup.contains("<th"), "{markup}");
}

#[test]
fn dangling_header_references_are_dropped() {
    let editor = load(concat!(
        "<section><p>a</p><table><tbody>",
        r#"<tr><td headers="borte">1</td></tr>"#,
        "</tbody></table><p>b</p></section>",
    ));
    assert_eq!(cell(&editor, &[0, 1, 0, 0, 0]).headers, None);
}

#[test]
fn caption_moves_to_the_front() {
    let editor = load(concat!(
        "<section><p>a</p><table>",
        "<tbody><tr><td>1</td></tr></tbody><caption>Tittel</caption>",
        "</table><p>b</p></section>",
    ));
    let table = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(kinds(&table.children), vec!["table_caption", "table_body"]);
    assert!(editor.to_markup().contains("<table><caption>Tittel</caption><tbody>"));
}

#[test]
fn head_after_body_moves_before_it() {
    let editor = load(concat!(
        "<section><p>a</p><table>",
        "<tbody><tr><td>1</td></tr></tbody><thead><tr><th>A</th></tr></thead>",
        "</table><p>b</p></section>",
    ));
    let table = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(kinds(&table.children), vec!["table_head", "table_body"]);
    assert_eq!(cell(&editor, &[0, 1, 1, 0, 0]).headers.as_deref(), Some("0000"));
}

#[test]
fn table_without_rows_is_dissolved() {
    let editor = load(concat!(
        "<section><p>før</p><table><caption>Tom</caption><tbody></tbody></table>",
        "<p>etter</p></section>",
    ));
    assert_eq!(
        editor.to_markup(),
        "<section><p>før</p><p>Tom</p><p>etter</p></section>"
    );
}

#[test]
fn loose_rows_are_wrapped_in_a_table() {
    let editor = load("<section><p>a</p><tr><td>1</td></tr><p>b</p></section>");
    let table = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(table.type_name(), "table");
    assert_eq!(kinds(&table.children), vec!["table_body"]);
}

#[test]
fn oversized_colspan_is_capped_on_load() {
    let editor = load(concat!(
        "<section><p>a</p><table><tbody>",
        r#"<tr><td colspan="4000000000">1</td></tr><tr><td>2</td></tr>"#,
        "</tbody></table><p>b</p></section>",
    ));
    assert_eq!(cell(&editor, &[0, 1, 0, 0, 0]).colspan, 1000);
    assert_eq!(row_texts(&editor, &[0, 1, 0, 1]).len(), 1000);
    assert!(editor.to_markup().contains(r#"<td colspan="1000"><p>1</p></td>"#));
}

#[test]
fn insert_command_builds_a_headed_table() {
    let mut editor = load("<section><p>a</p></section>");
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0, 0], 1)));

    editor
        .run_command("table.insert", Some(json!({ "rows": 2, "cols": 3 })))
        .unwrap();

    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(kinds(&section.children), vec!["paragraph", "table", "paragraph"]);
    let table = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(kinds(&table.children), vec!["table_head", "table_body"]);
    let body = element_ref(editor.doc(), &[0, 1, 1]).unwrap();
    assert_eq!(body.children.len(), 2);
    assert_eq!(row_texts(&editor, &[0, 1, 1, 1]).len(), 3);

    assert_eq!(cell(&editor, &[0, 1, 0, 0, 2]).header_id.as_deref(), Some("0002"));
    assert_eq!(editor.selection().focus.path, vec![0, 1, 0, 0, 0, 0, 0]);
}

const SMALL: &str = concat!(
    "<section><p>a</p><table>",
    "<thead><tr><th>A</th><th>B</th></tr></thead>",
    "<tbody><tr><td>1</td><td>2</td></tr></tbody>",
    "</table><p>b</p></section>",
);

#[test]
fn insert_row_below_adds_a_full_row() {
    let mut editor = load(SMALL);
    caret_in(&mut editor, &[0, 1, 1, 0, 0]);

    editor.run_command("table.insert_row_below", None).unwrap();

    let body = element_ref(editor.doc(), &[0, 1, 1]).unwrap();
    assert_eq!(body.children.len(), 2);
    assert_eq!(row_texts(&editor, &[0, 1, 1, 1]), vec!["", ""]);
    assert_eq!(cell(&editor, &[0, 1, 1, 1, 1]).headers.as_deref(), Some("0001"));
}

#[test]
fn insert_col_right_shifts_later_headers() {
    let mut editor = load(SMALL);
    caret_in(&mut editor, &[0, 1, 0, 0, 0]);

    editor.run_command("table.insert_col_right", None).unwrap();

    assert_eq!(row_texts(&editor, &[0, 1, 0, 0]), vec!["A", "", "B"]);
    assert_eq!(row_texts(&editor, &[0, 1, 1, 0]), vec!["1", "", "2"]);
    assert!(cell(&editor, &[0, 1, 0, 0, 1]).header);
    assert_eq!(cell(&editor, &[0, 1, 0, 0, 2]).header_id.as_deref(), Some("0002"));
    assert_eq!(cell(&editor, &[0, 1, 1, 0, 2]).headers.as_deref(), Some("0002"));
}

#[test]
fn delete_row_drops_the_emptied_group() {
    let mut editor = load(SMALL);
    caret_in(&mut editor, &[0, 1, 1, 0, 0]);

    editor.run_command("table.delete_row", None).unwrap();

    let table = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(kinds(&table.children), vec!["table_head"]);
}

#[test]
fn delete_col_removes_the_column() {
    let mut editor = load(SMALL);
    caret_in(&mut editor, &[0, 1, 0, 0, 1]);

    editor.run_command("table.delete_col", None).unwrap();

    assert_eq!(row_texts(&editor, &[0, 1, 0, 0]), vec!["A"]);
    assert_eq!(row_texts(&editor, &[0, 1, 1, 0]), vec!["1"]);
}

#[test]
fn delete_col_narrows_spanning_cells() {
    let mut editor = load(concat!(
        "<section><p>a</p><table>",
        r#"<thead><tr><th colspan="2">AB</th></tr></thead>"#,
        "<tbody><tr><td>1</td><td>2</td></tr></tbody>",
        "</table><p>b</p></section>",
    ));
    caret_in(&mut editor, &[0, 1, 1, 0, 1]);

    editor.run_command("table.delete_col", None).unwrap();

    assert_eq!(cell(&editor, &[0, 1, 0, 0, 0]).colspan, 1);
    assert_eq!(row_texts(&editor, &[0, 1, 1, 0]), vec!["1"]);
    assert_eq!(cell(&editor, &[0, 1, 1, 0, 0]).headers.as_deref(), Some("0000"));
}

#[test]
fn table_commands_need_a_cell() {
    let mut editor = load(SMALL);
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0, 0], 0)));
    let version = editor.version();

    assert!(editor.run_command("table.delete_row", None).is_err());
    assert_eq!(editor.version(), version);
}
