use manos_doc_core::{Editor, Key, Node, PluginRegistry, Point, Selection, element_ref};

fn load(markup: &str) -> Editor {
    Editor::from_markup(markup, PluginRegistry::learning_resource())
}

fn kinds(nodes: &[Node]) -> Vec<&'static str> {
    nodes.iter().map(Node::type_name).collect()
}

fn caret(editor: &mut Editor, path: Vec<usize>, offset: usize) {
    editor.set_selection(Selection::collapsed(Point::new(path, offset)));
}

#[test]
fn backspace_removes_details_without_content() {
    let mut editor =
        load("<section><p>før</p><details><summary></summary><p></p></details><p>etter</p></section>");
    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(kinds(&section.children), vec!["paragraph", "details", "paragraph"]);

    caret(&mut editor, vec![0, 1, 0, 0, 0], 0);
    assert!(editor.handle_key(Key::Backspace).unwrap());

    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(kinds(&section.children), vec!["paragraph", "paragraph"]);
    assert_eq!(section.children[0].text_content(), "før");
    assert_eq!(section.children[1].text_content(), "etter");
}

#[test]
fn backspace_keeps_details_with_text() {
    let mut editor = load(
        "<section><p>før</p><details><summary></summary><p>innhold</p></details><p>etter</p></section>",
    );
    let version = editor.version();

    caret(&mut editor, vec![0, 1, 0, 0, 0], 0);
    assert!(!editor.handle_key(Key::Backspace).unwrap());

    let details = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(details.type_name(), "details");
    assert_eq!(details.children[1].text_content(), "innhold");
    assert_eq!(editor.version(), version);
}

#[test]
fn backspace_keeps_details_with_a_void() {
    let mut editor = load(
        r#"<section><p>før</p><details><summary></summary><p><math><mi>x</mi></math></p></details><p>etter</p></section>"#,
    );
    caret(&mut editor, vec![0, 1, 0, 0, 0], 0);
    editor.handle_key(Key::Backspace).unwrap();

    let details = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(details.type_name(), "details");
}

#[test]
fn later_summaries_are_dissolved() {
    let editor = load(
        "<section><details><summary>A</summary><p>x</p><summary>B</summary></details></section>",
    );
    let details = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(kinds(&details.children), vec!["summary", "paragraph", "paragraph"]);
    let texts: Vec<String> = details.children.iter().map(Node::text_content).collect();
    assert_eq!(texts, vec!["A", "x", "B"]);
}

#[test]
fn summary_outside_details_is_unwrapped() {
    let editor = load("<section><summary><p>løs</p></summary></section>");
    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(kinds(&section.children), vec!["paragraph"]);
    assert_eq!(section.children[0].text_content(), "løs");
}

#[test]
fn insert_command_places_caret_in_the_summary() {
    let mut editor = load("<section><p>tekst</p></section>");
    caret(&mut editor, vec![0, 0, 0], 2);

    editor.run_command("details.insert", None).unwrap();

    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(kinds(&section.children), vec!["paragraph", "details", "paragraph"]);
    let details = section.children[1].as_element().unwrap();
    assert_eq!(kinds(&details.children), vec!["summary", "paragraph"]);
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1, 0, 0, 0], 0));
}

#[test]
fn details_round_trip_through_markup() {
    let editor = load(
        "<section><p>a</p><details><summary><p>Mer</p></summary><p>b</p></details><p>c</p></section>",
    );
    assert_eq!(
        editor.to_markup(),
        "<section><p>a</p><details><summary><p>Mer</p></summary><p>b</p></details><p>c</p></section>"
    );
}
