use manos_doc_core::{
    Document, Editor, EditorConfig, ElementKind, ElementNode, Node, NodePatch, Op, PluginRegistry,
    Point, Selection, Transaction, element_ids, element_ref, ids_are_unique,
};

fn load(markup: &str) -> Editor {
    Editor::from_markup(markup, PluginRegistry::learning_resource())
}

fn id_at(editor: &Editor, path: &[usize]) -> String {
    element_ref(editor.doc(), path)
        .and_then(|el| el.id.clone())
        .unwrap_or_else(|| panic!("expected an id at {path:?}"))
}

fn paragraph_with_id(text: &str, id: &str) -> Node {
    Node::Element(
        ElementNode::new(ElementKind::Paragraph, vec![Node::text(text)]).with_id(id),
    )
}

#[test]
fn loaded_elements_all_get_ids() {
    let editor = load("<section><h2>Tittel</h2><p>Tekst</p></section>");
    assert_eq!(element_ids(editor.doc()).len(), 3);
    assert!(ids_are_unique(editor.doc()));
}

#[test]
fn split_paragraph_gets_two_fresh_ids() {
    let mut editor = load("<section><p>Denne splittes</p></section>");
    let original = id_at(&editor, &[0, 0]);
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0, 0], 6)));

    editor.split_block().unwrap();

    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(section.children.len(), 2);
    assert_eq!(section.children[0].text_content(), "Denne ");
    assert_eq!(section.children[1].text_content(), "splittes");

    let first = id_at(&editor, &[0, 0]);
    let second = id_at(&editor, &[0, 1]);
    assert_ne!(first, original);
    assert_ne!(second, original);
    assert_ne!(first, second);
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1, 0], 0));
}

#[test]
fn merge_keeps_the_id_of_the_block_merged_into() {
    let mut editor = load("<section><p>en</p><p>to</p></section>");
    let kept = id_at(&editor, &[0, 0]);
    let dropped = id_at(&editor, &[0, 1]);
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 1, 0], 0)));

    editor.delete_backward().unwrap();

    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(section.children.len(), 1);
    assert_eq!(section.children[0].text_content(), "ento");
    assert_eq!(id_at(&editor, &[0, 0]), kept);
    assert!(!element_ids(editor.doc()).contains(&dropped));
}

#[test]
fn pasted_blocks_with_colliding_ids_are_reassigned() {
    let mut editor = load("<section><p>a</p></section>");
    let section_id = id_at(&editor, &[0]);
    let paragraph_id = id_at(&editor, &[0, 0]);
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0, 0], 1)));

    editor
        .insert_fragment(vec![
            paragraph_with_id("x", &paragraph_id),
            paragraph_with_id("y", &section_id),
        ])
        .unwrap();

    let ids = element_ids(editor.doc());
    assert_eq!(ids.len(), 4);
    assert!(ids_are_unique(editor.doc()));
    assert_eq!(id_at(&editor, &[0]), section_id);
    assert_eq!(id_at(&editor, &[0, 0]), paragraph_id);
    assert_eq!(editor.doc().children[0].text_content(), "axy");
}

#[test]
fn pasted_ids_that_do_not_collide_are_kept() {
    let mut editor = load("<section><p>a</p></section>");
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0, 0], 1)));

    editor
        .insert_fragment(vec![paragraph_with_id("x", "kopiert-1")])
        .unwrap();

    assert_eq!(id_at(&editor, &[0, 1]), "kopiert-1");
}

#[test]
fn duplicate_ids_in_a_loaded_document_are_resolved() {
    let doc = Document::new(vec![Node::section(vec![
        paragraph_with_id("a", "dup"),
        paragraph_with_id("b", "dup"),
    ])]);
    let editor = Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![0, 0, 0], 0)),
        PluginRegistry::core(),
    );
    assert_eq!(id_at(&editor, &[0, 0]), "dup");
    assert_ne!(id_at(&editor, &[0, 1]), "dup");
    assert!(ids_are_unique(editor.doc()));
}

#[test]
fn configured_seed_prefixes_minted_ids() {
    let config = EditorConfig {
        id_seed: Some("doc".to_string()),
        ..EditorConfig::default()
    };
    let editor = Editor::from_markup_with_config(
        "<section><p>a</p></section>",
        PluginRegistry::core(),
        config,
    );
    for id in element_ids(editor.doc()) {
        assert!(id.starts_with("doc-"), "unexpected id {id}");
    }
}

#[test]
fn separate_editors_do_not_share_id_seeds() {
    let a = load("<section><p>a</p></section>");
    let b = load("<section><p>a</p></section>");
    assert_ne!(id_at(&a, &[0, 0]), id_at(&b, &[0, 0]));
}

#[test]
fn late_update_for_a_removed_node_is_a_no_op() {
    let mut editor = load("<section><p>en</p><p>to</p></section>");
    let gone = id_at(&editor, &[0, 1]);
    editor
        .apply(Transaction::new(vec![Op::RemoveNode { path: vec![0, 1] }]))
        .unwrap();
    let version = editor.version();

    let patched = editor
        .update_node_by_id(&gone, NodePatch::kind(ElementKind::Heading { level: 2 }))
        .unwrap();

    assert!(!patched);
    assert_eq!(editor.version(), version);
}

#[test]
fn late_update_reaches_a_node_that_moved() {
    let mut editor = load("<section><p>en</p><p>to</p></section>");
    let target = id_at(&editor, &[0, 1]);
    editor
        .apply(Transaction::new(vec![Op::InsertNode {
            path: vec![0, 0],
            node: Node::paragraph("ny"),
        }]))
        .unwrap();

    let patched = editor
        .update_node_by_id(&target, NodePatch::kind(ElementKind::Heading { level: 2 }))
        .unwrap();

    assert!(patched);
    let heading = element_ref(editor.doc(), &[0, 2]).unwrap();
    assert_eq!(heading.kind, ElementKind::Heading { level: 2 });
    assert_eq!(heading.id.as_deref(), Some(target.as_str()));
}

#[test]
fn undo_restores_the_previous_ids_exactly() {
    let mut editor = load("<section><p>Denne splittes</p></section>");
    let before = element_ids(editor.doc());
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0, 0], 6)));
    editor.split_block().unwrap();
    let split = element_ids(editor.doc());

    assert!(editor.undo());
    assert_eq!(element_ids(editor.doc()), before);

    assert!(editor.redo());
    assert_eq!(element_ids(editor.doc()), split);
    assert!(ids_are_unique(editor.doc()));
}
