use manos_doc_core::plugins::core_plugins;
use manos_doc_core::{
    DocPlugin, Document, EditError, Editor, EditorConfig, ElementKind, ElementNode, Node,
    NormalizePass, Op, PluginRegistry, Point, Selection, Transaction, element_ref, is_normalized,
    normalize, path,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manos_doc_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn load(markup: &str) -> Editor {
    Editor::from_markup(markup, PluginRegistry::learning_resource())
}

fn kinds(nodes: &[Node]) -> Vec<&'static str> {
    nodes.iter().map(Node::type_name).collect()
}

#[test]
fn details_without_summary_gets_an_empty_one() {
    let editor = load("<section><details><p>x</p></details></section>");
    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(kinds(&section.children), vec!["paragraph", "details", "paragraph"]);

    let details = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(kinds(&details.children), vec!["summary", "paragraph"]);
    let summary = details.children[0].as_element().unwrap();
    assert_eq!(kinds(&summary.children), vec!["paragraph"]);
    assert_eq!(summary.children[0].text_content(), "");
    assert_eq!(details.children[1].text_content(), "x");
}

#[test]
fn empty_document_gets_a_section_with_a_paragraph() {
    let editor = Editor::new(
        Document::default(),
        Selection::collapsed(Point::new(Vec::new(), 0)),
        PluginRegistry::core(),
    );
    assert_eq!(kinds(&editor.doc().children), vec!["section"]);
    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(kinds(&section.children), vec!["paragraph"]);
    assert_eq!(editor.selection().focus.path, vec![0, 0, 0]);
}

#[test]
fn loose_root_content_is_wrapped_in_a_section() {
    let editor = load("<p>a</p><section><p>b</p></section>  <h2>c</h2>");
    assert_eq!(kinds(&editor.doc().children), vec!["section", "section", "section"]);
    assert_eq!(editor.doc().children[0].text_content(), "a");
    assert_eq!(editor.doc().children[2].text_content(), "c");
}

#[test]
fn void_elements_are_reset_to_one_empty_text() {
    let doc = Document::new(vec![Node::section(vec![Node::element(
        ElementKind::Paragraph,
        vec![
            Node::text("a"),
            Node::element(
                ElementKind::Math(Default::default()),
                vec![Node::text("stray"), Node::paragraph("x")],
            ),
            Node::text("b"),
        ],
    )])]);
    let editor = Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![0, 0, 0], 0)),
        PluginRegistry::learning_resource(),
    );
    let math = element_ref(editor.doc(), &[0, 0, 1]).unwrap();
    assert_eq!(math.type_name(), "math");
    assert_eq!(math.children, vec![Node::text("")]);
}

#[test]
fn blocks_inside_a_paragraph_are_lifted_out_in_order() {
    let doc = Document::new(vec![Node::section(vec![Node::element(
        ElementKind::Paragraph,
        vec![Node::text("a"), Node::heading(2, "b"), Node::text("c")],
    )])]);
    let editor = Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![0, 0, 0], 0)),
        PluginRegistry::core(),
    );
    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(kinds(&section.children), vec!["paragraph", "heading", "paragraph"]);
    let texts: Vec<String> = section.children.iter().map(Node::text_content).collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
}

#[test]
fn adjacent_texts_with_equal_marks_merge() {
    let doc = Document::new(vec![Node::section(vec![Node::element(
        ElementKind::Paragraph,
        vec![Node::text("Hei "), Node::text(""), Node::text("verden")],
    )])]);
    let editor = Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![0, 0, 2], 3)),
        PluginRegistry::core(),
    );
    let paragraph = element_ref(editor.doc(), &[0, 0]).unwrap();
    assert_eq!(paragraph.children, vec![Node::text("Hei verden")]);
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0, 0], 7));
}

#[test]
fn inline_elements_are_flanked_by_text() {
    let editor = load(r#"<section><p><a href="https://ndla.no">lenke</a></p></section>"#);
    let paragraph = element_ref(editor.doc(), &[0, 0]).unwrap();
    assert_eq!(kinds(&paragraph.children), vec!["text", "link", "text"]);
}

#[test]
fn unknown_element_kinds_are_unwrapped() {
    let doc = Document::new(vec![Node::section(vec![Node::element(
        ElementKind::Blockquote,
        vec![Node::paragraph("sitat")],
    )])]);
    let editor = Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![0, 0, 0, 0], 0)),
        PluginRegistry::concept(),
    );
    let section = element_ref(editor.doc(), &[0]).unwrap();
    assert_eq!(kinds(&section.children), vec!["paragraph"]);
    assert_eq!(section.children[0].text_content(), "sitat");
}

#[test]
fn normalizing_a_normalized_tree_changes_nothing() {
    let editor = load(
        r#"<section><h2>Tittel</h2><ul><li><p>en</p></li><li><p>to</p></li></ul>
        <details><summary>Mer</summary><p>innhold</p></details></section>"#,
    );
    assert!(is_normalized(editor.doc(), editor.registry()));

    let mut doc = editor.doc().clone();
    let mut selection = editor.selection().clone();
    let repairs = normalize(
        &mut doc,
        &mut selection,
        Vec::new(),
        editor.registry(),
        &EditorConfig::default(),
    )
    .unwrap();
    assert_eq!(repairs, 0);
    assert_eq!(&doc, editor.doc());
}

struct Restless;

impl NormalizePass for Restless {
    fn id(&self) -> &'static str {
        "test.restless"
    }

    fn normalize(
        &self,
        _doc: &Document,
        el: &ElementNode,
        at: &[usize],
        _registry: &PluginRegistry,
    ) -> Option<Vec<Op>> {
        let looping = el.type_name() == "paragraph"
            && el.children.iter().any(|c| c.text_content().contains("loop"));
        looping.then(|| {
            vec![Op::InsertText {
                path: path::child(at, 0),
                offset: 0,
                text: String::new(),
            }]
        })
    }
}

struct RestlessPlugin;

impl DocPlugin for RestlessPlugin {
    fn id(&self) -> &'static str {
        "restless"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(Restless)]
    }
}

#[test]
fn a_rule_that_never_settles_is_reported_and_rejected() {
    init_tracing();
    let mut plugins = core_plugins();
    plugins.push(Box::new(RestlessPlugin));
    let registry = PluginRegistry::new(plugins).unwrap();
    let mut editor = Editor::new(
        Document::empty(),
        Selection::collapsed(Point::new(vec![0, 0, 0], 0)),
        registry,
    );
    let before = editor.snapshot();

    let err = editor
        .apply(Transaction::new(vec![Op::InsertText {
            path: vec![0, 0, 0],
            offset: 0,
            text: "loop".to_string(),
        }]))
        .unwrap_err();

    assert!(matches!(err, EditError::NormalizationDeadlock { .. }));
    assert_eq!(editor.doc(), &*before);
    assert_eq!(editor.version(), 0);
    assert!(!editor.can_undo());
}

#[test]
fn duplicate_plugin_node_types_are_rejected() {
    let mut plugins = core_plugins();
    plugins.extend(core_plugins());
    assert!(PluginRegistry::new(plugins).is_err());
}
