use manos_doc_core::{
    Diagnostic, Document, DocumentValue, EditError, Editor, EditorConfig, ElementKind, Marks, Node,
    Op, PluginRegistry, Point, Selection, TextNode, Transaction, element_ids, element_ref,
    markup_to_nodes_with_report,
};

fn round_trip(markup: &str) -> String {
    Editor::from_markup(markup, PluginRegistry::learning_resource()).to_markup()
}

#[test]
fn learning_resource_round_trips_unchanged() {
    let markup = concat!(
        "<section><h2>Tittel</h2>",
        r#"<p>Tekst med <strong>fet</strong> og <a href="https://ndla.no">lenke</a>.</p>"#,
        "<ul><li><p>en</p></li></ul>",
        "<p>Slutt</p></section>",
    );
    assert_eq!(round_trip(markup), markup);
}

#[test]
fn nested_marks_are_written_in_a_fixed_order() {
    assert_eq!(
        round_trip("<section><p><em><strong>begge</strong></em></p></section>"),
        "<section><p><strong><em>begge</em></strong></p></section>"
    );
}

#[test]
fn ordered_list_keeps_its_start() {
    let markup = r#"<section><p>a</p><ol start="3"><li><p>tre</p></li></ol><p>b</p></section>"#;
    assert_eq!(round_trip(markup), markup);
}

#[test]
fn unclaimed_tags_keep_their_text_and_are_reported() {
    let report = markup_to_nodes_with_report(
        "<section><p>a<blink>b</blink></p></section>",
        &PluginRegistry::learning_resource(),
    );
    assert_eq!(
        report.diagnostics,
        vec![Diagnostic::UnclaimedMarkup {
            tag: "blink".to_string()
        }]
    );
    assert_eq!(report.nodes[0].text_content(), "ab");

    assert_eq!(
        round_trip("<section><p>a<blink>b</blink></p></section>"),
        "<section><p>ab</p></section>"
    );
}

#[test]
fn unresolvable_embed_is_left_out() {
    let markup = r#"<section><p>a</p><embed data-resource="image" data-size="full"></embed><p>b</p></section>"#;
    let editor = Editor::from_markup(markup, PluginRegistry::learning_resource());
    let embed = element_ref(editor.doc(), &[0, 1]).unwrap();
    assert_eq!(embed.type_name(), "embed");

    assert_eq!(editor.to_markup(), "<section><p>a</p><p>b</p></section>");
}

#[test]
fn embed_fields_are_written_as_data_attributes() {
    let markup = concat!(
        "<section><p>a</p>",
        r#"<embed data-resource="image" data-resource_id="123" data-size="full"></embed>"#,
        "<p>b</p></section>",
    );
    let editor = Editor::from_markup(markup, PluginRegistry::learning_resource());
    let embed = element_ref(editor.doc(), &[0, 1]).unwrap();
    let ElementKind::Embed(data) = &embed.kind else {
        panic!("expected an embed, got {:?}", embed.kind);
    };
    assert_eq!(data.resource, "image");
    assert_eq!(data.field("resource_id"), Some("123"));

    assert_eq!(editor.to_markup(), markup);
}

#[test]
fn symbol_embeds_become_inline_symbols() {
    let markup =
        r#"<section><p>x<embed data-resource="symbol" data-code="pi">π</embed>y</p></section>"#;
    let editor = Editor::from_markup(markup, PluginRegistry::learning_resource());
    let symbol = element_ref(editor.doc(), &[0, 0, 1]).unwrap();
    let ElementKind::Symbol(data) = &symbol.kind else {
        panic!("expected a symbol, got {:?}", symbol.kind);
    };
    assert_eq!(data.glyph, "π");
    assert_eq!(data.fields.get("code").map(String::as_str), Some("pi"));

    assert_eq!(editor.to_markup(), markup);
}

#[test]
fn math_content_survives_verbatim() {
    let markup = r#"<section><p>Se <math display="block"><mi>x</mi><mo>+</mo><mn>1</mn></math> her</p></section>"#;
    assert_eq!(round_trip(markup), markup);
}

#[test]
fn line_breaks_round_trip() {
    assert_eq!(
        round_trip("<section><p>a<br>b</p></section>"),
        "<section><p>a<br>b</p></section>"
    );
}

#[test]
fn named_entities_are_decoded_and_reescaped() {
    let editor = Editor::from_markup(
        "<section><p>&aring;pen &amp; fri &lt;tag&gt;</p></section>",
        PluginRegistry::learning_resource(),
    );
    assert_eq!(editor.doc().children[0].text_content(), "åpen & fri <tag>");
    assert_eq!(
        editor.to_markup(),
        "<section><p>åpen &amp; fri &lt;tag&gt;</p></section>"
    );
}

#[test]
fn malformed_input_keeps_what_was_read() {
    let report = markup_to_nodes_with_report(
        "<section><p>lest</p><!-- aldri lukket",
        &PluginRegistry::learning_resource(),
    );
    assert!(matches!(
        report.diagnostics.as_slice(),
        [Diagnostic::MalformedMarkup { .. }]
    ));
    assert_eq!(report.nodes.len(), 1);
    assert_eq!(report.nodes[0].text_content(), "lest");
}

#[test]
fn loose_text_becomes_a_paragraph_in_a_section() {
    assert_eq!(round_trip("bare tekst"), "<section><p>bare tekst</p></section>");
}

#[test]
fn concept_registry_drops_tables_but_keeps_their_text() {
    let editor = Editor::from_markup(
        "<section><table><tbody><tr><td><p>celle</p></td></tr></tbody></table></section>",
        PluginRegistry::concept(),
    );
    assert_eq!(editor.to_markup(), "<section><p>celle</p></section>");
}

#[test]
fn json_snapshot_restores_the_same_tree() {
    let editor = Editor::from_markup(
        "<section><h2>Tittel</h2><p>Tekst</p></section>",
        PluginRegistry::core(),
    );
    let json = DocumentValue::from_document(editor.doc().clone())
        .to_json_pretty()
        .unwrap();
    let restored = DocumentValue::from_json_str(&json).unwrap().into_document();
    assert_eq!(&restored, editor.doc());
}

#[test]
fn editor_snapshot_restores_ids_and_selection() {
    let mut editor = Editor::from_markup(
        "<section><h2>Tittel</h2><p>Tekst</p></section>",
        PluginRegistry::core(),
    );
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 1, 0], 3)));
    let json = editor.to_value().to_json_pretty().unwrap();

    let restored = Editor::from_value(
        DocumentValue::from_json_str(&json).unwrap(),
        PluginRegistry::core(),
        EditorConfig::default(),
    );
    assert_eq!(restored.doc(), editor.doc());
    assert_eq!(restored.selection(), editor.selection());
}

#[test]
fn snapshot_is_repaired_and_given_ids_on_load() {
    let json = r#"{ "document": { "children": [{ "node": "text", "text": "løs" }] } }"#;
    let config = EditorConfig {
        id_seed: Some("snap".to_string()),
        ..EditorConfig::default()
    };
    let editor = Editor::from_value(
        DocumentValue::from_json_str(json).unwrap(),
        PluginRegistry::core(),
        config,
    );
    assert_eq!(editor.to_markup(), "<section><p>løs</p></section>");
    let ids = element_ids(editor.doc());
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| id.starts_with("snap-")), "{ids:?}");
}

#[test]
fn marked_text_is_written_outermost_first() {
    let marks = Marks {
        bold: true,
        italic: true,
        ..Marks::default()
    };
    let text = Node::Text(TextNode::new("begge").with_marks(marks));
    let doc = Document::new(vec![Node::section(vec![Node::element(
        ElementKind::Paragraph,
        vec![text],
    )])]);
    let editor = Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![0, 0, 0], 0)),
        PluginRegistry::core(),
    );
    assert_eq!(
        editor.to_markup(),
        "<section><p><strong><em>begge</em></strong></p></section>"
    );
}

#[test]
fn rejected_edits_leave_the_markup_alone() {
    let mut editor = Editor::from_markup(
        "<section><p>a</p></section>",
        PluginRegistry::learning_resource(),
    );
    let before = editor.to_markup();
    let err = editor
        .apply(Transaction::new(vec![Op::RemoveNode { path: vec![0, 5] }]))
        .unwrap_err();
    assert!(matches!(err, EditError::StructuralViolation(_)));
    assert_eq!(editor.to_markup(), before);
}

#[test]
fn unclosed_embed_gives_back_the_content_after_it() {
    let markup = concat!(
        "<section><p>a</p>",
        r#"<embed data-resource="image" data-resource_id="1">"#,
        "<ul><li><p>en</p></li></ul>",
        "<blockquote><p>sitat</p></blockquote>",
        "<p>z<br>w</p></section>",
    );
    assert_eq!(
        round_trip(markup),
        concat!(
            "<section><p>a</p>",
            r#"<embed data-resource="image" data-resource_id="1"></embed>"#,
            "<ul><li><p>en</p></li></ul>",
            "<blockquote><p>sitat</p></blockquote>",
            "<p>z<br>w</p></section>",
        )
    );
}

#[test]
fn unclosed_embed_inside_a_paragraph_keeps_the_text() {
    let editor = Editor::from_markup(
        r#"<section><p>før<embed data-resource="image" data-resource_id="1">etter</p></section>"#,
        PluginRegistry::learning_resource(),
    );
    let text = editor.doc().children[0].text_content();
    assert!(text.contains("før"), "{text}");
    assert!(text.contains("etter"), "{text}");
}

#[test]
fn stray_less_than_keeps_the_following_text() {
    let markup = "<section><p>a < b</p><p>rest</p></section>";
    let report = markup_to_nodes_with_report(markup, &PluginRegistry::learning_resource());
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert_eq!(
        round_trip(markup),
        "<section><p>a &lt; b</p><p>rest</p></section>"
    );
}

#[test]
fn symbol_keeps_its_other_attributes() {
    let markup =
        r#"<section><p>x<embed data-resource="symbol" title="copy" class="c">©</embed>y</p></section>"#;
    let editor = Editor::from_markup(markup, PluginRegistry::learning_resource());
    let symbol = element_ref(editor.doc(), &[0, 0, 1]).unwrap();
    let ElementKind::Symbol(data) = &symbol.kind else {
        panic!("expected a symbol, got {:?}", symbol.kind);
    };
    assert_eq!(data.attributes.get("title").map(String::as_str), Some("copy"));
    assert_eq!(
        editor.to_markup(),
        r#"<section><p>x<embed data-resource="symbol" class="c" title="copy">©</embed>y</p></section>"#
    );
}
