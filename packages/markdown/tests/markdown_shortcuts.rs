use outline_core::{Editor, EditorConfig, HistoryAction, NodeMap, PointType, TextFormat, VirtualSurface};
use outline_markdown::MarkdownShortcuts;
use outline_nodes::register_rich_text_nodes;

fn config() -> EditorConfig {
    EditorConfig::from_json_str(r#"{"history":{"mergeIntervalMs":60000}}"#).unwrap()
}

fn editor() -> Editor {
    let builder = Editor::builder()
        .config(config())
        .surface(VirtualSurface::new())
        .transform(MarkdownShortcuts::new().unwrap());
    register_rich_text_nodes(builder).unwrap().build().unwrap()
}

/// Type `text` one character per transaction, the way key events arrive
fn type_text(editor: &mut Editor, text: &str) -> Vec<HistoryAction> {
    text.chars()
        .map(|c| {
            editor
                .update(|txn| txn.insert_text(&c.to_string()))
                .unwrap()
                .history
        })
        .collect()
}

fn body(editor: &Editor) -> String {
    let html = editor.surface::<VirtualSurface>().unwrap().to_html();
    html.trim_start_matches("<div contenteditable=\"true\" data-outline-editor=\"true\">")
        .trim_end_matches("</div>")
        .to_string()
}

fn span(text: &str) -> String {
    format!("<span data-outline-text=\"true\">{}</span>", text)
}

fn first_block_type(editor: &Editor) -> String {
    let state = editor.state();
    let first = state.children_of(state.root_key())[0].clone();
    state.get(&first).unwrap().node_type().to_string()
}

fn text(editor: &Editor) -> String {
    let state = editor.state();
    state.text_content(state.root_key())
}

#[test]
fn test_heading_shortcut_is_its_own_undo_step() {
    let mut editor = editor();

    let actions = type_text(&mut editor, "# ");
    assert_eq!(actions, vec![HistoryAction::Pushed, HistoryAction::Merged]);
    assert_eq!(body(&editor), "<h1></h1>");
    assert_eq!(editor.history().undo_levels(), 2);

    let state = editor.state();
    let caret = state.selection().unwrap();
    assert_eq!(caret.anchor.point_type, PointType::Element);
    assert_eq!(state.get(&caret.anchor.key).unwrap().node_type(), "heading");

    // Undo drops the shortcut but keeps the typed marker
    assert!(editor.undo().unwrap());
    assert_eq!(first_block_type(&editor), "paragraph");
    assert_eq!(text(&editor), "# ");

    assert!(editor.redo().unwrap());
    assert_eq!(first_block_type(&editor), "heading");
    assert_eq!(text(&editor), "");
}

#[test]
fn test_heading_levels() {
    let mut editor = editor();
    type_text(&mut editor, "### Title");
    assert_eq!(body(&editor), format!("<h3>{}</h3>", span("Title")));
}

#[test]
fn test_quote_shortcut() {
    let mut editor = editor();
    type_text(&mut editor, "> quoted");
    assert_eq!(body(&editor), format!("<blockquote>{}</blockquote>", span("quoted")));
}

#[test]
fn test_bullet_list_shortcut_and_continuation() {
    let mut editor = editor();
    type_text(&mut editor, "- one");
    editor.update(|txn| txn.insert_paragraph()).unwrap();
    type_text(&mut editor, "two");

    assert_eq!(
        body(&editor),
        format!("<ul><li>{}</li><li>{}</li></ul>", span("one"), span("two"))
    );
}

#[test]
fn test_numbered_list_keeps_start() {
    let mut editor = editor();
    type_text(&mut editor, "3. ");
    assert_eq!(body(&editor), "<ol start=\"3\"><li></li></ol>");
}

#[test]
fn test_indented_marker_nests_list() {
    let mut editor = editor();
    type_text(&mut editor, "    * ");
    assert_eq!(body(&editor), "<ul><li><ul><li></li></ul></li></ul>");
}

#[test]
fn test_horizontal_rule_shortcut() {
    let mut editor = editor();
    type_text(&mut editor, "--- ");
    assert_eq!(body(&editor), "<hr><p></p>");
}

#[test]
fn test_block_marker_inside_list_stays_text() {
    let mut editor = editor();
    type_text(&mut editor, "- # ");
    assert_eq!(body(&editor), format!("<ul><li>{}</li></ul>", span("# ")));
}

#[test]
fn test_italic_shortcut_splits_runs() {
    let mut editor = editor();
    type_text(&mut editor, "hello *world* !");

    assert_eq!(text(&editor).trim(), "hello world !");
    let state = editor.state();
    let paragraph = state.children_of(state.root_key())[0].clone();
    let runs: Vec<(String, TextFormat)> = state
        .children_of(&paragraph)
        .iter()
        .map(|k| {
            let node = state.get(k).unwrap();
            (node.text().unwrap().to_string(), node.format())
        })
        .collect();
    assert_eq!(
        runs,
        vec![
            ("hello ".to_string(), TextFormat::empty()),
            ("world".to_string(), TextFormat::ITALIC),
            (" !".to_string(), TextFormat::empty()),
        ]
    );
}

#[test]
fn test_bold_shortcut() {
    let mut editor = editor();
    type_text(&mut editor, "**bold** text");
    assert_eq!(
        body(&editor),
        format!(
            "<p><strong data-outline-text=\"true\">bold</strong>{}</p>",
            span(" text")
        )
    );
}

#[test]
fn test_inline_shortcut_undo_restores_markers() {
    let mut editor = editor();
    type_text(&mut editor, "~~gone~~");
    assert_eq!(text(&editor), "gone");

    editor.undo().unwrap();
    assert_eq!(text(&editor), "~~gone~~");
}

#[test]
fn test_block_shortcuts_need_registered_nodes() {
    let mut editor = Editor::builder()
        .config(config())
        .surface(VirtualSurface::new())
        .transform(MarkdownShortcuts::new().unwrap())
        .build()
        .unwrap();

    type_text(&mut editor, "# *a*");
    assert_eq!(first_block_type(&editor), "paragraph");
    assert_eq!(text(&editor), "# a");
}
