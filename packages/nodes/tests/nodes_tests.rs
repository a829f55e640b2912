use outline_core::{
    replace_block, Attributes, Editor, EditorError, NodeKey, NodeMap, RegistryError, Transaction, VirtualSurface,
};
use outline_nodes::{heading_attributes, list_attributes, register_rich_text_nodes, ListType};

fn editor() -> Editor {
    register_rich_text_nodes(Editor::builder().surface(VirtualSurface::new()))
        .unwrap()
        .build()
        .unwrap()
}

/// Rendered children of the root element
fn body(editor: &Editor) -> String {
    let html = editor.surface::<VirtualSurface>().unwrap().to_html();
    html.trim_start_matches("<div contenteditable=\"true\" data-outline-editor=\"true\">")
        .trim_end_matches("</div>")
        .to_string()
}

fn span(text: &str) -> String {
    format!("<span data-outline-text=\"true\">{}</span>", text)
}

fn first_block(txn: &Transaction) -> NodeKey {
    txn.children_of(txn.root_key())[0].clone()
}

/// Replace the document with one list whose items hold `items`
fn build_list(editor: &mut Editor, list_type: ListType, start: u64, items: &[&str]) -> Vec<NodeKey> {
    let mut keys = Vec::new();
    editor
        .update(|txn| {
            let list = txn.create_node("list", list_attributes(list_type, start))?;
            for item in items {
                let key = txn.create_element("listitem")?;
                if !item.is_empty() {
                    let text = txn.create_text(item)?;
                    txn.append(&key, &text)?;
                }
                txn.append(&list, &key)?;
                keys.push(key);
            }
            let first = first_block(txn);
            txn.replace(&first, &list)?;
            txn.select_end(&list)
        })
        .unwrap();
    keys
}

#[test]
fn test_enter_after_heading_opens_paragraph() {
    let mut editor = editor();
    editor
        .update(|txn| {
            let first = first_block(txn);
            let heading = replace_block(txn, &first, "heading", heading_attributes(1))?;
            txn.select_start(&heading)
        })
        .unwrap();

    editor.update(|txn| txn.insert_text("Title")).unwrap();
    editor.update(|txn| txn.insert_paragraph()).unwrap();

    assert_eq!(body(&editor), format!("<h1>{}</h1><p></p>", span("Title")));
}

#[test]
fn test_backspace_turns_heading_into_paragraph() {
    let mut editor = editor();
    editor
        .update(|txn| {
            let first = first_block(txn);
            let heading = replace_block(txn, &first, "heading", heading_attributes(2))?;
            let text = txn.create_text("Title")?;
            txn.append(&heading, &text)?;
            txn.select_text(&text, 0)
        })
        .unwrap();

    editor.update(|txn| txn.delete_backward()).unwrap();

    assert_eq!(body(&editor), format!("<p>{}</p>", span("Title")));
    let state = editor.state();
    let caret = state.selection().unwrap();
    assert_eq!(caret.anchor.offset, 0);
    assert_eq!(state.get(&caret.anchor.key).unwrap().text(), Some("Title"));
}

#[test]
fn test_heading_without_level_is_rejected() {
    let mut editor = editor();
    let err = editor
        .update(|txn| txn.create_element("heading").map(|_| ()))
        .unwrap_err();
    assert!(matches!(
        err,
        EditorError::Registration(RegistryError::InvalidAttributes { .. })
    ));
}

#[test]
fn test_enter_in_list_adds_items_then_exits() {
    let mut editor = editor();
    let items = build_list(&mut editor, ListType::Bullet, 1, &[""]);
    editor.update(|txn| txn.select_start(&items[0])).unwrap();

    editor.update(|txn| txn.insert_text("one")).unwrap();
    editor.update(|txn| txn.insert_paragraph()).unwrap();
    editor.update(|txn| txn.insert_text("two")).unwrap();
    editor.update(|txn| txn.insert_paragraph()).unwrap();
    assert_eq!(
        body(&editor),
        format!("<ul><li>{}</li><li>{}</li><li></li></ul>", span("one"), span("two"))
    );

    // Enter on the empty last item leaves the list
    editor.update(|txn| txn.insert_paragraph()).unwrap();
    assert_eq!(
        body(&editor),
        format!("<ul><li>{}</li><li>{}</li></ul><p></p>", span("one"), span("two"))
    );

    let state = editor.state();
    let caret = state.selection().unwrap();
    assert_eq!(state.get(&caret.anchor.key).unwrap().node_type(), "paragraph");
}

#[test]
fn test_exit_from_middle_item_splits_list() {
    let mut editor = editor();
    let items = build_list(&mut editor, ListType::Number, 1, &["one", "", "three"]);
    editor.update(|txn| txn.select_start(&items[1])).unwrap();

    editor.update(|txn| txn.insert_paragraph()).unwrap();

    assert_eq!(
        body(&editor),
        format!("<ol><li>{}</li></ol><p></p><ol><li>{}</li></ol>", span("one"), span("three"))
    );
}

#[test]
fn test_backspace_on_first_item_leaves_list() {
    let mut editor = editor();
    let items = build_list(&mut editor, ListType::Bullet, 1, &["one", "two"]);
    editor.update(|txn| txn.select_start(&items[0])).unwrap();

    editor.update(|txn| txn.delete_backward()).unwrap();

    assert_eq!(
        body(&editor),
        format!("<p>{}</p><ul><li>{}</li></ul>", span("one"), span("two"))
    );
}

#[test]
fn test_backspace_on_later_item_merges_into_previous() {
    let mut editor = editor();
    let items = build_list(&mut editor, ListType::Bullet, 1, &["one", "two"]);
    editor.update(|txn| txn.select_start(&items[1])).unwrap();

    editor.update(|txn| txn.delete_backward()).unwrap();

    let state = editor.state();
    assert_eq!(state.text_content(state.root_key()), "onetwo");
    assert_eq!(state.children_of(&first_key(&editor)).len(), 1);
}

#[test]
fn test_numbered_list_start_attribute() {
    let mut editor = editor();
    build_list(&mut editor, ListType::Number, 3, &["c"]);
    assert_eq!(body(&editor), format!("<ol start=\"3\"><li>{}</li></ol>", span("c")));

    let json = editor.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let list = &value["root"]["children"][0];
    assert_eq!(list["type"], "list");
    assert_eq!(list["attributes"]["listType"], "number");
    assert_eq!(list["attributes"]["start"], 3);
}

#[test]
fn test_horizontal_rule_renders_void_element() {
    let mut editor = editor();
    editor
        .update(|txn| {
            let first = first_block(txn);
            let rule = txn.create_node("horizontalrule", Attributes::new())?;
            txn.insert_before(&first, &rule)
        })
        .unwrap();

    assert_eq!(body(&editor), "<hr><p></p>");
}

fn first_key(editor: &Editor) -> NodeKey {
    let state = editor.state();
    state.children_of(state.root_key())[0].clone()
}
