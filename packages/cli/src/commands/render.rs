use super::{build_editor, html};
use crate::config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use outline_core::NodeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Serialized editor state (JSON)
    pub file: PathBuf,

    /// Print the plain text content instead of HTML
    #[arg(long)]
    pub text_only: bool,

    /// Print the initial render operations
    #[arg(long)]
    pub ops: bool,

    /// Config file (defaults to outline.config.json in the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn render(args: RenderArgs, cwd: &Path) -> Result<()> {
    let config = config::load(cwd, args.config.as_deref())?;
    let path = cwd.join(&args.file);
    let source = fs::read_to_string(&path).with_context(|| format!("Cannot read {}", path.display()))?;

    let output = render_source(config, &source, args.text_only, args.ops)
        .with_context(|| format!("Cannot render {}", path.display()))?;
    println!("{}", output);
    Ok(())
}

fn render_source(config: outline_core::EditorConfig, source: &str, text_only: bool, ops: bool) -> Result<String> {
    let mut editor = build_editor(config, false, false)?;
    let state = editor.parse_state(source)?;
    let outcome = editor.set_state(state)?;

    if ops {
        for op in &outcome.batch.ops {
            eprintln!("  {} {}", op.name().cyan(), serde_json::to_string(op)?);
        }
    }

    if text_only {
        let state = editor.state();
        return Ok(state.text_content(state.root_key()));
    }
    Ok(html(&editor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use outline_core::EditorConfig;

    const DOC: &str = r#"{
        "root": {
            "type": "root",
            "children": [
                { "type": "heading", "attributes": { "level": 2 }, "children": [{ "type": "text", "text": "Notes" }] },
                { "type": "list", "attributes": { "listType": "bullet" }, "children": [
                    { "type": "listitem", "children": [{ "type": "text", "text": "milk", "format": 1 }] }
                ] }
            ]
        }
    }"#;

    #[test]
    fn test_render_html() {
        let html = render_source(EditorConfig::default(), DOC, false, false).unwrap();
        assert_eq!(
            html,
            "<div contenteditable=\"true\" data-outline-editor=\"true\">\
             <h2><span data-outline-text=\"true\">Notes</span></h2>\
             <ul><li><strong data-outline-text=\"true\">milk</strong></li></ul></div>"
        );
    }

    #[test]
    fn test_render_text() {
        let text = render_source(EditorConfig::default(), DOC, true, false).unwrap();
        assert_eq!(text, "Notes\n\nmilk");
    }

    #[test]
    fn test_render_file_relative_to_cwd() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc.json"), DOC).unwrap();
        let args = RenderArgs {
            file: PathBuf::from("doc.json"),
            text_only: true,
            ops: false,
            config: None,
        };
        render(args, dir.path()).unwrap();
    }

    #[test]
    fn test_unknown_node_type_fails() {
        let doc = r#"{ "root": { "type": "root", "children": [{ "type": "table" }] } }"#;
        assert!(render_source(EditorConfig::default(), doc, false, false).is_err());
    }
}
