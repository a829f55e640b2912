pub mod init;
pub mod render;
pub mod type_text;

pub use init::{init, InitArgs};
pub use render::{render, RenderArgs};
pub use type_text::{type_text, TypeArgs};

use anyhow::Result;
use outline_core::{Editor, EditorConfig, VirtualSurface};
use outline_markdown::MarkdownShortcuts;

/// Editor with every rich-text node type, rendering into a virtual surface
pub(crate) fn build_editor(config: EditorConfig, markdown: bool, init: bool) -> Result<Editor> {
    let mut builder = outline_nodes::register_rich_text_nodes(
        Editor::builder().config(config).surface(VirtualSurface::new()),
    )?;
    if markdown {
        builder = builder.transform(MarkdownShortcuts::new()?);
    }
    if !init {
        builder = builder.skip_init();
    }
    Ok(builder.build()?)
}

pub(crate) fn html(editor: &Editor) -> String {
    editor
        .surface::<VirtualSurface>()
        .map(|surface| surface.to_html())
        .unwrap_or_default()
}
