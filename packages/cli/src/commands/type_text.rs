use super::{build_editor, html};
use crate::config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use outline_core::{CommitOutcome, Editor, NodeMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Args)]
pub struct TypeArgs {
    /// Keystrokes to type; `\n` is Enter, `\r` Shift+Enter, `\b` Backspace
    pub text: String,

    /// Print the serialized state instead of HTML
    #[arg(long)]
    pub json: bool,

    /// Print the plain text content instead of HTML
    #[arg(long, conflicts_with = "json")]
    pub text_only: bool,

    /// Print the render operations of every keystroke
    #[arg(long)]
    pub ops: bool,

    /// Undo this many steps after typing
    #[arg(long, default_value_t = 0)]
    pub undo: usize,

    /// Disable markdown shortcuts
    #[arg(long)]
    pub no_markdown: bool,

    /// Config file (defaults to outline.config.json in the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// One simulated key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    LineBreak,
    Backspace,
}

impl Key {
    fn label(&self) -> String {
        match self {
            Key::Char(' ') => "␠".to_string(),
            Key::Char(c) => c.to_string(),
            Key::Enter => "⏎".to_string(),
            Key::LineBreak => "⇧⏎".to_string(),
            Key::Backspace => "⌫".to_string(),
        }
    }

    fn press(&self, editor: &mut Editor) -> outline_core::EditorResult<CommitOutcome> {
        match *self {
            Key::Char(c) => editor.update(|txn| txn.insert_text(c.encode_utf8(&mut [0; 4]))),
            Key::Enter => editor.update(|txn| txn.insert_paragraph()),
            Key::LineBreak => editor.update(|txn| txn.insert_line_break()),
            Key::Backspace => editor.update(|txn| txn.delete_backward()),
        }
    }
}

/// Split `text` into key events, reading `\n`, `\r`, `\b` and `\\` escapes
/// as well as literal newlines
pub fn parse_keys(text: &str) -> Vec<Key> {
    let mut keys = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let key = match c {
            '\n' => Key::Enter,
            '\\' => match chars.peek().copied() {
                Some('n') => Key::Enter,
                Some('r') => Key::LineBreak,
                Some('b') => Key::Backspace,
                Some('\\') => Key::Char('\\'),
                _ => {
                    keys.push(Key::Char('\\'));
                    continue;
                }
            },
            c => {
                keys.push(Key::Char(c));
                continue;
            }
        };
        if c == '\\' {
            chars.next();
        }
        keys.push(key);
    }
    keys
}

pub fn type_text(args: TypeArgs, cwd: &Path) -> Result<()> {
    let config = config::load(cwd, args.config.as_deref())?;
    let mut editor = build_editor(config, !args.no_markdown, true)?;

    let keys = parse_keys(&args.text);
    let mut transforms = 0;
    for key in &keys {
        let outcome = key.press(&mut editor)?;
        transforms += outcome.transforms;
        debug!(key = %key.label(), version = outcome.version, ops = outcome.batch.len(), "Key pressed");
        for failure in &outcome.transform_errors {
            warn!(key = %key.label(), %failure, "Shortcut failed");
        }
        if args.ops {
            println!(
                "{} {} {}",
                key.label().bright_white().bold(),
                format!("v{}", outcome.version).dimmed(),
                serde_json::to_string(&outcome.batch.ops)?
            );
        }
    }

    let mut undone = 0;
    for _ in 0..args.undo {
        if !editor.undo()? {
            break;
        }
        undone += 1;
    }

    if args.json {
        println!("{}", editor.to_json()?);
    } else if args.text_only {
        let state = editor.state();
        println!("{}", state.text_content(state.root_key()));
    } else {
        println!("{}", html(&editor));
    }

    eprintln!(
        "{} {} keys, {} shortcuts, {} undone, version {}, {} undo levels left",
        "✓".green(),
        keys.len(),
        transforms,
        undone,
        editor.state().version(),
        editor.history().undo_levels()
    );

    Ok(())
}
