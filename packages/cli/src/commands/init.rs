use anyhow::Result;
use clap::Args;
use colored::Colorize;
use outline_core::{EditorConfig, DEFAULT_CONFIG_NAME};
use std::fs;
use std::path::Path;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Typing coalescing window in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub merge_interval: u64,

    /// Maximum undo levels (0 = unlimited)
    #[arg(long, default_value_t = 100)]
    pub max_depth: usize,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &Path) -> Result<()> {
    let config_path = cwd.join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let mut config = EditorConfig::default();
    config.history.merge_interval_ms = args.merge_interval;
    config.history.max_depth = args.max_depth;

    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("Next steps:");
    println!("  1. Run: outline type \"# Hello\\nworld\"");
    println!("  2. Save a state with --json and view it with: outline render <file>");

    Ok(())
}
