mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{init, render, type_text, InitArgs, RenderArgs, TypeArgs};

/// Outline CLI - drive the Outline editor engine from the terminal
#[derive(Parser, Debug)]
#[command(name = "outline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log engine activity (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default outline.config.json
    Init(InitArgs),

    /// Simulate typing into a fresh editor and print the document
    #[command(name = "type")]
    Type(TypeArgs),

    /// Render a serialized editor state
    Render(RenderArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| match cli.command {
            Command::Init(args) => init(args, &cwd),
            Command::Type(args) => type_text(args, &cwd),
            Command::Render(args) => render(args, &cwd),
        });

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
