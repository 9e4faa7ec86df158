//! # tg-cli
//!
//! Command-line interface for Tool Gate.
//!
//! - `tg submit` — send one tool request through the gate kernel
//! - `tg receipts verify/latest/tail` — inspect the hash-chained receipt ledger
//! - `tg integrity generate/keygen/sign/verify` — manage the integrity manifest

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tg_gate::GateConfig;
use tracing_subscriber::EnvFilter;

/// Tool Gate CLI — gate, confirm, and audit agent tool calls.
#[derive(Parser)]
#[command(name = "tg", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a tool request (JSON) to the gate.
    Submit {
        /// Request JSON. Reads stdin when omitted or "-".
        request: Option<String>,
        /// Read the request from a file instead.
        #[arg(long, conflicts_with = "request")]
        file: Option<PathBuf>,
        /// Directory the filesystem tools are confined to (defaults to <project root>/tmp).
        #[arg(long)]
        sandbox: Option<PathBuf>,
    },
    /// Inspect the receipt ledger.
    Receipts {
        #[command(subcommand)]
        command: commands::receipts::ReceiptsCommands,
    },
    /// Manage the integrity manifest.
    Integrity {
        #[command(subcommand)]
        command: commands::integrity::IntegrityCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tg_gate=info".parse()?)
                .add_directive("tg_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = GateConfig::load(&project_root)?;

    match &cli.command {
        Commands::Submit {
            request,
            file,
            sandbox,
        } => commands::submit::execute(
            &config,
            request.as_deref(),
            file.as_deref(),
            sandbox.as_deref(),
        ),
        Commands::Receipts { command } => commands::receipts::execute(command, &config),
        Commands::Integrity { command } => commands::integrity::execute(command, &config),
    }
}
