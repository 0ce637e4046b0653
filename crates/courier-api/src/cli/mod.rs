//! CLI command definitions for the `courier` binary.
//!
//! Uses clap derive macros. Resource commands follow a noun-verb pattern
//! (`courier session list`, `courier memory show`).

pub mod memory;
pub mod run;
pub mod session;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Multi-channel conversation host for an agent runtime.
#[derive(Parser)]
#[command(name = "courier", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,courier_core=debug,courier_infra=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the host with the terminal as a chat channel.
    Run,

    /// Inspect or reset conversation sessions.
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Inspect the long-term memory documents.
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// List stored conversation sessions.
    #[command(alias = "ls")]
    List,

    /// Show the retained messages of one session.
    Show {
        /// Conversation key, e.g. "telegram:42".
        key: String,
    },

    /// Clear a session's messages without consolidating them.
    Clear {
        /// Conversation key, e.g. "telegram:42".
        key: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Print the long-term memory (MEMORY.md).
    Show,

    /// Print the consolidation history log (HISTORY.md).
    History {
        /// Only print the last N entries.
        #[arg(long, short = 'n')]
        last: Option<usize>,
    },
}
