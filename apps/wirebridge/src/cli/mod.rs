//! # wirebridge CLI Module
//!
//! ## Available Commands
//!
//! - `serve` - Run the command server on the local socket
//! - `send` - Send command lines to a running server and print the results
//! - `run` - Execute a command script against an in-process document
//! - `catalog` - List the creatable node types

mod commands;

use crate::config::{Config, LogFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wirebridge_core::BridgeError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// wirebridge - remote command bridge for visual-programming canvases
///
/// Accepts one text command per line over a local socket and answers each
/// with one JSON result line.
#[derive(Parser, Debug)]
#[command(name = "wirebridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Unix socket path (overrides config and WIREBRIDGE_SOCKET)
    #[arg(short = 'S', long, global = true)]
    pub socket: Option<PathBuf>,

    /// Log format: text or json (overrides config and WIREBRIDGE_LOG_FORMAT)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the command server
    Serve {
        /// Pending host jobs before submitters wait
        #[arg(long)]
        queue_capacity: Option<usize>,

        /// Longest accepted command line in bytes
        #[arg(long)]
        max_line_bytes: Option<usize>,
    },

    /// Send commands to a running server (reads stdin when none are given)
    Send {
        /// Command lines, e.g. 'add "Number Slider" 100 100'
        commands: Vec<String>,
    },

    /// Execute a command script in-process, one JSON result per line
    Run {
        /// Script file, one command per line, `#` starts a comment
        script: PathBuf,

        /// Stop at the first failing command
        #[arg(long)]
        fail_fast: bool,
    },

    /// List the creatable node types
    Catalog {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Resolve configuration: file, then environment, then flags.
    pub fn settings(&self) -> Result<Config, BridgeError> {
        let mut config = Config::resolve(self.config.as_deref())?;
        if let Some(socket) = &self.socket {
            config.socket_path = Some(socket.clone());
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Commands::Serve {
            queue_capacity,
            max_line_bytes,
        } = &self.command
        {
            if let Some(capacity) = queue_capacity {
                config.queue_capacity = *capacity;
            }
            if let Some(limit) = max_line_bytes {
                config.max_line_bytes = *limit;
            }
        }
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and resolved settings.
pub async fn execute(cli: Cli, config: Config) -> Result<(), BridgeError> {
    match cli.command {
        Commands::Serve { .. } => cmd_serve(&config, cli.quiet).await,
        Commands::Send { commands } => cmd_send(&config, commands).await,
        Commands::Run { script, fail_fast } => cmd_run(&config, &script, fail_fast),
        Commands::Catalog { json } => cmd_catalog(&config, json),
    }
}
