//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::Config;
use crate::dispatch::run_line;
use crate::host::{HostState, host_channel, spawn_host_thread};
use crate::transport::{self, encode_result};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use wirebridge_core::{BridgeError, NodeDescriptor, ParamSpec, is_blank_or_comment};

/// Maximum script size accepted by `run` (16 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 16 * 1024 * 1024;

fn io_error(context: &str, e: std::io::Error) -> BridgeError {
    BridgeError::Io(format!("{}: {}", context, e))
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the host loop and the transport server.
pub async fn cmd_serve(config: &Config, quiet: bool) -> Result<(), BridgeError> {
    let state = HostState::new(config.catalog()?);
    let types = state.catalog.len();
    let (handle, queue) = host_channel(state, config.queue_capacity);
    // detached: the loop ends once the last handle is dropped
    let _host_thread = spawn_host_thread(queue)?;

    if !quiet {
        print_banner(config, types);
    }
    tracing::info!(
        node_types = types,
        queue_capacity = config.queue_capacity,
        max_line_bytes = config.max_line_bytes,
        "host loop started"
    );

    transport::run_server(config, handle).await
}

/// Startup banner, on stderr so stdout stays clean.
fn print_banner(config: &Config, types: usize) {
    eprintln!();
    eprintln!("  wirebridge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    #[cfg(unix)]
    eprintln!("  Socket:     {}", config.socket_path().display());
    #[cfg(windows)]
    eprintln!("  Pipe:       {}", wirebridge_core::primitives::WINDOWS_PIPE_NAME);
    eprintln!("  Node types: {}", types);
    eprintln!("  Queue:      {}", config.queue_capacity);
    eprintln!();
    eprintln!("  Press Ctrl+C to stop");
    eprintln!();
}

// =============================================================================
// SEND COMMAND
// =============================================================================

/// Send command lines to a running server, printing each result line.
pub async fn cmd_send(config: &Config, commands: Vec<String>) -> Result<(), BridgeError> {
    let lines = if commands.is_empty() {
        read_stdin_lines().await?
    } else {
        commands
    };

    let mut out = std::io::stdout();

    #[cfg(unix)]
    {
        let path = config.socket_path();
        let stream = tokio::net::UnixStream::connect(&path)
            .await
            .map_err(|e| io_error(&format!("cannot connect to '{}'", path.display()), e))?;
        send_lines(stream, &lines, &mut out).await?;
    }

    #[cfg(windows)]
    {
        use tokio::net::windows::named_pipe::ClientOptions;
        use wirebridge_core::primitives::WINDOWS_PIPE_NAME;

        let _ = config;
        let stream = ClientOptions::new()
            .open(WINDOWS_PIPE_NAME)
            .map_err(|e| io_error(&format!("cannot open {}", WINDOWS_PIPE_NAME), e))?;
        send_lines(stream, &lines, &mut out).await?;
    }

    Ok(())
}

async fn read_stdin_lines() -> Result<Vec<String>, BridgeError> {
    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    let mut lines = Vec::new();
    while let Some(line) = reader
        .next_line()
        .await
        .map_err(|e| io_error("cannot read stdin", e))?
    {
        lines.push(line);
    }
    Ok(lines)
}

/// Write each command line and copy the matching result line to `out`.
///
/// An argument holding several lines is sent as one command per line.
/// Blank and comment lines are skipped locally since the server answers
/// them with nothing. Returns how many results were received.
pub async fn send_lines<IO, W>(stream: IO, lines: &[String], out: &mut W) -> Result<usize, BridgeError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    W: Write,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut responses = BufReader::new(read_half).lines();
    let mut received = 0;

    let frames = lines
        .iter()
        .flat_map(|l| l.split('\n'))
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !is_blank_or_comment(l));

    for line in frames {
        write_half
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| io_error("send failed", e))?;
        write_half
            .flush()
            .await
            .map_err(|e| io_error("send failed", e))?;

        let response = responses
            .next_line()
            .await
            .map_err(|e| io_error("receive failed", e))?
            .ok_or_else(|| BridgeError::Io("server closed the connection".to_string()))?;
        writeln!(out, "{}", response).map_err(|e| io_error("cannot write output", e))?;
        received += 1;
    }
    Ok(received)
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Outcome of an in-process script run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScriptSummary {
    pub executed: usize,
    pub failed: usize,
}

/// Execute a command script against a fresh in-process document.
pub fn cmd_run(config: &Config, script: &Path, fail_fast: bool) -> Result<(), BridgeError> {
    let metadata =
        std::fs::metadata(script).map_err(|e| io_error(&format!("cannot read '{}'", script.display()), e))?;
    if metadata.len() > MAX_SCRIPT_FILE_SIZE {
        return Err(BridgeError::Io(format!(
            "script size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_SCRIPT_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(script)
        .map_err(|e| io_error(&format!("cannot read '{}'", script.display()), e))?;

    let mut state = HostState::new(config.catalog()?);
    let stdout = std::io::stdout();
    let summary = run_script(&mut state, &text, fail_fast, &mut stdout.lock())?;

    tracing::info!(
        script = %script.display(),
        executed = summary.executed,
        failed = summary.failed,
        "script finished"
    );
    if summary.failed > 0 {
        return Err(BridgeError::Validation(format!(
            "{} of {} commands failed",
            summary.failed, summary.executed
        )));
    }
    Ok(())
}

/// Run every line of `script`, writing one JSON result line per command.
pub fn run_script<W: Write>(
    state: &mut HostState,
    script: &str,
    fail_fast: bool,
    out: &mut W,
) -> Result<ScriptSummary, BridgeError> {
    let mut summary = ScriptSummary::default();
    for line in script.lines() {
        let Some(result) = run_line(state, line) else {
            continue;
        };
        out.write_all(&encode_result(&result))
            .map_err(|e| io_error("cannot write output", e))?;
        summary.executed += 1;
        if !result.success {
            summary.failed += 1;
            if fail_fast {
                break;
            }
        }
    }
    Ok(summary)
}

// =============================================================================
// CATALOG COMMAND
// =============================================================================

/// List the creatable node types.
pub fn cmd_catalog(config: &Config, json_mode: bool) -> Result<(), BridgeError> {
    let catalog = config.catalog()?;
    let types: Vec<&NodeDescriptor> = catalog.descriptors().collect();

    if json_mode {
        let output = serde_json::to_string_pretty(&types)
            .map_err(|e| BridgeError::Internal(format!("catalog encoding: {}", e)))?;
        println!("{}", output);
        return Ok(());
    }

    println!("Node Catalog ({} types)", types.len());
    println!("====================");
    for descriptor in types {
        println!(
            "{:<16} {:<10} in: {:<28} out: {}",
            descriptor.name,
            descriptor.category,
            param_list(&descriptor.inputs),
            param_list(&descriptor.outputs)
        );
    }
    Ok(())
}

fn param_list(specs: &[ParamSpec]) -> String {
    if specs.is_empty() {
        return "-".to_string();
    }
    specs
        .iter()
        .map(|s| format!("{}:{}", s.name, s.kind))
        .collect::<Vec<_>>()
        .join(", ")
}
