//! # Transport Server
//!
//! Newline-delimited UTF-8 over a local channel: a Unix domain socket, or the
//! named pipe `\\.\pipe\wirebridge` on Windows.
//!
//! Each connection runs in its own task and is strictly request/response:
//! one line in, at most one JSON line out, in order. Lines are parsed on the
//! connection task; only well-formed commands are marshalled onto the host.

use crate::config::Config;
use crate::dispatch::{LineRequest, dispatch};
use crate::host::HostHandle;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use wirebridge_core::{BridgeError, CommandResult, ErrorKind};

#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::net::UnixListener;

/// Written when a result cannot be encoded, so the client still gets a line.
const ENCODING_FAILURE: &[u8] =
    br#"{"success":false,"error":{"kind":"InternalError","message":"result encoding failed"}}"#;

/// What every connection task needs.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub host: HostHandle,
    pub max_line_bytes: usize,
}

impl ConnectionContext {
    #[must_use]
    pub fn new(host: HostHandle, max_line_bytes: usize) -> Self {
        Self {
            host,
            max_line_bytes,
        }
    }
}

// =============================================================================
// LISTENERS
// =============================================================================

/// Bind the socket, removing a stale socket left by a previous run.
///
/// Fails if another server is still answering on `path`, or if `path` is
/// something other than a socket.
#[cfg(unix)]
pub async fn bind_unix(path: &Path) -> Result<UnixListener, BridgeError> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if !meta.file_type().is_socket() => {
            return Err(BridgeError::Io(format!(
                "'{}' exists and is not a socket",
                path.display()
            )));
        }
        Ok(_) => {
            if tokio::net::UnixStream::connect(path).await.is_ok() {
                return Err(BridgeError::Io(format!(
                    "another server is listening on '{}'",
                    path.display()
                )));
            }
            debug!(socket = %path.display(), "removing stale socket file");
            std::fs::remove_file(path).map_err(|e| {
                BridgeError::Io(format!("cannot remove stale socket '{}': {}", path.display(), e))
            })?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(BridgeError::Io(format!(
                "cannot inspect '{}': {}",
                path.display(),
                e
            )));
        }
    }
    UnixListener::bind(path)
        .map_err(|e| BridgeError::Io(format!("bind '{}' failed: {}", path.display(), e)))
}

/// Removes the socket file when dropped.
#[cfg(unix)]
#[derive(Debug)]
pub struct SocketGuard {
    path: PathBuf,
}

#[cfg(unix)]
impl SocketGuard {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[cfg(unix)]
impl Drop for SocketGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(socket = %self.path.display(), error = %e, "could not remove socket file");
        }
    }
}

/// Accept connections, one task each, until the host loop stops.
#[cfg(unix)]
pub async fn serve_unix(listener: UnixListener, ctx: ConnectionContext) -> Result<(), BridgeError> {
    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| BridgeError::Io(format!("accept failed: {}", e)))?;
        if ctx.host.is_closed() {
            return Err(host_stopped());
        }
        let connection_ctx = ctx.clone();
        tokio::spawn(async move {
            debug!("client connected");
            if let Err(error) = serve_connection(stream, connection_ctx).await {
                warn!(%error, "connection closed with error");
            }
            debug!("client disconnected");
        });
    }
}

/// Serve the well-known named pipe, one instance per client.
#[cfg(windows)]
pub async fn serve_named_pipe(ctx: ConnectionContext) -> Result<(), BridgeError> {
    use tokio::net::windows::named_pipe::ServerOptions;
    use wirebridge_core::primitives::WINDOWS_PIPE_NAME;

    let mut first = true;
    loop {
        let server = ServerOptions::new()
            .first_pipe_instance(first)
            .create(WINDOWS_PIPE_NAME)
            .map_err(|e| BridgeError::Io(format!("cannot create pipe {}: {}", WINDOWS_PIPE_NAME, e)))?;
        first = false;
        server
            .connect()
            .await
            .map_err(|e| BridgeError::Io(format!("pipe connect failed: {}", e)))?;
        if ctx.host.is_closed() {
            return Err(host_stopped());
        }

        let connection_ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(error) = serve_connection(server, connection_ctx).await {
                warn!(%error, "connection closed with error");
            }
        });
    }
}

#[cfg(any(unix, windows))]
fn host_stopped() -> BridgeError {
    BridgeError::Internal("host loop has stopped; no longer accepting clients".to_string())
}

/// Listen on the configured socket until Ctrl+C.
#[cfg(unix)]
pub async fn run_server(config: &Config, host: HostHandle) -> Result<(), BridgeError> {
    let ctx = ConnectionContext::new(host, config.max_line_bytes);
    let path = config.socket_path();
    let listener = bind_unix(&path).await?;
    let _guard = SocketGuard::new(path.clone());
    info!(socket = %path.display(), "wirebridge listening");

    tokio::select! {
        served = serve_unix(listener, ctx) => served,
        () = shutdown_signal() => Ok(()),
    }
}

/// Listen on the well-known pipe until Ctrl+C.
#[cfg(windows)]
pub async fn run_server(config: &Config, host: HostHandle) -> Result<(), BridgeError> {
    let ctx = ConnectionContext::new(host, config.max_line_bytes);
    info!(pipe = wirebridge_core::primitives::WINDOWS_PIPE_NAME, "wirebridge listening");

    tokio::select! {
        served = serve_named_pipe(ctx) => served,
        () = shutdown_signal() => Ok(()),
    }
}

#[cfg(any(unix, windows))]
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl+C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// CONNECTION LOOP
// =============================================================================

/// One framed line, or why there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Line,
    TooLong,
    Eof,
}

/// Read up to the next `\n`, keeping at most `limit` bytes plus line ending.
///
/// An oversized line is consumed in full and reported as `TooLong`, so the
/// next read starts on the following line.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut overflow = false;
    let mut seen_any = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (seen_any, overflow) {
                (false, _) => Frame::Eof,
                (true, true) => Frame::TooLong,
                (true, false) => Frame::Line,
            });
        }
        seen_any = true;

        let (used, done) = match available.iter().position(|b| *b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        if !overflow {
            if buf.len() + used > limit.saturating_add(2) {
                overflow = true;
                buf.clear();
            } else {
                buf.extend_from_slice(&available[..used]);
            }
        }
        reader.consume(used);

        if done {
            return Ok(if overflow { Frame::TooLong } else { Frame::Line });
        }
    }
}

fn trim_line_endings(line: &mut Vec<u8>) {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
}

fn too_long(limit: usize) -> CommandResult {
    CommandResult::failure(
        ErrorKind::ParseError,
        format!("line exceeds {} bytes", limit),
    )
}

/// Serialize one result as a compact JSON line.
#[must_use]
pub fn encode_result(result: &CommandResult) -> Vec<u8> {
    let mut encoded = serde_json::to_vec(result).unwrap_or_else(|e| {
        warn!(error = %e, "cannot encode result");
        ENCODING_FAILURE.to_vec()
    });
    encoded.push(b'\n');
    encoded
}

/// Handle a single client stream. Each command line yields one result line.
pub async fn serve_connection<IO>(stream: IO, ctx: ConnectionContext) -> Result<(), BridgeError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = io::split(stream);
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    loop {
        let frame = read_frame(&mut reader, &mut buf, ctx.max_line_bytes)
            .await
            .map_err(|e| BridgeError::Io(format!("read failed: {}", e)))?;

        let result = match frame {
            Frame::Eof => return Ok(()),
            Frame::TooLong => {
                warn!(limit = ctx.max_line_bytes, "rejected oversized line");
                Some(too_long(ctx.max_line_bytes))
            }
            Frame::Line => {
                trim_line_endings(&mut buf);
                respond(&ctx, &buf).await
            }
        };

        if let Some(result) = result {
            write_half
                .write_all(&encode_result(&result))
                .await
                .map_err(|e| BridgeError::Io(format!("write failed: {}", e)))?;
            write_half
                .flush()
                .await
                .map_err(|e| BridgeError::Io(format!("flush failed: {}", e)))?;
        }
    }
}

async fn respond(ctx: &ConnectionContext, line: &[u8]) -> Option<CommandResult> {
    if line.len() > ctx.max_line_bytes {
        return Some(too_long(ctx.max_line_bytes));
    }
    let Ok(text) = std::str::from_utf8(line) else {
        warn!("rejected line that is not valid UTF-8");
        return Some(CommandResult::failure(
            ErrorKind::ParseError,
            "line is not valid UTF-8",
        ));
    };

    match LineRequest::parse(text) {
        LineRequest::Skip => None,
        LineRequest::Rejected(result) => Some(result),
        LineRequest::Command(command) => Some(
            ctx.host
                .run(move |state| dispatch(state, &command))
                .await
                .unwrap_or_else(CommandResult::from),
        ),
    }
}

// =============================================================================
// TESTS
// =============================================================================
