//! # Protocol Primitives
//!
//! Hardcoded constants shared by the core and the transport.
//!
//! These are compiled into the binary; the ones marked as defaults can be
//! overridden through configuration.

/// Well-known file name of the Unix domain socket inside the temp directory.
pub const DEFAULT_SOCKET_NAME: &str = "wirebridge.sock";

/// Well-known Windows named pipe.
pub const WINDOWS_PIPE_NAME: &str = r"\\.\pipe\wirebridge";

/// Default upper bound on one command line, in bytes (excluding the newline).
///
/// Longer lines are answered with a `ParseError` and discarded.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Default capacity of the host work queue.
///
/// Submitters wait for a free slot once this many jobs are pending.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Maximum number of hits per group returned by `search`.
pub const SEARCH_RESULT_LIMIT: usize = 20;

/// Lines starting with this character are comments.
pub const COMMENT_PREFIX: char = '#';
