//! # Configuration
//!
//! Settings come from three layers, later ones winning:
//! 1. an optional TOML file (`--config PATH`)
//! 2. environment variables (`WIREBRIDGE_SOCKET`, `WIREBRIDGE_LOG_FORMAT`)
//! 3. command-line flags, applied by the CLI
//!
//! ```toml
//! socket_path = "/run/user/1000/wirebridge.sock"
//! queue_capacity = 256
//! max_line_bytes = 65536
//! log_format = "json"
//!
//! [[node_types]]
//! name = "Remap"
//! category = "Maths"
//! inputs = [{ name = "value", kind = "number", default = 0.0 }]
//! outputs = [{ name = "mapped", kind = "number" }]
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use wirebridge_core::primitives::{
    DEFAULT_MAX_LINE_BYTES, DEFAULT_QUEUE_CAPACITY, DEFAULT_SOCKET_NAME,
};
use wirebridge_core::{BridgeError, NodeCatalog, NodeDescriptor};

/// Environment variable overriding the socket path.
pub const ENV_SOCKET: &str = "WIREBRIDGE_SOCKET";

/// Environment variable selecting the log format (`text` or `json`).
pub const ENV_LOG_FORMAT: &str = "WIREBRIDGE_LOG_FORMAT";

// =============================================================================
// LOG FORMAT
// =============================================================================

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(BridgeError::Config(format!(
                "unknown log format '{}' (expected text or json)",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Resolved server settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Unix socket path; `None` means `$TMPDIR/wirebridge.sock`.
    pub socket_path: Option<PathBuf>,
    /// Host queue capacity.
    pub queue_capacity: usize,
    /// Longest accepted command line, in bytes.
    pub max_line_bytes: usize,
    pub log_format: LogFormat,
    /// Extra node types registered on top of the built-in catalog.
    pub node_types: Vec<NodeDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            log_format: LogFormat::Text,
            node_types: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, BridgeError> {
        let config: Self =
            toml::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, or return the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, BridgeError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(socket) = lookup(ENV_SOCKET).filter(|s| !s.trim().is_empty()) {
            self.socket_path = Some(PathBuf::from(socket));
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.log_format = format.parse()?;
        }
        Ok(self)
    }

    /// File then process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, BridgeError> {
        Self::load(path)?.with_env(|key| std::env::var(key).ok())
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.queue_capacity == 0 {
            return Err(BridgeError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_line_bytes == 0 {
            return Err(BridgeError::Config(
                "max_line_bytes must be at least 1".to_string(),
            ));
        }
        self.node_types.iter().try_for_each(NodeDescriptor::validate)
    }

    /// Socket path with the default filled in.
    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_SOCKET_NAME))
    }

    /// The built-in catalog extended with the configured node types.
    pub fn catalog(&self) -> Result<NodeCatalog, BridgeError> {
        let mut catalog = NodeCatalog::builtin();
        for descriptor in &self.node_types {
            catalog.register(descriptor.clone())?;
        }
        Ok(catalog)
    }
}

// =============================================================================
// TESTS
// =============================================================================
