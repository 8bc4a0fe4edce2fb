//! # Core Type Definitions
//!
//! This module contains all core types for the wirebridge document graph:
//! - Identifiers and geometry (`NodeId`, `Position`)
//! - Parameter model (`ParamKind`, `ParamValue`, `ParamGroup`, `Parameter`)
//! - Graph elements (`Node`, `Connection`)
//! - Error types (`BridgeError`, `ErrorKind`)
//!
//! ## Determinism Guarantees
//!
//! - Identifiers implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Parameter groups are ordered `Vec`s, preserving the catalog declaration order
//! - Coordinates and numeric values are stored, never computed on

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Process-unique identifier of a node in the live document.
///
/// Rendered on the wire as `n<number>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = BridgeError;

    /// Accepts `n12`, `N12` or a bare `12`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('n')
            .or_else(|| s.strip_prefix('N'))
            .unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BridgeError::Parse(format!("invalid node id '{}'", s)));
        }
        digits
            .parse::<u64>()
            .map(NodeId)
            .map_err(|_| BridgeError::Parse(format!("node id '{}' is out of range", s)))
    }
}

impl Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A 2D canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// Declared kind of a parameter. Governs which values `set` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Number,
    Integer,
    Boolean,
    Text,
    /// Accepts any value shape.
    Generic,
}

impl ParamKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Text => "text",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two parameter groups of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamGroup {
    Input,
    Output,
}

impl fmt::Display for ParamGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Current value of a parameter.
///
/// Serialized untagged so results carry plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ParamValue {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Interpret a bare command-line token as a value literal.
    ///
    /// `true`/`false` become booleans, `null` is null, integer and float
    /// literals become numbers, anything else is text. Quoted tokens should
    /// be wrapped as `ParamValue::Text` by the caller instead.
    #[must_use]
    pub fn from_literal(token: &str) -> Self {
        match token {
            "true" => return Self::Boolean(true),
            "false" => return Self::Boolean(false),
            "null" => return Self::Null,
            _ => {}
        }
        if let Ok(i) = token.parse::<i64>() {
            return Self::Integer(i);
        }
        if let Ok(f) = token.parse::<f64>()
            && f.is_finite()
        {
            return Self::Number(f);
        }
        Self::Text(token.to_string())
    }

    /// Name of the value's shape, used in validation messages.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
        }
    }

    /// Convert this value into one acceptable for `kind`.
    ///
    /// Integers widen to numbers, any non-null scalar renders into text,
    /// and `Generic` accepts everything. Null clears any parameter.
    pub fn coerce_to(self, kind: ParamKind) -> Result<Self, BridgeError> {
        match (kind, self) {
            (_, Self::Null) => Ok(Self::Null),
            (ParamKind::Generic, v) => Ok(v),
            (ParamKind::Number, Self::Number(f)) => Ok(Self::Number(f)),
            (ParamKind::Number, Self::Integer(i)) => Ok(Self::Number(i as f64)),
            (ParamKind::Integer, Self::Integer(i)) => Ok(Self::Integer(i)),
            (ParamKind::Boolean, Self::Boolean(b)) => Ok(Self::Boolean(b)),
            (ParamKind::Text, v) => Ok(Self::Text(v.to_string())),
            (kind, v) => Err(BridgeError::Validation(format!(
                "expected a {} value, got {} '{}'",
                kind,
                v.shape(),
                v
            ))),
        }
    }

    /// Loose equality used by assertions: integers and numbers compare by value.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(i), Self::Number(f)) | (Self::Number(f), Self::Integer(i)) => {
                (*i as f64) == *f
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A named, typed parameter slot on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub value: ParamValue,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParamKind, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }
}

// =============================================================================
// NODE
// =============================================================================

/// A placed graph element.
///
/// Parameters are copied from the catalog descriptor at creation time; the
/// first entry of each group is the node's primary input/output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub type_name: String,
    pub position: Position,
    pub inputs: Vec<Parameter>,
    pub outputs: Vec<Parameter>,
}

impl Node {
    /// Look up a parameter by name within one group.
    #[must_use]
    pub fn param(&self, group: ParamGroup, name: &str) -> Option<&Parameter> {
        self.group(group).iter().find(|p| p.name == name)
    }

    /// Look up an input parameter by name, mutably.
    pub fn input_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.inputs.iter_mut().find(|p| p.name == name)
    }

    /// All parameters of one group in declaration order.
    #[must_use]
    pub fn group(&self, group: ParamGroup) -> &[Parameter] {
        match group {
            ParamGroup::Input => &self.inputs,
            ParamGroup::Output => &self.outputs,
        }
    }

    /// The first declared parameter of a group.
    #[must_use]
    pub fn primary(&self, group: ParamGroup) -> Option<&Parameter> {
        self.group(group).first()
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// A directed wire from an output parameter to an input parameter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeId,
    pub source_param: String,
    pub target: NodeId,
    pub target_param: String,
}

impl Connection {
    #[must_use]
    pub fn new(
        source: NodeId,
        source_param: impl Into<String>,
        target: NodeId,
        target_param: impl Into<String>,
    ) -> Self {
        Self {
            source,
            source_param: source_param.into(),
            target,
            target_param: target_param.into(),
        }
    }

    /// Whether either endpoint is `node`.
    #[must_use]
    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.target == node
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source, self.source_param, self.target, self.target_param
        )
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Error kinds reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ParseError,
    UnknownTypeError,
    NotFoundError,
    ValidationError,
    AssertionFailed,
    InternalError,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "ParseError",
            Self::UnknownTypeError => "UnknownTypeError",
            Self::NotFoundError => "NotFoundError",
            Self::ValidationError => "ValidationError",
            Self::AssertionFailed => "AssertionFailed",
            Self::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur anywhere in wirebridge.
///
/// - No silent failures: absent references fail loudly
/// - Every variant maps onto exactly one wire `ErrorKind`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The command line could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// The node type is not in the catalog.
    #[error("unknown node type '{0}'")]
    UnknownType(String),

    /// The referenced node does not exist.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The referenced parameter does not exist on the node.
    #[error("node {node} has no {group} parameter '{name}'")]
    ParamNotFound {
        node: NodeId,
        group: ParamGroup,
        name: String,
    },

    /// The node has no parameters in the group, so no default can be resolved.
    #[error("node {node} has no {group} parameters")]
    NoPrimaryParam { node: NodeId, group: ParamGroup },

    /// The referenced connection does not exist.
    #[error("connection {0} not found")]
    ConnectionNotFound(String),

    /// The value shape is incompatible with the parameter.
    #[error("{0}")]
    Validation(String),

    /// An unexpected fault.
    #[error("internal error: {0}")]
    Internal(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// The wire error kind for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::ParseError,
            Self::UnknownType(_) => ErrorKind::UnknownTypeError,
            Self::NodeNotFound(_)
            | Self::ParamNotFound { .. }
            | Self::NoPrimaryParam { .. }
            | Self::ConnectionNotFound(_) => ErrorKind::NotFoundError,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Internal(_) | Self::Io(_) | Self::Config(_) => ErrorKind::InternalError,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
