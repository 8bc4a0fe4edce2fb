//! # Document Snapshot Export
//!
//! `DocumentSnapshot` is the self-contained, serializable picture of the
//! whole document returned by `export`.
//!
//! For comparison across documents the snapshot also has a canonical form:
//! node ids are renumbered by listing order and connections are sorted, then
//! the result is encoded with `postcard`. Two documents built by replaying the
//! same command sequence therefore share a checksum even when their ids were
//! generated differently.

use crate::document::Document;
use crate::{BridgeError, Connection, Node, NodeId, ParamKind, ParamValue, Parameter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot layout.
pub const SNAPSHOT_FORMAT_VERSION: u8 = 1;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Full copy of the document: nodes with parameters, then connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub version: u8,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

impl From<&Document> for DocumentSnapshot {
    fn from(doc: &Document) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            nodes: doc.list_nodes(),
            connections: doc.list_connections(),
        }
    }
}

impl Document {
    /// Self-contained copy of the whole document.
    #[must_use]
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot::from(self)
    }
}

/// Canonical node: id replaced by its 1-based listing index.
#[derive(Debug, Clone, Serialize)]
struct CanonicalNode<'a> {
    index: u64,
    type_name: &'a str,
    x: f64,
    y: f64,
    inputs: Vec<CanonicalParam<'a>>,
    outputs: Vec<CanonicalParam<'a>>,
}

/// Parameter with an explicitly tagged value. The wire form of
/// `ParamValue` is untagged, which postcard cannot tell apart.
#[derive(Debug, Clone, Serialize)]
struct CanonicalParam<'a> {
    name: &'a str,
    kind: ParamKind,
    value: CanonicalValue<'a>,
}

#[derive(Debug, Clone, Serialize)]
enum CanonicalValue<'a> {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Text(&'a str),
}

impl<'a> From<&'a Parameter> for CanonicalParam<'a> {
    fn from(param: &'a Parameter) -> Self {
        let value = match &param.value {
            ParamValue::Null => CanonicalValue::Null,
            ParamValue::Boolean(b) => CanonicalValue::Boolean(*b),
            ParamValue::Integer(i) => CanonicalValue::Integer(*i),
            ParamValue::Number(f) => CanonicalValue::Number(*f),
            ParamValue::Text(s) => CanonicalValue::Text(s),
        };
        Self {
            name: &param.name,
            kind: param.kind,
            value,
        }
    }
}

/// Canonical connection over listing indexes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
struct CanonicalConnection<'a> {
    source: u64,
    source_param: &'a str,
    target: u64,
    target_param: &'a str,
}

#[derive(Debug, Serialize)]
struct CanonicalSnapshot<'a> {
    version: u8,
    nodes: Vec<CanonicalNode<'a>>,
    connections: Vec<CanonicalConnection<'a>>,
}

impl DocumentSnapshot {
    /// Deterministic, id-independent encoding of the snapshot.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, BridgeError> {
        let index: BTreeMap<NodeId, u64> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i as u64 + 1))
            .collect();

        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| CanonicalNode {
                index: i as u64 + 1,
                type_name: &n.type_name,
                x: n.position.x,
                y: n.position.y,
                inputs: n.inputs.iter().map(CanonicalParam::from).collect(),
                outputs: n.outputs.iter().map(CanonicalParam::from).collect(),
            })
            .collect();

        let mut connections = self
            .connections
            .iter()
            .map(|c| {
                let lookup = |id: NodeId| {
                    index.get(&id).copied().ok_or_else(|| {
                        BridgeError::Internal(format!("connection {} references {}", c, id))
                    })
                };
                Ok(CanonicalConnection {
                    source: lookup(c.source)?,
                    source_param: &c.source_param,
                    target: lookup(c.target)?,
                    target_param: &c.target_param,
                })
            })
            .collect::<Result<Vec<_>, BridgeError>>()?;
        connections.sort();

        let canonical = CanonicalSnapshot {
            version: self.version,
            nodes,
            connections,
        };
        postcard::to_allocvec(&canonical)
            .map_err(|e| BridgeError::Internal(format!("snapshot encoding: {}", e)))
    }

    /// Hex checksum of the canonical encoding.
    ///
    /// BLAKE3 with the `crypto-hash` feature, FNV-1a 64 otherwise.
    pub fn checksum(&self) -> Result<String, BridgeError> {
        let bytes = self.canonical_bytes()?;
        Ok(hash_bytes(&bytes))
    }
}

#[cfg(feature = "crypto-hash")]
fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[cfg(not(feature = "crypto-hash"))]
fn hash_bytes(data: &[u8]) -> String {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = data.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    });
    format!("{:016x}", hash)
}

// =============================================================================
// TESTS
// =============================================================================
