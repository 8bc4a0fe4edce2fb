//! # Command Results
//!
//! `CommandResult` is the one response shape every command produces:
//! `{ success, payload?, error? }`. Payloads are tagged by `type` so a client
//! can branch on them without knowing which verb it sent.

use crate::assertion::{AssertionFailure, AssertionReport};
use crate::catalog::{CatalogMatch, NodeDescriptor};
use crate::document::{NodeMatch, RemovedNode};
use crate::export::DocumentSnapshot;
use crate::{BridgeError, Connection, ErrorKind, Node, NodeId, ParamGroup, ParamKind, ParamValue, Position};
use serde::{Deserialize, Serialize};

/// One parameter as reported by `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    pub group: ParamGroup,
    pub name: String,
    pub kind: ParamKind,
    pub value: ParamValue,
    /// Inputs: the feeding wire, if any. Outputs: every wire leaving it.
    pub connections: Vec<Connection>,
}

/// Successful command output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    NodeCreated {
        id: NodeId,
        type_name: String,
        position: Position,
    },
    NodeRemoved {
        id: NodeId,
        type_name: String,
        connections_removed: Vec<Connection>,
    },
    NodeMoved {
        id: NodeId,
        from: Position,
        to: Position,
    },
    Wired {
        connection: Connection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replaced: Option<Connection>,
    },
    Unwired {
        connections: Vec<Connection>,
    },
    ParamSet {
        id: NodeId,
        param: String,
        value: ParamValue,
    },
    Nodes {
        count: usize,
        nodes: Vec<Node>,
    },
    Connections {
        count: usize,
        connections: Vec<Connection>,
    },
    Search {
        query: String,
        types: Vec<CatalogMatch>,
        nodes: Vec<NodeMatch>,
    },
    Params {
        id: NodeId,
        type_name: String,
        params: Vec<ParamEntry>,
    },
    Catalog {
        count: usize,
        types: Vec<NodeDescriptor>,
    },
    Export {
        checksum: String,
        snapshot: DocumentSnapshot,
    },
    Cleared {
        nodes: usize,
        connections: usize,
    },
    Pong {
        version: String,
    },
    Assertion(AssertionReport),
}

impl From<RemovedNode> for Payload {
    fn from(removed: RemovedNode) -> Self {
        Self::NodeRemoved {
            id: removed.node.id,
            type_name: removed.node.type_name,
            connections_removed: removed.connections,
        }
    }
}

/// Error half of a failed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<AssertionReport>,
}

/// The response to exactly one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl CommandResult {
    #[must_use]
    pub fn ok(payload: Payload) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(ErrorBody {
                kind,
                message: message.into(),
                details: None,
            }),
        }
    }

    /// The wire kind of the failure, if this result failed.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

impl From<BridgeError> for CommandResult {
    fn from(err: BridgeError) -> Self {
        Self::failure(err.kind(), err.to_string())
    }
}

impl From<AssertionFailure> for CommandResult {
    fn from(failure: AssertionFailure) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(ErrorBody {
                kind: failure.kind,
                message: failure.message,
                details: Some(failure.report),
            }),
        }
    }
}

impl From<Result<Payload, BridgeError>> for CommandResult {
    fn from(result: Result<Payload, BridgeError>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_error_maps_to_kind_and_message() {
        let result = CommandResult::from(BridgeError::NodeNotFound(NodeId(4)));
        assert!(!result.success);
        assert!(result.payload.is_none());
        assert_eq!(result.error_kind(), Some(ErrorKind::NotFoundError));
        assert_eq!(
            result.error.map(|e| e.message),
            Some("node n4 not found".to_string())
        );
    }

    #[test]
    fn assertion_failure_carries_details() {
        let failure = AssertionFailure {
            kind: ErrorKind::AssertionFailed,
            message: "expected 2 nodes, found 1".to_string(),
            report: AssertionReport {
                predicate: "count == 2".to_string(),
                passed: false,
                expected: ParamValue::Integer(2),
                observed: ParamValue::Integer(1),
            },
        };
        let result = CommandResult::from(failure);
        let details = result
            .error
            .and_then(|e| e.details)
            .expect("details attached");
        assert_eq!(details.observed, ParamValue::Integer(1));
    }

    #[test]
    fn ok_result_has_no_error() {
        let result = CommandResult::ok(Payload::Pong {
            version: "0.0.0".to_string(),
        });
        assert!(result.success);
        assert_eq!(result.error_kind(), None);
    }
}
