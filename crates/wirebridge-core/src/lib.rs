//! # wirebridge-core
//!
//! The document graph engine for wirebridge - THE LOGIC.
//!
//! An automation client drives a visual-programming canvas by sending one
//! text command per line. This crate owns everything that does not need a
//! socket or a thread:
//! - `catalog`: the creatable node types and their parameter layouts
//! - `document`: the live node/connection graph and its invariants
//! - `command`: the line grammar and the typed `Command` enum
//! - `assertion`: read-only predicates behind the `assert_*` verbs
//! - `result`: the `CommandResult` response model
//! - `export`: full snapshots with id-independent checksums
//!
//! ## Architectural Constraints
//!
//! - No async, no network, no logging: the app crate adds those
//! - The `Document` is the single writer of canonical state
//! - Missing references fail loudly, never as silent no-ops

// =============================================================================
// MODULES
// =============================================================================

pub mod assertion;
pub mod catalog;
pub mod command;
pub mod document;
pub mod export;
pub mod primitives;
pub mod result;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BridgeError, Connection, ErrorKind, Node, NodeId, ParamGroup, ParamKind, ParamValue,
    Parameter, Position,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use assertion::{AssertionEngine, AssertionFailure, AssertionOutcome, AssertionReport};
pub use catalog::{CatalogMatch, NodeCatalog, NodeDescriptor, ParamSpec, fuzzy_score};
pub use command::{Command, ParamPair, Verb, is_blank_or_comment, parse_line};
pub use document::{ClearOutcome, ConnectOutcome, Document, NodeMatch, RemovedNode};
pub use export::{DocumentSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use result::{CommandResult, ErrorBody, ParamEntry, Payload};
