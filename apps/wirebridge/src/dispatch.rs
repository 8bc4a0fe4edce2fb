//! # Command Dispatcher
//!
//! Routes each parsed [`Command`] to exactly one handler running against the
//! host's document, and folds every outcome into a [`CommandResult`]. Nothing
//! escapes this boundary: errors become failure results and a panicking
//! handler becomes an `InternalError` result.

use crate::host::HostState;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{info, warn};
use wirebridge_core::primitives::SEARCH_RESULT_LIMIT;
use wirebridge_core::{
    AssertionEngine, AssertionOutcome, BridgeError, Command, CommandResult, Connection, Document,
    ErrorKind, NodeId, ParamEntry, ParamGroup, Payload, is_blank_or_comment, parse_line,
};

// =============================================================================
// LINE INTAKE
// =============================================================================

/// What one raw input line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum LineRequest {
    /// Blank or comment line: no result is written.
    Skip,
    /// Unparseable line, answered without touching the document.
    Rejected(CommandResult),
    Command(Command),
}

impl LineRequest {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        if is_blank_or_comment(line) {
            return Self::Skip;
        }
        match parse_line(line) {
            Ok(command) => Self::Command(command),
            Err(err) => {
                warn!(line = %line.trim(), error = %err, "rejected command line");
                Self::Rejected(err.into())
            }
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Execute one command against the host state.
pub fn dispatch(state: &mut HostState, command: &Command) -> CommandResult {
    let started = Instant::now();
    let verb = command.verb();

    let result = panic::catch_unwind(AssertUnwindSafe(|| execute(state, command)))
        .unwrap_or_else(|cause| {
            let detail = cause
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            CommandResult::failure(
                ErrorKind::InternalError,
                format!("handler for '{}' panicked: {}", verb, detail),
            )
        });

    let elapsed_us = started.elapsed().as_micros() as u64;
    let mutation = verb.is_mutation();
    match &result.error {
        None => info!(%verb, %command, mutation, elapsed_us, "command ok"),
        Some(err) => warn!(
            %verb,
            %command,
            mutation,
            kind = %err.kind,
            message = %err.message,
            elapsed_us,
            "command failed"
        ),
    }
    result
}

/// Parse and dispatch one line in-process. `None` for blank and comment lines.
pub fn run_line(state: &mut HostState, line: &str) -> Option<CommandResult> {
    match LineRequest::parse(line) {
        LineRequest::Skip => None,
        LineRequest::Rejected(result) => Some(result),
        LineRequest::Command(command) => Some(dispatch(state, &command)),
    }
}

fn execute(state: &mut HostState, command: &Command) -> CommandResult {
    let HostState { document, catalog } = state;

    match command {
        Command::Add {
            type_name,
            position,
        } => document
            .add_node(catalog, type_name, *position)
            .and_then(|id| {
                let node = document
                    .node(id)
                    .ok_or_else(|| BridgeError::Internal(format!("{} vanished after add", id)))?;
                Ok(Payload::NodeCreated {
                    id,
                    type_name: node.type_name.clone(),
                    position: node.position,
                })
            })
            .into(),

        Command::Remove { node } => document.remove_node(*node).map(Payload::from).into(),

        Command::Move { node, position } => document
            .move_node(*node, *position)
            .map(|from| Payload::NodeMoved {
                id: *node,
                from,
                to: *position,
            })
            .into(),

        Command::Wire {
            source,
            target,
            params,
        } => {
            let resolved = match params {
                Some(p) => Ok((p.source.clone(), p.target.clone())),
                None => document
                    .primary_param(*source, ParamGroup::Output)
                    .and_then(|out| {
                        document
                            .primary_param(*target, ParamGroup::Input)
                            .map(|inp| (out, inp))
                    }),
            };
            resolved
                .and_then(|(out, inp)| document.connect(*source, &out, *target, &inp))
                .map(|outcome| Payload::Wired {
                    connection: outcome.connection,
                    replaced: outcome.replaced,
                })
                .into()
        }

        Command::Unwire {
            source,
            target,
            params,
        } => match params {
            Some(p) => document
                .disconnect(*source, &p.source, *target, &p.target)
                .map(|c| vec![c]),
            None => document.disconnect_between(*source, *target),
        }
        .map(|connections| Payload::Unwired { connections })
        .into(),

        Command::Set { node, param, value } => document
            .set_parameter(*node, param, value.clone())
            .map(|value| Payload::ParamSet {
                id: *node,
                param: param.clone(),
                value,
            })
            .into(),

        Command::List => {
            let nodes = document.list_nodes();
            CommandResult::ok(Payload::Nodes {
                count: nodes.len(),
                nodes,
            })
        }

        Command::Connections => {
            let connections = document.list_connections();
            CommandResult::ok(Payload::Connections {
                count: connections.len(),
                connections,
            })
        }

        Command::Search { query } => CommandResult::ok(Payload::Search {
            query: query.clone(),
            types: catalog.search(query, SEARCH_RESULT_LIMIT),
            nodes: document.search(query, SEARCH_RESULT_LIMIT),
        }),

        Command::Params { node } => params_of(document, *node).into(),

        Command::Catalog => {
            let types: Vec<_> = catalog.descriptors().cloned().collect();
            CommandResult::ok(Payload::Catalog {
                count: types.len(),
                types,
            })
        }

        Command::Export => {
            let snapshot = document.snapshot();
            snapshot
                .checksum()
                .map(|checksum| Payload::Export { checksum, snapshot })
                .into()
        }

        Command::Clear => {
            let dropped = document.clear();
            CommandResult::ok(Payload::Cleared {
                nodes: dropped.nodes,
                connections: dropped.connections,
            })
        }

        Command::Ping => CommandResult::ok(Payload::Pong {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),

        Command::AssertExists { node } => assertion(AssertionEngine::new(document).exists(*node)),
        Command::AssertCount { expected } => {
            assertion(AssertionEngine::new(document).count(*expected))
        }
        Command::AssertConnection { source, target } => {
            assertion(AssertionEngine::new(document).connection(*source, *target))
        }
        Command::AssertParam {
            node,
            param,
            expected,
        } => assertion(AssertionEngine::new(document).param_equals(*node, param, expected)),
    }
}

fn assertion(outcome: AssertionOutcome) -> CommandResult {
    match outcome {
        Ok(report) => CommandResult::ok(Payload::Assertion(report)),
        Err(failure) => failure.into(),
    }
}

/// Every parameter of a node with its wiring.
fn params_of(document: &Document, id: NodeId) -> Result<Payload, BridgeError> {
    let node = document.node(id).ok_or(BridgeError::NodeNotFound(id))?;
    let edges = document.connections_of(id);

    let inputs = node.inputs.iter().map(|p| ParamEntry {
        group: ParamGroup::Input,
        name: p.name.clone(),
        kind: p.kind,
        value: p.value.clone(),
        connections: document.incoming(id, &p.name).cloned().into_iter().collect(),
    });
    let outputs = node.outputs.iter().map(|p| ParamEntry {
        group: ParamGroup::Output,
        name: p.name.clone(),
        kind: p.kind,
        value: p.value.clone(),
        connections: edges
            .iter()
            .filter(|c| c.source == id && c.source_param == p.name)
            .cloned()
            .collect::<Vec<Connection>>(),
    });

    Ok(Payload::Params {
        id,
        type_name: node.type_name.clone(),
        params: inputs.chain(outputs).collect(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
