//! # Assertion Engine
//!
//! Side-effect-free predicates over a borrowed [`Document`], used by the
//! `assert_*` verbs. Every evaluation yields an [`AssertionReport`] naming the
//! predicate with its expected and observed values, so a harness can print a
//! diff instead of a bare boolean.
//!
//! Failure kinds:
//! - the referenced node or connection is absent → `NotFoundError`
//! - the referenced thing exists but differs → `AssertionFailed`

use crate::document::Document;
use crate::{BridgeError, ErrorKind, NodeId, ParamGroup, ParamValue};
use serde::{Deserialize, Serialize};

/// Outcome of one predicate, attached to both passing and failing results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionReport {
    pub predicate: String,
    pub passed: bool,
    pub expected: ParamValue,
    pub observed: ParamValue,
}

/// A failed assertion with its wire error kind.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub report: AssertionReport,
}

pub type AssertionOutcome = Result<AssertionReport, AssertionFailure>;

/// Read-only predicate evaluator.
#[derive(Debug, Clone, Copy)]
pub struct AssertionEngine<'a> {
    doc: &'a Document,
}

impl<'a> AssertionEngine<'a> {
    #[must_use]
    pub const fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    /// Pass iff `node` is present.
    pub fn exists(&self, node: NodeId) -> AssertionOutcome {
        let present = self.doc.contains_node(node);
        let report = AssertionReport {
            predicate: format!("exists({})", node),
            passed: present,
            expected: ParamValue::Boolean(true),
            observed: ParamValue::Boolean(present),
        };
        if present {
            Ok(report)
        } else {
            Err(failure(&BridgeError::NodeNotFound(node), report))
        }
    }

    /// Pass iff the document holds exactly `expected` nodes.
    pub fn count(&self, expected: usize) -> AssertionOutcome {
        let observed = self.doc.node_count();
        let report = AssertionReport {
            predicate: format!("count == {}", expected),
            passed: observed == expected,
            expected: ParamValue::Integer(expected as i64),
            observed: ParamValue::Integer(observed as i64),
        };
        if report.passed {
            Ok(report)
        } else {
            Err(AssertionFailure {
                kind: ErrorKind::AssertionFailed,
                message: format!("expected {} nodes, found {}", expected, observed),
                report,
            })
        }
    }

    /// Pass iff at least one edge runs from `source` to `target`.
    pub fn connection(&self, source: NodeId, target: NodeId) -> AssertionOutcome {
        let predicate = format!("connected({}, {})", source, target);
        let missing = [source, target]
            .into_iter()
            .find(|id| !self.doc.contains_node(*id));

        let edges = self.doc.connections_between(source, target);
        let report = AssertionReport {
            predicate,
            passed: !edges.is_empty(),
            expected: ParamValue::Boolean(true),
            observed: ParamValue::Boolean(!edges.is_empty()),
        };

        if let Some(id) = missing {
            return Err(failure(&BridgeError::NodeNotFound(id), report));
        }
        if edges.is_empty() {
            let feeds: Vec<String> = self
                .doc
                .connections_of(source)
                .iter()
                .filter(|c| c.source == source)
                .map(|c| format!("{}.{}", c.target, c.target_param))
                .collect();
            let detail = if feeds.is_empty() {
                format!("{} has no outgoing connections", source)
            } else {
                format!("{} feeds {}", source, feeds.join(", "))
            };
            let err = BridgeError::ConnectionNotFound(format!("{} -> {}", source, target));
            return Err(AssertionFailure {
                kind: err.kind(),
                message: format!("{} ({})", err, detail),
                report,
            });
        }
        Ok(report)
    }

    /// Pass iff a parameter (input first, then output) currently equals `expected`.
    pub fn param_equals(&self, node: NodeId, name: &str, expected: &ParamValue) -> AssertionOutcome {
        let predicate = format!("{}.{} == {}", node, name, expected);
        let unresolved = |err: BridgeError| {
            failure(
                &err,
                AssertionReport {
                    predicate: predicate.clone(),
                    passed: false,
                    expected: expected.clone(),
                    observed: ParamValue::Null,
                },
            )
        };

        let n = self
            .doc
            .node(node)
            .ok_or_else(|| unresolved(BridgeError::NodeNotFound(node)))?;
        let param = n
            .param(ParamGroup::Input, name)
            .or_else(|| n.param(ParamGroup::Output, name))
            .ok_or_else(|| {
                unresolved(BridgeError::ParamNotFound {
                    node,
                    group: ParamGroup::Input,
                    name: name.to_string(),
                })
            })?;

        let passed = param.value.matches(expected);
        let report = AssertionReport {
            predicate,
            passed,
            expected: expected.clone(),
            observed: param.value.clone(),
        };
        if passed {
            Ok(report)
        } else {
            Err(AssertionFailure {
                kind: ErrorKind::AssertionFailed,
                message: format!(
                    "{}.{}: expected {}, observed {}",
                    node, name, report.expected, report.observed
                ),
                report,
            })
        }
    }
}

fn failure(err: &BridgeError, report: AssertionReport) -> AssertionFailure {
    AssertionFailure {
        kind: err.kind(),
        message: err.to_string(),
        report,
    }
}

// =============================================================================
// TESTS
// =============================================================================
