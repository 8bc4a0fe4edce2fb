//! # Document Graph Store
//!
//! The single source of truth for the live canvas document.
//!
//! All data structures use `BTreeMap` for deterministic ordering. Node ids are
//! handed out from a counter that only grows, so id order is creation order.
//! Connections are keyed by a wiring sequence number, so listing them yields
//! wiring order.
//!
//! Two indexes keep the invariants cheap to enforce:
//! - `inbound`: (target, input) → edge, so an input holds at most one wire
//! - `adjacency`: node → incident edges, so removing a node costs its degree

use crate::catalog::{NodeCatalog, fuzzy_score};
use crate::{BridgeError, Connection, Node, NodeId, ParamGroup, ParamValue, Position};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// OPERATION OUTCOMES
// =============================================================================

/// Result of wiring an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// The edge now feeding the input.
    pub connection: Connection,
    /// The edge it displaced, if the input was already wired elsewhere.
    pub replaced: Option<Connection>,
}

/// A node taken out of the document together with its wires.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    pub node: Node,
    pub connections: Vec<Connection>,
}

/// A live node matched by `search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMatch {
    pub id: NodeId,
    pub type_name: String,
    pub position: Position,
    pub score: u32,
}

/// What `clear` dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearOutcome {
    pub nodes: usize,
    pub connections: usize,
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// The live node/connection graph.
#[derive(Debug, Clone)]
pub struct Document {
    /// Node storage: NodeId -> Node
    nodes: BTreeMap<NodeId, Node>,

    /// Edge storage: wiring sequence -> Connection
    connections: BTreeMap<u64, Connection>,

    /// Single-inbound index: (target, target input) -> sequence
    inbound: BTreeMap<(NodeId, String), u64>,

    /// Incident edges per node (both directions)
    adjacency: BTreeMap<NodeId, BTreeSet<u64>>,

    /// Next NodeId; never reset, ids stay process-unique across `clear`
    next_node_id: u64,

    /// Next wiring sequence
    next_seq: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            connections: BTreeMap::new(),
            inbound: BTreeMap::new(),
            adjacency: BTreeMap::new(),
            next_node_id: 1,
            next_seq: 0,
        }
    }
}

impl Document {
    /// Create a new empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    /// Create a node of a catalog type at `position`.
    pub fn add_node(
        &mut self,
        catalog: &NodeCatalog,
        type_name: &str,
        position: Position,
    ) -> Result<NodeId, BridgeError> {
        let descriptor = catalog
            .resolve(type_name)
            .ok_or_else(|| BridgeError::UnknownType(type_name.to_string()))?;

        let id = NodeId(self.next_node_id);
        self.next_node_id = self.next_node_id.saturating_add(1);

        let node = Node {
            id,
            type_name: descriptor.name.clone(),
            position,
            inputs: descriptor.inputs.iter().map(|s| s.instantiate()).collect(),
            outputs: descriptor.outputs.iter().map(|s| s.instantiate()).collect(),
        };
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove a node and every connection touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<RemovedNode, BridgeError> {
        let node = self.nodes.remove(&id).ok_or(BridgeError::NodeNotFound(id))?;

        let incident = self.adjacency.remove(&id).unwrap_or_default();
        let connections = incident
            .into_iter()
            .filter_map(|seq| self.detach(seq))
            .collect();

        Ok(RemovedNode { node, connections })
    }

    /// Reposition a node. Returns the previous position.
    pub fn move_node(&mut self, id: NodeId, position: Position) -> Result<Position, BridgeError> {
        let node = self.nodes.get_mut(&id).ok_or(BridgeError::NodeNotFound(id))?;
        Ok(std::mem::replace(&mut node.position, position))
    }

    /// Set an input parameter. Returns the value as stored after coercion.
    pub fn set_parameter(
        &mut self,
        id: NodeId,
        name: &str,
        value: ParamValue,
    ) -> Result<ParamValue, BridgeError> {
        let node = self.nodes.get_mut(&id).ok_or(BridgeError::NodeNotFound(id))?;

        if node.input_mut(name).is_none() && node.param(ParamGroup::Output, name).is_some() {
            return Err(BridgeError::Validation(format!(
                "'{}' is an output of {} and is computed by the host",
                name, id
            )));
        }
        let param = node.input_mut(name).ok_or_else(|| BridgeError::ParamNotFound {
            node: id,
            group: ParamGroup::Input,
            name: name.to_string(),
        })?;

        let value = value.coerce_to(param.kind).map_err(|e| {
            BridgeError::Validation(format!("{}.{} ({}): {}", id, name, param.kind, e))
        })?;
        param.value = value.clone();
        Ok(value)
    }

    /// Name of the node's first parameter in `group`.
    pub fn primary_param(&self, id: NodeId, group: ParamGroup) -> Result<String, BridgeError> {
        let node = self.nodes.get(&id).ok_or(BridgeError::NodeNotFound(id))?;
        node.primary(group)
            .map(|p| p.name.clone())
            .ok_or(BridgeError::NoPrimaryParam { node: id, group })
    }

    // -------------------------------------------------------------------------
    // Connections
    // -------------------------------------------------------------------------

    /// Wire `source.source_param` (an output) into `target.target_param` (an input).
    ///
    /// An input accepts one wire: an existing edge into the same input is
    /// replaced in the same step. Wiring an identical edge again is a no-op.
    pub fn connect(
        &mut self,
        source: NodeId,
        source_param: &str,
        target: NodeId,
        target_param: &str,
    ) -> Result<ConnectOutcome, BridgeError> {
        self.require_param(source, ParamGroup::Output, source_param)?;
        self.require_param(target, ParamGroup::Input, target_param)?;

        let connection = Connection::new(source, source_param, target, target_param);
        let key = (target, target_param.to_string());

        let mut replaced = None;
        if let Some(&seq) = self.inbound.get(&key) {
            if self.connections.get(&seq) == Some(&connection) {
                return Ok(ConnectOutcome {
                    connection,
                    replaced: None,
                });
            }
            replaced = self.detach(seq);
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.connections.insert(seq, connection.clone());
        self.inbound.insert(key, seq);
        self.adjacency.entry(source).or_default().insert(seq);
        self.adjacency.entry(target).or_default().insert(seq);

        Ok(ConnectOutcome {
            connection,
            replaced,
        })
    }

    /// Remove one exact edge.
    pub fn disconnect(
        &mut self,
        source: NodeId,
        source_param: &str,
        target: NodeId,
        target_param: &str,
    ) -> Result<Connection, BridgeError> {
        let wanted = Connection::new(source, source_param, target, target_param);
        let seq = self
            .inbound
            .get(&(target, target_param.to_string()))
            .copied()
            .filter(|seq| self.connections.get(seq) == Some(&wanted))
            .ok_or_else(|| BridgeError::ConnectionNotFound(wanted.to_string()))?;

        self.detach(seq)
            .ok_or_else(|| BridgeError::Internal(format!("index out of sync for {}", wanted)))
    }

    /// Remove every edge from `source` to `target`, whatever the parameters.
    pub fn disconnect_between(
        &mut self,
        source: NodeId,
        target: NodeId,
    ) -> Result<Vec<Connection>, BridgeError> {
        let seqs = self.seqs_between(source, target);
        if seqs.is_empty() {
            return Err(BridgeError::ConnectionNotFound(format!(
                "{} -> {}",
                source, target
            )));
        }
        Ok(seqs.into_iter().filter_map(|seq| self.detach(seq)).collect())
    }

    /// All edges from `source` to `target`, in wiring order.
    #[must_use]
    pub fn connections_between(&self, source: NodeId, target: NodeId) -> Vec<Connection> {
        self.seqs_between(source, target)
            .into_iter()
            .filter_map(|seq| self.connections.get(&seq).cloned())
            .collect()
    }

    /// All edges touching `id`, in wiring order.
    #[must_use]
    pub fn connections_of(&self, id: NodeId) -> Vec<Connection> {
        self.adjacency
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|seq| self.connections.get(seq).cloned())
            .collect()
    }

    /// The edge feeding an input, if any.
    #[must_use]
    pub fn incoming(&self, id: NodeId, input: &str) -> Option<&Connection> {
        self.inbound
            .get(&(id, input.to_string()))
            .and_then(|seq| self.connections.get(seq))
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Iterate nodes in creation order without copying.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Iterate connections in wiring order without copying.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Owned snapshot of all nodes in creation order.
    #[must_use]
    pub fn list_nodes(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    /// Owned snapshot of all connections in wiring order.
    #[must_use]
    pub fn list_connections(&self) -> Vec<Connection> {
        self.connections.values().cloned().collect()
    }

    /// Ranked fuzzy search over live nodes by type name or id, ties by id.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<NodeMatch> {
        let mut hits: Vec<NodeMatch> = self
            .nodes
            .values()
            .filter_map(|n| {
                let by_type = fuzzy_score(query, &n.type_name);
                let by_id = fuzzy_score(query, &n.id.to_string());
                by_type.max(by_id).map(|score| NodeMatch {
                    id: n.id,
                    type_name: n.type_name.clone(),
                    position: n.position,
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        hits
    }

    /// Reset to an empty document. Node ids keep counting up.
    pub fn clear(&mut self) -> ClearOutcome {
        let outcome = ClearOutcome {
            nodes: self.nodes.len(),
            connections: self.connections.len(),
        };
        self.nodes.clear();
        self.connections.clear();
        self.inbound.clear();
        self.adjacency.clear();
        outcome
    }

    /// Next id `add_node` will hand out.
    #[must_use]
    pub fn next_node_id(&self) -> NodeId {
        NodeId(self.next_node_id)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn require_param(&self, id: NodeId, group: ParamGroup, name: &str) -> Result<(), BridgeError> {
        let node = self.nodes.get(&id).ok_or(BridgeError::NodeNotFound(id))?;
        if node.param(group, name).is_none() {
            return Err(BridgeError::ParamNotFound {
                node: id,
                group,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn seqs_between(&self, source: NodeId, target: NodeId) -> Vec<u64> {
        self.adjacency
            .get(&source)
            .into_iter()
            .flatten()
            .copied()
            .filter(|seq| {
                self.connections
                    .get(seq)
                    .is_some_and(|c| c.source == source && c.target == target)
            })
            .collect()
    }

    /// Drop one edge from storage and every index.
    fn detach(&mut self, seq: u64) -> Option<Connection> {
        let connection = self.connections.remove(&seq)?;
        self.inbound
            .remove(&(connection.target, connection.target_param.clone()));
        for endpoint in [connection.source, connection.target] {
            if let Some(set) = self.adjacency.get_mut(&endpoint) {
                set.remove(&seq);
                if set.is_empty() {
                    self.adjacency.remove(&endpoint);
                }
            }
        }
        Some(connection)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn doc_with(types: &[&str]) -> (Document, Vec<NodeId>) {
        let catalog = NodeCatalog::builtin();
        let mut doc = Document::new();
        let ids = types
            .iter()
            .map(|t| doc.add_node(&catalog, t, Position::new(0.0, 0.0)).expect("add"))
            .collect();
        (doc, ids)
    }

    #[test]
    fn add_assigns_sequential_ids_from_one() {
        let (doc, ids) = doc_with(&["Number Slider", "Panel"]);
        assert_eq!(ids, vec![NodeId(1), NodeId(2)]);
        assert_eq!(doc.node_count(), 2);
        assert_eq!(doc.node(NodeId(1)).map(|n| n.type_name.as_str()), Some("Number Slider"));
    }

    #[test]
    fn add_unknown_type_fails_without_consuming_an_id() {
        let catalog = NodeCatalog::builtin();
        let mut doc = Document::new();
        let err = doc
            .add_node(&catalog, "Flux Capacitor", Position::default())
            .expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::UnknownTypeError);
        assert_eq!(doc.next_node_id(), NodeId(1));
    }

    #[test]
    fn add_canonicalizes_type_name() {
        let catalog = NodeCatalog::builtin();
        let mut doc = Document::new();
        let id = doc
            .add_node(&catalog, "panel", Position::default())
            .expect("add");
        assert_eq!(doc.node(id).map(|n| n.type_name.as_str()), Some("Panel"));
    }

    #[test]
    fn remove_cascades_to_incident_connections() {
        let (mut doc, ids) = doc_with(&["Number Slider", "Addition", "Panel"]);
        doc.connect(ids[0], "output", ids[1], "a").expect("wire");
        doc.connect(ids[0], "output", ids[1], "b").expect("wire");
        doc.connect(ids[1], "result", ids[2], "input").expect("wire");

        let removed = doc.remove_node(ids[1]).expect("remove");

        assert_eq!(removed.connections.len(), 3);
        assert_eq!(doc.connection_count(), 0);
        assert!(doc.connections_of(ids[0]).is_empty());
        assert!(doc.incoming(ids[2], "input").is_none());
    }

    #[test]
    fn remove_missing_node_fails_loudly() {
        let mut doc = Document::new();
        let err = doc.remove_node(NodeId(5)).expect_err("missing");
        assert_eq!(err, BridgeError::NodeNotFound(NodeId(5)));
    }

    #[test]
    fn rewiring_an_input_replaces_the_previous_edge() {
        let (mut doc, ids) = doc_with(&["Number Slider", "Number Slider", "Panel"]);
        doc.connect(ids[0], "output", ids[2], "input").expect("wire");
        let outcome = doc.connect(ids[1], "output", ids[2], "input").expect("rewire");

        assert_eq!(
            outcome.replaced,
            Some(Connection::new(ids[0], "output", ids[2], "input"))
        );
        assert_eq!(doc.connection_count(), 1);
        assert_eq!(doc.incoming(ids[2], "input").map(|c| c.source), Some(ids[1]));
        assert!(doc.connections_of(ids[0]).is_empty());
    }

    #[test]
    fn identical_wire_is_a_no_op() {
        let (mut doc, ids) = doc_with(&["Number Slider", "Panel"]);
        doc.connect(ids[0], "output", ids[1], "input").expect("wire");
        let outcome = doc.connect(ids[0], "output", ids[1], "input").expect("again");
        assert!(outcome.replaced.is_none());
        assert_eq!(doc.connection_count(), 1);
    }

    #[test]
    fn outputs_fan_out() {
        let (mut doc, ids) = doc_with(&["Number Slider", "Panel", "Panel"]);
        doc.connect(ids[0], "output", ids[1], "input").expect("wire");
        doc.connect(ids[0], "output", ids[2], "input").expect("wire");
        assert_eq!(doc.connection_count(), 2);
    }

    #[test]
    fn connect_checks_parameter_direction() {
        let (mut doc, ids) = doc_with(&["Number Slider", "Panel"]);
        let err = doc
            .connect(ids[0], "value", ids[1], "input")
            .expect_err("value is an input");
        assert!(matches!(
            err,
            BridgeError::ParamNotFound {
                group: ParamGroup::Output,
                ..
            }
        ));

        let err = doc
            .connect(ids[0], "output", NodeId(99), "input")
            .expect_err("missing target");
        assert_eq!(err, BridgeError::NodeNotFound(NodeId(99)));
        assert_eq!(doc.connection_count(), 0);
    }

    #[test]
    fn disconnect_requires_exact_edge() {
        let (mut doc, ids) = doc_with(&["Number Slider", "Addition"]);
        doc.connect(ids[0], "output", ids[1], "a").expect("wire");

        let err = doc
            .disconnect(ids[0], "output", ids[1], "b")
            .expect_err("wrong input");
        assert_eq!(err.kind(), ErrorKind::NotFoundError);

        let removed = doc.disconnect(ids[0], "output", ids[1], "a").expect("unwire");
        assert_eq!(removed.target_param, "a");
        assert_eq!(doc.connection_count(), 0);
    }

    #[test]
    fn disconnect_between_removes_all_parallel_edges() {
        let (mut doc, ids) = doc_with(&["Number Slider", "Addition"]);
        doc.connect(ids[0], "output", ids[1], "a").expect("wire");
        doc.connect(ids[0], "output", ids[1], "b").expect("wire");

        assert_eq!(doc.connections_between(ids[0], ids[1]).len(), 2);
        let removed = doc.disconnect_between(ids[0], ids[1]).expect("unwire");
        assert_eq!(removed.len(), 2);
        assert!(doc.disconnect_between(ids[0], ids[1]).is_err());
    }

    #[test]
    fn self_loop_is_removed_with_its_node() {
        let (mut doc, ids) = doc_with(&["Number"]);
        doc.connect(ids[0], "output", ids[0], "input").expect("loop");
        let removed = doc.remove_node(ids[0]).expect("remove");
        assert_eq!(removed.connections.len(), 1);
        assert_eq!(doc.connection_count(), 0);
    }

    #[test]
    fn set_parameter_validates_shape() {
        let (mut doc, ids) = doc_with(&["Series"]);
        let stored = doc
            .set_parameter(ids[0], "start", ParamValue::Integer(2))
            .expect("int into number");
        assert_eq!(stored, ParamValue::Number(2.0));

        let err = doc
            .set_parameter(ids[0], "count", ParamValue::Number(2.5))
            .expect_err("float into integer");
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = doc
            .set_parameter(ids[0], "series", ParamValue::Integer(1))
            .expect_err("output");
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = doc
            .set_parameter(ids[0], "nope", ParamValue::Integer(1))
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFoundError);
    }

    #[test]
    fn move_returns_previous_position() {
        let (mut doc, ids) = doc_with(&["Panel"]);
        let before = doc
            .move_node(ids[0], Position::new(10.0, 20.0))
            .expect("move");
        assert_eq!(before, Position::new(0.0, 0.0));
        assert_eq!(
            doc.node(ids[0]).map(|n| n.position),
            Some(Position::new(10.0, 20.0))
        );
    }

    #[test]
    fn clear_empties_but_keeps_ids_unique() {
        let (mut doc, ids) = doc_with(&["Number Slider", "Panel"]);
        doc.connect(ids[0], "output", ids[1], "input").expect("wire");

        let outcome = doc.clear();
        assert_eq!(outcome, ClearOutcome { nodes: 2, connections: 1 });
        assert_eq!(doc.node_count(), 0);
        assert!(doc.list_connections().is_empty());

        let catalog = NodeCatalog::builtin();
        let next = doc
            .add_node(&catalog, "Panel", Position::default())
            .expect("add");
        assert_eq!(next, NodeId(3));
    }

    #[test]
    fn listings_are_in_creation_and_wiring_order() {
        let (mut doc, ids) = doc_with(&["Panel", "Number Slider", "Number Slider"]);
        doc.connect(ids[2], "output", ids[0], "input").expect("wire");
        doc.connect(ids[1], "output", ids[0], "input").expect("rewire");
        doc.connect(ids[2], "output", ids[1], "value").expect("wire");

        let listed: Vec<_> = doc.list_nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(listed, ids);

        let wires: Vec<_> = doc
            .list_connections()
            .into_iter()
            .map(|c| (c.source, c.target))
            .collect();
        assert_eq!(wires, vec![(ids[1], ids[0]), (ids[2], ids[1])]);
    }

    #[test]
    fn search_ranks_live_nodes_by_type_and_id() {
        let (doc, ids) = doc_with(&["Number Slider", "Panel", "Number"]);

        let hits = doc.search("number", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, ids[2]);
        assert_eq!(hits[1].id, ids[0]);

        let by_id = doc.search("n2", 10);
        assert_eq!(by_id[0].id, ids[1]);
        assert_eq!(by_id[0].score, 100);
    }
}
