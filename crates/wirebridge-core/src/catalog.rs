//! # Node Catalog
//!
//! The table of creatable node types supplied by the host application.
//!
//! A node type is resolved by name when a node is added; its descriptor
//! fixes the node's ordered input and output parameters. The first
//! parameter of each group is the node's primary input/output, which is
//! what `wire` falls back to when the caller names no parameters.

use crate::{BridgeError, ParamKind, ParamValue, Parameter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// Declaration of one parameter slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub default: ParamValue,
}

impl ParamSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParamKind, default: ParamValue) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
        }
    }

    /// Instantiate the parameter with its default value.
    #[must_use]
    pub fn instantiate(&self) -> Parameter {
        Parameter::new(&self.name, self.kind, self.default.clone())
    }
}

/// A creatable node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<ParamSpec>,
    #[serde(default)]
    pub outputs: Vec<ParamSpec>,
}

impl NodeDescriptor {
    /// Check that parameter names are unique within each group.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.name.trim().is_empty() {
            return Err(BridgeError::Config(
                "node type name must not be empty".to_string(),
            ));
        }
        for (group, specs) in [("input", &self.inputs), ("output", &self.outputs)] {
            for (i, spec) in specs.iter().enumerate() {
                if specs[..i].iter().any(|other| other.name == spec.name) {
                    return Err(BridgeError::Config(format!(
                        "node type '{}' declares {} '{}' twice",
                        self.name, group, spec.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A ranked catalog search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMatch {
    pub name: String,
    pub category: String,
    pub score: u32,
}

// =============================================================================
// CATALOG
// =============================================================================

/// Name → descriptor table.
///
/// Uses `BTreeMap` so listings are alphabetical and deterministic.
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    types: BTreeMap<String, NodeDescriptor>,
}

impl NodeCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalog used when no host catalog is available.
    #[must_use]
    pub fn builtin() -> Self {
        use ParamKind::{Boolean, Generic, Integer, Number, Text};

        let mut catalog = Self::new();
        let mut add = |name: &str,
                       category: &str,
                       description: &str,
                       inputs: Vec<ParamSpec>,
                       outputs: Vec<ParamSpec>| {
            catalog.types.insert(
                name.to_string(),
                NodeDescriptor {
                    name: name.to_string(),
                    category: category.to_string(),
                    description: description.to_string(),
                    inputs,
                    outputs,
                },
            );
        };
        let num = |name: &str, v: f64| ParamSpec::new(name, Number, ParamValue::Number(v));
        let int = |name: &str, v: i64| ParamSpec::new(name, Integer, ParamValue::Integer(v));
        let any = |name: &str| ParamSpec::new(name, Generic, ParamValue::Null);

        add(
            "Number Slider",
            "Params",
            "Numeric slider producing a single value",
            vec![num("value", 0.5), num("min", 0.0), num("max", 1.0)],
            vec![ParamSpec::new("output", Number, ParamValue::Null)],
        );
        add(
            "Panel",
            "Params",
            "Displays or holds text data",
            vec![any("input")],
            vec![ParamSpec::new("output", Text, ParamValue::Null)],
        );
        add(
            "Number",
            "Params",
            "Container for numeric values",
            vec![num("input", 0.0)],
            vec![ParamSpec::new("output", Number, ParamValue::Null)],
        );
        add(
            "Boolean Toggle",
            "Params",
            "True/false switch",
            vec![ParamSpec::new("value", Boolean, ParamValue::Boolean(false))],
            vec![ParamSpec::new("output", Boolean, ParamValue::Null)],
        );
        for (name, description) in [
            ("Addition", "Adds two numbers"),
            ("Subtraction", "Subtracts b from a"),
            ("Multiplication", "Multiplies two numbers"),
            ("Division", "Divides a by b"),
        ] {
            add(
                name,
                "Maths",
                description,
                vec![num("a", 0.0), num("b", 0.0)],
                vec![ParamSpec::new("result", Number, ParamValue::Null)],
            );
        }
        add(
            "Series",
            "Sets",
            "Arithmetic sequence of numbers",
            vec![num("start", 0.0), num("step", 1.0), int("count", 10)],
            vec![any("series")],
        );
        add(
            "List Item",
            "Sets",
            "Retrieves an item from a list by index",
            vec![any("list"), int("index", 0)],
            vec![any("item")],
        );
        add(
            "Text Join",
            "Sets",
            "Joins text fragments with a separator",
            vec![any("text"), ParamSpec::new("separator", Text, ParamValue::Text(String::new()))],
            vec![ParamSpec::new("result", Text, ParamValue::Null)],
        );
        add(
            "Point",
            "Vector",
            "Point from x, y, z coordinates",
            vec![num("x", 0.0), num("y", 0.0), num("z", 0.0)],
            vec![any("point")],
        );
        add(
            "Line",
            "Curve",
            "Line between two points",
            vec![any("start"), any("end")],
            vec![any("line")],
        );
        add(
            "Circle",
            "Curve",
            "Circle from a plane and radius",
            vec![any("plane"), num("radius", 1.0)],
            vec![any("circle")],
        );

        catalog
    }

    /// Add or replace a node type.
    pub fn register(&mut self, descriptor: NodeDescriptor) -> Result<(), BridgeError> {
        descriptor.validate()?;
        self.types.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Resolve a type name: exact match first, then case-insensitive.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&NodeDescriptor> {
        self.types.get(name).or_else(|| {
            self.types
                .values()
                .find(|d| d.name.eq_ignore_ascii_case(name))
        })
    }

    /// All descriptors in name order.
    pub fn descriptors(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.types.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Ranked fuzzy search over type names, best first, ties by name.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<CatalogMatch> {
        let mut hits: Vec<CatalogMatch> = self
            .types
            .values()
            .filter_map(|d| {
                fuzzy_score(query, &d.name).map(|score| CatalogMatch {
                    name: d.name.clone(),
                    category: d.category.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        hits.truncate(limit);
        hits
    }
}

// =============================================================================
// FUZZY MATCHING
// =============================================================================

/// Score how well `query` matches `candidate`, case-insensitively.
///
/// exact > prefix > substring > in-order subsequence; `None` if no match.
/// An empty query matches everything with the lowest score.
#[must_use]
pub fn fuzzy_score(query: &str, candidate: &str) -> Option<u32> {
    let q = query.trim().to_lowercase();
    let c = candidate.to_lowercase();

    if q.is_empty() {
        return Some(1);
    }
    if c == q {
        return Some(100);
    }
    if c.starts_with(&q) {
        return Some(80);
    }
    if c.contains(&q) {
        return Some(60);
    }

    let mut rest = c.chars();
    let is_subsequence = q
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .all(|ch| rest.any(|x| x == ch));
    is_subsequence.then_some(20)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_primary_params_for_wiring() {
        let catalog = NodeCatalog::builtin();
        let slider = catalog.resolve("Number Slider").expect("slider");
        let panel = catalog.resolve("Panel").expect("panel");

        assert_eq!(slider.outputs[0].name, "output");
        assert_eq!(panel.inputs[0].name, "input");
    }

    #[test]
    fn resolve_is_case_insensitive_fallback() {
        let catalog = NodeCatalog::builtin();
        assert!(catalog.resolve("number slider").is_some());
        assert!(catalog.resolve("Nope").is_none());
    }

    #[test]
    fn search_ranks_exact_over_prefix_over_substring() {
        let catalog = NodeCatalog::builtin();
        let hits = catalog.search("number", 10);

        assert_eq!(hits[0].name, "Number");
        assert_eq!(hits[0].score, 100);
        assert_eq!(hits[1].name, "Number Slider");
        assert_eq!(hits[1].score, 80);
    }

    #[test]
    fn search_respects_limit() {
        let catalog = NodeCatalog::builtin();
        assert_eq!(catalog.search("", 3).len(), 3);
    }

    #[test]
    fn fuzzy_subsequence() {
        assert_eq!(fuzzy_score("nsl", "Number Slider"), Some(20));
        assert_eq!(fuzzy_score("slider", "Number Slider"), Some(60));
        assert_eq!(fuzzy_score("xyz", "Number Slider"), None);
    }

    #[test]
    fn register_rejects_duplicate_params() {
        let mut catalog = NodeCatalog::new();
        let descriptor = NodeDescriptor {
            name: "Dup".to_string(),
            category: String::new(),
            description: String::new(),
            inputs: vec![
                ParamSpec::new("a", ParamKind::Number, ParamValue::Null),
                ParamSpec::new("a", ParamKind::Number, ParamValue::Null),
            ],
            outputs: Vec::new(),
        };
        assert!(catalog.register(descriptor).is_err());
        assert!(catalog.is_empty());
    }
}
