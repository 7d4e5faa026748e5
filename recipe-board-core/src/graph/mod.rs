//! Dependency graph over ingredients, equipment and steps.

mod builder;
mod export;
mod layout;

pub use builder::{build_graph, find_cycles, GraphBuilder};
pub use export::{to_dot, GraphExport, EXPORT_FORMAT, EXPORT_VERSION};
pub use layout::{layout_graph, Layout, LayoutEdge, NodeKind, PositionedNode, Shape};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{normalize_name, Confidence, IngredientState, Source};

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid node id: {0}")]
pub struct NodeIdError(pub String);

/// Stable node identity: `ingredient:<key>`, `equipment:<key>` or `step:<n>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeId {
    Ingredient(String),
    Equipment(String),
    Step(u32),
}

impl NodeId {
    pub fn ingredient(name: &str) -> Self {
        NodeId::Ingredient(normalize_name(name))
    }

    pub fn equipment(name: &str) -> Self {
        NodeId::Equipment(normalize_name(name))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeId::Ingredient(_) => NodeKind::Ingredient,
            NodeId::Equipment(_) => NodeKind::Equipment,
            NodeId::Step(_) => NodeKind::Step,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Ingredient(key) => write!(f, "ingredient:{}", key),
            NodeId::Equipment(key) => write!(f, "equipment:{}", key),
            NodeId::Step(ordinal) => write!(f, "step:{}", ordinal),
        }
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NodeIdError(s.to_string());
        let (kind, rest) = s.split_once(':').ok_or_else(invalid)?;
        match kind.trim().to_lowercase().as_str() {
            "ingredient" => {
                let key = normalize_name(rest);
                if key.is_empty() {
                    return Err(invalid());
                }
                Ok(NodeId::Ingredient(key))
            }
            "equipment" => {
                let key = normalize_name(rest);
                if key.is_empty() {
                    return Err(invalid());
                }
                Ok(NodeId::Equipment(key))
            }
            "step" => match rest.trim().parse::<u32>() {
                Ok(ordinal) if ordinal > 0 => Ok(NodeId::Step(ordinal)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

/// Edge relation kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    /// Ingredient is consumed by a step.
    UsedBy,
    /// Step needs a piece of equipment.
    Requires,
    /// Earlier step must finish before a later one.
    Precedes,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::UsedBy => "used-by",
            Relation::Requires => "requires",
            Relation::Precedes => "precedes",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "used-by" | "uses" => Ok(Relation::UsedBy),
            "requires" | "needs" => Ok(Relation::Requires),
            "precedes" | "before" => Ok(Relation::Precedes),
            _ => Err(NodeIdError(format!("unknown relation '{}'", s))),
        }
    }
}

/// An edge proposed by inference, before graph construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub relation: Relation,
    pub confidence: Confidence,
    pub source: Source,
}

impl CandidateEdge {
    pub fn new(from: NodeId, to: NodeId, relation: Relation, source: Source) -> Self {
        Self {
            from,
            to,
            relation,
            confidence: source.default_confidence(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Ingredient {
        key: String,
        label: String,
        state: IngredientState,
        confidence: Confidence,
    },
    Equipment {
        key: String,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<String>,
        required: bool,
        confidence: Confidence,
    },
    Step {
        ordinal: u32,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_minutes: Option<u32>,
        confidence: Confidence,
    },
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Ingredient { key, .. } => NodeId::Ingredient(key.clone()),
            Node::Equipment { key, .. } => NodeId::Equipment(key.clone()),
            Node::Step { ordinal, .. } => NodeId::Step(*ordinal),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Node::Ingredient { label, .. }
            | Node::Equipment { label, .. }
            | Node::Step { label, .. } => label,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Node::Ingredient { confidence, .. }
            | Node::Equipment { confidence, .. }
            | Node::Step { confidence, .. } => *confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    /// Union of every relation proposed between the same two nodes.
    pub relations: BTreeSet<Relation>,
    pub confidence: Confidence,
}

/// A directed cycle found after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    /// Nodes in traversal order; the last one points back to the first.
    pub nodes: Vec<NodeId>,
    pub edges: Vec<(NodeId, NodeId)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// Sorted by id.
    pub nodes: Vec<Node>,
    /// Sorted by `(from, to)`; at most one edge per ordered pair.
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub cycles: Vec<Cycle>,
}

impl DependencyGraph {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes
            .binary_search_by(|n| n.id().cmp(id))
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    pub fn edge(&self, from: &NodeId, to: &NodeId) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.from == from && &e.to == to)
    }

    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.iter().map(Node::id).collect()
    }

    /// Every `(from, to, relation)` triple.
    pub fn edge_set(&self) -> BTreeSet<(NodeId, NodeId, Relation)> {
        self.edges
            .iter()
            .flat_map(|e| {
                e.relations
                    .iter()
                    .map(move |r| (e.from.clone(), e.to.clone(), *r))
            })
            .collect()
    }

    pub fn is_acyclic(&self) -> bool {
        self.cycles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_round_trip() {
        for text in ["ingredient:eggs", "equipment:mixing bowl", "step:3"] {
            let id: NodeId = text.parse().unwrap();
            assert_eq!(id.to_string(), text);
        }
        assert_eq!(
            "Ingredient: Fresh Eggs".parse::<NodeId>().unwrap(),
            NodeId::Ingredient("fresh eggs".to_string())
        );
    }

    #[test]
    fn test_node_id_rejects_garbage() {
        for text in ["eggs", "step:0", "step:two", "ingredient:", "pan:big"] {
            assert!(text.parse::<NodeId>().is_err(), "{text}");
        }
    }

    #[test]
    fn test_node_id_serializes_as_string() {
        let json = serde_json::to_string(&NodeId::Step(2)).unwrap();
        assert_eq!(json, "\"step:2\"");
        let back: NodeId = serde_json::from_str("\"equipment:oven\"").unwrap();
        assert_eq!(back, NodeId::Equipment("oven".to_string()));
    }

    #[test]
    fn test_relation_parse() {
        assert_eq!("used_by".parse::<Relation>().unwrap(), Relation::UsedBy);
        assert_eq!("Precedes".parse::<Relation>().unwrap(), Relation::Precedes);
        assert!("after".parse::<Relation>().is_err());
        assert_eq!(
            serde_json::to_string(&Relation::UsedBy).unwrap(),
            "\"used-by\""
        );
    }
}
