//! Structured graph dumps: versioned JSON and Graphviz DOT.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::{Cycle, DependencyGraph, Edge, Node, NodeId};
use crate::error::ExportError;

pub const EXPORT_FORMAT: &str = "recipe-board/graph";
pub const EXPORT_VERSION: u32 = 1;

/// JSON export envelope. Parsing it back yields the same node ids, edges and
/// relation kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub format: String,
    pub version: u32,
    /// Build that produced the export.
    #[serde(default)]
    pub build_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub cycles: Vec<Cycle>,
}

impl GraphExport {
    pub fn new(graph: &DependencyGraph, title: Option<&str>) -> Self {
        Self {
            format: EXPORT_FORMAT.to_string(),
            version: EXPORT_VERSION,
            build_id: crate::BUILD_ID.to_string(),
            title: title.map(str::to_string),
            nodes: graph.nodes.clone(),
            edges: graph.edges.clone(),
            cycles: graph.cycles.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and check an export: format tag, version and edge endpoints.
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        let export: GraphExport = serde_json::from_str(json)?;
        if export.format != EXPORT_FORMAT || export.version != EXPORT_VERSION {
            return Err(ExportError::UnsupportedFormat {
                format: export.format,
                version: export.version,
            });
        }

        let ids: BTreeSet<NodeId> = export.nodes.iter().map(Node::id).collect();
        if let Some(missing) = export
            .edges
            .iter()
            .flat_map(|e| [&e.from, &e.to])
            .find(|id| !ids.contains(*id))
        {
            return Err(ExportError::UnknownNode(missing.to_string()));
        }
        Ok(export)
    }

    pub fn into_graph(self) -> DependencyGraph {
        let mut nodes = self.nodes;
        nodes.sort_by_key(Node::id);
        let mut edges = self.edges;
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        DependencyGraph {
            nodes,
            edges,
            cycles: self.cycles,
        }
    }
}

fn dot_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ")
}

/// Render the graph as Graphviz DOT, styled by node kind. Edges on a
/// reported cycle are drawn red.
pub fn to_dot(graph: &DependencyGraph) -> String {
    let cycle_edges: BTreeSet<(&NodeId, &NodeId)> = graph
        .cycles
        .iter()
        .flat_map(|c| c.edges.iter().map(|(a, b)| (a, b)))
        .collect();

    let mut out = String::from("digraph recipe {\n  rankdir=LR;\n  node [style=filled];\n");
    for node in &graph.nodes {
        let id = node.id();
        let kind = id.kind();
        let label = match node {
            Node::Step { ordinal, label, .. } => format!("{}. {}", ordinal, label),
            other => other.label().to_string(),
        };
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\", shape={}, fillcolor=\"{}\"];",
            dot_escape(&id.to_string()),
            dot_escape(&label),
            kind.shape().dot_name(),
            kind.color()
        );
    }
    for edge in &graph.edges {
        let relations: Vec<&str> = edge.relations.iter().map(|r| r.as_str()).collect();
        let color = if cycle_edges.contains(&(&edge.from, &edge.to)) {
            ", color=red"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{}\"{}];",
            dot_escape(&edge.from.to_string()),
            dot_escape(&edge.to.to_string()),
            relations.join(", "),
            color
        );
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, CandidateEdge, Relation};
    use crate::types::{Equipment, Ingredient, Recipe, RecipeStep, Source};

    fn graph() -> DependencyGraph {
        let mut recipe = Recipe::new("");
        recipe.title = Some("Eggs".to_string());
        recipe.add_ingredient(Ingredient::new("eggs", Source::Llm));
        recipe.add_equipment(Equipment::new("whisk", Source::Llm));
        let mut one = RecipeStep::new(1, "Crack \"the\" eggs", Source::Llm);
        one.ingredients.insert("eggs".to_string());
        let mut two = RecipeStep::new(2, "Whisk", Source::Llm);
        two.equipment.insert("whisk".to_string());
        recipe.steps = vec![one, two];
        build_graph(
            &recipe,
            &[CandidateEdge::new(
                NodeId::Step(1),
                NodeId::Step(2),
                Relation::Precedes,
                Source::Llm,
            )],
        )
    }

    #[test]
    fn test_json_round_trip_keeps_identity_and_relations() {
        let graph = graph();
        let json = GraphExport::new(&graph, Some("Eggs")).to_json().unwrap();
        let back = GraphExport::from_json(&json).unwrap();
        assert_eq!(back.title.as_deref(), Some("Eggs"));

        let restored = back.into_graph();
        assert_eq!(restored.node_ids(), graph.node_ids());
        assert_eq!(restored.edge_set(), graph.edge_set());
    }

    #[test]
    fn test_rejects_other_formats() {
        let json = r#"{"format": "other", "version": 1, "nodes": [], "edges": []}"#;
        assert!(matches!(
            GraphExport::from_json(json),
            Err(ExportError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            GraphExport::from_json("not json"),
            Err(ExportError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_rejects_dangling_edges() {
        let json = r#"{
            "format": "recipe-board/graph", "version": 1,
            "nodes": [],
            "edges": [{"from": "step:1", "to": "step:2", "relations": ["precedes"], "confidence": 0.5}]
        }"#;
        assert!(matches!(
            GraphExport::from_json(json),
            Err(ExportError::UnknownNode(id)) if id == "step:1"
        ));
    }

    #[test]
    fn test_dot_output() {
        let dot = to_dot(&graph());
        assert!(dot.starts_with("digraph recipe {"));
        assert!(dot.contains("\"step:1\" [label=\"1. Crack \\\"the\\\" eggs\", shape=diamond"));
        assert!(dot.contains("\"ingredient:eggs\" -> \"step:1\" [label=\"used-by\"]"));
        assert!(dot.contains("shape=box"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
