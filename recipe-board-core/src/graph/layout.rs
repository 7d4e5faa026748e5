//! Force-directed layout and render hints.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{DependencyGraph, NodeId, Relation};

const ITERATIONS: usize = 50;
const REPULSION: f64 = 0.1;
const ATTRACTION: f64 = 0.02;
const DAMPING: f64 = 0.1;
const MIN_DISTANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Ingredient,
    Equipment,
    Step,
}

impl NodeKind {
    pub fn shape(self) -> Shape {
        match self {
            NodeKind::Ingredient => Shape::Circle,
            NodeKind::Equipment => Shape::Square,
            NodeKind::Step => Shape::Diamond,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            NodeKind::Ingredient => "#00FF7F",
            NodeKind::Equipment => "#FF4500",
            NodeKind::Step => "#1E90FF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Circle,
    Diamond,
    Square,
}

impl Shape {
    /// Graphviz shape name.
    pub fn dot_name(self) -> &'static str {
        match self {
            Shape::Circle => "ellipse",
            Shape::Diamond => "diamond",
            Shape::Square => "box",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedNode {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub shape: Shape,
    pub color: String,
    pub x: f64,
    pub y: f64,
    /// Connected component index, in node order of first appearance.
    pub component: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub relations: BTreeSet<Relation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<LayoutEdge>,
    pub components: usize,
}

impl Layout {
    pub fn position(&self, id: &NodeId) -> Option<(f64, f64)> {
        self.nodes
            .iter()
            .find(|n| &n.id == id)
            .map(|n| (n.x, n.y))
    }
}

/// Lay the graph out for rendering. Deterministic; handles empty graphs,
/// isolated nodes and disconnected components.
pub fn layout_graph(graph: &DependencyGraph) -> Layout {
    let ids: Vec<NodeId> = graph.nodes.iter().map(|n| n.id()).collect();
    let index: BTreeMap<&NodeId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let links: Vec<(usize, usize)> = graph
        .edges
        .iter()
        .filter_map(|e| Some((*index.get(&e.from)?, *index.get(&e.to)?)))
        .filter(|(a, b)| a != b)
        .collect();

    let positions = force_directed(ids.len(), &links);
    let components = component_labels(ids.len(), &links);
    let component_count = components.iter().copied().max().map_or(0, |m| m + 1);

    let nodes = graph
        .nodes
        .iter()
        .zip(positions)
        .zip(components)
        .map(|((node, (x, y)), component)| {
            let kind = node.id().kind();
            PositionedNode {
                id: node.id(),
                label: node.label().to_string(),
                kind,
                shape: kind.shape(),
                color: kind.color().to_string(),
                x,
                y,
                component,
            }
        })
        .collect();

    let edges = graph
        .edges
        .iter()
        .map(|e| LayoutEdge {
            from: e.from.clone(),
            to: e.to.clone(),
            relations: e.relations.clone(),
        })
        .collect();

    Layout {
        nodes,
        edges,
        components: component_count,
    }
}

/// Circle start, then pairwise repulsion and attraction along edges.
fn force_directed(count: usize, links: &[(usize, usize)]) -> Vec<(f64, f64)> {
    if count == 0 {
        return Vec::new();
    }

    let radius = (count as f64 / 6.0).max(1.0);
    let mut positions: Vec<(f64, f64)> = (0..count)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / count as f64;
            (radius * angle.cos(), radius * angle.sin())
        })
        .collect();

    for _ in 0..ITERATIONS {
        let mut forces = vec![(0.0f64, 0.0f64); count];

        for i in 0..count {
            for j in (i + 1)..count {
                let (dx, dy, distance) = delta(positions[i], positions[j]);
                let magnitude = REPULSION / (distance * distance);
                let (fx, fy) = (magnitude * dx / distance, magnitude * dy / distance);
                forces[i].0 -= fx;
                forces[i].1 -= fy;
                forces[j].0 += fx;
                forces[j].1 += fy;
            }
        }

        for &(a, b) in links {
            let (dx, dy, distance) = delta(positions[a], positions[b]);
            let magnitude = ATTRACTION * distance;
            let (fx, fy) = (magnitude * dx / distance, magnitude * dy / distance);
            forces[a].0 += fx;
            forces[a].1 += fy;
            forces[b].0 -= fx;
            forces[b].1 -= fy;
        }

        for (pos, force) in positions.iter_mut().zip(&forces) {
            pos.0 += force.0 * DAMPING;
            pos.1 += force.1 * DAMPING;
        }
    }

    positions
}

fn delta(a: (f64, f64), b: (f64, f64)) -> (f64, f64, f64) {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    (dx, dy, (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE))
}

/// Weakly connected component index per node.
fn component_labels(count: usize, links: &[(usize, usize)]) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..count).collect();

    fn root(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for &(a, b) in links {
        let (ra, rb) = (root(&mut parent, a), root(&mut parent, b));
        if ra != rb {
            parent[ra.max(rb)] = ra.min(rb);
        }
    }

    let mut labels: BTreeMap<usize, usize> = BTreeMap::new();
    (0..count)
        .map(|i| {
            let r = root(&mut parent, i);
            let next = labels.len();
            *labels.entry(r).or_insert(next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, GraphBuilder, Node};
    use crate::types::{Confidence, Equipment, Ingredient, Recipe, RecipeStep, Source};

    #[test]
    fn test_empty_graph() {
        let layout = layout_graph(&DependencyGraph::default());
        assert!(layout.nodes.is_empty());
        assert_eq!(layout.components, 0);
    }

    #[test]
    fn test_single_isolated_node() {
        let mut builder = GraphBuilder::new();
        builder.add_node(Node::Step {
            ordinal: 1,
            label: "Serve".to_string(),
            duration_minutes: None,
            confidence: Confidence::new(0.5),
        });
        let layout = layout_graph(&builder.build());
        assert_eq!(layout.nodes.len(), 1);
        assert_eq!(layout.components, 1);
        assert_eq!(layout.nodes[0].shape, Shape::Diamond);
        assert!(layout.nodes[0].x.is_finite() && layout.nodes[0].y.is_finite());
    }

    #[test]
    fn test_components_and_shapes() {
        let mut recipe = Recipe::new("");
        recipe.add_ingredient(Ingredient::new("eggs", Source::Llm));
        recipe.add_ingredient(Ingredient::new("salt", Source::Llm));
        recipe.add_equipment(Equipment::new("bowl", Source::Llm));
        let mut step = RecipeStep::new(1, "Whisk eggs in a bowl", Source::Llm);
        step.ingredients.insert("eggs".to_string());
        step.equipment.insert("bowl".to_string());
        recipe.steps.push(step);

        let graph = build_graph(&recipe, &[]);
        let layout = layout_graph(&graph);

        assert_eq!(layout.nodes.len(), 4);
        assert_eq!(layout.components, 2);
        let salt = layout
            .nodes
            .iter()
            .find(|n| n.id == NodeId::ingredient("salt"))
            .unwrap();
        assert_eq!(salt.shape, Shape::Circle);
        let bowl = layout
            .nodes
            .iter()
            .find(|n| n.id == NodeId::equipment("bowl"))
            .unwrap();
        assert_eq!(bowl.shape, Shape::Square);
        for node in &layout.nodes {
            assert!(node.x.is_finite() && node.y.is_finite());
        }
    }

    #[test]
    fn test_layout_is_deterministic() {
        let mut recipe = Recipe::new("");
        for name in ["a", "b", "c", "d"] {
            recipe.add_ingredient(Ingredient::new(name, Source::Llm));
        }
        let graph = build_graph(&recipe, &[]);
        assert_eq!(layout_graph(&graph), layout_graph(&graph));
    }

    #[test]
    fn test_connected_nodes_pull_together() {
        let positions = force_directed(6, &[(0, 3)]);
        let (_, _, d_linked) = delta(positions[0], positions[3]);
        let (_, _, d_unlinked) = delta(positions[1], positions[4]);
        assert!(d_linked < d_unlinked);
    }
}
