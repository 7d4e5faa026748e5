//! Deterministic graph construction with cycle reporting.

use std::collections::{BTreeMap, BTreeSet};

use super::{CandidateEdge, Cycle, DependencyGraph, Edge, Node, NodeId, Relation};
use crate::types::{Confidence, Necessity, Recipe};

/// Accumulates nodes and edges. Identical inputs always produce identical
/// graphs: every collection is ordered by node id.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<(NodeId, NodeId), Edge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builder with every recipe entity plus the edges implied by
    /// step references and recorded predecessors.
    pub fn from_recipe(recipe: &Recipe) -> Self {
        let mut builder = Self::new();

        for ingredient in &recipe.ingredients {
            builder.add_node(Node::Ingredient {
                key: ingredient.key(),
                label: ingredient.name.clone(),
                state: ingredient.state,
                confidence: ingredient.confidence,
            });
        }
        for equipment in &recipe.equipment {
            builder.add_node(Node::Equipment {
                key: equipment.key(),
                label: equipment.name.clone(),
                size: equipment.size.clone(),
                required: equipment.necessity == Necessity::Required,
                confidence: equipment.confidence,
            });
        }
        for step in &recipe.steps {
            builder.add_node(Node::Step {
                ordinal: step.ordinal,
                label: step.text.clone(),
                duration_minutes: step.duration_minutes,
                confidence: step.confidence,
            });
        }

        for step in &recipe.steps {
            let to = NodeId::Step(step.ordinal);
            for key in &step.ingredients {
                builder.add_edge(
                    NodeId::Ingredient(key.clone()),
                    to.clone(),
                    Relation::UsedBy,
                    step.confidence,
                );
            }
            for key in &step.equipment {
                builder.add_edge(
                    to.clone(),
                    NodeId::Equipment(key.clone()),
                    Relation::Requires,
                    step.confidence,
                );
            }
            for pred in &step.predecessors {
                builder.add_edge(
                    NodeId::Step(*pred),
                    to.clone(),
                    Relation::Precedes,
                    step.confidence,
                );
            }
        }

        builder
    }

    /// Add a node; a node already present under the same id keeps the
    /// higher-confidence version.
    pub fn add_node(&mut self, node: Node) {
        let id = node.id();
        match self.nodes.get(&id) {
            Some(existing) if existing.confidence() >= node.confidence() => {}
            _ => {
                self.nodes.insert(id, node);
            }
        }
    }

    /// Add an edge, merging relation kinds with any existing edge between the
    /// same nodes. Edges touching unknown nodes and step precedence that does
    /// not point forward are dropped. Returns whether the edge was kept.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        relation: Relation,
        confidence: Confidence,
    ) -> bool {
        if !self.nodes.contains_key(&from) || !self.nodes.contains_key(&to) {
            tracing::debug!(relation = %relation, "Dropping edge with unknown endpoint");
            return false;
        }
        if let (Relation::Precedes, NodeId::Step(a), NodeId::Step(b)) = (relation, &from, &to) {
            if a >= b {
                tracing::warn!(from = a, to = b, "Dropping non-forward step precedence");
                return false;
            }
        }

        self.edges
            .entry((from.clone(), to.clone()))
            .and_modify(|edge| {
                edge.relations.insert(relation);
                edge.confidence = edge.confidence.max(confidence);
            })
            .or_insert_with(|| Edge {
                from,
                to,
                relations: BTreeSet::from([relation]),
                confidence,
            });
        true
    }

    pub fn add_candidate(&mut self, edge: &CandidateEdge) -> bool {
        self.add_edge(
            edge.from.clone(),
            edge.to.clone(),
            edge.relation,
            edge.confidence,
        )
    }

    pub fn build(self) -> DependencyGraph {
        let nodes: Vec<Node> = self.nodes.into_values().collect();
        let edges: Vec<Edge> = self.edges.into_values().collect();
        let cycles = find_cycles(&nodes, &edges);

        for cycle in &cycles {
            let path: Vec<String> = cycle.nodes.iter().map(NodeId::to_string).collect();
            tracing::warn!(cycle = %path.join(" -> "), "Dependency graph contains a cycle");
        }

        DependencyGraph {
            nodes,
            edges,
            cycles,
        }
    }
}

/// Build the graph for a recipe plus inferred edges.
pub fn build_graph(recipe: &Recipe, edges: &[CandidateEdge]) -> DependencyGraph {
    let mut builder = GraphBuilder::from_recipe(recipe);
    for edge in edges {
        builder.add_candidate(edge);
    }
    let graph = builder.build();
    tracing::info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        cycles = graph.cycles.len(),
        "Graph built"
    );
    graph
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Depth-first search reporting one cycle per back edge found.
pub fn find_cycles(nodes: &[Node], edges: &[Edge]) -> Vec<Cycle> {
    let ids: Vec<NodeId> = nodes.iter().map(Node::id).collect();
    let index: BTreeMap<&NodeId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for edge in edges {
        if let (Some(&a), Some(&b)) = (index.get(&edge.from), index.get(&edge.to)) {
            adjacency[a].push(b);
        }
    }
    for next in &mut adjacency {
        next.sort_unstable();
        next.dedup();
    }

    let mut marks = vec![Mark::Unvisited; ids.len()];
    let mut stack = Vec::new();
    let mut cycles = Vec::new();

    for start in 0..ids.len() {
        if marks[start] == Mark::Unvisited {
            visit(start, &adjacency, &mut marks, &mut stack, &mut cycles);
        }
    }

    cycles
        .into_iter()
        .map(|path: Vec<usize>| {
            let nodes: Vec<NodeId> = path.iter().map(|&i| ids[i].clone()).collect();
            let edges = nodes
                .iter()
                .zip(nodes.iter().cycle().skip(1))
                .map(|(a, b)| (a.clone(), b.clone()))
                .collect();
            Cycle { nodes, edges }
        })
        .collect()
}

fn visit(
    node: usize,
    adjacency: &[Vec<usize>],
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
    cycles: &mut Vec<Vec<usize>>,
) {
    marks[node] = Mark::Visiting;
    stack.push(node);

    for &next in &adjacency[node] {
        match marks[next] {
            Mark::Unvisited => visit(next, adjacency, marks, stack, cycles),
            Mark::Visiting => {
                if let Some(pos) = stack.iter().position(|&n| n == next) {
                    cycles.push(stack[pos..].to_vec());
                }
            }
            Mark::Done => {}
        }
    }

    stack.pop();
    marks[node] = Mark::Done;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Equipment, Ingredient, IngredientState, RecipeStep, Source};

    fn sample_recipe() -> Recipe {
        let mut recipe = Recipe::new("3 eggs, whisk in a bowl, then cook");
        recipe.add_ingredient(Ingredient::new("Eggs", Source::PreParser));
        recipe.add_equipment(Equipment::new("bowl", Source::PreParser));
        recipe.add_equipment(Equipment::new("skillet", Source::PreParser));

        let mut whisk = RecipeStep::new(1, "Whisk the eggs in a bowl", Source::Llm);
        whisk.ingredients.insert("eggs".to_string());
        whisk.equipment.insert("bowl".to_string());
        let mut cook = RecipeStep::new(2, "Cook in a skillet", Source::Llm);
        cook.equipment.insert("skillet".to_string());
        cook.add_predecessor(1).unwrap();
        recipe.steps = vec![whisk, cook];
        recipe
    }

    fn ingredient_node(key: &str) -> Node {
        Node::Ingredient {
            key: key.to_string(),
            label: key.to_string(),
            state: IngredientState::Raw,
            confidence: Confidence::new(0.5),
        }
    }

    #[test]
    fn test_from_recipe() {
        let graph = build_graph(&sample_recipe(), &[]);
        assert_eq!(graph.nodes.len(), 5);
        assert!(graph
            .edge(&NodeId::ingredient("eggs"), &NodeId::Step(1))
            .is_some());
        assert!(graph
            .edge(&NodeId::Step(2), &NodeId::equipment("skillet"))
            .is_some());
        assert!(graph.edge(&NodeId::Step(1), &NodeId::Step(2)).is_some());
        assert!(graph.is_acyclic());
    }

    #[test]
    fn test_duplicate_edges_union_relations() {
        let recipe = sample_recipe();
        let extra = vec![
            CandidateEdge::new(
                NodeId::ingredient("eggs"),
                NodeId::Step(1),
                Relation::Precedes,
                Source::Llm,
            ),
            CandidateEdge::new(
                NodeId::ingredient("EGGS"),
                NodeId::Step(1),
                Relation::UsedBy,
                Source::Llm,
            ),
        ];
        let graph = build_graph(&recipe, &extra);
        let edge = graph
            .edge(&NodeId::ingredient("eggs"), &NodeId::Step(1))
            .unwrap();
        assert_eq!(
            edge.relations.iter().copied().collect::<Vec<_>>(),
            vec![Relation::UsedBy, Relation::Precedes]
        );
        assert_eq!(graph.edges.len(), 4);
    }

    #[test]
    fn test_backward_precedence_and_dangling_edges_dropped() {
        let recipe = sample_recipe();
        let extra = vec![
            CandidateEdge::new(NodeId::Step(2), NodeId::Step(1), Relation::Precedes, Source::Llm),
            CandidateEdge::new(NodeId::Step(1), NodeId::Step(1), Relation::Precedes, Source::Llm),
            CandidateEdge::new(NodeId::Step(1), NodeId::Step(9), Relation::Precedes, Source::Llm),
        ];
        let graph = build_graph(&recipe, &extra);
        assert!(graph.edge(&NodeId::Step(2), &NodeId::Step(1)).is_none());
        assert!(graph.edge(&NodeId::Step(1), &NodeId::Step(1)).is_none());
        assert!(graph.node(&NodeId::Step(9)).is_none());
        for edge in &graph.edges {
            if let (NodeId::Step(a), NodeId::Step(b)) = (&edge.from, &edge.to) {
                assert!(a < b);
            }
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let recipe = sample_recipe();
        let first = build_graph(&recipe, &[]);
        let second = build_graph(&recipe, &[]);
        assert_eq!(first, second);
        assert_eq!(first.node_ids(), second.node_ids());
        assert_eq!(first.edge_set(), second.edge_set());
    }

    #[test]
    fn test_three_node_cycle_reported() {
        let mut builder = GraphBuilder::new();
        for key in ["a", "b", "c"] {
            builder.add_node(ingredient_node(key));
        }
        let (a, b, c) = (
            NodeId::ingredient("a"),
            NodeId::ingredient("b"),
            NodeId::ingredient("c"),
        );
        let conf = Confidence::new(0.5);
        assert!(builder.add_edge(a.clone(), b.clone(), Relation::UsedBy, conf));
        assert!(builder.add_edge(b.clone(), c.clone(), Relation::UsedBy, conf));
        assert!(builder.add_edge(c.clone(), a.clone(), Relation::UsedBy, conf));

        let graph = builder.build();
        assert_eq!(graph.edges.len(), 3);
        assert_eq!(graph.cycles.len(), 1);
        let cycle = &graph.cycles[0];
        assert_eq!(cycle.nodes, vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(cycle.edges, vec![(a.clone(), b.clone()), (b, c.clone()), (c, a)]);
    }

    #[test]
    fn test_isolated_nodes_are_kept() {
        let mut builder = GraphBuilder::new();
        builder.add_node(ingredient_node("salt"));
        let graph = builder.build();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }
}
