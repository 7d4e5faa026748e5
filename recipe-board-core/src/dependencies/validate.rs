//! Edge validation and the deterministic checks that run without the model.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::graph::{CandidateEdge, NodeId, Relation};
use crate::types::{
    Confidence, Necessity, Recipe, RecipeWarning, RejectReason, RejectedEdge, Source,
};
use crate::vocab::{first_word, verb_state};

/// Required equipment needed by steps that may run at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contention {
    pub equipment: String,
    /// Sorted, at least two.
    pub steps: Vec<u32>,
}

impl Contention {
    pub fn warning(&self) -> RecipeWarning {
        RecipeWarning::ResourceContention {
            equipment: self.equipment.clone(),
            steps: self.steps.clone(),
        }
    }
}

/// Every node id the recipe would produce in a graph.
pub fn recipe_node_ids(recipe: &Recipe) -> BTreeSet<NodeId> {
    recipe
        .ingredients
        .iter()
        .map(|i| NodeId::Ingredient(i.key()))
        .chain(recipe.equipment.iter().map(|e| NodeId::Equipment(e.key())))
        .chain(recipe.steps.iter().map(|s| NodeId::Step(s.ordinal)))
        .collect()
}

/// Check one proposed edge against the known nodes and the ordering rule.
///
/// `used-by` must run ingredient to step, `requires` step to equipment and
/// `precedes` from an earlier step to a later one.
pub fn validate_edge(
    nodes: &BTreeSet<NodeId>,
    from: &str,
    to: &str,
    relation: &str,
    confidence: Option<f32>,
    source: Source,
) -> Result<CandidateEdge, RejectedEdge> {
    let reject = |reason| RejectedEdge {
        from: from.to_string(),
        to: to.to_string(),
        relation: relation.to_string(),
        reason,
    };

    let (Ok(from_id), Ok(to_id), Ok(kind)) = (
        from.parse::<NodeId>(),
        to.parse::<NodeId>(),
        relation.parse::<Relation>(),
    ) else {
        return Err(reject(RejectReason::InvalidShape));
    };

    if !nodes.contains(&from_id) || !nodes.contains(&to_id) {
        return Err(reject(RejectReason::UnknownNode));
    }

    match (kind, &from_id, &to_id) {
        (Relation::UsedBy, NodeId::Ingredient(_), NodeId::Step(_)) => {}
        (Relation::Requires, NodeId::Step(_), NodeId::Equipment(_)) => {}
        (Relation::Precedes, NodeId::Step(a), NodeId::Step(b)) => {
            if a == b {
                return Err(reject(RejectReason::SelfDependency));
            }
            if a > b {
                return Err(reject(RejectReason::ForwardDependency));
            }
        }
        _ => return Err(reject(RejectReason::InvalidShape)),
    }

    let mut edge = CandidateEdge::new(from_id, to_id, kind, source);
    if let Some(value) = confidence {
        edge.confidence = Confidence::new(value);
    }
    Ok(edge)
}

/// Edges derivable without the model: step references become `used-by` and
/// `requires`, and a step reusing an ingredient or piece of equipment waits
/// for the most recent earlier step that used it.
pub fn heuristic_edges(recipe: &Recipe) -> Vec<CandidateEdge> {
    let mut steps: Vec<_> = recipe.steps.iter().collect();
    steps.sort_by_key(|s| s.ordinal);

    let mut edges = Vec::new();
    let mut last_user: BTreeMap<NodeId, u32> = BTreeMap::new();
    let mut precedes: BTreeSet<(u32, u32)> = BTreeSet::new();

    for step in steps {
        let this = NodeId::Step(step.ordinal);
        let used = step
            .ingredients
            .iter()
            .map(|k| NodeId::Ingredient(k.clone()))
            .chain(step.equipment.iter().map(|k| NodeId::Equipment(k.clone())));

        for resource in used {
            match &resource {
                NodeId::Ingredient(_) => edges.push(CandidateEdge::new(
                    resource.clone(),
                    this.clone(),
                    Relation::UsedBy,
                    Source::Heuristic,
                )),
                _ => edges.push(CandidateEdge::new(
                    this.clone(),
                    resource.clone(),
                    Relation::Requires,
                    Source::Heuristic,
                )),
            }
            if let Some(&earlier) = last_user.get(&resource) {
                if earlier < step.ordinal {
                    precedes.insert((earlier, step.ordinal));
                }
            }
            last_user.insert(resource, step.ordinal);
        }
    }

    edges.extend(precedes.into_iter().map(|(a, b)| {
        CandidateEdge::new(NodeId::Step(a), NodeId::Step(b), Relation::Precedes, Source::Heuristic)
    }));
    edges
}

/// Step ordinals each step can reach through precedence.
fn reachability(recipe: &Recipe, edges: &[CandidateEdge]) -> BTreeMap<u32, BTreeSet<u32>> {
    let mut next: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
    for step in &recipe.steps {
        for &pred in &step.predecessors {
            next.entry(pred).or_default().insert(step.ordinal);
        }
    }
    for edge in edges {
        if let (Relation::Precedes, NodeId::Step(a), NodeId::Step(b)) =
            (edge.relation, &edge.from, &edge.to)
        {
            next.entry(*a).or_default().insert(*b);
        }
    }

    recipe
        .steps
        .iter()
        .map(|step| {
            let mut seen = BTreeSet::new();
            let mut stack = vec![step.ordinal];
            while let Some(current) = stack.pop() {
                for &n in next.get(&current).into_iter().flatten() {
                    if seen.insert(n) {
                        stack.push(n);
                    }
                }
            }
            (step.ordinal, seen)
        })
        .collect()
}

/// Flag required equipment used by two steps with no precedence path between
/// them. `reported` holds contention the model claimed; entries naming unknown
/// equipment or fewer than two known steps are ignored.
pub fn detect_contention(
    recipe: &Recipe,
    edges: &[CandidateEdge],
    reported: &[Contention],
) -> Vec<Contention> {
    let reach = reachability(recipe, edges);
    let ordered = |a: u32, b: u32| {
        reach.get(&a).is_some_and(|r| r.contains(&b)) || reach.get(&b).is_some_and(|r| r.contains(&a))
    };

    let mut users: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
    for step in &recipe.steps {
        for key in &step.equipment {
            users.entry(key.clone()).or_default().insert(step.ordinal);
        }
    }
    for edge in edges {
        if let (Relation::Requires, NodeId::Step(s), NodeId::Equipment(key)) =
            (edge.relation, &edge.from, &edge.to)
        {
            users.entry(key.clone()).or_default().insert(*s);
        }
    }

    let mut found: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
    for (key, steps) in &users {
        let required = recipe
            .equipment_item(key)
            .is_some_and(|e| e.necessity == Necessity::Required);
        if !required {
            continue;
        }
        let steps: Vec<u32> = steps.iter().copied().collect();
        for (i, &a) in steps.iter().enumerate() {
            for &b in &steps[i + 1..] {
                if !ordered(a, b) {
                    let entry = found.entry(key.clone()).or_default();
                    entry.insert(a);
                    entry.insert(b);
                }
            }
        }
    }

    for claim in reported {
        let Some(equipment) = recipe.equipment_item(&claim.equipment) else {
            tracing::debug!(steps = claim.steps.len(), "Ignoring contention for unknown equipment");
            continue;
        };
        let steps: BTreeSet<u32> = claim
            .steps
            .iter()
            .copied()
            .filter(|s| recipe.step(*s).is_some())
            .collect();
        if steps.len() >= 2 {
            found.entry(equipment.key()).or_default().extend(steps);
        }
    }

    found
        .into_iter()
        .map(|(equipment, steps)| Contention {
            equipment,
            steps: steps.into_iter().collect(),
        })
        .collect()
}

/// Warn when a step's verb would take an already cooked ingredient back to
/// raw or cleaned. Cutting and mixing after cooking are ordinary.
pub fn check_state_progression(recipe: &Recipe) -> Vec<RecipeWarning> {
    let mut steps: Vec<_> = recipe.steps.iter().collect();
    steps.sort_by_key(|s| s.ordinal);

    let mut warnings = Vec::new();
    for ingredient in &recipe.ingredients {
        let key = ingredient.key();
        let mut current = ingredient.state;
        for step in steps.iter().filter(|s| s.ingredients.contains(&key)) {
            let Some(implied) = first_word(&step.text).and_then(|w| verb_state(&w)) else {
                continue;
            };
            if implied.undoes(current) {
                warnings.push(RecipeWarning::StateRegression {
                    ingredient: key.clone(),
                    step: step.ordinal,
                    from: current,
                    to: implied,
                });
            } else {
                current = current.max(implied);
            }
        }
    }
    warnings
}
