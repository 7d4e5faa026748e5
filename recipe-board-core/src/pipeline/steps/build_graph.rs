//! BuildGraph step - deterministic graph construction.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ExtractEntitiesStep, InferDependenciesStep, LayoutGraphStep};
use crate::dependencies::InferenceOutcome;
use crate::extract::ExtractionOutcome;
use crate::graph::{build_graph, DependencyGraph, NodeId};
use crate::pipeline::{PipelineStep, StepContext, StepMetadata, StepResult};
use crate::types::{ConfidenceSummary, Recipe, RecipeWarning};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildGraphOutput {
    /// Recipe with inferred predecessors, warnings and overall confidence.
    pub recipe: Recipe,
    pub graph: DependencyGraph,
}

/// Step that applies inferred edges to the recipe and builds the graph.
/// Cycles become recipe warnings; they never fail the step.
pub struct BuildGraphStep;

impl BuildGraphStep {
    /// Step name constant.
    pub const NAME: &'static str = "build_graph";
}

#[async_trait]
impl PipelineStep for BuildGraphStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Build the dependency graph",
            continues_on_failure: false,
        }
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
        let start = Instant::now();

        let extraction: ExtractionOutcome = match ctx.input(ExtractEntitiesStep::NAME) {
            Ok(e) => e,
            Err(e) => return StepResult::failed(Self::NAME, e, start),
        };
        let inference: InferenceOutcome = match ctx.input(InferDependenciesStep::NAME) {
            Ok(i) => i,
            Err(e) => return StepResult::failed(Self::NAME, e, start),
        };

        let mut recipe = extraction.recipe;
        inference.apply_to(&mut recipe);

        let graph = build_graph(&recipe, &inference.edges);
        for cycle in &graph.cycles {
            recipe.warn(RecipeWarning::Cycle {
                nodes: cycle.nodes.iter().map(NodeId::to_string).collect(),
            });
        }
        recipe.confidence = ConfidenceSummary::compute(
            &recipe,
            extraction.status.is_degraded(),
            inference.is_incomplete(),
        );

        let output = BuildGraphOutput { recipe, graph };
        StepResult::completed(Self::NAME, &output, Some(LayoutGraphStep::NAME), start)
    }
}
