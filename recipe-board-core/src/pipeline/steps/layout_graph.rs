//! LayoutGraph step - render-ready positions.

use std::time::Instant;

use async_trait::async_trait;

use super::build_graph::BuildGraphOutput;
use super::BuildGraphStep;
use crate::graph::layout_graph;
use crate::pipeline::{PipelineStep, StepContext, StepMetadata, StepResult};

/// Step that lays out the built graph. Last in the chain.
pub struct LayoutGraphStep;

impl LayoutGraphStep {
    /// Step name constant.
    pub const NAME: &'static str = "layout_graph";
}

#[async_trait]
impl PipelineStep for LayoutGraphStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Lay out the graph for rendering",
            continues_on_failure: true,
        }
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
        let start = Instant::now();
        match ctx.input::<BuildGraphOutput>(BuildGraphStep::NAME) {
            Ok(built) => StepResult::completed(Self::NAME, &layout_graph(&built.graph), None, start),
            Err(e) => StepResult::failed(Self::NAME, e, start),
        }
    }
}
