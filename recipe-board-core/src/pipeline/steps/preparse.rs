//! Preparse step - local, syntactic extraction from the recipe text.

use std::time::Instant;

use async_trait::async_trait;

use super::ExtractEntitiesStep;
use crate::pipeline::{PipelineStep, StepContext, StepMetadata, StepResult};
use crate::preparse::preparse;

/// Step that runs the pre-parser. Never fails.
pub struct PreparseStep;

impl PreparseStep {
    /// Step name constant.
    pub const NAME: &'static str = "preparse";
}

#[async_trait]
impl PipelineStep for PreparseStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Pre-parse ingredients, equipment and steps from text",
            continues_on_failure: false,
        }
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
        let start = Instant::now();
        let output = preparse(ctx.text);
        tracing::info!(
            ingredients = output.ingredients.len(),
            equipment = output.equipment.len(),
            steps = output.steps.len(),
            leftovers = output.leftovers.len(),
            "Pre-parse complete"
        );
        StepResult::completed(Self::NAME, &output, Some(ExtractEntitiesStep::NAME), start)
    }
}
