//! ExtractEntities step - model extraction merged with the pre-parse.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{InferDependenciesStep, PreparseStep};
use crate::ai::{AiClient, RetryPolicy};
use crate::config::AnalyzerConfig;
use crate::extract::extract_entities;
use crate::pipeline::{PipelineStep, StepContext, StepMetadata, StepResult};
use crate::preparse::PreParse;

/// Step that asks the model for entities. A missing or failing model
/// degrades the result instead of failing the step.
pub struct ExtractEntitiesStep {
    client: Option<Arc<dyn AiClient>>,
    config: AnalyzerConfig,
    retry: RetryPolicy,
}

impl ExtractEntitiesStep {
    /// Step name constant.
    pub const NAME: &'static str = "extract_entities";

    pub fn new(client: Option<Arc<dyn AiClient>>, config: AnalyzerConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }
}

#[async_trait]
impl PipelineStep for ExtractEntitiesStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Extract entities with the model and merge with the pre-parse",
            continues_on_failure: false,
        }
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
        let start = Instant::now();

        let preparse: PreParse = match ctx.input(PreparseStep::NAME) {
            Ok(p) => p,
            Err(e) => return StepResult::failed(Self::NAME, e, start),
        };

        let outcome = extract_entities(
            self.client.as_deref(),
            ctx.text,
            &preparse,
            &self.config,
            &self.retry,
        )
        .await;

        StepResult::completed(Self::NAME, &outcome, Some(InferDependenciesStep::NAME), start)
    }
}
