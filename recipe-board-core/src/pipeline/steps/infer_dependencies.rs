//! InferDependencies step - tool-augmented edge inference.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{BuildGraphStep, ExtractEntitiesStep};
use crate::ai::{AiClient, RetryPolicy};
use crate::config::AnalyzerConfig;
use crate::dependencies::infer_dependencies;
use crate::extract::ExtractionOutcome;
use crate::pipeline::{PipelineStep, StepContext, StepMetadata, StepResult};

/// Step that proposes edges between the extracted entities.
pub struct InferDependenciesStep {
    client: Option<Arc<dyn AiClient>>,
    config: AnalyzerConfig,
    retry: RetryPolicy,
}

impl InferDependenciesStep {
    /// Step name constant.
    pub const NAME: &'static str = "infer_dependencies";

    pub fn new(client: Option<Arc<dyn AiClient>>, config: AnalyzerConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }
}

#[async_trait]
impl PipelineStep for InferDependenciesStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Infer dependency edges and resource contention",
            continues_on_failure: false,
        }
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> StepResult {
        let start = Instant::now();

        let extraction: ExtractionOutcome = match ctx.input(ExtractEntitiesStep::NAME) {
            Ok(e) => e,
            Err(e) => return StepResult::failed(Self::NAME, e, start),
        };

        let outcome = infer_dependencies(
            self.client.as_deref(),
            &extraction.recipe,
            &self.config,
            &self.retry,
        )
        .await;

        StepResult::completed(Self::NAME, &outcome, Some(BuildGraphStep::NAME), start)
    }
}
