//! One-call entry point: text in, confidence-annotated graph out.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::ai::{AiClient, HttpAiClient, RetryPolicy, Usage};
use crate::config::AnalyzerConfig;
use crate::dependencies::{Contention, InferenceOutcome, InferenceStatus};
use crate::error::AnalysisError;
use crate::extract::{ExtractionOutcome, ExtractionStatus};
use crate::graph::{to_dot, DependencyGraph, GraphExport, Layout};
use crate::pipeline::steps::{
    BuildGraphOutput, BuildGraphStep, ExtractEntitiesStep, InferDependenciesStep,
    LayoutGraphStep, PreparseStep,
};
use crate::pipeline::{
    analysis_registry, run_pipeline, MemoryOutputStore, Progress, StepRegistry, FIRST_STEP,
};
use crate::preparse::PreParse;
use crate::types::{ConfidenceSummary, Recipe, RecipeWarning, RejectedEdge};

/// Per-step timing and outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one analysis produced.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub recipe: Recipe,
    pub graph: DependencyGraph,
    pub layout: Layout,
    pub confidence: ConfidenceSummary,
    pub extraction: ExtractionStatus,
    pub inference: InferenceStatus,
    /// Step dependencies dropped during extraction and inference.
    pub rejected: Vec<RejectedEdge>,
    pub contention: Vec<Contention>,
    /// Lines the pre-parser could not use.
    pub leftovers: Vec<String>,
    pub llm_calls: u32,
    pub usage: Usage,
    pub steps: Vec<StepSummary>,
}

impl Analysis {
    pub fn warnings(&self) -> &[RecipeWarning] {
        &self.recipe.warnings
    }

    pub fn export(&self) -> GraphExport {
        GraphExport::new(&self.graph, self.recipe.title.as_deref())
    }

    pub fn to_dot(&self) -> String {
        to_dot(&self.graph)
    }
}

/// Runs the analysis pipeline. Holds no per-run state, so one analyzer can
/// serve many independent runs; dropping an `analyze` future cancels its run.
pub struct Analyzer {
    registry: StepRegistry,
    has_client: bool,
}

impl Analyzer {
    pub fn new(
        client: Option<Arc<dyn AiClient>>,
        config: AnalyzerConfig,
        retry: RetryPolicy,
    ) -> Self {
        let has_client = client.is_some();
        Self {
            registry: analysis_registry(client, &config, &retry),
            has_client,
        }
    }

    /// Analyzer that never calls a model.
    pub fn offline(config: AnalyzerConfig) -> Self {
        Self::new(None, config, RetryPolicy::default())
    }

    /// Build from environment variables. A missing credential means offline
    /// analysis, not an error.
    pub fn from_env() -> Self {
        Self::from_env_with_config(AnalyzerConfig::from_env())
    }

    /// Like [`Analyzer::from_env`], with pipeline settings supplied by the caller.
    pub fn from_env_with_config(config: AnalyzerConfig) -> Self {
        match HttpAiClient::from_env() {
            Ok(client) => {
                let retry = RetryPolicy::from(client.config());
                tracing::info!(model = %client.config().model, "Using model for extraction");
                Self::new(Some(Arc::new(client)), config, retry)
            }
            Err(e) => {
                tracing::warn!(error = %e, "No model available, analysing offline");
                Self::offline(config)
            }
        }
    }

    pub fn has_client(&self) -> bool {
        self.has_client
    }

    pub async fn analyze(&self, text: &str) -> Result<Analysis, AnalysisError> {
        self.analyze_with_progress(text, None).await
    }

    pub async fn analyze_with_progress(
        &self,
        text: &str,
        progress: Option<&watch::Sender<Progress>>,
    ) -> Result<Analysis, AnalysisError> {
        let mut store = MemoryOutputStore::new();
        let results = run_pipeline(FIRST_STEP, text, &mut store, &self.registry, progress).await;

        if let Some(failed) = results.iter().find(|r| !r.success) {
            return Err(AnalysisError::StepFailed {
                step: failed.step_name.clone(),
                message: failed.error.clone().unwrap_or_default(),
            });
        }

        let preparse: PreParse = store
            .typed(PreparseStep::NAME)
            .ok_or(AnalysisError::MissingOutput(PreparseStep::NAME))?;
        let extraction: ExtractionOutcome = store
            .typed(ExtractEntitiesStep::NAME)
            .ok_or(AnalysisError::MissingOutput(ExtractEntitiesStep::NAME))?;
        let inference: InferenceOutcome = store
            .typed(InferDependenciesStep::NAME)
            .ok_or(AnalysisError::MissingOutput(InferDependenciesStep::NAME))?;
        let built: BuildGraphOutput = store
            .typed(BuildGraphStep::NAME)
            .ok_or(AnalysisError::MissingOutput(BuildGraphStep::NAME))?;
        let layout: Layout = store
            .typed(LayoutGraphStep::NAME)
            .ok_or(AnalysisError::MissingOutput(LayoutGraphStep::NAME))?;

        let mut rejected = extraction.rejected;
        rejected.extend(inference.rejected);
        let mut usage = extraction.usage;
        usage += inference.usage;

        let analysis = Analysis {
            confidence: built.recipe.confidence.clone(),
            recipe: built.recipe,
            graph: built.graph,
            layout,
            extraction: extraction.status,
            inference: inference.status,
            rejected,
            contention: inference.contention,
            leftovers: preparse.leftovers.into_iter().map(|l| l.text).collect(),
            llm_calls: extraction.llm_calls + inference.llm_calls,
            usage,
            steps: results
                .into_iter()
                .map(|r| StepSummary {
                    name: r.step_name,
                    success: r.success,
                    duration_ms: r.duration_ms,
                    error: r.error,
                })
                .collect(),
        };

        tracing::info!(
            confidence = %analysis.confidence.overall,
            nodes = analysis.graph.nodes.len(),
            edges = analysis.graph.edges.len(),
            warnings = analysis.recipe.warnings.len(),
            llm_calls = analysis.llm_calls,
            "Analysis complete"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::FakeClient;
    use crate::types::ConfidenceLevel;

    #[tokio::test]
    async fn test_offline_analysis_is_low_confidence() {
        let analysis = Analyzer::offline(AnalyzerConfig::default())
            .analyze("3 fresh eggs, whisk until smooth")
            .await
            .unwrap();

        let eggs = analysis.recipe.ingredient("eggs").unwrap();
        assert_eq!(eggs.amount, Some(3.0));
        assert_eq!(analysis.confidence.overall, ConfidenceLevel::Low);
        assert!(analysis.extraction.is_degraded());
        assert!(!analysis.inference.is_complete());
        assert_eq!(analysis.llm_calls, 0);
        assert_eq!(analysis.steps.len(), 5);
    }

    #[tokio::test]
    async fn test_model_answers_flow_into_graph() {
        let client = FakeClient::new()
            .then_reply(
                r#"{"title": "Eggs", "ingredients": [{"name": "eggs", "amount": 3}],
                    "equipment": [{"name": "bowl"}, {"name": "skillet"}],
                    "steps": [
                        {"ordinal": 1, "text": "Whisk the eggs in a bowl", "ingredients": ["eggs"], "equipment": ["bowl"]},
                        {"ordinal": 2, "text": "Cook the eggs in a skillet", "ingredients": ["eggs"], "equipment": ["skillet"]}
                    ]}"#,
            )
            .then_reply(
                r#"{"edges": [{"from": "step:1", "to": "step:2", "relation": "precedes", "confidence": 0.9}]}"#,
            );
        let analyzer = Analyzer::new(
            Some(Arc::new(client)),
            AnalyzerConfig::default(),
            RetryPolicy::default(),
        );
        let analysis = analyzer.analyze("Eggs\n3 eggs\nWhisk, then cook.").await.unwrap();

        assert_eq!(analysis.extraction, ExtractionStatus::Extracted);
        assert_eq!(analysis.inference, InferenceStatus::Complete);
        assert_eq!(analysis.llm_calls, 2);
        assert!(analysis.recipe.step(2).unwrap().predecessors.contains(&1));
        assert!(analysis.graph.is_acyclic());
        assert!(analysis.export().to_json().unwrap().contains("\"step:2\""));
    }
}
