//! Step pipeline that turns recipe text into a laid-out dependency graph.
//!
//! - Steps are defined via the `PipelineStep` trait
//! - Each step returns `next_step` to indicate what runs next
//! - Steps exchange data as JSON through a `StepOutputStore`

mod executor;
mod step;
pub mod steps;

use std::sync::Arc;

pub use executor::{run_pipeline, Progress, StepRegistry};
pub use step::{
    MemoryOutputStore, PipelineStep, StepContext, StepMetadata, StepOutputStore, StepResult,
};

use crate::ai::{AiClient, RetryPolicy};
use crate::config::AnalyzerConfig;
use steps::{
    BuildGraphStep, ExtractEntitiesStep, InferDependenciesStep, LayoutGraphStep, PreparseStep,
};

/// Name of the step every analysis starts from.
pub const FIRST_STEP: &str = PreparseStep::NAME;

/// Registry holding the full analysis chain.
pub fn analysis_registry(
    client: Option<Arc<dyn AiClient>>,
    config: &AnalyzerConfig,
    retry: &RetryPolicy,
) -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry.register(Box::new(PreparseStep));
    registry.register(Box::new(ExtractEntitiesStep::new(
        client.clone(),
        config.clone(),
        retry.clone(),
    )));
    registry.register(Box::new(InferDependenciesStep::new(
        client,
        config.clone(),
        retry.clone(),
    )));
    registry.register(Box::new(BuildGraphStep));
    registry.register(Box::new(LayoutGraphStep));
    registry
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio::sync::watch;

    use super::steps::BuildGraphOutput;
    use super::*;
    use crate::graph::Layout;

    #[test]
    fn step_names_are_unique() {
        let names = [
            PreparseStep::NAME,
            ExtractEntitiesStep::NAME,
            InferDependenciesStep::NAME,
            BuildGraphStep::NAME,
            LayoutGraphStep::NAME,
        ];

        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(
            names.len(),
            unique.len(),
            "Duplicate step names detected! Names: {:?}",
            names
        );
    }

    #[tokio::test]
    async fn test_offline_chain_runs_every_step() {
        let registry =
            analysis_registry(None, &AnalyzerConfig::default(), &RetryPolicy::default());
        let mut store = MemoryOutputStore::new();
        let (tx, rx) = watch::channel(Progress::default());

        let text = "3 fresh eggs, whisk until smooth";
        let results = run_pipeline(FIRST_STEP, text, &mut store, &registry, Some(&tx)).await;

        let names: Vec<&str> = results.iter().map(|r| r.step_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "preparse",
                "extract_entities",
                "infer_dependencies",
                "build_graph",
                "layout_graph"
            ]
        );
        assert!(results.iter().all(|r| r.success));

        let built: BuildGraphOutput = store.typed(BuildGraphStep::NAME).unwrap();
        assert!(built.recipe.ingredient("eggs").is_some());
        let layout: Layout = store.typed(LayoutGraphStep::NAME).unwrap();
        assert_eq!(layout.nodes.len(), built.graph.nodes.len());

        let progress = rx.borrow().clone();
        assert!(progress.finished);
        assert_eq!(progress.completed, 5);
        assert_eq!(progress.total, 5);
    }

    #[tokio::test]
    async fn test_missing_input_stops_the_chain() {
        let registry =
            analysis_registry(None, &AnalyzerConfig::default(), &RetryPolicy::default());
        let mut store = MemoryOutputStore::new();

        let results =
            run_pipeline(BuildGraphStep::NAME, "", &mut store, &registry, None).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(
            results[0].error.as_deref(),
            Some("extract_entities output not found")
        );
    }

    #[tokio::test]
    async fn test_unknown_first_step() {
        let registry = StepRegistry::new();
        let mut store = MemoryOutputStore::new();
        assert!(run_pipeline("nope", "", &mut store, &registry, None)
            .await
            .is_empty());
    }
}
