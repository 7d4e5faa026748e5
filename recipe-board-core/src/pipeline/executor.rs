//! Pipeline executor and step registry.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info_span, Instrument};

use crate::pipeline::step::{PipelineStep, StepContext, StepOutputStore, StepResult};

/// Registry that maps step names to their implementations.
pub struct StepRegistry {
    steps: HashMap<String, Box<dyn PipelineStep>>,
}

impl StepRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// Register a step implementation.
    pub fn register(&mut self, step: Box<dyn PipelineStep>) {
        self.steps.insert(step.metadata().name.to_string(), step);
    }

    /// Get a step by name.
    pub fn get(&self, name: &str) -> Option<&dyn PipelineStep> {
        self.steps.get(name).map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Step about to run, `None` once the run ends.
    pub current_step: Option<String>,
    pub completed: usize,
    pub total: usize,
    pub finished: bool,
}

/// Run a pipeline starting from the given step.
///
/// The executor follows the step-driven chain: each step returns `next_step`
/// to indicate what should run next. This continues until a step returns
/// `next_step: None` or a step fails (unless it has `continues_on_failure`).
/// When a progress sender is given it is updated before every step and once
/// at the end.
pub async fn run_pipeline(
    first_step_name: &str,
    text: &str,
    store: &mut dyn StepOutputStore,
    registry: &StepRegistry,
    progress: Option<&watch::Sender<Progress>>,
) -> Vec<StepResult> {
    let mut results = Vec::new();
    let mut current_step_name = Some(first_step_name.to_string());
    let report = |current_step: Option<String>, completed: usize, finished: bool| {
        if let Some(tx) = progress {
            tx.send_replace(Progress {
                current_step,
                completed,
                total: registry.len(),
                finished,
            });
        }
    };

    while let Some(step_name) = current_step_name {
        let step = match registry.get(&step_name) {
            Some(s) => s,
            None => {
                tracing::warn!(step = %step_name, "Unknown pipeline step, stopping");
                break;
            }
        };
        report(Some(step_name.clone()), results.len(), false);

        let meta = step.metadata();
        let ctx = StepContext {
            text,
            outputs: store,
        };
        let result = step
            .execute(&ctx)
            .instrument(info_span!("pipeline_step", step = %step_name))
            .await;

        if result.success {
            let _save_span = info_span!("save_output", step = %step_name).entered();
            if let Err(e) = store.save_output(meta.name, &result.output) {
                // Log error but continue - we still have the result
                tracing::warn!("Failed to save output for step {}: {}", meta.name, e);
            }
        } else {
            tracing::warn!(
                step = %step_name,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Pipeline step failed"
            );
        }

        let should_continue = result.success || meta.continues_on_failure;
        let next = result.next_step.clone();
        results.push(result);

        if !should_continue {
            break;
        }

        current_step_name = next;
    }

    report(None, results.len(), true);
    results
}
