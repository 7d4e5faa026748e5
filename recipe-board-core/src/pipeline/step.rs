//! Pipeline step trait and supporting types.

use std::collections::HashMap;
use std::error::Error;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Metadata about a pipeline step.
#[derive(Debug, Clone)]
pub struct StepMetadata {
    /// Unique identifier for this step (e.g., "preparse", "build_graph")
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// If true, failures don't fail the overall pipeline
    pub continues_on_failure: bool,
}

/// Result of executing a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Name of the step that produced this result
    pub step_name: String,
    /// Whether the step succeeded
    pub success: bool,
    /// The output data (JSON)
    pub output: JsonValue,
    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How long the step took in milliseconds
    pub duration_ms: u64,
    /// Name of the next step to run; the step decides what follows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
}

impl StepResult {
    /// Successful result carrying `output` serialized to JSON.
    pub fn completed<T: Serialize>(
        step_name: &str,
        output: &T,
        next_step: Option<&str>,
        start: Instant,
    ) -> Self {
        match serde_json::to_value(output) {
            Ok(output) => Self {
                step_name: step_name.to_string(),
                success: true,
                output,
                error: None,
                duration_ms: start.elapsed().as_millis() as u64,
                next_step: next_step.map(str::to_string),
            },
            Err(e) => Self::failed(step_name, format!("Failed to serialize output: {}", e), start),
        }
    }

    pub fn failed(step_name: &str, error: impl Into<String>, start: Instant) -> Self {
        Self {
            step_name: step_name.to_string(),
            success: false,
            output: JsonValue::Null,
            error: Some(error.into()),
            duration_ms: start.elapsed().as_millis() as u64,
            next_step: None,
        }
    }
}

/// Abstraction for reading/writing step outputs.
pub trait StepOutputStore: Send + Sync {
    /// Get the output from a previous step by name.
    fn get_output(&self, step_name: &str) -> Option<JsonValue>;

    /// Save the output from a step.
    fn save_output(
        &mut self,
        step_name: &str,
        output: &JsonValue,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Step outputs kept for one analysis run and dropped with it.
#[derive(Debug, Default)]
pub struct MemoryOutputStore {
    outputs: HashMap<String, JsonValue>,
}

impl MemoryOutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize a saved output.
    pub fn typed<T: DeserializeOwned>(&self, step_name: &str) -> Option<T> {
        self.outputs
            .get(step_name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl StepOutputStore for MemoryOutputStore {
    fn get_output(&self, step_name: &str) -> Option<JsonValue> {
        self.outputs.get(step_name).cloned()
    }

    fn save_output(
        &mut self,
        step_name: &str,
        output: &JsonValue,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.outputs.insert(step_name.to_string(), output.clone());
        Ok(())
    }
}

/// Context provided to steps during execution.
pub struct StepContext<'a> {
    /// Recipe text being analysed
    pub text: &'a str,
    /// Access to prior step outputs
    pub outputs: &'a dyn StepOutputStore,
}

impl StepContext<'_> {
    /// Read and deserialize a prior step's output.
    pub fn input<T: DeserializeOwned>(&self, step_name: &str) -> Result<T, String> {
        let value = self
            .outputs
            .get_output(step_name)
            .ok_or_else(|| format!("{} output not found", step_name))?;
        serde_json::from_value(value)
            .map_err(|e| format!("Invalid {} output: {}", step_name, e))
    }
}

/// The main trait for pipeline steps.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Return metadata about this step.
    fn metadata(&self) -> StepMetadata;

    /// Execute the step.
    async fn execute(&self, ctx: &StepContext<'_>) -> StepResult;
}
