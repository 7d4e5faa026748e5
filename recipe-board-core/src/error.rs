use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("{0} name is empty")]
    EmptyName(&'static str),

    #[error("Invalid amount {amount} for {name}")]
    InvalidAmount { name: String, amount: f64 },

    #[error("Step {0} cannot depend on itself")]
    SelfDependency(u32),

    #[error("Step {step} cannot depend on later step {predecessor}")]
    ForwardDependency { step: u32, predecessor: u32 },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Model returned an empty response")]
    Empty,

    #[error("No JSON object found in model output")]
    NoJson,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Model output contained no ingredients, equipment or steps")]
    NoEntities,

    #[error("Model output has neither '{0}' nor '{1}'")]
    MissingField(&'static str, &'static str),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid graph export: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unsupported export format {format} version {version}")]
    UnsupportedFormat { format: String, version: u32 },

    #[error("Edge references unknown node: {0}")]
    UnknownNode(String),
}

#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("Feedback refers to an entity not in this recipe: {0}")]
    UnknownEntity(String),

    #[error("Failed to serialize feedback record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Feedback store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool}: missing or invalid argument '{argument}'")]
    BadArgument {
        tool: &'static str,
        argument: &'static str,
    },

    #[error("No step {0} in this recipe")]
    UnknownStep(u32),

    #[error("No ingredient named '{0}' in this recipe")]
    UnknownIngredient(String),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Pipeline step {step} failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("Pipeline step {0} left no usable output")]
    MissingOutput(&'static str),
}
