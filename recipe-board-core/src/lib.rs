pub mod ai;
pub mod analyzer;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod graph;
pub mod ingredient_parser;
pub mod pipeline;
pub mod preparse;
pub mod privacy;
pub mod samples;
pub mod types;
pub mod vocab;

pub use analyzer::{Analysis, Analyzer, StepSummary};
pub use config::{AnalyzerConfig, MergePolicy};
pub use error::{AnalysisError, ExportError, ExtractError, FeedbackError, ModelError, ToolError};
pub use feedback::{
    submit_feedback, EntityKind, EntityReference, FeedbackRecord, FeedbackStore, Judgment,
    JsonlFeedbackStore, MemoryFeedbackStore,
};
pub use graph::{DependencyGraph, GraphExport, NodeId, Relation};
pub use preparse::{preparse, PreParse};
pub use types::{
    Confidence, ConfidenceLevel, ConfidenceSummary, Equipment, Ingredient, IngredientState,
    Recipe, RecipeStep, RecipeWarning, Source,
};

/// Unique identifier for this build, generated at compile time.
/// Stamped on graph exports.
pub const BUILD_ID: &str = env!("BUILD_ID");
