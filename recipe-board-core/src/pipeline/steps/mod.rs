//! Analysis pipeline steps, in run order.

mod build_graph;
mod extract_entities;
mod infer_dependencies;
mod layout_graph;
mod preparse;

pub use build_graph::{BuildGraphOutput, BuildGraphStep};
pub use extract_entities::ExtractEntitiesStep;
pub use infer_dependencies::InferDependenciesStep;
pub use layout_graph::LayoutGraphStep;
pub use preparse::PreparseStep;
