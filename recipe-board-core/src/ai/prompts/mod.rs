//! Prompt templates.

pub mod dependencies;
pub mod extract;
pub mod repair;

pub use dependencies::{
    render_dependencies_system_prompt, render_dependencies_user_prompt,
    render_tool_observations, DEPENDENCIES_PROMPT_NAME,
};
pub use extract::{render_extract_system_prompt, render_extract_user_prompt, EXTRACT_PROMPT_NAME};
pub use repair::{render_repair_prompt, REPAIR_PROMPT_NAME};

/// Shared opening for every prompt.
const BRIEFING: &str = "You are a kitchen operations expert who helps home cooks plan their prep. \
You read recipes carefully, never invent steps the text does not contain, and answer with JSON only.";
