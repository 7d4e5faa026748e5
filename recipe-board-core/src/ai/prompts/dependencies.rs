//! Tool-augmented dependency inference prompts.

use super::BRIEFING;

/// Prompt name used in logs.
pub const DEPENDENCIES_PROMPT_NAME: &str = "infer_dependencies";

/// Render the system prompt describing the tools and both answer shapes.
///
/// `tools` holds `(name, description)` pairs.
pub fn render_dependencies_system_prompt(tools: &[(&str, &str)], max_rounds: u32) -> String {
    let tool_list = tools
        .iter()
        .map(|(name, description)| format!("- {}: {}", name, description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"{BRIEFING}

Work out the dependencies between the steps, ingredients and equipment of an already extracted recipe.

Node ids look like "step:2", "ingredient:eggs" and "equipment:mixing bowl".
Relations:
- "used-by": ingredient -> step that uses it
- "requires": step -> equipment it needs
- "precedes": earlier step -> later step that must wait for it

You may call these tools before answering (at most {max_rounds} rounds):
{tool_list}

To call tools, reply with:
{{"tool_calls": [{{"name": "tool_name", "arguments": {{}}}}]}}

When you are done, reply with the final answer:
{{"edges": [{{"from": "step:1", "to": "step:2", "relation": "precedes", "confidence": 0.8}}], "contention": [{{"equipment": "oven", "steps": [2, 4]}}]}}

IMPORTANT:
- A "precedes" edge must go from a lower step number to a higher one.
- Only flag contention for equipment two steps would need at the same time.
- Reply with JSON only."#
    )
}

/// Render the user message listing the extracted entities.
pub fn render_dependencies_user_prompt(entities: &str) -> String {
    format!(
        "=== Extracted recipe ===\n{entities}\n=== End ===\n\nInfer the edges.",
        entities = entities
    )
}

/// Render tool results fed back to the model for the next round.
pub fn render_tool_observations(observations: &str, remaining_rounds: u32) -> String {
    if remaining_rounds == 0 {
        format!(
            "Tool results:\n{observations}\n\nNo tool rounds remain. Reply with the final answer now.",
            observations = observations
        )
    } else {
        format!(
            "Tool results:\n{observations}\n\n{remaining_rounds} tool round(s) remain.",
            observations = observations,
            remaining_rounds = remaining_rounds
        )
    }
}
