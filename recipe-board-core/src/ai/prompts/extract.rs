//! Entity extraction prompt: ingredients, equipment and steps from raw text.

use super::BRIEFING;

/// Prompt name used in logs.
pub const EXTRACT_PROMPT_NAME: &str = "extract_entities";

/// Render the system prompt carrying the output schema.
pub fn render_extract_system_prompt() -> String {
    format!(
        r#"{BRIEFING}

Extract the ingredients, equipment and numbered steps from the recipe the user sends.

IMPORTANT RULES:
- Return ONLY valid JSON matching the schema below. No other text.
- Keep steps in the order they appear, numbering them from 1.
- "depends_on" lists earlier step numbers that must finish first. Never list the step itself or a later step.
- Use the ingredient and equipment names exactly as you list them when referring to them from steps.
- "state" is one of: raw, cleaned, chopped, mixed, cooked.
- "confidence" is a number between 0 and 1.

JSON Schema:
{{
  "title": "string or null",
  "ingredients": [
    {{
      "name": "string",
      "amount": "number or null",
      "unit": "string or null",
      "modifiers": ["string"],
      "state": "string",
      "confidence": "number"
    }}
  ],
  "equipment": [
    {{
      "name": "string",
      "size": "string or null",
      "required": "boolean",
      "confidence": "number"
    }}
  ],
  "steps": [
    {{
      "ordinal": "integer",
      "text": "string",
      "ingredients": ["ingredient name"],
      "equipment": ["equipment name"],
      "depends_on": ["integer"],
      "duration_minutes": "integer or null",
      "confidence": "number"
    }}
  ]
}}

Example for "1. In a large mixing bowl, combine 3 cups flour and 1 cup warm water.":
{{"title": null, "ingredients": [{{"name": "flour", "amount": 3, "unit": "cup", "modifiers": [], "state": "raw", "confidence": 0.9}}, {{"name": "water", "amount": 1, "unit": "cup", "modifiers": ["warm"], "state": "raw", "confidence": 0.9}}], "equipment": [{{"name": "mixing bowl", "size": "large", "required": true, "confidence": 0.9}}], "steps": [{{"ordinal": 1, "text": "In a large mixing bowl, combine 3 cups flour and 1 cup warm water.", "ingredients": ["flour", "water"], "equipment": ["mixing bowl"], "depends_on": [], "duration_minutes": null, "confidence": 0.9}}]}}"#
    )
}

/// Render the user message: the recipe plus lines the pre-parser already
/// understood, as hints.
pub fn render_extract_user_prompt(recipe_text: &str, preparsed_hints: &[String]) -> String {
    let hints = if preparsed_hints.is_empty() {
        "none".to_string()
    } else {
        preparsed_hints
            .iter()
            .map(|h| format!("- {}", h))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Already recognized (verify, correct and complete these):\n{hints}\n\n=== Recipe ===\n{recipe_text}\n=== End recipe ===",
        hints = hints,
        recipe_text = recipe_text
    )
}
