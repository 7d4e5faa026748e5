//! Corrective follow-up prompt for output that did not parse.

/// Prompt name used in logs.
pub const REPAIR_PROMPT_NAME: &str = "repair_json";

/// Render the follow-up user message asking the model to fix its last answer.
pub fn render_repair_prompt(error: &str) -> String {
    format!(
        "Your previous answer could not be used: {error}.\n\
         Reply again with ONLY the corrected JSON object matching the schema from the first message. \
         Do not add explanations or code fences.",
        error = error
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_repair_prompt() {
        let prompt = render_repair_prompt("Invalid JSON: expected value at line 1");
        assert!(prompt.contains("expected value at line 1"));
        assert!(prompt.contains("ONLY the corrected JSON"));
    }
}
