//! Helper tools the model may call while inferring dependencies.
//!
//! Every tool is a pure function over the extracted recipe. A failing call
//! becomes a structured error observation for the model, never an abort.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::preparse::find_equipment;
use crate::types::{normalize_name, Recipe, RecipeStep};
use crate::vocab::{first_word, mentions, verb_state};

/// A tool call parsed from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Result of one tool call, fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn success(data: Value, summary: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            summary: summary.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            data: Value::Null,
            summary: format!("Error: {}", error),
            error: Some(error),
        }
    }
}

pub trait InferenceTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Argument shape shown to the model.
    fn parameters(&self) -> Value;

    fn execute(&self, recipe: &Recipe, arguments: &Value) -> Result<ToolOutput, ToolError>;
}

/// Tools available to the inference loop, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Box<dyn InferenceTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tool.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(LookupIngredientState);
        registry.register(ListStepEquipment);
        registry.register(CheckStepAdjacency);
        registry.register(FindIngredientsInStep);
        registry.register(FindEquipmentInStep);
        registry
    }

    pub fn register<T: InferenceTool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// `(name, "description Arguments: {...}")` pairs for the system prompt.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        self.tools
            .values()
            .map(|tool| {
                (
                    tool.name(),
                    format!("{} Arguments: {}", tool.description(), tool.parameters()),
                )
            })
            .collect()
    }

    /// Run one call. Unknown tools and bad arguments come back as failures.
    pub fn run(&self, recipe: &Recipe, call: &ToolCall) -> ToolOutput {
        let result = match self.tools.get(call.name.as_str()) {
            Some(tool) => tool.execute(recipe, &call.arguments),
            None => Err(ToolError::UnknownTool(call.name.clone())),
        };
        match result {
            Ok(output) => {
                tracing::debug!(tool = %call.name, "Tool call succeeded");
                output
            }
            Err(e) => {
                tracing::debug!(tool = %call.name, error = %e, "Tool call failed");
                ToolOutput::failure(e.to_string())
            }
        }
    }
}

fn step_arg(arguments: &Value, tool: &'static str, argument: &'static str) -> Result<u32, ToolError> {
    let bad = || ToolError::BadArgument { tool, argument };
    match arguments.get(argument).ok_or_else(bad)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()).ok_or_else(bad),
        Value::String(s) => s
            .trim()
            .trim_start_matches("step")
            .trim_start_matches(':')
            .trim()
            .parse()
            .map_err(|_| bad()),
        _ => Err(bad()),
    }
}

fn find_step<'a>(
    recipe: &'a Recipe,
    arguments: &Value,
    tool: &'static str,
    argument: &'static str,
) -> Result<&'a RecipeStep, ToolError> {
    let ordinal = step_arg(arguments, tool, argument)?;
    recipe.step(ordinal).ok_or(ToolError::UnknownStep(ordinal))
}

/// Current state of an ingredient and the steps that use it.
pub struct LookupIngredientState;

impl InferenceTool for LookupIngredientState {
    fn name(&self) -> &'static str {
        "lookup_ingredient_state"
    }

    fn description(&self) -> &'static str {
        "Look up an ingredient's preparation state and the steps that use it."
    }

    fn parameters(&self) -> Value {
        json!({"name": "string"})
    }

    fn execute(&self, recipe: &Recipe, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let name = arguments
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim_start_matches("ingredient:"))
            .ok_or(ToolError::BadArgument {
                tool: self.name(),
                argument: "name",
            })?;
        let ingredient = recipe
            .ingredient(name)
            .ok_or_else(|| ToolError::UnknownIngredient(normalize_name(name)))?;
        let key = ingredient.key();

        let used_in: Vec<Value> = recipe
            .steps
            .iter()
            .filter(|s| s.ingredients.contains(&key) || mentions(&s.text, &ingredient.name))
            .map(|s| {
                let implied = first_word(&s.text).and_then(|w| verb_state(&w));
                json!({"step": s.ordinal, "implied_state": implied})
            })
            .collect();

        let summary = format!("{} is {}, used in {} step(s)", key, ingredient.state, used_in.len());
        Ok(ToolOutput::success(
            json!({
                "name": key,
                "state": ingredient.state,
                "modifiers": ingredient.modifiers,
                "used_in": used_in,
            }),
            summary,
        ))
    }
}

/// Equipment already bound to a step.
pub struct ListStepEquipment;

impl InferenceTool for ListStepEquipment {
    fn name(&self) -> &'static str {
        "list_step_equipment"
    }

    fn description(&self) -> &'static str {
        "List the equipment already bound to a step."
    }

    fn parameters(&self) -> Value {
        json!({"step": "integer"})
    }

    fn execute(&self, recipe: &Recipe, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let step = find_step(recipe, arguments, self.name(), "step")?;
        let equipment: Vec<&String> = step.equipment.iter().collect();
        Ok(ToolOutput::success(
            json!({"step": step.ordinal, "equipment": equipment}),
            format!("step {} uses {} item(s)", step.ordinal, equipment.len()),
        ))
    }
}

/// Whether two steps are adjacent and what they share.
pub struct CheckStepAdjacency;

impl InferenceTool for CheckStepAdjacency {
    fn name(&self) -> &'static str {
        "check_step_adjacency"
    }

    fn description(&self) -> &'static str {
        "Check whether two steps are adjacent and which ingredients and equipment they share."
    }

    fn parameters(&self) -> Value {
        json!({"a": "integer", "b": "integer"})
    }

    fn execute(&self, recipe: &Recipe, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let a = find_step(recipe, arguments, self.name(), "a")?;
        let b = find_step(recipe, arguments, self.name(), "b")?;
        let adjacent = a.ordinal.abs_diff(b.ordinal) == 1;
        let shared_ingredients: BTreeSet<&String> = a.ingredients.intersection(&b.ingredients).collect();
        let shared_equipment: BTreeSet<&String> = a.equipment.intersection(&b.equipment).collect();

        Ok(ToolOutput::success(
            json!({
                "a": a.ordinal,
                "b": b.ordinal,
                "adjacent": adjacent,
                "shared_ingredients": shared_ingredients,
                "shared_equipment": shared_equipment,
            }),
            format!(
                "steps {} and {} {} adjacent",
                a.ordinal,
                b.ordinal,
                if adjacent { "are" } else { "are not" }
            ),
        ))
    }
}

/// Recipe ingredients named in a step's text.
pub struct FindIngredientsInStep;

impl InferenceTool for FindIngredientsInStep {
    fn name(&self) -> &'static str {
        "find_ingredients_in_step"
    }

    fn description(&self) -> &'static str {
        "Find which recipe ingredients a step's text mentions."
    }

    fn parameters(&self) -> Value {
        json!({"step": "integer"})
    }

    fn execute(&self, recipe: &Recipe, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let step = find_step(recipe, arguments, self.name(), "step")?;
        let found: BTreeSet<String> = recipe
            .ingredients
            .iter()
            .filter(|i| step.ingredients.contains(&i.key()) || mentions(&step.text, &i.name))
            .map(|i| i.key())
            .collect();
        Ok(ToolOutput::success(
            json!({"step": step.ordinal, "ingredients": found}),
            format!("step {} mentions {} ingredient(s)", step.ordinal, found.len()),
        ))
    }
}

/// Equipment nouns in a step's text, plus any already bound to it.
pub struct FindEquipmentInStep;

impl InferenceTool for FindEquipmentInStep {
    fn name(&self) -> &'static str {
        "find_equipment_in_step"
    }

    fn description(&self) -> &'static str {
        "Find equipment mentioned in a step's text."
    }

    fn parameters(&self) -> Value {
        json!({"step": "integer"})
    }

    fn execute(&self, recipe: &Recipe, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let step = find_step(recipe, arguments, self.name(), "step")?;
        let mut found: BTreeSet<String> = step.equipment.clone();
        found.extend(find_equipment(&step.text).iter().map(|e| e.key()));
        found.extend(
            recipe
                .equipment
                .iter()
                .filter(|e| mentions(&step.text, &e.name))
                .map(|e| e.key()),
        );
        Ok(ToolOutput::success(
            json!({"step": step.ordinal, "equipment": found}),
            format!("step {} mentions {} equipment item(s)", step.ordinal, found.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Equipment, Ingredient, IngredientState, Source};

    fn recipe() -> Recipe {
        let mut recipe = Recipe::new("");
        let mut onion = Ingredient::new("onion", Source::PreParser);
        onion.state = IngredientState::Chopped;
        recipe.add_ingredient(onion);
        recipe.add_ingredient(Ingredient::new("eggs", Source::PreParser));
        recipe.add_equipment(Equipment::new("skillet", Source::PreParser));

        let mut one = RecipeStep::new(1, "Chop the onion", Source::Llm);
        one.ingredients.insert("onion".to_string());
        let mut two = RecipeStep::new(2, "Fry the onion and eggs in a large skillet", Source::Llm);
        two.ingredients.insert("onion".to_string());
        two.equipment.insert("skillet".to_string());
        recipe.steps = vec![one, two];
        recipe
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_standard_registry() {
        let registry = ToolRegistry::standard();
        assert_eq!(registry.len(), 5);
        let names: Vec<&str> = registry.describe().iter().map(|(n, _)| *n).collect();
        assert!(names.contains(&"check_step_adjacency"));
    }

    #[test]
    fn test_lookup_ingredient_state() {
        let output = ToolRegistry::standard().run(
            &recipe(),
            &call("lookup_ingredient_state", json!({"name": "Onion"})),
        );
        assert!(output.success);
        assert_eq!(output.data["state"], "chopped");
        assert_eq!(output.data["used_in"][1]["implied_state"], "cooked");
    }

    #[test]
    fn test_step_tools() {
        let registry = ToolRegistry::standard();
        let recipe = recipe();

        let output = registry.run(&recipe, &call("list_step_equipment", json!({"step": 2})));
        assert_eq!(output.data["equipment"], json!(["skillet"]));

        let output = registry.run(&recipe, &call("check_step_adjacency", json!({"a": 1, "b": "step:2"})));
        assert_eq!(output.data["adjacent"], true);
        assert_eq!(output.data["shared_ingredients"], json!(["onion"]));

        let output = registry.run(&recipe, &call("find_ingredients_in_step", json!({"step": 2})));
        assert_eq!(output.data["ingredients"], json!(["eggs", "onion"]));

        let output = registry.run(&recipe, &call("find_equipment_in_step", json!({"step": 2})));
        assert_eq!(output.data["equipment"], json!(["skillet"]));
    }

    #[test]
    fn test_failures_are_observations() {
        let registry = ToolRegistry::standard();
        let recipe = recipe();

        let output = registry.run(&recipe, &call("delete_recipe", json!({})));
        assert!(!output.success);
        assert_eq!(output.error.as_deref(), Some("Unknown tool: delete_recipe"));

        let output = registry.run(&recipe, &call("list_step_equipment", json!({"step": 9})));
        assert_eq!(output.error.as_deref(), Some("No step 9 in this recipe"));

        let output = registry.run(&recipe, &call("list_step_equipment", json!({"stp": 1})));
        assert!(output.summary.starts_with("Error: list_step_equipment"));

        let output = registry.run(&recipe, &call("lookup_ingredient_state", json!({"name": "tofu"})));
        assert!(!output.success);
    }
}
