//! Entity extraction through the model, merged with the pre-parse.
//!
//! The stage never fails: transport errors, empty answers and output that is
//! still malformed after one repair round all degrade to the pre-parser's
//! records, flagged so the overall confidence drops to low.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ai::json::parse_json_object;
use crate::ai::prompts::{
    render_extract_system_prompt, render_extract_user_prompt, render_repair_prompt,
    EXTRACT_PROMPT_NAME, REPAIR_PROMPT_NAME,
};
use crate::ai::{complete_with_retry, AiClient, ChatMessage, ChatRequest, RetryPolicy, Usage};
use crate::config::{AnalyzerConfig, MergePolicy};
use crate::error::{ExtractError, ModelError};
use crate::ingredient_parser::{normalize_unit, parse_amount};
use crate::preparse::PreParse;
use crate::privacy::user_text;
use crate::types::{
    normalize_name, Confidence, Equipment, Ingredient, IngredientState, Necessity, Recipe,
    RecipeStep, RecipeWarning, RejectReason, RejectedEdge, Source,
};
use crate::vocab::{mentions, modifiers_state};

/// How the extraction stage ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// The first answer parsed.
    Extracted,
    /// The answer parsed after the corrective follow-up.
    Repaired,
    /// Only pre-parser data is available.
    Degraded { reason: String },
}

impl ExtractionStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ExtractionStatus::Degraded { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub recipe: Recipe,
    pub status: ExtractionStatus,
    pub llm_calls: u32,
    pub usage: Usage,
    /// Model-proposed step dependencies that broke the ordering rule.
    pub rejected: Vec<RejectedEdge>,
}

/// Entities as the model reported them, before merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelEntities {
    pub title: Option<String>,
    pub ingredients: Vec<Ingredient>,
    pub equipment: Vec<Equipment>,
    pub steps: Vec<ModelStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelStep {
    pub step: RecipeStep,
    /// Raw `depends_on` ordinals, validated during the merge.
    pub depends_on: Vec<u32>,
}

/// Build a recipe from pre-parser output alone.
pub fn recipe_from_preparse(text: &str, preparse: &PreParse) -> Recipe {
    let mut recipe = Recipe::new(text);
    recipe.title = preparse.title.clone();
    for ingredient in &preparse.ingredients {
        recipe.add_ingredient(ingredient.clone());
    }
    for equipment in &preparse.equipment {
        recipe.add_equipment(equipment.clone());
    }
    recipe.steps = preparse.steps.clone();
    recipe
}

fn preparse_hints(preparse: &PreParse) -> Vec<String> {
    preparse
        .ingredients
        .iter()
        .map(|i| i.raw_text.clone().unwrap_or_else(|| i.name.clone()))
        .chain(preparse.equipment.iter().map(|e| format!("equipment: {}", e.name)))
        .collect()
}

/// Run the extraction stage.
///
/// With no client the pre-parse is returned as a degraded result.
pub async fn extract_entities(
    client: Option<&dyn AiClient>,
    text: &str,
    preparse: &PreParse,
    config: &AnalyzerConfig,
    retry: &RetryPolicy,
) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome {
        recipe: recipe_from_preparse(text, preparse),
        status: ExtractionStatus::Extracted,
        llm_calls: 0,
        usage: Usage::default(),
        rejected: Vec::new(),
    };

    let Some(client) = client else {
        return degrade(outcome, "no model configured".to_string());
    };

    let mut messages = vec![
        ChatMessage::system(render_extract_system_prompt()),
        ChatMessage::user(render_extract_user_prompt(text, &preparse_hints(preparse))),
    ];

    let mut repaired = false;
    let entities = loop {
        let prompt_name = if repaired {
            REPAIR_PROMPT_NAME
        } else {
            EXTRACT_PROMPT_NAME
        };
        let request = ChatRequest::json(messages.clone());
        outcome.llm_calls += 1;
        let response = match complete_with_retry(client, prompt_name, &request, retry).await {
            Ok(response) => response,
            Err(e) => return degrade(outcome, format!("model call failed: {}", e)),
        };
        outcome.usage += response.usage;

        tracing::debug!(
            prompt_name = prompt_name,
            content = %user_text(config.user_data, &response.content),
            "Extraction response"
        );

        match parse_model_entities(&response.content) {
            Ok(entities) => break entities,
            Err(ExtractError::Empty) => {
                return degrade(outcome, ExtractError::Empty.to_string());
            }
            Err(e) if !repaired => {
                tracing::warn!(error = %e, "Extraction output malformed, requesting repair");
                messages.push(ChatMessage::assistant(response.content));
                messages.push(ChatMessage::user(render_repair_prompt(&e.to_string())));
                repaired = true;
            }
            Err(e) => return degrade(outcome, format!("output still malformed after repair: {}", e)),
        }
    };

    let (recipe, rejected) = merge(outcome.recipe, entities, config.merge_policy);
    outcome.recipe = recipe;
    outcome.rejected = rejected;
    outcome.status = if repaired {
        ExtractionStatus::Repaired
    } else {
        ExtractionStatus::Extracted
    };

    tracing::info!(
        ingredients = outcome.recipe.ingredients.len(),
        equipment = outcome.recipe.equipment.len(),
        steps = outcome.recipe.steps.len(),
        rejected = outcome.rejected.len(),
        llm_calls = outcome.llm_calls,
        "Extraction complete"
    );

    outcome
}

fn degrade(mut outcome: ExtractionOutcome, reason: String) -> ExtractionOutcome {
    tracing::warn!(reason = %reason, "Extraction degraded to pre-parser output");
    outcome.recipe.warn(RecipeWarning::ExtractionDegraded {
        reason: reason.clone(),
    });
    outcome.status = ExtractionStatus::Degraded { reason };
    outcome
}

/// Parse a model answer into entities, tolerating sloppy field shapes.
///
/// Non-array collections count as empty, non-object items are skipped, a
/// string `modifiers` becomes a one-element list and negative amounts are
/// dropped. Fails only when nothing usable remains.
pub fn parse_model_entities(content: &str) -> Result<ModelEntities, ExtractError> {
    let map = parse_json_object(content)?;

    let entities = ModelEntities {
        title: str_field(&map, "title"),
        ingredients: objects(&map, "ingredients")
            .filter_map(convert_ingredient)
            .collect(),
        equipment: objects(&map, "equipment")
            .filter_map(convert_equipment)
            .collect(),
        steps: convert_steps(&map),
    };

    if entities.ingredients.is_empty() && entities.equipment.is_empty() && entities.steps.is_empty()
    {
        return Err(ExtractError::NoEntities);
    }
    Ok(entities)
}

fn objects<'a>(
    map: &'a Map<String, Value>,
    key: &'a str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    let items: &[Value] = match map.get(key) {
        Some(Value::Array(items)) => items.as_slice(),
        Some(Value::Null) | None => &[],
        Some(_) => {
            tracing::warn!(field = key, "Expected an array, ignoring field");
            &[]
        }
    };
    items.iter().filter_map(move |item| match item {
        Value::Object(obj) => Some(obj),
        _ => {
            tracing::warn!(field = key, "Skipping non-object item");
            None
        }
    })
}

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn f64_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

fn u32_field(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s
            .trim()
            .trim_start_matches("step")
            .trim_start_matches(':')
            .trim()
            .parse()
            .ok(),
        _ => None,
    }
}

fn strings(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn confidence_field(map: &Map<String, Value>) -> Confidence {
    map.get("confidence")
        .and_then(Value::as_f64)
        .map(|c| Confidence::new(c as f32))
        .unwrap_or_else(|| Source::Llm.default_confidence())
}

fn convert_ingredient(obj: &Map<String, Value>) -> Option<Ingredient> {
    let Some(name) = str_field(obj, "name") else {
        tracing::warn!("Skipping ingredient without a name");
        return None;
    };

    let mut ingredient = Ingredient::new(name, Source::Llm);
    ingredient.amount = f64_field(obj, "amount").filter(|a| a.is_finite() && *a >= 0.0);
    ingredient.unit = str_field(obj, "unit").map(|u| normalize_unit(&u));
    ingredient.modifiers = strings(obj, "modifiers");
    ingredient.state = str_field(obj, "state")
        .and_then(|s| IngredientState::parse(&s))
        .unwrap_or_else(|| modifiers_state(&ingredient.modifiers));
    ingredient.confidence = confidence_field(obj);
    Some(ingredient)
}

fn convert_equipment(obj: &Map<String, Value>) -> Option<Equipment> {
    let Some(name) = str_field(obj, "name") else {
        tracing::warn!("Skipping equipment without a name");
        return None;
    };

    let mut equipment = Equipment::new(name, Source::Llm);
    equipment.size = str_field(obj, "size");
    equipment.necessity = match obj.get("required").and_then(Value::as_bool) {
        Some(false) => Necessity::Helpful,
        _ => Necessity::Required,
    };
    equipment.confidence = confidence_field(obj);
    Some(equipment)
}

fn convert_steps(map: &Map<String, Value>) -> Vec<ModelStep> {
    let mut seen = BTreeSet::new();
    let mut steps = Vec::new();

    for (idx, obj) in objects(map, "steps").enumerate() {
        let Some(text) = str_field(obj, "text") else {
            tracing::warn!("Skipping step without text");
            continue;
        };
        let ordinal = obj
            .get("ordinal")
            .and_then(u32_field)
            .filter(|o| *o > 0)
            .unwrap_or(idx as u32 + 1);
        if !seen.insert(ordinal) {
            tracing::warn!(ordinal = ordinal, "Skipping duplicate step ordinal");
            continue;
        }

        let mut step = RecipeStep::new(ordinal, text, Source::Llm);
        step.ingredients = strings(obj, "ingredients")
            .iter()
            .map(|s| normalize_name(s))
            .collect();
        step.equipment = strings(obj, "equipment")
            .iter()
            .map(|s| normalize_name(s))
            .collect();
        step.duration_minutes = obj.get("duration_minutes").and_then(u32_field);
        step.confidence = confidence_field(obj);

        let depends_on = match obj.get("depends_on") {
            Some(Value::Array(items)) => items.iter().filter_map(u32_field).collect(),
            Some(single) => u32_field(single).into_iter().collect(),
            None => Vec::new(),
        };

        steps.push(ModelStep { step, depends_on });
    }

    steps.sort_by_key(|s| s.step.ordinal);
    steps
}

/// Merge model entities into the pre-parser recipe.
///
/// The policy's preferred source wins field conflicts; the other source fills
/// fields the winner left empty and contributes ingredients and equipment the
/// winner missed. Steps come from the winner alone unless it produced none.
/// Records both sources agree on are marked [`Source::Merged`].
pub fn merge(
    preparsed: Recipe,
    model: ModelEntities,
    policy: MergePolicy,
) -> (Recipe, Vec<RejectedEdge>) {
    let mut recipe = Recipe::new(preparsed.source_text.clone());

    let pre_steps = preparsed.steps;
    let (model_steps, depends): (Vec<RecipeStep>, Vec<(u32, Vec<u32>)>) = model
        .steps
        .into_iter()
        .map(|s| {
            let ordinal = s.step.ordinal;
            (s.step, (ordinal, s.depends_on))
        })
        .unzip();

    let (win_ingredients, lose_ingredients, win_equipment, lose_equipment, win_steps, lose_steps);
    match policy {
        MergePolicy::Llm => {
            recipe.title = model.title.or(preparsed.title);
            win_ingredients = model.ingredients;
            lose_ingredients = preparsed.ingredients;
            win_equipment = model.equipment;
            lose_equipment = preparsed.equipment;
            win_steps = model_steps;
            lose_steps = pre_steps;
        }
        MergePolicy::PreParser => {
            recipe.title = preparsed.title.or(model.title);
            win_ingredients = preparsed.ingredients;
            lose_ingredients = model.ingredients;
            win_equipment = preparsed.equipment;
            lose_equipment = model.equipment;
            win_steps = pre_steps;
            lose_steps = model_steps;
        }
    }

    for ingredient in merge_ingredients(win_ingredients, lose_ingredients) {
        recipe.add_ingredient(ingredient);
    }
    for equipment in merge_equipment(win_equipment, lose_equipment) {
        recipe.add_equipment(equipment);
    }
    recipe.steps = merge_steps(win_steps, lose_steps);

    resolve_step_refs(&mut recipe);
    let rejected = apply_depends_on(&mut recipe, depends);
    (recipe, rejected)
}

fn corroborated(winner: Confidence, loser: Confidence) -> Confidence {
    winner
        .max(loser)
        .max(Source::Merged.default_confidence())
}

fn merge_ingredients(winners: Vec<Ingredient>, losers: Vec<Ingredient>) -> Vec<Ingredient> {
    let mut losers: Vec<Option<Ingredient>> = losers.into_iter().map(Some).collect();
    let mut merged = Vec::new();

    for mut win in winners {
        let key = win.key();
        let matched = losers
            .iter_mut()
            .find(|l| l.as_ref().is_some_and(|l| l.key() == key))
            .and_then(Option::take);
        if let Some(lose) = matched {
            win.amount = win.amount.or(lose.amount);
            win.unit = win.unit.take().or(lose.unit);
            if win.modifiers.is_empty() {
                win.modifiers = lose.modifiers;
            }
            win.state = win.state.max(lose.state);
            win.raw_text = win.raw_text.take().or(lose.raw_text);
            win.confidence = corroborated(win.confidence, lose.confidence);
            win.source = Source::Merged;
        }
        merged.push(win);
    }

    merged.extend(losers.into_iter().flatten());
    merged
}

fn merge_equipment(winners: Vec<Equipment>, losers: Vec<Equipment>) -> Vec<Equipment> {
    let mut losers: Vec<Option<Equipment>> = losers.into_iter().map(Some).collect();
    let mut merged = Vec::new();

    for mut win in winners {
        let key = win.key();
        let matched = losers
            .iter_mut()
            .find(|l| l.as_ref().is_some_and(|l| l.key() == key))
            .and_then(Option::take);
        if let Some(lose) = matched {
            win.size = win.size.take().or(lose.size);
            win.confidence = corroborated(win.confidence, lose.confidence);
            win.source = Source::Merged;
        }
        merged.push(win);
    }

    merged.extend(losers.into_iter().flatten());
    merged
}

fn merge_steps(winners: Vec<RecipeStep>, losers: Vec<RecipeStep>) -> Vec<RecipeStep> {
    let mut losers: Vec<Option<RecipeStep>> = losers.into_iter().map(Some).collect();
    let mut merged: Vec<RecipeStep> = Vec::new();

    for mut win in winners {
        let matched = losers
            .iter_mut()
            .find(|l| l.as_ref().is_some_and(|l| l.ordinal == win.ordinal))
            .and_then(Option::take);
        if let Some(lose) = matched {
            win.ingredients.extend(lose.ingredients);
            win.equipment.extend(lose.equipment);
            win.duration_minutes = win.duration_minutes.or(lose.duration_minutes);
            win.confidence = corroborated(win.confidence, lose.confidence);
            win.source = Source::Merged;
        }
        merged.push(win);
    }

    let unmatched: Vec<RecipeStep> = losers.into_iter().flatten().collect();
    if merged.is_empty() {
        merged = unmatched;
    } else if !unmatched.is_empty() {
        tracing::debug!(
            dropped = unmatched.len(),
            "Dropping steps the preferred source did not produce"
        );
    }
    merged.sort_by_key(|s| s.ordinal);
    merged.dedup_by_key(|s| s.ordinal);
    merged
}

/// Point step references at known entity keys, tolerating plurals
/// ("egg" vs "eggs"). Unresolvable references are dropped.
fn resolve_step_refs(recipe: &mut Recipe) {
    let ingredient_keys: Vec<String> = recipe.ingredients.iter().map(Ingredient::key).collect();
    let equipment_keys: Vec<String> = recipe.equipment.iter().map(Equipment::key).collect();

    let resolve = |refs: &BTreeSet<String>, keys: &[String]| -> BTreeSet<String> {
        refs.iter()
            .filter_map(|r| {
                keys.iter()
                    .find(|k| *k == r)
                    .or_else(|| keys.iter().find(|k| mentions(r, k) || mentions(k, r)))
                    .cloned()
                    .or_else(|| {
                        tracing::debug!("Dropping unresolved step reference");
                        None
                    })
            })
            .collect()
    };

    for step in &mut recipe.steps {
        step.ingredients = resolve(&step.ingredients, &ingredient_keys);
        step.equipment = resolve(&step.equipment, &equipment_keys);
    }
}

fn apply_depends_on(recipe: &mut Recipe, depends: Vec<(u32, Vec<u32>)>) -> Vec<RejectedEdge> {
    let ordinals: BTreeSet<u32> = recipe.steps.iter().map(|s| s.ordinal).collect();
    let mut rejected = Vec::new();

    for (ordinal, preds) in depends {
        let Some(step) = recipe.step_mut(ordinal) else {
            continue;
        };
        for pred in preds {
            let reason = if !ordinals.contains(&pred) && pred != ordinal {
                Some(RejectReason::UnknownNode)
            } else {
                match step.add_predecessor(pred) {
                    Ok(()) => None,
                    Err(ModelError::SelfDependency(_)) => Some(RejectReason::SelfDependency),
                    Err(_) => Some(RejectReason::ForwardDependency),
                }
            };
            if let Some(reason) = reason {
                tracing::warn!(
                    from = pred,
                    to = ordinal,
                    reason = ?reason,
                    "Rejected step dependency"
                );
                rejected.push(RejectedEdge {
                    from: format!("step:{}", pred),
                    to: format!("step:{}", ordinal),
                    relation: "precedes".to_string(),
                    reason,
                });
            }
        }
    }

    rejected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, FakeClient};
    use crate::preparse::preparse;
    use std::time::Duration;

    const EGGS: &str = "3 fresh eggs, whisk until smooth";

    const GOOD: &str = r#"{
        "title": "Eggs",
        "ingredients": [{"name": "eggs", "amount": 3, "unit": null, "modifiers": "fresh", "state": "raw", "confidence": 0.9}],
        "equipment": [{"name": "Bowl", "required": false, "confidence": 0.6}, {"name": "whisk", "confidence": 0.8}],
        "steps": [
            {"ordinal": 1, "text": "Crack the eggs into a bowl", "ingredients": ["egg"], "equipment": ["bowl"], "depends_on": []},
            {"ordinal": 2, "text": "Whisk until smooth", "ingredients": ["eggs"], "equipment": ["whisk"], "depends_on": [1, 2, 5]}
        ]
    }"#;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            timeout: Duration::from_millis(50),
            backoff: Duration::from_millis(1),
        }
    }

    async fn run(client: Option<&dyn AiClient>, text: &str) -> ExtractionOutcome {
        let pre = preparse(text);
        extract_entities(client, text, &pre, &AnalyzerConfig::default(), &fast_retry()).await
    }

    #[tokio::test]
    async fn test_extracts_and_merges() {
        let client = FakeClient::new().then_reply(GOOD);
        let outcome = run(Some(&client), EGGS).await;

        assert_eq!(outcome.status, ExtractionStatus::Extracted);
        assert_eq!(outcome.llm_calls, 1);
        let recipe = &outcome.recipe;
        assert_eq!(recipe.title.as_deref(), Some("Eggs"));
        assert_eq!(recipe.ingredients.len(), 1);
        let eggs = &recipe.ingredients[0];
        assert_eq!(eggs.amount, Some(3.0));
        assert_eq!(eggs.modifiers, vec!["fresh"]);
        assert_eq!(eggs.source, Source::Merged);

        let bowl = recipe.equipment_item("bowl").unwrap();
        assert_eq!(bowl.necessity, Necessity::Helpful);

        assert_eq!(recipe.steps.len(), 2);
        assert!(recipe.steps[0].ingredients.contains("eggs"));
        assert_eq!(
            recipe.steps[1].predecessors.iter().copied().collect::<Vec<_>>(),
            vec![1]
        );
    }

    #[tokio::test]
    async fn test_bad_depends_on_are_rejected() {
        let client = FakeClient::new().then_reply(GOOD);
        let outcome = run(Some(&client), EGGS).await;

        let reasons: Vec<RejectReason> = outcome.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![RejectReason::SelfDependency, RejectReason::UnknownNode]
        );
        for step in &outcome.recipe.steps {
            assert!(step.validate().is_ok());
        }
    }

    #[tokio::test]
    async fn test_repair_once() {
        let client = FakeClient::new()
            .then_reply("Sure, here are the ingredients: eggs and a whisk.")
            .then_reply(&format!("```json\n{}\n```", GOOD));
        let outcome = run(Some(&client), EGGS).await;

        assert_eq!(outcome.status, ExtractionStatus::Repaired);
        assert_eq!(outcome.llm_calls, 2);
        assert_eq!(client.prompt_names(), vec![EXTRACT_PROMPT_NAME, REPAIR_PROMPT_NAME]);
    }

    #[tokio::test]
    async fn test_degrades_after_failed_repair() {
        let client = FakeClient::new()
            .then_reply("{\"ingredients\": ")
            .then_reply("[1, 2, 3]");
        let outcome = run(Some(&client), EGGS).await;

        assert!(outcome.status.is_degraded());
        assert_eq!(outcome.recipe.ingredients[0].name, "eggs");
        assert_eq!(outcome.recipe.ingredients[0].source, Source::PreParser);
        assert!(matches!(
            outcome.recipe.warnings[0],
            RecipeWarning::ExtractionDegraded { .. }
        ));
    }

    #[tokio::test]
    async fn test_timeout_degrades() {
        let client = FakeClient::hanging();
        let outcome = run(Some(&client), EGGS).await;

        assert!(outcome.status.is_degraded());
        assert_eq!(client.call_count(), 2);
        assert_eq!(outcome.recipe.ingredients[0].amount, Some(3.0));
    }

    #[tokio::test]
    async fn test_empty_response_degrades_without_repair() {
        let client = FakeClient::new()
            .then_fail(AiError::EmptyResponse)
            .then_reply(GOOD);
        let outcome = run(Some(&client), EGGS).await;
        assert!(outcome.status.is_degraded());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_client_degrades() {
        let outcome = run(None, EGGS).await;
        assert!(outcome.status.is_degraded());
        assert_eq!(outcome.llm_calls, 0);
        assert_eq!(outcome.recipe.steps.len(), 1);
    }

    #[test]
    fn test_lenient_conversion() {
        let entities = parse_model_entities(
            r#"{"ingredients": [
                "just a string",
                {"name": "flour", "amount": "1 1/2", "unit": "Cups"},
                {"name": "sugar", "amount": -2},
                {"amount": 1}
            ], "equipment": "oven", "steps": null}"#,
        )
        .unwrap();

        assert_eq!(entities.ingredients.len(), 2);
        assert_eq!(entities.ingredients[0].amount, Some(1.5));
        assert_eq!(entities.ingredients[0].unit.as_deref(), Some("cup"));
        assert_eq!(entities.ingredients[1].amount, None);
        assert!(entities.equipment.is_empty());
        assert!(entities.steps.is_empty());
    }

    #[test]
    fn test_no_entities_is_an_error() {
        assert!(matches!(
            parse_model_entities(r#"{"ingredients": []}"#),
            Err(ExtractError::NoEntities)
        ));
    }

    #[test]
    fn test_preparser_policy_keeps_preparser_values() {
        let pre = preparse(EGGS);
        let base = recipe_from_preparse(EGGS, &pre);
        let mut model = ModelEntities::default();
        let mut eggs = Ingredient::new("eggs", Source::Llm);
        eggs.amount = Some(4.0);
        eggs.unit = Some("each".to_string());
        model.ingredients.push(eggs);

        let (recipe, _) = merge(base.clone(), model.clone(), MergePolicy::PreParser);
        assert_eq!(recipe.ingredients[0].amount, Some(3.0));
        assert_eq!(recipe.ingredients[0].unit.as_deref(), Some("each"));

        let (recipe, _) = merge(base, model, MergePolicy::Llm);
        assert_eq!(recipe.ingredients[0].amount, Some(4.0));
    }

    #[test]
    fn test_model_steps_replace_extra_preparser_steps() {
        let text = "## Instructions\n1. Whisk the eggs\n2. Fold in the flour\n3. Bake until set";
        let pre = preparse(text);
        let base = recipe_from_preparse(text, &pre);
        assert_eq!(base.steps.len(), 3);

        let mut model = ModelEntities::default();
        model.steps.push(ModelStep {
            step: RecipeStep::new(1, "Whisk the eggs and fold in the flour", Source::Llm),
            depends_on: Vec::new(),
        });
        model.steps.push(ModelStep {
            step: RecipeStep::new(2, "Bake until set", Source::Llm),
            depends_on: vec![1],
        });

        let (recipe, rejected) = merge(base.clone(), model.clone(), MergePolicy::Llm);
        assert!(rejected.is_empty());
        let ordinals: Vec<u32> = recipe.steps.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);
        assert_eq!(recipe.steps[1].text, "Bake until set");
        assert!(recipe.steps.iter().all(|s| s.source == Source::Merged));

        let (recipe, _) = merge(base, model, MergePolicy::PreParser);
        assert_eq!(recipe.steps.len(), 3);
        assert_eq!(recipe.steps[1].text, "Fold in the flour");
    }

    #[test]
    fn test_preparser_steps_used_when_model_has_none() {
        let text = "## Instructions\n1. Whisk the eggs\n2. Fold in the flour";
        let pre = preparse(text);
        let base = recipe_from_preparse(text, &pre);

        let (recipe, _) = merge(base, ModelEntities::default(), MergePolicy::Llm);
        assert_eq!(recipe.steps.len(), 2);
        assert_eq!(recipe.steps[0].source, Source::PreParser);
    }
}
