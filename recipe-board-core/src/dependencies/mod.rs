//! Dependency inference: a bounded tool-calling loop with the model.
//!
//! Each round the model either asks for tool calls or gives its final edge
//! list. The number of tool rounds is capped; running out keeps whatever
//! edges were proposed so far, topped up with heuristic edges, and marks the
//! result incomplete. Without a usable model the heuristic edges are used on
//! their own.

mod tools;
mod validate;

pub use tools::{
    CheckStepAdjacency, FindEquipmentInStep, FindIngredientsInStep, InferenceTool,
    ListStepEquipment, LookupIngredientState, ToolCall, ToolOutput, ToolRegistry,
};
pub use validate::{
    check_state_progression, detect_contention, heuristic_edges, recipe_node_ids, validate_edge,
    Contention,
};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::ai::json::parse_json_object;
use crate::ai::prompts::{
    render_dependencies_system_prompt, render_dependencies_user_prompt, render_repair_prompt,
    render_tool_observations, DEPENDENCIES_PROMPT_NAME, REPAIR_PROMPT_NAME,
};
use crate::ai::{complete_with_retry, AiClient, ChatMessage, ChatRequest, RetryPolicy, Usage};
use crate::config::AnalyzerConfig;
use crate::error::ExtractError;
use crate::graph::{CandidateEdge, NodeId, Relation};
use crate::privacy::user_text;
use crate::types::{Recipe, RecipeWarning, RejectedEdge, Source};

/// Tool calls honored per round; extra calls are dropped.
pub const MAX_CALLS_PER_ROUND: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InferenceStatus {
    /// The model gave a final answer within the round limit.
    Complete,
    /// Tool rounds ran out; partial model edges plus heuristics.
    Incomplete { reason: String },
    /// Heuristic edges only.
    Heuristic { reason: String },
}

impl InferenceStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, InferenceStatus::Complete)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceOutcome {
    pub edges: Vec<CandidateEdge>,
    pub contention: Vec<Contention>,
    /// Proposed edges that failed validation.
    pub rejected: Vec<RejectedEdge>,
    pub status: InferenceStatus,
    pub rounds_used: u32,
    pub llm_calls: u32,
    pub usage: Usage,
    pub warnings: Vec<RecipeWarning>,
}

impl InferenceOutcome {
    pub fn is_incomplete(&self) -> bool {
        !self.status.is_complete()
    }

    /// Record the inferred edges on the recipe's steps and attach warnings.
    pub fn apply_to(&self, recipe: &mut Recipe) {
        for edge in &self.edges {
            match (edge.relation, &edge.from, &edge.to) {
                (Relation::Precedes, NodeId::Step(a), NodeId::Step(b)) => {
                    if let Some(step) = recipe.step_mut(*b) {
                        if let Err(e) = step.add_predecessor(*a) {
                            tracing::warn!(error = %e, "Skipping invalid predecessor");
                        }
                    }
                }
                (Relation::UsedBy, NodeId::Ingredient(key), NodeId::Step(s)) => {
                    if let Some(step) = recipe.step_mut(*s) {
                        step.ingredients.insert(key.clone());
                    }
                }
                (Relation::Requires, NodeId::Step(s), NodeId::Equipment(key)) => {
                    if let Some(step) = recipe.step_mut(*s) {
                        step.equipment.insert(key.clone());
                    }
                }
                _ => {}
            }
        }
        for warning in &self.warnings {
            recipe.warn(warning.clone());
        }
    }
}

/// Conversation state carried between rounds.
struct LoopState {
    messages: Vec<ChatMessage>,
    remaining_rounds: u32,
    pending_calls: Vec<ToolCall>,
    /// Edges proposed alongside tool calls, kept in case the loop runs out.
    partial_edges: Vec<Value>,
}

/// One parsed model turn.
#[derive(Debug, PartialEq)]
enum Reply {
    ToolCalls { calls: Vec<ToolCall>, edges: Vec<Value> },
    Final { edges: Vec<Value>, contention: Vec<Contention> },
}

fn parse_reply(content: &str) -> Result<Reply, ExtractError> {
    let map = parse_json_object(content)?;
    let edges = array(&map, "edges");

    let calls: Vec<ToolCall> = array(&map, "tool_calls")
        .into_iter()
        .filter_map(|call| match serde_json::from_value::<ToolCall>(call) {
            Ok(call) => Some(call),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed tool call");
                None
            }
        })
        .collect();

    if !calls.is_empty() {
        return Ok(Reply::ToolCalls { calls, edges });
    }
    if !map.contains_key("edges") {
        return Err(ExtractError::MissingField("tool_calls", "edges"));
    }

    let contention = array(&map, "contention")
        .into_iter()
        .filter_map(|c| serde_json::from_value::<Contention>(c).ok())
        .collect();
    Ok(Reply::Final { edges, contention })
}

fn array(map: &Map<String, Value>, key: &str) -> Vec<Value> {
    match map.get(key) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Validate raw edge objects, splitting them into kept and rejected.
fn validate_all(
    recipe: &Recipe,
    raw: &[Value],
    source: Source,
) -> (Vec<CandidateEdge>, Vec<RejectedEdge>) {
    let nodes = recipe_node_ids(recipe);
    let mut kept = Vec::new();
    let mut rejected = Vec::new();

    for item in raw {
        let field = |key: &str| item.get(key).and_then(Value::as_str).unwrap_or("");
        let confidence = item.get("confidence").and_then(Value::as_f64).map(|c| c as f32);
        match validate_edge(&nodes, field("from"), field("to"), field("relation"), confidence, source)
        {
            Ok(edge) => kept.push(edge),
            Err(rejected_edge) => {
                tracing::warn!(
                    relation = %rejected_edge.relation,
                    reason = ?rejected_edge.reason,
                    "Rejected inferred edge"
                );
                rejected.push(rejected_edge);
            }
        }
    }
    (kept, rejected)
}

/// Describe the recipe in node-id terms for the model.
pub fn render_entities(recipe: &Recipe) -> String {
    let mut lines = Vec::new();
    if let Some(title) = &recipe.title {
        lines.push(format!("Title: {}", title));
    }
    lines.push("Ingredients:".to_string());
    for ingredient in &recipe.ingredients {
        lines.push(format!("- ingredient:{} ({})", ingredient.key(), ingredient));
    }
    lines.push("Equipment:".to_string());
    for equipment in &recipe.equipment {
        lines.push(format!("- equipment:{} ({})", equipment.key(), equipment));
    }
    lines.push("Steps:".to_string());
    for step in &recipe.steps {
        let uses: Vec<&str> = step.ingredients.iter().map(String::as_str).collect();
        let needs: Vec<&str> = step.equipment.iter().map(String::as_str).collect();
        lines.push(format!(
            "- step:{}: {} [ingredients: {}; equipment: {}]",
            step.ordinal,
            step.text,
            uses.join(", "),
            needs.join(", ")
        ));
    }
    lines.join("\n")
}

/// Run dependency inference over an extracted recipe.
///
/// Never fails. Model edges are validated before they are kept; structural
/// contention and state checks run whatever the model said.
pub async fn infer_dependencies(
    client: Option<&dyn AiClient>,
    recipe: &Recipe,
    config: &AnalyzerConfig,
    retry: &RetryPolicy,
) -> InferenceOutcome {
    let mut outcome = InferenceOutcome {
        edges: Vec::new(),
        contention: Vec::new(),
        rejected: Vec::new(),
        status: InferenceStatus::Complete,
        rounds_used: 0,
        llm_calls: 0,
        usage: Usage::default(),
        warnings: Vec::new(),
    };

    let (edges, status, reported) = match client {
        None => (
            heuristic_edges(recipe),
            InferenceStatus::Heuristic {
                reason: "no model configured".to_string(),
            },
            Vec::new(),
        ),
        Some(_) if recipe.steps.is_empty() => (
            Vec::new(),
            InferenceStatus::Heuristic {
                reason: "no steps to order".to_string(),
            },
            Vec::new(),
        ),
        Some(client) => run_tool_loop(client, recipe, config, retry, &mut outcome).await,
    };

    outcome.edges = edges;
    outcome.status = status;
    outcome.contention = detect_contention(recipe, &outcome.edges, &reported);

    match &outcome.status {
        InferenceStatus::Complete => {}
        InferenceStatus::Incomplete { reason } | InferenceStatus::Heuristic { reason } => {
            tracing::warn!(reason = %reason, "Dependency inference incomplete");
            outcome.warnings.push(RecipeWarning::InferenceIncomplete {
                reason: reason.clone(),
            });
        }
    }
    outcome
        .warnings
        .extend(outcome.contention.iter().map(Contention::warning));
    outcome.warnings.extend(check_state_progression(recipe));

    tracing::info!(
        edges = outcome.edges.len(),
        rejected = outcome.rejected.len(),
        contention = outcome.contention.len(),
        rounds = outcome.rounds_used,
        llm_calls = outcome.llm_calls,
        complete = outcome.status.is_complete(),
        "Dependency inference finished"
    );
    outcome
}

async fn run_tool_loop(
    client: &dyn AiClient,
    recipe: &Recipe,
    config: &AnalyzerConfig,
    retry: &RetryPolicy,
    outcome: &mut InferenceOutcome,
) -> (Vec<CandidateEdge>, InferenceStatus, Vec<Contention>) {
    let registry = ToolRegistry::standard();
    let described = registry.describe();
    let tool_list: Vec<(&str, &str)> = described.iter().map(|(n, d)| (*n, d.as_str())).collect();

    let mut state = LoopState {
        messages: vec![
            ChatMessage::system(render_dependencies_system_prompt(
                &tool_list,
                config.max_tool_rounds,
            )),
            ChatMessage::user(render_dependencies_user_prompt(&render_entities(recipe))),
        ],
        remaining_rounds: config.max_tool_rounds,
        pending_calls: Vec::new(),
        partial_edges: Vec::new(),
    };
    let mut repaired = false;
    let mut awaiting_repair = false;

    loop {
        let prompt_name = if awaiting_repair {
            REPAIR_PROMPT_NAME
        } else {
            DEPENDENCIES_PROMPT_NAME
        };
        awaiting_repair = false;
        let request = ChatRequest::json(state.messages.clone());
        outcome.llm_calls += 1;
        let response = match complete_with_retry(client, prompt_name, &request, retry).await {
            Ok(response) => response,
            Err(e) => {
                return fall_back(recipe, &state, outcome, format!("model call failed: {}", e));
            }
        };
        outcome.usage += response.usage;

        tracing::debug!(
            round = outcome.rounds_used,
            content = %user_text(config.user_data, &response.content),
            "Inference response"
        );

        match parse_reply(&response.content) {
            Ok(Reply::Final { edges, contention }) => {
                let (kept, rejected) = validate_all(recipe, &edges, Source::Llm);
                outcome.rejected.extend(rejected);
                return (kept, InferenceStatus::Complete, contention);
            }
            Ok(Reply::ToolCalls { mut calls, edges }) => {
                state.partial_edges.extend(edges);
                if state.remaining_rounds == 0 {
                    return fall_back(
                        recipe,
                        &state,
                        outcome,
                        format!("tool round limit of {} reached", config.max_tool_rounds),
                    );
                }
                if calls.len() > MAX_CALLS_PER_ROUND {
                    tracing::warn!(requested = calls.len(), "Too many tool calls, truncating");
                    calls.truncate(MAX_CALLS_PER_ROUND);
                }
                state.pending_calls = calls;
                state.remaining_rounds -= 1;
                outcome.rounds_used += 1;

                let observations: Vec<Value> = state
                    .pending_calls
                    .drain(..)
                    .map(|call| {
                        let output = registry.run(recipe, &call);
                        json!({
                            "tool": call.name,
                            "arguments": call.arguments,
                            "success": output.success,
                            "summary": output.summary,
                            "data": output.data,
                            "error": output.error,
                        })
                    })
                    .collect();

                state.messages.push(ChatMessage::assistant(response.content));
                state.messages.push(ChatMessage::user(render_tool_observations(
                    &Value::Array(observations).to_string(),
                    state.remaining_rounds,
                )));
            }
            Err(e) if !repaired => {
                tracing::warn!(error = %e, "Inference output malformed, requesting repair");
                state.messages.push(ChatMessage::assistant(response.content));
                state
                    .messages
                    .push(ChatMessage::user(render_repair_prompt(&e.to_string())));
                repaired = true;
                awaiting_repair = true;
            }
            Err(e) => {
                return fall_back(
                    recipe,
                    &state,
                    outcome,
                    format!("output still malformed after repair: {}", e),
                );
            }
        }
    }
}

/// Keep any validated partial edges and add the heuristic ones.
fn fall_back(
    recipe: &Recipe,
    state: &LoopState,
    outcome: &mut InferenceOutcome,
    reason: String,
) -> (Vec<CandidateEdge>, InferenceStatus, Vec<Contention>) {
    let (mut edges, rejected) = validate_all(recipe, &state.partial_edges, Source::Llm);
    outcome.rejected.extend(rejected);

    let status = if edges.is_empty() {
        InferenceStatus::Heuristic { reason }
    } else {
        InferenceStatus::Incomplete { reason }
    };

    let seen: BTreeSet<(NodeId, NodeId, Relation)> = edges
        .iter()
        .map(|e| (e.from.clone(), e.to.clone(), e.relation))
        .collect();
    edges.extend(
        heuristic_edges(recipe)
            .into_iter()
            .filter(|e| !seen.contains(&(e.from.clone(), e.to.clone(), e.relation))),
    );
    (edges, status, Vec::new())
}
