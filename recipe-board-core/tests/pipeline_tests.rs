//! End-to-end analysis runs against scripted model clients.

use std::sync::Arc;
use std::time::Duration;

use recipe_board_core::ai::{AiClient, AiError, FakeClient, RetryPolicy};
use recipe_board_core::dependencies::InferenceStatus;
use recipe_board_core::extract::ExtractionStatus;
use recipe_board_core::feedback::{submit_feedback, EntityReference, Judgment};
use recipe_board_core::pipeline::Progress;
use recipe_board_core::{
    Analyzer, AnalyzerConfig, ConfidenceLevel, FeedbackStore, GraphExport, JsonlFeedbackStore,
    RecipeWarning,
};
use tokio::sync::watch;

const EGGS: &str = "3 fresh eggs, whisk until smooth";

const EXTRACTED: &str = r#"{
    "title": "Scrambled Eggs",
    "ingredients": [{"name": "eggs", "amount": 3, "modifiers": ["fresh"]}],
    "equipment": [{"name": "bowl"}, {"name": "skillet"}],
    "steps": [
        {"ordinal": 1, "text": "Whisk the eggs in a bowl", "ingredients": ["eggs"], "equipment": ["bowl"]},
        {"ordinal": 2, "text": "Cook the eggs in a skillet", "ingredients": ["eggs"], "equipment": ["skillet"]}
    ]
}"#;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        timeout: Duration::from_millis(50),
        backoff: Duration::from_millis(1),
    }
}

fn analyzer_with(client: Arc<FakeClient>) -> Analyzer {
    let client: Arc<dyn AiClient> = client;
    Analyzer::new(Some(client), AnalyzerConfig::default(), fast_retry())
}

#[tokio::test]
async fn test_unresponsive_model_degrades_to_preparse() {
    let client = Arc::new(FakeClient::hanging());
    let analysis = analyzer_with(client.clone()).analyze(EGGS).await.unwrap();

    let eggs = analysis.recipe.ingredient("eggs").unwrap();
    assert_eq!(eggs.amount, Some(3.0));
    assert_eq!(analysis.confidence.overall, ConfidenceLevel::Low);
    assert!(analysis.extraction.is_degraded());
    assert!(!analysis.inference.is_complete());
    assert!(analysis
        .warnings()
        .iter()
        .any(|w| matches!(w, RecipeWarning::ExtractionDegraded { .. })));
    assert!(client.call_count() >= 1);
}

#[tokio::test]
async fn test_malformed_answer_is_repaired_once() {
    let client = Arc::new(
        FakeClient::new()
            .then_reply("Sure! The recipe has eggs and a bowl.")
            .then_reply(EXTRACTED)
            .then_reply(r#"{"edges": []}"#),
    );
    let analysis = analyzer_with(client.clone())
        .analyze("Scrambled Eggs\n3 fresh eggs\nWhisk, then cook.")
        .await
        .unwrap();

    assert_eq!(analysis.extraction, ExtractionStatus::Repaired);
    assert_eq!(analysis.inference, InferenceStatus::Complete);
    assert_eq!(
        client.prompt_names(),
        vec!["extract_entities", "repair_json", "infer_dependencies"]
    );
    assert_eq!(analysis.llm_calls, 3);
    assert!(analysis.recipe.equipment_item("skillet").is_some());
}

#[tokio::test]
async fn test_transport_failure_keeps_extraction() {
    let client = Arc::new(
        FakeClient::new()
            .then_reply(EXTRACTED)
            .then_fail(AiError::Request("connection reset".into())),
    );
    let analysis = analyzer_with(client).analyze(EGGS).await.unwrap();

    assert_eq!(analysis.extraction, ExtractionStatus::Extracted);
    assert!(!analysis.inference.is_complete());
    // Heuristic edges still order the two steps sharing the eggs
    assert!(analysis.recipe.step(2).unwrap().predecessors.contains(&1));
    assert!(analysis.graph.is_acyclic());
}

#[tokio::test]
async fn test_backward_edge_from_model_is_rejected() {
    let client = Arc::new(FakeClient::new().then_reply(EXTRACTED).then_reply(
        r#"{"edges": [{"from": "step:2", "to": "step:1", "relation": "precedes", "confidence": 0.9}]}"#,
    ));
    let analysis = analyzer_with(client).analyze(EGGS).await.unwrap();

    assert!(analysis.recipe.step(1).unwrap().predecessors.is_empty());
    assert_eq!(analysis.rejected.len(), 1);
    assert!(analysis.graph.is_acyclic());
}

#[tokio::test]
async fn test_progress_reaches_the_end() {
    let analyzer = Analyzer::offline(AnalyzerConfig::default());
    let (tx, rx) = watch::channel(Progress::default());

    analyzer.analyze_with_progress(EGGS, Some(&tx)).await.unwrap();

    let progress = rx.borrow().clone();
    assert!(progress.finished);
    assert_eq!(progress.current_step, None);
    assert_eq!(progress.completed, progress.total);
}

#[tokio::test]
async fn test_concurrent_runs_share_one_analyzer() {
    let analyzer = Analyzer::offline(AnalyzerConfig::default());
    let (a, b) = tokio::join!(
        analyzer.analyze(EGGS),
        analyzer.analyze("Ingredients:\n2 cups rice\nDirections:\nRinse the rice.\nBoil for 15 minutes.")
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.recipe.ingredient("eggs").is_some());
    assert!(a.recipe.ingredient("rice").is_none());
    assert!(b.recipe.ingredient("rice").is_some());
    assert_eq!(b.recipe.steps.len(), 2);
}

#[tokio::test]
async fn test_export_reloads_into_same_graph() {
    let sample = recipe_board_core::samples::find_sample("tomato-soup").unwrap();
    let analysis = Analyzer::offline(AnalyzerConfig::default())
        .analyze(&sample.text)
        .await
        .unwrap();

    let json = analysis.export().to_json().unwrap();
    let reloaded = GraphExport::from_json(&json).unwrap().into_graph();
    assert_eq!(reloaded.nodes.len(), analysis.graph.nodes.len());
    assert_eq!(reloaded.edges.len(), analysis.graph.edges.len());

    let dot = analysis.to_dot();
    assert!(dot.starts_with("digraph"));
}

#[tokio::test]
async fn test_feedback_file_never_holds_recipe_text() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlFeedbackStore::new(dir.path().join("feedback.jsonl"));

    let sample = recipe_board_core::samples::find_sample("scrambled-eggs").unwrap();
    let analysis = Analyzer::offline(AnalyzerConfig::default())
        .analyze(&sample.text)
        .await
        .unwrap();

    submit_feedback(
        &store,
        &analysis.recipe,
        EntityReference::ingredient("eggs"),
        Judgment::Down,
        Some("Whisk the eggs, milk and salt first"),
    )
    .await
    .unwrap();
    submit_feedback(
        &store,
        &analysis.recipe,
        EntityReference::step(1),
        Judgment::Up,
        None,
    )
    .await
    .unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(raw.lines().count(), 2);
    assert!(!raw.contains("Whisk the eggs"));
    assert!(!raw.contains("milk and salt"));

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].recipe_fingerprint, records[1].recipe_fingerprint);
    assert_eq!(records[0].correction.as_deref(), Some("[redacted] first"));
}
