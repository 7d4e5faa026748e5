use std::path::PathBuf;

use anyhow::{Context, Result};
use recipe_board_core::feedback::{submit_feedback, EntityKind, EntityReference, Judgment};
use recipe_board_core::{FeedbackStore, JsonlFeedbackStore};

use crate::analyze::{analyzer_config, build_analyzer};

pub struct FeedbackArgs {
    pub kind: EntityKind,
    pub key: String,
    pub up: bool,
    pub correction: Option<String>,
    pub store: Option<PathBuf>,
    pub offline: bool,
}

fn open_store(path: Option<PathBuf>) -> JsonlFeedbackStore {
    match path {
        Some(path) => JsonlFeedbackStore::new(path),
        None => JsonlFeedbackStore::new(JsonlFeedbackStore::default_path()),
    }
}

/// Analyze the recipe so the entity can be checked, then append the judgment.
pub async fn record(text: &str, args: FeedbackArgs) -> Result<()> {
    let analyzer = build_analyzer(args.offline, analyzer_config(None, None));
    let analysis = analyzer
        .analyze(text)
        .await
        .context("Failed to analyze recipe")?;

    let store = open_store(args.store);
    let judgment = if args.up { Judgment::Up } else { Judgment::Down };
    let record = submit_feedback(
        &store,
        &analysis.recipe,
        EntityReference::new(args.kind, &args.key),
        judgment,
        args.correction.as_deref(),
    )
    .await
    .with_context(|| format!("Failed to record feedback in {}", store.path().display()))?;

    println!("Recorded feedback {} on {}", record.id, record.entity);
    if let Some(correction) = &record.correction {
        println!("Stored correction: {}", correction);
    }
    Ok(())
}

pub async fn list(path: Option<PathBuf>) -> Result<()> {
    let store = open_store(path);
    let records = store
        .list()
        .await
        .with_context(|| format!("Failed to read {}", store.path().display()))?;

    if records.is_empty() {
        println!("No feedback recorded in {}", store.path().display());
        return Ok(());
    }

    for record in &records {
        let judgment = match record.judgment {
            Judgment::Up => "up",
            Judgment::Down => "down",
        };
        let fingerprint: String = record.recipe_fingerprint.chars().take(12).collect();
        print!(
            "{} {} {:<4} {} recipe:{}",
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.id,
            judgment,
            record.entity,
            fingerprint
        );
        match &record.correction {
            Some(correction) => println!(" \"{}\"", correction),
            None => println!(),
        }
    }
    println!("{} record(s)", records.len());
    Ok(())
}
