//! Append-only store for user judgments on analysis results.
//!
//! Records never carry recipe text: entities are referenced by kind and
//! normalized key, the recipe by a SHA-256 fingerprint, and free-text
//! corrections are scrubbed of anything quoted from the recipe.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::FeedbackError;
use crate::privacy::scrub_quotes;
use crate::types::{normalize_name, Recipe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Ingredient,
    Equipment,
    Step,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Ingredient => "ingredient",
            EntityKind::Equipment => "equipment",
            EntityKind::Step => "step",
        })
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ingredient" => Ok(EntityKind::Ingredient),
            "equipment" => Ok(EntityKind::Equipment),
            "step" => Ok(EntityKind::Step),
            other => Err(format!("unknown entity kind '{}'", other)),
        }
    }
}

/// Points at one entity: normalized name for ingredients and equipment, the
/// ordinal for steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReference {
    pub kind: EntityKind,
    pub key: String,
}

impl EntityReference {
    pub fn new(kind: EntityKind, key: &str) -> Self {
        let key = match kind {
            EntityKind::Step => key.trim().to_string(),
            _ => normalize_name(key),
        };
        Self { kind, key }
    }

    pub fn ingredient(name: &str) -> Self {
        Self::new(EntityKind::Ingredient, name)
    }

    pub fn equipment(name: &str) -> Self {
        Self::new(EntityKind::Equipment, name)
    }

    pub fn step(ordinal: u32) -> Self {
        Self {
            kind: EntityKind::Step,
            key: ordinal.to_string(),
        }
    }

    /// Whether the entity exists in the recipe.
    pub fn exists_in(&self, recipe: &Recipe) -> bool {
        match self.kind {
            EntityKind::Ingredient => recipe.ingredient(&self.key).is_some(),
            EntityKind::Equipment => recipe.equipment_item(&self.key).is_some(),
            EntityKind::Step => self
                .key
                .parse::<u32>()
                .ok()
                .and_then(|ordinal| recipe.step(ordinal))
                .is_some(),
        }
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub recipe_fingerprint: String,
    pub entity: EntityReference,
    pub judgment: Judgment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// SHA-256 of the whitespace-normalized, lowercased recipe text.
pub fn recipe_fingerprint(text: &str) -> String {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), FeedbackError>;

    async fn list(&self) -> Result<Vec<FeedbackRecord>, FeedbackError>;
}

/// Validate, scrub and persist one judgment.
pub async fn submit_feedback(
    store: &dyn FeedbackStore,
    recipe: &Recipe,
    entity: EntityReference,
    judgment: Judgment,
    correction: Option<&str>,
) -> Result<FeedbackRecord, FeedbackError> {
    if !entity.exists_in(recipe) {
        return Err(FeedbackError::UnknownEntity(entity.to_string()));
    }

    let correction = correction
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| scrub_quotes(c, &recipe.source_text));

    let record = FeedbackRecord {
        id: Uuid::new_v4(),
        recipe_fingerprint: recipe_fingerprint(&recipe.source_text),
        entity,
        judgment,
        correction,
        created_at: Utc::now(),
    };
    store.append(&record).await?;

    tracing::info!(
        id = %record.id,
        entity = %record.entity,
        judgment = ?record.judgment,
        "Feedback recorded"
    );
    Ok(record)
}

/// One JSON record per line, appended under a lock.
pub struct JsonlFeedbackStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlFeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `RB_FEEDBACK_PATH`, else the default location.
    pub fn from_env() -> Self {
        match std::env::var("RB_FEEDBACK_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::new(path),
            _ => Self::new(Self::default_path()),
        }
    }

    /// Get the default store path: ~/.recipe-board/feedback.jsonl
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".recipe-board").join("feedback.jsonl"))
            .unwrap_or_else(|| PathBuf::from("data/feedback.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FeedbackStore for JsonlFeedbackStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(line = number + 1, error = %e, "Skipping malformed feedback line"),
            }
        }
        Ok(records)
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryFeedbackStore {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        Ok(self.records.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{Ingredient, RecipeStep, Source};

    const TEXT: &str = "Chicken salad\n\n1. Take the raw chicken stored overnight in the fridge\n2. Slice it";

    fn recipe() -> Recipe {
        let mut recipe = Recipe::new(TEXT);
        recipe.add_ingredient(Ingredient::new("chicken", Source::PreParser));
        recipe.steps = vec![
            RecipeStep::new(
                1,
                "Take the raw chicken stored overnight in the fridge",
                Source::PreParser,
            ),
            RecipeStep::new(2, "Slice it", Source::PreParser),
        ];
        recipe
    }

    #[tokio::test]
    async fn test_record_contains_no_recipe_text() {
        let store = MemoryFeedbackStore::new();
        let record = submit_feedback(
            &store,
            &recipe(),
            EntityReference::step(1),
            Judgment::Down,
            Some("raw chicken stored overnight should be thrown out"),
        )
        .await
        .unwrap();

        let json = serde_json::to_string(&record).unwrap();
        for fragment in ["raw chicken", "chicken stored", "stored overnight", "Take the"] {
            assert!(!json.contains(fragment), "{fragment} leaked into {json}");
        }
        assert_eq!(record.correction.as_deref(), Some("[redacted] should be thrown out"));
        assert_eq!(record.entity.key, "1");
        assert_eq!(store.list().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_two_word_quote_is_not_stored() {
        let store = MemoryFeedbackStore::new();
        submit_feedback(
            &store,
            &recipe(),
            EntityReference::ingredient("chicken"),
            Judgment::Down,
            Some("raw chicken should be refrigerated"),
        )
        .await
        .unwrap();

        let stored = store.list().await.unwrap();
        assert_eq!(stored.len(), 1);
        let json = serde_json::to_string(&stored[0]).unwrap();
        assert!(!json.contains("raw chicken"), "quote leaked into {json}");
        assert_eq!(
            stored[0].correction.as_deref(),
            Some("[redacted] should be refrigerated")
        );
    }

    #[tokio::test]
    async fn test_unknown_entity_rejected() {
        let store = MemoryFeedbackStore::new();
        let err = submit_feedback(
            &store,
            &recipe(),
            EntityReference::ingredient("tofu"),
            Judgment::Up,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FeedbackError::UnknownEntity(ref e) if e == "ingredient:tofu"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_fingerprint_ignores_layout() {
        assert_eq!(
            recipe_fingerprint("Whisk  the\neggs"),
            recipe_fingerprint("whisk the eggs")
        );
        assert_eq!(recipe_fingerprint("x").len(), 64);
    }

    #[tokio::test]
    async fn test_jsonl_store_concurrent_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonlFeedbackStore::new(dir.path().join("nested/feedback.jsonl")));
        assert!(store.list().await.unwrap().is_empty());

        let recipe = Arc::new(recipe());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let recipe = Arc::clone(&recipe);
                tokio::spawn(async move {
                    let judgment = if i % 2 == 0 { Judgment::Up } else { Judgment::Down };
                    submit_feedback(
                        store.as_ref(),
                        &recipe,
                        EntityReference::ingredient("Chicken"),
                        judgment,
                        None,
                    )
                    .await
                    .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.entity == EntityReference::ingredient("chicken")));
    }

    #[tokio::test]
    async fn test_jsonl_store_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.jsonl");
        let store = JsonlFeedbackStore::new(&path);
        submit_feedback(&store, &recipe(), EntityReference::step(2), Judgment::Up, None)
            .await
            .unwrap();
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("{not json\n");
        std::fs::write(&path, contents).unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
