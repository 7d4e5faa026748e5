//! Domain model: ingredients, equipment, steps and the recipe that owns them.
//!
//! Entities are created fresh for every analysis. Identity is by normalized
//! name for ingredients and equipment, and by ordinal for steps.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Reliability estimate in `0.0..=1.0`.
///
/// Out-of-range and non-finite inputs are clamped rather than rejected, so a
/// sloppy model answer lowers trust instead of failing the record.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct Confidence(f32);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);
    pub const FULL: Confidence = Confidence(1.0);

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn max(self, other: Confidence) -> Confidence {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl From<f32> for Confidence {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f32 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.0 * 100.0)
    }
}

/// Where a record came from. Each source carries its default confidence,
/// used whenever the producer did not state one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    PreParser,
    Llm,
    Merged,
    Heuristic,
}

impl Source {
    pub fn default_confidence(self) -> Confidence {
        match self {
            Source::PreParser => Confidence(0.4),
            Source::Llm => Confidence(0.7),
            Source::Merged => Confidence(0.8),
            Source::Heuristic => Confidence(0.3),
        }
    }
}

/// Preparation state of an ingredient, ordered from raw to cooked. Once
/// cooked, an ingredient may still be cut or mixed but never washed back to
/// raw; see [`IngredientState::undoes`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum IngredientState {
    #[default]
    Raw,
    Cleaned,
    Chopped,
    Mixed,
    Cooked,
}

impl IngredientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngredientState::Raw => "raw",
            IngredientState::Cleaned => "cleaned",
            IngredientState::Chopped => "chopped",
            IngredientState::Mixed => "mixed",
            IngredientState::Cooked => "cooked",
        }
    }

    /// Whether reaching `self` after `reached` would take a cooked ingredient
    /// back to raw or cleaned.
    pub fn undoes(self, reached: IngredientState) -> bool {
        reached == IngredientState::Cooked && self <= IngredientState::Cleaned
    }

    /// Lenient parse used for model output.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "fresh" | "whole" => Some(IngredientState::Raw),
            "cleaned" | "washed" | "rinsed" | "peeled" => Some(IngredientState::Cleaned),
            "chopped" | "diced" | "minced" | "sliced" | "cut" | "grated" => {
                Some(IngredientState::Chopped)
            }
            "mixed" | "combined" | "whisked" | "beaten" => Some(IngredientState::Mixed),
            "cooked" | "baked" | "fried" | "boiled" | "roasted" | "toasted" => {
                Some(IngredientState::Cooked)
            }
            _ => None,
        }
    }
}

impl fmt::Display for IngredientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize an entity name into its identity key: lowercase, single spaces,
/// no surrounding punctuation.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    /// Canonical short unit ("cup", "tbsp", "g").
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub state: IngredientState,
    pub confidence: Confidence,
    pub source: Source,
    /// Source line the ingredient was read from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        Self {
            name: name.into(),
            amount: None,
            unit: None,
            modifiers: Vec::new(),
            state: IngredientState::Raw,
            confidence: source.default_confidence(),
            source,
            raw_text: None,
        }
    }

    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.key().is_empty() {
            return Err(ModelError::EmptyName("ingredient"));
        }
        if let Some(amount) = self.amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(ModelError::InvalidAmount {
                    name: self.name.clone(),
                    amount,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(amount) = self.amount {
            parts.push(format_amount(amount));
        }
        if let Some(unit) = &self.unit {
            parts.push(unit.clone());
        }
        parts.push(self.name.clone());
        if !self.modifiers.is_empty() {
            parts.push(format!("({})", self.modifiers.join(", ")));
        }
        write!(f, "{} [{}, {}]", parts.join(" "), self.state, self.confidence)
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{:.2}", amount)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

/// Whether a recipe cannot be made without the equipment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Necessity {
    #[default]
    Required,
    Helpful,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub name: String,
    /// Size or capacity class as written ("large", "9x13 inch").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default)]
    pub necessity: Necessity,
    pub confidence: Confidence,
    pub source: Source,
}

impl Equipment {
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        Self {
            name: name.into(),
            size: None,
            necessity: Necessity::Required,
            confidence: source.default_confidence(),
            source,
        }
    }

    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

impl fmt::Display for Equipment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(size) = &self.size {
            write!(f, " ({})", size)?;
        }
        if self.necessity == Necessity::Required {
            write!(f, " [required]")?;
        }
        write!(f, " [{}]", self.confidence)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    /// 1-based position in the source text. Unique within a recipe.
    pub ordinal: u32,
    pub text: String,
    /// Ingredient keys referenced by this step.
    #[serde(default)]
    pub ingredients: BTreeSet<String>,
    /// Equipment keys referenced by this step.
    #[serde(default)]
    pub equipment: BTreeSet<String>,
    /// Ordinals of steps that must happen first. Always smaller than `ordinal`.
    #[serde(default)]
    pub predecessors: BTreeSet<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    pub confidence: Confidence,
    pub source: Source,
}

impl RecipeStep {
    pub fn new(ordinal: u32, text: impl Into<String>, source: Source) -> Self {
        Self {
            ordinal,
            text: text.into(),
            ingredients: BTreeSet::new(),
            equipment: BTreeSet::new(),
            predecessors: BTreeSet::new(),
            duration_minutes: None,
            confidence: source.default_confidence(),
            source,
        }
    }

    /// Record a dependency on an earlier step.
    ///
    /// Self and forward references are refused; callers log them as rejected
    /// inferences.
    pub fn add_predecessor(&mut self, predecessor: u32) -> Result<(), ModelError> {
        if predecessor == self.ordinal {
            return Err(ModelError::SelfDependency(self.ordinal));
        }
        if predecessor > self.ordinal {
            return Err(ModelError::ForwardDependency {
                step: self.ordinal,
                predecessor,
            });
        }
        self.predecessors.insert(predecessor);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self.predecessors.iter().find(|&&p| p >= self.ordinal) {
            Some(&p) if p == self.ordinal => Err(ModelError::SelfDependency(p)),
            Some(&p) => Err(ModelError::ForwardDependency {
                step: self.ordinal,
                predecessor: p,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for RecipeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.ordinal, self.text)?;
        if !self.predecessors.is_empty() {
            let preds: Vec<String> = self.predecessors.iter().map(|p| p.to_string()).collect();
            write!(f, " (after {})", preds.join(", "))?;
        }
        if let Some(minutes) = self.duration_minutes {
            write!(f, " ~{} min", minutes)?;
        }
        Ok(())
    }
}

/// Coarse confidence bucket shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub overall: ConfidenceLevel,
    /// Mean confidence over every ingredient, equipment item and step.
    pub mean: f32,
    /// Extraction fell back to pre-parser data.
    pub degraded: bool,
    /// Dependency inference did not finish normally.
    pub incomplete: bool,
}

impl ConfidenceSummary {
    pub fn compute(recipe: &Recipe, degraded: bool, incomplete: bool) -> Self {
        let scores: Vec<f32> = recipe
            .ingredients
            .iter()
            .map(|i| i.confidence.value())
            .chain(recipe.equipment.iter().map(|e| e.confidence.value()))
            .chain(recipe.steps.iter().map(|s| s.confidence.value()))
            .collect();

        let mean = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };

        let overall = if degraded || incomplete || scores.is_empty() {
            ConfidenceLevel::Low
        } else if mean < 0.75 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::High
        };

        Self {
            overall,
            mean,
            degraded,
            incomplete,
        }
    }
}

/// Why an inferred step dependency was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SelfDependency,
    ForwardDependency,
    UnknownNode,
    InvalidShape,
}

/// An inferred edge that violated an invariant and was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEdge {
    pub from: String,
    pub to: String,
    pub relation: String,
    pub reason: RejectReason,
}

/// Non-fatal conditions surfaced alongside a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecipeWarning {
    ExtractionDegraded {
        reason: String,
    },
    InferenceIncomplete {
        reason: String,
    },
    StateRegression {
        ingredient: String,
        step: u32,
        from: IngredientState,
        to: IngredientState,
    },
    Cycle {
        nodes: Vec<String>,
    },
    ResourceContention {
        equipment: String,
        steps: Vec<u32>,
    },
}

impl fmt::Display for RecipeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeWarning::ExtractionDegraded { reason } => {
                write!(f, "extraction degraded: {}", reason)
            }
            RecipeWarning::InferenceIncomplete { reason } => {
                write!(f, "dependency inference incomplete: {}", reason)
            }
            RecipeWarning::StateRegression {
                ingredient,
                step,
                from,
                to,
            } => write!(
                f,
                "step {} moves {} back from {} to {}",
                step, ingredient, from, to
            ),
            RecipeWarning::Cycle { nodes } => write!(f, "cycle: {}", nodes.join(" -> ")),
            RecipeWarning::ResourceContention { equipment, steps } => {
                let steps: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
                write!(
                    f,
                    "{} needed by concurrent steps {}",
                    equipment,
                    steps.join(", ")
                )
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub source_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub steps: Vec<RecipeStep>,
    pub ingredients: Vec<Ingredient>,
    pub equipment: Vec<Equipment>,
    #[serde(default)]
    pub confidence: ConfidenceSummary,
    #[serde(default)]
    pub warnings: Vec<RecipeWarning>,
}

impl Recipe {
    pub fn new(source_text: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            ..Default::default()
        }
    }

    /// Insert an ingredient, merging into an existing one with the same key.
    /// Returns false when the ingredient is invalid and was skipped.
    pub fn add_ingredient(&mut self, ingredient: Ingredient) -> bool {
        if let Err(e) = ingredient.validate() {
            tracing::debug!(error = %e, "Skipping invalid ingredient");
            return false;
        }
        let key = ingredient.key();
        match self.ingredients.iter_mut().find(|i| i.key() == key) {
            Some(existing) => {
                existing.amount = existing.amount.or(ingredient.amount);
                existing.unit = existing.unit.take().or(ingredient.unit);
                for m in ingredient.modifiers {
                    if !existing.modifiers.contains(&m) {
                        existing.modifiers.push(m);
                    }
                }
                existing.state = existing.state.max(ingredient.state);
                existing.confidence = existing.confidence.max(ingredient.confidence);
                existing.raw_text = existing.raw_text.take().or(ingredient.raw_text);
            }
            None => self.ingredients.push(ingredient),
        }
        true
    }

    /// Insert equipment; names are deduplicated case-insensitively and a
    /// duplicate marked required makes the kept item required.
    pub fn add_equipment(&mut self, equipment: Equipment) -> bool {
        let key = equipment.key();
        if key.is_empty() {
            return false;
        }
        match self.equipment.iter_mut().find(|e| e.key() == key) {
            Some(existing) => {
                existing.size = existing.size.take().or(equipment.size);
                if equipment.necessity == Necessity::Required {
                    existing.necessity = Necessity::Required;
                }
                existing.confidence = existing.confidence.max(equipment.confidence);
            }
            None => self.equipment.push(equipment),
        }
        true
    }

    pub fn ingredient(&self, key: &str) -> Option<&Ingredient> {
        let key = normalize_name(key);
        self.ingredients.iter().find(|i| i.key() == key)
    }

    pub fn equipment_item(&self, key: &str) -> Option<&Equipment> {
        let key = normalize_name(key);
        self.equipment.iter().find(|e| e.key() == key)
    }

    pub fn step(&self, ordinal: u32) -> Option<&RecipeStep> {
        self.steps.iter().find(|s| s.ordinal == ordinal)
    }

    pub fn step_mut(&mut self, ordinal: u32) -> Option<&mut RecipeStep> {
        self.steps.iter_mut().find(|s| s.ordinal == ordinal)
    }

    pub fn warn(&mut self, warning: RecipeWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    pub fn format_ingredients(&self) -> String {
        if self.ingredients.is_empty() {
            return "No ingredients parsed yet.".to_string();
        }
        self.ingredients
            .iter()
            .map(|i| format!("- {}", i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn format_equipment(&self) -> String {
        if self.equipment.is_empty() {
            return "No equipment parsed yet.".to_string();
        }
        self.equipment
            .iter()
            .map(|e| format!("- {}", e))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn format_steps(&self) -> String {
        if self.steps.is_empty() {
            return "No steps parsed yet.".to_string();
        }
        self.steps
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
