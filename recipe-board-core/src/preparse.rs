//! Offline pre-parse of raw recipe text.
//!
//! Purely syntactic: recognizes markdown sections, quantity-led ingredient
//! clauses, numbered or verb-led instructions, and kitchen equipment nouns.
//! Never fails; lines it cannot classify come back as leftover spans.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ingredient_parser::{parse_ingredient, starts_with_amount};
use crate::types::{normalize_name, Confidence, Equipment, Ingredient, RecipeStep, Source};
use crate::vocab::{first_word, is_cooking_verb, mentions, EQUIPMENT, SIZE_WORDS};

const CONFIDENCE_FULL_LINE: f32 = 0.6;
const CONFIDENCE_NAME_ONLY: f32 = 0.4;
const CONFIDENCE_NUMBERED_STEP: f32 = 0.5;
const CONFIDENCE_VERB_STEP: f32 = 0.3;

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:step\s*)?(\d{1,3})\s*[.):]\s+(.+)$").expect("Invalid numbered step regex")
});

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)(?:\s*(?:-|to)\s*(\d+))?\s*(minutes?|mins?|hours?|hrs?)\b")
        .expect("Invalid duration regex")
});

/// A line the pre-parser could not classify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeftoverSpan {
    /// 1-based line number in the source text.
    pub line: usize,
    pub text: String,
}

/// Partial, best-effort structure extracted without any model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreParse {
    pub title: Option<String>,
    pub ingredients: Vec<Ingredient>,
    pub equipment: Vec<Equipment>,
    pub steps: Vec<RecipeStep>,
    pub leftovers: Vec<LeftoverSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Unsectioned,
    Ingredients,
    Instructions,
    Other,
}

fn classify_heading(heading: &str) -> Section {
    let heading = heading.to_lowercase();
    if heading.contains("ingredient") {
        Section::Ingredients
    } else if ["instruction", "direction", "method", "step", "preparation"]
        .iter()
        .any(|h| heading.contains(h))
    {
        Section::Instructions
    } else {
        Section::Other
    }
}

/// Heading text for markdown headings ("## Ingredients") and bare labels
/// ("Ingredients:").
fn heading_text(line: &str) -> Option<(usize, &str)> {
    if line.starts_with('#') {
        let level = line.chars().take_while(|&c| c == '#').count();
        return Some((level, line[level..].trim()));
    }
    let label = line.strip_suffix(':')?;
    if label.split_whitespace().count() <= 3
        && classify_heading(label) != Section::Other
        && !starts_with_amount(label)
    {
        return Some((2, label.trim()));
    }
    None
}

fn strip_bullet(line: &str) -> &str {
    line.trim_start_matches(['-', '*', '•', '+'])
        .trim_start()
}

/// Pre-parse a full recipe text.
pub fn preparse(text: &str) -> PreParse {
    let mut out = PreParse::default();
    let mut section = Section::Unsectioned;
    let mut step_texts: Vec<(String, f32)> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some((level, heading)) = heading_text(trimmed) {
            let kind = classify_heading(heading);
            if kind == Section::Other && level == 1 && out.title.is_none() {
                out.title = Some(heading.to_string());
            }
            section = kind;
            continue;
        }

        match section {
            Section::Ingredients => {
                let body = strip_bullet(trimmed);
                match ingredient_from_clause(body) {
                    Some(ingredient) => push_ingredient(&mut out.ingredients, ingredient),
                    None => out.leftovers.push(LeftoverSpan {
                        line: line_no,
                        text: trimmed.to_string(),
                    }),
                }
            }
            Section::Instructions => {
                let (body, numbered) = match NUMBERED.captures(trimmed) {
                    Some(caps) => (caps.get(2).map_or(trimmed, |m| m.as_str()), true),
                    None => (strip_bullet(trimmed), false),
                };
                let confidence = if numbered || is_verb_led(body) {
                    CONFIDENCE_NUMBERED_STEP
                } else {
                    CONFIDENCE_VERB_STEP
                };
                step_texts.push((body.trim().to_string(), confidence));
            }
            Section::Unsectioned | Section::Other => {
                if !scan_unsectioned_line(trimmed, &mut out.ingredients, &mut step_texts) {
                    out.leftovers.push(LeftoverSpan {
                        line: line_no,
                        text: trimmed.to_string(),
                    });
                }
            }
        }
    }

    let ingredient_names: Vec<String> = out.ingredients.iter().map(|i| i.name.clone()).collect();
    for (ordinal, (body, confidence)) in (1u32..).zip(step_texts) {
        let mut step = RecipeStep::new(ordinal, body, Source::PreParser);
        step.confidence = Confidence::new(confidence);
        step.duration_minutes = parse_duration_minutes(&step.text);

        for name in &ingredient_names {
            if mentions(&step.text, name) {
                step.ingredients.insert(normalize_name(name));
            }
        }
        for equipment in find_equipment(&step.text) {
            step.equipment.insert(equipment.key());
            push_equipment(&mut out.equipment, equipment);
        }
        out.steps.push(step);
    }

    tracing::debug!(
        ingredients = out.ingredients.len(),
        equipment = out.equipment.len(),
        steps = out.steps.len(),
        leftovers = out.leftovers.len(),
        "Pre-parse complete"
    );

    out
}

/// Handle a line outside known sections: quantity-led clauses become
/// ingredients, and the first verb-led clause starts a step that runs to the
/// end of the line. Returns false when nothing was recognized.
fn scan_unsectioned_line(
    line: &str,
    ingredients: &mut Vec<Ingredient>,
    steps: &mut Vec<(String, f32)>,
) -> bool {
    if let Some(caps) = NUMBERED.captures(line) {
        if let Some(body) = caps.get(2) {
            steps.push((body.as_str().trim().to_string(), CONFIDENCE_NUMBERED_STEP));
            return true;
        }
    }

    let body = strip_bullet(line);
    let clauses: Vec<&str> = body
        .split([',', ';'])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();

    let mut recognized = false;
    for (idx, clause) in clauses.iter().enumerate() {
        if starts_with_amount(clause) {
            if let Some(ingredient) = ingredient_from_clause(clause) {
                push_ingredient(ingredients, ingredient);
                recognized = true;
                continue;
            }
        }
        if is_verb_led(clause) {
            let step_text = clauses[idx..].join(", ");
            steps.push((step_text, CONFIDENCE_VERB_STEP));
            return true;
        }
    }
    recognized
}

fn is_verb_led(text: &str) -> bool {
    first_word(text).is_some_and(|w| is_cooking_verb(&w))
}

fn ingredient_from_clause(clause: &str) -> Option<Ingredient> {
    let parsed = parse_ingredient(clause);
    let name = parsed.item.trim();
    if name.is_empty() {
        return None;
    }

    let mut ingredient = Ingredient::new(name, Source::PreParser);
    ingredient.amount = parsed.amount.filter(|a| *a >= 0.0);
    ingredient.unit = parsed.unit;
    ingredient.modifiers = parsed.modifiers;
    ingredient.state = parsed.state;
    ingredient.raw_text = Some(parsed.raw);
    ingredient.confidence = Confidence::new(if ingredient.amount.is_some() {
        CONFIDENCE_FULL_LINE
    } else {
        CONFIDENCE_NAME_ONLY
    });
    ingredient.validate().ok()?;
    Some(ingredient)
}

fn push_ingredient(list: &mut Vec<Ingredient>, ingredient: Ingredient) {
    let key = ingredient.key();
    if let Some(existing) = list.iter_mut().find(|i| i.key() == key) {
        existing.amount = existing.amount.or(ingredient.amount);
        existing.unit = existing.unit.take().or(ingredient.unit);
        return;
    }
    list.push(ingredient);
}

fn push_equipment(list: &mut Vec<Equipment>, equipment: Equipment) {
    let key = equipment.key();
    match list.iter_mut().find(|e| e.key() == key) {
        Some(existing) => existing.size = existing.size.take().or(equipment.size),
        None => list.push(equipment),
    }
}

/// Equipment nouns mentioned in a step. A noun that opens the step is read as
/// the verb ("Whisk the eggs") and skipped.
pub fn find_equipment(text: &str) -> Vec<Equipment> {
    let lower = text.to_lowercase();
    let words: Vec<String> = lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-').to_string())
        .collect();

    let mut found: Vec<Equipment> = Vec::new();
    let mut consumed = vec![false; words.len()];

    for &name in EQUIPMENT {
        let parts: Vec<&str> = name.split(' ').collect();
        if parts.len() > words.len() {
            continue;
        }
        for start in 0..=(words.len() - parts.len()) {
            let end = start + parts.len();
            if consumed[start..end].iter().any(|c| *c) {
                continue;
            }
            let matches = parts.iter().zip(&words[start..end]).all(|(p, w)| {
                w == p || w.strip_suffix('s') == Some(*p) || w.strip_suffix("es") == Some(*p)
            });
            if !matches || (start == 0 && parts.len() == 1) {
                continue;
            }

            consumed[start..end].iter_mut().for_each(|c| *c = true);
            let mut equipment = Equipment::new(name, Source::PreParser);
            if start > 0 && SIZE_WORDS.contains(&words[start - 1].as_str()) {
                equipment.size = Some(words[start - 1].clone());
            }
            if !found.iter().any(|e| e.key() == equipment.key()) {
                found.push(equipment);
            }
        }
    }

    found
}

/// Estimated minutes from phrases like "20 minutes", "1-2 hours" (upper bound).
pub fn parse_duration_minutes(text: &str) -> Option<u32> {
    DURATION
        .captures_iter(text)
        .filter_map(|caps| {
            let low: u32 = caps.get(1)?.as_str().parse().ok()?;
            let high = caps
                .get(2)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(low);
            let unit = caps.get(3)?.as_str().to_lowercase();
            Some(if unit.starts_with('h') {
                high.saturating_mul(60)
            } else {
                high
            })
        })
        .reduce(u32::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKDOWN: &str = "# Dinner Rolls\n\n## Ingredients\n\n- 3 cups flour\n- 1 tsp salt\n- 1 packet yeast\n- 1 cup warm water\n\n## Instructions\n\n1. In a large mixing bowl, combine flour, salt and yeast.\n2. Add the water and knead for 10 minutes.\n3. Bake in the oven for 20-25 minutes.\n";

    #[test]
    fn test_markdown_sections() {
        let out = preparse(MARKDOWN);
        assert_eq!(out.title.as_deref(), Some("Dinner Rolls"));
        assert_eq!(out.ingredients.len(), 4);
        assert_eq!(out.ingredients[0].name, "flour");
        assert_eq!(out.ingredients[0].amount, Some(3.0));
        assert_eq!(out.ingredients[3].name, "water");
        assert_eq!(out.ingredients[3].modifiers, vec!["warm"]);
        assert_eq!(out.steps.len(), 3);
        assert_eq!(out.steps[0].ordinal, 1);
        assert!(out.steps[0].text.starts_with("In a large mixing bowl"));
        assert!(out.leftovers.is_empty());
    }

    #[test]
    fn test_step_references() {
        let out = preparse(MARKDOWN);
        let first = &out.steps[0];
        assert!(first.ingredients.contains("flour"));
        assert!(first.ingredients.contains("salt"));
        assert!(first.equipment.contains("mixing bowl"));
        assert_eq!(out.steps[1].duration_minutes, Some(10));
        assert_eq!(out.steps[2].duration_minutes, Some(25));
        assert!(out.steps[2].equipment.contains("oven"));

        let bowl = out.equipment.iter().find(|e| e.name == "mixing bowl").unwrap();
        assert_eq!(bowl.size.as_deref(), Some("large"));
    }

    #[test]
    fn test_unsectioned_eggs() {
        let out = preparse("3 fresh eggs, whisk until smooth");
        assert_eq!(out.ingredients.len(), 1);
        let eggs = &out.ingredients[0];
        assert_eq!(eggs.name, "eggs");
        assert_eq!(eggs.amount, Some(3.0));
        assert_eq!(eggs.unit, None);
        assert_eq!(out.steps.len(), 1);
        assert_eq!(out.steps[0].text, "whisk until smooth");
        // Leading "whisk" is the verb, not the tool
        assert!(out.equipment.is_empty());
    }

    #[test]
    fn test_unrecognized_lines_are_leftovers() {
        let out = preparse("A family favourite\n2 eggs\nEnjoy!");
        assert_eq!(out.ingredients.len(), 1);
        assert_eq!(out.leftovers.len(), 2);
        assert_eq!(out.leftovers[0].line, 1);
        assert_eq!(out.leftovers[1].text, "Enjoy!");
    }

    #[test]
    fn test_never_panics_on_noise() {
        let out = preparse("((( ,,, ;;; ½ / 0/0 ### \u{0}");
        assert!(out.steps.is_empty());
    }

    #[test]
    fn test_bare_labels_as_headings() {
        let out = preparse("Ingredients:\n2 cups rice\nDirections:\nRinse the rice.\nBoil for 15 minutes.");
        assert_eq!(out.ingredients.len(), 1);
        assert_eq!(out.steps.len(), 2);
        assert!(out.steps[0].ingredients.contains("rice"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_minutes("Bake 1 hour"), Some(60));
        assert_eq!(parse_duration_minutes("rest 5 min then 10 minutes"), Some(15));
        assert_eq!(parse_duration_minutes("until golden"), None);
    }

    #[test]
    fn test_find_equipment_prefers_multiword() {
        let found = find_equipment("Transfer to a baking sheet and place in the oven");
        let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["baking sheet", "oven"]);
    }
}
