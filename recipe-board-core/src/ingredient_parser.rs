//! Ingredient line parsing.
//!
//! Parses raw ingredient strings (e.g., "2 cups flour, sifted") into structured data.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::types::IngredientState;
use crate::vocab::{modifiers_state, MODIFIER_WORDS};

/// Amount with an optional unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    pub amount: Option<f64>,
    pub unit: Option<String>,
}

/// One ingredient line broken into quantity, unit, name and preparation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedIngredient {
    pub item: String,
    /// Primary amount and unit, if the line starts with a quantity.
    pub amount: Option<f64>,
    pub unit: Option<String>,
    /// Parenthetical alternatives, e.g. "(113g)".
    pub alternatives: Vec<Measurement>,
    pub modifiers: Vec<String>,
    pub note: Option<String>,
    pub state: IngredientState,
    pub raw: String,
}

/// `UNITS_RAW`, longest spelling first so "tablespoons" wins over "tb".
static UNITS_SORTED: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut units = UNITS_RAW.to_vec();
    units.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    units
});

const UNITS_RAW: &[(&str, &str)] = &[
    // Volume - US
    ("fluid ounces", "fl oz"),
    ("fluid ounce", "fl oz"),
    ("tablespoons", "tbsp"),
    ("tablespoon", "tbsp"),
    ("teaspoons", "tsp"),
    ("teaspoon", "tsp"),
    ("gallons", "gal"),
    ("gallon", "gal"),
    ("quarts", "qt"),
    ("quart", "qt"),
    ("pints", "pt"),
    ("pint", "pt"),
    ("cups", "cup"),
    ("cup", "cup"),
    ("tbsp", "tbsp"),
    ("tbs", "tbsp"),
    ("tsp", "tsp"),
    ("fl oz", "fl oz"),
    ("fl. oz", "fl oz"),
    ("gal", "gal"),
    ("qt", "qt"),
    ("pt", "pt"),
    ("tb", "tbsp"),
    ("ts", "tsp"),
    ("c", "cup"),
    // Volume - Metric
    ("milliliters", "ml"),
    ("milliliter", "ml"),
    ("liters", "l"),
    ("liter", "l"),
    ("litres", "l"),
    ("litre", "l"),
    ("ml", "ml"),
    ("l", "l"),
    // Weight - US
    ("ounces", "oz"),
    ("ounce", "oz"),
    ("pounds", "lb"),
    ("pound", "lb"),
    ("lbs", "lb"),
    ("lb", "lb"),
    ("oz", "oz"),
    // Weight - Metric
    ("kilograms", "kg"),
    ("kilogram", "kg"),
    ("milligrams", "mg"),
    ("milligram", "mg"),
    ("grams", "g"),
    ("gram", "g"),
    ("kg", "kg"),
    ("mg", "mg"),
    ("g", "g"),
    // Count
    ("packages", "package"),
    ("package", "package"),
    ("packets", "packet"),
    ("packet", "packet"),
    ("handfuls", "handful"),
    ("handful", "handful"),
    ("bottles", "bottle"),
    ("bunches", "bunch"),
    ("pinches", "pinch"),
    ("slices", "slice"),
    ("sprigs", "sprig"),
    ("stalks", "stalk"),
    ("pieces", "piece"),
    ("bottle", "bottle"),
    ("cloves", "clove"),
    ("dashes", "dash"),
    ("drops", "drop"),
    ("heads", "head"),
    ("sticks", "stick"),
    ("bunch", "bunch"),
    ("clove", "clove"),
    ("cubes", "cube"),
    ("piece", "piece"),
    ("pinch", "pinch"),
    ("slice", "slice"),
    ("sprig", "sprig"),
    ("stalk", "stalk"),
    ("boxes", "box"),
    ("cans", "can"),
    ("jars", "jar"),
    ("bags", "bag"),
    ("cube", "cube"),
    ("dash", "dash"),
    ("drop", "drop"),
    ("head", "head"),
    ("pkgs", "package"),
    ("stick", "stick"),
    ("box", "box"),
    ("can", "can"),
    ("jar", "jar"),
    ("bag", "bag"),
    ("pcs", "piece"),
    ("pkg", "package"),
    ("pc", "piece"),
];

/// Phrases that mark the text after the last comma as a preparation note.
const PREP_NOTES: &[&str] = &[
    "at room temperature",
    "room temperature",
    "loosely packed",
    "firmly packed",
    "lightly beaten",
    "roughly chopped",
    "coarsely chopped",
    "finely chopped",
    "thinly sliced",
    "plus more for",
    "for garnish",
    "for serving",
    "approximately",
    "julienned",
    "quartered",
    "shredded",
    "blanched",
    "crumbled",
    "softened",
    "uncooked",
    "combined",
    "or more",
    "or less",
    "optional",
    "to taste",
    "as needed",
    "chopped",
    "crushed",
    "cleaned",
    "divided",
    "drained",
    "toasted",
    "roasted",
    "trimmed",
    "whisked",
    "chilled",
    "minced",
    "sliced",
    "grated",
    "melted",
    "cooked",
    "ground",
    "beaten",
    "thawed",
    "frozen",
    "peeled",
    "washed",
    "rinsed",
    "packed",
    "sifted",
    "halved",
    "diced",
    "cubed",
    "cored",
    "mixed",
    "fresh",
    "dried",
    "whole",
    "cold",
    "raw",
];

/// Parse one ingredient line. Best effort: a line with no recognisable
/// quantity, unit or name comes back whole as the item.
pub fn parse_ingredient(raw: &str) -> ParsedIngredient {
    let raw = raw.trim();
    let mut parsed = ParsedIngredient {
        item: String::new(),
        amount: None,
        unit: None,
        alternatives: vec![],
        modifiers: vec![],
        note: None,
        state: IngredientState::Raw,
        raw: raw.to_string(),
    };
    if raw.is_empty() {
        return parsed;
    }

    let mut remaining = raw.to_string();

    // "1 stick (113g) butter": measurements in parentheses are alternatives
    while let Some(start) = remaining.find('(') {
        let Some(end) = remaining[start..].find(')') else {
            break;
        };
        let paren_content = &remaining[start + 1..start + end];
        let Some(m) = try_parse_measurement(paren_content) else {
            break;
        };
        parsed.alternatives.push(m);
        let before = remaining[..start].trim_end();
        let after = remaining[start + end + 1..].trim_start();
        remaining = if before.is_empty() {
            after.to_string()
        } else if after.is_empty() {
            before.to_string()
        } else {
            format!("{} {}", before, after)
        };
    }

    let (amount_text, rest) = extract_amount(&remaining);
    parsed.amount = amount_text.as_deref().and_then(parse_amount);
    let (unit, rest) = extract_unit(&rest);
    parsed.unit = unit;
    remaining = rest;

    if let Some((head, tail)) = remaining.rsplit_once(',') {
        let tail = tail.trim();
        if is_prep_note(tail) {
            parsed.note = Some(tail.to_string());
            remaining = head.trim().to_string();
        }
    }

    // "3 fresh eggs"
    let (modifiers, item) = split_leading_modifiers(&remaining);
    parsed.modifiers = modifiers;
    if let Some(note) = &parsed.note {
        parsed.modifiers.push(note.to_lowercase());
    }
    parsed.state = modifiers_state(&parsed.modifiers);

    parsed.item = if item.is_empty() && parsed.amount.is_none() && parsed.unit.is_none() {
        raw.to_string()
    } else {
        item
    };

    parsed
}

/// Amount and/or unit, e.g. the "113g" in "(113g)".
fn try_parse_measurement(s: &str) -> Option<Measurement> {
    let s = s.trim();
    let (amount, after_amount) = extract_amount(s);
    let (unit, _) = extract_unit(&after_amount);
    let amount = amount.as_deref().and_then(parse_amount);

    if amount.is_some() || unit.is_some() {
        Some(Measurement { amount, unit })
    } else {
        None
    }
}

/// Split a leading quantity off `s`: `("1 1/2", "cups water")`.
pub(crate) fn extract_amount(s: &str) -> (Option<String>, String) {
    let s = s.trim();
    if s.is_empty() {
        return (None, s.to_string());
    }

    // "1 1/2"
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() >= 2 {
        let first = words[0];
        let second = words[1];

        if first.chars().all(|c| c.is_ascii_digit()) && is_fraction(second) {
            let amount = format!("{} {}", first, second);
            if let Some(pos) = s.find(second) {
                let end_pos = pos + second.len();
                return (Some(amount), s[end_pos..].trim().to_string());
            }
        }
    }

    // "1/2", "½"
    if let Some(first_word) = words.first() {
        if is_fraction(first_word) {
            let word_len = first_word.len();
            return (
                Some((*first_word).to_string()),
                s[word_len..].trim().to_string(),
            );
        }
    }

    // "2", "2.5", "1½"
    let mut amount_str = String::new();
    let mut consumed = 0;
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' || (vulgar_fraction(c).is_some() && !amount_str.is_empty())
        {
            amount_str.push(c);
            consumed += c.len_utf8();
        } else {
            break;
        }
    }

    if !amount_str.is_empty() && amount_str != "." {
        let mut rest = &s[consumed..];
        // Ranges ("2-3 eggs") keep the lower bound
        if let Some(stripped) = rest.strip_prefix('-').or_else(|| rest.strip_prefix(" to ")) {
            let upper_len = stripped
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(stripped.len());
            if upper_len > 0 {
                rest = &stripped[upper_len..];
            }
        }
        return (Some(amount_str), rest.trim().to_string());
    }

    (None, s.to_string())
}

/// Numeric value of an amount string: "3", "2.5", "1/2", "1 1/2", "½", "1½".
pub fn parse_amount(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some((whole, frac)) = s.split_once(' ') {
        return Some(parse_amount(whole)? + parse_amount(frac)?);
    }

    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }

    let mut chars = s.chars();
    if let Some(last) = chars.next_back() {
        if let Some(frac) = vulgar_fraction(last) {
            let head = chars.as_str();
            let whole = if head.is_empty() {
                0.0
            } else {
                head.parse::<f64>().ok()?
            };
            return Some(whole + frac);
        }
    }

    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn vulgar_fraction(c: char) -> Option<f64> {
    match c {
        '½' => Some(0.5),
        '⅓' => Some(1.0 / 3.0),
        '⅔' => Some(2.0 / 3.0),
        '¼' => Some(0.25),
        '¾' => Some(0.75),
        '⅛' => Some(0.125),
        _ => None,
    }
}

/// "1/2", "3/4" or a single vulgar fraction character.
fn is_fraction(s: &str) -> bool {
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return vulgar_fraction(c).is_some();
    }
    if let Some(slash_pos) = s.find('/') {
        let before = &s[..slash_pos];
        let after = &s[slash_pos + 1..];
        !before.is_empty()
            && !after.is_empty()
            && before.chars().all(|c| c.is_ascii_digit())
            && after.chars().all(|c| c.is_ascii_digit())
    } else {
        false
    }
}

/// Whether a text begins with a quantity ("3 eggs", "1/2 cup", "½ tsp").
pub fn starts_with_amount(s: &str) -> bool {
    let (amount, _) = extract_amount(s);
    amount.as_deref().and_then(parse_amount).is_some()
}

/// Split a leading unit off `s`, returned in canonical form.
fn extract_unit(s: &str) -> (Option<String>, String) {
    let s = s.trim();
    let s_lower = s.to_lowercase();

    for &(unit, canonical) in UNITS_SORTED.iter() {
        if s_lower.starts_with(unit) && s.is_char_boundary(unit.len()) {
            let after = &s[unit.len()..];
            if after.is_empty()
                || after.starts_with(|c: char| c.is_whitespace() || c == '.' || c == ',')
            {
                let remaining = after.trim_start_matches('.').trim();
                return (Some(canonical.to_string()), remaining.to_string());
            }
        }
    }

    (None, s.to_string())
}

/// Canonical form of a unit string, or the lowercased input when unknown.
pub fn normalize_unit(unit: &str) -> String {
    let lower = unit.trim().trim_end_matches('.').to_lowercase();
    UNITS_RAW
        .iter()
        .find(|(u, _)| *u == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lower)
}

/// Trailing ", softened"-style text.
fn is_prep_note(s: &str) -> bool {
    let s_lower = s.to_lowercase();
    PREP_NOTES.iter().any(|note| s_lower.contains(note))
}

/// Split leading modifier words off an ingredient phrase. Adverbs such as
/// "finely" stay attached to the word they qualify ("finely diced").
fn split_leading_modifiers(s: &str) -> (Vec<String>, String) {
    let words: Vec<&str> = s.split_whitespace().collect();
    let mut modifiers = Vec::new();
    let mut pending_adverb: Option<String> = None;
    let mut idx = 0;

    // Always leave at least one word for the name
    while idx + 1 < words.len() {
        let word = words[idx].trim_end_matches(',').to_lowercase();
        if !MODIFIER_WORDS.contains(&word.as_str()) {
            break;
        }
        if word.ends_with("ly") {
            pending_adverb = Some(match pending_adverb.take() {
                Some(prev) => format!("{} {}", prev, word),
                None => word,
            });
        } else {
            modifiers.push(match pending_adverb.take() {
                Some(adverb) => format!("{} {}", adverb, word),
                None => word,
            });
        }
        idx += 1;
    }

    if let Some(adverb) = pending_adverb {
        modifiers.push(adverb);
    }

    let item = words[idx..]
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == '.')
        .to_string();
    (modifiers, item)
}

/// One [`ParsedIngredient`] per non-blank line.
pub fn parse_ingredients(blob: &str) -> Vec<ParsedIngredient> {
    blob.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_ingredient)
        .collect()
}
