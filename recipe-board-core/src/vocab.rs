//! Cooking vocabulary shared by the pre-parser and dependency validation.

use crate::types::IngredientState;

/// Imperative verbs that start an instruction.
pub const COOKING_VERBS: &[&str] = &[
    "add", "arrange", "bake", "baste", "beat", "blanch", "blend", "boil", "braise", "bring",
    "broil", "brown", "brush", "chill", "chop", "coat", "combine", "cook", "cool", "cover",
    "cream", "crush", "cube", "cut", "deglaze", "dice", "dissolve", "drain", "drizzle", "dust",
    "fold", "fry", "garnish", "grate", "grease", "grill", "heat", "julienne", "knead", "layer",
    "let", "line", "marinate", "mash", "melt", "microwave", "mince", "mix", "peel", "place",
    "poach", "pour", "preheat", "press", "puree", "reduce", "refrigerate", "remove", "rest",
    "rinse", "roast", "roll", "rub", "saute", "sauté", "scramble", "season", "sear", "serve",
    "set", "shape", "shred", "sift", "simmer", "slice", "soak", "spread", "sprinkle", "steam",
    "stir", "strain", "stuff", "taste", "toast", "top", "toss", "transfer", "trim", "turn",
    "wash", "whip", "whisk",
];

/// State an ingredient is left in by an instruction verb, if the verb changes it.
pub fn verb_state(verb: &str) -> Option<IngredientState> {
    match verb {
        "wash" | "rinse" | "peel" | "trim" | "drain" | "soak" => Some(IngredientState::Cleaned),
        "chop" | "dice" | "mince" | "slice" | "cut" | "cube" | "grate" | "shred" | "julienne"
        | "crush" => Some(IngredientState::Chopped),
        "mix" | "combine" | "whisk" | "beat" | "stir" | "fold" | "blend" | "cream" | "knead"
        | "toss" | "whip" | "puree" | "mash" => Some(IngredientState::Mixed),
        "bake" | "boil" | "braise" | "broil" | "brown" | "cook" | "fry" | "grill" | "poach"
        | "roast" | "saute" | "sauté" | "scramble" | "sear" | "simmer" | "steam" | "toast"
        | "microwave" => Some(IngredientState::Cooked),
        _ => None,
    }
}

/// Kitchen equipment nouns, multi-word entries first so they win over their
/// last word ("mixing bowl" before "bowl").
pub const EQUIPMENT: &[&str] = &[
    "baking dish",
    "baking sheet",
    "cutting board",
    "dutch oven",
    "food processor",
    "loaf pan",
    "measuring cup",
    "mixing bowl",
    "muffin tin",
    "rolling pin",
    "sauce pan",
    "sheet pan",
    "stand mixer",
    "wire rack",
    "wooden spoon",
    "blender",
    "bowl",
    "colander",
    "grater",
    "griddle",
    "knife",
    "ladle",
    "mixer",
    "oven",
    "pan",
    "peeler",
    "pot",
    "saucepan",
    "sieve",
    "skillet",
    "spatula",
    "stockpot",
    "thermometer",
    "tongs",
    "whisk",
    "wok",
];

/// Size words captured as an equipment capacity class.
pub const SIZE_WORDS: &[&str] = &["small", "medium", "large", "extra-large", "big", "deep"];

/// Descriptive words that qualify an ingredient rather than name it.
pub const MODIFIER_WORDS: &[&str] = &[
    "boneless",
    "chilled",
    "chopped",
    "coarse",
    "coarsely",
    "cold",
    "cooked",
    "crushed",
    "diced",
    "dried",
    "extra-large",
    "fine",
    "finely",
    "fresh",
    "frozen",
    "grated",
    "ground",
    "hot",
    "large",
    "lukewarm",
    "medium",
    "melted",
    "minced",
    "peeled",
    "raw",
    "ripe",
    "roughly",
    "shredded",
    "sifted",
    "skinless",
    "sliced",
    "small",
    "softened",
    "thinly",
    "warm",
    "washed",
    "whole",
];

/// State implied by descriptive modifiers on an ingredient line.
pub fn modifiers_state(modifiers: &[String]) -> IngredientState {
    modifiers
        .iter()
        .flat_map(|m| m.split_whitespace())
        .filter_map(|word| match word.to_lowercase().as_str() {
            "washed" | "rinsed" | "cleaned" | "peeled" | "trimmed" => {
                Some(IngredientState::Cleaned)
            }
            "chopped" | "diced" | "minced" | "sliced" | "cubed" | "grated" | "shredded"
            | "julienned" | "crushed" | "quartered" | "halved" => Some(IngredientState::Chopped),
            "beaten" | "whisked" | "combined" | "mixed" => Some(IngredientState::Mixed),
            "cooked" | "roasted" | "toasted" | "baked" | "fried" | "boiled" => {
                Some(IngredientState::Cooked)
            }
            _ => None,
        })
        .max()
        .unwrap_or_default()
}

/// Lowercased first word of a text with surrounding punctuation removed.
pub fn first_word(text: &str) -> Option<String> {
    text.split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
}

pub fn is_cooking_verb(word: &str) -> bool {
    COOKING_VERBS.contains(&word)
}

/// Whether `needle` occurs in `haystack` on word boundaries, ignoring case and
/// a trailing plural "s"/"es" on the needle.
pub fn mentions(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.to_lowercase();
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }

    let mut candidates = vec![needle.clone()];
    if let Some(stem) = needle.strip_suffix("es").filter(|s| s.len() >= 3) {
        candidates.push(stem.to_string());
    }
    if let Some(stem) = needle.strip_suffix('s').filter(|s| s.len() >= 3) {
        candidates.push(stem.to_string());
    }

    candidates.iter().any(|c| contains_word_prefix(&haystack, c))
}

/// Word-boundary search that lets the match extend by a plural suffix.
fn contains_word_prefix(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let rest = &haystack[end..];
        let after_ok = rest.chars().next().is_none_or(|c| !c.is_alphanumeric())
            || rest.starts_with("es") && rest[2..].chars().next().is_none_or(|c| !c.is_alphanumeric())
            || rest.starts_with('s') && rest[1..].chars().next().is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = end;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentions_handles_plurals() {
        assert!(mentions("Crack the eggs into a bowl", "egg"));
        assert!(mentions("Crack the egg into a bowl", "eggs"));
        assert!(mentions("Add the tomatoes", "tomato"));
        assert!(!mentions("Add the eggplant", "egg"));
        assert!(!mentions("anything", ""));
    }

    #[test]
    fn test_verb_state() {
        assert_eq!(verb_state("dice"), Some(IngredientState::Chopped));
        assert_eq!(verb_state("bake"), Some(IngredientState::Cooked));
        assert_eq!(verb_state("serve"), None);
    }

    #[test]
    fn test_modifiers_state_takes_latest() {
        let mods = vec!["finely diced".to_string(), "washed".to_string()];
        assert_eq!(modifiers_state(&mods), IngredientState::Chopped);
        assert_eq!(modifiers_state(&[]), IngredientState::Raw);
    }

    #[test]
    fn test_first_word() {
        assert_eq!(first_word("Whisk, until smooth"), Some("whisk".to_string()));
        assert_eq!(first_word("   "), None);
    }
}
