//! Golden file tests for the offline pre-parser.
//!
//! Each JSON file in `fixtures/preparse/` holds a recipe text and the
//! structure the pre-parser should recover from it without any model call.

use glob::glob;
use recipe_board_core::preparse::preparse;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct TestCase {
    text: String,
    expected: Expected,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
struct Expected {
    title: Option<String>,
    ingredients: Vec<ExpectedIngredient>,
    equipment: Vec<String>,
    steps: usize,
    leftovers: usize,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
struct ExpectedIngredient {
    name: String,
    amount: Option<f64>,
    unit: Option<String>,
}

fn run_preparse(text: &str) -> Expected {
    let out = preparse(text);
    Expected {
        title: out.title,
        ingredients: out
            .ingredients
            .into_iter()
            .map(|i| ExpectedIngredient {
                name: i.name,
                amount: i.amount,
                unit: i.unit,
            })
            .collect(),
        equipment: out.equipment.into_iter().map(|e| e.name).collect(),
        steps: out.steps.len(),
        leftovers: out.leftovers.len(),
    }
}

fn load_test_cases() -> Vec<(String, TestCase)> {
    let pattern = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/preparse/*.json");
    let pattern_str = pattern.to_string_lossy();

    let mut cases = Vec::new();
    for entry in glob(&pattern_str).expect("Failed to read glob pattern") {
        let path = entry.expect("Failed to read directory entry");
        let name = path.file_stem().unwrap().to_string_lossy().into_owned();
        let content = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
        let case: TestCase = serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse {}: {}", path.display(), e));
        cases.push((name, case));
    }

    cases.sort_by(|a, b| a.0.cmp(&b.0));
    cases
}

#[test]
fn test_preparse_golden_files() {
    let cases = load_test_cases();
    assert!(!cases.is_empty(), "No pre-parse fixtures found");

    let mut msg = String::new();
    let mut failed = 0;

    for (name, case) in &cases {
        let actual = run_preparse(&case.text);
        if actual != case.expected {
            failed += 1;
            msg.push_str(&format!("\n=== {} ===\n", name));
            msg.push_str(&format!("Expected: {:#?}\n", case.expected));
            msg.push_str(&format!("Actual:   {:#?}\n", actual));
        }
    }

    if failed > 0 {
        panic!("\n{} failures across {} tests:\n{}", failed, cases.len(), msg);
    }
}

#[test]
fn test_preparse_handles_bundled_samples() {
    for sample in recipe_board_core::samples::samples() {
        let out = preparse(&sample.text);
        assert_eq!(out.title.as_deref(), Some(sample.title.as_str()), "{}", sample.name);
        assert!(!out.ingredients.is_empty(), "{} has no ingredients", sample.name);
        assert!(!out.steps.is_empty(), "{} has no steps", sample.name);

        let ordinals: Vec<u32> = out.steps.iter().map(|s| s.ordinal).collect();
        let expected: Vec<u32> = (1..=out.steps.len() as u32).collect();
        assert_eq!(ordinals, expected, "{}", sample.name);
    }
}
