//! Built-in sample recipes.

use std::path::Path;

/// Lines kept by [`preview`] unless told otherwise.
pub const PREVIEW_LINES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecipe {
    /// Short name used on the command line.
    pub name: String,
    pub title: String,
    pub text: String,
}

impl SampleRecipe {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        let text = text.into();
        let title = title_of(&text).unwrap_or_else(|| name.clone());
        Self { name, title, text }
    }
}

const EMBEDDED: &[(&str, &str)] = &[
    ("dinner-rolls", include_str!("../samples/dinner_rolls.md")),
    ("scrambled-eggs", include_str!("../samples/scrambled_eggs.md")),
    ("tomato-soup", include_str!("../samples/tomato_soup.md")),
];

/// First non-blank line with heading markers removed.
fn title_of(text: &str) -> Option<String> {
    text.lines()
        .map(|l| l.trim().trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

pub fn samples() -> Vec<SampleRecipe> {
    EMBEDDED
        .iter()
        .map(|(name, text)| SampleRecipe::new(*name, *text))
        .collect()
}

/// Look a sample up by name or title, ignoring case.
pub fn find_sample(name: &str) -> Option<SampleRecipe> {
    let wanted = name.trim().to_lowercase();
    samples()
        .into_iter()
        .find(|s| s.name == wanted || s.title.to_lowercase() == wanted)
}

/// Load every `*.md` file in a directory as a sample, sorted by file name.
/// Unreadable files are skipped with a warning.
pub fn load_dir(dir: &Path) -> std::io::Result<Vec<SampleRecipe>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();

    let mut loaded = Vec::new();
    for path in paths {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().replace('_', "-"))
            .unwrap_or_default();
        match std::fs::read_to_string(&path) {
            Ok(text) => loaded.push(SampleRecipe::new(name, text)),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not load sample"),
        }
    }
    Ok(loaded)
}

/// The first `max_lines` lines after leading blanks, with "..." when cut.
pub fn preview(text: &str, max_lines: usize) -> String {
    let mut lines: Vec<&str> = text
        .trim()
        .lines()
        .skip_while(|l| l.trim().is_empty())
        .collect();
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        lines.push("...");
    }
    lines.join("\n")
}
