use std::path::PathBuf;

use anyhow::{Context, Result};
use recipe_board_core::pipeline::Progress;
use recipe_board_core::{Analysis, Analyzer, AnalyzerConfig, MergePolicy};
use tokio::sync::watch;

pub struct AnalyzeOptions {
    pub offline: bool,
    pub json: bool,
    pub export_json: Option<PathBuf>,
    pub export_dot: Option<PathBuf>,
    pub max_tool_rounds: Option<u32>,
    pub merge_policy: Option<MergePolicy>,
}

/// Environment configuration with command-line overrides applied.
pub fn analyzer_config(
    max_tool_rounds: Option<u32>,
    merge_policy: Option<MergePolicy>,
) -> AnalyzerConfig {
    let mut config = AnalyzerConfig::from_env();
    if let Some(rounds) = max_tool_rounds {
        config.max_tool_rounds = rounds;
    }
    if let Some(policy) = merge_policy {
        config.merge_policy = policy;
    }
    config
}

pub fn build_analyzer(offline: bool, config: AnalyzerConfig) -> Analyzer {
    if offline {
        Analyzer::offline(config)
    } else {
        Analyzer::from_env_with_config(config)
    }
}

pub async fn analyze(text: &str, options: &AnalyzeOptions) -> Result<()> {
    let config = analyzer_config(options.max_tool_rounds, options.merge_policy);
    let analyzer = build_analyzer(options.offline, config);
    if !analyzer.has_client() {
        eprintln!("No model configured: using the offline pre-parser only.");
    }

    let (tx, mut rx) = watch::channel(Progress::default());
    let reporter = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let progress = rx.borrow_and_update().clone();
            if let Some(step) = &progress.current_step {
                eprintln!("[{}/{}] {}", progress.completed + 1, progress.total, step);
            }
            if progress.finished {
                break;
            }
        }
    });

    let result = analyzer.analyze_with_progress(text, Some(&tx)).await;
    drop(tx);
    let _ = reporter.await;
    let analysis = result.context("Analysis failed")?;

    if let Some(path) = &options.export_json {
        let json = analysis.export().to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Wrote graph JSON to {}", path.display());
    }
    if let Some(path) = &options.export_dot {
        std::fs::write(path, analysis.to_dot())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Wrote graph DOT to {}", path.display());
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_summary(&analysis);
    }
    Ok(())
}

fn print_summary(analysis: &Analysis) {
    let recipe = &analysis.recipe;
    println!("{}", recipe.title.as_deref().unwrap_or("Untitled recipe"));

    let mut flags = Vec::new();
    if analysis.confidence.degraded {
        flags.push("extraction degraded");
    }
    if analysis.confidence.incomplete {
        flags.push("inference incomplete");
    }
    if flags.is_empty() {
        println!(
            "Confidence: {} (mean {:.2})",
            analysis.confidence.overall, analysis.confidence.mean
        );
    } else {
        println!(
            "Confidence: {} (mean {:.2}; {})",
            analysis.confidence.overall,
            analysis.confidence.mean,
            flags.join(", ")
        );
    }

    println!("\nIngredients:\n{}", recipe.format_ingredients());
    println!("\nEquipment:\n{}", recipe.format_equipment());
    println!("\nSteps:\n{}", recipe.format_steps());

    if !analysis.contention.is_empty() {
        println!("\nShared equipment:");
        for contention in &analysis.contention {
            let steps: Vec<String> = contention.steps.iter().map(|s| s.to_string()).collect();
            println!("  - {} (steps {})", contention.equipment, steps.join(", "));
        }
    }

    if !analysis.warnings().is_empty() {
        println!("\nWarnings:");
        for warning in analysis.warnings() {
            println!("  ! {}", warning);
        }
    }

    if !analysis.rejected.is_empty() {
        println!("\nRejected dependencies: {}", analysis.rejected.len());
    }
    if !analysis.leftovers.is_empty() {
        println!("Unrecognized lines: {}", analysis.leftovers.len());
    }

    println!(
        "\nGraph: {} nodes, {} edges, {} component(s); {} model call(s)",
        analysis.graph.nodes.len(),
        analysis.graph.edges.len(),
        analysis.layout.components,
        analysis.llm_calls
    );
}
