mod analyze;
mod feedback;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use recipe_board_core::feedback::EntityKind;
use recipe_board_core::MergePolicy;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "recipe-board")]
#[command(about = "Turn recipe text into a dependency graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a recipe and print its entities, dependencies and warnings
    Analyze {
        /// Recipe file, or "-" for stdin
        file: Option<PathBuf>,
        /// Analyze a built-in sample recipe instead of a file
        #[arg(long, conflicts_with = "file")]
        sample: Option<String>,
        /// Never call the model, even when credentials are configured
        #[arg(long)]
        offline: bool,
        /// Print the whole analysis as JSON
        #[arg(long)]
        json: bool,
        /// Write the graph as a JSON dump
        #[arg(long)]
        export_json: Option<PathBuf>,
        /// Write the graph as Graphviz DOT
        #[arg(long)]
        export_dot: Option<PathBuf>,
        /// Upper bound on tool-call rounds during dependency inference
        #[arg(long)]
        max_tool_rounds: Option<u32>,
        /// Which source wins when model and pre-parser disagree (llm|preparser)
        #[arg(long)]
        merge_policy: Option<MergePolicy>,
    },
    /// Run only the offline pre-parser and print its output as JSON
    Preparse {
        /// Recipe file, or "-" for stdin
        file: Option<PathBuf>,
    },
    /// List the built-in sample recipes
    Samples,
    /// Record a thumbs up/down on one extracted entity
    #[command(group(ArgGroup::new("judgment").required(true).args(["up", "down"])))]
    Feedback {
        /// Recipe file the judgment refers to
        #[arg(long)]
        recipe: PathBuf,
        /// Entity kind: ingredient, equipment or step
        #[arg(long)]
        kind: EntityKind,
        /// Ingredient or equipment name, or step number
        #[arg(long)]
        key: String,
        #[arg(long)]
        up: bool,
        #[arg(long)]
        down: bool,
        /// Optional correction; text quoted from the recipe is redacted
        #[arg(long)]
        correction: Option<String>,
        /// Feedback file (default: ~/.recipe-board/feedback.jsonl)
        #[arg(long, env = "RB_FEEDBACK_PATH")]
        store: Option<PathBuf>,
        /// Resolve entities with the pre-parser only
        #[arg(long)]
        offline: bool,
    },
    /// Print recorded feedback
    FeedbackList {
        /// Feedback file (default: ~/.recipe-board/feedback.jsonl)
        #[arg(long, env = "RB_FEEDBACK_PATH")]
        store: Option<PathBuf>,
    },
}

/// Console logging on stderr, filtered by `RUST_LOG` (default: warn).
fn init_telemetry() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Read a recipe from a file, or from stdin when the path is absent or "-".
fn read_recipe(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recipe: {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read recipe from stdin")?;
            Ok(text)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            file,
            sample,
            offline,
            json,
            export_json,
            export_dot,
            max_tool_rounds,
            merge_policy,
        } => {
            let text = match sample {
                Some(name) => recipe_board_core::samples::find_sample(&name)
                    .map(|s| s.text)
                    .with_context(|| {
                        format!("No sample named '{}' (see `recipe-board samples`)", name)
                    })?,
                None => read_recipe(file.as_deref())?,
            };
            let options = analyze::AnalyzeOptions {
                offline,
                json,
                export_json,
                export_dot,
                max_tool_rounds,
                merge_policy,
            };
            analyze::analyze(&text, &options).await?;
        }
        Commands::Preparse { file } => {
            let text = read_recipe(file.as_deref())?;
            let out = recipe_board_core::preparse(&text);
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Samples => {
            for sample in recipe_board_core::samples::samples() {
                println!("{} - {}", sample.name, sample.title);
                let preview = recipe_board_core::samples::preview(
                    &sample.text,
                    recipe_board_core::samples::PREVIEW_LINES,
                );
                for line in preview.lines() {
                    println!("    {}", line);
                }
                println!();
            }
        }
        Commands::Feedback {
            recipe,
            kind,
            key,
            up,
            down: _,
            correction,
            store,
            offline,
        } => {
            let text = read_recipe(Some(&recipe))?;
            let args = feedback::FeedbackArgs {
                kind,
                key,
                up,
                correction,
                store,
                offline,
            };
            feedback::record(&text, args).await?;
        }
        Commands::FeedbackList { store } => {
            feedback::list(store).await?;
        }
    }

    Ok(())
}
