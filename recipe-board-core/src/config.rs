//! Pipeline configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::privacy::UserDataPolicy;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 6;

/// Which source wins when the model and the pre-parser disagree on a field.
/// The losing source still fills fields the winner left empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    #[default]
    Llm,
    PreParser,
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "llm" | "model" => Ok(MergePolicy::Llm),
            "preparser" | "pre-parser" | "pre_parser" => Ok(MergePolicy::PreParser),
            other => Err(format!(
                "unknown merge policy '{}', expected 'llm' or 'preparser'",
                other
            )),
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergePolicy::Llm => "llm",
            MergePolicy::PreParser => "preparser",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Upper bound on tool-call rounds during dependency inference.
    pub max_tool_rounds: u32,
    pub merge_policy: MergePolicy,
    pub user_data: UserDataPolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            merge_policy: MergePolicy::default(),
            user_data: UserDataPolicy::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `RB_MAX_TOOL_ROUNDS`: tool-call round bound (default: 6)
    /// - `RB_MERGE_POLICY`: "llm" or "preparser" (default: "llm")
    /// - `RB_ALLOW_USER_DATA_LOGS`: allow recipe text in logs (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_tool_rounds = lookup("RB_MAX_TOOL_ROUNDS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_TOOL_ROUNDS);

        let merge_policy = match lookup("RB_MERGE_POLICY").map(|v| v.parse::<MergePolicy>()) {
            Some(Ok(policy)) => policy,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Ignoring RB_MERGE_POLICY");
                MergePolicy::default()
            }
            None => MergePolicy::default(),
        };

        let allow_logs = lookup("RB_ALLOW_USER_DATA_LOGS")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        Self {
            max_tool_rounds,
            merge_policy,
            user_data: UserDataPolicy { allow_logs },
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}
