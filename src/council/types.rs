//! Core data model for a council deliberation run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One seat on the council: a model identifier plus an optional
/// member-specific system prompt applied in stage 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CouncilMember {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl CouncilMember {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// A deliberation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouncilRequest {
    /// The user's question, verbatim.
    pub content: String,
    /// Council override. `None` (or an all-blank list) seats the configured
    /// roster instead.
    #[serde(default)]
    pub council_models: Option<Vec<CouncilMember>>,
    /// Chairman override. Blank falls back to the configured chairman.
    #[serde(default)]
    pub chairman_model: Option<String>,
    /// Also produce a short title for the question, concurrently with the
    /// deliberation.
    #[serde(default)]
    pub want_title: bool,
}

impl CouncilRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// One council member's stage-1 answer. Failed members stay in the list so
/// downstream consumers can see the full roster outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelAnswer {
    pub model: String,
    pub content: String,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelAnswer {
    pub fn ok(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            content: content.into(),
            failed: false,
            error: None,
        }
    }

    pub fn failure(model: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            content: String::new(),
            failed: true,
            error: Some(error.into()),
        }
    }
}

/// An answer as shown to ranking peers: the anonymizing label plus content,
/// with the model identity retained for host-side bookkeeping only (it is
/// never rendered into a ranking prompt).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnonymizedAnswer {
    pub label: String,
    pub model: String,
    pub content: String,
}

/// One council member's stage-2 ranking: the raw verdict text plus the
/// labels extracted from it, best first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankingResult {
    pub model: String,
    pub ranking_text: String,
    pub parsed_ranking: Vec<String>,
}

/// Aggregate standing of one model across all parsed rankings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRankingEntry {
    pub model: String,
    /// Mean of the 1-based positions this model received. Lower is better.
    pub average_rank: f64,
    /// How many rankings mentioned this model at all.
    pub rankings_count: usize,
}

/// The chairman's synthesized final answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalAnswer {
    pub model: String,
    pub content: String,
}

/// Everything a completed deliberation produced, in stage order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouncilOutcome {
    pub answers: Vec<ModelAnswer>,
    pub rankings: Vec<RankingResult>,
    pub label_to_model: BTreeMap<String, String>,
    pub aggregate_rankings: Vec<AggregateRankingEntry>,
    pub final_answer: FinalAnswer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}
