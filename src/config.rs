//! Council configuration: default model roster and environment overrides.

use serde::Serialize;

/// Models seated on the council when the caller supplies none.
pub const DEFAULT_COUNCIL_MODELS: &[&str] = &[
    "openai/gpt-5.1-chat",
    "google/gemini-3-pro-preview",
    "anthropic/claude-sonnet-4.5",
    "x-ai/grok-4",
];

/// Model that synthesizes the final answer when the caller supplies none.
pub const DEFAULT_CHAIRMAN_MODEL: &str = "google/gemini-3-pro-preview";

/// Resolved deliberation configuration.
#[derive(Debug, Clone, Serialize)]
pub struct CouncilConfig {
    /// Model identifiers seated on the council, in seating order.
    pub council_models: Vec<String>,
    /// Chairman model identifier.
    pub chairman_model: String,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            council_models: DEFAULT_COUNCIL_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            chairman_model: DEFAULT_CHAIRMAN_MODEL.to_string(),
        }
    }
}

impl CouncilConfig {
    /// Resolve configuration from `COUNCIL_MODELS` (comma-separated) and
    /// `CHAIRMAN_MODEL`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let council_models = parse_model_list(std::env::var("COUNCIL_MODELS").ok().as_deref())
            .unwrap_or(defaults.council_models);
        let chairman_model = parse_chairman(std::env::var("CHAIRMAN_MODEL").ok().as_deref())
            .unwrap_or(defaults.chairman_model);
        Self {
            council_models,
            chairman_model,
        }
    }
}

/// Parse a comma-separated model list. `None`/empty means "use defaults";
/// a set variable yields exactly its non-blank entries, which may be an
/// empty list (rejected later at request validation).
fn parse_model_list(raw: Option<&str>) -> Option<Vec<String>> {
    match raw {
        None | Some("") => None,
        Some(raw) => Some(
            raw.split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        ),
    }
}

fn parse_chairman(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_model_list_falls_back_to_defaults() {
        assert_eq!(parse_model_list(None), None);
        assert_eq!(parse_model_list(Some("")), None);
    }

    #[test]
    fn model_list_entries_are_trimmed_and_blanks_dropped() {
        let parsed = parse_model_list(Some(" a/one , b/two ,, c/three")).unwrap();
        assert_eq!(parsed, vec!["a/one", "b/two", "c/three"]);
    }

    #[test]
    fn all_blank_model_list_resolves_to_empty_not_defaults() {
        let parsed = parse_model_list(Some(" , ,")).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn chairman_override_is_trimmed() {
        assert_eq!(parse_chairman(Some(" x/model ")), Some("x/model".into()));
        assert_eq!(parse_chairman(Some("   ")), None);
        assert_eq!(parse_chairman(None), None);
    }

    #[test]
    fn default_config_matches_roster_constants() {
        let cfg = CouncilConfig::default();
        assert_eq!(cfg.council_models.len(), DEFAULT_COUNCIL_MODELS.len());
        assert_eq!(cfg.chairman_model, DEFAULT_CHAIRMAN_MODEL);
    }
}
