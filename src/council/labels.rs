//! Anonymizing label assignment for peer review.
//!
//! Stage 2 must hide which model wrote which answer, so every usable
//! stage-1 answer gets a neutral label (`Response A`, `Response B`, ...)
//! and peers only ever see the labels. The table keeps the label->model
//! mapping so rankings can be de-anonymized afterwards.

use std::collections::BTreeMap;

use super::types::{AnonymizedAnswer, ModelAnswer};

/// Label for the `index`-th usable answer. Letters wrap after `Z` with a
/// numeric suffix (`Response A2`, `Response B2`, ...), so the scheme never
/// runs out regardless of council size.
pub fn label_for(index: usize) -> String {
    let letter = (b'A' + (index % 26) as u8) as char;
    let round = index / 26;
    if round == 0 {
        format!("Response {letter}")
    } else {
        format!("Response {letter}{}", round + 1)
    }
}

/// Canonical form of a parsed label key, e.g. `a` -> `Response A`,
/// `c2` -> `Response C2`.
pub fn canonical_label(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!(
            "Response {}{}",
            first.to_ascii_uppercase(),
            chars.as_str()
        ),
        None => String::from("Response"),
    }
}

/// Bidirectional label<->model table over the usable stage-1 answers.
///
/// Labels are assigned in answer order, skipping failed answers entirely,
/// so a label never points at an empty answer. Two seats running the same
/// model get distinct labels.
#[derive(Debug, Clone)]
pub struct LabelTable {
    entries: Vec<AnonymizedAnswer>,
    label_to_model: BTreeMap<String, String>,
}

impl LabelTable {
    pub fn assign(answers: &[ModelAnswer]) -> Self {
        let mut entries = Vec::new();
        let mut label_to_model = BTreeMap::new();
        for answer in answers.iter().filter(|a| !a.failed) {
            let label = label_for(entries.len());
            label_to_model.insert(label.clone(), answer.model.clone());
            entries.push(AnonymizedAnswer {
                label,
                model: answer.model.clone(),
                content: answer.content.clone(),
            });
        }
        Self {
            entries,
            label_to_model,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Anonymized answers in assignment order.
    pub fn answers(&self) -> &[AnonymizedAnswer] {
        &self.entries
    }

    pub fn label_to_model(&self) -> &BTreeMap<String, String> {
        &self.label_to_model
    }

    pub fn model_for(&self, label: &str) -> Option<&str> {
        self.label_to_model.get(label).map(String::as_str)
    }

    /// Model identifiers in assignment order, first occurrence only.
    /// This is the tie-break order for aggregate scoring.
    pub fn models_in_order(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.model) {
                seen.push(entry.model.clone());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_the_alphabet_then_wrap_with_suffix() {
        assert_eq!(label_for(0), "Response A");
        assert_eq!(label_for(1), "Response B");
        assert_eq!(label_for(25), "Response Z");
        assert_eq!(label_for(26), "Response A2");
        assert_eq!(label_for(27), "Response B2");
        assert_eq!(label_for(52), "Response A3");
    }

    #[test]
    fn canonical_label_uppercases_the_letter_and_keeps_the_suffix() {
        assert_eq!(canonical_label("a"), "Response A");
        assert_eq!(canonical_label("B"), "Response B");
        assert_eq!(canonical_label("c2"), "Response C2");
    }

    #[test]
    fn failed_answers_get_no_label() {
        let answers = vec![
            ModelAnswer::ok("m/one", "first"),
            ModelAnswer::failure("m/two", "timed out"),
            ModelAnswer::ok("m/three", "third"),
        ];
        let table = LabelTable::assign(&answers);
        assert_eq!(table.len(), 2);
        assert_eq!(table.model_for("Response A"), Some("m/one"));
        assert_eq!(table.model_for("Response B"), Some("m/three"));
        assert_eq!(table.model_for("Response C"), None);
    }

    #[test]
    fn duplicate_models_get_distinct_labels() {
        let answers = vec![
            ModelAnswer::ok("m/same", "take one"),
            ModelAnswer::ok("m/same", "take two"),
        ];
        let table = LabelTable::assign(&answers);
        assert_eq!(table.model_for("Response A"), Some("m/same"));
        assert_eq!(table.model_for("Response B"), Some("m/same"));
        assert_eq!(table.models_in_order(), vec!["m/same".to_string()]);
    }

    #[test]
    fn empty_when_every_answer_failed() {
        let answers = vec![ModelAnswer::failure("m/one", "boom")];
        let table = LabelTable::assign(&answers);
        assert!(table.is_empty());
        assert!(table.label_to_model().is_empty());
    }
}
