//! Ranking-text extraction and aggregate scoring.
//!
//! Stage-2 models answer in free text. The extractor pulls an ordered label
//! sequence out of whatever came back: it prefers a dedicated ranking line
//! (the densest line mentioning several labels), falls back to label
//! mentions scattered through the text, and finally to bare keys like
//! `A > C > B`. Unrecognized tokens are dropped, duplicates after the first
//! are ignored, and a hopeless text yields an empty ranking rather than an
//! error.

use once_cell::sync::Lazy;
use regex::Regex;

use super::labels::{canonical_label, LabelTable};
use super::types::{AggregateRankingEntry, RankingResult};

// Full label tokens: "Response A", "response b2". Case-insensitive because
// models routinely lowercase the word.
static FULL_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bresponse\s+([a-z][0-9]*)\b").expect("Invalid label regex"));

// Bare keys: standalone "A", "B2". Uppercase only, otherwise the English
// article "a" matches in ordinary prose.
static BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][0-9]*)\b").expect("Invalid bare key regex"));

/// Extract an ordered label sequence from free-form ranking text.
///
/// Only labels present in `table` are emitted, each at most once, in first
/// appearance order within the chosen region of the text.
pub fn parse_ranking(text: &str, table: &LabelTable) -> Vec<String> {
    if table.is_empty() || text.is_empty() {
        return Vec::new();
    }

    // A line carrying two or more distinct full labels is almost certainly
    // the ranking itself. Take the densest such line, first on ties.
    let mut best: Option<Vec<String>> = None;
    for line in text.lines() {
        let labels = matches_in(&FULL_LABEL, line, table);
        if labels.len() >= 2 && best.as_ref().map_or(true, |b| labels.len() > b.len()) {
            best = Some(labels);
        }
    }
    if let Some(labels) = best {
        return labels;
    }

    // No single ranking line. Accept full labels scattered through the text
    // in document order.
    let scattered = matches_in(&FULL_LABEL, text, table);
    if !scattered.is_empty() {
        return scattered;
    }

    // Bare-key fallback for outputs like "Ranking: A > C > B". A lone key
    // only counts when the line says it is a ranking.
    let mut best: Option<Vec<String>> = None;
    for line in text.lines() {
        let labels = matches_in(&BARE_KEY, line, table);
        if labels.len() >= 2 && best.as_ref().map_or(true, |b| labels.len() > b.len()) {
            best = Some(labels);
        } else if best.is_none()
            && labels.len() == 1
            && line.to_ascii_lowercase().contains("ranking")
        {
            best = Some(labels);
        }
    }
    best.unwrap_or_default()
}

/// Distinct valid labels matched by `re` in `text`, first-seen order.
fn matches_in(re: &Regex, text: &str, table: &LabelTable) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in re.captures_iter(text) {
        let label = canonical_label(&cap[1]);
        if table.model_for(&label).is_some() && !seen.contains(&label) {
            seen.push(label);
        }
    }
    seen
}

/// Fold all parsed rankings into one global standing per model.
///
/// Every label at 0-based position `i` counts as one observation of rank
/// `i + 1` for the model behind the label. Models nobody ranked are omitted
/// rather than given a default score. Pure: same input, same output.
pub fn aggregate_rankings(
    rankings: &[RankingResult],
    table: &LabelTable,
) -> Vec<AggregateRankingEntry> {
    let input_order = table.models_in_order();
    let mut observed: Vec<(String, f64, usize)> = Vec::new();

    for ranking in rankings {
        for (i, label) in ranking.parsed_ranking.iter().enumerate() {
            let Some(model) = table.model_for(label) else {
                continue;
            };
            let rank = (i + 1) as f64;
            match observed.iter_mut().find(|(m, _, _)| m == model) {
                Some((_, sum, count)) => {
                    *sum += rank;
                    *count += 1;
                }
                None => observed.push((model.to_string(), rank, 1)),
            }
        }
    }

    let mut entries: Vec<AggregateRankingEntry> = observed
        .into_iter()
        .map(|(model, sum, count)| AggregateRankingEntry {
            model,
            average_rank: sum / count as f64,
            rankings_count: count,
        })
        .collect();

    let position = |model: &str| {
        input_order
            .iter()
            .position(|m| m == model)
            .unwrap_or(usize::MAX)
    };
    entries.sort_by(|a, b| {
        a.average_rank
            .total_cmp(&b.average_rank)
            .then_with(|| b.rankings_count.cmp(&a.rankings_count))
            .then_with(|| position(&a.model).cmp(&position(&b.model)))
    });
    entries
}
